//! Entity models and in-memory repositories for the npanel control plane.
//!
//! Storage is keyed by UUID and held behind `tokio::sync::RwLock`; the
//! repository surface (find / save / list / delete) is the contract the
//! orchestrators program against.

pub mod models;
pub mod repositories;
