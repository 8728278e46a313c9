//! Shared system-level building blocks for the npanel control plane.
//!
//! This crate has no internal dependencies. It provides the tool resolver,
//! the restricted subprocess runner, credential generation, naming helpers,
//! and the capability adapter traits plus their inert and shell-driving
//! implementations.

pub mod adapters;
pub mod credentials;
pub mod env;
pub mod exec;
pub mod hashing;
pub mod naming;
pub mod redact;
pub mod tools;
pub mod types;
