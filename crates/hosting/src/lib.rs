//! Hosting lifecycle orchestration.
//!
//! Drives a service through provisioning, suspension, and two-phase
//! termination by sequencing the capability adapters, with rollback of the
//! current run on failure.

pub mod error;
pub mod orchestrator;

pub use error::HostingError;
pub use orchestrator::{
    AdapterSet, CreateService, CustomerRef, HostingConfig, HostingOrchestrator, NewPlan,
    ProvisionedCredentials, TerminationTicket, DEFAULT_PLAN_NAME, SUPPORTED_PHP_VERSIONS,
    TERMINATION_TOKEN_TTL,
};
