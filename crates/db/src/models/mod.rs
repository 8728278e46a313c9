pub mod customer;
pub mod hosting;
pub mod migration;

pub use customer::Customer;
pub use hosting::{HostingLogEntry, HostingPlan, HostingService, ServiceStatus};
pub use migration::{
    AccountLimits, MigrationAccount, MigrationJob, MigrationJobStatus, MigrationLogEntry,
    MigrationStep, StepError, StepName, StepStatus,
};
