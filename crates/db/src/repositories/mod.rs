pub mod customer_repo;
pub mod hosting_log_repo;
pub mod migration_repo;
pub mod plan_repo;
pub mod service_repo;

pub use customer_repo::CustomerRepo;
pub use hosting_log_repo::HostingLogRepo;
pub use migration_repo::{AccountRepo, JobRepo, MigrationLogRepo, StepRepo};
pub use plan_repo::PlanRepo;
pub use service_repo::ServiceRepo;
