//! Migration execution engine.
//!
//! Imports accounts from a live cPanel source host: jobs are planned into
//! ordered steps (validate, provision, rsync, database import) and executed
//! one step at a time by a pull-based worker. Failed steps stay failed for
//! operator review; the job's aggregate status is derived from its steps.

pub mod engine;
pub mod error;
pub mod rsync;
pub mod source;

pub use engine::{MigrationConfig, MigrationEngine, NewMigrationAccount, NewMigrationJob};
pub use error::MigrationError;
