//! Migration job, account, step, and log entities.

use npanel_core::types::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};

/// Aggregate status of a migration job, derived from its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationJobStatus {
    Pending,
    Running,
    /// Some steps failed, the rest completed.
    Partial,
    Failed,
    Completed,
}

impl MigrationJobStatus {
    /// Terminal jobs accept no further step execution.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MigrationJobStatus::Partial | MigrationJobStatus::Failed | MigrationJobStatus::Completed
        )
    }
}

/// A migration from one source control panel host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationJob {
    pub id: EntityId,
    pub name: String,
    /// Source kind; only `cpanel_live_ssh` is currently plannable.
    pub source_type: String,
    /// Connection settings (host, ssh_user, ssh_port, ssh_key_path,
    /// known_hosts_file, cpanel_home_root). Secrets are never logged.
    pub source_config: serde_json::Value,
    pub dry_run: bool,
    pub status: MigrationJobStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Per-plan resource limits carried by a migrated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLimits {
    pub disk_quota_mb: i64,
    pub max_databases: i64,
    pub max_mailboxes: i64,
    pub max_ftp_accounts: i64,
    pub php_version: String,
}

impl Default for AccountLimits {
    fn default() -> Self {
        Self {
            disk_quota_mb: 5120,
            max_databases: 3,
            max_mailboxes: 5,
            max_ftp_accounts: 1,
            php_version: "8.2".to_string(),
        }
    }
}

/// One source account inside a migration job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationAccount {
    pub id: EntityId,
    pub job_id: EntityId,
    pub source_username: String,
    pub source_primary_domain: String,
    pub target_customer_id: EntityId,
    /// Hosting service provisioned for this account, once created.
    pub target_service_id: Option<EntityId>,
    pub limits: Option<AccountLimits>,
    /// Free-form source details, e.g. `db_dumps`.
    pub config: serde_json::Value,
    pub created_at: Timestamp,
}

/// Kind of work a migration step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    ValidateSourceHost,
    ProvisionTargetEnv,
    RsyncHomeDirectory,
    ImportDatabases,
}

impl StepName {
    pub fn as_str(self) -> &'static str {
        match self {
            StepName::ValidateSourceHost => "validate_source_host",
            StepName::ProvisionTargetEnv => "provision_target_env",
            StepName::RsyncHomeDirectory => "rsync_home_directory",
            StepName::ImportDatabases => "import_databases",
        }
    }
}

/// Execution state of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Deliberately not executed, e.g. by an operator excluding a step.
    Skipped,
}

/// Error recorded on a failed step. Failed steps are never retried
/// automatically; the error stays for operator review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepError {
    pub message: String,
    pub details: serde_json::Value,
}

/// One unit of migration work, executed at most one at a time per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationStep {
    pub id: EntityId,
    pub job_id: EntityId,
    /// Account this step belongs to; `None` for job-level steps.
    pub account_id: Option<EntityId>,
    pub name: StepName,
    pub status: StepStatus,
    /// Precomputed inputs, e.g. rsync source/target paths.
    pub payload: serde_json::Value,
    pub last_error: Option<StepError>,
    /// Stable execution order within the job.
    pub position: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Append-only, job-scoped log entry. Context is redacted before storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationLogEntry {
    pub id: EntityId,
    pub job_id: EntityId,
    pub event: String,
    pub context: serde_json::Value,
    pub created_at: Timestamp,
}
