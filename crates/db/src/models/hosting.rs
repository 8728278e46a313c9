//! Hosting plan, service, and audit log entities.

use npanel_core::types::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};

/// Resource limits sold as a plan. Services reference a plan; plans with
/// active references cannot be deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingPlan {
    pub id: EntityId,
    pub name: String,
    pub disk_quota_mb: i64,
    pub max_databases: i64,
    pub max_mailboxes: i64,
    pub max_ftp_accounts: i64,
    pub memory_mb: i64,
    pub php_version: String,
    pub created_at: Timestamp,
}

/// Lifecycle state of a hosting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Provisioning,
    Active,
    Suspended,
    TerminationPending,
    Terminated,
    Error,
}

impl ServiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::Provisioning => "provisioning",
            ServiceStatus::Active => "active",
            ServiceStatus::Suspended => "suspended",
            ServiceStatus::TerminationPending => "termination_pending",
            ServiceStatus::Terminated => "terminated",
            ServiceStatus::Error => "error",
        }
    }
}

/// A hosted account: one customer, one primary domain, one system user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingService {
    pub id: EntityId,
    pub customer_id: EntityId,
    pub plan_id: EntityId,
    pub primary_domain: String,
    pub system_username: String,
    pub status: ServiceStatus,
    /// Confirmation token for two-phase termination, when pending.
    pub termination_token: Option<String>,
    pub termination_expires_at: Option<Timestamp>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Append-only audit record scoped to a service. Adapter calls produce one
/// entry each; lifecycle transitions add their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingLogEntry {
    pub id: EntityId,
    pub service_id: EntityId,
    /// Event name, e.g. `adapter_operation`, `service_created`,
    /// `provision_failed`.
    pub event: String,
    /// Capability the entry targets, for adapter operations.
    pub target: Option<String>,
    pub operation: Option<String>,
    pub success: bool,
    /// Whether the entry was recorded under dry-run mode.
    pub dry_run: bool,
    pub message: String,
    pub details: serde_json::Value,
    pub created_at: Timestamp,
}
