//! Shared context passed to every adapter call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::types::Timestamp;

/// Capability a log entry or adapter call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    SystemUser,
    WebVhost,
    PhpFpmPool,
    MysqlAccount,
    DnsZone,
    Mailbox,
    FtpAccount,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::SystemUser => "system_user",
            TargetKind::WebVhost => "web_vhost",
            TargetKind::PhpFpmPool => "php_fpm_pool",
            TargetKind::MysqlAccount => "mysql_account",
            TargetKind::DnsZone => "dns_zone",
            TargetKind::Mailbox => "mailbox",
            TargetKind::FtpAccount => "ftp_account",
        }
    }
}

/// Lifecycle operation an adapter call performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Suspend,
    Resume,
    Delete,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Suspend => "suspend",
            OperationKind::Resume => "resume",
            OperationKind::Delete => "delete",
        }
    }
}

/// One audit record per adapter call. Adapters emit exactly one entry for
/// every invocation, success or failure.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdapterLogEntry {
    pub target: TargetKind,
    pub operation: OperationKind,
    pub success: bool,
    /// Propagated from the context on every entry, so real and rehearsed
    /// runs are distinguishable in the audit trail.
    pub dry_run: bool,
    pub message: String,
    pub details: serde_json::Value,
    pub at: Timestamp,
}

/// Destination for adapter log entries. The orchestrator supplies a sink
/// that persists entries (with secret redaction) against the service.
#[async_trait]
pub trait AdapterLogSink: Send + Sync {
    async fn record(&self, entry: AdapterLogEntry);
}

/// Compensating action registered by a mutating adapter call.
///
/// Rollbacks are best-effort: the future must swallow its own errors
/// (logging them) so that unwinding one failure never aborts the rest of
/// the rollback sequence. Dry-run awareness is baked in at construction.
pub type Rollback = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Box a future as a [`Rollback`].
pub fn rollback<F>(fut: F) -> Rollback
where
    F: Future<Output = ()> + Send + 'static,
{
    Box::pin(fut)
}

/// Result of an adapter call: structured details for the caller plus an
/// optional compensating action.
pub struct AdapterOutcome {
    pub details: serde_json::Value,
    pub rollback: Option<Rollback>,
}

impl std::fmt::Debug for AdapterOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterOutcome")
            .field("details", &self.details)
            .field("rollback", &self.rollback.as_ref().map(|_| "<rollback>"))
            .finish()
    }
}

impl AdapterOutcome {
    pub fn empty() -> Self {
        Self {
            details: serde_json::Value::Null,
            rollback: None,
        }
    }

    pub fn with_details(details: serde_json::Value) -> Self {
        Self {
            details,
            rollback: None,
        }
    }

    pub fn and_rollback(mut self, action: Rollback) -> Self {
        self.rollback = Some(action);
        self
    }
}

/// Per-invocation context shared by all adapters.
#[derive(Clone)]
pub struct AdapterContext {
    /// When set, adapters log what they would do and perform no side
    /// effects; no rollbacks are registered.
    pub dry_run: bool,
    /// Service this call is provisioning for, when applicable.
    pub service_id: Option<Uuid>,
    sink: Arc<dyn AdapterLogSink>,
}

impl AdapterContext {
    pub fn new(dry_run: bool, service_id: Option<Uuid>, sink: Arc<dyn AdapterLogSink>) -> Self {
        Self {
            dry_run,
            service_id,
            sink,
        }
    }

    /// Record a success entry for this call.
    pub async fn log_success(
        &self,
        target: TargetKind,
        operation: OperationKind,
        message: impl Into<String>,
        details: serde_json::Value,
    ) {
        self.record(target, operation, true, message.into(), details)
            .await;
    }

    /// Record a failure entry for this call.
    pub async fn log_failure(
        &self,
        target: TargetKind,
        operation: OperationKind,
        message: impl Into<String>,
        details: serde_json::Value,
    ) {
        self.record(target, operation, false, message.into(), details)
            .await;
    }

    async fn record(
        &self,
        target: TargetKind,
        operation: OperationKind,
        success: bool,
        message: String,
        details: serde_json::Value,
    ) {
        self.sink
            .record(AdapterLogEntry {
                target,
                operation,
                success,
                dry_run: self.dry_run,
                message,
                details,
                at: chrono::Utc::now(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct RecordingSink {
        entries: Mutex<Vec<AdapterLogEntry>>,
    }

    #[async_trait]
    impl AdapterLogSink for RecordingSink {
        async fn record(&self, entry: AdapterLogEntry) {
            self.entries.lock().await.push(entry);
        }
    }

    #[tokio::test]
    async fn every_entry_carries_the_context_dry_run_flag() {
        let sink = Arc::new(RecordingSink {
            entries: Mutex::new(Vec::new()),
        });

        let real = AdapterContext::new(false, None, sink.clone());
        real.log_success(
            TargetKind::SystemUser,
            OperationKind::Create,
            "created",
            serde_json::Value::Null,
        )
        .await;
        real.log_failure(
            TargetKind::DnsZone,
            OperationKind::Delete,
            "failed",
            serde_json::Value::Null,
        )
        .await;

        let rehearsal = AdapterContext::new(true, None, sink.clone());
        rehearsal
            .log_success(
                TargetKind::Mailbox,
                OperationKind::Create,
                "would create",
                serde_json::Value::Null,
            )
            .await;

        let entries = sink.entries.lock().await;
        assert_eq!(entries.len(), 3);
        assert!(!entries[0].dry_run);
        assert!(!entries[1].dry_run);
        assert!(entries[2].dry_run);
    }
}
