//! Inert adapter implementations.
//!
//! Every operation records its intent through the context log and succeeds
//! without touching the system. Used for development, demos, and any
//! deployment where a capability is managed out of band.

use async_trait::async_trait;

use super::{
    AdapterContext, AdapterError, AdapterOutcome, DnsZoneSpec, FtpAccountSpec, MailboxSpec,
    MysqlAccountSpec, OperationKind, PhpFpmPoolSpec, TargetKind, UserSpec, WebVhostSpec,
};
use crate::adapters::{
    DnsAdapter, FtpAdapter, MailAdapter, MysqlAdapter, PhpFpmAdapter, UserAdapter,
    WebServerAdapter,
};

async fn record(
    ctx: &AdapterContext,
    target: TargetKind,
    operation: OperationKind,
    subject: &str,
) -> Result<AdapterOutcome, AdapterError> {
    ctx.log_success(
        target,
        operation,
        format!("noop {} {} '{subject}'", operation.as_str(), target.as_str()),
        serde_json::json!({ "noop": true, "subject": subject }),
    )
    .await;
    Ok(AdapterOutcome::empty())
}

pub struct NoopUserAdapter;

#[async_trait]
impl UserAdapter for NoopUserAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &UserSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::SystemUser, OperationKind::Create, &spec.username).await
    }

    async fn ensure_suspended(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::SystemUser, OperationKind::Suspend, username).await
    }

    async fn ensure_resumed(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::SystemUser, OperationKind::Resume, username).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::SystemUser, OperationKind::Delete, username).await
    }
}

pub struct NoopWebServerAdapter;

#[async_trait]
impl WebServerAdapter for NoopWebServerAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &WebVhostSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::WebVhost, OperationKind::Create, &spec.domain).await
    }

    async fn ensure_suspended(
        &self,
        ctx: &AdapterContext,
        domain: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::WebVhost, OperationKind::Suspend, domain).await
    }

    async fn ensure_resumed(
        &self,
        ctx: &AdapterContext,
        spec: &WebVhostSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::WebVhost, OperationKind::Resume, &spec.domain).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        domain: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::WebVhost, OperationKind::Delete, domain).await
    }
}

pub struct NoopPhpFpmAdapter;

#[async_trait]
impl PhpFpmAdapter for NoopPhpFpmAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &PhpFpmPoolSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::PhpFpmPool, OperationKind::Create, &spec.name).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        pool_name: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::PhpFpmPool, OperationKind::Delete, pool_name).await
    }
}

pub struct NoopMysqlAdapter;

#[async_trait]
impl MysqlAdapter for NoopMysqlAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &MysqlAccountSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::MysqlAccount, OperationKind::Create, &spec.username).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::MysqlAccount, OperationKind::Delete, username).await
    }
}

pub struct NoopDnsAdapter;

#[async_trait]
impl DnsAdapter for NoopDnsAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &DnsZoneSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::DnsZone, OperationKind::Create, &spec.zone_name).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        zone_name: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::DnsZone, OperationKind::Delete, zone_name).await
    }
}

pub struct NoopMailAdapter;

#[async_trait]
impl MailAdapter for NoopMailAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &MailboxSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::Mailbox, OperationKind::Create, &spec.address).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        address: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::Mailbox, OperationKind::Delete, address).await
    }
}

pub struct NoopFtpAdapter;

#[async_trait]
impl FtpAdapter for NoopFtpAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &FtpAccountSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::FtpAccount, OperationKind::Create, &spec.username).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        record(ctx, TargetKind::FtpAccount, OperationKind::Delete, username).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterLogEntry, AdapterLogSink};
    use std::sync::Arc;
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

    fn test_ctx() -> (AdapterContext, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink {
            entries: Mutex::new(Vec::new()),
        });
        (AdapterContext::new(false, None, sink.clone()), sink)
    }

    #[tokio::test]
    async fn every_call_logs_exactly_one_success() {
        let (ctx, sink) = test_ctx();
        let adapter = NoopUserAdapter;
        let spec = UserSpec {
            username: "u_shop".into(),
            home_directory: "/home/u_shop".into(),
            primary_group: None,
            shell: None,
            quota_mb: None,
        };

        let outcome = adapter.ensure_present(&ctx, &spec).await.unwrap();
        assert!(outcome.rollback.is_none());

        adapter.ensure_absent(&ctx, "u_shop").await.unwrap();

        let entries = sink.entries.lock().await;
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.success));
        assert_eq!(entries[0].operation, OperationKind::Create);
        assert_eq!(entries[1].operation, OperationKind::Delete);
        assert_eq!(entries[0].target, TargetKind::SystemUser);
    }

    #[tokio::test]
    async fn noop_dns_succeeds_without_backend_config() {
        let (ctx, sink) = test_ctx();
        let adapter = NoopDnsAdapter;
        let spec = DnsZoneSpec {
            zone_name: "example.com".into(),
            records: vec![],
        };

        adapter.ensure_present(&ctx, &spec).await.unwrap();
        assert_eq!(sink.entries.lock().await.len(), 1);
    }
}
