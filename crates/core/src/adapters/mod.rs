//! Capability adapters.
//!
//! Each hosting capability (system users, web vhosts, PHP-FPM pools, MySQL
//! accounts, DNS zones, mailboxes, FTP accounts) sits behind a trait with
//! idempotent `ensure_*` operations. Two implementations exist per
//! capability: an inert one that only records intent ([`noop`]) and a
//! shell-driving one that converges the host system (`shell_*`). The
//! orchestrator is written purely against the traits; which family backs a
//! deployment is a composition-root decision.

mod context;
mod shell_common;
mod specs;

pub mod noop;
pub mod shell_dns;
pub mod shell_ftp;
pub mod shell_mail;
pub mod shell_mysql;
pub mod shell_php_fpm;
pub mod shell_user;
pub mod shell_web;

pub use context::{
    rollback, AdapterContext, AdapterLogEntry, AdapterLogSink, AdapterOutcome, OperationKind,
    Rollback, TargetKind,
};
pub use specs::{
    DnsRecordSpec, DnsZoneSpec, FtpAccountSpec, MailboxSpec, MysqlAccountSpec, PhpFpmPoolSpec,
    UserSpec, WebVhostSpec,
};

use async_trait::async_trait;

use crate::tools::ToolNotFound;

/// Failure of an adapter operation.
///
/// Adapters log their own failure entry before returning one of these, so
/// callers treat the error as control flow and the log as the audit trail.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    ToolNotFound(#[from] ToolNotFound),

    #[error("{operation} failed with exit code {code}: {stderr}")]
    CommandFailed {
        operation: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("{0} backend is not configured")]
    BackendNotConfigured(&'static str),

    #[error("unsupported DNS backend '{0}'")]
    UnsupportedDnsBackend(String),

    #[error("unsafe {what} '{value}'")]
    UnsafeIdentifier { what: &'static str, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// Build a [`CommandFailed`](Self::CommandFailed) from an exec result.
    pub fn command_failed(operation: impl Into<String>, result: &crate::exec::ExecResult) -> Self {
        AdapterError::CommandFailed {
            operation: operation.into(),
            code: result.code,
            stdout: result.stdout.trim().to_string(),
            stderr: result.stderr.trim().to_string(),
        }
    }
}

/// System user lifecycle.
#[async_trait]
pub trait UserAdapter: Send + Sync {
    /// Create the user (and home directory) if missing.
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &UserSpec,
    ) -> Result<AdapterOutcome, AdapterError>;

    /// Lock the account so logins fail.
    async fn ensure_suspended(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError>;

    /// Unlock a previously locked account.
    async fn ensure_resumed(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError>;

    /// Remove the user and its home directory.
    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError>;
}

/// Web server virtual host lifecycle.
#[async_trait]
pub trait WebServerAdapter: Send + Sync {
    /// Render and activate the vhost configuration.
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &WebVhostSpec,
    ) -> Result<AdapterOutcome, AdapterError>;

    /// Deactivate the vhost (remove the enabled symlink) and reload.
    async fn ensure_suspended(
        &self,
        ctx: &AdapterContext,
        domain: &str,
    ) -> Result<AdapterOutcome, AdapterError>;

    /// Restore the full vhost configuration after suspension.
    async fn ensure_resumed(
        &self,
        ctx: &AdapterContext,
        spec: &WebVhostSpec,
    ) -> Result<AdapterOutcome, AdapterError>;

    /// Remove the vhost configuration entirely.
    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        domain: &str,
    ) -> Result<AdapterOutcome, AdapterError>;
}

/// PHP-FPM pool lifecycle.
#[async_trait]
pub trait PhpFpmAdapter: Send + Sync {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &PhpFpmPoolSpec,
    ) -> Result<AdapterOutcome, AdapterError>;

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        pool_name: &str,
    ) -> Result<AdapterOutcome, AdapterError>;
}

/// MySQL account and database lifecycle.
#[async_trait]
pub trait MysqlAdapter: Send + Sync {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &MysqlAccountSpec,
    ) -> Result<AdapterOutcome, AdapterError>;

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError>;
}

/// DNS zone lifecycle.
#[async_trait]
pub trait DnsAdapter: Send + Sync {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &DnsZoneSpec,
    ) -> Result<AdapterOutcome, AdapterError>;

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        zone_name: &str,
    ) -> Result<AdapterOutcome, AdapterError>;
}

/// Mailbox lifecycle, delegated to an operator-configured helper command.
#[async_trait]
pub trait MailAdapter: Send + Sync {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &MailboxSpec,
    ) -> Result<AdapterOutcome, AdapterError>;

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        address: &str,
    ) -> Result<AdapterOutcome, AdapterError>;
}

/// FTP account lifecycle, delegated to an operator-configured helper command.
#[async_trait]
pub trait FtpAdapter: Send + Sync {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &FtpAccountSpec,
    ) -> Result<AdapterOutcome, AdapterError>;

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError>;
}
