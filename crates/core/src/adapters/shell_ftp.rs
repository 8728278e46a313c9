//! FTP account adapter delegating to an operator-configured helper command.
//!
//! Verb protocol, mirroring the mail helper:
//!
//! ```text
//! <cmd> present <username> <home_directory> <password>
//! <cmd> absent <username>
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use super::shell_common::{dry_run, finish, Applied};
use super::shell_mail::{optional_command, run_helper};
use super::{
    rollback, AdapterContext, AdapterError, AdapterOutcome, FtpAccountSpec, FtpAdapter,
    OperationKind, TargetKind,
};
use crate::tools::ToolResolver;

/// FTP adapter configuration.
#[derive(Debug, Clone)]
pub struct FtpConfig {
    /// Helper command with any leading arguments, from `NPANEL_FTP_CMD`.
    pub command: Option<Vec<String>>,
}

impl FtpConfig {
    pub fn from_env() -> Self {
        Self {
            command: optional_command("NPANEL_FTP_CMD"),
        }
    }
}

pub struct ShellFtpAdapter {
    tools: Arc<ToolResolver>,
    config: FtpConfig,
}

impl ShellFtpAdapter {
    pub fn new(tools: Arc<ToolResolver>, config: FtpConfig) -> Self {
        Self { tools, config }
    }
}

#[async_trait]
impl FtpAdapter for ShellFtpAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &FtpAccountSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::FtpAccount;
        const OP: OperationKind = OperationKind::Create;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, &spec.username).await;
        }

        let inner = async {
            let command = self
                .config
                .command
                .as_ref()
                .ok_or(AdapterError::BackendNotConfigured("FTP"))?;
            run_helper(
                &self.tools,
                command,
                vec![
                    "present".to_string(),
                    spec.username.clone(),
                    spec.home_directory.clone(),
                    spec.password.clone(),
                ],
                "ftp_present_failed",
            )
            .await?;

            let tools = self.tools.clone();
            let command = command.clone();
            let username = spec.username.clone();
            let undo = rollback(async move {
                let args = vec!["absent".to_string(), username.clone()];
                if let Err(err) = run_helper(&tools, &command, args, "ftp_absent_failed").await {
                    tracing::warn!(%username, error = %err, "ftp rollback failed");
                }
            });

            Ok(Applied::new(
                format!("ensured ftp account '{}'", spec.username),
                serde_json::json!({
                    "username": spec.username,
                    "home_directory": spec.home_directory,
                }),
            )
            .with_rollback(undo))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::FtpAccount;
        const OP: OperationKind = OperationKind::Delete;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, username).await;
        }

        let inner = async {
            let command = self
                .config
                .command
                .as_ref()
                .ok_or(AdapterError::BackendNotConfigured("FTP"))?;
            run_helper(
                &self.tools,
                command,
                vec!["absent".to_string(), username.to_string()],
                "ftp_absent_failed",
            )
            .await?;
            Ok(Applied::new(
                format!("removed ftp account '{username}'"),
                serde_json::json!({ "username": username }),
            ))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterLogEntry, AdapterLogSink};
    use std::os::unix::fs::PermissionsExt;
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
    async fn helper_command_receives_verb_protocol() {
        // Fake helper that appends its argv to a file.
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("calls.log");
        let helper = dir.path().join("npanel-ftp-helper");
        std::fs::write(
            &helper,
            format!("#!/bin/sh\necho \"$@\" >> {}\n", log_path.display()),
        )
        .unwrap();
        std::fs::set_permissions(&helper, std::fs::Permissions::from_mode(0o755)).unwrap();

        let sink = Arc::new(RecordingSink {
            entries: Mutex::new(Vec::new()),
        });
        let ctx = AdapterContext::new(false, None, sink.clone());
        let adapter = ShellFtpAdapter::new(
            Arc::new(ToolResolver::with_fallback_dirs(vec![dir.path().to_path_buf()])),
            FtpConfig {
                command: Some(vec!["npanel-ftp-helper".to_string()]),
            },
        );

        let spec = FtpAccountSpec {
            username: "u_shop".into(),
            password: "pw".into(),
            home_directory: "/home/u_shop".into(),
        };
        let outcome = adapter.ensure_present(&ctx, &spec).await.unwrap();
        assert!(outcome.rollback.is_some());
        adapter.ensure_absent(&ctx, "u_shop").await.unwrap();

        let calls = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = calls.lines().collect();
        assert_eq!(lines[0], "present u_shop /home/u_shop pw");
        assert_eq!(lines[1], "absent u_shop");

        let entries = sink.entries.lock().await;
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.success));
    }
}
