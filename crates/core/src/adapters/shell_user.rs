//! System user adapter backed by the shadow-utils commands.
//!
//! Existence is probed with `id -u`; creation uses `useradd -m`, suspension
//! locks the account with `usermod -L`, and removal runs `userdel -r`.

use std::sync::Arc;

use async_trait::async_trait;

use super::shell_common::{dry_run, finish, Applied};
use super::{
    rollback, AdapterContext, AdapterError, AdapterOutcome, OperationKind, TargetKind,
    UserAdapter, UserSpec,
};
use crate::exec::run_tool;
use crate::tools::ToolResolver;

pub struct ShellUserAdapter {
    tools: Arc<ToolResolver>,
}

impl ShellUserAdapter {
    pub fn new(tools: Arc<ToolResolver>) -> Self {
        Self { tools }
    }

    async fn user_exists(&self, username: &str) -> Result<bool, AdapterError> {
        let id = self.tools.resolve("id").await?;
        let result = run_tool(&id.path, &["-u".to_string(), username.to_string()], None).await?;
        Ok(result.ok())
    }

    async fn run_checked(
        &self,
        tool: &str,
        args: Vec<String>,
        operation: &str,
    ) -> Result<(), AdapterError> {
        let resolved = self.tools.resolve(tool).await?;
        let result = run_tool(&resolved.path, &args, None).await?;
        if !result.ok() {
            return Err(AdapterError::command_failed(operation, &result));
        }
        Ok(())
    }
}

#[async_trait]
impl UserAdapter for ShellUserAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &UserSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::SystemUser;
        const OP: OperationKind = OperationKind::Create;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, &spec.username).await;
        }

        let inner = async {
            if self.user_exists(&spec.username).await? {
                return Ok(Applied::new(
                    format!("system user '{}' already present", spec.username),
                    serde_json::json!({ "username": spec.username, "created": false }),
                ));
            }

            let mut args = vec![
                "-m".to_string(),
                "-d".to_string(),
                spec.home_directory.clone(),
            ];
            if let Some(group) = &spec.primary_group {
                args.push("-g".to_string());
                args.push(group.clone());
            }
            if let Some(shell) = &spec.shell {
                args.push("-s".to_string());
                args.push(shell.clone());
            }
            args.push(spec.username.clone());
            self.run_checked("useradd", args, "useradd_failed").await?;

            let tools = self.tools.clone();
            let username = spec.username.clone();
            let undo = rollback(async move {
                if let Err(err) = remove_user(&tools, &username).await {
                    tracing::warn!(%username, error = %err, "user rollback failed");
                }
            });

            Ok(Applied::new(
                format!("created system user '{}'", spec.username),
                serde_json::json!({
                    "username": spec.username,
                    "home_directory": spec.home_directory,
                    "created": true,
                }),
            )
            .with_rollback(undo))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }

    async fn ensure_suspended(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::SystemUser;
        const OP: OperationKind = OperationKind::Suspend;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, username).await;
        }

        let inner = async {
            self.run_checked(
                "usermod",
                vec!["-L".to_string(), username.to_string()],
                "usermod_lock_failed",
            )
            .await?;
            Ok(Applied::new(
                format!("locked system user '{username}'"),
                serde_json::json!({ "username": username }),
            ))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }

    async fn ensure_resumed(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::SystemUser;
        const OP: OperationKind = OperationKind::Resume;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, username).await;
        }

        let inner = async {
            self.run_checked(
                "usermod",
                vec!["-U".to_string(), username.to_string()],
                "usermod_unlock_failed",
            )
            .await?;
            Ok(Applied::new(
                format!("unlocked system user '{username}'"),
                serde_json::json!({ "username": username }),
            ))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        username: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::SystemUser;
        const OP: OperationKind = OperationKind::Delete;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, username).await;
        }

        let inner = async {
            if !self.user_exists(username).await? {
                return Ok(Applied::new(
                    format!("system user '{username}' already absent"),
                    serde_json::json!({ "username": username, "removed": false }),
                ));
            }
            remove_user(&self.tools, username).await?;
            Ok(Applied::new(
                format!("removed system user '{username}'"),
                serde_json::json!({ "username": username, "removed": true }),
            ))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }
}

async fn remove_user(tools: &ToolResolver, username: &str) -> Result<(), AdapterError> {
    let userdel = tools.resolve("userdel").await?;
    let result = run_tool(
        &userdel.path,
        &["-r".to_string(), username.to_string()],
        None,
    )
    .await?;
    if !result.ok() {
        return Err(AdapterError::command_failed("userdel_failed", &result));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterLogEntry, AdapterLogSink};
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
    async fn dry_run_logs_but_does_not_touch_the_system() {
        let sink = Arc::new(RecordingSink {
            entries: Mutex::new(Vec::new()),
        });
        let ctx = AdapterContext::new(true, None, sink.clone());
        let adapter = ShellUserAdapter::new(Arc::new(ToolResolver::with_fallback_dirs(vec![])));
        let spec = UserSpec {
            username: "u_shop".into(),
            home_directory: "/home/u_shop".into(),
            primary_group: None,
            shell: None,
            quota_mb: None,
        };

        let outcome = adapter.ensure_present(&ctx, &spec).await.unwrap();
        assert!(outcome.rollback.is_none());

        let entries = sink.entries.lock().await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].success);
        assert!(entries[0].dry_run);
        assert_eq!(entries[0].details["subject"], "u_shop");
    }
}
