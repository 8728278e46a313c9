//! Mailbox adapter delegating to an operator-configured helper command.
//!
//! The panel does not ship a mail server integration; instead the operator
//! points `NPANEL_MAIL_CMD` at a script that understands a small verb
//! protocol:
//!
//! ```text
//! <cmd> present <address> <quota_mb> <password>
//! <cmd> absent <address>
//! ```
//!
//! An unset command is a loggable failure, keeping mail optional until the
//! deployment wires it up.

use std::sync::Arc;

use async_trait::async_trait;

use super::shell_common::{dry_run, finish, Applied};
use super::{
    rollback, AdapterContext, AdapterError, AdapterOutcome, MailAdapter, MailboxSpec,
    OperationKind, TargetKind,
};
use crate::exec::run_tool;
use crate::tools::ToolResolver;

/// Mail adapter configuration.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Helper command with any leading arguments, from `NPANEL_MAIL_CMD`.
    pub command: Option<Vec<String>>,
}

impl MailConfig {
    pub fn from_env() -> Self {
        Self {
            command: optional_command("NPANEL_MAIL_CMD"),
        }
    }
}

pub(crate) fn optional_command(var: &str) -> Option<Vec<String>> {
    std::env::var(var)
        .ok()
        .map(|raw| raw.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|parts: &Vec<String>| !parts.is_empty())
}

pub struct ShellMailAdapter {
    tools: Arc<ToolResolver>,
    config: MailConfig,
}

impl ShellMailAdapter {
    pub fn new(tools: Arc<ToolResolver>, config: MailConfig) -> Self {
        Self { tools, config }
    }
}

pub(crate) async fn run_helper(
    tools: &ToolResolver,
    command: &[String],
    verb_args: Vec<String>,
    operation: &str,
) -> Result<(), AdapterError> {
    let (program, base_args) = command.split_first().ok_or(AdapterError::UnsafeIdentifier {
        what: "helper command",
        value: String::new(),
    })?;
    let resolved = tools.resolve(program).await?;
    let mut args = base_args.to_vec();
    args.extend(verb_args);
    let result = run_tool(&resolved.path, &args, None).await?;
    if !result.ok() {
        return Err(AdapterError::command_failed(operation, &result));
    }
    Ok(())
}

#[async_trait]
impl MailAdapter for ShellMailAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &MailboxSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::Mailbox;
        const OP: OperationKind = OperationKind::Create;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, &spec.address).await;
        }

        let inner = async {
            let command = self
                .config
                .command
                .as_ref()
                .ok_or(AdapterError::BackendNotConfigured("mail"))?;
            run_helper(
                &self.tools,
                command,
                vec![
                    "present".to_string(),
                    spec.address.clone(),
                    spec.quota_mb.unwrap_or(0).to_string(),
                    spec.password.clone(),
                ],
                "mail_present_failed",
            )
            .await?;

            let tools = self.tools.clone();
            let command = command.clone();
            let address = spec.address.clone();
            let undo = rollback(async move {
                let args = vec!["absent".to_string(), address.clone()];
                if let Err(err) = run_helper(&tools, &command, args, "mail_absent_failed").await {
                    tracing::warn!(%address, error = %err, "mailbox rollback failed");
                }
            });

            Ok(Applied::new(
                format!("ensured mailbox '{}'", spec.address),
                serde_json::json!({ "address": spec.address, "quota_mb": spec.quota_mb }),
            )
            .with_rollback(undo))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        address: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::Mailbox;
        const OP: OperationKind = OperationKind::Delete;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, address).await;
        }

        let inner = async {
            let command = self
                .config
                .command
                .as_ref()
                .ok_or(AdapterError::BackendNotConfigured("mail"))?;
            run_helper(
                &self.tools,
                command,
                vec!["absent".to_string(), address.to_string()],
                "mail_absent_failed",
            )
            .await?;
            Ok(Applied::new(
                format!("removed mailbox '{address}'"),
                serde_json::json!({ "address": address }),
            ))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterLogEntry, AdapterLogSink};
    use assert_matches::assert_matches;
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
    async fn unconfigured_command_is_a_logged_failure() {
        let sink = Arc::new(RecordingSink {
            entries: Mutex::new(Vec::new()),
        });
        let ctx = AdapterContext::new(false, None, sink.clone());
        let adapter = ShellMailAdapter::new(
            Arc::new(ToolResolver::with_fallback_dirs(vec![])),
            MailConfig { command: None },
        );

        let err = adapter.ensure_absent(&ctx, "a@example.com").await.unwrap_err();
        assert_matches!(err, AdapterError::BackendNotConfigured("mail"));
        let entries = sink.entries.lock().await;
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
    }
}
