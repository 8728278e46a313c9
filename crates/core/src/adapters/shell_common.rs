//! Shared plumbing for the shell-driving adapters.
//!
//! Keeps the one-log-entry-per-call discipline in a single place: each
//! operation runs an inner routine producing either a success payload or an
//! [`AdapterError`], and [`finish`] turns that into exactly one log entry
//! plus the returned outcome.

use super::{
    AdapterContext, AdapterError, AdapterOutcome, OperationKind, Rollback, TargetKind,
};

/// Success payload of a shell operation before logging.
pub(crate) struct Applied {
    pub message: String,
    pub details: serde_json::Value,
    pub rollback: Option<Rollback>,
}

impl Applied {
    pub fn new(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            message: message.into(),
            details,
            rollback: None,
        }
    }

    pub fn with_rollback(mut self, action: Rollback) -> Self {
        self.rollback = Some(action);
        self
    }
}

/// Log the single entry for this call and convert to the adapter result.
pub(crate) async fn finish(
    ctx: &AdapterContext,
    target: TargetKind,
    operation: OperationKind,
    result: Result<Applied, AdapterError>,
) -> Result<AdapterOutcome, AdapterError> {
    match result {
        Ok(applied) => {
            ctx.log_success(target, operation, applied.message, applied.details.clone())
                .await;
            let mut outcome = AdapterOutcome::with_details(applied.details);
            outcome.rollback = applied.rollback;
            Ok(outcome)
        }
        Err(err) => {
            ctx.log_failure(target, operation, err.to_string(), error_details(&err))
                .await;
            Err(err)
        }
    }
}

/// Log a dry-run entry and return the inert outcome.
pub(crate) async fn dry_run(
    ctx: &AdapterContext,
    target: TargetKind,
    operation: OperationKind,
    subject: &str,
) -> Result<AdapterOutcome, AdapterError> {
    ctx.log_success(
        target,
        operation,
        format!(
            "dry run: would {} {} '{subject}'",
            operation.as_str(),
            target.as_str()
        ),
        serde_json::json!({ "subject": subject }),
    )
    .await;
    Ok(AdapterOutcome::empty())
}

/// Structured context for a failure log entry.
pub(crate) fn error_details(err: &AdapterError) -> serde_json::Value {
    match err {
        AdapterError::CommandFailed {
            operation,
            code,
            stdout,
            stderr,
        } => serde_json::json!({
            "error": operation,
            "exit_code": code,
            "stdout": stdout,
            "stderr": stderr,
        }),
        AdapterError::ToolNotFound(inner) => serde_json::json!({
            "error": "tool_not_found",
            "tool": inner.tool,
            "methods_tried": inner.methods_tried,
            "package_hint": inner.package_hint,
        }),
        other => serde_json::json!({ "error": other.to_string() }),
    }
}
