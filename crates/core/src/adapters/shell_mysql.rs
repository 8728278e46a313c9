//! MySQL account adapter driving the `mysql` client.
//!
//! Statements are built from identifiers that pass a strict
//! `[A-Za-z0-9_]+` gate and passwords drawn from the panel's quote-free
//! alphabet, so no SQL escaping layer is needed. The client is expected to
//! authenticate via option files (`~/.my.cnf`) or socket auth; extra client
//! arguments come from configuration.

use std::sync::Arc;

use async_trait::async_trait;

use super::shell_common::{dry_run, finish, Applied};
use super::shell_web::env_command;
use super::{
    rollback, AdapterContext, AdapterError, AdapterOutcome, MysqlAccountSpec, MysqlAdapter,
    OperationKind, TargetKind,
};
use crate::exec::{run_tool, ExecResult};
use crate::naming::is_safe_sql_identifier;
use crate::tools::{ResolveOptions, ToolResolver};

/// MySQL adapter configuration.
#[derive(Debug, Clone)]
pub struct MysqlConfig {
    /// Client binary name or path (default `mysql`).
    pub command: String,
    /// Extra client arguments prepended to every invocation.
    pub base_args: Vec<String>,
}

impl MysqlConfig {
    /// Load from environment variables.
    ///
    /// | Env Var            | Default  |
    /// |--------------------|----------|
    /// | `NPANEL_MYSQL_CMD` | `mysql`  |
    /// | `NPANEL_MYSQL_ARGS`| (none)   |
    pub fn from_env() -> Self {
        Self {
            command: std::env::var("NPANEL_MYSQL_CMD").unwrap_or_else(|_| "mysql".to_string()),
            base_args: env_command("NPANEL_MYSQL_ARGS", &[]),
        }
    }
}

pub struct ShellMysqlAdapter {
    tools: Arc<ToolResolver>,
    config: MysqlConfig,
}

impl ShellMysqlAdapter {
    pub fn new(tools: Arc<ToolResolver>, config: MysqlConfig) -> Self {
        Self { tools, config }
    }

    async fn exec_sql(&self, sql: &str, operation: &str) -> Result<ExecResult, AdapterError> {
        exec_sql(&self.tools, &self.config, sql, operation).await
    }
}

async fn exec_sql(
    tools: &ToolResolver,
    config: &MysqlConfig,
    sql: &str,
    operation: &str,
) -> Result<ExecResult, AdapterError> {
    let resolved = tools
        .resolve_with(
            &config.command,
            ResolveOptions {
                refresh: false,
                package_hint: Some("mysql or mariadb client".to_string()),
            },
        )
        .await?;
    let mut args = config.base_args.clone();
    args.push("-e".to_string());
    args.push(sql.to_string());
    let result = run_tool(&resolved.path, &args, None).await?;
    if !result.ok() {
        return Err(AdapterError::command_failed(operation, &result));
    }
    Ok(result)
}

fn checked_identifier(what: &'static str, value: &str) -> Result<(), AdapterError> {
    if is_safe_sql_identifier(value) {
        Ok(())
    } else {
        Err(AdapterError::UnsafeIdentifier {
            what,
            value: value.to_string(),
        })
    }
}

fn checked_password(value: &str) -> Result<(), AdapterError> {
    if value.is_empty() || value.contains('\'') || value.contains('\\') {
        return Err(AdapterError::UnsafeIdentifier {
            what: "mysql password",
            value: "(redacted)".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl MysqlAdapter for ShellMysqlAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &MysqlAccountSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::MysqlAccount;
        const OP: OperationKind = OperationKind::Create;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, &spec.username).await;
        }

        let inner = async {
            checked_identifier("mysql username", &spec.username)?;
            checked_password(&spec.password)?;
            for db in &spec.databases {
                checked_identifier("database name", db)?;
            }
            let ident = format!("'{}'@'%'", spec.username);

            self.exec_sql(
                &format!(
                    "CREATE USER IF NOT EXISTS {ident} IDENTIFIED BY '{}'",
                    spec.password
                ),
                "mysql_create_user_failed",
            )
            .await?;

            // Re-applies the password on repeat runs. Older servers reject
            // the plain form, so fall back to mysql_native_password.
            let alter = self
                .exec_sql(
                    &format!("ALTER USER {ident} IDENTIFIED BY '{}'", spec.password),
                    "mysql_alter_user_failed",
                )
                .await;
            if alter.is_err() {
                self.exec_sql(
                    &format!(
                        "ALTER USER {ident} IDENTIFIED WITH mysql_native_password BY '{}'",
                        spec.password
                    ),
                    "mysql_alter_user_failed",
                )
                .await?;
            }

            for db in &spec.databases {
                self.exec_sql(
                    &format!("CREATE DATABASE IF NOT EXISTS `{db}`"),
                    "mysql_create_database_failed",
                )
                .await?;
                self.exec_sql(
                    &format!("GRANT ALL PRIVILEGES ON `{db}`.* TO {ident}"),
                    "mysql_grant_failed",
                )
                .await?;
            }

            self.exec_sql("FLUSH PRIVILEGES", "mysql_flush_privileges_failed")
                .await?;

            let tools = self.tools.clone();
            let config = self.config.clone();
            let username = spec.username.clone();
            let undo = rollback(async move {
                let drop_sql = format!("DROP USER IF EXISTS '{username}'@'%'");
                if let Err(err) = exec_sql(&tools, &config, &drop_sql, "mysql_drop_user_failed").await
                {
                    tracing::warn!(%username, error = %err, "mysql rollback failed");
                }
                let _ = exec_sql(&tools, &config, "FLUSH PRIVILEGES", "mysql_flush_privileges_failed")
                    .await;
            });

            Ok(Applied::new(
                format!("ensured mysql account '{}'", spec.username),
                serde_json::json!({
                    "username": spec.username,
                    "databases": spec.databases,
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
        const TARGET: TargetKind = TargetKind::MysqlAccount;
        const OP: OperationKind = OperationKind::Delete;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, username).await;
        }

        let inner = async {
            checked_identifier("mysql username", username)?;

            // Databases owned by the account share its name prefix.
            let listing = self
                .exec_sql(
                    &format!("SHOW DATABASES LIKE '{username}\\_%'"),
                    "mysql_list_databases_failed",
                )
                .await?;
            // First line of client output is the column header.
            let databases: Vec<String> = listing
                .stdout
                .lines()
                .skip(1)
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();

            for db in &databases {
                checked_identifier("database name", db)?;
                self.exec_sql(
                    &format!("DROP DATABASE IF EXISTS `{db}`"),
                    "mysql_drop_database_failed",
                )
                .await?;
            }

            self.exec_sql(
                &format!("DROP USER IF EXISTS '{username}'@'%'"),
                "mysql_drop_user_failed",
            )
            .await?;
            self.exec_sql("FLUSH PRIVILEGES", "mysql_flush_privileges_failed")
                .await?;

            Ok(Applied::new(
                format!("removed mysql account '{username}'"),
                serde_json::json!({ "username": username, "dropped_databases": databases }),
            ))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_gate_rejects_injection() {
        assert!(checked_identifier("mysql username", "u_shop_db").is_ok());
        assert!(checked_identifier("mysql username", "x'; DROP TABLE").is_err());
    }

    #[test]
    fn password_gate_rejects_quotes_and_empty() {
        assert!(checked_password("Abc123!@#").is_ok());
        assert!(checked_password("pa'ss").is_err());
        assert!(checked_password("pa\\ss").is_err());
        assert!(checked_password("").is_err());
    }
}
