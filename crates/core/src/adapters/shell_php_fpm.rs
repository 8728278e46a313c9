//! PHP-FPM pool adapter.
//!
//! Renders a pool ini per service into the pool directory, validates with
//! `php-fpm -t`, and reloads the service manager unit.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::shell_common::{dry_run, finish, Applied};
use super::shell_web::{env_command, env_path};
use super::{
    rollback, AdapterContext, AdapterError, AdapterOutcome, OperationKind, PhpFpmAdapter,
    PhpFpmPoolSpec, TargetKind,
};
use crate::exec::run_tool;
use crate::naming::safe_pool_name;
use crate::tools::ToolResolver;

/// PHP-FPM adapter configuration.
#[derive(Debug, Clone)]
pub struct PhpFpmConfig {
    /// Directory holding pool ini files (default `/etc/php-fpm.d`).
    pub pool_root: PathBuf,
    /// Configuration test command (default `php-fpm -t`).
    pub test_command: Vec<String>,
    /// Reload command (default `systemctl reload php-fpm`).
    pub reload_command: Vec<String>,
}

impl PhpFpmConfig {
    /// Load from environment variables.
    ///
    /// | Env Var                   | Default                     |
    /// |---------------------------|-----------------------------|
    /// | `NPANEL_PHP_FPM_POOL_ROOT`| `/etc/php-fpm.d`            |
    /// | `NPANEL_PHP_FPM_TEST_CMD` | `php-fpm -t`                |
    /// | `NPANEL_PHP_FPM_RELOAD_CMD`| `systemctl reload php-fpm` |
    pub fn from_env() -> Self {
        Self {
            pool_root: env_path("NPANEL_PHP_FPM_POOL_ROOT", "/etc/php-fpm.d"),
            test_command: env_command("NPANEL_PHP_FPM_TEST_CMD", &["php-fpm", "-t"]),
            reload_command: env_command(
                "NPANEL_PHP_FPM_RELOAD_CMD",
                &["systemctl", "reload", "php-fpm"],
            ),
        }
    }
}

/// Render the pool ini for a spec.
pub fn render_pool(spec: &PhpFpmPoolSpec) -> String {
    format!(
        "[{name}]\nuser = {user}\ngroup = {group}\nlisten = {listen}\nlisten.owner = {user}\nlisten.group = {group}\npm = ondemand\npm.max_children = 5\npm.process_idle_timeout = 10s\npm.max_requests = 200\nchdir = /\n",
        name = spec.name,
        user = spec.user,
        group = spec.group,
        listen = spec.listen,
    )
}

pub struct ShellPhpFpmAdapter {
    tools: Arc<ToolResolver>,
    config: PhpFpmConfig,
}

impl ShellPhpFpmAdapter {
    pub fn new(tools: Arc<ToolResolver>, config: PhpFpmConfig) -> Self {
        Self { tools, config }
    }

    fn pool_path(&self, name: &str) -> Result<PathBuf, AdapterError> {
        let safe = safe_pool_name(name);
        if safe.is_empty() {
            return Err(AdapterError::UnsafeIdentifier {
                what: "pool name",
                value: name.to_string(),
            });
        }
        Ok(self.config.pool_root.join(format!("{safe}.conf")))
    }

    async fn run_command(&self, command: &[String], operation: &str) -> Result<(), AdapterError> {
        run_pool_command(&self.tools, command, operation).await
    }
}

async fn run_pool_command(
    tools: &ToolResolver,
    command: &[String],
    operation: &str,
) -> Result<(), AdapterError> {
    let (program, args) = command.split_first().ok_or(AdapterError::UnsafeIdentifier {
        what: "php-fpm command",
        value: String::new(),
    })?;
    let resolved = tools.resolve(program).await?;
    let result = run_tool(&resolved.path, args, None).await?;
    if !result.ok() {
        return Err(AdapterError::command_failed(operation, &result));
    }
    Ok(())
}

#[async_trait]
impl PhpFpmAdapter for ShellPhpFpmAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &PhpFpmPoolSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::PhpFpmPool;
        const OP: OperationKind = OperationKind::Create;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, &spec.name).await;
        }

        let inner = async {
            let path = self.pool_path(&spec.name)?;
            tokio::fs::write(&path, render_pool(spec)).await?;
            self.run_command(&self.config.test_command, "php_fpm_config_test_failed")
                .await?;
            self.run_command(&self.config.reload_command, "php_fpm_reload_failed")
                .await?;

            let tools = self.tools.clone();
            let reload = self.config.reload_command.clone();
            let pool = spec.name.clone();
            let undo_path = path.clone();
            let undo = rollback(async move {
                let _ = tokio::fs::remove_file(&undo_path).await;
                if let Err(err) = run_pool_command(&tools, &reload, "php_fpm_reload_failed").await
                {
                    tracing::warn!(%pool, error = %err, "php-fpm pool rollback reload failed");
                }
            });

            Ok(Applied::new(
                format!("applied php-fpm pool '{}'", spec.name),
                serde_json::json!({
                    "pool": spec.name,
                    "listen": spec.listen,
                    "php_version": spec.php_version,
                    "config_path": path.display().to_string(),
                }),
            )
            .with_rollback(undo))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        pool_name: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::PhpFpmPool;
        const OP: OperationKind = OperationKind::Delete;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, pool_name).await;
        }

        let inner = async {
            let path = self.pool_path(pool_name)?;
            let removed = match tokio::fs::remove_file(&path).await {
                Ok(()) => true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                Err(e) => return Err(e.into()),
            };
            if removed {
                self.run_command(&self.config.reload_command, "php_fpm_reload_failed")
                    .await?;
            }
            Ok(Applied::new(
                format!("removed php-fpm pool '{pool_name}'"),
                serde_json::json!({ "pool": pool_name, "removed": removed }),
            ))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_pool_has_ondemand_defaults() {
        let spec = PhpFpmPoolSpec {
            name: "u_shop".into(),
            user: "u_shop".into(),
            group: "u_shop".into(),
            listen: "/run/php-fpm-u_shop.sock".into(),
            php_version: "8.2".into(),
        };
        let ini = render_pool(&spec);
        assert!(ini.starts_with("[u_shop]\n"));
        assert!(ini.contains("listen = /run/php-fpm-u_shop.sock"));
        assert!(ini.contains("pm = ondemand"));
        assert!(ini.contains("pm.max_children = 5"));
    }

    #[test]
    fn pool_path_rejects_empty_sanitized_name() {
        let adapter = ShellPhpFpmAdapter::new(
            Arc::new(ToolResolver::with_fallback_dirs(vec![])),
            PhpFpmConfig {
                pool_root: "/tmp/pools".into(),
                test_command: vec!["php-fpm".into(), "-t".into()],
                reload_command: vec!["systemctl".into(), "reload".into(), "php-fpm".into()],
            },
        );
        assert!(adapter.pool_path("///").is_err());
        assert_eq!(
            adapter.pool_path("u_shop").unwrap(),
            PathBuf::from("/tmp/pools/u_shop.conf")
        );
    }
}
