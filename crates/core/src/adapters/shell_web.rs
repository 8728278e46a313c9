//! Web vhost adapter for nginx-style configuration layouts.
//!
//! Renders a server block per domain into an available-sites directory,
//! activates it via symlink, validates the configuration, then reloads the
//! server. Suspension deactivates the symlink while keeping the rendered
//! block in place for resume.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::shell_common::{dry_run, finish, Applied};
use super::{
    rollback, AdapterContext, AdapterError, AdapterOutcome, OperationKind, TargetKind,
    WebServerAdapter, WebVhostSpec,
};
use crate::exec::run_tool;
use crate::naming::{php_pool_socket, safe_domain_name};
use crate::tools::ToolResolver;

/// Web server adapter configuration.
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Directory holding rendered vhost files (default
    /// `/etc/nginx/sites-available`).
    pub available_root: PathBuf,
    /// Directory of active vhost symlinks (default
    /// `/etc/nginx/sites-enabled`).
    pub enabled_root: PathBuf,
    /// Configuration test command (default `nginx -t`).
    pub test_command: Vec<String>,
    /// Reload command (default `nginx -s reload`).
    pub reload_command: Vec<String>,
}

impl WebServerConfig {
    /// Load from environment variables.
    ///
    /// | Env Var                        | Default                       |
    /// |--------------------------------|-------------------------------|
    /// | `NPANEL_WEB_VHOST_ROOT`        | `/etc/nginx/sites-available`  |
    /// | `NPANEL_WEB_VHOST_ENABLED_ROOT`| `/etc/nginx/sites-enabled`    |
    /// | `NPANEL_WEB_TEST_CMD`          | `nginx -t`                    |
    /// | `NPANEL_WEB_RELOAD_CMD`        | `nginx -s reload`             |
    pub fn from_env() -> Self {
        Self {
            available_root: env_path("NPANEL_WEB_VHOST_ROOT", "/etc/nginx/sites-available"),
            enabled_root: env_path("NPANEL_WEB_VHOST_ENABLED_ROOT", "/etc/nginx/sites-enabled"),
            test_command: env_command("NPANEL_WEB_TEST_CMD", &["nginx", "-t"]),
            reload_command: env_command("NPANEL_WEB_RELOAD_CMD", &["nginx", "-s", "reload"]),
        }
    }
}

pub(crate) fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var).unwrap_or_else(|_| default.to_string()).into()
}

pub(crate) fn env_command(var: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.split_whitespace().map(str::to_string).collect()
        }
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Render the active server block for a vhost.
pub fn render_vhost(spec: &WebVhostSpec) -> String {
    let mut block = format!(
        "server {{\n    listen 80;\n    listen [::]:80;\n    server_name {};\n    root {};\n    index index.html index.php;\n\n    location / {{\n        try_files $uri $uri/ =404;\n    }}\n",
        spec.domain, spec.document_root
    );
    if let Some(pool) = &spec.php_fpm_pool {
        block.push_str(&format!(
            "\n    location ~ \\.php$ {{\n        include fastcgi_params;\n        fastcgi_param SCRIPT_FILENAME $document_root$fastcgi_script_name;\n        fastcgi_pass unix:{};\n    }}\n",
            php_pool_socket(pool)
        ));
    }
    block.push_str("}\n");
    block
}

pub struct ShellWebServerAdapter {
    tools: Arc<ToolResolver>,
    config: WebServerConfig,
}

impl ShellWebServerAdapter {
    pub fn new(tools: Arc<ToolResolver>, config: WebServerConfig) -> Self {
        Self { tools, config }
    }

    fn paths_for(&self, domain: &str) -> Result<(PathBuf, PathBuf), AdapterError> {
        let safe = safe_domain_name(domain);
        if safe.is_empty() {
            return Err(AdapterError::UnsafeIdentifier {
                what: "domain",
                value: domain.to_string(),
            });
        }
        let file = format!("{safe}.conf");
        Ok((
            self.config.available_root.join(&file),
            self.config.enabled_root.join(&file),
        ))
    }

    async fn write_vhost(&self, conf: &Path, contents: &str) -> Result<(), AdapterError> {
        tokio::fs::write(conf, contents).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(conf, std::fs::Permissions::from_mode(0o640)).await?;
        }
        Ok(())
    }

    async fn activate(&self, conf: &Path, link: &Path) -> Result<(), AdapterError> {
        match tokio::fs::remove_file(link).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::symlink(conf, link).await?;
        Ok(())
    }

    async fn run_command(&self, command: &[String], operation: &str) -> Result<(), AdapterError> {
        run_web_command(&self.tools, command, operation).await
    }

    async fn test_and_reload(&self) -> Result<(), AdapterError> {
        self.run_command(&self.config.test_command, "web_config_test_failed")
            .await?;
        self.run_command(&self.config.reload_command, "web_reload_failed")
            .await
    }

    async fn apply(
        &self,
        ctx: &AdapterContext,
        spec: &WebVhostSpec,
        operation: OperationKind,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::WebVhost;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, operation, &spec.domain).await;
        }

        let inner = async {
            let (conf, link) = self.paths_for(&spec.domain)?;
            self.write_vhost(&conf, &render_vhost(spec)).await?;
            self.activate(&conf, &link).await?;
            self.test_and_reload().await?;

            let mut applied = Applied::new(
                format!("applied web vhost for '{}'", spec.domain),
                serde_json::json!({
                    "domain": spec.domain,
                    "document_root": spec.document_root,
                    "config_path": conf.display().to_string(),
                }),
            );
            if operation == OperationKind::Create {
                let tools = self.tools.clone();
                let reload = self.config.reload_command.clone();
                let domain = spec.domain.clone();
                applied = applied.with_rollback(rollback(async move {
                    let _ = tokio::fs::remove_file(&link).await;
                    let _ = tokio::fs::remove_file(&conf).await;
                    if let Err(err) =
                        run_web_command(&tools, &reload, "web_reload_failed").await
                    {
                        tracing::warn!(%domain, error = %err, "web vhost rollback reload failed");
                    }
                }));
            }
            Ok(applied)
        };
        finish(ctx, TARGET, operation, inner.await).await
    }
}

async fn run_web_command(
    tools: &ToolResolver,
    command: &[String],
    operation: &str,
) -> Result<(), AdapterError> {
    let (program, args) = command.split_first().ok_or(AdapterError::UnsafeIdentifier {
        what: "web command",
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
impl WebServerAdapter for ShellWebServerAdapter {
    async fn ensure_present(
        &self,
        ctx: &AdapterContext,
        spec: &WebVhostSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        self.apply(ctx, spec, OperationKind::Create).await
    }

    async fn ensure_suspended(
        &self,
        ctx: &AdapterContext,
        domain: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::WebVhost;
        const OP: OperationKind = OperationKind::Suspend;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, domain).await;
        }

        let inner = async {
            let (_, link) = self.paths_for(domain)?;
            let removed = match tokio::fs::remove_file(&link).await {
                Ok(()) => true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                Err(e) => return Err(e.into()),
            };
            if removed {
                self.run_command(&self.config.reload_command, "web_reload_failed")
                    .await?;
            }
            Ok(Applied::new(
                format!("suspended web vhost for '{domain}'"),
                serde_json::json!({ "domain": domain, "deactivated": removed }),
            ))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }

    async fn ensure_resumed(
        &self,
        ctx: &AdapterContext,
        spec: &WebVhostSpec,
    ) -> Result<AdapterOutcome, AdapterError> {
        self.apply(ctx, spec, OperationKind::Resume).await
    }

    async fn ensure_absent(
        &self,
        ctx: &AdapterContext,
        domain: &str,
    ) -> Result<AdapterOutcome, AdapterError> {
        const TARGET: TargetKind = TargetKind::WebVhost;
        const OP: OperationKind = OperationKind::Delete;
        if ctx.dry_run {
            return dry_run(ctx, TARGET, OP, domain).await;
        }

        let inner = async {
            let (conf, link) = self.paths_for(domain)?;
            let mut removed = false;
            for path in [&link, &conf] {
                match tokio::fs::remove_file(path).await {
                    Ok(()) => removed = true,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            if removed {
                self.run_command(&self.config.reload_command, "web_reload_failed")
                    .await?;
            }
            Ok(Applied::new(
                format!("removed web vhost for '{domain}'"),
                serde_json::json!({ "domain": domain, "removed": removed }),
            ))
        };
        finish(ctx, TARGET, OP, inner.await).await
    }
}
