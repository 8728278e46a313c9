//! Composition root: picks the adapter backend and assembles the
//! orchestrator and migration engine around shared repositories.

use std::sync::Arc;

use npanel_core::adapters::{
    shell_dns::{DnsConfig, ShellDnsAdapter},
    shell_ftp::{FtpConfig, ShellFtpAdapter},
    shell_mail::{MailConfig, ShellMailAdapter},
    shell_mysql::{MysqlConfig, ShellMysqlAdapter},
    shell_php_fpm::{PhpFpmConfig, ShellPhpFpmAdapter},
    shell_user::ShellUserAdapter,
    shell_web::{ShellWebServerAdapter, WebServerConfig},
};
use npanel_core::tools::ToolResolver;
use npanel_db::repositories::{
    AccountRepo, CustomerRepo, HostingLogRepo, JobRepo, MigrationLogRepo, PlanRepo, ServiceRepo,
    StepRepo,
};
use npanel_hosting::{AdapterSet, HostingConfig, HostingOrchestrator};
use npanel_migration::{MigrationConfig, MigrationEngine};

pub struct Runtime {
    pub orchestrator: Arc<HostingOrchestrator>,
    pub engine: Arc<MigrationEngine>,
}

/// Build the runtime from the environment. `NPANEL_HOSTING_BACKEND`
/// selects `noop` (default) or `shell`.
pub fn build() -> anyhow::Result<Runtime> {
    let backend =
        std::env::var("NPANEL_HOSTING_BACKEND").unwrap_or_else(|_| "noop".to_string());
    let tools = Arc::new(ToolResolver::new());

    let (adapters, required_tools, manage_document_root) = match backend.as_str() {
        "noop" => (AdapterSet::noop(), Vec::new(), false),
        "shell" => (
            shell_adapters(Arc::clone(&tools)),
            shell_required_tools(),
            true,
        ),
        other => anyhow::bail!("unknown hosting backend '{other}' (expected 'noop' or 'shell')"),
    };

    tracing::info!(backend = %backend, "hosting backend selected");

    let mut hosting_config = HostingConfig::from_env();
    hosting_config.required_tools = required_tools;
    hosting_config.manage_document_root = manage_document_root;

    let plans = Arc::new(PlanRepo::new());
    let orchestrator = Arc::new(HostingOrchestrator::new(
        adapters,
        Arc::clone(&tools),
        Arc::clone(&plans),
        Arc::new(ServiceRepo::new()),
        Arc::new(HostingLogRepo::new()),
        Arc::new(CustomerRepo::new()),
        hosting_config,
    ));

    let engine = Arc::new(MigrationEngine::new(
        Arc::new(JobRepo::new()),
        Arc::new(AccountRepo::new()),
        Arc::new(StepRepo::new()),
        Arc::new(MigrationLogRepo::new()),
        plans,
        Arc::clone(&orchestrator),
        tools,
        MigrationConfig::from_env(),
    ));

    Ok(Runtime {
        orchestrator,
        engine,
    })
}

fn shell_adapters(tools: Arc<ToolResolver>) -> AdapterSet {
    AdapterSet {
        user: Arc::new(ShellUserAdapter::new(Arc::clone(&tools))),
        web: Arc::new(ShellWebServerAdapter::new(
            Arc::clone(&tools),
            WebServerConfig::from_env(),
        )),
        php: Arc::new(ShellPhpFpmAdapter::new(
            Arc::clone(&tools),
            PhpFpmConfig::from_env(),
        )),
        mysql: Arc::new(ShellMysqlAdapter::new(
            Arc::clone(&tools),
            MysqlConfig::from_env(),
        )),
        dns: Arc::new(ShellDnsAdapter::new(
            Arc::clone(&tools),
            DnsConfig::from_env(),
        )),
        mail: Arc::new(ShellMailAdapter::new(
            Arc::clone(&tools),
            MailConfig::from_env(),
        )),
        ftp: Arc::new(ShellFtpAdapter::new(tools, FtpConfig::from_env())),
    }
}

/// Tools the shell backend needs before provisioning may start. The DNS
/// entry depends on the configured backend.
fn shell_required_tools() -> Vec<String> {
    let mut required: Vec<String> = [
        "id", "useradd", "usermod", "userdel", "nginx", "php-fpm", "mysql",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    match std::env::var("NPANEL_DNS_BACKEND").as_deref() {
        Ok("bind") => required.push("rndc".to_string()),
        Ok("powerdns") => required.push("pdnsutil".to_string()),
        _ => {}
    }
    required
}
