//! The hosting lifecycle orchestrator.
//!
//! Holds the state machine for hosting services:
//!
//! ```text
//! provisioning ──provision──▶ active ◀──suspend/unsuspend──▶ suspended
//!      │ failure                 │
//!      ▼                        prepare (any non-terminated status)
//!    error ──provision──▶        ▼
//!                        termination_pending ──confirm(token)──▶ terminated
//!                                │ cancel
//!                                ▼
//!                              active
//! ```
//!
//! Provisioning runs the adapters in a fixed order (user, PHP pool, web
//! vhost, MySQL, DNS, mailbox, FTP). Each successful mutating call may
//! register a rollback; on failure the stack is unwound in reverse and the
//! service lands in `error`, from which `provision` may be re-run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use npanel_core::adapters::{
    noop, AdapterContext, AdapterError, AdapterLogEntry, AdapterLogSink, DnsAdapter,
    DnsRecordSpec, DnsZoneSpec, FtpAccountSpec, FtpAdapter, MailAdapter, MailboxSpec,
    MysqlAccountSpec, MysqlAdapter, PhpFpmAdapter, PhpFpmPoolSpec, Rollback, TargetKind,
    UserAdapter, UserSpec, WebServerAdapter, WebVhostSpec,
};
use npanel_core::types::{EntityId, Timestamp};
use npanel_core::{credentials, naming, redact::redact_sensitive, tools::ToolResolver};
use npanel_db::models::{Customer, HostingLogEntry, HostingPlan, HostingService, ServiceStatus};
use npanel_db::repositories::{CustomerRepo, HostingLogRepo, PlanRepo, ServiceRepo};

use crate::error::HostingError;

/// PHP versions the PHP-FPM integration supports.
pub const SUPPORTED_PHP_VERSIONS: &[&str] = &["7.4", "8.0", "8.1", "8.2", "8.3"];

/// Name of the plan seeded on an empty plan repository.
pub const DEFAULT_PLAN_NAME: &str = "basic";

/// Lifetime of a termination confirmation token.
pub const TERMINATION_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);

/// Mailbox quota assigned to the default mailbox at provisioning.
const DEFAULT_MAILBOX_QUOTA_MB: i64 = 1024;

/// One adapter per capability. The orchestrator only sees the traits;
/// whether these are inert or shell-driving is decided at composition.
#[derive(Clone)]
pub struct AdapterSet {
    pub user: Arc<dyn UserAdapter>,
    pub web: Arc<dyn WebServerAdapter>,
    pub php: Arc<dyn PhpFpmAdapter>,
    pub mysql: Arc<dyn MysqlAdapter>,
    pub dns: Arc<dyn DnsAdapter>,
    pub mail: Arc<dyn MailAdapter>,
    pub ftp: Arc<dyn FtpAdapter>,
}

impl AdapterSet {
    /// Full set of inert adapters.
    pub fn noop() -> Self {
        Self {
            user: Arc::new(noop::NoopUserAdapter),
            web: Arc::new(noop::NoopWebServerAdapter),
            php: Arc::new(noop::NoopPhpFpmAdapter),
            mysql: Arc::new(noop::NoopMysqlAdapter),
            dns: Arc::new(noop::NoopDnsAdapter),
            mail: Arc::new(noop::NoopMailAdapter),
            ftp: Arc::new(noop::NoopFtpAdapter),
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct HostingConfig {
    /// Thread dry-run through every adapter context
    /// (`NPANEL_HOSTING_DRY_RUN=1`).
    pub dry_run: bool,
    /// IPv4 address for default zone records
    /// (`NPANEL_HOSTING_DEFAULT_IPV4`, default `127.0.0.1`).
    pub default_ipv4: String,
    /// Tools that must resolve before provisioning may start. Populated by
    /// the composition root to match the adapter backend in use.
    pub required_tools: Vec<String>,
    /// Create `{home}/public_html` during provisioning. Enabled for the
    /// shell backend only; inert deployments must not touch the
    /// filesystem.
    pub manage_document_root: bool,
}

impl HostingConfig {
    /// Load the environment-driven parts.
    ///
    /// | Env Var                      | Default     |
    /// |------------------------------|-------------|
    /// | `NPANEL_HOSTING_DRY_RUN`     | `0`         |
    /// | `NPANEL_HOSTING_DEFAULT_IPV4`| `127.0.0.1` |
    pub fn from_env() -> Self {
        Self {
            dry_run: std::env::var("NPANEL_HOSTING_DRY_RUN").is_ok_and(|v| v == "1"),
            default_ipv4: std::env::var("NPANEL_HOSTING_DEFAULT_IPV4")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            required_tools: Vec::new(),
            manage_document_root: false,
        }
    }
}

/// Input for plan creation.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewPlan {
    pub name: String,
    pub disk_quota_mb: i64,
    pub max_databases: i64,
    pub max_mailboxes: i64,
    pub max_ftp_accounts: i64,
    pub memory_mb: i64,
    pub php_version: String,
}

/// Owner of a new service: an existing customer id, or an identity that
/// is resolved by email and created when no customer carries it yet.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(untagged)]
pub enum CustomerRef {
    Existing { customer_id: EntityId },
    Identity { name: String, email: String },
}

/// Input for service creation.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateService {
    pub customer: CustomerRef,
    pub plan_id: EntityId,
    pub primary_domain: String,
    /// Run provisioning immediately after creating the record.
    pub auto_provision: bool,
}

/// Secrets generated during a provisioning run. Returned exactly once;
/// nothing here is persisted.
#[derive(Debug, Clone)]
pub struct ProvisionedCredentials {
    pub mysql_username: String,
    pub mysql_password: String,
    pub mailbox_address: String,
    pub mailbox_password: String,
    pub ftp_username: String,
    pub ftp_password: String,
}

/// Token handed to the caller by `terminate_prepare`.
#[derive(Debug, Clone)]
pub struct TerminationTicket {
    pub token: String,
    pub expires_at: Timestamp,
}

/// Sink that persists adapter log entries against a service, with secret
/// redaction.
struct ServiceLogSink {
    logs: Arc<HostingLogRepo>,
    service_id: EntityId,
}

#[async_trait]
impl AdapterLogSink for ServiceLogSink {
    async fn record(&self, entry: AdapterLogEntry) {
        self.logs
            .append(HostingLogEntry {
                id: uuid::Uuid::new_v4(),
                service_id: self.service_id,
                event: "adapter_operation".to_string(),
                target: Some(entry.target.as_str().to_string()),
                operation: Some(entry.operation.as_str().to_string()),
                success: entry.success,
                dry_run: entry.dry_run,
                message: entry.message,
                details: redact_sensitive(&entry.details),
                created_at: entry.at,
            })
            .await;
    }
}

/// Build the default record set for a freshly provisioned zone: apex A,
/// MX to the zone itself, and a permissive-ish SPF TXT.
pub fn default_dns_records(domain: &str, ipv4: &str) -> Vec<DnsRecordSpec> {
    vec![
        DnsRecordSpec {
            name: "@".to_string(),
            record_type: "A".to_string(),
            data: ipv4.to_string(),
        },
        DnsRecordSpec {
            name: "@".to_string(),
            record_type: "MX".to_string(),
            data: format!("10 {domain}."),
        },
        DnsRecordSpec {
            name: "@".to_string(),
            record_type: "TXT".to_string(),
            data: "\"v=spf1 mx ~all\"".to_string(),
        },
    ]
}

pub struct HostingOrchestrator {
    adapters: AdapterSet,
    tools: Arc<ToolResolver>,
    plans: Arc<PlanRepo>,
    services: Arc<ServiceRepo>,
    logs: Arc<HostingLogRepo>,
    customers: Arc<CustomerRepo>,
    config: HostingConfig,
}

/// Run one provisioning step; on failure unwind and bail out of the
/// enclosing function.
macro_rules! provision_step {
    ($self:ident, $service:expr, $rollbacks:ident, $target:expr, $call:expr) => {
        match $call.await {
            Ok(outcome) => {
                if let Some(rb) = outcome.rollback {
                    $rollbacks.push(rb);
                }
            }
            Err(err) => {
                return $self
                    .fail_provision($service, $rollbacks, $target, err)
                    .await;
            }
        }
    };
}

impl HostingOrchestrator {
    pub fn new(
        adapters: AdapterSet,
        tools: Arc<ToolResolver>,
        plans: Arc<PlanRepo>,
        services: Arc<ServiceRepo>,
        logs: Arc<HostingLogRepo>,
        customers: Arc<CustomerRepo>,
        config: HostingConfig,
    ) -> Self {
        Self {
            adapters,
            tools,
            plans,
            services,
            logs,
            customers,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Plans
    // -----------------------------------------------------------------------

    /// Seed the `basic` plan when the repository is empty.
    pub async fn ensure_default_plan(&self) -> HostingPlan {
        if let Some(existing) = self.plans.find_by_name(DEFAULT_PLAN_NAME).await {
            return existing;
        }
        if self.plans.count().await > 0 {
            // Non-empty repository without `basic`: the operator curated
            // their own plans, leave them alone.
            if let Some(first) = self.plans.list().await.into_iter().next() {
                return first;
            }
        }
        self.plans
            .save(HostingPlan {
                id: uuid::Uuid::new_v4(),
                name: DEFAULT_PLAN_NAME.to_string(),
                disk_quota_mb: 5120,
                max_databases: 3,
                max_mailboxes: 5,
                max_ftp_accounts: 1,
                memory_mb: 1024,
                php_version: "8.2".to_string(),
                created_at: chrono::Utc::now(),
            })
            .await
    }

    pub async fn create_plan(&self, input: NewPlan) -> Result<HostingPlan, HostingError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(HostingError::validation("plan name must not be empty"));
        }
        if self.plans.find_by_name(&name).await.is_some() {
            return Err(HostingError::conflict(format!(
                "a plan named '{name}' already exists"
            )));
        }
        if input.disk_quota_mb <= 0 {
            return Err(HostingError::validation("disk quota must be positive"));
        }
        if input.max_databases < 0 || input.max_mailboxes < 0 || input.max_ftp_accounts < 0 {
            return Err(HostingError::validation("limits must not be negative"));
        }
        if !SUPPORTED_PHP_VERSIONS.contains(&input.php_version.as_str()) {
            return Err(HostingError::validation(format!(
                "unsupported PHP version '{}'",
                input.php_version
            )));
        }
        Ok(self
            .plans
            .save(HostingPlan {
                id: uuid::Uuid::new_v4(),
                name,
                disk_quota_mb: input.disk_quota_mb,
                max_databases: input.max_databases,
                max_mailboxes: input.max_mailboxes,
                max_ftp_accounts: input.max_ftp_accounts,
                memory_mb: input.memory_mb,
                php_version: input.php_version,
                created_at: chrono::Utc::now(),
            })
            .await)
    }

    /// Delete a plan. Rejected while any non-terminated service uses it.
    pub async fn delete_plan(&self, plan_id: EntityId) -> Result<(), HostingError> {
        if self.plans.find(plan_id).await.is_none() {
            return Err(HostingError::NotFound { entity: "plan" });
        }
        let in_use = self.services.count_live_on_plan(plan_id).await;
        if in_use > 0 {
            return Err(HostingError::conflict(format!(
                "plan is in use by {in_use} service(s)"
            )));
        }
        self.plans.delete(plan_id).await;
        Ok(())
    }

    pub async fn list_plans(&self) -> Vec<HostingPlan> {
        self.plans.list().await
    }

    // -----------------------------------------------------------------------
    // Service creation
    // -----------------------------------------------------------------------

    pub async fn create_service(
        &self,
        input: CreateService,
    ) -> Result<(HostingService, Option<ProvisionedCredentials>), HostingError> {
        let customer = self.resolve_customer(&input.customer).await?;
        if self.plans.find(input.plan_id).await.is_none() {
            return Err(HostingError::NotFound { entity: "plan" });
        }

        let domain = normalize_domain(&input.primary_domain)?;
        if self.services.find_live_by_domain(&domain).await.is_some() {
            return Err(HostingError::conflict(format!(
                "domain '{domain}' already has a service"
            )));
        }

        let username = naming::derive_system_username(&domain);
        if self.services.find_live_by_username(&username).await.is_some() {
            return Err(HostingError::conflict(format!(
                "domain '{domain}' derives system username '{username}', which is taken"
            )));
        }

        let now = chrono::Utc::now();
        let service = self
            .services
            .save(HostingService {
                id: uuid::Uuid::new_v4(),
                customer_id: customer.id,
                plan_id: input.plan_id,
                primary_domain: domain.clone(),
                system_username: username.clone(),
                status: ServiceStatus::Provisioning,
                termination_token: None,
                termination_expires_at: None,
                metadata: serde_json::json!({}),
                created_at: now,
                updated_at: now,
            })
            .await;

        self.log_event(
            service.id,
            "service_created",
            true,
            format!("created service for '{domain}'"),
            serde_json::json!({ "domain": domain, "system_username": username }),
        )
        .await;

        let credentials = if input.auto_provision {
            self.provision(service.id).await?
        } else {
            None
        };
        let service = self
            .services
            .find(service.id)
            .await
            .ok_or(HostingError::NotFound { entity: "service" })?;
        Ok((service, credentials))
    }

    /// Resolve the owning customer: an id must already exist, an identity
    /// is matched by email (case-insensitive) and created when absent.
    async fn resolve_customer(&self, owner: &CustomerRef) -> Result<Customer, HostingError> {
        match owner {
            CustomerRef::Existing { customer_id } => self
                .customers
                .find(*customer_id)
                .await
                .ok_or(HostingError::NotFound { entity: "customer" }),
            CustomerRef::Identity { name, email } => {
                let email = email.trim().to_lowercase();
                if email.is_empty() || !email.contains('@') {
                    return Err(HostingError::validation(format!(
                        "'{email}' is not a valid customer email"
                    )));
                }
                if let Some(existing) = self.customers.find_by_email(&email).await {
                    return Ok(existing);
                }
                Ok(self
                    .customers
                    .save(Customer::new(name.trim(), email))
                    .await)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Provisioning
    // -----------------------------------------------------------------------

    /// Converge a service onto its plan.
    ///
    /// No-op when already `active`. Allowed from `provisioning` and
    /// `error`; every adapter operation is an idempotent ensure, so a
    /// re-run after failure converges instead of duplicating.
    pub async fn provision(
        &self,
        service_id: EntityId,
    ) -> Result<Option<ProvisionedCredentials>, HostingError> {
        let service = self
            .services
            .find(service_id)
            .await
            .ok_or(HostingError::NotFound { entity: "service" })?;

        match service.status {
            ServiceStatus::Active => return Ok(None),
            ServiceStatus::Provisioning | ServiceStatus::Error => {}
            other => {
                return Err(HostingError::validation(format!(
                    "cannot provision a service in status '{}'",
                    other.as_str()
                )));
            }
        }

        let plan = self
            .plans
            .find(service.plan_id)
            .await
            .ok_or(HostingError::NotFound { entity: "plan" })?;
        if !SUPPORTED_PHP_VERSIONS.contains(&plan.php_version.as_str()) {
            return Err(HostingError::validation(format!(
                "plan requires unsupported PHP version '{}'",
                plan.php_version
            )));
        }
        // Provisioning always creates one mailbox and one FTP account, so
        // the plan must allow at least one of each.
        if plan.disk_quota_mb <= 0 {
            return Err(HostingError::validation(format!(
                "plan '{}' has no disk quota",
                plan.name
            )));
        }
        if plan.max_mailboxes < 1 || plan.max_ftp_accounts < 1 {
            return Err(HostingError::validation(format!(
                "plan '{}' must allow at least one mailbox and one FTP account",
                plan.name
            )));
        }

        self.check_tool_readiness().await?;

        let username = service.system_username.clone();
        let domain = service.primary_domain.clone();
        let home = naming::home_directory(&username);
        let docroot = naming::document_root(&username);

        let creds = ProvisionedCredentials {
            mysql_username: naming::mysql_username(&username),
            mysql_password: credentials::generate_password(),
            mailbox_address: format!("admin@{domain}"),
            mailbox_password: credentials::generate_password(),
            ftp_username: username.clone(),
            ftp_password: credentials::generate_password(),
        };

        let ctx = self.adapter_context(service.id);
        let mut rollbacks: Vec<Rollback> = Vec::new();

        provision_step!(
            self,
            &service,
            rollbacks,
            TargetKind::SystemUser,
            self.adapters.user.ensure_present(
                &ctx,
                &UserSpec {
                    username: username.clone(),
                    home_directory: home.clone(),
                    primary_group: None,
                    shell: None,
                    quota_mb: Some(plan.disk_quota_mb),
                },
            )
        );

        provision_step!(
            self,
            &service,
            rollbacks,
            TargetKind::PhpFpmPool,
            self.adapters.php.ensure_present(
                &ctx,
                &PhpFpmPoolSpec {
                    name: naming::php_pool_name(&username),
                    user: username.clone(),
                    group: username.clone(),
                    listen: naming::php_pool_socket(&username),
                    php_version: plan.php_version.clone(),
                },
            )
        );

        if self.config.manage_document_root && !self.config.dry_run {
            if let Err(err) = create_document_root(&docroot).await {
                return self
                    .fail_provision(&service, rollbacks, TargetKind::WebVhost, err.into())
                    .await;
            }
        }

        provision_step!(
            self,
            &service,
            rollbacks,
            TargetKind::WebVhost,
            self.adapters.web.ensure_present(
                &ctx,
                &WebVhostSpec {
                    domain: domain.clone(),
                    document_root: docroot.clone(),
                    php_fpm_pool: Some(naming::php_pool_name(&username)),
                    ssl_certificate_id: None,
                },
            )
        );

        provision_step!(
            self,
            &service,
            rollbacks,
            TargetKind::MysqlAccount,
            self.adapters.mysql.ensure_present(
                &ctx,
                &MysqlAccountSpec {
                    username: creds.mysql_username.clone(),
                    password: creds.mysql_password.clone(),
                    databases: Vec::new(),
                },
            )
        );

        provision_step!(
            self,
            &service,
            rollbacks,
            TargetKind::DnsZone,
            self.adapters.dns.ensure_present(
                &ctx,
                &DnsZoneSpec {
                    zone_name: domain.clone(),
                    records: default_dns_records(&domain, &self.config.default_ipv4),
                },
            )
        );

        provision_step!(
            self,
            &service,
            rollbacks,
            TargetKind::Mailbox,
            self.adapters.mail.ensure_present(
                &ctx,
                &MailboxSpec {
                    address: creds.mailbox_address.clone(),
                    password: creds.mailbox_password.clone(),
                    quota_mb: Some(DEFAULT_MAILBOX_QUOTA_MB),
                },
            )
        );

        provision_step!(
            self,
            &service,
            rollbacks,
            TargetKind::FtpAccount,
            self.adapters.ftp.ensure_present(
                &ctx,
                &FtpAccountSpec {
                    username: creds.ftp_username.clone(),
                    password: creds.ftp_password.clone(),
                    home_directory: home.clone(),
                },
            )
        );

        self.set_status(service.id, ServiceStatus::Active).await?;
        tracing::info!(service_id = %service.id, domain = %domain, "provisioning completed");
        self.log_event(
            service.id,
            "provision_completed",
            true,
            format!("service for '{domain}' is active"),
            serde_json::json!({ "dry_run": self.config.dry_run }),
        )
        .await;

        Ok(Some(creds))
    }

    /// Unwind this run's rollbacks (reverse order), mark the service
    /// `error`, and surface the failure.
    async fn fail_provision(
        &self,
        service: &HostingService,
        mut rollbacks: Vec<Rollback>,
        target: TargetKind,
        err: AdapterError,
    ) -> Result<Option<ProvisionedCredentials>, HostingError> {
        let undone = rollbacks.len();
        tracing::warn!(
            service_id = %service.id,
            target = target.as_str(),
            error = %err,
            rolled_back_steps = undone,
            "provisioning failed, unwinding"
        );
        while let Some(rb) = rollbacks.pop() {
            // Rollbacks swallow their own errors; a failed rollback never
            // aborts the rest of the sequence.
            rb.await;
        }

        self.log_event(
            service.id,
            "provision_failed",
            false,
            format!("provisioning failed at {}: {err}", target.as_str()),
            serde_json::json!({
                "target": target.as_str(),
                "rolled_back_steps": undone,
            }),
        )
        .await;

        self.set_status(service.id, ServiceStatus::Error).await?;
        Err(err.into())
    }

    async fn check_tool_readiness(&self) -> Result<(), HostingError> {
        let mut missing = Vec::new();
        for tool in &self.config.required_tools {
            let status = self.tools.status(tool).await;
            if !status.found {
                missing.push(tool.clone());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(HostingError::MissingTools { missing })
        }
    }

    // -----------------------------------------------------------------------
    // Suspension
    // -----------------------------------------------------------------------

    /// Suspend an active service. No-op in any other status.
    pub async fn suspend(&self, service_id: EntityId) -> Result<(), HostingError> {
        let service = self
            .services
            .find(service_id)
            .await
            .ok_or(HostingError::NotFound { entity: "service" })?;
        if service.status != ServiceStatus::Active {
            return Ok(());
        }

        let ctx = self.adapter_context(service.id);
        self.adapters
            .user
            .ensure_suspended(&ctx, &service.system_username)
            .await?;
        self.adapters
            .web
            .ensure_suspended(&ctx, &service.primary_domain)
            .await?;

        self.set_status(service.id, ServiceStatus::Suspended).await?;
        self.log_event(
            service.id,
            "service_suspended",
            true,
            format!("suspended service for '{}'", service.primary_domain),
            serde_json::Value::Null,
        )
        .await;
        Ok(())
    }

    /// Resume a suspended service. No-op in any other status.
    pub async fn unsuspend(&self, service_id: EntityId) -> Result<(), HostingError> {
        let service = self
            .services
            .find(service_id)
            .await
            .ok_or(HostingError::NotFound { entity: "service" })?;
        if service.status != ServiceStatus::Suspended {
            return Ok(());
        }

        let ctx = self.adapter_context(service.id);
        self.adapters
            .user
            .ensure_resumed(&ctx, &service.system_username)
            .await?;
        self.adapters
            .web
            .ensure_resumed(
                &ctx,
                &WebVhostSpec {
                    domain: service.primary_domain.clone(),
                    document_root: naming::document_root(&service.system_username),
                    php_fpm_pool: Some(naming::php_pool_name(&service.system_username)),
                    ssl_certificate_id: None,
                },
            )
            .await?;

        self.set_status(service.id, ServiceStatus::Active).await?;
        self.log_event(
            service.id,
            "service_unsuspended",
            true,
            format!("resumed service for '{}'", service.primary_domain),
            serde_json::Value::Null,
        )
        .await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Termination (two-phase)
    // -----------------------------------------------------------------------

    /// One-step termination is never allowed; teardown destroys data and
    /// must be confirmed with a prepared token.
    pub async fn terminate(&self, _service_id: EntityId) -> Result<(), HostingError> {
        Err(HostingError::DirectTerminateRejected)
    }

    /// Stage a termination: issue a short-lived confirmation token and move
    /// the service to `termination_pending`.
    pub async fn terminate_prepare(
        &self,
        service_id: EntityId,
    ) -> Result<TerminationTicket, HostingError> {
        let mut service = self
            .services
            .find(service_id)
            .await
            .ok_or(HostingError::NotFound { entity: "service" })?;
        if service.status == ServiceStatus::Terminated {
            return Err(HostingError::validation("service is already terminated"));
        }

        let token = credentials::generate_token();
        let expires_at = chrono::Utc::now()
            + chrono::Duration::from_std(TERMINATION_TOKEN_TTL)
                .unwrap_or_else(|_| chrono::Duration::minutes(10));

        service.termination_token = Some(token.clone());
        service.termination_expires_at = Some(expires_at);
        service.status = ServiceStatus::TerminationPending;
        service.updated_at = chrono::Utc::now();
        self.services.save(service).await;

        self.log_event(
            service_id,
            "termination_prepared",
            true,
            "termination staged; awaiting confirmation".to_string(),
            serde_json::json!({ "expires_at": expires_at.to_rfc3339() }),
        )
        .await;

        Ok(TerminationTicket { token, expires_at })
    }

    /// Confirm a staged termination and tear the service down.
    ///
    /// Teardown runs the capabilities in reverse: web, PHP pool, MySQL,
    /// DNS, mailbox, FTP, and the system user last.
    pub async fn terminate_confirm(
        &self,
        service_id: EntityId,
        token: &str,
    ) -> Result<(), HostingError> {
        let service = self
            .services
            .find(service_id)
            .await
            .ok_or(HostingError::NotFound { entity: "service" })?;

        let stored = match (&service.status, &service.termination_token) {
            (ServiceStatus::TerminationPending, Some(stored)) => stored,
            _ => return Err(HostingError::TerminationNotPrepared),
        };
        if stored != token {
            return Err(HostingError::TerminationTokenMismatch);
        }
        match service.termination_expires_at {
            Some(expires) if chrono::Utc::now() <= expires => {}
            _ => return Err(HostingError::TerminationTokenExpired),
        }

        let ctx = self.adapter_context(service.id);
        let username = &service.system_username;
        let domain = &service.primary_domain;

        // Teardown is the reverse of provisioning; stop at the first
        // failure and leave the service in `error` for operator attention.
        for target in [
            TargetKind::WebVhost,
            TargetKind::PhpFpmPool,
            TargetKind::MysqlAccount,
            TargetKind::DnsZone,
            TargetKind::Mailbox,
            TargetKind::FtpAccount,
            TargetKind::SystemUser,
        ] {
            let result = match target {
                TargetKind::WebVhost => self.adapters.web.ensure_absent(&ctx, domain).await,
                TargetKind::PhpFpmPool => {
                    self.adapters
                        .php
                        .ensure_absent(&ctx, &naming::php_pool_name(username))
                        .await
                }
                TargetKind::MysqlAccount => {
                    self.adapters
                        .mysql
                        .ensure_absent(&ctx, &naming::mysql_username(username))
                        .await
                }
                TargetKind::DnsZone => self.adapters.dns.ensure_absent(&ctx, domain).await,
                TargetKind::Mailbox => {
                    self.adapters
                        .mail
                        .ensure_absent(&ctx, &format!("admin@{domain}"))
                        .await
                }
                TargetKind::FtpAccount => self.adapters.ftp.ensure_absent(&ctx, username).await,
                TargetKind::SystemUser => self.adapters.user.ensure_absent(&ctx, username).await,
            };
            if let Err(err) = result {
                self.log_event(
                    service.id,
                    "teardown_failed",
                    false,
                    format!("teardown failed at {}: {err}", target.as_str()),
                    serde_json::json!({ "target": target.as_str() }),
                )
                .await;
                self.set_status(service.id, ServiceStatus::Error).await?;
                return Err(err.into());
            }
        }

        let mut service = self
            .services
            .find(service_id)
            .await
            .ok_or(HostingError::NotFound { entity: "service" })?;
        service.termination_token = None;
        service.termination_expires_at = None;
        service.status = ServiceStatus::Terminated;
        service.updated_at = chrono::Utc::now();
        self.services.save(service).await;

        tracing::info!(service_id = %service_id, domain = %domain, "service terminated");
        self.log_event(
            service_id,
            "service_terminated",
            true,
            format!("terminated service for '{domain}'"),
            serde_json::Value::Null,
        )
        .await;
        Ok(())
    }

    /// Abort a staged termination. No-op unless pending.
    pub async fn terminate_cancel(&self, service_id: EntityId) -> Result<(), HostingError> {
        let mut service = self
            .services
            .find(service_id)
            .await
            .ok_or(HostingError::NotFound { entity: "service" })?;
        if service.status != ServiceStatus::TerminationPending {
            return Ok(());
        }

        service.termination_token = None;
        service.termination_expires_at = None;
        service.status = ServiceStatus::Active;
        service.updated_at = chrono::Utc::now();
        self.services.save(service).await;

        self.log_event(
            service_id,
            "termination_cancelled",
            true,
            "staged termination cancelled".to_string(),
            serde_json::Value::Null,
        )
        .await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub async fn get_service(&self, service_id: EntityId) -> Result<HostingService, HostingError> {
        self.services
            .find(service_id)
            .await
            .ok_or(HostingError::NotFound { entity: "service" })
    }

    pub async fn list_services(&self) -> Vec<HostingService> {
        self.services.list().await
    }

    pub async fn logs_for_service(&self, service_id: EntityId) -> Vec<HostingLogEntry> {
        self.logs.list_for_service(service_id).await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn adapter_context(&self, service_id: EntityId) -> AdapterContext {
        AdapterContext::new(
            self.config.dry_run,
            Some(service_id),
            Arc::new(ServiceLogSink {
                logs: self.logs.clone(),
                service_id,
            }),
        )
    }

    async fn set_status(
        &self,
        service_id: EntityId,
        status: ServiceStatus,
    ) -> Result<(), HostingError> {
        let mut service = self
            .services
            .find(service_id)
            .await
            .ok_or(HostingError::NotFound { entity: "service" })?;
        service.status = status;
        service.updated_at = chrono::Utc::now();
        self.services.save(service).await;
        Ok(())
    }

    async fn log_event(
        &self,
        service_id: EntityId,
        event: &str,
        success: bool,
        message: String,
        details: serde_json::Value,
    ) {
        self.logs
            .append(HostingLogEntry {
                id: uuid::Uuid::new_v4(),
                service_id,
                event: event.to_string(),
                target: None,
                operation: None,
                success,
                dry_run: self.config.dry_run,
                message,
                details: redact_sensitive(&details),
                created_at: chrono::Utc::now(),
            })
            .await;
    }
}

/// Create `{home}/public_html` with group access but no world access.
async fn create_document_root(path: &str) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::create_dir_all(path).await?;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o750)).await
}

/// Normalize and validate a primary domain.
fn normalize_domain(raw: &str) -> Result<String, HostingError> {
    let domain = raw.trim().to_lowercase();
    if domain.is_empty() {
        return Err(HostingError::validation("domain must not be empty"));
    }
    if !domain.contains('.') {
        return Err(HostingError::validation(format!(
            "'{domain}' is not a fully qualified domain"
        )));
    }
    let valid = domain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-');
    if !valid || domain.starts_with(['.', '-']) || domain.ends_with(['.', '-']) {
        return Err(HostingError::validation(format!(
            "'{domain}' contains invalid characters"
        )));
    }
    Ok(domain)
}
