//! Job planning and pull-based step execution.

use std::sync::Arc;
use std::time::Duration;

use npanel_core::exec::run_tool;
use npanel_core::hashing::sha256_hex;
use npanel_core::naming;
use npanel_core::redact::redact_sensitive;
use npanel_core::tools::{ResolveOptions, ToolResolver};
use npanel_core::types::EntityId;
use npanel_db::models::{
    AccountLimits, MigrationAccount, MigrationJob, MigrationJobStatus, MigrationLogEntry,
    MigrationStep, StepError, StepName, StepStatus,
};
use npanel_db::repositories::{AccountRepo, JobRepo, MigrationLogRepo, PlanRepo, StepRepo};
use npanel_hosting::{CreateService, CustomerRef, HostingOrchestrator, NewPlan};
use serde::Deserialize;

use crate::error::MigrationError;
use crate::rsync::{build_rsync_args, is_host_key_failure};
use crate::source::SourceHost;

/// The only source type the planner currently understands.
pub const SOURCE_TYPE_CPANEL_LIVE_SSH: &str = "cpanel_live_ssh";

/// Memory allowance for plans derived from imported limits; cPanel metadata
/// carries no memory figure.
const IMPORTED_PLAN_MEMORY_MB: i64 = 1024;

const RSYNC_TIMEOUT: Duration = Duration::from_secs(3600);
const MYSQL_TIMEOUT: Duration = Duration::from_secs(600);

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Where synced home directories land
    /// (`NPANEL_MIGRATION_TARGET_ROOT`, default `/srv/npanel/migrations`).
    pub target_root: String,
    /// Default home root on the source host
    /// (`NPANEL_MIGRATION_SOURCE_HOME_ROOT`, default `/home`).
    pub source_home_root: String,
    /// Force all imported accounts onto one named plan
    /// (`NPANEL_MIGRATION_PLAN`); otherwise a plan is derived per limits.
    pub plan_name_override: Option<String>,
    /// rsync binary (`NPANEL_RSYNC_CMD`); a path with a slash bypasses
    /// PATH lookup.
    pub rsync_command: String,
    /// mysql client (`NPANEL_MYSQL_CMD`) and extra connection arguments
    /// (`NPANEL_MYSQL_ARGS`).
    pub mysql_command: String,
    pub mysql_args: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            target_root: "/srv/npanel/migrations".to_string(),
            source_home_root: "/home".to_string(),
            plan_name_override: None,
            rsync_command: "rsync".to_string(),
            mysql_command: "mysql".to_string(),
            mysql_args: Vec::new(),
        }
    }
}

impl MigrationConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            target_root: std::env::var("NPANEL_MIGRATION_TARGET_ROOT")
                .unwrap_or(defaults.target_root),
            source_home_root: std::env::var("NPANEL_MIGRATION_SOURCE_HOME_ROOT")
                .unwrap_or(defaults.source_home_root),
            plan_name_override: std::env::var("NPANEL_MIGRATION_PLAN")
                .ok()
                .filter(|v| !v.is_empty()),
            rsync_command: std::env::var("NPANEL_RSYNC_CMD").unwrap_or(defaults.rsync_command),
            mysql_command: std::env::var("NPANEL_MYSQL_CMD").unwrap_or(defaults.mysql_command),
            mysql_args: std::env::var("NPANEL_MYSQL_ARGS")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

/// Input for job creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMigrationJob {
    pub name: String,
    pub source_type: String,
    pub source_config: serde_json::Value,
    #[serde(default)]
    pub dry_run: bool,
}

/// Input for adding a source account to a job.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMigrationAccount {
    pub source_username: String,
    pub source_primary_domain: String,
    pub target_customer_id: EntityId,
    #[serde(default)]
    pub limits: Option<AccountLimits>,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Name of the plan derived from a set of imported limits: a stable digest
/// so accounts with identical limits share one plan.
pub fn derived_plan_name(limits: &AccountLimits) -> String {
    let key = format!(
        "{}|{}|{}|{}|{}",
        limits.disk_quota_mb,
        limits.max_databases,
        limits.max_mailboxes,
        limits.max_ftp_accounts,
        limits.php_version
    );
    let digest = sha256_hex(key.as_bytes());
    format!("imported_{}", &digest[..16])
}

/// Derive a job's aggregate status from its steps.
pub fn aggregate_status(steps: &[MigrationStep]) -> MigrationJobStatus {
    if steps.is_empty() {
        return MigrationJobStatus::Pending;
    }
    let has = |status: StepStatus| steps.iter().any(|s| s.status == status);
    if has(StepStatus::Running) || has(StepStatus::Pending) {
        return MigrationJobStatus::Running;
    }
    // Skipped steps count as neither success nor failure.
    match (has(StepStatus::Failed), has(StepStatus::Completed)) {
        (true, true) => MigrationJobStatus::Partial,
        (true, false) => MigrationJobStatus::Failed,
        (false, _) => MigrationJobStatus::Completed,
    }
}

#[derive(Debug, Deserialize)]
struct DbDump {
    database: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct RsyncPayload {
    source_path: Option<String>,
    target_path: Option<String>,
}

pub struct MigrationEngine {
    jobs: Arc<JobRepo>,
    accounts: Arc<AccountRepo>,
    steps: Arc<StepRepo>,
    logs: Arc<MigrationLogRepo>,
    plans: Arc<PlanRepo>,
    orchestrator: Arc<HostingOrchestrator>,
    tools: Arc<ToolResolver>,
    config: MigrationConfig,
}

impl MigrationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<JobRepo>,
        accounts: Arc<AccountRepo>,
        steps: Arc<StepRepo>,
        logs: Arc<MigrationLogRepo>,
        plans: Arc<PlanRepo>,
        orchestrator: Arc<HostingOrchestrator>,
        tools: Arc<ToolResolver>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            jobs,
            accounts,
            steps,
            logs,
            plans,
            orchestrator,
            tools,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Job setup
    // -----------------------------------------------------------------------

    pub async fn create_job(&self, input: NewMigrationJob) -> Result<MigrationJob, MigrationError> {
        if input.name.trim().is_empty() {
            return Err(MigrationError::validation("job name must not be empty"));
        }
        if input.source_type.trim().is_empty() {
            return Err(MigrationError::validation("source type must not be empty"));
        }

        let now = chrono::Utc::now();
        let job = self
            .jobs
            .save(MigrationJob {
                id: uuid::Uuid::new_v4(),
                name: input.name.trim().to_string(),
                source_type: input.source_type,
                source_config: input.source_config,
                dry_run: input.dry_run,
                status: MigrationJobStatus::Pending,
                created_at: now,
                updated_at: now,
            })
            .await;

        self.log(
            job.id,
            "job_created",
            serde_json::json!({ "name": job.name, "source_type": job.source_type }),
        )
        .await;
        Ok(job)
    }

    pub async fn add_account(
        &self,
        job_id: EntityId,
        input: NewMigrationAccount,
    ) -> Result<MigrationAccount, MigrationError> {
        let job = self.find_job(job_id).await?;
        if self.steps.any_for_job(job.id).await {
            return Err(MigrationError::validation(
                "job is already planned; accounts can no longer be added",
            ));
        }
        if input.source_username.trim().is_empty() {
            return Err(MigrationError::validation("source username must not be empty"));
        }
        if input.source_primary_domain.trim().is_empty() {
            return Err(MigrationError::validation("primary domain must not be empty"));
        }

        let account = self
            .accounts
            .save(MigrationAccount {
                id: uuid::Uuid::new_v4(),
                job_id: job.id,
                source_username: input.source_username.trim().to_string(),
                source_primary_domain: input.source_primary_domain.trim().to_lowercase(),
                target_customer_id: input.target_customer_id,
                target_service_id: None,
                limits: input.limits,
                config: input.config,
                created_at: chrono::Utc::now(),
            })
            .await;

        self.log(
            job.id,
            "account_added",
            serde_json::json!({
                "source_username": account.source_username,
                "source_primary_domain": account.source_primary_domain,
            }),
        )
        .await;
        Ok(account)
    }

    /// Expand a job into its ordered steps. Idempotent: a job that already
    /// has steps keeps them unchanged.
    pub async fn plan_job(&self, job_id: EntityId) -> Result<Vec<MigrationStep>, MigrationError> {
        let job = self.find_job(job_id).await?;
        if job.source_type != SOURCE_TYPE_CPANEL_LIVE_SSH {
            return Err(MigrationError::UnsupportedSourceType(job.source_type));
        }
        if self.steps.any_for_job(job.id).await {
            return Ok(self.steps.list_for_job(job.id).await);
        }

        let source = SourceHost::from_config(&job.source_config)?;
        let home_root = source
            .cpanel_home_root
            .clone()
            .unwrap_or_else(|| self.config.source_home_root.clone());

        let mut position = 0i64;
        let mut planned = Vec::new();
        planned.push(self.new_step(job.id, None, StepName::ValidateSourceHost, &mut position, serde_json::Value::Null));

        for account in self.accounts.list_for_job(job.id).await {
            planned.push(self.new_step(
                job.id,
                Some(account.id),
                StepName::ProvisionTargetEnv,
                &mut position,
                serde_json::Value::Null,
            ));
            planned.push(self.new_step(
                job.id,
                Some(account.id),
                StepName::RsyncHomeDirectory,
                &mut position,
                serde_json::json!({
                    "source_path": format!("{home_root}/{}", account.source_username),
                    "target_path": format!(
                        "{}/{}/{}",
                        self.config.target_root, job.id, account.source_username
                    ),
                }),
            ));
            planned.push(self.new_step(
                job.id,
                Some(account.id),
                StepName::ImportDatabases,
                &mut position,
                serde_json::Value::Null,
            ));
        }

        for step in &planned {
            self.steps.save(step.clone()).await;
        }

        self.log(
            job.id,
            "steps_planned",
            serde_json::json!({
                "steps": planned.len(),
                "accounts": (planned.len() - 1) / 3,
            }),
        )
        .await;
        Ok(planned)
    }

    fn new_step(
        &self,
        job_id: EntityId,
        account_id: Option<EntityId>,
        name: StepName,
        position: &mut i64,
        payload: serde_json::Value,
    ) -> MigrationStep {
        let now = chrono::Utc::now();
        let step = MigrationStep {
            id: uuid::Uuid::new_v4(),
            job_id,
            account_id,
            name,
            status: StepStatus::Pending,
            payload,
            last_error: None,
            position: *position,
            created_at: now,
            updated_at: now,
        };
        *position += 1;
        step
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Execute the oldest pending step of a job, if any.
    ///
    /// Plans the job lazily on first call. Failed steps stay failed and are
    /// skipped; `Ok(None)` means the job has no runnable work left.
    pub async fn run_next_step(
        &self,
        job_id: EntityId,
    ) -> Result<Option<MigrationStep>, MigrationError> {
        let mut job = self.find_job(job_id).await?;
        if job.status.is_terminal() {
            return Ok(None);
        }

        if !self.steps.any_for_job(job.id).await {
            self.plan_job(job.id).await?;
        }

        let steps = self.steps.list_for_job(job.id).await;
        let Some(mut step) = steps
            .into_iter()
            .find(|s| s.status == StepStatus::Pending)
        else {
            self.refresh_job_status(job.id).await?;
            return Ok(None);
        };

        if job.status != MigrationJobStatus::Running {
            job.status = MigrationJobStatus::Running;
            job.updated_at = chrono::Utc::now();
            job = self.jobs.save(job).await;
        }

        step.status = StepStatus::Running;
        // A requeued step must not report its previous failure while running.
        step.last_error = None;
        step.updated_at = chrono::Utc::now();
        self.steps.save(step.clone()).await;
        self.log(
            job.id,
            "step_started",
            serde_json::json!({ "step": step.name.as_str(), "position": step.position }),
        )
        .await;

        match self.execute_step(&job, &step).await {
            Ok(context) => {
                step.status = StepStatus::Completed;
                step.last_error = None;
                self.log(
                    job.id,
                    "step_completed",
                    serde_json::json!({ "step": step.name.as_str(), "context": context }),
                )
                .await;
            }
            Err(err) => {
                tracing::warn!(
                    job_id = %job.id,
                    step = step.name.as_str(),
                    error = %err,
                    "migration step failed"
                );
                step.status = StepStatus::Failed;
                step.last_error = Some(StepError {
                    message: err.to_string(),
                    details: err.step_details(),
                });
                self.log(
                    job.id,
                    "step_failed",
                    serde_json::json!({
                        "step": step.name.as_str(),
                        "error": err.to_string(),
                        "details": err.step_details(),
                    }),
                )
                .await;
            }
        }

        step.updated_at = chrono::Utc::now();
        let step = self.steps.save(step).await;
        self.refresh_job_status(job.id).await?;
        Ok(Some(step))
    }

    /// Recompute and persist a job's aggregate status from its steps.
    pub async fn refresh_job_status(
        &self,
        job_id: EntityId,
    ) -> Result<MigrationJobStatus, MigrationError> {
        let steps = self.steps.list_for_job(job_id).await;
        let status = aggregate_status(&steps);

        let mut job = self.find_job(job_id).await?;
        if job.status != status {
            job.status = status;
            job.updated_at = chrono::Utc::now();
            self.jobs.save(job).await;
            self.log(job_id, "job_status_changed", serde_json::json!({ "status": status }))
                .await;
        }
        Ok(status)
    }

    async fn execute_step(
        &self,
        job: &MigrationJob,
        step: &MigrationStep,
    ) -> Result<serde_json::Value, MigrationError> {
        match step.name {
            StepName::ValidateSourceHost => self.validate_source_host(job).await,
            StepName::ProvisionTargetEnv => {
                let account = self.account_for(step).await?;
                self.provision_target_env(&account).await
            }
            StepName::RsyncHomeDirectory => {
                let account = self.account_for(step).await?;
                self.rsync_home_directory(job, &account, step).await
            }
            StepName::ImportDatabases => {
                let account = self.account_for(step).await?;
                self.import_databases(job, &account).await
            }
        }
    }

    async fn account_for(&self, step: &MigrationStep) -> Result<MigrationAccount, MigrationError> {
        let account_id = step.account_id.ok_or(MigrationError::NotFound {
            entity: "migration account",
        })?;
        self.accounts
            .find(account_id)
            .await
            .ok_or(MigrationError::NotFound {
                entity: "migration account",
            })
    }

    // -----------------------------------------------------------------------
    // Step handlers
    // -----------------------------------------------------------------------

    async fn validate_source_host(
        &self,
        job: &MigrationJob,
    ) -> Result<serde_json::Value, MigrationError> {
        let source = SourceHost::from_config(&job.source_config)?;

        // Transfers need both tools locally; surface that before any
        // account work starts.
        self.resolve_logged(job.id, &self.config.rsync_command, None)
            .await?;
        self.resolve_logged(job.id, "ssh", Some("openssh clients"))
            .await?;

        Ok(serde_json::json!({
            "host": source.host,
            "ssh_user": source.ssh_user,
            "ssh_port": source.ssh_port,
        }))
    }

    async fn provision_target_env(
        &self,
        account: &MigrationAccount,
    ) -> Result<serde_json::Value, MigrationError> {
        let limits = account.limits.clone().unwrap_or_default();
        let plan = self.plan_for_limits(&limits).await?;

        let service_id = match account.target_service_id {
            Some(id) => id,
            None => {
                let (service, _) = self
                    .orchestrator
                    .create_service(CreateService {
                        customer: CustomerRef::Existing {
                            customer_id: account.target_customer_id,
                        },
                        plan_id: plan.id,
                        primary_domain: account.source_primary_domain.clone(),
                        auto_provision: false,
                    })
                    .await?;
                let mut updated = account.clone();
                updated.target_service_id = Some(service.id);
                self.accounts.save(updated).await;
                service.id
            }
        };

        // Generated credentials are intentionally dropped here; imported
        // accounts get passwords reset through the panel afterwards.
        self.orchestrator.provision(service_id).await?;

        Ok(serde_json::json!({
            "service_id": service_id,
            "plan": plan.name,
        }))
    }

    async fn plan_for_limits(
        &self,
        limits: &AccountLimits,
    ) -> Result<npanel_db::models::HostingPlan, MigrationError> {
        let name = match &self.config.plan_name_override {
            Some(name) => name.clone(),
            None => derived_plan_name(limits),
        };
        if let Some(existing) = self.plans.find_by_name(&name).await {
            return Ok(existing);
        }
        let plan = self
            .orchestrator
            .create_plan(NewPlan {
                name,
                disk_quota_mb: limits.disk_quota_mb,
                max_databases: limits.max_databases,
                max_mailboxes: limits.max_mailboxes,
                max_ftp_accounts: limits.max_ftp_accounts,
                memory_mb: IMPORTED_PLAN_MEMORY_MB,
                php_version: limits.php_version.clone(),
            })
            .await?;
        Ok(plan)
    }

    async fn rsync_home_directory(
        &self,
        job: &MigrationJob,
        account: &MigrationAccount,
        step: &MigrationStep,
    ) -> Result<serde_json::Value, MigrationError> {
        let source = SourceHost::from_config(&job.source_config)?;

        let payload: RsyncPayload = serde_json::from_value(step.payload.clone())
            .unwrap_or(RsyncPayload {
                source_path: None,
                target_path: None,
            });
        let home_root = source
            .cpanel_home_root
            .clone()
            .unwrap_or_else(|| self.config.source_home_root.clone());
        let source_path = payload
            .source_path
            .unwrap_or_else(|| format!("{home_root}/{}", account.source_username));
        let target_path = payload.target_path.unwrap_or_else(|| {
            format!(
                "{}/{}/{}",
                self.config.target_root, job.id, account.source_username
            )
        });

        if !job.dry_run {
            tokio::fs::create_dir_all(&target_path).await?;
        }

        let rsync = self
            .resolve_logged(job.id, &self.config.rsync_command, None)
            .await?;
        let args = build_rsync_args(&source, &source_path, &target_path, job.dry_run);
        let result = run_tool(&rsync.path, &args, Some(RSYNC_TIMEOUT)).await?;

        if !result.ok() {
            if is_host_key_failure(&result.stderr) {
                self.log(
                    job.id,
                    "host_key_verification_failed",
                    serde_json::json!({
                        "host": source.host,
                        "hint": "add the source host key to the configured known hosts file",
                    }),
                )
                .await;
            }
            return Err(MigrationError::step_failed(
                "rsync_failed",
                serde_json::json!({
                    "code": result.code,
                    "stderr": result.stderr.trim(),
                    "timed_out": result.timed_out,
                }),
            ));
        }

        Ok(serde_json::json!({
            "source_path": source_path,
            "target_path": target_path,
            "dry_run": job.dry_run,
        }))
    }

    async fn import_databases(
        &self,
        job: &MigrationJob,
        account: &MigrationAccount,
    ) -> Result<serde_json::Value, MigrationError> {
        let dumps: Vec<DbDump> = match account.config.get("db_dumps") {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                MigrationError::step_failed(
                    "invalid_db_dumps",
                    serde_json::json!({ "error": e.to_string() }),
                )
            })?,
            None => Vec::new(),
        };
        if dumps.is_empty() {
            return Ok(serde_json::json!({ "imported": 0 }));
        }

        let service_id = account.target_service_id.ok_or_else(|| {
            MigrationError::step_failed(
                "target_service_missing",
                serde_json::json!({ "hint": "provision_target_env must complete first" }),
            )
        })?;
        let service = self.orchestrator.get_service(service_id).await?;

        let max_databases = match &account.limits {
            Some(limits) => limits.max_databases,
            None => match self.plans.find(service.plan_id).await {
                Some(plan) => plan.max_databases,
                None => AccountLimits::default().max_databases,
            },
        };
        if dumps.len() as i64 > max_databases {
            return Err(MigrationError::step_failed(
                "database_limit_exceeded",
                serde_json::json!({
                    "max_databases": max_databases,
                    "requested": dumps.len(),
                }),
            ));
        }

        let names: Vec<&str> = dumps.iter().map(|d| d.database.as_str()).collect();
        if job.dry_run {
            return Ok(serde_json::json!({
                "imported": 0,
                "databases": names,
                "dry_run": true,
            }));
        }

        let db_user = naming::mysql_username(&service.system_username);
        let mysql = self
            .resolve_logged(job.id, &self.config.mysql_command, Some("mysql or mariadb client"))
            .await?;

        for dump in &dumps {
            if !naming::is_safe_sql_identifier(&dump.database) {
                return Err(MigrationError::step_failed(
                    "unsafe_database_name",
                    serde_json::json!({ "database": dump.database }),
                ));
            }

            self.run_mysql(
                &mysql.path,
                &[format!("CREATE DATABASE IF NOT EXISTS `{}`", dump.database)],
                "db_create_failed",
                &dump.database,
            )
            .await?;
            self.run_mysql_in_db(
                &mysql.path,
                &dump.database,
                &format!("source {}", dump.path),
                "db_import_failed",
            )
            .await?;
            self.run_mysql(
                &mysql.path,
                &[format!(
                    "GRANT ALL PRIVILEGES ON `{}`.* TO '{}'@'%'; FLUSH PRIVILEGES",
                    dump.database, db_user
                )],
                "db_grant_failed",
                &dump.database,
            )
            .await?;
        }

        Ok(serde_json::json!({
            "imported": dumps.len(),
            "databases": names,
        }))
    }

    async fn run_mysql(
        &self,
        mysql_path: &str,
        statements: &[String],
        error_name: &str,
        database: &str,
    ) -> Result<(), MigrationError> {
        let mut args = self.config.mysql_args.clone();
        args.push("-e".to_string());
        args.push(statements.join("; "));
        self.check_mysql(mysql_path, args, error_name, database).await
    }

    async fn run_mysql_in_db(
        &self,
        mysql_path: &str,
        database: &str,
        statement: &str,
        error_name: &str,
    ) -> Result<(), MigrationError> {
        let mut args = self.config.mysql_args.clone();
        args.push(database.to_string());
        args.push("-e".to_string());
        args.push(statement.to_string());
        self.check_mysql(mysql_path, args, error_name, database).await
    }

    async fn check_mysql(
        &self,
        mysql_path: &str,
        args: Vec<String>,
        error_name: &str,
        database: &str,
    ) -> Result<(), MigrationError> {
        let result = run_tool(mysql_path, &args, Some(MYSQL_TIMEOUT)).await?;
        if result.ok() {
            Ok(())
        } else {
            Err(MigrationError::step_failed(
                error_name,
                serde_json::json!({
                    "database": database,
                    "code": result.code,
                    "stderr": result.stderr.trim(),
                }),
            ))
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub async fn get_job(&self, job_id: EntityId) -> Result<MigrationJob, MigrationError> {
        self.find_job(job_id).await
    }

    pub async fn list_jobs(&self) -> Vec<MigrationJob> {
        self.jobs.list().await
    }

    pub async fn steps_for_job(&self, job_id: EntityId) -> Vec<MigrationStep> {
        self.steps.list_for_job(job_id).await
    }

    pub async fn accounts_for_job(&self, job_id: EntityId) -> Vec<MigrationAccount> {
        self.accounts.list_for_job(job_id).await
    }

    pub async fn logs_for_job(&self, job_id: EntityId) -> Vec<MigrationLogEntry> {
        self.logs.list_for_job(job_id).await
    }

    /// Resolve a tool, logging a `tool_not_found` diagnostic on the job
    /// before surfacing the failure.
    async fn resolve_logged(
        &self,
        job_id: EntityId,
        name: &str,
        package_hint: Option<&str>,
    ) -> Result<npanel_core::tools::ResolvedTool, MigrationError> {
        match self
            .tools
            .resolve_with(
                name,
                ResolveOptions {
                    refresh: false,
                    package_hint: package_hint.map(str::to_string),
                },
            )
            .await
        {
            Ok(tool) => Ok(tool),
            Err(err) => {
                self.log(
                    job_id,
                    "tool_not_found",
                    serde_json::json!({
                        "tool": err.tool.clone(),
                        "package_hint": err.package_hint.clone(),
                    }),
                )
                .await;
                Err(err.into())
            }
        }
    }

    async fn find_job(&self, job_id: EntityId) -> Result<MigrationJob, MigrationError> {
        self.jobs.find(job_id).await.ok_or(MigrationError::NotFound {
            entity: "migration job",
        })
    }

    async fn log(&self, job_id: EntityId, event: &str, context: serde_json::Value) {
        self.logs
            .append(MigrationLogEntry {
                id: uuid::Uuid::new_v4(),
                job_id,
                event: event.to_string(),
                context: redact_sensitive(&context),
                created_at: chrono::Utc::now(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_with(status: StepStatus) -> MigrationStep {
        MigrationStep {
            id: uuid::Uuid::new_v4(),
            job_id: uuid::Uuid::new_v4(),
            account_id: None,
            name: StepName::ValidateSourceHost,
            status,
            payload: serde_json::Value::Null,
            last_error: None,
            position: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn aggregate_status_covers_all_combinations() {
        assert_eq!(aggregate_status(&[]), MigrationJobStatus::Pending);
        assert_eq!(
            aggregate_status(&[step_with(StepStatus::Pending)]),
            MigrationJobStatus::Running
        );
        assert_eq!(
            aggregate_status(&[step_with(StepStatus::Completed), step_with(StepStatus::Running)]),
            MigrationJobStatus::Running
        );
        assert_eq!(
            aggregate_status(&[step_with(StepStatus::Completed), step_with(StepStatus::Failed)]),
            MigrationJobStatus::Partial
        );
        assert_eq!(
            aggregate_status(&[step_with(StepStatus::Failed)]),
            MigrationJobStatus::Failed
        );
        assert_eq!(
            aggregate_status(&[step_with(StepStatus::Completed)]),
            MigrationJobStatus::Completed
        );
        assert_eq!(
            aggregate_status(&[step_with(StepStatus::Completed), step_with(StepStatus::Skipped)]),
            MigrationJobStatus::Completed
        );
        assert_eq!(
            aggregate_status(&[step_with(StepStatus::Failed), step_with(StepStatus::Skipped)]),
            MigrationJobStatus::Failed
        );
    }

    #[test]
    fn derived_plan_name_is_stable_and_short() {
        let limits = AccountLimits::default();
        let a = derived_plan_name(&limits);
        let b = derived_plan_name(&limits);
        assert_eq!(a, b);
        assert!(a.starts_with("imported_"));
        assert_eq!(a.len(), "imported_".len() + 16);

        let mut other = AccountLimits::default();
        other.max_databases += 1;
        assert_ne!(a, derived_plan_name(&other));
    }
}
