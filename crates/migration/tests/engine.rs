//! End-to-end migration pipeline tests using stand-in rsync/mysql binaries.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use assert_matches::assert_matches;

use npanel_core::tools::ToolResolver;
use npanel_db::models::{
    AccountLimits, Customer, MigrationJobStatus, StepName, StepStatus,
};
use npanel_db::repositories::{
    AccountRepo, CustomerRepo, HostingLogRepo, JobRepo, MigrationLogRepo, PlanRepo, ServiceRepo,
    StepRepo,
};
use npanel_hosting::{AdapterSet, HostingConfig, HostingOrchestrator};
use npanel_migration::{
    MigrationConfig, MigrationEngine, MigrationError, NewMigrationAccount, NewMigrationJob,
};

fn fake_tool(dir: &Path, name: &str, script: &str) -> String {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(script.as_bytes()).unwrap();
    drop(file);
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.display().to_string()
}

struct TestEnv {
    engine: MigrationEngine,
    orchestrator: Arc<HostingOrchestrator>,
    accounts: Arc<AccountRepo>,
    jobs: Arc<JobRepo>,
    steps: Arc<StepRepo>,
    customer_id: uuid::Uuid,
    tools_dir: tempfile::TempDir,
    _target_dir: tempfile::TempDir,
}

async fn test_env(rsync_script: &str, mysql_script: &str) -> TestEnv {
    let tools_dir = tempfile::tempdir().unwrap();
    let target_dir = tempfile::tempdir().unwrap();

    let rsync_path = fake_tool(tools_dir.path(), "rsync", rsync_script);
    let mysql_path = fake_tool(tools_dir.path(), "mysql", mysql_script);
    // A stand-in ssh so host validation resolves even on machines without
    // an ssh client installed.
    fake_tool(tools_dir.path(), "ssh", "#!/bin/sh\nexit 0\n");

    let tools = Arc::new(ToolResolver::with_fallback_dirs(vec![tools_dir
        .path()
        .to_path_buf()]));

    let plans = Arc::new(PlanRepo::new());
    let services = Arc::new(ServiceRepo::new());
    let customers = Arc::new(CustomerRepo::new());
    let customer = customers.save(Customer::new("Ada", "ada@example.com")).await;

    let orchestrator = Arc::new(HostingOrchestrator::new(
        AdapterSet::noop(),
        Arc::clone(&tools),
        Arc::clone(&plans),
        services,
        Arc::new(HostingLogRepo::new()),
        customers,
        HostingConfig {
            dry_run: false,
            default_ipv4: "127.0.0.1".to_string(),
            required_tools: Vec::new(),
            manage_document_root: false,
        },
    ));

    let accounts = Arc::new(AccountRepo::new());
    let jobs = Arc::new(JobRepo::new());
    let steps = Arc::new(StepRepo::new());
    let engine = MigrationEngine::new(
        Arc::clone(&jobs),
        Arc::clone(&accounts),
        Arc::clone(&steps),
        Arc::new(MigrationLogRepo::new()),
        plans,
        Arc::clone(&orchestrator),
        tools,
        MigrationConfig {
            target_root: target_dir.path().display().to_string(),
            source_home_root: "/home".to_string(),
            plan_name_override: None,
            rsync_command: rsync_path,
            mysql_command: mysql_path,
            mysql_args: Vec::new(),
        },
    );

    TestEnv {
        engine,
        orchestrator,
        accounts,
        jobs,
        steps,
        customer_id: customer.id,
        tools_dir,
        _target_dir: target_dir,
    }
}

fn source_config() -> serde_json::Value {
    serde_json::json!({
        "host": "old.example.com",
        "ssh_user": "root",
        "ssh_port": 22,
    })
}

async fn run_to_completion(env: &TestEnv, job_id: uuid::Uuid) {
    while env.engine.run_next_step(job_id).await.unwrap().is_some() {}
}

const OK_SCRIPT: &str = "#!/bin/sh\nexit 0\n";

#[tokio::test]
async fn planning_is_ordered_and_idempotent() {
    let env = test_env(OK_SCRIPT, OK_SCRIPT).await;

    let job = env
        .engine
        .create_job(NewMigrationJob {
            name: "legacy box".to_string(),
            source_type: "cpanel_live_ssh".to_string(),
            source_config: source_config(),
            dry_run: false,
        })
        .await
        .unwrap();
    env.engine
        .add_account(
            job.id,
            NewMigrationAccount {
                source_username: "alice".to_string(),
                source_primary_domain: "alice.example.com".to_string(),
                target_customer_id: env.customer_id,
                limits: None,
                config: serde_json::json!({}),
            },
        )
        .await
        .unwrap();

    let steps = env.engine.plan_job(job.id).await.unwrap();
    let names: Vec<StepName> = steps.iter().map(|s| s.name).collect();
    assert_eq!(
        names,
        vec![
            StepName::ValidateSourceHost,
            StepName::ProvisionTargetEnv,
            StepName::RsyncHomeDirectory,
            StepName::ImportDatabases,
        ]
    );
    let positions: Vec<i64> = steps.iter().map(|s| s.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3]);

    // Re-planning returns the same steps.
    let replanned = env.engine.plan_job(job.id).await.unwrap();
    assert_eq!(replanned.len(), 4);
    assert_eq!(replanned[0].id, steps[0].id);

    // The rsync step carries precomputed paths.
    let rsync_step = &steps[2];
    assert_eq!(
        rsync_step.payload.get("source_path"),
        Some(&serde_json::json!("/home/alice"))
    );

    // A planned job accepts no further accounts.
    let late = env
        .engine
        .add_account(
            job.id,
            NewMigrationAccount {
                source_username: "bob".to_string(),
                source_primary_domain: "bob.example.com".to_string(),
                target_customer_id: env.customer_id,
                limits: None,
                config: serde_json::json!({}),
            },
        )
        .await;
    assert_matches!(late, Err(MigrationError::Validation(_)));
}

#[tokio::test]
async fn unsupported_source_type_is_rejected_at_planning() {
    let env = test_env(OK_SCRIPT, OK_SCRIPT).await;
    let job = env
        .engine
        .create_job(NewMigrationJob {
            name: "plesk box".to_string(),
            source_type: "plesk_backup".to_string(),
            source_config: source_config(),
            dry_run: false,
        })
        .await
        .unwrap();

    assert_matches!(
        env.engine.plan_job(job.id).await,
        Err(MigrationError::UnsupportedSourceType(t)) if t == "plesk_backup"
    );
}

#[tokio::test]
async fn full_pipeline_completes_and_provisions_the_target() {
    let tools_dir = tempfile::tempdir().unwrap();
    let rsync_args = tools_dir.path().join("rsync_args.txt");
    let mysql_log = tools_dir.path().join("mysql_calls.txt");
    let rsync_script = format!(
        "#!/bin/sh\nprintf '%s\\n' \"$@\" > {}\nexit 0\n",
        rsync_args.display()
    );
    let mysql_script = format!(
        "#!/bin/sh\necho \"$@\" >> {}\nexit 0\n",
        mysql_log.display()
    );
    let env = test_env(&rsync_script, &mysql_script).await;

    let dump = tools_dir.path().join("shop_main.sql");
    std::fs::write(&dump, "CREATE TABLE t (id INT);").unwrap();

    let job = env
        .engine
        .create_job(NewMigrationJob {
            name: "legacy box".to_string(),
            source_type: "cpanel_live_ssh".to_string(),
            source_config: source_config(),
            dry_run: false,
        })
        .await
        .unwrap();
    env.engine
        .add_account(
            job.id,
            NewMigrationAccount {
                source_username: "alice".to_string(),
                source_primary_domain: "alice.example.com".to_string(),
                target_customer_id: env.customer_id,
                limits: Some(AccountLimits::default()),
                config: serde_json::json!({
                    "db_dumps": [
                        { "database": "shop_main", "path": dump.display().to_string() },
                    ],
                }),
            },
        )
        .await
        .unwrap();

    run_to_completion(&env, job.id).await;

    let job = env.engine.get_job(job.id).await.unwrap();
    assert_eq!(job.status, MigrationJobStatus::Completed);

    let steps = env.engine.steps_for_job(job.id).await;
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));

    // The account got a provisioned, active service on a derived plan.
    let account = &env.accounts.list_for_job(job.id).await[0];
    let service_id = account.target_service_id.unwrap();
    let service = env.orchestrator.get_service(service_id).await.unwrap();
    assert_eq!(service.primary_domain, "alice.example.com");
    assert_eq!(
        service.status,
        npanel_db::models::ServiceStatus::Active
    );
    let plans = env.orchestrator.list_plans().await;
    assert!(plans.iter().any(|p| p.name.starts_with("imported_")));

    // rsync pulled from the source over strict-host-key ssh.
    let args = std::fs::read_to_string(&rsync_args).unwrap();
    let lines: Vec<&str> = args.lines().collect();
    assert_eq!(lines[0], "-az");
    assert!(lines
        .iter()
        .any(|l| l.starts_with("root@old.example.com:/home/alice/")));
    assert!(args.contains("StrictHostKeyChecking=yes"));

    // The dump was created, sourced, and granted to the service's db user.
    let calls = std::fs::read_to_string(&mysql_log).unwrap();
    assert!(calls.contains("CREATE DATABASE IF NOT EXISTS `shop_main`"));
    assert!(calls.contains("source "));
    assert!(calls.contains("GRANT ALL PRIVILEGES ON `shop_main`.* TO 'u_alice_db'@'%'"));
}

#[tokio::test]
async fn rsync_host_key_failure_marks_step_failed_and_job_partial() {
    let rsync_script =
        "#!/bin/sh\necho 'Host key verification failed.' >&2\nexit 255\n";
    let env = test_env(rsync_script, OK_SCRIPT).await;

    let job = env
        .engine
        .create_job(NewMigrationJob {
            name: "legacy box".to_string(),
            source_type: "cpanel_live_ssh".to_string(),
            source_config: source_config(),
            dry_run: false,
        })
        .await
        .unwrap();
    env.engine
        .add_account(
            job.id,
            NewMigrationAccount {
                source_username: "alice".to_string(),
                source_primary_domain: "alice.example.com".to_string(),
                target_customer_id: env.customer_id,
                limits: Some(AccountLimits::default()),
                config: serde_json::json!({}),
            },
        )
        .await
        .unwrap();

    run_to_completion(&env, job.id).await;

    let job = env.engine.get_job(job.id).await.unwrap();
    assert_eq!(job.status, MigrationJobStatus::Partial);

    let steps = env.engine.steps_for_job(job.id).await;
    let rsync_step = steps
        .iter()
        .find(|s| s.name == StepName::RsyncHomeDirectory)
        .unwrap();
    assert_eq!(rsync_step.status, StepStatus::Failed);
    let error = rsync_step.last_error.as_ref().unwrap();
    assert_eq!(error.message, "rsync_failed");

    let logs = env.engine.logs_for_job(job.id).await;
    assert!(logs
        .iter()
        .any(|e| e.event == "host_key_verification_failed"));

    // Terminal job: no further work, and the failed step stays failed.
    assert!(env.engine.run_next_step(job.id).await.unwrap().is_none());
    let steps = env.engine.steps_for_job(job.id).await;
    assert_eq!(
        steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .count(),
        1
    );
}

#[tokio::test]
async fn database_import_enforces_the_plan_limit() {
    let env = test_env(OK_SCRIPT, OK_SCRIPT).await;

    let job = env
        .engine
        .create_job(NewMigrationJob {
            name: "legacy box".to_string(),
            source_type: "cpanel_live_ssh".to_string(),
            source_config: source_config(),
            dry_run: false,
        })
        .await
        .unwrap();
    let limits = AccountLimits {
        max_databases: 1,
        ..AccountLimits::default()
    };
    env.engine
        .add_account(
            job.id,
            NewMigrationAccount {
                source_username: "alice".to_string(),
                source_primary_domain: "alice.example.com".to_string(),
                target_customer_id: env.customer_id,
                limits: Some(limits),
                config: serde_json::json!({
                    "db_dumps": [
                        { "database": "db_one", "path": "/tmp/one.sql" },
                        { "database": "db_two", "path": "/tmp/two.sql" },
                    ],
                }),
            },
        )
        .await
        .unwrap();

    run_to_completion(&env, job.id).await;

    let steps = env.engine.steps_for_job(job.id).await;
    let import = steps
        .iter()
        .find(|s| s.name == StepName::ImportDatabases)
        .unwrap();
    assert_eq!(import.status, StepStatus::Failed);
    let error = import.last_error.as_ref().unwrap();
    assert_eq!(error.message, "database_limit_exceeded");
    assert_eq!(error.details.get("max_databases"), Some(&serde_json::json!(1)));
    assert_eq!(error.details.get("requested"), Some(&serde_json::json!(2)));
}

#[tokio::test]
async fn dry_run_passes_the_flag_to_rsync_and_skips_imports() {
    let tools_dir = tempfile::tempdir().unwrap();
    let rsync_args = tools_dir.path().join("rsync_args.txt");
    let mysql_log = tools_dir.path().join("mysql_calls.txt");
    let rsync_script = format!(
        "#!/bin/sh\nprintf '%s\\n' \"$@\" > {}\nexit 0\n",
        rsync_args.display()
    );
    let mysql_script = format!(
        "#!/bin/sh\necho \"$@\" >> {}\nexit 0\n",
        mysql_log.display()
    );
    let env = test_env(&rsync_script, &mysql_script).await;

    let job = env
        .engine
        .create_job(NewMigrationJob {
            name: "rehearsal".to_string(),
            source_type: "cpanel_live_ssh".to_string(),
            source_config: source_config(),
            dry_run: true,
        })
        .await
        .unwrap();
    env.engine
        .add_account(
            job.id,
            NewMigrationAccount {
                source_username: "alice".to_string(),
                source_primary_domain: "alice.example.com".to_string(),
                target_customer_id: env.customer_id,
                limits: Some(AccountLimits::default()),
                config: serde_json::json!({
                    "db_dumps": [
                        { "database": "shop_main", "path": "/tmp/shop.sql" },
                    ],
                }),
            },
        )
        .await
        .unwrap();

    run_to_completion(&env, job.id).await;

    let job = env.engine.get_job(job.id).await.unwrap();
    assert_eq!(job.status, MigrationJobStatus::Completed);

    let args = std::fs::read_to_string(&rsync_args).unwrap();
    assert!(args.lines().any(|l| l == "--dry-run"));

    // The mysql client never ran.
    assert!(!mysql_log.exists());
}

#[tokio::test]
async fn requeued_step_runs_without_its_stale_error() {
    let env = test_env("#!/bin/sh\necho 'boom' >&2\nexit 1\n", OK_SCRIPT).await;

    let job = env
        .engine
        .create_job(NewMigrationJob {
            name: "legacy box".to_string(),
            source_type: "cpanel_live_ssh".to_string(),
            source_config: source_config(),
            dry_run: false,
        })
        .await
        .unwrap();
    env.engine
        .add_account(
            job.id,
            NewMigrationAccount {
                source_username: "alice".to_string(),
                source_primary_domain: "alice.example.com".to_string(),
                target_customer_id: env.customer_id,
                limits: Some(AccountLimits::default()),
                config: serde_json::json!({}),
            },
        )
        .await
        .unwrap();

    run_to_completion(&env, job.id).await;

    let failed = env
        .engine
        .steps_for_job(job.id)
        .await
        .into_iter()
        .find(|s| s.status == StepStatus::Failed)
        .unwrap();
    assert!(failed.last_error.is_some());

    // Operator requeues the step and reopens the job.
    let mut requeued = failed.clone();
    requeued.status = StepStatus::Pending;
    env.steps.save(requeued).await;
    let mut reopened = env.jobs.find(job.id).await.unwrap();
    reopened.status = MigrationJobStatus::Running;
    env.jobs.save(reopened).await;

    // Swap the stand-in rsync for one that blocks until released, so the
    // step's running state is observable from the repository.
    let gate = tempfile::tempdir().unwrap();
    let started = gate.path().join("started");
    let release = gate.path().join("release");
    fake_tool(
        env.tools_dir.path(),
        "rsync",
        &format!(
            "#!/bin/sh\ntouch {}\ni=0\nwhile [ ! -f {} ]; do\n  i=$((i+1))\n  [ $i -gt 100 ] && exit 1\n  sleep 0.1\ndone\nexit 0\n",
            started.display(),
            release.display()
        ),
    );

    let (rerun, observed) = tokio::join!(env.engine.run_next_step(job.id), async {
        for _ in 0..250 {
            if started.exists() {
                let running = env
                    .engine
                    .steps_for_job(job.id)
                    .await
                    .into_iter()
                    .find(|s| s.id == failed.id)
                    .unwrap();
                std::fs::write(&release, "go").unwrap();
                return running;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("stand-in rsync never started");
    });

    assert_eq!(observed.status, StepStatus::Running);
    assert!(observed.last_error.is_none());

    let rerun = rerun.unwrap().unwrap();
    assert_eq!(rerun.status, StepStatus::Completed);
    assert!(rerun.last_error.is_none());
}
