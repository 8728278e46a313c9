//! `npanel-worker` -- control-plane worker for the hosting panel.
//!
//! Seeds the default plan, then polls migration jobs and executes one
//! pending step per job per tick.
//!
//! # Environment variables
//!
//! | Variable                  | Required | Default | Description                              |
//! |---------------------------|----------|---------|------------------------------------------|
//! | `NPANEL_HOSTING_BACKEND`  | no       | `noop`  | Adapter backend: `noop` or `shell`       |
//! | `NPANEL_WORKER_POLL_SECS` | no       | `5`     | Seconds between migration poll cycles    |
//! | `NPANEL_HOSTING_DRY_RUN`  | no       | `0`     | `1` makes adapters log without acting    |

use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod wiring;

/// Default interval between migration poll cycles.
const DEFAULT_POLL_SECS: u64 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "npanel_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let poll_secs: u64 = std::env::var("NPANEL_WORKER_POLL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_POLL_SECS);

    let runtime = wiring::build()?;

    let plan = runtime.orchestrator.ensure_default_plan().await;
    tracing::info!(plan = %plan.name, poll_secs, "npanel-worker starting");

    let mut ticker = tokio::time::interval(Duration::from_secs(poll_secs));
    loop {
        ticker.tick().await;
        run_pending_migration_steps(&runtime).await;
    }
}

/// Advance every non-terminal migration job by one step.
async fn run_pending_migration_steps(runtime: &wiring::Runtime) {
    for job in runtime.engine.list_jobs().await {
        if job.status.is_terminal() {
            continue;
        }
        match runtime.engine.run_next_step(job.id).await {
            Ok(Some(step)) => {
                tracing::info!(
                    job_id = %job.id,
                    step = step.name.as_str(),
                    status = ?step.status,
                    "migration step executed"
                );
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(job_id = %job.id, error = %err, "migration step errored");
            }
        }
    }
}
