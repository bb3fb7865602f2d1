//! Background job scheduler.
//!
//! A run created over the API is normally executed by a spawned task. If the
//! process restarts between create and spawn, the run stays `pending`
//! forever. The sweep job picks those up after a grace period and executes
//! them.

use std::sync::Arc;

use rivalscope_analysis::Orchestrator;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    orchestrator: Orchestrator,
    grace_secs: u64,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_pending_sweep_job(&scheduler, pool, orchestrator, grace_secs).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the pending-run sweep, every 5 minutes on the minute.
async fn register_pending_sweep_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    orchestrator: Orchestrator,
    grace_secs: u64,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);
    let orchestrator = Arc::new(orchestrator);

    let job = Job::new_async("0 */5 * * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let orchestrator = Arc::clone(&orchestrator);

        Box::pin(async move {
            run_pending_sweep(&pool, &orchestrator, grace_secs).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Execute every pending run older than the grace period, sequentially.
async fn run_pending_sweep(pool: &PgPool, orchestrator: &Orchestrator, grace_secs: u64) {
    let grace_secs = i64::try_from(grace_secs).unwrap_or(i64::MAX);
    let run_ids = match rivalscope_db::list_stale_pending_run_ids(pool, grace_secs).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to list stale pending runs");
            return;
        }
    };

    if run_ids.is_empty() {
        return;
    }

    tracing::info!(count = run_ids.len(), "scheduler: sweeping stale pending runs");

    for run_id in run_ids {
        match orchestrator.execute(run_id).await {
            Ok(report) => {
                tracing::info!(
                    run_id,
                    degraded = report.is_degraded(),
                    "scheduler: swept run completed"
                );
            }
            // Another executor may have claimed the run between list and
            // execute; that is the guarded transition doing its job.
            Err(rivalscope_analysis::AnalysisError::InvalidTransition(_)) => {
                tracing::debug!(run_id, "scheduler: run already claimed; skipping");
            }
            Err(e) => {
                tracing::error!(run_id, error = %e, "scheduler: swept run failed");
            }
        }
    }
}
