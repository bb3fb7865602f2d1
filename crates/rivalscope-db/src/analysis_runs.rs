//! Database operations for `analysis_runs` and `analysis_run_competitors`.
//!
//! Status transitions are guarded UPDATEs: an orchestrator can only move a run
//! `pending -> in_progress -> completed|failed`, and a second orchestrator
//! racing on the same run loses with [`DbError::InvalidRunTransition`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `analysis_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalysisRunRow {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub parameters: serde_json::Value,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a run.
#[derive(Debug, Clone)]
pub struct NewAnalysisRun<'a> {
    pub name: &'a str,
    pub competitor_ids: &'a [i64],
    pub parameters: serde_json::Value,
    pub created_by: Option<&'a str>,
}

const RUN_COLUMNS: &str = "id, name, status, parameters, started_at, completed_at, \
                           error_message, created_by, created_at";

// ---------------------------------------------------------------------------
// analysis_runs operations
// ---------------------------------------------------------------------------

/// Creates a run in `pending` status together with its competitor links, in
/// one transaction. Returns the full newly-created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails (including a competitor id
/// that violates the foreign key).
pub async fn create_analysis_run(
    pool: &PgPool,
    new_run: NewAnalysisRun<'_>,
) -> Result<AnalysisRunRow, DbError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, AnalysisRunRow>(&format!(
        "INSERT INTO analysis_runs (name, status, parameters, created_by) \
         VALUES ($1, 'pending', $2, $3) \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(new_run.name)
    .bind(&new_run.parameters)
    .bind(new_run.created_by)
    .fetch_one(&mut *tx)
    .await?;

    for competitor_id in new_run.competitor_ids {
        sqlx::query(
            "INSERT INTO analysis_run_competitors (run_id, competitor_id) VALUES ($1, $2)",
        )
        .bind(row.id)
        .bind(competitor_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(row)
}

/// Marks a run as `in_progress` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `pending`
/// (including a concurrent orchestrator already driving it), or
/// [`DbError::Sqlx`] if the update fails.
pub async fn start_analysis_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analysis_runs \
         SET status = 'in_progress', started_at = NOW() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "pending",
        });
    }

    Ok(())
}

/// Marks a run as `completed` and sets `completed_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `in_progress`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_analysis_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analysis_runs \
         SET status = 'completed', completed_at = NOW() \
         WHERE id = $1 AND status = 'in_progress'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "in_progress",
        });
    }

    Ok(())
}

/// Marks a run as `failed`, sets `completed_at = NOW()` and `error_message`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `in_progress`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_analysis_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analysis_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'in_progress'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "in_progress",
        });
    }

    Ok(())
}

/// Fetches a single run by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_analysis_run(pool: &PgPool, id: i64) -> Result<AnalysisRunRow, DbError> {
    let row = sqlx::query_as::<_, AnalysisRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM analysis_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, optionally filtered by status,
/// ordered by `created_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_analysis_runs(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<AnalysisRunRow>, DbError> {
    let rows = sqlx::query_as::<_, AnalysisRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM analysis_runs \
         WHERE ($1::text IS NULL OR status = $1) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(status)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Deletes a run. All run-scoped rows cascade with it.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no run exists with the given `id`, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn delete_analysis_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM analysis_runs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// analysis_run_competitors operations
// ---------------------------------------------------------------------------

/// Returns the competitor ids linked to a run, in stable link-insertion order.
///
/// The orchestrator iterates this list; the ordering is arbitrary but
/// repeatable across invocations.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_run_competitor_ids(pool: &PgPool, run_id: i64) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT competitor_id FROM analysis_run_competitors \
         WHERE run_id = $1 \
         ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Returns ids of `pending` runs created more than `grace_secs` seconds ago.
///
/// Used by the scheduler to pick up runs whose background dispatch was lost
/// (for example a process restart between creation and spawn).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stale_pending_run_ids(
    pool: &PgPool,
    grace_secs: i64,
) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM analysis_runs \
         WHERE status = 'pending' \
           AND created_at < NOW() - make_interval(secs => $1::double precision) \
         ORDER BY id",
    )
    .bind(grace_secs)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
