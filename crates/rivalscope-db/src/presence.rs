//! Database operations for the `presence_summaries` table.
//!
//! Summaries are recomputable: re-running the presence step appends a new row
//! with the same derived values rather than upserting, so the step never has
//! to rely on exactly-once execution.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `presence_summaries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PresenceSummaryRow {
    pub id: i64,
    pub competitor_id: i64,
    pub run_id: i64,
    pub mention_count: i64,
    pub sentiment_average: Option<f64>,
    pub visibility_score: f64,
    pub trend_direction: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

/// Appends one presence summary.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
#[allow(clippy::too_many_arguments)]
pub async fn insert_presence_summary(
    pool: &PgPool,
    competitor_id: i64,
    run_id: i64,
    mention_count: i64,
    sentiment_average: Option<f64>,
    visibility_score: f64,
    trend_direction: &str,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO presence_summaries \
             (competitor_id, run_id, mention_count, sentiment_average, visibility_score, \
              trend_direction, period_start, period_end) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING id",
    )
    .bind(competitor_id)
    .bind(run_id)
    .bind(mention_count)
    .bind(sentiment_average)
    .bind(visibility_score)
    .bind(trend_direction)
    .bind(period_start)
    .bind(period_end)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Returns all presence summaries for a run, ordered by insertion.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_presence_for_run(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<PresenceSummaryRow>, DbError> {
    let rows = sqlx::query_as::<_, PresenceSummaryRow>(
        "SELECT id, competitor_id, run_id, mention_count, sentiment_average, \
                visibility_score, trend_direction, period_start, period_end \
         FROM presence_summaries \
         WHERE run_id = $1 \
         ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
