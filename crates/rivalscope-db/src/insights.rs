//! Database operations for the `insights` and `opportunities` tables.
//!
//! Both are produced only by the synthesizer and are append-only per run.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `insights` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InsightRow {
    pub id: i64,
    pub run_id: i64,
    pub insight_type: String,
    pub category: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub recommendation: Option<String>,
    pub supporting_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `opportunities` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OpportunityRow {
    pub id: i64,
    pub run_id: i64,
    pub opportunity_type: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub competitors_affected: Option<serde_json::Value>,
    pub impact_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Fields for appending an insight.
#[derive(Debug, Clone)]
pub struct NewInsight<'a> {
    pub run_id: i64,
    pub insight_type: &'a str,
    pub category: Option<&'a str>,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub priority: Option<&'a str>,
    pub recommendation: Option<&'a str>,
    pub supporting_data: Option<&'a serde_json::Value>,
}

/// Fields for appending an opportunity.
#[derive(Debug, Clone)]
pub struct NewOpportunity<'a> {
    pub run_id: i64,
    pub opportunity_type: Option<&'a str>,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub competitors_affected: Option<&'a serde_json::Value>,
    pub impact_score: Option<f64>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Appends one insight.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_insight(pool: &PgPool, insight: NewInsight<'_>) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO insights \
             (run_id, insight_type, category, title, description, priority, \
              recommendation, supporting_data) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING id",
    )
    .bind(insight.run_id)
    .bind(insight.insight_type)
    .bind(insight.category)
    .bind(insight.title)
    .bind(insight.description)
    .bind(insight.priority)
    .bind(insight.recommendation)
    .bind(insight.supporting_data)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Appends one opportunity.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_opportunity(
    pool: &PgPool,
    opportunity: NewOpportunity<'_>,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO opportunities \
             (run_id, opportunity_type, title, description, competitors_affected, impact_score) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id",
    )
    .bind(opportunity.run_id)
    .bind(opportunity.opportunity_type)
    .bind(opportunity.title)
    .bind(opportunity.description)
    .bind(opportunity.competitors_affected)
    .bind(opportunity.impact_score)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Returns all insights for a run, ordered by insertion.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_insights_for_run(pool: &PgPool, run_id: i64) -> Result<Vec<InsightRow>, DbError> {
    let rows = sqlx::query_as::<_, InsightRow>(
        "SELECT id, run_id, insight_type, category, title, description, priority, \
                recommendation, supporting_data, created_at \
         FROM insights \
         WHERE run_id = $1 \
         ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns all opportunities for a run, ordered by insertion.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_opportunities_for_run(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<OpportunityRow>, DbError> {
    let rows = sqlx::query_as::<_, OpportunityRow>(
        "SELECT id, run_id, opportunity_type, title, description, \
                competitors_affected, impact_score, created_at \
         FROM opportunities \
         WHERE run_id = $1 \
         ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
