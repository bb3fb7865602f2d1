//! Database operations for the `mentions` table.
//!
//! Mentions are append-only: rows are never updated after insert, and
//! re-running a collection step appends rather than upserts.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `mentions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MentionRow {
    pub id: i64,
    pub competitor_id: i64,
    pub run_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub source: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
    pub sentiment_score: Option<f64>,
    pub extracted_at: DateTime<Utc>,
}

/// Fields for appending a mention.
#[derive(Debug, Clone)]
pub struct NewMention<'a> {
    pub competitor_id: i64,
    pub run_id: i64,
    pub title: &'a str,
    pub url: Option<&'a str>,
    pub source: Option<&'a str>,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Option<&'a str>,
    pub sentiment_score: Option<f64>,
}

const MENTION_COLUMNS: &str = "id, competitor_id, run_id, title, url, source, \
                               published_at, content, sentiment_score, extracted_at";

/// Appends one mention.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_mention(pool: &PgPool, mention: NewMention<'_>) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO mentions \
             (competitor_id, run_id, title, url, source, published_at, content, sentiment_score) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING id",
    )
    .bind(mention.competitor_id)
    .bind(mention.run_id)
    .bind(mention.title)
    .bind(mention.url)
    .bind(mention.source)
    .bind(mention.published_at)
    .bind(mention.content)
    .bind(mention.sentiment_score)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Returns all mentions for a run, ordered by insertion.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_mentions_for_run(pool: &PgPool, run_id: i64) -> Result<Vec<MentionRow>, DbError> {
    let rows = sqlx::query_as::<_, MentionRow>(&format!(
        "SELECT {MENTION_COLUMNS} FROM mentions WHERE run_id = $1 ORDER BY id"
    ))
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns mentions for a (competitor, run) with `published_at` inside
/// `[period_start, period_end]`. Rows with a NULL `published_at` never match.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_mentions_in_window(
    pool: &PgPool,
    competitor_id: i64,
    run_id: i64,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> Result<Vec<MentionRow>, DbError> {
    let rows = sqlx::query_as::<_, MentionRow>(&format!(
        "SELECT {MENTION_COLUMNS} FROM mentions \
         WHERE competitor_id = $1 AND run_id = $2 \
           AND published_at >= $3 AND published_at <= $4 \
         ORDER BY id"
    ))
    .bind(competitor_id)
    .bind(run_id)
    .bind(period_start)
    .bind(period_end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
