//! Database operations for the `content_pages` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `content_pages` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentPageRow {
    pub id: i64,
    pub competitor_id: i64,
    pub run_id: i64,
    pub page_type: String,
    pub content: serde_json::Value,
    pub extracted_at: DateTime<Utc>,
}

/// Appends one fetched page.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_content_page(
    pool: &PgPool,
    competitor_id: i64,
    run_id: i64,
    page_type: &str,
    content: &serde_json::Value,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO content_pages (competitor_id, run_id, page_type, content) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id",
    )
    .bind(competitor_id)
    .bind(run_id)
    .bind(page_type)
    .bind(content)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Returns all content pages for a run, ordered by insertion.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_content_pages_for_run(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<ContentPageRow>, DbError> {
    let rows = sqlx::query_as::<_, ContentPageRow>(
        "SELECT id, competitor_id, run_id, page_type, content, extracted_at \
         FROM content_pages \
         WHERE run_id = $1 \
         ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
