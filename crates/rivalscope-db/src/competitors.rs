//! Database operations for the `competitors` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `competitors` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompetitorRow {
    pub id: i64,
    pub name: String,
    pub website_url: Option<String>,
    pub twitter_url: Option<String>,
    pub instagram_url: Option<String>,
    pub facebook_url: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a competitor.
#[derive(Debug, Clone, Default)]
pub struct NewCompetitor<'a> {
    pub name: &'a str,
    pub website_url: Option<&'a str>,
    pub twitter_url: Option<&'a str>,
    pub instagram_url: Option<&'a str>,
    pub facebook_url: Option<&'a str>,
    pub industry: Option<&'a str>,
    pub description: Option<&'a str>,
}

/// Partial update for a competitor. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct CompetitorUpdate<'a> {
    pub name: Option<&'a str>,
    pub website_url: Option<&'a str>,
    pub industry: Option<&'a str>,
    pub description: Option<&'a str>,
    pub status: Option<&'a str>,
}

const COMPETITOR_COLUMNS: &str = "id, name, website_url, twitter_url, instagram_url, \
                                  facebook_url, industry, description, status, \
                                  created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Inserts a competitor and returns the full row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_competitor(
    pool: &PgPool,
    new: NewCompetitor<'_>,
) -> Result<CompetitorRow, DbError> {
    let row = sqlx::query_as::<_, CompetitorRow>(&format!(
        "INSERT INTO competitors \
             (name, website_url, twitter_url, instagram_url, facebook_url, industry, description) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {COMPETITOR_COLUMNS}"
    ))
    .bind(new.name)
    .bind(new.website_url)
    .bind(new.twitter_url)
    .bind(new.instagram_url)
    .bind(new.facebook_url)
    .bind(new.industry)
    .bind(new.description)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a single competitor by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_competitor(pool: &PgPool, id: i64) -> Result<CompetitorRow, DbError> {
    let row = sqlx::query_as::<_, CompetitorRow>(&format!(
        "SELECT {COMPETITOR_COLUMNS} FROM competitors WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns competitors ordered by name, optionally filtered by status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_competitors(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<CompetitorRow>, DbError> {
    let rows = sqlx::query_as::<_, CompetitorRow>(&format!(
        "SELECT {COMPETITOR_COLUMNS} FROM competitors \
         WHERE ($1::text IS NULL OR status = $1) \
         ORDER BY name, id \
         LIMIT $2"
    ))
    .bind(status)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Applies a partial update and returns the updated row.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_competitor(
    pool: &PgPool,
    id: i64,
    update: CompetitorUpdate<'_>,
) -> Result<CompetitorRow, DbError> {
    let row = sqlx::query_as::<_, CompetitorRow>(&format!(
        "UPDATE competitors SET \
             name        = COALESCE($1, name), \
             website_url = COALESCE($2, website_url), \
             industry    = COALESCE($3, industry), \
             description = COALESCE($4, description), \
             status      = COALESCE($5, status), \
             updated_at  = NOW() \
         WHERE id = $6 \
         RETURNING {COMPETITOR_COLUMNS}"
    ))
    .bind(update.name)
    .bind(update.website_url)
    .bind(update.industry)
    .bind(update.description)
    .bind(update.status)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Deletes a competitor. Linked run artifacts cascade with it.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn delete_competitor(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM competitors WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
