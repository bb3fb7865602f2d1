//! Database operations for the `features` and `pricing_plans` tables.
//!
//! Both are produced by the model-driven extraction step over fetched page
//! content and are append-only per run, like the other collections.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `features` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeatureRow {
    pub id: i64,
    pub competitor_id: i64,
    pub run_id: i64,
    pub feature_name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub is_available: bool,
    pub extracted_at: DateTime<Utc>,
}

/// A row from the `pricing_plans` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PricingPlanRow {
    pub id: i64,
    pub competitor_id: i64,
    pub run_id: i64,
    pub plan_name: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub billing_period: Option<String>,
    /// List of feature strings the plan bundles, as returned by extraction.
    pub plan_features: Option<serde_json::Value>,
    pub extracted_at: DateTime<Utc>,
}

/// Fields for appending a feature.
#[derive(Debug, Clone)]
pub struct NewFeature<'a> {
    pub competitor_id: i64,
    pub run_id: i64,
    pub feature_name: &'a str,
    pub category: Option<&'a str>,
    pub description: Option<&'a str>,
    pub is_available: bool,
}

/// Fields for appending a pricing plan.
#[derive(Debug, Clone)]
pub struct NewPricingPlan<'a> {
    pub competitor_id: i64,
    pub run_id: i64,
    pub plan_name: Option<&'a str>,
    pub price: Option<f64>,
    pub currency: Option<&'a str>,
    pub billing_period: Option<&'a str>,
    pub plan_features: Option<&'a serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Appends one feature.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_feature(pool: &PgPool, feature: NewFeature<'_>) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO features \
             (competitor_id, run_id, feature_name, category, description, is_available) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id",
    )
    .bind(feature.competitor_id)
    .bind(feature.run_id)
    .bind(feature.feature_name)
    .bind(feature.category)
    .bind(feature.description)
    .bind(feature.is_available)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Appends one pricing plan.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_pricing_plan(
    pool: &PgPool,
    plan: NewPricingPlan<'_>,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO pricing_plans \
             (competitor_id, run_id, plan_name, price, currency, billing_period, plan_features) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(plan.competitor_id)
    .bind(plan.run_id)
    .bind(plan.plan_name)
    .bind(plan.price)
    .bind(plan.currency)
    .bind(plan.billing_period)
    .bind(plan.plan_features)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Returns all features for a run, ordered by insertion.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_features_for_run(pool: &PgPool, run_id: i64) -> Result<Vec<FeatureRow>, DbError> {
    let rows = sqlx::query_as::<_, FeatureRow>(
        "SELECT id, competitor_id, run_id, feature_name, category, description, \
                is_available, extracted_at \
         FROM features \
         WHERE run_id = $1 \
         ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns all pricing plans for a run, ordered by insertion.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pricing_for_run(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<PricingPlanRow>, DbError> {
    let rows = sqlx::query_as::<_, PricingPlanRow>(
        "SELECT id, competitor_id, run_id, plan_name, price, currency, \
                billing_period, plan_features, extracted_at \
         FROM pricing_plans \
         WHERE run_id = $1 \
         ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
