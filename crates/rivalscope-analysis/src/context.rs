//! Synthesis context assembly.
//!
//! Everything collected for a run is flattened into one serializable
//! structure, rendered as JSON, and truncated to a fixed character budget
//! before it is handed to the model.

use serde::Serialize;
use sqlx::PgPool;

use rivalscope_db::{self as db, DbError};

/// Maximum number of characters of rendered context sent to the model.
pub const CONTEXT_CHAR_BUDGET: usize = 25_000;

/// Per-mention cap on article body text carried into the context.
pub const MENTION_CONTENT_WIDTH: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct CompetitorContext {
    pub id: i64,
    pub name: String,
    pub industry: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MentionContext {
    pub competitor_id: i64,
    pub title: String,
    pub source: Option<String>,
    pub sentiment_score: Option<f64>,
    /// Article body clipped to [`MENTION_CONTENT_WIDTH`] characters.
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresenceContext {
    pub competitor_id: i64,
    pub mention_count: i64,
    pub sentiment_average: Option<f64>,
    pub visibility_score: f64,
    pub trend_direction: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageContext {
    pub competitor_id: i64,
    pub page_type: String,
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureContext {
    pub competitor_id: i64,
    pub feature_name: String,
    pub category: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricingContext {
    pub competitor_id: i64,
    pub plan_name: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub billing_period: Option<String>,
    pub features: Option<serde_json::Value>,
}

/// All collected data for one run, shaped for the model prompt.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisContext {
    pub run_id: i64,
    pub competitors: Vec<CompetitorContext>,
    pub mentions: Vec<MentionContext>,
    pub presence: Vec<PresenceContext>,
    pub content_pages: Vec<PageContext>,
    pub features: Vec<FeatureContext>,
    pub pricing: Vec<PricingContext>,
}

/// Loads the synthesis context for a run from the database.
///
/// Competitors deleted since the run was created are silently omitted.
///
/// # Errors
///
/// Returns [`DbError`] if any of the reads fail.
pub async fn build_context(pool: &PgPool, run_id: i64) -> Result<SynthesisContext, DbError> {
    let mut competitors = Vec::new();
    for competitor_id in db::list_run_competitor_ids(pool, run_id).await? {
        match db::get_competitor(pool, competitor_id).await {
            Ok(row) => competitors.push(CompetitorContext {
                id: row.id,
                name: row.name,
                industry: row.industry,
                description: row.description,
            }),
            Err(DbError::NotFound) => {}
            Err(e) => return Err(e),
        }
    }

    let mentions = db::list_mentions_for_run(pool, run_id)
        .await?
        .into_iter()
        .map(|row| MentionContext {
            competitor_id: row.competitor_id,
            title: row.title,
            source: row.source,
            sentiment_score: row.sentiment_score,
            content: row.content.map(|c| clip_chars(&c, MENTION_CONTENT_WIDTH)),
        })
        .collect();

    let presence = db::list_presence_for_run(pool, run_id)
        .await?
        .into_iter()
        .map(|row| PresenceContext {
            competitor_id: row.competitor_id,
            mention_count: row.mention_count,
            sentiment_average: row.sentiment_average,
            visibility_score: row.visibility_score,
            trend_direction: row.trend_direction,
        })
        .collect();

    let content_pages = db::list_content_pages_for_run(pool, run_id)
        .await?
        .into_iter()
        .map(|row| PageContext {
            competitor_id: row.competitor_id,
            page_type: row.page_type,
            content: row.content,
        })
        .collect();

    let features = db::list_features_for_run(pool, run_id)
        .await?
        .into_iter()
        .map(|row| FeatureContext {
            competitor_id: row.competitor_id,
            feature_name: row.feature_name,
            category: row.category,
            description: row.description,
        })
        .collect();

    let pricing = db::list_pricing_for_run(pool, run_id)
        .await?
        .into_iter()
        .map(|row| PricingContext {
            competitor_id: row.competitor_id,
            plan_name: row.plan_name,
            price: row.price,
            currency: row.currency,
            billing_period: row.billing_period,
            features: row.plan_features,
        })
        .collect();

    Ok(SynthesisContext {
        run_id,
        competitors,
        mentions,
        presence,
        content_pages,
        features,
        pricing,
    })
}

/// Renders the context as JSON and truncates it to [`CONTEXT_CHAR_BUDGET`]
/// characters. Truncation may leave invalid JSON; the model prompt treats the
/// context as free text, so that is acceptable.
#[must_use]
pub fn render_context(context: &SynthesisContext) -> String {
    let rendered =
        serde_json::to_string_pretty(context).unwrap_or_else(|_| String::from("{}"));
    truncate_chars(rendered, CONTEXT_CHAR_BUDGET)
}

fn truncate_chars(s: String, max: usize) -> String {
    if s.chars().count() <= max {
        return s;
    }
    s.chars().take(max).collect()
}

fn clip_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_truncates_to_budget() {
        let context = SynthesisContext {
            run_id: 1,
            competitors: (0..2000)
                .map(|id| CompetitorContext {
                    id,
                    name: format!("competitor with a fairly long name number {id}"),
                    industry: Some("software".to_string()),
                    description: Some("lorem ipsum dolor sit amet".to_string()),
                })
                .collect(),
            mentions: Vec::new(),
            presence: Vec::new(),
            content_pages: Vec::new(),
            features: Vec::new(),
            pricing: Vec::new(),
        };

        let rendered = render_context(&context);
        assert_eq!(rendered.chars().count(), CONTEXT_CHAR_BUDGET);
    }

    #[test]
    fn render_keeps_small_contexts_whole() {
        let context = SynthesisContext {
            run_id: 7,
            competitors: Vec::new(),
            mentions: Vec::new(),
            presence: Vec::new(),
            content_pages: Vec::new(),
            features: Vec::new(),
            pricing: Vec::new(),
        };

        let rendered = render_context(&context);
        assert!(rendered.contains("\"run_id\": 7"));
        assert!(rendered.chars().count() < CONTEXT_CHAR_BUDGET);
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let s = "é".repeat(10);
        assert_eq!(truncate_chars(s, 5).chars().count(), 5);
    }

    #[test]
    fn mention_content_is_clipped_to_width() {
        let clipped = clip_chars(&"x".repeat(MENTION_CONTENT_WIDTH + 200), MENTION_CONTENT_WIDTH);
        assert_eq!(clipped.chars().count(), MENTION_CONTENT_WIDTH);

        let short = clip_chars("brief body", MENTION_CONTENT_WIDTH);
        assert_eq!(short, "brief body");
    }
}
