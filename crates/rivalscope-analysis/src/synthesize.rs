//! Insight synthesis: one model call per run, constrained-JSON parsing, and
//! independent persistence of each returned element.
//!
//! Model output is never trusted: the response may be fenced, truncated, or
//! structurally wrong. Parse failures yield an empty result; malformed
//! elements are defaulted rather than dropped.

use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;

use rivalscope_db::{self as db, NewInsight, NewOpportunity};

use crate::context::{build_context, render_context};
use crate::error::AnalysisError;
use crate::llm::InsightModel;

const SYSTEM_PROMPT: &str = "You are a competitive intelligence analyst. \
Given collected data about a set of competitor companies, identify strategic \
insights and differentiation opportunities. Respond with strict JSON only, no \
prose, in the shape: {\"insights\": [{\"insight_type\": \"feature_gap\" | \
\"messaging_angle\" | \"market_timing\" | \"sentiment_opportunity\", \
\"category\": string, \"title\": string, \"description\": string, \
\"priority\": \"high\" | \"medium\" | \"low\", \"actionable_recommendation\": \
string, \"supporting_data\": object}], \"differentiation_opportunities\": \
[{\"opportunity_type\": string, \"title\": string, \"description\": string, \
\"competitors_affected\": array, \"impact_score\": number between 0 and 10}]}";

fn default_insight_type() -> String {
    "market_timing".to_string()
}

fn default_insight_title() -> String {
    "Insight".to_string()
}

fn default_opportunity_title() -> String {
    "Opportunity".to_string()
}

#[derive(Debug, Deserialize)]
struct InsightDraft {
    #[serde(default = "default_insight_type")]
    insight_type: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default = "default_insight_title")]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    actionable_recommendation: Option<String>,
    #[serde(default)]
    supporting_data: Option<Value>,
}

impl Default for InsightDraft {
    fn default() -> Self {
        Self {
            insight_type: default_insight_type(),
            category: None,
            title: default_insight_title(),
            description: None,
            priority: None,
            actionable_recommendation: None,
            supporting_data: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpportunityDraft {
    #[serde(default)]
    opportunity_type: Option<String>,
    #[serde(default = "default_opportunity_title")]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    competitors_affected: Option<Value>,
    #[serde(default)]
    impact_score: Option<f64>,
}

impl Default for OpportunityDraft {
    fn default() -> Self {
        Self {
            opportunity_type: None,
            title: default_opportunity_title(),
            description: None,
            competitors_affected: None,
            impact_score: None,
        }
    }
}

#[derive(Debug, Default)]
struct SynthesisOutput {
    insights: Vec<InsightDraft>,
    opportunities: Vec<OpportunityDraft>,
}

/// How many rows the synthesizer persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisCounts {
    pub insights: usize,
    pub opportunities: usize,
}

impl SynthesisCounts {
    #[must_use]
    pub fn total(self) -> usize {
        self.insights + self.opportunities
    }
}

/// Strips an optional Markdown code fence (with or without a `json` language
/// tag) from around the payload.
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let Some(start) = raw.find("```") else {
        return raw.trim();
    };
    let rest = &raw[start + 3..];
    let inner = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    let inner = inner.trim_start();
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

/// Parses a model response into drafts.
///
/// A response that is not valid JSON, or not an object, yields an empty
/// output. Array elements that fail to deserialize individually are replaced
/// with fully-defaulted drafts so one bad element never discards the rest.
fn parse_drafts(raw: &str) -> SynthesisOutput {
    let Ok(value) = serde_json::from_str::<Value>(strip_code_fence(raw)) else {
        return SynthesisOutput::default();
    };

    let insights = value
        .get("insights")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    serde_json::from_value::<InsightDraft>(item.clone())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default();

    let opportunities = value
        .get("differentiation_opportunities")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    serde_json::from_value::<OpportunityDraft>(item.clone())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default();

    SynthesisOutput {
        insights,
        opportunities,
    }
}

/// Runs the synthesis step for a run: build context, call the model, parse,
/// and persist each element independently.
///
/// # Errors
///
/// Returns [`AnalysisError::Model`] if the model call fails and
/// [`AnalysisError::Db`] if a database read or write fails. A response that
/// parses to nothing is success with zero counts.
pub async fn synthesize_insights(
    pool: &PgPool,
    model: &dyn InsightModel,
    run_id: i64,
) -> Result<SynthesisCounts, AnalysisError> {
    let context = build_context(pool, run_id).await?;
    let rendered = render_context(&context);

    let raw = model
        .complete(SYSTEM_PROMPT, &rendered)
        .await
        .map_err(|e| AnalysisError::Model(e.to_string()))?;

    let output = parse_drafts(&raw);
    if output.insights.is_empty() && output.opportunities.is_empty() {
        tracing::warn!(run_id, "synthesis response carried no usable elements");
    }

    let mut counts = SynthesisCounts::default();

    for draft in &output.insights {
        db::insert_insight(
            pool,
            NewInsight {
                run_id,
                insight_type: &draft.insight_type,
                category: draft.category.as_deref(),
                title: &draft.title,
                description: draft.description.as_deref(),
                priority: draft.priority.as_deref(),
                recommendation: draft.actionable_recommendation.as_deref(),
                supporting_data: draft.supporting_data.as_ref(),
            },
        )
        .await?;
        counts.insights += 1;
    }

    for draft in &output.opportunities {
        db::insert_opportunity(
            pool,
            NewOpportunity {
                run_id,
                opportunity_type: draft.opportunity_type.as_deref(),
                title: &draft.title,
                description: draft.description.as_deref(),
                competitors_affected: draft.competitors_affected.as_ref(),
                impact_score: draft.impact_score,
            },
        )
        .await?;
        counts.opportunities += 1;
    }

    tracing::info!(
        run_id,
        insights = counts.insights,
        opportunities = counts.opportunities,
        "synthesis persisted"
    );

    Ok(counts)
}
