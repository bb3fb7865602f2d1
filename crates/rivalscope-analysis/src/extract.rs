//! Model-driven extraction of features and pricing plans from fetched page
//! content.
//!
//! Two model calls per competitor, one per concern. Each call gets the
//! collected pages serialized as JSON and asks for a bare JSON array back.
//! As with synthesis, the response is never trusted: a reply that is not an
//! array yields nothing, and malformed elements are defaulted.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;

use rivalscope_db::{self as db, NewFeature, NewPricingPlan};

use crate::error::AnalysisError;
use crate::llm::InsightModel;
use crate::synthesize::strip_code_fence;

/// Maximum number of characters of serialized page content per extraction call.
pub const EXTRACTION_TEXT_BUDGET: usize = 15_000;

const FEATURES_SYSTEM_PROMPT: &str = "You are a data extractor. From the \
given text, extract product or service features. Return a JSON array of \
objects. Each object: name (or feature_name), category (string or null), \
description (string or null), is_available (boolean, default true). If no \
features found, return [].";

const PRICING_SYSTEM_PROMPT: &str = "You are a data extractor. From the \
given text, extract pricing information. Return a JSON array of objects. \
Each object must have: plan_name (string), price (number or null), currency \
(e.g. USD), billing_period (monthly/yearly/one-time or null), features \
(array of strings). If no pricing found, return [].";

fn default_feature_name() -> String {
    "Unknown".to_string()
}

fn default_is_available() -> bool {
    true
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize)]
struct FeatureDraft {
    #[serde(default = "default_feature_name", alias = "feature_name")]
    name: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_is_available")]
    is_available: bool,
}

impl Default for FeatureDraft {
    fn default() -> Self {
        Self {
            name: default_feature_name(),
            category: None,
            description: None,
            is_available: default_is_available(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PricingDraft {
    #[serde(default)]
    plan_name: Option<String>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    billing_period: Option<String>,
    #[serde(default)]
    features: Option<Value>,
}

impl Default for PricingDraft {
    fn default() -> Self {
        Self {
            plan_name: None,
            price: None,
            currency: default_currency(),
            billing_period: None,
            features: None,
        }
    }
}

/// How many rows the extraction step persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfferingCounts {
    pub features: usize,
    pub plans: usize,
}

impl OfferingCounts {
    #[must_use]
    pub fn total(self) -> usize {
        self.features + self.plans
    }
}

/// Serializes the collected pages and clips the result to the per-call
/// budget, then wraps it in the extraction user prompt.
fn extraction_prompt(pages: &[Value]) -> String {
    let serialized = serde_json::to_string(pages).unwrap_or_else(|_| String::from("[]"));
    let text: String = serialized.chars().take(EXTRACTION_TEXT_BUDGET).collect();
    format!("Text:\n{text}\n\nJSON array:")
}

/// Parses a model response expected to be a bare JSON array.
///
/// Non-array responses yield an empty vec. Elements that fail to deserialize
/// individually are replaced with fully-defaulted drafts.
fn parse_array<T: DeserializeOwned + Default>(raw: &str) -> Vec<T> {
    let Ok(value) = serde_json::from_str::<Value>(strip_code_fence(raw)) else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| serde_json::from_value(item.clone()).unwrap_or_default())
        .collect()
}

/// Runs the offerings extraction for one competitor: two model calls over the
/// pages fetched for it this run, persisting every returned feature and
/// pricing plan.
///
/// # Errors
///
/// Returns [`AnalysisError::Model`] if either model call fails and
/// [`AnalysisError::Db`] if an insert fails. A response that parses to
/// nothing is success with zero counts.
pub async fn extract_offerings(
    pool: &PgPool,
    model: &dyn InsightModel,
    run_id: i64,
    competitor_id: i64,
    pages: &[Value],
) -> Result<OfferingCounts, AnalysisError> {
    let user = extraction_prompt(pages);

    let raw = model
        .complete(FEATURES_SYSTEM_PROMPT, &user)
        .await
        .map_err(|e| AnalysisError::Model(e.to_string()))?;
    let features = parse_array::<FeatureDraft>(&raw);

    let raw = model
        .complete(PRICING_SYSTEM_PROMPT, &user)
        .await
        .map_err(|e| AnalysisError::Model(e.to_string()))?;
    let plans = parse_array::<PricingDraft>(&raw);

    let mut counts = OfferingCounts::default();

    for draft in &features {
        db::insert_feature(
            pool,
            NewFeature {
                competitor_id,
                run_id,
                feature_name: &draft.name,
                category: draft.category.as_deref(),
                description: draft.description.as_deref(),
                is_available: draft.is_available,
            },
        )
        .await?;
        counts.features += 1;
    }

    for draft in &plans {
        db::insert_pricing_plan(
            pool,
            NewPricingPlan {
                competitor_id,
                run_id,
                plan_name: draft.plan_name.as_deref(),
                price: draft.price,
                currency: Some(&draft.currency),
                billing_period: draft.billing_period.as_deref(),
                plan_features: draft.features.as_ref(),
            },
        )
        .await?;
        counts.plans += 1;
    }

    tracing::info!(
        run_id,
        competitor_id,
        features = counts.features,
        plans = counts.plans,
        "offerings extraction persisted"
    );

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_clips_serialized_pages_to_budget() {
        let pages = vec![json!({"text": "y".repeat(EXTRACTION_TEXT_BUDGET * 2)})];
        let prompt = extraction_prompt(&pages);
        assert!(prompt.starts_with("Text:\n"));
        assert!(prompt.ends_with("\n\nJSON array:"));
        assert!(prompt.chars().count() <= EXTRACTION_TEXT_BUDGET + 20);
    }

    #[test]
    fn feature_name_accepts_both_keys_and_defaults_to_unknown() {
        let drafts = parse_array::<FeatureDraft>(
            r#"[{"name": "SSO"}, {"feature_name": "Audit log"}, {"category": "security"}]"#,
        );
        assert_eq!(drafts[0].name, "SSO");
        assert_eq!(drafts[1].name, "Audit log");
        assert_eq!(drafts[2].name, "Unknown");
        assert!(drafts.iter().all(|d| d.is_available));
    }

    #[test]
    fn pricing_defaults_currency_to_usd() {
        let drafts = parse_array::<PricingDraft>(
            r#"[{"plan_name": "Pro", "price": 49.0}, {"plan_name": "Team", "currency": "EUR"}]"#,
        );
        assert_eq!(drafts[0].currency, "USD");
        assert_eq!(drafts[1].currency, "EUR");
        assert_eq!(drafts[0].price, Some(49.0));
        assert_eq!(drafts[1].price, None);
    }

    #[test]
    fn fenced_array_is_unwrapped() {
        let drafts = parse_array::<FeatureDraft>("```json\n[{\"name\": \"API\"}]\n```");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name, "API");
    }

    #[test]
    fn non_array_responses_yield_nothing() {
        for raw in ["not json", "{\"name\": \"API\"}", "", "\"just a string\""] {
            assert!(parse_array::<FeatureDraft>(raw).is_empty(), "input {raw:?}");
            assert!(parse_array::<PricingDraft>(raw).is_empty(), "input {raw:?}");
        }
    }

    #[test]
    fn malformed_element_is_defaulted_not_dropped() {
        let drafts = parse_array::<PricingDraft>(r#"[42, {"plan_name": "Basic"}]"#);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].plan_name, None);
        assert_eq!(drafts[0].currency, "USD");
        assert_eq!(drafts[1].plan_name.as_deref(), Some("Basic"));
    }
}
