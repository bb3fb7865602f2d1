//! End-to-end orchestrator tests against a real database, with static fakes
//! standing in for the signal source and the model.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;

use rivalscope_analysis::{AnalysisError, InsightModel, Orchestrator, StepOutcome};
use rivalscope_db::{self as db, NewAnalysisRun, NewCompetitor};
use rivalscope_source::{Article, PageContent, SourceAdapter};

struct StaticSource {
    articles_by_company: HashMap<String, Vec<Article>>,
}

impl StaticSource {
    fn empty() -> Self {
        Self {
            articles_by_company: HashMap::new(),
        }
    }

    fn with(company: &str, articles: Vec<Article>) -> Self {
        let mut articles_by_company = HashMap::new();
        articles_by_company.insert(company.to_string(), articles);
        Self {
            articles_by_company,
        }
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    async fn search_news(&self, company_name: &str, _days_back: i64) -> Vec<Article> {
        self.articles_by_company
            .get(company_name)
            .cloned()
            .unwrap_or_default()
    }

    async fn fetch_page(&self, url: &str) -> PageContent {
        PageContent {
            url: url.to_string(),
            content: json!({"url": url, "text": "page body"}),
            error: None,
        }
    }
}

struct StaticModel {
    response: String,
}

#[async_trait]
impl InsightModel for StaticModel {
    async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
        Ok(self.response.clone())
    }
}

struct FailingModel;

#[async_trait]
impl InsightModel for FailingModel {
    async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
        anyhow::bail!("connection refused")
    }
}

/// Answers each of the three model calls by recognizing its system prompt.
struct RoutedModel;

#[async_trait]
impl InsightModel for RoutedModel {
    async fn complete(&self, system: &str, _user: &str) -> anyhow::Result<String> {
        if system.contains("extract product or service features") {
            Ok(r#"[{"name": "SSO", "category": "security"}, {"feature_name": "Audit log"}]"#
                .to_string())
        } else if system.contains("extract pricing information") {
            Ok(r#"[{"plan_name": "Pro", "price": 49.0, "billing_period": "monthly",
                    "features": ["SSO", "Audit log"]}]"#
                .to_string())
        } else {
            Ok(r#"{"insights": [], "differentiation_opportunities": []}"#.to_string())
        }
    }
}

fn empty_model() -> StaticModel {
    StaticModel {
        response: r#"{"insights": [], "differentiation_opportunities": []}"#.to_string(),
    }
}

fn article(title: &str, days_ago: i64, sentiment: Option<f64>) -> Article {
    Article {
        title: title.to_string(),
        url: Some(format!("https://news.test/{title}")),
        source: Some("newswire".to_string()),
        published_at: Some(Utc::now() - Duration::days(days_ago)),
        content: Some("body".to_string()),
        sentiment_score: sentiment,
    }
}

async fn seed_competitor(pool: &PgPool, name: &str, website: Option<&str>) -> i64 {
    db::create_competitor(
        pool,
        NewCompetitor {
            name,
            website_url: website,
            ..NewCompetitor::default()
        },
    )
    .await
    .expect("create competitor")
    .id
}

async fn seed_run(pool: &PgPool, competitor_ids: &[i64], parameters: serde_json::Value) -> i64 {
    db::create_analysis_run(
        pool,
        NewAnalysisRun {
            name: "quarterly sweep",
            competitor_ids,
            parameters,
            created_by: Some("tests"),
        },
    )
    .await
    .expect("create run")
    .id
}

#[sqlx::test(migrations = "../../migrations")]
async fn end_to_end_two_competitors(pool: PgPool) {
    let acme = seed_competitor(&pool, "Acme", Some("https://acme.test")).await;
    let bolt = seed_competitor(&pool, "Bolt", None).await;
    let run_id = seed_run(&pool, &[acme, bolt], json!({"days_back": 7})).await;

    let source = StaticSource::with(
        "Acme",
        vec![
            article("a1", 1, Some(0.8)),
            article("a2", 2, Some(1.0)),
            article("a3", 3, None),
        ],
    );
    let model = StaticModel {
        response: r#"```json
{
  "insights": [{"insight_type": "feature_gap", "title": "Annual plans missing",
                "priority": "high"}],
  "differentiation_opportunities": [{"title": "Own SMB", "impact_score": 7.0}]
}
```"#
            .to_string(),
    };

    let orchestrator = Orchestrator::new(pool.clone(), Arc::new(source), Arc::new(model));
    let report = orchestrator.execute(run_id).await.expect("execute");

    let run = db::get_analysis_run(&pool, run_id).await.expect("get run");
    assert_eq!(run.status, "completed");
    assert!(run.started_at.is_some());
    assert!(run.completed_at.is_some());
    assert!(run.error_message.is_none());

    assert!(!report.is_degraded());
    assert_eq!(report.competitors.len(), 2);
    assert_eq!(
        report.competitors[0].collect_news,
        StepOutcome::Completed { records: 3 }
    );
    assert_eq!(
        report.competitors[0].extract_web_content,
        StepOutcome::Completed { records: 4 }
    );
    // The model answers every call with the synthesis object, which is not a
    // JSON array, so offerings extraction completes with nothing to store.
    assert_eq!(
        report.competitors[0].extract_offerings,
        StepOutcome::Completed { records: 0 }
    );
    assert!(matches!(
        report.competitors[1].extract_web_content,
        StepOutcome::Skipped { .. }
    ));
    assert!(matches!(
        report.competitors[1].extract_offerings,
        StepOutcome::Skipped { .. }
    ));
    assert_eq!(
        report.synthesize_insights,
        StepOutcome::Completed { records: 2 }
    );

    let mentions = db::list_mentions_for_run(&pool, run_id).await.expect("mentions");
    assert_eq!(mentions.len(), 3);

    let pages = db::list_content_pages_for_run(&pool, run_id).await.expect("pages");
    assert_eq!(pages.len(), 4);
    assert!(pages.iter().all(|p| p.competitor_id == acme));

    let presence = db::list_presence_for_run(&pool, run_id).await.expect("presence");
    assert_eq!(presence.len(), 1, "quiet competitor stores no summary");
    let summary = &presence[0];
    assert_eq!(summary.competitor_id, acme);
    assert_eq!(summary.mention_count, 3);
    let average = summary.sentiment_average.expect("scored average");
    assert!((average - 0.9).abs() < 1e-9);
    assert!((summary.visibility_score - 6.0).abs() < f64::EPSILON);
    assert_eq!(summary.trend_direction, "stable");

    let insights = db::list_insights_for_run(&pool, run_id).await.expect("insights");
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].insight_type, "feature_gap");
    assert_eq!(insights[0].priority.as_deref(), Some("high"));

    let opportunities = db::list_opportunities_for_run(&pool, run_id)
        .await
        .expect("opportunities");
    assert_eq!(opportunities.len(), 1);
    assert_eq!(opportunities[0].impact_score, Some(7.0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn empty_adapter_still_completes(pool: PgPool) {
    let a = seed_competitor(&pool, "Acme", None).await;
    let b = seed_competitor(&pool, "Bolt", None).await;
    let run_id = seed_run(&pool, &[a, b], json!({})).await;

    let orchestrator = Orchestrator::new(
        pool.clone(),
        Arc::new(StaticSource::empty()),
        Arc::new(empty_model()),
    );
    let report = orchestrator.execute(run_id).await.expect("execute");

    let run = db::get_analysis_run(&pool, run_id).await.expect("get run");
    assert_eq!(run.status, "completed");
    assert!(!report.is_degraded());

    assert!(db::list_mentions_for_run(&pool, run_id)
        .await
        .expect("mentions")
        .is_empty());
    assert!(db::list_presence_for_run(&pool, run_id)
        .await
        .expect("presence")
        .is_empty());
    assert!(db::list_insights_for_run(&pool, run_id)
        .await
        .expect("insights")
        .is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn malformed_model_output_is_contained(pool: PgPool) {
    let a = seed_competitor(&pool, "Acme", None).await;
    let run_id = seed_run(&pool, &[a], json!({})).await;

    let model = StaticModel {
        response: "I could not produce JSON this time.".to_string(),
    };
    let orchestrator =
        Orchestrator::new(pool.clone(), Arc::new(StaticSource::empty()), Arc::new(model));
    let report = orchestrator.execute(run_id).await.expect("execute");

    let run = db::get_analysis_run(&pool, run_id).await.expect("get run");
    assert_eq!(run.status, "completed");
    assert_eq!(
        report.synthesize_insights,
        StepOutcome::Completed { records: 0 }
    );
    assert!(db::list_insights_for_run(&pool, run_id)
        .await
        .expect("insights")
        .is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn model_transport_failure_degrades_but_completes(pool: PgPool) {
    let a = seed_competitor(&pool, "Acme", None).await;
    let run_id = seed_run(&pool, &[a], json!({})).await;

    let orchestrator = Orchestrator::new(
        pool.clone(),
        Arc::new(StaticSource::empty()),
        Arc::new(FailingModel),
    );
    let report = orchestrator.execute(run_id).await.expect("execute");

    let run = db::get_analysis_run(&pool, run_id).await.expect("get run");
    assert_eq!(run.status, "completed", "synthesis failure never fails the run");
    assert!(report.synthesize_insights.is_failed());
    assert!(report.is_degraded());
}

#[sqlx::test(migrations = "../../migrations")]
async fn reentry_on_in_progress_run_is_rejected(pool: PgPool) {
    let a = seed_competitor(&pool, "Acme", None).await;
    let run_id = seed_run(&pool, &[a], json!({})).await;

    db::start_analysis_run(&pool, run_id).await.expect("claim run");

    let orchestrator = Orchestrator::new(
        pool.clone(),
        Arc::new(StaticSource::empty()),
        Arc::new(empty_model()),
    );
    let err = orchestrator.execute(run_id).await.expect_err("re-entry");
    assert!(matches!(err, AnalysisError::InvalidTransition(id) if id == run_id));

    // The losing orchestrator must not have touched the run.
    let run = db::get_analysis_run(&pool, run_id).await.expect("get run");
    assert_eq!(run.status, "in_progress");
    assert!(db::list_mentions_for_run(&pool, run_id)
        .await
        .expect("mentions")
        .is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn missing_run_is_reported_without_side_effects(pool: PgPool) {
    let orchestrator = Orchestrator::new(
        pool.clone(),
        Arc::new(StaticSource::empty()),
        Arc::new(empty_model()),
    );
    let err = orchestrator.execute(4242).await.expect_err("missing run");
    assert!(matches!(err, AnalysisError::RunNotFound(4242)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn offerings_extraction_persists_features_and_pricing(pool: PgPool) {
    let acme = seed_competitor(&pool, "Acme", Some("https://acme.test")).await;
    let run_id = seed_run(&pool, &[acme], json!({})).await;

    let orchestrator = Orchestrator::new(
        pool.clone(),
        Arc::new(StaticSource::empty()),
        Arc::new(RoutedModel),
    );
    let report = orchestrator.execute(run_id).await.expect("execute");

    assert!(!report.is_degraded());
    assert_eq!(
        report.competitors[0].extract_offerings,
        StepOutcome::Completed { records: 3 }
    );

    let features = db::list_features_for_run(&pool, run_id).await.expect("features");
    assert_eq!(features.len(), 2);
    assert_eq!(features[0].feature_name, "SSO");
    assert_eq!(features[0].category.as_deref(), Some("security"));
    assert_eq!(features[1].feature_name, "Audit log");
    assert!(features.iter().all(|f| f.is_available));
    assert!(features.iter().all(|f| f.competitor_id == acme));

    let plans = db::list_pricing_for_run(&pool, run_id).await.expect("pricing");
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].plan_name.as_deref(), Some("Pro"));
    assert_eq!(plans[0].price, Some(49.0));
    assert_eq!(plans[0].currency.as_deref(), Some("USD"));
    assert_eq!(plans[0].billing_period.as_deref(), Some("monthly"));
    assert_eq!(
        plans[0].plan_features,
        Some(json!(["SSO", "Audit log"]))
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn synthesis_context_carries_offerings_and_clipped_mentions(pool: PgPool) {
    let acme = seed_competitor(&pool, "Acme", Some("https://acme.test")).await;
    let run_id = seed_run(&pool, &[acme], json!({"days_back": 7})).await;

    let long_body = "x".repeat(800);
    let source = StaticSource::with(
        "Acme",
        vec![Article {
            content: Some(long_body),
            ..article("a1", 1, Some(0.5))
        }],
    );
    let orchestrator = Orchestrator::new(pool.clone(), Arc::new(source), Arc::new(RoutedModel));
    orchestrator.execute(run_id).await.expect("execute");

    let context = rivalscope_analysis::build_context(&pool, run_id)
        .await
        .expect("context");

    let body = context.mentions[0].content.as_deref().expect("mention body");
    assert_eq!(body.chars().count(), rivalscope_analysis::MENTION_CONTENT_WIDTH);

    assert_eq!(context.features.len(), 2);
    assert_eq!(context.features[0].feature_name, "SSO");
    assert_eq!(context.pricing.len(), 1);
    assert_eq!(context.pricing[0].plan_name.as_deref(), Some("Pro"));
    assert_eq!(context.pricing[0].currency.as_deref(), Some("USD"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn repeated_presence_computation_appends_identical_rows(pool: PgPool) {
    let a = seed_competitor(&pool, "Acme", Some("https://acme.test")).await;
    let run_id = seed_run(&pool, &[a], json!({"days_back": 7})).await;

    let source = StaticSource::with(
        "Acme",
        vec![article("a1", 1, Some(0.4)), article("a2", 2, Some(0.6))],
    );
    let orchestrator =
        Orchestrator::new(pool.clone(), Arc::new(source), Arc::new(empty_model()));
    orchestrator.execute(run_id).await.expect("execute");

    // Recompute from the same stored mentions, as a re-run of the step would.
    let window_end = Utc::now();
    let window_start = window_end - Duration::days(7);
    let mentions = db::list_mentions_in_window(&pool, a, run_id, window_start, window_end)
        .await
        .expect("mentions");
    let scores: Vec<Option<f64>> = mentions.iter().map(|m| m.sentiment_score).collect();
    let stats = rivalscope_analysis::summarize_presence(&scores).expect("stats");
    db::insert_presence_summary(
        &pool,
        a,
        run_id,
        stats.mention_count,
        stats.sentiment_average,
        stats.visibility_score,
        stats.trend_direction.as_str(),
        window_start,
        window_end,
    )
    .await
    .expect("append summary");

    let rows = db::list_presence_for_run(&pool, run_id).await.expect("presence");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].mention_count, rows[1].mention_count);
    assert_eq!(rows[0].sentiment_average, rows[1].sentiment_average);
    assert_eq!(rows[0].visibility_score, rows[1].visibility_score);
    assert_eq!(rows[0].trend_direction, rows[1].trend_direction);
}
