//! The run orchestrator.
//!
//! Drives one analysis run through its lifecycle: claim the pending run,
//! execute the per-competitor collection steps with failure containment,
//! hit the synthesis barrier, and close the run out. Step errors become
//! [`StepOutcome::Failed`] entries in the report; only a fault in the
//! driving loop itself (a database error outside any step) fails the run.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;

use rivalscope_db::{self as db, AnalysisRunRow, CompetitorRow, DbError, NewMention};
use rivalscope_source::{SourceAdapter, PAGE_TYPES};

use crate::error::AnalysisError;
use crate::extract::extract_offerings;
use crate::llm::InsightModel;
use crate::presence::summarize_presence;
use crate::report::{CompetitorReport, RunReport, StepOutcome};
use crate::synthesize::synthesize_insights;

const DEFAULT_DAYS_BACK: i64 = 30;

/// Executes analysis runs against a pool, a signal source, and a model.
#[derive(Clone)]
pub struct Orchestrator {
    pool: PgPool,
    source: Arc<dyn SourceAdapter>,
    model: Arc<dyn InsightModel>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(pool: PgPool, source: Arc<dyn SourceAdapter>, model: Arc<dyn InsightModel>) -> Self {
        Self {
            pool,
            source,
            model,
        }
    }

    /// Executes one run end to end and returns its report.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::RunNotFound`] if the run does not exist,
    /// [`AnalysisError::InvalidTransition`] if it is not `pending` (a second
    /// orchestrator on an `in_progress` run is rejected here), and
    /// [`AnalysisError::Db`] on an orchestrator-level fault, in which case
    /// the run is marked `failed` with the fault message before returning.
    pub async fn execute(&self, run_id: i64) -> Result<RunReport, AnalysisError> {
        let run = match db::get_analysis_run(&self.pool, run_id).await {
            Ok(run) => run,
            Err(DbError::NotFound) => return Err(AnalysisError::RunNotFound(run_id)),
            Err(e) => return Err(e.into()),
        };

        match db::start_analysis_run(&self.pool, run.id).await {
            Ok(()) => {}
            Err(DbError::InvalidRunTransition { .. }) => {
                return Err(AnalysisError::InvalidTransition(run.id));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(run_id = run.id, name = %run.name, "analysis run started");

        match self.drive(&run).await {
            Ok(report) => {
                if report.is_degraded() {
                    tracing::warn!(
                        run_id = run.id,
                        failed_steps = report.failed_step_count(),
                        "analysis run completed with contained step failures"
                    );
                } else {
                    tracing::info!(run_id = run.id, "analysis run completed");
                }
                Ok(report)
            }
            Err(e) => {
                tracing::error!(run_id = run.id, error = %e, "analysis run faulted");
                if let Err(fail_err) =
                    db::fail_analysis_run(&self.pool, run.id, &e.to_string()).await
                {
                    tracing::error!(
                        run_id = run.id,
                        error = %fail_err,
                        "could not record run failure"
                    );
                }
                Err(e)
            }
        }
    }

    /// The driving loop proper. Any error escaping this function is an
    /// orchestrator fault and fails the run.
    async fn drive(&self, run: &AnalysisRunRow) -> Result<RunReport, AnalysisError> {
        let days_back = resolve_days_back(&run.parameters);
        let period_end = Utc::now();
        let period_start = period_end - Duration::days(days_back);

        let competitor_ids = db::list_run_competitor_ids(&self.pool, run.id).await?;

        let mut competitors = Vec::with_capacity(competitor_ids.len());
        for competitor_id in competitor_ids {
            let competitor = match db::get_competitor(&self.pool, competitor_id).await {
                Ok(row) => row,
                Err(DbError::NotFound) => {
                    // Deleted after the run was created. Not a fault.
                    tracing::warn!(
                        run_id = run.id,
                        competitor_id,
                        "linked competitor no longer exists; skipping"
                    );
                    let gone = StepOutcome::skipped("competitor no longer exists");
                    competitors.push(CompetitorReport {
                        competitor_id,
                        competitor_name: String::new(),
                        collect_news: gone.clone(),
                        extract_web_content: gone.clone(),
                        extract_offerings: gone.clone(),
                        compute_presence: gone,
                    });
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let collect_news = self.collect_news(run.id, &competitor, days_back).await;
            let (extract_web_content, pages) = self.extract_web_content(run.id, &competitor).await;
            let extract_offerings = self.extract_offerings(run.id, &competitor, &pages).await;
            let compute_presence = self
                .compute_presence(run.id, &competitor, period_start, period_end)
                .await;

            competitors.push(CompetitorReport {
                competitor_id: competitor.id,
                competitor_name: competitor.name,
                collect_news,
                extract_web_content,
                extract_offerings,
                compute_presence,
            });
        }

        // Synthesis barrier: runs once, after every competitor's data is in.
        let synthesize_insights = match synthesize_insights(&self.pool, &*self.model, run.id).await
        {
            Ok(counts) => StepOutcome::Completed {
                records: counts.total(),
            },
            Err(e) => {
                tracing::warn!(run_id = run.id, error = %e, "synthesis step failed");
                StepOutcome::failed(e.to_string())
            }
        };

        db::complete_analysis_run(&self.pool, run.id).await?;

        Ok(RunReport {
            run_id: run.id,
            competitors,
            synthesize_insights,
        })
    }

    async fn collect_news(
        &self,
        run_id: i64,
        competitor: &CompetitorRow,
        days_back: i64,
    ) -> StepOutcome {
        let articles = self.source.search_news(&competitor.name, days_back).await;

        let mut records = 0;
        for article in &articles {
            let result = db::insert_mention(
                &self.pool,
                NewMention {
                    competitor_id: competitor.id,
                    run_id,
                    title: &article.title,
                    url: article.url.as_deref(),
                    source: article.source.as_deref(),
                    published_at: article.published_at,
                    content: article.content.as_deref(),
                    sentiment_score: article.sentiment_score,
                },
            )
            .await;

            match result {
                Ok(_) => records += 1,
                Err(e) => {
                    tracing::warn!(
                        run_id,
                        competitor_id = competitor.id,
                        error = %e,
                        "news collection failed mid-step"
                    );
                    return StepOutcome::failed(e.to_string());
                }
            }
        }

        StepOutcome::Completed { records }
    }

    /// Fetches and stores the fixed page set, returning the stored payloads
    /// alongside the outcome so the offerings step can reuse them. A failed
    /// step still returns what it collected before the error.
    async fn extract_web_content(
        &self,
        run_id: i64,
        competitor: &CompetitorRow,
    ) -> (StepOutcome, Vec<Value>) {
        let Some(website) = competitor
            .website_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
        else {
            return (StepOutcome::skipped("no website on file"), Vec::new());
        };

        let base = website.trim_end_matches('/');
        let mut pages = Vec::new();
        for page_type in PAGE_TYPES {
            let url = if page_type == "homepage" {
                format!("{base}/")
            } else {
                format!("{base}/{page_type}")
            };

            let page = self.source.fetch_page(&url).await;
            let payload = page_payload(&url, &page);

            match db::insert_content_page(&self.pool, competitor.id, run_id, page_type, &payload)
                .await
            {
                Ok(_) => pages.push(payload),
                Err(e) => {
                    tracing::warn!(
                        run_id,
                        competitor_id = competitor.id,
                        page_type,
                        error = %e,
                        "content extraction failed mid-step"
                    );
                    return (StepOutcome::failed(e.to_string()), pages);
                }
            }
        }

        let records = pages.len();
        (StepOutcome::Completed { records }, pages)
    }

    async fn extract_offerings(
        &self,
        run_id: i64,
        competitor: &CompetitorRow,
        pages: &[Value],
    ) -> StepOutcome {
        if pages.is_empty() {
            return StepOutcome::skipped("no page content collected");
        }

        match extract_offerings(&self.pool, &*self.model, run_id, competitor.id, pages).await {
            Ok(counts) => StepOutcome::Completed {
                records: counts.total(),
            },
            Err(e) => {
                tracing::warn!(
                    run_id,
                    competitor_id = competitor.id,
                    error = %e,
                    "offerings extraction failed"
                );
                StepOutcome::failed(e.to_string())
            }
        }
    }

    async fn compute_presence(
        &self,
        run_id: i64,
        competitor: &CompetitorRow,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> StepOutcome {
        let mentions = match db::list_mentions_in_window(
            &self.pool,
            competitor.id,
            run_id,
            period_start,
            period_end,
        )
        .await
        {
            Ok(rows) => rows,
            Err(e) => return StepOutcome::failed(e.to_string()),
        };

        let scores: Vec<Option<f64>> = mentions.iter().map(|m| m.sentiment_score).collect();
        let Some(stats) = summarize_presence(&scores) else {
            // No in-window mentions: a successful no-op, no row stored.
            return StepOutcome::Completed { records: 0 };
        };

        match db::insert_presence_summary(
            &self.pool,
            competitor.id,
            run_id,
            stats.mention_count,
            stats.sentiment_average,
            stats.visibility_score,
            stats.trend_direction.as_str(),
            period_start,
            period_end,
        )
        .await
        {
            Ok(_) => StepOutcome::Completed { records: 1 },
            Err(e) => StepOutcome::failed(e.to_string()),
        }
    }
}

/// Reads `days_back` from the run parameters, falling back to the default
/// when the key is absent, non-numeric, or not positive.
fn resolve_days_back(parameters: &Value) -> i64 {
    parameters
        .get("days_back")
        .and_then(Value::as_i64)
        .filter(|days| *days > 0)
        .unwrap_or(DEFAULT_DAYS_BACK)
}

/// Shapes a fetched page into the stored JSONB payload. Structured content
/// passes through as-is; a failed fetch stores its error marker; anything
/// else is wrapped as text.
fn page_payload(url: &str, page: &rivalscope_source::PageContent) -> Value {
    if let Some(error) = &page.error {
        return json!({ "url": url, "error": error });
    }
    match &page.content {
        Value::Object(_) | Value::Array(_) => page.content.clone(),
        Value::String(text) => json!({ "url": url, "text": text }),
        other => json!({ "url": url, "text": other.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_back_defaults_when_absent_or_invalid() {
        assert_eq!(resolve_days_back(&json!({})), 30);
        assert_eq!(resolve_days_back(&json!({"days_back": "soon"})), 30);
        assert_eq!(resolve_days_back(&json!({"days_back": -5})), 30);
        assert_eq!(resolve_days_back(&json!({"days_back": 0})), 30);
        assert_eq!(resolve_days_back(&json!(null)), 30);
    }

    #[test]
    fn days_back_accepts_positive_integers() {
        assert_eq!(resolve_days_back(&json!({"days_back": 7})), 7);
        assert_eq!(resolve_days_back(&json!({"days_back": 365})), 365);
    }

    #[test]
    fn page_payload_passes_objects_through() {
        let page = rivalscope_source::PageContent {
            url: "https://x.test/pricing".to_string(),
            content: json!({"text": "Pricing"}),
            error: None,
        };
        assert_eq!(
            page_payload("https://x.test/pricing", &page),
            json!({"text": "Pricing"})
        );
    }

    #[test]
    fn page_payload_wraps_scalars_as_text() {
        let page = rivalscope_source::PageContent {
            url: "https://x.test/about".to_string(),
            content: json!("About us"),
            error: None,
        };
        assert_eq!(
            page_payload("https://x.test/about", &page),
            json!({"url": "https://x.test/about", "text": "About us"})
        );
    }

    #[test]
    fn page_payload_records_fetch_errors() {
        let page = rivalscope_source::PageContent::empty_with_error(
            "https://x.test/features",
            "provider returned 500".to_string(),
        );
        assert_eq!(
            page_payload("https://x.test/features", &page),
            json!({"url": "https://x.test/features", "error": "provider returned 500"})
        );
    }
}
