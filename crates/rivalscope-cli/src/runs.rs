//! Analysis-run command handlers.

use rivalscope_analysis::{Orchestrator, StepOutcome};
use sqlx::PgPool;

/// Create a run and print its id.
///
/// # Errors
///
/// Returns an error if the insert fails (including unknown competitor ids).
pub(crate) async fn run_create(
    pool: &PgPool,
    name: &str,
    competitor_ids: &[i64],
    days_back: Option<i64>,
) -> anyhow::Result<i64> {
    let parameters = match days_back {
        Some(days) => serde_json::json!({ "days_back": days }),
        None => serde_json::json!({}),
    };

    let run = rivalscope_db::create_analysis_run(
        pool,
        rivalscope_db::NewAnalysisRun {
            name,
            competitor_ids,
            parameters,
            created_by: Some("cli"),
        },
    )
    .await?;

    println!(
        "created run {} ({}) over {} competitor(s)",
        run.id,
        run.name,
        competitor_ids.len()
    );
    Ok(run.id)
}

/// Execute a run and print its per-step report.
///
/// # Errors
///
/// Returns an error if the run is missing, already claimed, or the
/// orchestrator faults.
pub(crate) async fn run_execute(
    pool: &PgPool,
    orchestrator: Orchestrator,
    run_id: i64,
) -> anyhow::Result<()> {
    let report = orchestrator.execute(run_id).await?;

    println!(
        "{:<10}{:<25}{:<20}{:<20}{:<20}PRESENCE",
        "ID", "COMPETITOR", "NEWS", "WEB", "OFFERINGS"
    );
    for competitor in &report.competitors {
        println!(
            "{:<10}{:<25}{:<20}{:<20}{:<20}{}",
            competitor.competitor_id,
            competitor.competitor_name,
            outcome_label(&competitor.collect_news),
            outcome_label(&competitor.extract_web_content),
            outcome_label(&competitor.extract_offerings),
            outcome_label(&competitor.compute_presence),
        );
    }
    println!("synthesis: {}", outcome_label(&report.synthesize_insights));

    let run = rivalscope_db::get_analysis_run(pool, run_id).await?;
    if report.is_degraded() {
        println!(
            "run {} {} with {} failed step(s)",
            run.id,
            run.status,
            report.failed_step_count()
        );
    } else {
        println!("run {} {}", run.id, run.status);
    }

    Ok(())
}

/// List recent runs.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_list(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
) -> anyhow::Result<()> {
    let runs = rivalscope_db::list_analysis_runs(pool, status, limit.clamp(1, 200)).await?;

    if runs.is_empty() {
        println!(
            "no analysis runs found{}",
            status.map(|s| format!(" with status '{s}'")).unwrap_or_default()
        );
        return Ok(());
    }

    println!("{:<8}{:<30}{:<14}CREATED", "ID", "NAME", "STATUS");
    for run in &runs {
        println!(
            "{:<8}{:<30}{:<14}{}",
            run.id,
            run.name,
            run.status,
            run.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

/// Show one run's lifecycle fields.
///
/// # Errors
///
/// Returns an error if the run is missing or the query fails.
pub(crate) async fn run_status(pool: &PgPool, run_id: i64) -> anyhow::Result<()> {
    let run = rivalscope_db::get_analysis_run(pool, run_id).await?;

    println!("run:        {} ({})", run.id, run.name);
    println!("status:     {}", run.status);
    println!(
        "started:    {}",
        run.started_at
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string())
    );
    println!(
        "completed:  {}",
        run.completed_at
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string())
    );
    if let Some(error) = &run.error_message {
        println!("error:      {error}");
    }

    Ok(())
}

/// Print one export file (CSV) or the plain-text report to stdout.
///
/// # Errors
///
/// Returns an error if the run is missing, the file name is unknown, or a
/// query fails.
pub(crate) async fn run_export(pool: &PgPool, run_id: i64, file: &str) -> anyhow::Result<()> {
    let run = rivalscope_db::get_analysis_run(pool, run_id).await?;

    let body = match file {
        "competitors" => {
            rivalscope_export::competitors_overview_csv(&run_competitors(pool, run_id).await?)
        }
        "mentions" => rivalscope_export::news_mentions_csv(
            &rivalscope_db::list_mentions_for_run(pool, run_id).await?,
        ),
        "presence" => rivalscope_export::sentiment_analysis_csv(
            &rivalscope_db::list_presence_for_run(pool, run_id).await?,
        ),
        "insights" => rivalscope_export::insights_csv(
            &rivalscope_db::list_insights_for_run(pool, run_id).await?,
        ),
        "opportunities" => rivalscope_export::opportunities_csv(
            &rivalscope_db::list_opportunities_for_run(pool, run_id).await?,
        ),
        "report" => rivalscope_export::render_run_report(
            &run,
            &run_competitors(pool, run_id).await?,
            &rivalscope_db::list_presence_for_run(pool, run_id).await?,
            &rivalscope_db::list_mentions_for_run(pool, run_id).await?,
            &rivalscope_db::list_insights_for_run(pool, run_id).await?,
            &rivalscope_db::list_opportunities_for_run(pool, run_id).await?,
        ),
        _ => anyhow::bail!(
            "unknown export '{file}'; expected competitors, mentions, presence, insights, opportunities, or report"
        ),
    };

    print!("{body}");
    Ok(())
}

async fn run_competitors(
    pool: &PgPool,
    run_id: i64,
) -> anyhow::Result<Vec<rivalscope_db::CompetitorRow>> {
    let ids = rivalscope_db::list_run_competitor_ids(pool, run_id).await?;
    let mut competitors = Vec::with_capacity(ids.len());
    for id in ids {
        match rivalscope_db::get_competitor(pool, id).await {
            Ok(row) => competitors.push(row),
            Err(rivalscope_db::DbError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(competitors)
}

fn outcome_label(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Completed { records } => format!("ok ({records})"),
        StepOutcome::Skipped { reason } => format!("skipped: {reason}"),
        StepOutcome::Failed { reason } => format!("FAILED: {reason}"),
    }
}
