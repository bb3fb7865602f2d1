use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension,
};

use crate::middleware::RequestId;

use super::{analysis::load_run, map_db_error, ApiError, AppState};

/// `GET /analysis/runs/{id}/export/{file}` — one CSV per call.
pub(super) async fn export_csv(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((id, file)): Path<(i64, String)>,
) -> Result<impl IntoResponse, ApiError> {
    load_run(&state, &req_id, id).await?;

    let body = match file.as_str() {
        "competitors" => {
            let competitors = load_run_competitors(&state, &req_id, id).await?;
            rivalscope_export::competitors_overview_csv(&competitors)
        }
        "mentions" => {
            let rows = rivalscope_db::list_mentions_for_run(&state.pool, id)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            rivalscope_export::news_mentions_csv(&rows)
        }
        "presence" => {
            let rows = rivalscope_db::list_presence_for_run(&state.pool, id)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            rivalscope_export::sentiment_analysis_csv(&rows)
        }
        "insights" => {
            let rows = rivalscope_db::list_insights_for_run(&state.pool, id)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            rivalscope_export::insights_csv(&rows)
        }
        "opportunities" => {
            let rows = rivalscope_db::list_opportunities_for_run(&state.pool, id)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
            rivalscope_export::opportunities_csv(&rows)
        }
        _ => {
            return Err(ApiError::new(
                req_id.0,
                "not_found",
                format!("unknown export file '{file}'"),
            ));
        }
    };

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        body,
    ))
}

/// `GET /analysis/runs/{id}/report` — plain-text report.
pub(super) async fn run_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let run = load_run(&state, &req_id, id).await?;
    let competitors = load_run_competitors(&state, &req_id, id).await?;
    let presence = rivalscope_db::list_presence_for_run(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let mentions = rivalscope_db::list_mentions_for_run(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let insights = rivalscope_db::list_insights_for_run(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let opportunities = rivalscope_db::list_opportunities_for_run(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let body = rivalscope_export::render_run_report(
        &run,
        &competitors,
        &presence,
        &mentions,
        &insights,
        &opportunities,
    );

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    ))
}

async fn load_run_competitors(
    state: &AppState,
    req_id: &RequestId,
    run_id: i64,
) -> Result<Vec<rivalscope_db::CompetitorRow>, ApiError> {
    let ids = rivalscope_db::list_run_competitor_ids(&state.pool, run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let mut competitors = Vec::with_capacity(ids.len());
    for id in ids {
        match rivalscope_db::get_competitor(&state.pool, id).await {
            Ok(row) => competitors.push(row),
            // Deleted since the run was created; omit from the export.
            Err(rivalscope_db::DbError::NotFound) => {}
            Err(e) => return Err(map_db_error(req_id.0.clone(), &e)),
        }
    }

    Ok(competitors)
}
