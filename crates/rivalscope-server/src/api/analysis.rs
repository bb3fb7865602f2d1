use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateRunBody {
    pub name: String,
    pub competitor_ids: Vec<i64>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct RunItem {
    id: i64,
    name: String,
    status: String,
    parameters: serde_json::Value,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct RunStatusItem {
    id: i64,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct MentionItem {
    id: i64,
    competitor_id: i64,
    title: String,
    url: Option<String>,
    source: Option<String>,
    published_at: Option<DateTime<Utc>>,
    sentiment_score: Option<f64>,
    extracted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct PresenceItem {
    competitor_id: i64,
    mention_count: i64,
    sentiment_average: Option<f64>,
    visibility_score: f64,
    trend_direction: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct InsightItem {
    id: i64,
    insight_type: String,
    category: Option<String>,
    title: String,
    description: Option<String>,
    priority: Option<String>,
    recommendation: Option<String>,
    supporting_data: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct OpportunityItem {
    id: i64,
    opportunity_type: Option<String>,
    title: String,
    description: Option<String>,
    competitors_affected: Option<serde_json::Value>,
    impact_score: Option<f64>,
    created_at: DateTime<Utc>,
}

impl From<rivalscope_db::AnalysisRunRow> for RunItem {
    fn from(row: rivalscope_db::AnalysisRunRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            status: row.status,
            parameters: row.parameters,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

pub(super) async fn create_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateRunBody>,
) -> Result<(StatusCode, Json<ApiResponse<RunItem>>), ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "name must not be empty",
        ));
    }
    if body.competitor_ids.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "competitor_ids must not be empty",
        ));
    }

    let row = rivalscope_db::create_analysis_run(
        &state.pool,
        rivalscope_db::NewAnalysisRun {
            name,
            competitor_ids: &body.competitor_ids,
            parameters: body.parameters.unwrap_or_else(|| serde_json::json!({})),
            created_by: body.created_by.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    // Execution happens off the request path; the caller polls the status
    // endpoint. The spawned task records its own outcome on the run row.
    let orchestrator = state.orchestrator.clone();
    let run_id = row.id;
    tokio::spawn(async move {
        if let Err(e) = orchestrator.execute(run_id).await {
            tracing::error!(run_id, error = %e, "background run execution failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: RunItem::from(row),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<RunItem>>>, ApiError> {
    let rows = rivalscope_db::list_analysis_runs(
        &state.pool,
        query.status.as_deref(),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(RunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<RunItem>>, ApiError> {
    let row = load_run(&state, &req_id, id).await?;

    Ok(Json(ApiResponse {
        data: RunItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn run_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<RunStatusItem>>, ApiError> {
    let row = load_run(&state, &req_id, id).await?;

    Ok(Json(ApiResponse {
        data: RunStatusItem {
            id: row.id,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn delete_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    match rivalscope_db::delete_analysis_run(&state.pool, id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(rivalscope_db::DbError::NotFound) => {
            Err(ApiError::new(req_id.0, "not_found", "run not found"))
        }
        Err(e) => Err(map_db_error(req_id.0, &e)),
    }
}

pub(super) async fn list_run_mentions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<MentionItem>>>, ApiError> {
    load_run(&state, &req_id, id).await?;
    let rows = rivalscope_db::list_mentions_for_run(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| MentionItem {
            id: row.id,
            competitor_id: row.competitor_id,
            title: row.title,
            url: row.url,
            source: row.source,
            published_at: row.published_at,
            sentiment_score: row.sentiment_score,
            extracted_at: row.extracted_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_run_presence(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<PresenceItem>>>, ApiError> {
    load_run(&state, &req_id, id).await?;
    let rows = rivalscope_db::list_presence_for_run(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| PresenceItem {
            competitor_id: row.competitor_id,
            mention_count: row.mention_count,
            sentiment_average: row.sentiment_average,
            visibility_score: row.visibility_score,
            trend_direction: row.trend_direction,
            period_start: row.period_start,
            period_end: row.period_end,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_run_insights(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<InsightItem>>>, ApiError> {
    load_run(&state, &req_id, id).await?;
    let rows = rivalscope_db::list_insights_for_run(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| InsightItem {
            id: row.id,
            insight_type: row.insight_type,
            category: row.category,
            title: row.title,
            description: row.description,
            priority: row.priority,
            recommendation: row.recommendation,
            supporting_data: row.supporting_data,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_run_opportunities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<OpportunityItem>>>, ApiError> {
    load_run(&state, &req_id, id).await?;
    let rows = rivalscope_db::list_opportunities_for_run(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| OpportunityItem {
            id: row.id,
            opportunity_type: row.opportunity_type,
            title: row.title,
            description: row.description,
            competitors_affected: row.competitors_affected,
            impact_score: row.impact_score,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn load_run(
    state: &AppState,
    req_id: &RequestId,
    id: i64,
) -> Result<rivalscope_db::AnalysisRunRow, ApiError> {
    match rivalscope_db::get_analysis_run(&state.pool, id).await {
        Ok(row) => Ok(row),
        Err(rivalscope_db::DbError::NotFound) => Err(ApiError::new(
            req_id.0.clone(),
            "not_found",
            "run not found",
        )),
        Err(e) => Err(map_db_error(req_id.0.clone(), &e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_item_is_serializable() {
        let item = RunItem {
            id: 3,
            name: "quarterly sweep".to_string(),
            status: "pending".to_string(),
            parameters: serde_json::json!({"days_back": 7}),
            started_at: None,
            completed_at: None,
            error_message: None,
            created_by: Some("cli".to_string()),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&item).expect("serialize run");
        assert!(json.contains("\"status\":\"pending\""));
        assert!(json.contains("\"days_back\":7"));
    }

    #[test]
    fn presence_item_is_serializable() {
        let item = PresenceItem {
            competitor_id: 1,
            mention_count: 3,
            sentiment_average: None,
            visibility_score: 6.0,
            trend_direction: "stable".to_string(),
            period_start: Utc::now(),
            period_end: Utc::now(),
        };

        let json = serde_json::to_string(&item).expect("serialize presence");
        assert!(json.contains("\"sentiment_average\":null"));
        assert!(json.contains("\"trend_direction\":\"stable\""));
    }
}
