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
pub(super) struct CompetitorsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateCompetitorBody {
    pub name: String,
    pub website_url: Option<String>,
    pub twitter_url: Option<String>,
    pub instagram_url: Option<String>,
    pub facebook_url: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateCompetitorBody {
    pub name: Option<String>,
    pub website_url: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct CompetitorItem {
    id: i64,
    name: String,
    website_url: Option<String>,
    industry: Option<String>,
    description: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<rivalscope_db::CompetitorRow> for CompetitorItem {
    fn from(row: rivalscope_db::CompetitorRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            website_url: row.website_url,
            industry: row.industry,
            description: row.description,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(super) async fn list_competitors(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CompetitorsQuery>,
) -> Result<Json<ApiResponse<Vec<CompetitorItem>>>, ApiError> {
    let rows = rivalscope_db::list_competitors(
        &state.pool,
        query.status.as_deref(),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(CompetitorItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn create_competitor(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateCompetitorBody>,
) -> Result<(StatusCode, Json<ApiResponse<CompetitorItem>>), ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "name must not be empty",
        ));
    }

    let row = rivalscope_db::create_competitor(
        &state.pool,
        rivalscope_db::NewCompetitor {
            name,
            website_url: body.website_url.as_deref(),
            twitter_url: body.twitter_url.as_deref(),
            instagram_url: body.instagram_url.as_deref(),
            facebook_url: body.facebook_url.as_deref(),
            industry: body.industry.as_deref(),
            description: body.description.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: CompetitorItem::from(row),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

pub(super) async fn get_competitor(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CompetitorItem>>, ApiError> {
    let row = rivalscope_db::get_competitor(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: CompetitorItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn update_competitor(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCompetitorBody>,
) -> Result<Json<ApiResponse<CompetitorItem>>, ApiError> {
    let row = rivalscope_db::update_competitor(
        &state.pool,
        id,
        rivalscope_db::CompetitorUpdate {
            name: body.name.as_deref(),
            website_url: body.website_url.as_deref(),
            industry: body.industry.as_deref(),
            description: body.description.as_deref(),
            status: body.status.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: CompetitorItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn delete_competitor(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    rivalscope_db::delete_competitor(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn competitor_item_is_serializable() {
        let item = CompetitorItem {
            id: 7,
            name: "Acme".to_string(),
            website_url: Some("https://acme.test".to_string()),
            industry: None,
            description: None,
            status: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&item).expect("serialize competitor");
        assert!(json.contains("\"name\":\"Acme\""));
        assert!(json.contains("\"status\":\"active\""));
    }
}
