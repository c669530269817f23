use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::EntityKind;
use crate::storage::{normalize_scope, GLOBAL_SCOPE};

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub region: Option<String>,
}

/// Latest stored snapshot for one entity type and scope.
pub async fn get_stats(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Query(params): Query<StatsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let kind: EntityKind = entity_type
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown entity type: {}", entity_type)))?;

    let requested = params.region.as_deref().unwrap_or(GLOBAL_SCOPE);
    let scope = normalize_scope(requested)
        .map_err(|_| ApiError::BadRequest(format!("Unknown region: {}", requested)))?;

    let payload = state
        .store
        .get_stats(kind, scope)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No {} stats for {}", kind, scope)))?;

    Ok((
        [(header::CACHE_CONTROL, state.cache_control.clone())],
        Json(payload),
    ))
}
