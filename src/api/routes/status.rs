use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::routes::cron::RefreshState;
use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::RegionStatus;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub regions: Vec<RegionStatus>,
    pub refresh: RefreshState,
}

/// Last recorded outcome per region plus the state of the refresh trigger.
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let regions = state
        .store
        .region_statuses()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let refresh = state.refresh_state.read().await.clone();

    Ok(Json(StatusResponse { regions, refresh }))
}
