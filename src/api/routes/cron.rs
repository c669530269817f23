use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::pipeline::RefreshSummary;

// ── Types ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshState {
    pub status: RefreshStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<RefreshSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

// ── Auth ─────────────────────────────────────────────────────────

/// Accept only `Authorization: Bearer <secret>`.
fn authorize(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let Some(secret) = secret else {
        warn!("Cron secret is not configured; rejecting refresh trigger");
        return Err(ApiError::Unauthorized("Refresh trigger is disabled".to_string()));
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if secrets_match(token, secret) => Ok(()),
        _ => Err(ApiError::Unauthorized("Invalid cron secret".to_string())),
    }
}

/// Constant-time comparison over digests, so neither content nor length leaks.
fn secrets_match(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided.as_slice().ct_eq(expected.as_slice()).into()
}

// ── Trigger ──────────────────────────────────────────────────────

/// Run one refresh and report its summary.
///
/// The job runs in its own task, which also records the final state, so a
/// dropped connection cannot leave the state stuck at `running`.
pub async fn refresh(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<RefreshSummary>, ApiError> {
    authorize(&headers, state.cron_secret.as_deref())?;

    {
        let mut refresh = state.refresh_state.write().await;
        if refresh.status == RefreshStatus::Running {
            return Err(ApiError::Conflict("Refresh already running".to_string()));
        }
        *refresh = RefreshState {
            status: RefreshStatus::Running,
            started_at: Some(Utc::now()),
            ..RefreshState::default()
        };
    }

    info!("Cron refresh triggered");
    let task = tokio::spawn(run_and_record(state.clone()));

    match task.await {
        Ok(Ok(summary)) => Ok(Json(summary)),
        Ok(Err(message)) => Err(ApiError::Internal(message)),
        Err(e) => Err(ApiError::Internal(format!("Refresh task failed: {}", e))),
    }
}

async fn run_and_record(state: AppState) -> Result<RefreshSummary, String> {
    let job = state.job.clone();
    let inner = tokio::spawn(async move { job.run().await }).await;

    let mut refresh = state.refresh_state.write().await;
    refresh.completed_at = Some(Utc::now());

    match inner {
        Ok(summary) => {
            refresh.status = if summary.success {
                RefreshStatus::Completed
            } else {
                RefreshStatus::Failed
            };
            refresh.last_result = Some(summary.clone());
            info!(
                "Cron refresh done: {} matches from {} regions",
                summary.match_count, summary.regions_processed
            );
            Ok(summary)
        }
        Err(e) => {
            let message = format!("Refresh task failed: {}", e);
            error!("{}", message);
            refresh.status = RefreshStatus::Failed;
            refresh.error = Some(message.clone());
            Err(message)
        }
    }
}
