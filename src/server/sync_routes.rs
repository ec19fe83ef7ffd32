//! Sync HTTP routes.
//!
//! Provides endpoints for:
//! - Triggering a sync
//! - Polling the current sync status
//! - Reading the sync history

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::server::state::{GuardedSyncManager, GuardedSyncStore};
use crate::sync::{SyncOperation, SyncRecord, TriggerOutcome};

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub operation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Progress fields for the polling reader.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tab: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub albums_processed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_albums: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    /// Timestamp of the last successful sync, when idle. Absent means the
    /// catalog has never been synced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_successful_sync: Option<i64>,
}

impl StatusResponse {
    fn from_active(op: &SyncOperation) -> Self {
        Self {
            active: true,
            status: Some(op.status.as_str()),
            stage: op.stage.map(|s| s.as_str()),
            stage_message: Some(op.stage_message.clone()),
            current_tab: Some(op.current_tab.clone()),
            albums_processed: Some(op.albums_processed),
            total_albums: op.total_albums,
            progress_percentage: op.progress_percentage(),
            duration_ms: Some(op.duration_ms()),
            last_successful_sync: None,
        }
    }

    fn idle(last_successful_sync: Option<i64>) -> Self {
        Self {
            active: false,
            status: None,
            stage: None,
            stage_message: None,
            current_tab: None,
            albums_processed: None,
            total_albums: None,
            progress_percentage: None,
            duration_ms: None,
            last_successful_sync,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub records: Vec<SyncRecord>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

/// POST /v1/sync/trigger - Start a sync if none is active.
pub async fn trigger_sync(State(manager): State<GuardedSyncManager>) -> impl IntoResponse {
    match manager.trigger() {
        Ok(TriggerOutcome::Accepted { operation_id }) => {
            (StatusCode::ACCEPTED, Json(TriggerResponse { operation_id })).into_response()
        }
        Ok(TriggerOutcome::AlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "A sync is already running".to_string(),
            }),
        )
            .into_response(),
        Ok(TriggerOutcome::ConfigError(msg)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse { error: msg }),
        )
            .into_response(),
        Err(e) => {
            error!("Sync trigger failed: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /v1/sync/status - Current sync progress, or idle summary.
pub async fn sync_status(State(store): State<GuardedSyncStore>) -> impl IntoResponse {
    match store.current_active_operation() {
        Ok(Some(op)) => Json(StatusResponse::from_active(&op)).into_response(),
        Ok(None) => match store.last_successful_sync() {
            Ok(last) => {
                Json(StatusResponse::idle(last.map(|r| r.sync_timestamp))).into_response()
            }
            Err(e) => {
                error!("Failed to read sync history: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Err(e) => {
            error!("Failed to read sync status: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /v1/sync/history - Past sync runs, newest first.
pub async fn sync_history(
    State(store): State<GuardedSyncStore>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    match store.list_records(query.limit.min(100)) {
        Ok(records) => Json(HistoryResponse { records }).into_response(),
        Err(e) => {
            error!("Failed to list sync records: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
