use axum::Json;
use axum::extract::State;

use crate::error::AppError;
use crate::routes::AppState;
use crate::scheduler::{CycleResult, SchedulerConfigUpdate, SchedulerStatus, TriggerOutcome};

/// POST /api/v1/scrape
///
/// Run one scrape cycle now. Returns 409 while another cycle is running.
/// A failed cycle is still a 200; check `success` in the body.
pub async fn trigger(State(state): State<AppState>) -> Result<Json<CycleResult>, AppError> {
    match state.scheduler.trigger_manual_scraping().await {
        TriggerOutcome::Completed(result) => Ok(Json(result)),
        TriggerOutcome::Busy => Err(AppError::Conflict(
            "A scrape cycle is already running".to_string(),
        )),
    }
}

pub async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

pub async fn start(State(state): State<AppState>) -> Json<serde_json::Value> {
    let started = state.scheduler.start();
    Json(serde_json::json!({
        "started": started,
        "status": state.scheduler.status(),
    }))
}

pub async fn stop(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stopped = state.scheduler.stop();
    Json(serde_json::json!({
        "stopped": stopped,
        "status": state.scheduler.status(),
    }))
}

pub async fn update_config(
    State(state): State<AppState>,
    Json(input): Json<SchedulerConfigUpdate>,
) -> Result<Json<SchedulerStatus>, AppError> {
    let status = state.scheduler.update_config(input)?;
    Ok(Json(status))
}
