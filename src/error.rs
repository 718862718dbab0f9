use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// One source adapter failed. Isolated to that source; the cycle continues.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{source_name}: request failed: {error}")]
    Request {
        source_name: String,
        #[source]
        error: reqwest::Error,
    },

    #[error("{source_name}: upstream returned {status}")]
    Status {
        source_name: String,
        status: reqwest::StatusCode,
    },

    #[error("{source_name}: failed to parse response: {message}")]
    Parse { source_name: String, message: String },

    #[error("{source_name}: invalid selector '{selector}'")]
    Selector { source_name: String, selector: String },
}

/// Snapshot file store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot not found: {0}")]
    NotFound(String),

    #[error("Snapshot {name} is corrupt: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid snapshot name: {0}")]
    InvalidName(String),

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why a whole scrape cycle failed.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("No sources configured")]
    NoSources,

    #[error("All {0} sources failed")]
    AllSourcesFailed(usize),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler interval must be between one second and 365 days")]
    InvalidInterval,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Store(e) => match e {
                StoreError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                StoreError::InvalidName(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                _ => {
                    tracing::error!("Store error: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            AppError::Scheduler(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };

        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
