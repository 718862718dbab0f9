use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::record::ScrapedRecord;
use crate::models::snapshot::Snapshot;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub filenames: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    pub total_jobs: usize,
    pub jobs: Vec<ScrapedRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneRequest {
    pub keep_last: Option<usize>,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let names = state.store.list_available().await?;
    Ok(Json(names))
}

pub async fn get(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Snapshot>, AppError> {
    let snapshot = state.store.load_snapshot(&name).await?;
    Ok(Json(snapshot))
}

/// POST /api/v1/snapshots/merge
///
/// Combine several snapshots into one deduplicated record list. Nothing is
/// written to disk.
pub async fn merge(
    State(state): State<AppState>,
    Json(input): Json<MergeRequest>,
) -> Result<Json<MergeResponse>, AppError> {
    if input.filenames.is_empty() {
        return Err(AppError::BadRequest("No filenames provided".to_string()));
    }
    let jobs = state.store.merge(&input.filenames).await?;
    Ok(Json(MergeResponse {
        total_jobs: jobs.len(),
        jobs,
    }))
}

/// POST /api/v1/snapshots/prune
///
/// Body is optional; without `keepLast` the configured retention applies.
pub async fn prune(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let request: PruneRequest = if body.is_empty() {
        PruneRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    let keep_last = request.keep_last.unwrap_or(state.keep_last);
    let removed = state.store.prune(keep_last).await?;
    Ok(Json(serde_json::json!({
        "keepLast": keep_last,
        "removed": removed,
    })))
}

#[cfg(test)]
mod tests {
    use crate::models::record::fixtures::record;
    use crate::routes::api::test_support::{call, state};
    use axum::http::StatusCode;
    use serde_json::json;
    use tempfile::TempDir;

    fn file_name(path: &std::path::Path) -> String {
        path.file_name().unwrap().to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn list_get_and_merge() {
        let tmp = TempDir::new().unwrap();
        let st = state(tmp.path(), Vec::new());
        let a = st
            .store
            .save(&[record("Engineer", "Acme", "Dubai", "a"), record("Chef", "Hotel", "Doha", "a")])
            .await
            .unwrap();
        let b = st
            .store
            .save(&[record("Engineer", "Acme", "Dubai", "b"), record("Nurse", "Clinic", "Doha", "b")])
            .await
            .unwrap();

        let (status, body) = call(st.clone(), "GET", "/api/v1/snapshots", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([file_name(&b), file_name(&a)]));

        let uri = format!("/api/v1/snapshots/{}", file_name(&a));
        let (status, body) = call(st.clone(), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metadata"]["totalJobs"], 2);

        let (status, body) = call(
            st,
            "POST",
            "/api/v1/snapshots/merge",
            Some(json!({ "filenames": [file_name(&a), file_name(&b)] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalJobs"], 3);
    }

    #[tokio::test]
    async fn merge_requires_filenames() {
        let tmp = TempDir::new().unwrap();
        let (status, _) = call(
            state(tmp.path(), Vec::new()),
            "POST",
            "/api/v1/snapshots/merge",
            Some(json!({ "filenames": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn prune_defaults_to_configured_retention() {
        let tmp = TempDir::new().unwrap();
        let st = state(tmp.path(), Vec::new());
        for i in 0..7 {
            st.store
                .save(&[record(&format!("Role {i}"), "Acme", "Dubai", "a")])
                .await
                .unwrap();
        }

        let (status, body) = call(st.clone(), "POST", "/api/v1/snapshots/prune", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["keepLast"], 5);
        assert_eq!(body["removed"].as_array().unwrap().len(), 2);

        let (_, body) = call(
            st.clone(),
            "POST",
            "/api/v1/snapshots/prune",
            Some(json!({ "keepLast": 1 })),
        )
        .await;
        assert_eq!(body["removed"].as_array().unwrap().len(), 4);
        assert_eq!(st.store.list_available().await.unwrap().len(), 1);
    }
}
