pub mod jobs;
pub mod scheduler;
pub mod snapshots;
pub mod stats;

use axum::Router;
use axum::routing::{get, post, put};

use crate::routes::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Listings
        .route("/jobs", get(jobs::list))
        .route("/stats", get(stats::get))
        // Snapshots
        .route("/snapshots", get(snapshots::list))
        .route("/snapshots/merge", post(snapshots::merge))
        .route("/snapshots/prune", post(snapshots::prune))
        .route("/snapshots/{name}", get(snapshots::get))
        // Scraping and scheduling
        .route("/scrape", post(scheduler::trigger))
        .route("/scheduler", get(scheduler::status))
        .route("/scheduler/start", post(scheduler::start))
        .route("/scheduler/stop", post(scheduler::stop))
        .route("/scheduler/config", put(scheduler::update_config))
        .with_state(state);

    Router::new().nest("/api/v1", api)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::collectors::JobCollector;
    use crate::collectors::runner::Pipeline;
    use crate::routes::AppState;
    use crate::scheduler::{DEFAULT_INTERVAL, Scheduler};
    use crate::store::{FileStore, StoreConfig};

    pub fn state(dir: &std::path::Path, collectors: Vec<Arc<dyn JobCollector>>) -> AppState {
        let store = Arc::new(FileStore::new(StoreConfig::new(dir)));
        let pipeline = Arc::new(Pipeline::new(collectors, Arc::clone(&store), 5));
        AppState {
            store,
            scheduler: Arc::new(Scheduler::new(pipeline, DEFAULT_INTERVAL)),
            keep_last: 5,
        }
    }

    /// Send one request through the API router and decode the JSON body.
    pub async fn call(
        state: AppState,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = super::router(state)
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
