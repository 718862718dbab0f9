use axum::Json;
use axum::extract::State;

use crate::error::AppError;
use crate::routes::AppState;
use crate::stats::{Stats, compute_statistics};

pub async fn get(State(state): State<AppState>) -> Result<Json<Stats>, AppError> {
    let stats = compute_statistics(&state.store).await?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use crate::models::record::fixtures::record;
    use crate::routes::api::test_support::{call, state};
    use axum::http::StatusCode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reports_country_buckets() {
        let tmp = TempDir::new().unwrap();
        let st = state(tmp.path(), Vec::new());
        st.store
            .save(&[
                record("A", "X", "Dubai", "s"),
                record("B", "X", "Abu Dhabi", "s"),
                record("C", "X", "Sharjah, UAE", "s"),
                record("D", "X", "Doha", "s"),
                record("E", "X", "Lisbon", "s"),
            ])
            .await
            .unwrap();

        let (status, body) = call(st, "GET", "/api/v1/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalJobs"], 5);
        assert_eq!(
            body["byCountry"],
            serde_json::json!({ "UAE": 3, "Qatar": 1, "Unknown": 1 })
        );
        assert_eq!(body["recentJobs"], 5);
    }
}
