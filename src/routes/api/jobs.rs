use axum::Json;
use axum::extract::{Query, State};
use serde::Serialize;

use crate::error::AppError;
use crate::models::filter::JobFilters;
use crate::models::record::ScrapedRecord;
use crate::routes::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsPage {
    pub snapshot: Option<String>,
    /// Matches across all pages.
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub jobs: Vec<ScrapedRecord>,
}

/// GET /api/v1/jobs
///
/// Filtered, paginated listings from the newest snapshot, or from the one
/// named by `?snapshot=`.
pub async fn list(
    State(state): State<AppState>,
    Query(filters): Query<JobFilters>,
) -> Result<Json<JobsPage>, AppError> {
    let (snapshot, records) = match filters.snapshot.as_deref() {
        Some(name) => (Some(name.to_string()), state.store.load(name).await?),
        None => match state.store.latest_snapshot().await? {
            Some((name, snapshot)) => (Some(name), snapshot.jobs),
            None => (None, Vec::new()),
        },
    };

    let matched = filters.apply(&records).map_err(AppError::BadRequest)?;
    let (page, per_page) = (filters.page(), filters.per_page());
    let jobs = matched
        .iter()
        .skip(page.saturating_sub(1).saturating_mul(per_page))
        .take(per_page)
        .map(|r| (*r).clone())
        .collect();

    Ok(Json(JobsPage {
        snapshot,
        total: matched.len(),
        page,
        per_page,
        jobs,
    }))
}
