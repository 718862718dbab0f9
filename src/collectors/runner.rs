use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::collectors::{JobCollector, SourceFailure, scrape_all};
use crate::error::CycleError;
use crate::normalize;
use crate::store::FileStore;

pub const DEFAULT_KEEP_LAST: usize = 5;

/// Summary of one successful scrape cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records returned by all sources before deduplication.
    pub jobs_found: usize,
    pub jobs_saved: usize,
    pub snapshot: String,
    pub pruned: usize,
    pub failed_sources: Vec<SourceFailure>,
}

/// The scrape → dedupe → save → prune pipeline.
pub struct Pipeline {
    collectors: Vec<Arc<dyn JobCollector>>,
    store: Arc<FileStore>,
    keep_last: usize,
}

impl Pipeline {
    pub fn new(
        collectors: Vec<Arc<dyn JobCollector>>,
        store: Arc<FileStore>,
        keep_last: usize,
    ) -> Self {
        Self {
            collectors,
            store,
            keep_last,
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.collectors.iter().map(|c| c.name().to_string()).collect()
    }

    /// Run one full cycle. Partial source failures are carried in the
    /// summary; the cycle fails only when nothing could be scraped or the
    /// snapshot could not be written.
    pub async fn run_cycle(&self) -> Result<CycleSummary, CycleError> {
        let started_at = Utc::now();
        if self.collectors.is_empty() {
            return Err(CycleError::NoSources);
        }

        tracing::info!("Scrape cycle started for {} sources", self.collectors.len());
        let report = scrape_all(&self.collectors).await;
        if report.succeeded.is_empty() {
            tracing::error!("Scrape cycle failed: every source errored");
            return Err(CycleError::AllSourcesFailed(report.failures.len()));
        }

        let jobs_found = report.records.len();
        let jobs = normalize::dedupe(report.records);
        let path = self.store.save(&jobs).await?;
        let pruned = self.store.prune(self.keep_last).await?;

        let summary = CycleSummary {
            started_at,
            finished_at: Utc::now(),
            jobs_found,
            jobs_saved: jobs.len(),
            snapshot: path.display().to_string(),
            pruned: pruned.len(),
            failed_sources: report.failures,
        };
        tracing::info!(
            "Scrape cycle completed: {} found, {} saved, {} sources failed",
            summary.jobs_found,
            summary.jobs_saved,
            summary.failed_sources.len()
        );
        Ok(summary)
    }
}
