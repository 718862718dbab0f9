// Source adapters: each collector fetches one external job board and maps its
// listings onto ScrapedRecord. The runner drives them as one scrape cycle.

pub mod html_board;
pub mod json_feed;
pub mod runner;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::error::FetchError;
use crate::models::record::ScrapedRecord;
use crate::normalize;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Characters that encodeURIComponent does NOT encode.
const ENCODE_URI_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Trait that all job collectors must implement.
/// Each collector fetches listings from one external source and returns them
/// as canonical records. A failure is scoped to that source only.
#[async_trait]
pub trait JobCollector: Send + Sync {
    /// Source name recorded on every record this collector produces.
    fn name(&self) -> &str;

    async fn collect(&self) -> Result<Vec<ScrapedRecord>, FetchError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesFile {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Extra query parameters appended to `url`.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub default_currency: Option<String>,
    #[serde(default)]
    pub default_location: Option<String>,
    /// Category applied to listings that carry none.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(flatten)]
    pub kind: SourceKind,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    Json(json_feed::JsonFeedSettings),
    Html(html_board::HtmlSelectors),
}

impl SourceConfig {
    /// `url` with the configured query parameters encoded onto it.
    pub fn request_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoded(k), urlencoded(v)))
            .collect::<Vec<_>>()
            .join("&");
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{sep}{query}", self.url)
    }
}

/// URL-encode a string for use in query parameters.
fn urlencoded(s: &str) -> String {
    utf8_percent_encode(s, ENCODE_URI_COMPONENT_SET).to_string()
}

/// Shared HTTP client. The timeout bounds every adapter fetch so a stalled
/// source cannot hold up a whole cycle.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Read the sources file. A missing file means no sources.
pub fn load_sources(path: &Path) -> anyhow::Result<Vec<SourceConfig>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Sources file {} not found, no sources configured", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    let file: SourcesFile = serde_json::from_str(&raw)?;
    Ok(file.sources)
}

/// Instantiate a collector for every enabled source.
pub fn build_collectors(
    sources: Vec<SourceConfig>,
    client: &reqwest::Client,
) -> Vec<Arc<dyn JobCollector>> {
    sources
        .into_iter()
        .filter(|s| {
            if !s.enabled {
                tracing::info!("Source '{}' is disabled, skipping", s.name);
            }
            s.enabled
        })
        .map(|source| -> Arc<dyn JobCollector> {
            match source.kind.clone() {
                SourceKind::Json(settings) => Arc::new(json_feed::JsonFeedCollector::new(
                    source,
                    settings,
                    client.clone(),
                )),
                SourceKind::Html(selectors) => Arc::new(html_board::HtmlBoardCollector::new(
                    source,
                    selectors,
                    client.clone(),
                )),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// Outcome of running every collector once.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    /// Normalized records in collector order; not yet deduplicated.
    pub records: Vec<ScrapedRecord>,
    pub succeeded: Vec<String>,
    pub failures: Vec<SourceFailure>,
}

/// Run all collectors concurrently and wait for every one to finish.
/// Failed sources are logged and reported; the rest still contribute.
pub async fn scrape_all(collectors: &[Arc<dyn JobCollector>]) -> ScrapeReport {
    let mut set = JoinSet::new();
    for (idx, collector) in collectors.iter().enumerate() {
        let collector = Arc::clone(collector);
        set.spawn(async move { (idx, collector.collect().await) });
    }

    let mut outcomes: Vec<Option<Result<Vec<ScrapedRecord>, String>>> =
        (0..collectors.len()).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, result)) => outcomes[idx] = Some(result.map_err(|e| e.to_string())),
            Err(e) => tracing::error!("Collector task failed to complete: {e}"),
        }
    }

    let mut report = ScrapeReport::default();
    for (collector, outcome) in collectors.iter().zip(outcomes) {
        let name = collector.name().to_string();
        match outcome {
            Some(Ok(jobs)) => {
                tracing::info!("Source '{name}' returned {} jobs", jobs.len());
                report
                    .records
                    .extend(jobs.into_iter().map(normalize::normalize_record));
                report.succeeded.push(name);
            }
            Some(Err(error)) => {
                tracing::warn!("Source '{name}' failed: {error}");
                report.failures.push(SourceFailure { source: name, error });
            }
            None => report.failures.push(SourceFailure {
                source: name,
                error: "collector task aborted".to_string(),
            }),
        }
    }
    report
}
