use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::models::record::ScrapedRecord;
use crate::regions;
use crate::store::FileStore;

pub const RECENT_WINDOW_DAYS: i64 = 7;
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_jobs: usize,
    pub by_country: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    /// Records scraped within the last [`RECENT_WINDOW_DAYS`].
    pub recent_jobs: usize,
    pub remote_jobs: usize,
    pub average_salary: Option<f64>,
    /// Snapshot the numbers were computed from, if any.
    pub snapshot: Option<String>,
}

impl Stats {
    pub fn from_records(records: &[ScrapedRecord], now: DateTime<Utc>) -> Self {
        let cutoff = now - TimeDelta::days(RECENT_WINDOW_DAYS);
        let mut stats = Stats {
            total_jobs: records.len(),
            by_country: BTreeMap::new(),
            by_source: BTreeMap::new(),
            by_category: BTreeMap::new(),
            by_type: BTreeMap::new(),
            recent_jobs: 0,
            remote_jobs: 0,
            average_salary: None,
            snapshot: None,
        };

        let mut salary_sum = 0.0;
        let mut salary_count = 0usize;

        for record in records {
            *stats
                .by_country
                .entry(regions::country_bucket(&record.location).to_string())
                .or_default() += 1;
            *stats.by_source.entry(record.source.clone()).or_default() += 1;
            let category = record.category.as_deref().unwrap_or(UNCATEGORIZED);
            *stats.by_category.entry(category.to_string()).or_default() += 1;
            *stats
                .by_type
                .entry(record.employment_type.to_string())
                .or_default() += 1;

            if record.scraped_at >= cutoff {
                stats.recent_jobs += 1;
            }
            if record.remote {
                stats.remote_jobs += 1;
            }
            if let Some(mid) = record.salary_midpoint() {
                salary_sum += mid;
                salary_count += 1;
            }
        }

        if salary_count > 0 {
            stats.average_salary = Some(salary_sum / salary_count as f64);
        }
        stats
    }
}

/// Statistics over the newest snapshot, recomputed on every call.
pub async fn compute_statistics(store: &FileStore) -> Result<Stats, StoreError> {
    let (name, records) = match store.latest_snapshot().await? {
        Some((name, snapshot)) => (Some(name), snapshot.jobs),
        None => (None, Vec::new()),
    };
    let mut stats = Stats::from_records(&records, Utc::now());
    stats.snapshot = name;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::EmploymentType;
    use crate::models::record::fixtures::record;
    use crate::store::StoreConfig;
    use tempfile::TempDir;

    fn gulf_records() -> Vec<ScrapedRecord> {
        let mut recs = vec![
            record("Engineer", "Acme", "Dubai, UAE", "bayt"),
            record("Designer", "Acme", "Abu Dhabi", "bayt"),
            record("Analyst", "Bank", "Sharjah, United Arab Emirates", "gulftalent"),
            record("Nurse", "Clinic", "Doha, Qatar", "gulftalent"),
            record("Driver", "Fleet", "Berlin, Germany", "bayt"),
        ];
        recs[0].category = Some("Engineering".into());
        recs[3].employment_type = EmploymentType::Contract;
        recs[4].remote = true;
        recs
    }

    #[test]
    fn unmatched_locations_bucket_as_unknown() {
        let stats = Stats::from_records(&gulf_records(), Utc::now());
        let expected: BTreeMap<String, usize> = [("UAE", 3), ("Qatar", 1), ("Unknown", 1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(stats.by_country, expected);
        assert_eq!(stats.total_jobs, 5);
    }

    #[test]
    fn counts_by_source_category_and_type() {
        let stats = Stats::from_records(&gulf_records(), Utc::now());
        assert_eq!(stats.by_source["bayt"], 3);
        assert_eq!(stats.by_source["gulftalent"], 2);
        assert_eq!(stats.by_category["Engineering"], 1);
        assert_eq!(stats.by_category[UNCATEGORIZED], 4);
        assert_eq!(stats.by_type["full-time"], 4);
        assert_eq!(stats.by_type["contract"], 1);
        assert_eq!(stats.remote_jobs, 1);
    }

    #[test]
    fn recent_window_is_seven_days() {
        let now = Utc::now();
        let mut recs = gulf_records();
        recs[0].scraped_at = now - TimeDelta::days(8);
        recs[1].scraped_at = now - TimeDelta::days(6);
        let stats = Stats::from_records(&recs, now);
        assert_eq!(stats.recent_jobs, 4);
    }

    #[test]
    fn average_salary_uses_midpoints() {
        let mut recs = gulf_records();
        recs[0].salary_min = Some(10000.0);
        recs[0].salary_max = Some(20000.0);
        recs[1].salary_min = Some(5000.0);
        let stats = Stats::from_records(&recs, Utc::now());
        assert_eq!(stats.average_salary, Some(10000.0));
    }

    #[test]
    fn stats_serialize_camel_case() {
        let value = serde_json::to_value(Stats::from_records(&[], Utc::now())).unwrap();
        assert_eq!(value["totalJobs"], 0);
        assert!(value["byCountry"].as_object().unwrap().is_empty());
        assert_eq!(value["recentJobs"], 0);
    }

    #[tokio::test]
    async fn compute_statistics_reads_latest_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(StoreConfig::new(tmp.path()));

        let empty = compute_statistics(&store).await.unwrap();
        assert_eq!(empty.total_jobs, 0);
        assert_eq!(empty.snapshot, None);

        store.save(&gulf_records()[..2]).await.unwrap();
        let path = store.save(&gulf_records()).await.unwrap();
        let stats = compute_statistics(&store).await.unwrap();
        assert_eq!(stats.total_jobs, 5);
        assert_eq!(stats.by_country["Unknown"], 1);
        assert_eq!(
            stats.snapshot.as_deref(),
            path.file_name().and_then(|n| n.to_str())
        );
    }
}
