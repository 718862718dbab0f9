use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::record::ScrapedRecord;
use crate::regions;

pub const SNAPSHOT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub total_jobs: usize,
    pub scraped_at: DateTime<Utc>,
    pub sources: Vec<String>,
    pub countries: Vec<String>,
    pub categories: Vec<String>,
    pub version: String,
}

impl SnapshotMetadata {
    /// Derive metadata for a record set. Lists are distinct and sorted;
    /// locations that match no known region contribute no country.
    pub fn from_records(records: &[ScrapedRecord], scraped_at: DateTime<Utc>) -> Self {
        let mut sources = BTreeSet::new();
        let mut countries = BTreeSet::new();
        let mut categories = BTreeSet::new();

        for record in records {
            sources.insert(record.source.clone());
            if let Some(country) = regions::extract_country(&record.location) {
                countries.insert(country.to_string());
            }
            if let Some(category) = record.category.as_deref()
                && !category.is_empty()
            {
                categories.insert(category.to_string());
            }
        }

        Self {
            total_jobs: records.len(),
            scraped_at,
            sources: sources.into_iter().collect(),
            countries: countries.into_iter().collect(),
            categories: categories.into_iter().collect(),
            version: SNAPSHOT_VERSION.to_string(),
        }
    }
}

/// The on-disk document: metadata block plus the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: SnapshotMetadata,
    pub jobs: Vec<ScrapedRecord>,
}

impl Snapshot {
    pub fn new(jobs: Vec<ScrapedRecord>, scraped_at: DateTime<Utc>) -> Self {
        Self {
            metadata: SnapshotMetadata::from_records(&jobs, scraped_at),
            jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::fixtures::record;

    #[test]
    fn metadata_lists_are_distinct_and_sorted() {
        let mut a = record("Engineer", "Acme", "Dubai, UAE", "gulfboard");
        a.category = Some("Engineering".into());
        let mut b = record("Nurse", "Clinic", "Doha, Qatar", "bayt");
        b.category = Some("Healthcare".into());
        let c = record("Chef", "Hotel", "Abu Dhabi, United Arab Emirates", "gulfboard");
        let d = record("Driver", "Fleet", "Atlantis", "bayt");

        let meta = SnapshotMetadata::from_records(&[a, b, c, d], Utc::now());
        assert_eq!(meta.total_jobs, 4);
        assert_eq!(meta.sources, vec!["bayt", "gulfboard"]);
        assert_eq!(meta.countries, vec!["Qatar", "UAE"]);
        assert_eq!(meta.categories, vec!["Engineering", "Healthcare"]);
        assert_eq!(meta.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn snapshot_json_shape() {
        let snap = Snapshot::new(vec![record("Engineer", "Acme", "Dubai, UAE", "x")], Utc::now());
        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["metadata"]["totalJobs"], 1);
        assert_eq!(value["metadata"]["version"], "1.0.0");
        assert!(value["metadata"]["scrapedAt"].is_string());
        assert_eq!(value["jobs"].as_array().unwrap().len(), 1);
    }
}
