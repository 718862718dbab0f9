//! Timestamped JSON snapshot files on local disk.
//!
//! Layout under the data directory:
//!
//! ```text
//! <prefix>-initial.json                 placeholder, never listed
//! <prefix>-2026-10-18T06-00-00-000Z.json
//! backups/<same names>
//! ```
//!
//! File names embed a UTC timestamp, so lexicographic order is creation order.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use regex::Regex;
use tokio::fs;

use crate::error::StoreError;
use crate::models::record::ScrapedRecord;
use crate::models::snapshot::Snapshot;
use crate::normalize;

const BACKUP_DIR: &str = "backups";

/// The part of a snapshot name between `<prefix>-` and `.json`.
static SNAPSHOT_STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}-\d{3}Z$").expect("valid stamp regex")
});

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub prefix: String,
    /// Copy existing snapshots into `backups/` before each save.
    pub backup: bool,
    /// Newest backups kept after each backup pass.
    pub max_backups: usize,
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            prefix: "jobs".to_string(),
            backup: true,
            max_backups: 10,
        }
    }
}

pub struct FileStore {
    config: StoreConfig,
    last_stamp: Mutex<Option<DateTime<Utc>>>,
}

impl FileStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            last_stamp: Mutex::new(None),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.config.data_dir.join(BACKUP_DIR)
    }

    pub fn initial_name(&self) -> String {
        format!("{}-initial.json", self.config.prefix)
    }

    /// `<prefix>-<RFC 3339 millis>.json` with `:` and `.` replaced by `-`.
    pub fn snapshot_name(&self, at: DateTime<Utc>) -> String {
        let stamp = at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        format!("{}-{stamp}.json", self.config.prefix)
    }

    /// Only `<prefix>-<stamp>.json` names count; stray files sharing the
    /// prefix are never listed, loaded as latest or pruned.
    fn is_snapshot_name(&self, name: &str) -> bool {
        name.strip_prefix(self.config.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.strip_suffix(".json"))
            .is_some_and(|stamp| SNAPSHOT_STAMP.is_match(stamp))
    }

    /// Create the data directory and the empty placeholder snapshot.
    /// Safe to call repeatedly.
    pub async fn init(&self) -> Result<PathBuf, StoreError> {
        ensure_dir(self.data_dir()).await?;
        let path = self.data_dir().join(self.initial_name());
        if !exists(&path).await? {
            let snapshot = Snapshot::new(Vec::new(), Utc::now());
            write_atomic(&path, &snapshot).await?;
            tracing::info!("Created placeholder snapshot {}", path.display());
        }
        Ok(path)
    }

    /// Persist `records` as a new snapshot and return its absolute path.
    pub async fn save(&self, records: &[ScrapedRecord]) -> Result<PathBuf, StoreError> {
        ensure_dir(self.data_dir()).await?;

        if self.config.backup
            && let Err(e) = self.backup_existing().await
        {
            tracing::warn!("Snapshot backup failed, continuing with save: {e}");
        }

        let mut scraped_at = self.next_stamp();
        let mut path = self.data_dir().join(self.snapshot_name(scraped_at));
        while exists(&path).await? {
            scraped_at = self.bump_stamp(scraped_at);
            path = self.data_dir().join(self.snapshot_name(scraped_at));
        }

        let snapshot = Snapshot::new(records.to_vec(), scraped_at);
        write_atomic(&path, &snapshot).await?;

        let absolute = fs::canonicalize(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        tracing::info!(
            "Saved {} jobs to {}",
            snapshot.metadata.total_jobs,
            absolute.display()
        );
        Ok(absolute)
    }

    pub async fn load(&self, name: &str) -> Result<Vec<ScrapedRecord>, StoreError> {
        Ok(self.load_snapshot(name).await?.jobs)
    }

    /// Read and parse one snapshot by bare file name.
    pub async fn load_snapshot(&self, name: &str) -> Result<Snapshot, StoreError> {
        validate_name(name)?;
        let path = self.data_dir().join(name);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()));
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            name: name.to_string(),
            source,
        })
    }

    /// Newest snapshot name and contents, if any snapshot exists.
    pub async fn latest_snapshot(&self) -> Result<Option<(String, Snapshot)>, StoreError> {
        let Some(name) = self.list_available().await?.into_iter().next() else {
            return Ok(None);
        };
        let snapshot = self.load_snapshot(&name).await?;
        Ok(Some((name, snapshot)))
    }

    /// Records of the newest snapshot. No snapshots yet is an empty corpus.
    pub async fn load_latest(&self) -> Result<Vec<ScrapedRecord>, StoreError> {
        Ok(self
            .latest_snapshot()
            .await?
            .map(|(_, snapshot)| snapshot.jobs)
            .unwrap_or_default())
    }

    /// Snapshot names, newest first. Excludes the placeholder and temp files.
    pub async fn list_available(&self) -> Result<Vec<String>, StoreError> {
        self.list_in(self.data_dir()).await
    }

    pub async fn list_backups(&self) -> Result<Vec<String>, StoreError> {
        self.list_in(&self.backup_dir()).await
    }

    /// Load several snapshots and deduplicate across them, first file first.
    pub async fn merge(&self, names: &[String]) -> Result<Vec<ScrapedRecord>, StoreError> {
        let mut combined = Vec::new();
        for name in names {
            if name == &self.initial_name() {
                continue;
            }
            combined.extend(self.load(name).await?);
        }
        Ok(normalize::dedupe(combined))
    }

    /// Delete every snapshot beyond the newest `keep_last`. Returns the
    /// deleted names.
    pub async fn prune(&self, keep_last: usize) -> Result<Vec<String>, StoreError> {
        let dir = self.data_dir().to_path_buf();
        let removed = self.prune_in(&dir, keep_last).await?;
        if !removed.is_empty() {
            tracing::info!("Pruned {} old snapshots", removed.len());
        }
        Ok(removed)
    }

    /// Whether the data directory exists and is a directory.
    pub async fn is_ready(&self) -> bool {
        fs::metadata(self.data_dir())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn backup_existing(&self) -> Result<usize, StoreError> {
        let names = self.list_available().await?;
        if names.is_empty() {
            return Ok(0);
        }

        let backup_dir = self.backup_dir();
        ensure_dir(&backup_dir).await?;
        for name in &names {
            let from = self.data_dir().join(name);
            let to = backup_dir.join(name);
            match fs::copy(&from, &to).await {
                Ok(_) => {}
                // Pruned by someone else between listing and copying.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(&from, e)),
            }
        }
        self.prune_in(&backup_dir, self.config.max_backups).await?;
        tracing::debug!("Backed up {} snapshots", names.len());
        Ok(names.len())
    }

    async fn list_in(&self, dir: &Path) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(dir, e))?
        {
            if let Some(name) = entry.file_name().to_str()
                && self.is_snapshot_name(name)
            {
                names.push(name.to_string());
            }
        }
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }

    async fn prune_in(&self, dir: &Path, keep_last: usize) -> Result<Vec<String>, StoreError> {
        let mut removed = Vec::new();
        for name in self.list_in(dir).await?.into_iter().skip(keep_last) {
            let path = dir.join(&name);
            match fs::remove_file(&path).await {
                Ok(()) => removed.push(name),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
        Ok(removed)
    }

    /// Millisecond timestamp strictly after the previous one handed out.
    fn next_stamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        let mut last = self
            .last_stamp
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let stamp = match *last {
            Some(prev) if now <= prev => prev + TimeDelta::milliseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }

    fn bump_stamp(&self, stamp: DateTime<Utc>) -> DateTime<Utc> {
        let bumped = stamp + TimeDelta::milliseconds(1);
        let mut last = self
            .last_stamp
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if last.is_none_or(|prev| prev < bumped) {
            *last = Some(bumped);
        }
        bumped
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || name.contains(['/', '\\'])
        || name.contains("..")
        || !name.ends_with(".json")
    {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

async fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    match fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(StoreError::io(dir, e)),
    }
}

async fn exists(path: &Path) -> Result<bool, StoreError> {
    fs::try_exists(path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

/// Write to `<path>.tmp` and rename over `path`.
async fn write_atomic(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(snapshot).map_err(StoreError::Serialize)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, &json)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}
