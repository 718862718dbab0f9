use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};

use crate::collectors::runner::DEFAULT_KEEP_LAST;
use crate::scheduler::DEFAULT_INTERVAL;
use crate::store::StoreConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobfeed", about = "Job listing scraper and snapshot server")]
pub struct Config {
    /// Directory holding snapshot files
    #[arg(long, env = "DATA_DIR", default_value = "data/scraped-jobs")]
    pub data_dir: PathBuf,

    /// Snapshot file name prefix
    #[arg(long, env = "FILE_PREFIX", default_value = "jobs")]
    pub file_prefix: String,

    /// JSON file listing the sources to scrape
    #[arg(long, env = "SOURCES_FILE", default_value = "sources.json")]
    pub sources_file: PathBuf,

    /// Snapshots kept after each scrape cycle
    #[arg(long, env = "KEEP_LAST", default_value_t = DEFAULT_KEEP_LAST)]
    pub keep_last: usize,

    /// Back up existing snapshots before writing a new one
    #[arg(long, env = "BACKUP", default_value = "true", action = ArgAction::Set)]
    pub backup: bool,

    /// Backups retained under <data-dir>/backups
    #[arg(long, env = "MAX_BACKUPS", default_value = "10")]
    pub max_backups: usize,

    /// Seconds between scheduled scrape cycles
    #[arg(long, env = "SCRAPE_INTERVAL_SECS", default_value_t = DEFAULT_INTERVAL.as_secs())]
    pub scrape_interval_secs: u64,

    /// Per-source HTTP timeout in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "30")]
    pub fetch_timeout_secs: u64,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the web server (default when no subcommand given)
    Serve {
        /// Listen address
        #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        listen_addr: String,

        /// Arm the scrape scheduler on startup
        #[arg(long, env = "AUTOSTART_SCHEDULER", default_value = "true", action = ArgAction::Set)]
        autostart: bool,
    },
    /// Run one scrape cycle and exit
    Scrape,
    /// Print statistics for the newest snapshot
    Stats,
    /// Print the records of the newest snapshot as JSON
    Latest,
    /// List available snapshots, newest first
    List {
        /// List the backup set instead
        #[arg(long)]
        backups: bool,
    },
    /// Delete all but the newest snapshots
    Prune {
        /// Snapshots to keep (defaults to --keep-last)
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Create the data directory and the empty placeholder snapshot
    Init,
}

impl Config {
    /// Resolve the command, defaulting to Serve if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or_else(|| Command::Serve {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            autostart: std::env::var("AUTOSTART_SCHEDULER")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(true),
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            prefix: self.file_prefix.clone(),
            backup: self.backup,
            max_backups: self.max_backups,
            ..StoreConfig::new(&self.data_dir)
        }
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}
