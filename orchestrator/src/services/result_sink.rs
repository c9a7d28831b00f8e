//! Per-session result logs
//!
//! One JSONL file per profile and day:
//! `results/Applied_Jobs_<profile>_<YYYYMMDD>.jsonl`. Appends to the same
//! file are serialized through a per-path lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{ResultRecord, ResultSink};

pub const RESULTS_DIR: &str = "results";
const LOG_PREFIX: &str = "Applied_Jobs_";
const LOG_EXTENSION: &str = ".jsonl";

pub struct FileResultSink {
    dir: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

/// Profile name made safe for use in a file name
pub fn sanitize_profile_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join("_")
}

/// Date encoded in a result log file name
pub fn log_file_date(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name
        .strip_prefix(LOG_PREFIX)?
        .strip_suffix(LOG_EXTENSION)?;
    let (_, date) = stem.rsplit_once('_')?;
    NaiveDate::parse_from_str(date, "%Y%m%d").ok()
}

impl FileResultSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Sink writing to `results/` inside `data_dir`
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(RESULTS_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self, profile_name: &str, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}{}_{}{}",
            LOG_PREFIX,
            sanitize_profile_name(profile_name),
            date.format("%Y%m%d"),
            LOG_EXTENSION
        ))
    }

    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    /// Every result log file with its date, oldest first
    pub async fn log_files(&self) -> OrchestratorResult<Vec<(PathBuf, NaiveDate)>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(date) = name.to_str().and_then(log_file_date) {
                files.push((entry.path(), date));
            }
        }
        files.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(files)
    }

    /// Read every record of every result log; malformed lines are skipped
    pub async fn read_all(&self) -> OrchestratorResult<Vec<ResultRecord>> {
        let mut records = Vec::new();
        for (path, _) in self.log_files().await? {
            let content = fs::read_to_string(&path).await?;
            for (number, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ResultRecord>(line) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("Skipping line {} of {}: {}", number + 1, path.display(), e),
                }
            }
        }
        Ok(records)
    }

    /// Delete result logs dated more than `days` days before `today`
    pub async fn cleanup_older_than(&self, days: u32, today: NaiveDate) -> OrchestratorResult<Vec<PathBuf>> {
        let cutoff = today - chrono::Duration::days(i64::from(days));
        let mut removed = Vec::new();
        for (path, date) in self.log_files().await? {
            if date < cutoff {
                fs::remove_file(&path)
                    .await
                    .map_err(|_| OrchestratorError::FileSystemError {
                        operation: "remove".to_string(),
                        path: path.display().to_string(),
                    })?;
                removed.push(path);
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl ResultSink for FileResultSink {
    async fn record(&self, record: &ResultRecord) -> OrchestratorResult<()> {
        let path = self.log_path(&record.profile_name, record.timestamp.date_naive());
        let lock = self.lock_for(&path);
        let _guard = lock.lock().await;

        fs::create_dir_all(&self.dir).await?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("📝 {} -> {}", record.job_id, path.display());
        Ok(())
    }
}
