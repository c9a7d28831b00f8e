//! JSON file backend for the dedup store
//!
//! The record is a JSON array of job-id strings. Every write goes to a
//! temporary file that is fsynced and renamed over the record, so readers
//! only ever see a complete array.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::OrchestratorResult;
use crate::traits::DedupBackend;
use shared::JobId;

pub const APPLIED_JOBS_FILE: &str = "applied_jobs.json";

pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backend for `applied_jobs.json` inside `data_dir`
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(APPLIED_JOBS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Copy the current record to a timestamped backup, then empty it
    ///
    /// Returns the backup path, or `None` when there was nothing to back up.
    pub async fn backup_and_reset(&self) -> OrchestratorResult<Option<PathBuf>> {
        let backup = if fs::try_exists(&self.path).await? {
            let stamp = Local::now().format("%Y%m%d_%H%M%S");
            let stem = self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "applied_jobs".to_string());
            let backup = self.path.with_file_name(format!("{stem}_backup_{stamp}.json"));
            fs::copy(&self.path, &backup).await?;
            Some(backup)
        } else {
            None
        };

        self.persist(&HashSet::new()).await?;
        Ok(backup)
    }
}

#[async_trait]
impl DedupBackend for JsonFileBackend {
    async fn load(&self) -> OrchestratorResult<HashSet<JobId>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(HashSet::new());
        }

        let values: Vec<Value> = serde_json::from_str(&content)?;
        let mut ids = HashSet::with_capacity(values.len());
        for value in values {
            let id = match &value {
                Value::String(s) => JobId::new(s.as_str()).ok(),
                Value::Number(n) => JobId::new(n.to_string()).ok(),
                _ => None,
            };
            match id {
                Some(id) => {
                    ids.insert(id);
                }
                None => warn!("Ignoring invalid job id {} in {}", value, self.path.display()),
            }
        }
        Ok(ids)
    }

    async fn persist(&self, committed: &HashSet<JobId>) -> OrchestratorResult<()> {
        let mut ids: Vec<&str> = committed.iter().map(JobId::as_str).collect();
        ids.sort_unstable();
        let content = serde_json::to_string_pretty(&ids)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        let mut file = fs::File::create(&temp).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp, &self.path).await?;

        debug!("💾 Persisted {} applied jobs to {}", ids.len(), self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
