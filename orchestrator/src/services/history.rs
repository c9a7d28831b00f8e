//! Append-only performance history (`profile_performance.jsonl`)

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::core::PerformanceSnapshot;
use crate::error::OrchestratorResult;

pub const HISTORY_FILE: &str = "profile_performance.jsonl";

pub struct PerformanceHistory {
    path: PathBuf,
}

impl PerformanceHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(HISTORY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, snapshot: &PerformanceSnapshot) -> OrchestratorResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(snapshot)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// All snapshots in file order; an absent file is an empty history
    pub async fn load(&self) -> OrchestratorResult<Vec<PerformanceSnapshot>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!("Skipping malformed snapshot in {}: {}", self.path.display(), e),
            }
        }
        Ok(snapshots)
    }
}
