//! Core types used throughout the scheduler
//!
//! Identifiers, search tasks, job postings and the tagged outcome of a single
//! application attempt.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::errors::SharedError;

/// Identifier of one isolated browsing identity (a configured profile)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub u32);

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "profile_{}", self.0)
    }
}

/// Stable identifier of one application target, used as the dedup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Result<Self, SharedError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(SharedError::InvalidJobId { input: id });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl std::str::FromStr for JobId {
    type Err = SharedError;

    /// Accepts bare ids as well as urn-style ids (`urn:li:fs_normalized_jobPosting:123`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tail = s.rsplit(':').next().unwrap_or(s);
        Self::new(tail)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static description of a configured profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDescriptor {
    pub id: ProfileId,
    #[serde(default)]
    pub name: Option<String>,
}

impl ProfileDescriptor {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: ProfileId(id),
            name: Some(name.into()),
        }
    }

    /// Name used in logs and result file names
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("Profile_{}", self.id.0),
        }
    }
}

/// Opaque search description handed to the job source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDescriptor {
    url: Url,
}

/// Postings shown per result page by the job board
pub const JOBS_PER_PAGE: u32 = 25;

impl SearchDescriptor {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL of the given zero-based result page
    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("start", &(u64::from(page) * u64::from(JOBS_PER_PAGE)).to_string());
        url
    }
}

/// One unit of search work; immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTask {
    pub category: String,
    pub location: String,
    pub descriptor: SearchDescriptor,
}

impl fmt::Display for SearchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.category, self.location)
    }
}

/// A candidate posting as listed by the job source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobId,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
}

impl JobPosting {
    pub fn new(id: impl Into<JobId>, title: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            company: company.into(),
            location: String::new(),
        }
    }
}

/// Why an attempt was skipped without applying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Blacklisted,
    TitleMismatch,
    AlreadyApplied,
    QuotaReached,
}

/// Why an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ExtraInfoRequired,
    Timeout,
    UnknownError,
}

/// Terminal result of one attempted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ApplicationOutcome {
    Applied,
    Skipped(SkipReason),
    Failed(FailureReason),
}

impl ApplicationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplicationOutcome::Applied)
    }

    /// Human readable label used in result logs
    pub fn label(&self) -> &'static str {
        match self {
            ApplicationOutcome::Applied => "🥳 Applied successfully!",
            ApplicationOutcome::Skipped(SkipReason::Blacklisted) => "🚫 Blacklisted company!",
            ApplicationOutcome::Skipped(SkipReason::TitleMismatch) => "🚫 Title doesn't match!",
            ApplicationOutcome::Skipped(SkipReason::AlreadyApplied) => "✅ Already applied!",
            ApplicationOutcome::Skipped(SkipReason::QuotaReached) => "⏸️ Application quota reached",
            ApplicationOutcome::Failed(FailureReason::ExtraInfoRequired) => "🥵 Cannot apply - extra info needed",
            ApplicationOutcome::Failed(FailureReason::Timeout) => "🥵 Application timed out",
            ApplicationOutcome::Failed(FailureReason::UnknownError) => "🥵 Couldn't complete application",
        }
    }
}

impl fmt::Display for ApplicationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationOutcome::Applied => write!(f, "applied"),
            ApplicationOutcome::Skipped(reason) => write!(f, "skipped({reason:?})"),
            ApplicationOutcome::Failed(reason) => write!(f, "failed({reason:?})"),
        }
    }
}
