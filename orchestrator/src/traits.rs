//! Trait definitions with mockall annotations for testing
//!
//! The page-interaction side of the system (opening browser identities,
//! listing postings, clicking through application wizards) lives behind these
//! traits. The scheduler only depends on the boundary, which keeps every
//! collaborator injectable and mockable.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{ApplicationOutcome, JobId, JobPosting, ProfileDescriptor, ProfileId, SearchTask};

use crate::error::OrchestratorResult;

/// Capability for one opened, isolated browsing identity
///
/// Deliberately neither `Clone` nor `Copy`: a handle is owned by exactly one
/// worker and handed back to the provider on close.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionHandle {
    pub profile: ProfileId,
    /// Provider-specific address of the running session (e.g. a debugging port)
    pub endpoint: String,
}

impl SessionHandle {
    pub fn new(profile: ProfileId, endpoint: impl Into<String>) -> Self {
        Self {
            profile,
            endpoint: endpoint.into(),
        }
    }
}

/// One structured line of a per-session result log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub timestamp: DateTime<Utc>,
    pub profile: ProfileId,
    pub profile_name: String,
    pub job_id: JobId,
    pub title: String,
    pub company: String,
    pub location: String,
    pub search: String,
    pub outcome: ApplicationOutcome,
    pub result: String,
}

impl ResultRecord {
    pub fn new(
        profile: &ProfileDescriptor,
        posting: &JobPosting,
        task: &SearchTask,
        outcome: ApplicationOutcome,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            profile: profile.id,
            profile_name: profile.display_name(),
            job_id: posting.id.clone(),
            title: posting.title.clone(),
            company: posting.company.clone(),
            location: posting.location.clone(),
            search: task.to_string(),
            outcome,
            result: outcome.label().to_string(),
        }
    }
}

/// Opens and closes isolated browsing identities
#[mockall::automock]
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open the identity described by `profile`
    async fn open(&self, profile: &ProfileDescriptor) -> OrchestratorResult<SessionHandle>;

    /// Release a previously opened identity
    async fn close(&self, handle: SessionHandle) -> OrchestratorResult<()>;

    /// Whether the session is logged in to the job board
    async fn is_authenticated(&self, handle: &SessionHandle) -> OrchestratorResult<bool>;
}

/// Interactive fallback used when a session is not logged in
#[mockall::automock]
#[async_trait::async_trait]
pub trait LoginPrompt: Send + Sync {
    /// Block until the operator reports having logged in manually
    async fn wait_for_login(&self, profile: &ProfileDescriptor) -> OrchestratorResult<()>;
}

/// Enumerates candidate postings for a search
#[mockall::automock]
#[async_trait::async_trait]
pub trait JobSource: Send + Sync {
    /// List the postings on one zero-based result page; empty when exhausted
    async fn list_candidates(
        &self,
        task: &SearchTask,
        session: &SessionHandle,
        page: u32,
    ) -> OrchestratorResult<Vec<JobPosting>>;
}

/// Drives one application attempt to a terminal outcome
#[mockall::automock]
#[async_trait::async_trait]
pub trait Applier: Send + Sync {
    async fn attempt(
        &self,
        posting: &JobPosting,
        session: &SessionHandle,
    ) -> OrchestratorResult<ApplicationOutcome>;
}

/// Durable record of committed job ids
#[mockall::automock]
#[async_trait::async_trait]
pub trait DedupBackend: Send + Sync {
    /// Read every committed id; an absent record is an empty set
    async fn load(&self) -> OrchestratorResult<HashSet<JobId>>;

    /// Durably replace the record with `committed`
    async fn persist(&self, committed: &HashSet<JobId>) -> OrchestratorResult<()>;

    /// Human readable location of the record
    fn location(&self) -> String;
}

/// Append-only sink for per-session result lines
#[mockall::automock]
#[async_trait::async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, record: &ResultRecord) -> OrchestratorResult<()>;
}
