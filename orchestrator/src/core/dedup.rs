//! Durable, concurrency-safe record of jobs already processed
//!
//! Every job id moves through `free -> reserved -> committed`, or back from
//! `reserved` through a release. Reservation is atomic across all workers:
//! exactly one caller observes `Reserved` for an id at a time. Commits are
//! persisted through the backend before they become visible, so a crash after
//! `commit` never loses the record and a crash before it never fabricates one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use shared::{session_debug, session_warn, JobId, ProfileId};
use tokio::sync::Mutex;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::DedupBackend;

/// Result of a reservation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Reserved,
    AlreadyTaken,
}

/// How a reservation is given back without committing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMode {
    /// No attempt was made; the id is free again
    NotAttempted,
    /// Attempted without applying; freed only when retries are allowed
    Unsuccessful,
    /// The attempt may have gone through but was never durably recorded
    Unconfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Reserved(ProfileId),
    /// Attempted in this run without being applied; never persisted
    Attempted,
    Committed,
}

/// Counters about store traffic, for summaries and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub reservations: u64,
    pub already_taken: u64,
    pub commits: u64,
    pub releases: u64,
    pub persistence_failures: u64,
}

struct Inner {
    entries: HashMap<JobId, EntryState>,
    committed: HashSet<JobId>,
    stats: DedupStats,
}

/// Global "already applied" record shared by every session worker
pub struct DedupStore {
    inner: Mutex<Inner>,
    backend: Arc<dyn DedupBackend>,
    allow_retry: bool,
}

impl DedupStore {
    /// Open the store, seeding it with every committed id from the backend
    pub async fn open(backend: Arc<dyn DedupBackend>, allow_retry: bool) -> OrchestratorResult<Self> {
        let committed = backend.load().await?;
        let entries = committed
            .iter()
            .map(|id| (id.clone(), EntryState::Committed))
            .collect();

        tracing::debug!(
            "📚 Loaded {} applied jobs from {}",
            committed.len(),
            backend.location()
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                entries,
                committed,
                stats: DedupStats::default(),
            }),
            backend,
            allow_retry,
        })
    }

    /// Atomically reserve `job_id` for `session`
    pub async fn check_and_reserve(&self, job_id: &JobId, session: ProfileId) -> Reservation {
        let mut inner = self.inner.lock().await;
        if inner.entries.contains_key(job_id) {
            inner.stats.already_taken += 1;
            return Reservation::AlreadyTaken;
        }

        inner.entries.insert(job_id.clone(), EntryState::Reserved(session));
        inner.stats.reservations += 1;
        Reservation::Reserved
    }

    /// Durably mark a reserved job as applied
    ///
    /// On a storage failure the in-memory commit is rolled back, `session`
    /// keeps its reservation and a retryable error is returned.
    pub async fn commit(&self, job_id: &JobId, session: ProfileId) -> OrchestratorResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.entries.get(job_id) {
            Some(EntryState::Reserved(owner)) if *owner == session => {}
            _ => {
                return Err(OrchestratorError::NotReserved {
                    job_id: job_id.clone(),
                    profile: session,
                })
            }
        }

        inner.committed.insert(job_id.clone());
        if let Err(e) = self.backend.persist(&inner.committed).await {
            inner.committed.remove(job_id);
            inner.stats.persistence_failures += 1;
            session_warn!(session, "💾 Could not persist job {}: {}", job_id, e);
            return Err(OrchestratorError::DedupPersistence {
                job_id: job_id.clone(),
                path: self.backend.location(),
                message: e.to_string(),
            });
        }

        inner.entries.insert(job_id.clone(), EntryState::Committed);
        inner.stats.commits += 1;
        Ok(())
    }

    /// Give back a reservation without committing it
    ///
    /// Returns false when `session` does not hold a reservation for the job.
    pub async fn release(&self, job_id: &JobId, session: ProfileId, mode: ReleaseMode) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.entries.get(job_id) {
            Some(EntryState::Reserved(owner)) if *owner == session => {}
            _ => {
                session_debug!(session, "Ignoring release of unreserved job {}", job_id);
                return false;
            }
        }

        let free = match mode {
            ReleaseMode::NotAttempted => true,
            ReleaseMode::Unsuccessful => self.allow_retry,
            ReleaseMode::Unconfirmed => false,
        };
        if free {
            inner.entries.remove(job_id);
        } else {
            inner.entries.insert(job_id.clone(), EntryState::Attempted);
        }
        inner.stats.releases += 1;
        true
    }

    pub async fn is_committed(&self, job_id: &JobId) -> bool {
        self.inner.lock().await.committed.contains(job_id)
    }

    /// Total committed ids, including those loaded at startup
    pub async fn committed_count(&self) -> usize {
        self.inner.lock().await.committed.len()
    }

    pub async fn stats(&self) -> DedupStats {
        self.inner.lock().await.stats.clone()
    }
}
