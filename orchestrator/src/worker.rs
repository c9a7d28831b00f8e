//! Session worker: drives one profile through the shared task queue
//!
//! A worker owns its `SessionHandle` for its whole life and always hands it
//! back to the provider, including when the work loop panics.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde::Serialize;
use shared::{
    session_debug, session_error, session_info, session_warn, ApplicationOutcome, FailureReason,
    JobId, JobPosting, LimitConfig, ProfileDescriptor, SearchTask, SkipReason,
};

use crate::core::{
    CandidateFilter, DedupStore, GlobalQuota, RateLimiter, ReleaseMode, Reservation,
    SessionCounters, SessionState, SessionStats, TaskQueue, WorkerPhase,
};
use crate::error::OrchestratorResult;
use crate::traits::{
    Applier, JobSource, LoginPrompt, ResultRecord, ResultSink, SessionHandle, SessionProvider,
};

/// Base delay between commit retries; attempt `n` waits `n` times this
pub const COMMIT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// External collaborators shared by every worker of a run
#[derive(Clone)]
pub struct Services {
    pub sessions: Arc<dyn SessionProvider>,
    pub login: Arc<dyn LoginPrompt>,
    pub jobs: Arc<dyn JobSource>,
    pub applier: Arc<dyn Applier>,
    pub sink: Arc<dyn ResultSink>,
}

/// Run-wide state every worker reads from or reserves against
#[derive(Clone)]
pub struct SharedRunState {
    pub queue: Arc<TaskQueue>,
    pub store: Arc<DedupStore>,
    pub limiter: Arc<RateLimiter>,
    pub global: Arc<GlobalQuota>,
    pub filter: Arc<CandidateFilter>,
}

/// Why a worker stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum WorkerExit {
    QueueEmpty,
    QuotaReached,
    SearchBudgetSpent,
    OpenFailed(String),
    AuthenticationFailed,
    Crashed(String),
}

impl WorkerExit {
    /// Whether the worker got past session startup
    pub fn started(&self) -> bool {
        !matches!(self, WorkerExit::OpenFailed(_) | WorkerExit::AuthenticationFailed)
    }
}

/// What a finished worker reports to the orchestrator
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub profile: ProfileDescriptor,
    pub stats: SessionStats,
    pub exit: WorkerExit,
    pub phases: Vec<WorkerPhase>,
}

impl WorkerReport {
    /// Report for a worker whose task died before it could report itself
    pub fn crashed(profile: ProfileDescriptor, counters: &SessionCounters, message: String) -> Self {
        Self {
            profile,
            stats: counters.snapshot(),
            exit: WorkerExit::Crashed(message),
            phases: Vec::new(),
        }
    }
}

enum SearchFlow {
    Continue,
    QuotaReached,
}

pub struct SessionWorker {
    state: SessionState,
    services: Services,
    shared: SharedRunState,
    limits: LimitConfig,
}

impl SessionWorker {
    pub fn new(
        profile: ProfileDescriptor,
        services: Services,
        shared: SharedRunState,
        limits: LimitConfig,
    ) -> Self {
        Self {
            state: SessionState::new(profile),
            services,
            shared,
            limits,
        }
    }

    pub fn profile(&self) -> &ProfileDescriptor {
        self.state.profile()
    }

    /// Counters that stay readable after the worker is consumed
    pub fn counters(&self) -> Arc<SessionCounters> {
        self.state.counters().clone()
    }

    fn name(&self) -> String {
        self.state.display_name()
    }

    /// Run the worker to completion
    ///
    /// A panic inside the work loop is re-raised after the session has been
    /// closed, so the spawning task observes it as a `JoinError`.
    pub async fn run(mut self) -> WorkerReport {
        self.state.advance(WorkerPhase::Starting);
        session_info!(self.name(), "🚀 Starting session");

        let handle = match self.start().await {
            Ok(handle) => handle,
            Err(exit) => {
                self.state.advance(WorkerPhase::Done);
                return self.report(exit);
            }
        };

        self.state.advance(WorkerPhase::Ready);
        self.state.is_active = true;
        self.state.advance(WorkerPhase::Working);

        let outcome = AssertUnwindSafe(self.work(&handle)).catch_unwind().await;

        self.state.advance(WorkerPhase::Draining);
        self.state.advance(WorkerPhase::Closing);
        self.close(handle).await;
        self.state.is_active = false;
        self.state.advance(WorkerPhase::Done);

        match outcome {
            Ok(exit) => {
                let report = self.report(exit);
                session_info!(
                    self.name(),
                    "🏁 Session finished ({:?}): {} applied, {} failed, {} skipped",
                    report.exit,
                    report.stats.applied,
                    report.stats.failed,
                    report.stats.skipped()
                );
                report
            }
            Err(panic) => {
                session_error!(self.name(), "💥 Work loop panicked; session closed");
                std::panic::resume_unwind(panic)
            }
        }
    }

    fn report(&self, exit: WorkerExit) -> WorkerReport {
        WorkerReport {
            profile: self.state.profile().clone(),
            stats: self.state.counters().snapshot(),
            exit,
            phases: self.state.history().to_vec(),
        }
    }

    /// Open the session and make sure it is logged in
    async fn start(&self) -> Result<SessionHandle, WorkerExit> {
        let profile = self.state.profile();
        let handle = match self.services.sessions.open(profile).await {
            Ok(handle) => handle,
            Err(e) => {
                session_error!(self.name(), "❌ Could not open session: {}", e);
                return Err(WorkerExit::OpenFailed(e.to_string()));
            }
        };

        if self.authenticated(&handle).await {
            return Ok(handle);
        }

        session_warn!(self.name(), "🔐 Not logged in, waiting for manual login");
        if let Err(e) = self.services.login.wait_for_login(profile).await {
            session_warn!(self.name(), "Login prompt failed: {}", e);
        }
        if self.authenticated(&handle).await {
            return Ok(handle);
        }

        session_error!(self.name(), "❌ Still not logged in, skipping profile");
        self.close(handle).await;
        Err(WorkerExit::AuthenticationFailed)
    }

    async fn authenticated(&self, handle: &SessionHandle) -> bool {
        match self.services.sessions.is_authenticated(handle).await {
            Ok(authenticated) => authenticated,
            Err(e) => {
                session_warn!(self.name(), "Authentication check failed: {}", e);
                false
            }
        }
    }

    async fn close(&self, handle: SessionHandle) {
        if let Err(e) = self.services.sessions.close(handle).await {
            session_warn!(self.name(), "Closing session failed: {}", e);
        }
    }

    /// Whether the profile or the run has used up its applications
    ///
    /// Units claimed by sibling attempts still in flight do not count.
    fn quota_exhausted(&self) -> bool {
        self.shared.limiter.session_quota_reached(&self.state) || self.shared.global.is_exhausted()
    }

    async fn work(&mut self, handle: &SessionHandle) -> WorkerExit {
        let mut searches = 0;
        loop {
            if self.quota_exhausted() {
                return WorkerExit::QuotaReached;
            }
            if searches >= self.limits.max_searches_per_profile {
                session_info!(self.name(), "📋 Search budget of {} spent", searches);
                return WorkerExit::SearchBudgetSpent;
            }

            let Some(task) = self.shared.queue.pop().await else {
                return WorkerExit::QueueEmpty;
            };
            searches += 1;
            self.state.counters().record_search();
            session_info!(self.name(), "🔍 Searching {}", task);

            if let SearchFlow::QuotaReached = self.process_search(&task, handle).await {
                session_info!(self.name(), "⏸️ Application quota reached");
                return WorkerExit::QuotaReached;
            }

            if !self.shared.queue.is_empty().await {
                let delay = self.shared.limiter.delay_between_searches();
                session_debug!(self.name(), "Next search in {:.1}s", delay.as_secs_f64());
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn process_search(&mut self, task: &SearchTask, handle: &SessionHandle) -> SearchFlow {
        for page in 0..self.limits.max_pages_per_search {
            let candidates = match self.services.jobs.list_candidates(task, handle, page).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    session_warn!(self.name(), "Listing page {} of {} failed: {}", page, task, e);
                    break;
                }
            };
            if candidates.is_empty() {
                break;
            }

            let mut remaining = candidates.iter();
            while let Some(posting) = remaining.next() {
                let outcome = self.process_candidate(task, posting, handle).await;
                if outcome == ApplicationOutcome::Skipped(SkipReason::QuotaReached) {
                    for rest in remaining {
                        self.record(task, rest, outcome).await;
                    }
                    return SearchFlow::QuotaReached;
                }
            }
        }
        SearchFlow::Continue
    }

    async fn process_candidate(
        &mut self,
        task: &SearchTask,
        posting: &JobPosting,
        handle: &SessionHandle,
    ) -> ApplicationOutcome {
        let session = self.state.id();

        if let Some(reason) = self.shared.filter.check(posting) {
            let outcome = ApplicationOutcome::Skipped(reason);
            self.record(task, posting, outcome).await;
            return outcome;
        }

        if self.shared.store.check_and_reserve(&posting.id, session).await == Reservation::AlreadyTaken {
            let outcome = ApplicationOutcome::Skipped(SkipReason::AlreadyApplied);
            self.record(task, posting, outcome).await;
            return outcome;
        }

        if !self.shared.limiter.allow_attempt(&self.state, &self.shared.global).await {
            self.shared
                .store
                .release(&posting.id, session, ReleaseMode::NotAttempted)
                .await;
            let outcome = ApplicationOutcome::Skipped(SkipReason::QuotaReached);
            self.record(task, posting, outcome).await;
            return outcome;
        }

        let delay = self.shared.limiter.delay_for_next_application(&self.state);
        tokio::time::sleep(delay).await;

        let attempted = match AssertUnwindSafe(self.attempt(posting, handle)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                self.shared
                    .store
                    .release(&posting.id, session, ReleaseMode::Unsuccessful)
                    .await;
                self.shared.global.refund();
                std::panic::resume_unwind(panic)
            }
        };

        let outcome = match attempted {
            ApplicationOutcome::Applied => match self.commit_with_retry(&posting.id).await {
                Ok(()) => {
                    self.shared.global.spend();
                    ApplicationOutcome::Applied
                }
                Err(e) => {
                    session_error!(self.name(), "💾 Applied to {} but could not record it: {}", posting.id, e);
                    self.shared
                        .store
                        .release(&posting.id, session, ReleaseMode::Unconfirmed)
                        .await;
                    // The application may have gone through, so its unit stays used
                    self.shared.global.spend();
                    ApplicationOutcome::Failed(FailureReason::UnknownError)
                }
            },
            other => {
                self.shared
                    .store
                    .release(&posting.id, session, ReleaseMode::Unsuccessful)
                    .await;
                self.shared.global.refund();
                other
            }
        };

        self.record(task, posting, outcome).await;
        outcome
    }

    /// One bounded application attempt; collaborator errors become failures
    async fn attempt(&self, posting: &JobPosting, handle: &SessionHandle) -> ApplicationOutcome {
        let timeout = self.limits.attempt_timeout();
        match tokio::time::timeout(timeout, self.services.applier.attempt(posting, handle)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                session_warn!(self.name(), "Application to {} failed: {}", posting.id, e);
                ApplicationOutcome::Failed(FailureReason::UnknownError)
            }
            Err(_) => {
                session_warn!(self.name(), "Application to {} timed out after {:?}", posting.id, timeout);
                ApplicationOutcome::Failed(FailureReason::Timeout)
            }
        }
    }

    async fn commit_with_retry(&self, job_id: &JobId) -> OrchestratorResult<()> {
        let session = self.state.id();
        let mut attempt = 1;
        loop {
            match self.shared.store.commit(job_id, session).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.limits.max_retry_attempts => {
                    session_warn!(
                        self.name(),
                        "Commit of {} failed (attempt {}/{}): {}",
                        job_id,
                        attempt,
                        self.limits.max_retry_attempts,
                        e
                    );
                    tokio::time::sleep(COMMIT_RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn record(&self, task: &SearchTask, posting: &JobPosting, outcome: ApplicationOutcome) {
        self.state.counters().record(outcome);
        session_info!(
            self.name(),
            "{} | {} | {} | {}",
            posting.title,
            posting.company,
            posting.location,
            outcome.label()
        );

        let record = ResultRecord::new(self.state.profile(), posting, task, outcome);
        if let Err(e) = self.services.sink.record(&record).await {
            session_error!(self.name(), "Could not write result for {}: {}", posting.id, e);
        }
    }
}
