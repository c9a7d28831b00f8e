//! Main orchestrator implementation
//!
//! Builds the run's task queue, spawns one `SessionWorker` per profile
//! (sequentially or with bounded parallelism) and aggregates their reports.
//! Workers run on their own tokio tasks, so a panicking worker is contained
//! at the `JoinHandle` boundary.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{logging, ProfileDescriptor, ProfileId, RunConfig, RunMode};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::core::{
    CandidateFilter, DedupStore, GlobalQuota, PerformanceSnapshot, RateLimiter, SessionCounters,
    SessionPerformance, SessionStats, TaskQueue, TaskSource,
};
use crate::error::OrchestratorResult;
use crate::worker::{Services, SessionWorker, SharedRunState, WorkerExit, WorkerReport};

/// Final state of one session as seen by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    OpenFailed,
    Crashed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub profile: ProfileId,
    pub name: String,
    pub status: SessionStatus,
    pub exit: WorkerExit,
    pub stats: SessionStats,
}

impl From<WorkerReport> for SessionSummary {
    fn from(report: WorkerReport) -> Self {
        let status = match &report.exit {
            WorkerExit::Crashed(_) => SessionStatus::Crashed,
            exit if !exit.started() => SessionStatus::OpenFailed,
            _ => SessionStatus::Completed,
        };
        Self {
            profile: report.profile.id,
            name: report.profile.display_name(),
            status,
            exit: report.exit,
            stats: report.stats,
        }
    }
}

/// Aggregate result of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub total_applied: u32,
    /// Distinct job ids committed to the dedup store during this run
    pub committed: u64,
    pub per_session: Vec<SessionSummary>,
}

impl RunSummary {
    pub fn session(&self, profile: ProfileId) -> Option<&SessionSummary> {
        self.per_session.iter().find(|s| s.profile == profile)
    }

    pub fn to_snapshot(&self) -> PerformanceSnapshot {
        let per_session: BTreeMap<_, _> = self
            .per_session
            .iter()
            .map(|s| (s.profile, SessionPerformance::from_stats(&s.name, &s.stats)))
            .collect();
        PerformanceSnapshot {
            timestamp: self.started_at,
            run_id: self.run_id,
            per_session,
        }
    }

    pub fn log(&self) {
        logging::log_success(&format!(
            "Run {} finished in {:.1}s: {} applications across {} sessions",
            self.run_id,
            self.elapsed.as_secs_f64(),
            self.total_applied,
            self.per_session.len()
        ));
        for session in &self.per_session {
            logging::log_progress(
                &session.name,
                &format!(
                    "{:?} ({:?}) applied={} failed={} skipped={} searches={}",
                    session.status,
                    session.exit,
                    session.stats.applied,
                    session.stats.failed,
                    session.stats.skipped(),
                    session.stats.searches
                ),
            );
        }
    }
}

/// Coordinates every session worker of a run
pub struct Orchestrator {
    config: RunConfig,
    services: Services,
    store: Arc<DedupStore>,
    limiter: Arc<RateLimiter>,
    filter: Arc<CandidateFilter>,
}

impl Orchestrator {
    /// Validate `config` and prepare a run; nothing is started yet
    pub fn new(config: RunConfig, services: Services, store: Arc<DedupStore>) -> OrchestratorResult<Self> {
        config.validate()?;
        let filter = CandidateFilter::from_config(&config.filters)?;
        let limiter = RateLimiter::from_config(&config);

        Ok(Self {
            config,
            services,
            store,
            limiter: Arc::new(limiter),
            filter: Arc::new(filter),
        })
    }

    /// Replace the pacing authority, e.g. with a zero-delay limiter in tests
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Arc::new(limiter);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub async fn run(&self) -> OrchestratorResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let tasks = TaskSource::new(&self.config.search).build()?;
        logging::log_startup(&format!(
            "run {} with {} profiles, {} searches, {:?} mode",
            run_id,
            self.config.profiles.len(),
            tasks.len(),
            self.config.schedule.mode
        ));

        let commits_before = self.store.stats().await.commits;
        let shared = SharedRunState {
            queue: Arc::new(TaskQueue::new(tasks)),
            store: self.store.clone(),
            limiter: self.limiter.clone(),
            global: Arc::new(GlobalQuota::new(self.config.limits.max_applications_per_run)),
            filter: self.filter.clone(),
        };

        let workers: Vec<SessionWorker> = self
            .config
            .profiles
            .iter()
            .map(|profile| {
                SessionWorker::new(
                    profile.clone(),
                    self.services.clone(),
                    shared.clone(),
                    self.config.limits.clone(),
                )
            })
            .collect();

        let reports = match self.config.schedule.mode {
            RunMode::Sequential => self.run_sequential(workers).await,
            RunMode::Parallel => self.run_parallel(workers).await,
        };

        let per_session: Vec<SessionSummary> = reports.into_iter().map(SessionSummary::from).collect();
        let summary = RunSummary {
            run_id,
            started_at,
            elapsed: start.elapsed(),
            total_applied: per_session.iter().map(|s| s.stats.applied).sum(),
            committed: self.store.stats().await.commits - commits_before,
            per_session,
        };
        summary.log();
        Ok(summary)
    }

    async fn run_sequential(&self, workers: Vec<SessionWorker>) -> Vec<WorkerReport> {
        let total = workers.len();
        let mut reports = Vec::with_capacity(total);

        for (index, worker) in workers.into_iter().enumerate() {
            let profile = worker.profile().clone();
            let counters = worker.counters();
            let handle = tokio::spawn(worker.run());
            reports.push(Self::join(profile, counters, handle).await);

            if index + 1 < total {
                let delay = self.limiter.delay_for_session_switch();
                logging::log_progress(
                    "Switching session",
                    &format!("waiting {:.1}s", delay.as_secs_f64()),
                );
                tokio::time::sleep(delay).await;
            }
        }
        reports
    }

    /// Admit workers in configured order, never more than `max_concurrent` at once
    async fn run_parallel(&self, workers: Vec<SessionWorker>) -> Vec<WorkerReport> {
        let semaphore = Arc::new(Semaphore::new(self.config.schedule.max_concurrent));
        let mut running = Vec::with_capacity(workers.len());

        for (index, worker) in workers.into_iter().enumerate() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    logging::log_error("Admitting session worker", &e);
                    break;
                }
            };
            if index > 0 {
                tokio::time::sleep(self.limiter.delay_for_stagger()).await;
            }

            let profile = worker.profile().clone();
            let counters = worker.counters();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                worker.run().await
            });
            running.push((profile, counters, handle));
        }

        let mut reports = Vec::with_capacity(running.len());
        for (profile, counters, handle) in running {
            reports.push(Self::join(profile, counters, handle).await);
        }
        reports
    }

    async fn join(
        profile: ProfileDescriptor,
        counters: Arc<SessionCounters>,
        handle: JoinHandle<WorkerReport>,
    ) -> WorkerReport {
        match handle.await {
            Ok(report) => report,
            Err(e) => {
                let message = if e.is_panic() {
                    "worker panicked".to_string()
                } else {
                    e.to_string()
                };
                logging::log_error(&format!("Session {}", profile.display_name()), &message);
                WorkerReport::crashed(profile, &counters, message)
            }
        }
    }
}
