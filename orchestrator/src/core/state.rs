//! Per-session state management
//!
//! A `SessionState` is owned by exactly one worker. Its counters live behind
//! an `Arc` so the orchestrator can still read them when the worker crashes.

use serde::{Deserialize, Serialize};
use shared::{ApplicationOutcome, ProfileDescriptor, ProfileId, SkipReason};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Lifecycle of a session worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    Idle,
    Starting,
    Ready,
    Working,
    Draining,
    Closing,
    Done,
}

impl WorkerPhase {
    pub fn can_transition_to(self, next: WorkerPhase) -> bool {
        use WorkerPhase::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Ready)
                | (Starting, Done)
                | (Ready, Working)
                | (Working, Draining)
                | (Draining, Closing)
                | (Closing, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == WorkerPhase::Done
    }
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerPhase::Idle => "idle",
            WorkerPhase::Starting => "starting",
            WorkerPhase::Ready => "ready",
            WorkerPhase::Working => "working",
            WorkerPhase::Draining => "draining",
            WorkerPhase::Closing => "closing",
            WorkerPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome counters of one session, shared with the orchestrator
#[derive(Debug, Default)]
pub struct SessionCounters {
    applied: AtomicU32,
    failed: AtomicU32,
    blacklisted: AtomicU32,
    title_mismatch: AtomicU32,
    already_applied: AtomicU32,
    quota_reached: AtomicU32,
    searches: AtomicU32,
}

impl SessionCounters {
    pub fn record(&self, outcome: ApplicationOutcome) {
        let counter = match outcome {
            ApplicationOutcome::Applied => &self.applied,
            ApplicationOutcome::Failed(_) => &self.failed,
            ApplicationOutcome::Skipped(SkipReason::Blacklisted) => &self.blacklisted,
            ApplicationOutcome::Skipped(SkipReason::TitleMismatch) => &self.title_mismatch,
            ApplicationOutcome::Skipped(SkipReason::AlreadyApplied) => &self.already_applied,
            ApplicationOutcome::Skipped(SkipReason::QuotaReached) => &self.quota_reached,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_applied(&self) {
        self.record(ApplicationOutcome::Applied);
    }

    pub fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn applied(&self) -> u32 {
        self.applied.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            applied: self.applied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            blacklisted: self.blacklisted.load(Ordering::Relaxed),
            title_mismatch: self.title_mismatch.load(Ordering::Relaxed),
            already_applied: self.already_applied.load(Ordering::Relaxed),
            quota_reached: self.quota_reached.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `SessionCounters`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub applied: u32,
    pub failed: u32,
    pub blacklisted: u32,
    pub title_mismatch: u32,
    pub already_applied: u32,
    pub quota_reached: u32,
    pub searches: u32,
}

impl SessionStats {
    /// Attempts that reached the applier
    pub fn attempts(&self) -> u32 {
        self.applied + self.failed
    }

    pub fn skipped(&self) -> u32 {
        self.blacklisted + self.title_mismatch + self.already_applied + self.quota_reached
    }

    pub fn success_rate(&self) -> f64 {
        match self.attempts() {
            0 => 0.0,
            attempts => self.applied as f64 / attempts as f64 * 100.0,
        }
    }
}

/// Mutable state of one session worker
#[derive(Debug)]
pub struct SessionState {
    profile: ProfileDescriptor,
    phase: WorkerPhase,
    pub is_active: bool,
    counters: Arc<SessionCounters>,
    history: Vec<WorkerPhase>,
}

impl SessionState {
    pub fn new(profile: ProfileDescriptor) -> Self {
        Self {
            profile,
            phase: WorkerPhase::Idle,
            is_active: false,
            counters: Arc::new(SessionCounters::default()),
            history: vec![WorkerPhase::Idle],
        }
    }

    pub fn id(&self) -> ProfileId {
        self.profile.id
    }

    pub fn profile(&self) -> &ProfileDescriptor {
        &self.profile
    }

    pub fn display_name(&self) -> String {
        self.profile.display_name()
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    /// Every phase visited so far, in order
    pub fn history(&self) -> &[WorkerPhase] {
        &self.history
    }

    pub fn counters(&self) -> &Arc<SessionCounters> {
        &self.counters
    }

    pub fn applied_count(&self) -> u32 {
        self.counters.applied()
    }

    /// Move to `next`; phases only move forward along the lifecycle
    pub fn advance(&mut self, next: WorkerPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid phase transition {} -> {}",
            self.phase,
            next
        );
        self.phase = next;
        self.history.push(next);
    }
}
