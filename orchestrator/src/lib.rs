//! Orchestrator library for multi-profile job application runs
//!
//! Several isolated browsing profiles work through one shared queue of job
//! searches. A shared dedup store guarantees no job is applied to twice, and a
//! shared rate limiter paces every session and enforces per-session and
//! run-wide quotas.

pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;
pub mod worker;

// Re-export commonly used types
pub use core::{DedupStore, GlobalQuota, RateLimitPolicy, RateLimiter, TaskQueue, TaskSource};
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{Orchestrator, RunSummary, SessionStatus, SessionSummary};
pub use traits::{Applier, DedupBackend, JobSource, LoginPrompt, ResultRecord, ResultSink, SessionHandle, SessionProvider};
pub use worker::{Services, SessionWorker, WorkerExit, WorkerReport};
