//! Core business logic modules
//!
//! Dedup, pacing, task generation, filtering and per-session state. The
//! durable side of the dedup store is injected through `DedupBackend`, so
//! everything here is testable without touching the file system.

pub mod dedup;
pub mod filters;
pub mod performance;
pub mod rate_limit;
pub mod state;
pub mod task_queue;

pub use dedup::{DedupStats, DedupStore, ReleaseMode, Reservation};
pub use filters::CandidateFilter;
pub use performance::{LogAnalysis, PerformanceSnapshot, ProfileReport, SessionPerformance};
pub use rate_limit::{GlobalQuota, RateLimitPolicy, RateLimiter};
pub use state::{SessionCounters, SessionState, SessionStats, WorkerPhase};
pub use task_queue::{TaskQueue, TaskSource};
