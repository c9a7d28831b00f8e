//! Common test utilities and infrastructure
//!
//! Shared fixtures, recording collaborators and the orchestrator builder
//! used across all orchestrator test suites.

#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fixtures::TestFixtures;
pub use helpers::{
    CountingApplier, MemoryBackend, OrchestratorBuilder, RecordingSink, ScriptedJobSource,
    TestHelpers, TestRun, TrackingSessionProvider,
};
