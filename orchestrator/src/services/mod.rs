//! Service implementations
//!
//! File-backed implementations of the collaborator traits plus simulated
//! stand-ins for the browser side, used for dry runs.

pub mod dedup_file;
pub mod history;
pub mod login_prompt;
pub mod result_sink;
pub mod simulated;

#[cfg(test)]
mod tests;

pub use dedup_file::JsonFileBackend;
pub use history::PerformanceHistory;
pub use login_prompt::TerminalLoginPrompt;
pub use result_sink::FileResultSink;
pub use simulated::{AutoLoginPrompt, SimulatedApplier, SimulatedJobSource, SimulatedSessionProvider};
