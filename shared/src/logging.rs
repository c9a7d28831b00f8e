//! Shared logging utilities for consistent tracing across sessions

use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Crates whose events are shown at the requested level
const TRACED_CRATES: &[&str] = &["orchestrator", "shared"];

/// Build the env-filter directive for a base level
pub fn filter_directive(log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");
    TRACED_CRATES
        .iter()
        .map(|name| format!("{name}={base_level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the stdout tracing subscriber with an optional log level
pub fn init_tracing_with_level(log_level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let directive = filter_directive(log_level);
    println!("📊 Log level: {directive}");

    fmt()
        .with_env_filter(EnvFilter::new(&directive))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for session-aware info logging
#[macro_export]
macro_rules! session_info {
    ($session:expr, $($arg:tt)*) => {
        tracing::info!(
            session = %$session,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for session-aware warning logging
#[macro_export]
macro_rules! session_warn {
    ($session:expr, $($arg:tt)*) => {
        tracing::warn!(
            session = %$session,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for session-aware error logging
#[macro_export]
macro_rules! session_error {
    ($session:expr, $($arg:tt)*) => {
        tracing::error!(
            session = %$session,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for session-aware debug logging
#[macro_export]
macro_rules! session_debug {
    ($session:expr, $($arg:tt)*) => {
        tracing::debug!(
            session = %$session,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(details: &str) {
    info!(timestamp = format_timestamp(), "🚀 Starting {}", details);
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(reason: &str) {
    info!(timestamp = format_timestamp(), "🛑 Shutting down: {}", reason);
}

/// Contextual logging helper for error conditions
pub fn log_error(context: &str, error: &dyn std::fmt::Display) {
    error!(
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(message: &str) {
    info!(timestamp = format_timestamp(), "✅ {}", message);
}

/// Contextual logging helper for progress updates
pub fn log_progress(action: &str, details: &str) {
    info!(timestamp = format_timestamp(), "📋 {}: {}", action, details);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(None), "orchestrator=info,shared=info");
        assert_eq!(filter_directive(Some("debug")), "orchestrator=debug,shared=debug");
    }

    #[test]
    fn test_timestamp_format() {
        let ts = format_timestamp();
        // HH:MM:SS.mmm
        assert_eq!(ts.len(), 12);
        assert_eq!(&ts[2..3], ":");
        assert_eq!(&ts[8..9], ".");
    }
}
