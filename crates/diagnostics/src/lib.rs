//! Simple diagnostics library for the tapload workspace
//!
//! Provides lightweight, configurable logging across all crates in the project.
//!
//! Usage:
//! - Set TAPLOAD_LOG=off (default) - no logs
//! - Set TAPLOAD_LOG=info - uploads and table registrations
//! - Set TAPLOAD_LOG=debug - producer thread lifecycle, row handoff, cancellation

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable selecting the minimum log level.
pub const LOG_ENV: &str = "TAPLOAD_LOG";

static INIT: Once = Once::new();

fn level_filter(value: &str) -> Option<emit::Level> {
    match value {
        "debug" => Some(emit::Level::Debug),
        "info" => Some(emit::Level::Info),
        "warn" => Some(emit::Level::Warn),
        "error" => Some(emit::Level::Error),
        _ => None,
    }
}

/// Initialize diagnostics based on the TAPLOAD_LOG environment variable
///
/// This should be called once at application startup. It's safe to call
/// multiple times - subsequent calls will be ignored.
pub fn init_diagnostics() {
    init_diagnostics_with_default("off");
}

/// Like [`init_diagnostics`], with `default` as the level when TAPLOAD_LOG is unset
pub fn init_diagnostics_with_default(default: &str) {
    INIT.call_once(|| {
        let log_level = std::env::var(LOG_ENV).unwrap_or_else(|_| default.to_string());
        if log_level == "off" {
            return;
        }

        let (level, known) = match level_filter(&log_level) {
            Some(level) => (level, true),
            None => (emit::Level::Info, false),
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        if !known {
            emit::warn!("unknown {env} value {value}, using info", env: LOG_ENV, value: log_level.as_str());
        }

        // The runtime lives for the rest of the process.
        std::mem::forget(rt);
    });
}

/// Log basic operations (uploads, registered tables, etc.)
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (thread lifecycle, row counts, internal state)
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log warning conditions (ignored callbacks, swallowed failures)
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log error conditions (parser failures, rejected uploads)
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Log basic operations (uploads, registered tables, etc.)
///
/// Examples: "Uploaded table {name}", "Loaded {rows} rows"
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics
///
/// Examples: "Producer thread started", "Stream cancelled by consumer"
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log warning conditions
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log error conditions
/// Using "error" instead of "fatal" for consistency with emit-rs
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_call_multiple_times() {
        init_diagnostics();
        init_diagnostics();
        init_diagnostics();
    }

    #[test]
    fn test_level_filter() {
        assert!(matches!(level_filter("debug"), Some(emit::Level::Debug)));
        assert!(matches!(level_filter("warn"), Some(emit::Level::Warn)));
        assert!(level_filter("verbose").is_none());
    }

    #[test]
    fn test_macros_compile() {
        log_info!("Test message");
        log_debug!("Debug message with {value}", value: 42);
        log_warn!("Warning message");
        log_error!("Error message");

        info!("Test message");
        debug!("Debug message with {value}", value: 42);
        warn!("Warning message");
        error!("Error message");
    }

    #[test]
    fn test_macros_with_local_properties() {
        let rows = 12_u64;
        let format = "arrow-ipc".to_string();
        let reason = std::io::Error::other("truncated").to_string();
        debug!("{format_name} stream delivered {rows} rows", format_name: format, rows: rows);
        warn!("stream stopped: {reason}", reason: reason);
    }
}
