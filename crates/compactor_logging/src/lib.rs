#![deny(missing_docs)]
//! Shared logging utilities for the compactor workspace.
//!
//! This crate provides the `compactor_*` logging macros used across the
//! codebase and a minimal test initializer for the global logger. Every line
//! logged through the macros is tagged with the id of the job that is
//! currently running, so interleaved chunk completions stay attributable.

use std::sync::atomic::{AtomicU64, Ordering};

/// Id of the job currently owning the pipeline. Zero means "no job".
static ACTIVE_JOB: AtomicU64 = AtomicU64::new(0);

/// Records the job that subsequent log lines belong to.
/// The orchestrator calls this when a job is accepted.
pub fn set_active_job(job_id: u64) {
    ACTIVE_JOB.store(job_id, Ordering::Relaxed);
}

/// Retrieves the active job id, or 0 when no job has been started.
pub fn active_job() -> u64 {
    ACTIVE_JOB.load(Ordering::Relaxed)
}

/// Logs a trace-level message tagged with the active job.
#[macro_export]
macro_rules! compactor_trace {
    ($($arg:tt)*) => {{
        log::trace!("[job {}] {}", $crate::active_job(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message tagged with the active job.
#[macro_export]
macro_rules! compactor_info {
    ($($arg:tt)*) => {{
        log::info!("[job {}] {}", $crate::active_job(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message tagged with the active job.
#[macro_export]
macro_rules! compactor_debug {
    ($($arg:tt)*) => {{
        log::debug!("[job {}] {}", $crate::active_job(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message tagged with the active job.
#[macro_export]
macro_rules! compactor_warn {
    ($($arg:tt)*) => {{
        log::warn!("[job {}] {}", $crate::active_job(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message tagged with the active job.
#[macro_export]
macro_rules! compactor_error {
    ($($arg:tt)*) => {{
        log::error!("[job {}] {}", $crate::active_job(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Another test may already own the global logger.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
