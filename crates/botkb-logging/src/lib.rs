//! # botkb-logging
//!
//! Structured logging with `tracing`.
//!
//! - [`init_subscriber`] / [`init_json_subscriber`] install the process-wide
//!   stderr subscriber. `RUST_LOG` takes precedence over the level argument.
//! - [`test_utils::capture_logs`] installs a thread-local capture layer so
//!   tests can assert that degraded paths (corrupt snapshots, dangling ids,
//!   unreachable backends) were actually reported.

#![deny(unsafe_code)]

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber with compact stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}

/// Initialize the global tracing subscriber with JSON-lines stderr output.
///
/// Same semantics as [`init_subscriber`], for log shippers.
pub fn init_json_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .json();

    let _ = subscriber.try_init();
}
