//! # tokio-healing-router
//!
//! A self-aware request router for pools of interchangeable backends over Tokio.
//!
//! ## Architecture
//!
//! ```text
//! caller ──► route_request ──► RouteResult ──► caller performs the work
//!   │                                                   │
//!   └──► record_request_start ....................► record_request_end
//!                        │                              │
//!                        ▼                              ▼
//!              ┌──────────────── RouterState (one lock) ────────────────┐
//!              │ components · active requests · repair log · latencies  │
//!              └────────────────────────▲───────────────────────────────┘
//!                                       │
//!                    monitor tick: probe → reap → congestion → status
//! ```
//!
//! The router never performs work itself. Callers register components once,
//! ask the router for a target, run the work, then report the outcome. A
//! background monitor reaps stalled requests, flags capacity overruns and
//! recomputes a single process-wide [`SystemStatus`](healing::SystemStatus).
//! When no component is eligible, routing triggers emergency recovery instead
//! of failing.

// ── Lint policy ──────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod healing;
pub mod metrics;

// Re-exports for convenience
pub use config::{ComponentConfig, RouterConfig};
pub use healing::{
    Component, IssueType, LivenessProbe, RepairAction, RepairActionView, RouteResult,
    RouterMetrics, SelfHealingRouter, SystemStatus, TickReport,
};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"`: structured JSON output for log aggregators
/// - anything else (including unset): human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=tokio_healing_router=debug`).
///
/// # Errors
///
/// Returns [`RouterError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Example
///
/// ```no_run
/// # use tokio_healing_router::{init_tracing, RouterError};
/// # fn example() -> Result<(), RouterError> {
/// init_tracing()?;
/// # Ok(()) }
/// ```
pub fn init_tracing() -> Result<(), RouterError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| RouterError::Other(format!("tracing init failed: {e}")))
}

/// Top-level router errors.
///
/// Routing, lifecycle hooks and observability calls never return errors;
/// only lifecycle control and one-time initialisation do.
#[derive(Error, Debug)]
pub enum RouterError {
    /// The router configuration violates one or more constraints.
    ///
    /// Returned by [`SelfHealingRouter::start`] so that misconfiguration
    /// surfaces before the monitor ever ticks.
    #[error("invalid router configuration: {0}")]
    InvalidConfig(String),

    /// `start()` was called outside a Tokio runtime.
    #[error("no tokio runtime available to host the health monitor")]
    NoRuntime,

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

/// Generate a fresh request identifier (UUID v4) for lifecycle correlation.
///
/// # Panics
///
/// This function never panics.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
