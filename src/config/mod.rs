//! # Router Configuration
//!
//! ## Responsibility
//! Define every tunable threshold of the router, the monitor cadence, and an
//! optional list of components registered at construction time. Configs can
//! be built in code or parsed from TOML:
//! ```text
//! health_check_interval_secs = 5.0
//! request_timeout_secs = 30.0
//!
//! [[components]]
//! id = "primary"
//! endpoint = "http://10.0.0.1:8080"
//! priority = 3
//! max_concurrent = 10
//! ```
//!
//! ## Guarantees
//! - Defaulted: every field has a documented default
//! - Validated: [`validation::validate`] checks every semantic constraint
//! - Serializable: round-trips through serde (TOML ↔ Rust)
//!
//! ## NOT Responsible For
//! - Applying thresholds (that belongs to `healing::health`)
//! - Hot reload; configuration is read once at construction

pub mod loader;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Default value functions ──────────────────────────────────────────────

/// Default monitor interval: 5 seconds.
fn default_health_check_interval_secs() -> f64 {
    5.0
}

/// Default minimum health score for eligibility.
fn default_healthy_min() -> f64 {
    0.5
}

/// Default failure count at which a component stops being eligible.
fn default_failure_limit() -> u32 {
    5
}

/// Default age after which an in-flight request is considered stalled: 30s.
fn default_request_timeout_secs() -> f64 {
    30.0
}

/// Default health gain per successful request.
fn default_recovery_step() -> f64 {
    0.1
}

/// Default multiplicative penalty per failed request.
fn default_penalty_factor() -> f64 {
    0.6
}

/// Default health ceiling.
fn default_health_max() -> f64 {
    2.0
}

/// Default repair log capacity.
fn default_repair_log_capacity() -> usize {
    1000
}

/// Default response-time ring buffer size.
fn default_response_time_window() -> usize {
    1000
}

/// Default per-probe timeout: 2000ms.
fn default_probe_timeout_ms() -> u64 {
    2000
}

/// Default component priority.
fn default_priority() -> u32 {
    1
}

/// Default component capacity.
fn default_max_concurrent() -> usize {
    10
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Constructor-time configuration for a
/// [`SelfHealingRouter`](crate::healing::SelfHealingRouter).
///
/// # Example
///
/// ```rust
/// use tokio_healing_router::RouterConfig;
/// let config = RouterConfig::default();
/// assert_eq!(config.failure_limit, 5);
/// assert!((config.healthy_min - 0.5).abs() < f64::EPSILON);
/// ```
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterConfig {
    /// Seconds between background monitor ticks.
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: f64,

    /// Minimum `health_score` a component needs to be eligible.
    #[serde(default = "default_healthy_min")]
    pub healthy_min: f64,

    /// A component with this many failures (or more) is ineligible.
    #[serde(default = "default_failure_limit")]
    pub failure_limit: u32,

    /// In-flight requests older than this (seconds) are reaped as stalled.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: f64,

    /// Health added on each successful request, capped at `health_max`.
    #[serde(default = "default_recovery_step")]
    pub recovery_step: f64,

    /// Health multiplier applied on each failed request.
    #[serde(default = "default_penalty_factor")]
    pub penalty_factor: f64,

    /// Upper bound for `health_score`.
    #[serde(default = "default_health_max")]
    pub health_max: f64,

    /// Maximum number of repair actions retained; oldest are evicted first.
    #[serde(default = "default_repair_log_capacity")]
    pub repair_log_capacity: usize,

    /// Number of recent response times kept for percentile reporting.
    #[serde(default = "default_response_time_window")]
    pub response_time_window: usize,

    /// Upper bound on a single liveness probe call, in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// When `true`, emergency recovery also resets failure counters and
    /// health scores instead of only reactivating components.
    #[serde(default)]
    pub emergency_resets_health: bool,

    /// Components registered when the router is constructed.
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: default_health_check_interval_secs(),
            healthy_min: default_healthy_min(),
            failure_limit: default_failure_limit(),
            request_timeout_secs: default_request_timeout_secs(),
            recovery_step: default_recovery_step(),
            penalty_factor: default_penalty_factor(),
            health_max: default_health_max(),
            repair_log_capacity: default_repair_log_capacity(),
            response_time_window: default_response_time_window(),
            probe_timeout_ms: default_probe_timeout_ms(),
            emergency_resets_health: false,
            components: Vec::new(),
        }
    }
}

impl RouterConfig {
    /// Return the monitor interval as a [`Duration`].
    ///
    /// Non-positive or NaN values clamp to zero and values too large for a
    /// [`Duration`] saturate; [`validation::validate`] rejects both before
    /// the monitor starts.
    pub fn health_check_interval(&self) -> Duration {
        secs_to_duration(self.health_check_interval_secs)
    }

    /// Return the stalled-request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        secs_to_duration(self.request_timeout_secs)
    }

    /// Return the per-probe timeout as a [`Duration`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Run every validation rule, joining violations into one
    /// [`RouterError::InvalidConfig`](crate::RouterError::InvalidConfig).
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` listing every violated constraint.
    pub fn validate(&self) -> Result<(), crate::RouterError> {
        validation::validate(self).map_err(|errors| {
            crate::RouterError::InvalidConfig(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    match Duration::try_from_secs_f64(secs) {
        Ok(d) => d,
        Err(_) if secs > 0.0 => Duration::MAX,
        Err(_) => Duration::ZERO,
    }
}

/// Declarative description of a component to register at construction.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentConfig {
    /// Unique component identifier.
    pub id: String,
    /// Opaque endpoint descriptor, never parsed by the router.
    #[serde(default)]
    pub endpoint: String,
    /// Routing priority; higher wins when otherwise equal.
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Concurrent requests this component contributes to total capacity.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_match_documented_values() {
        let c = RouterConfig::default();
        assert!((c.health_check_interval_secs - 5.0).abs() < f64::EPSILON);
        assert!((c.healthy_min - 0.5).abs() < f64::EPSILON);
        assert_eq!(c.failure_limit, 5);
        assert!((c.request_timeout_secs - 30.0).abs() < f64::EPSILON);
        assert!((c.recovery_step - 0.1).abs() < f64::EPSILON);
        assert!((c.penalty_factor - 0.6).abs() < f64::EPSILON);
        assert!((c.health_max - 2.0).abs() < f64::EPSILON);
        assert!(!c.emergency_resets_health);
        assert!(c.components.is_empty());
    }

    #[test]
    fn test_duration_accessors() {
        let c = RouterConfig {
            health_check_interval_secs: 0.25,
            request_timeout_secs: 30.0,
            probe_timeout_ms: 150,
            ..RouterConfig::default()
        };
        assert_eq!(c.health_check_interval(), Duration::from_millis(250));
        assert_eq!(c.request_timeout(), Duration::from_secs(30));
        assert_eq!(c.probe_timeout(), Duration::from_millis(150));
    }

    #[test]
    fn test_negative_interval_clamps_to_zero_duration() {
        let c = RouterConfig {
            health_check_interval_secs: -1.0,
            ..RouterConfig::default()
        };
        assert_eq!(c.health_check_interval(), Duration::ZERO);
    }

    #[test]
    fn test_oversized_timeout_saturates_instead_of_zeroing() {
        let c = RouterConfig {
            request_timeout_secs: 1e20,
            health_check_interval_secs: f64::INFINITY,
            ..RouterConfig::default()
        };
        assert_eq!(c.request_timeout(), Duration::MAX);
        assert_eq!(c.health_check_interval(), Duration::MAX);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_default_is_ok() {
        assert!(RouterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_joins_all_violations() {
        let c = RouterConfig {
            health_check_interval_secs: 0.0,
            failure_limit: 0,
            ..RouterConfig::default()
        };
        let msg = c.validate().err().map(|e| e.to_string()).unwrap_or_default();
        assert!(msg.contains("health_check_interval_secs"));
        assert!(msg.contains("failure_limit"));
    }
}
