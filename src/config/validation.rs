//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a [`RouterConfig`] that cannot be
//! expressed through the type system alone (range checks, cross-field
//! invariants, duplicate component ids).
//!
//! ## Guarantees
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - File I/O (that belongs to `loader`)

use std::collections::HashSet;

use super::RouterConfig;

/// Longest accepted interval or timeout: one year, in seconds.
pub const MAX_TIMING_SECS: f64 = 365.0 * 24.0 * 3600.0;

/// Errors arising from configuration parsing, validation, or I/O.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "components[1].priority").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: field.into(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Validate all semantic constraints on a [`RouterConfig`].
///
/// # Returns
///
/// - `Ok(())` if all constraints pass.
/// - `Err(Vec<ConfigError>)` with every violation found.
///
/// # Panics
///
/// This function never panics.
pub fn validate(config: &RouterConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Timing ───────────────────────────────────────────────────────
    if !config.health_check_interval_secs.is_finite() || config.health_check_interval_secs <= 0.0 {
        errors.push(invalid(
            "health_check_interval_secs",
            config.health_check_interval_secs,
            "must be a positive number of seconds",
        ));
    } else if config.health_check_interval_secs > MAX_TIMING_SECS {
        errors.push(invalid(
            "health_check_interval_secs",
            config.health_check_interval_secs,
            "must not exceed one year",
        ));
    }

    if !config.request_timeout_secs.is_finite() || config.request_timeout_secs <= 0.0 {
        errors.push(invalid(
            "request_timeout_secs",
            config.request_timeout_secs,
            "must be a positive number of seconds",
        ));
    } else if config.request_timeout_secs > MAX_TIMING_SECS {
        errors.push(invalid(
            "request_timeout_secs",
            config.request_timeout_secs,
            "must not exceed one year",
        ));
    }

    if config.probe_timeout_ms == 0 {
        errors.push(invalid("probe_timeout_ms", 0, "must be at least 1"));
    } else if config.probe_timeout_ms as f64 > MAX_TIMING_SECS * 1000.0 {
        errors.push(invalid(
            "probe_timeout_ms",
            config.probe_timeout_ms,
            "must not exceed one year",
        ));
    }

    // ── Health model ─────────────────────────────────────────────────
    if !config.health_max.is_finite() || config.health_max < 1.0 {
        errors.push(invalid(
            "health_max",
            config.health_max,
            "must be at least the 1.0 baseline",
        ));
    }

    if !config.healthy_min.is_finite()
        || config.healthy_min < 0.0
        || config.healthy_min > config.health_max
    {
        errors.push(invalid(
            "healthy_min",
            config.healthy_min,
            "must be between 0.0 and health_max",
        ));
    }

    if config.failure_limit == 0 {
        errors.push(invalid("failure_limit", 0, "must be at least 1"));
    }

    if !config.recovery_step.is_finite() || config.recovery_step < 0.0 {
        errors.push(invalid(
            "recovery_step",
            config.recovery_step,
            "must not be negative",
        ));
    }

    if !(config.penalty_factor > 0.0 && config.penalty_factor <= 1.0) {
        errors.push(invalid(
            "penalty_factor",
            config.penalty_factor,
            "must be in (0.0, 1.0]",
        ));
    }

    // ── Buffers ──────────────────────────────────────────────────────
    if config.repair_log_capacity == 0 {
        errors.push(invalid("repair_log_capacity", 0, "must be at least 1"));
    }

    if config.response_time_window == 0 {
        errors.push(invalid("response_time_window", 0, "must be at least 1"));
    }

    // ── Components ───────────────────────────────────────────────────
    let mut seen = HashSet::new();
    for (i, component) in config.components.iter().enumerate() {
        if component.id.trim().is_empty() {
            errors.push(invalid(
                format!("components[{i}].id"),
                "\"\"",
                "must not be empty",
            ));
        } else if !seen.insert(component.id.as_str()) {
            errors.push(invalid(
                format!("components[{i}].id"),
                &component.id,
                "duplicate component id",
            ));
        }
        if component.priority == 0 {
            errors.push(invalid(
                format!("components[{i}].priority"),
                0,
                "must be a positive integer",
            ));
        }
        if component.max_concurrent == 0 {
            errors.push(invalid(
                format!("components[{i}].max_concurrent"),
                0,
                "must be at least 1",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
