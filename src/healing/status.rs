//! Process-wide system status.

use serde::{Deserialize, Serialize};

/// Overall router condition, recomputed on every monitor tick.
///
/// Variants are declared in precedence order, so `Ord` reflects severity:
/// `Flowing < Degraded < Repairing < Congested < Emergency`.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemStatus {
    /// Every component is healthy and capacity is available.
    #[default]
    Flowing,
    /// Some components are unhealthy but healthy capacity remains.
    Degraded,
    /// A repair action fired since the previous tick.
    Repairing,
    /// In-flight work exceeds aggregate capacity.
    Congested,
    /// No component is healthy.
    Emergency,
}

/// Observations from one monitor tick that feed [`SystemStatus::derive`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSignals {
    /// At least one component passes the eligibility gate.
    pub any_healthy: bool,
    /// At least one registered component fails the eligibility gate.
    pub any_unhealthy: bool,
    /// The congestion check held this tick.
    pub congested: bool,
    /// At least one repair action was appended this tick.
    pub repairs_fired: bool,
}

impl SystemStatus {
    /// Apply the precedence rule
    /// `EMERGENCY > CONGESTED > REPAIRING > DEGRADED > FLOWING`.
    pub fn derive(signals: StatusSignals) -> Self {
        if !signals.any_healthy {
            Self::Emergency
        } else if signals.congested {
            Self::Congested
        } else if signals.repairs_fired {
            Self::Repairing
        } else if signals.any_unhealthy {
            Self::Degraded
        } else {
            Self::Flowing
        }
    }

    /// Upper-case name, e.g. `"CONGESTED"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flowing => "FLOWING",
            Self::Degraded => "DEGRADED",
            Self::Repairing => "REPAIRING",
            Self::Congested => "CONGESTED",
            Self::Emergency => "EMERGENCY",
        }
    }

    /// Operator-facing message with a distinct indicator per status.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Flowing => "🟢 FLOWING: all components healthy, traffic flowing normally",
            Self::Degraded => "🟡 DEGRADED: some components unhealthy, capacity remains",
            Self::Repairing => "🔧 REPAIRING: self-healing actions in progress",
            Self::Congested => "🟠 CONGESTED: in-flight work exceeds available capacity",
            Self::Emergency => "🔴 EMERGENCY: no healthy components available",
        }
    }

    /// Numeric severity for gauges (`0` = flowing .. `4` = emergency).
    pub fn severity(&self) -> i64 {
        *self as i64
    }
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
