//! Routable component record and outcome accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::health::{self, HealthPolicy};
use crate::config::ComponentConfig;

/// Baseline health score of a freshly registered component.
pub const NOMINAL_HEALTH: f64 = 1.0;

/// A registered, routable backend target.
///
/// Components are never removed from the registry; they are deactivated and
/// reactivated so their counters survive outages.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Unique key.
    pub id: String,
    /// Opaque endpoint descriptor. Never parsed by the router.
    pub endpoint: String,
    /// Higher is preferred when otherwise equal.
    pub priority: u32,
    /// Capacity contribution while active.
    pub max_concurrent: usize,
    /// Operator / automatic toggle.
    pub is_active: bool,
    /// Bounded in `[0.0, health_max]`, nominal `1.0`.
    pub health_score: f64,
    /// Failed requests reported through the lifecycle-end hook.
    pub failure_count: u32,
    /// Successful requests reported through the lifecycle-end hook.
    pub success_count: u64,
    /// Most recent monitor probe, if any.
    pub last_check: Option<DateTime<Utc>>,
}

impl Component {
    /// Create an active component at nominal health with zeroed counters.
    pub fn new(
        id: impl Into<String>,
        endpoint: impl Into<String>,
        priority: u32,
        max_concurrent: usize,
    ) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            priority,
            max_concurrent,
            is_active: true,
            health_score: NOMINAL_HEALTH,
            failure_count: 0,
            success_count: 0,
            last_check: None,
        }
    }

    /// Evaluate the eligibility gate against `policy`.
    pub fn is_healthy(&self, policy: &HealthPolicy) -> bool {
        health::is_healthy(self, policy)
    }

    /// Apply a successful outcome: bump the counter and recover health up to
    /// the ceiling.
    pub fn record_success(&mut self, policy: &HealthPolicy) {
        self.success_count = self.success_count.saturating_add(1);
        self.health_score = (self.health_score + policy.recovery_step).min(policy.health_max);
    }

    /// Apply a failed outcome: bump the counter and decay health
    /// multiplicatively, floored at zero.
    pub fn record_failure(&mut self, policy: &HealthPolicy) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.health_score = (self.health_score * policy.penalty_factor).max(0.0);
    }

    /// Restore nominal health and clear the failure counter.
    pub(crate) fn reset_health(&mut self) {
        self.failure_count = 0;
        self.health_score = NOMINAL_HEALTH;
    }
}

impl From<&ComponentConfig> for Component {
    fn from(cfg: &ComponentConfig) -> Self {
        Self::new(
            cfg.id.clone(),
            cfg.endpoint.clone(),
            cfg.priority,
            cfg.max_concurrent,
        )
    }
}
