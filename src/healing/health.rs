//! Health & capacity model.
//!
//! Pure functions over registry state. Eligibility is always recomputed from
//! the current field values; nothing here caches a "healthy" flag.

use serde::{Deserialize, Serialize};

use super::component::Component;
use crate::config::RouterConfig;

/// Thresholds that govern eligibility and outcome accounting.
///
/// Extracted from [`RouterConfig`] once at construction so the hot path does
/// not carry the whole config around.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthPolicy {
    /// Minimum `health_score` for eligibility.
    pub healthy_min: f64,
    /// Failure count at which a component becomes ineligible.
    pub failure_limit: u32,
    /// Additive health gain per success.
    pub recovery_step: f64,
    /// Multiplicative health penalty per failure.
    pub penalty_factor: f64,
    /// Health ceiling.
    pub health_max: f64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::from(&RouterConfig::default())
    }
}

impl From<&RouterConfig> for HealthPolicy {
    fn from(config: &RouterConfig) -> Self {
        Self {
            healthy_min: config.healthy_min,
            failure_limit: config.failure_limit,
            recovery_step: config.recovery_step,
            penalty_factor: config.penalty_factor,
            health_max: config.health_max,
        }
    }
}

/// The eligibility gate: active, scored at or above `healthy_min`, and below
/// the failure limit.
///
/// # Panics
///
/// This function never panics.
pub fn is_healthy(component: &Component, policy: &HealthPolicy) -> bool {
    component.is_active
        && component.health_score >= policy.healthy_min
        && component.failure_count < policy.failure_limit
}

/// Selection score: `health * priority / (1 + in_flight)`.
///
/// # Panics
///
/// This function never panics.
pub fn route_score(component: &Component, in_flight: usize) -> f64 {
    component.health_score * f64::from(component.priority) / (1.0 + in_flight as f64)
}

/// Aggregate capacity: the sum of `max_concurrent` over active components.
///
/// # Panics
///
/// This function never panics.
pub fn total_capacity<'a, I>(components: I) -> usize
where
    I: IntoIterator<Item = &'a Component>,
{
    components
        .into_iter()
        .filter(|c| c.is_active)
        .map(|c| c.max_concurrent)
        .fold(0usize, usize::saturating_add)
}

/// Congestion holds when in-flight work strictly exceeds capacity.
pub fn is_congested(active_requests: usize, capacity: usize) -> bool {
    active_requests > capacity
}

/// Fraction of capacity in use; `0.0` for an idle router, may exceed `1.0`.
pub fn load_factor(active_requests: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        if active_requests == 0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        active_requests as f64 / capacity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(id: &str, priority: u32, cap: usize) -> Component {
        Component::new(id, "", priority, cap)
    }

    #[test]
    fn test_fresh_component_is_healthy() {
        assert!(is_healthy(&comp("a", 1, 1), &HealthPolicy::default()));
    }

    #[test]
    fn test_inactive_component_is_never_healthy() {
        let mut c = comp("a", 1, 1);
        c.is_active = false;
        c.health_score = 2.0;
        assert!(!is_healthy(&c, &HealthPolicy::default()));
    }

    #[test]
    fn test_health_boundary_is_inclusive() {
        let mut c = comp("a", 1, 1);
        c.health_score = 0.5;
        assert!(is_healthy(&c, &HealthPolicy::default()));
        c.health_score = 0.49;
        assert!(!is_healthy(&c, &HealthPolicy::default()));
    }

    #[test]
    fn test_failure_limit_is_exclusive() {
        let mut c = comp("a", 1, 1);
        c.failure_count = 4;
        assert!(is_healthy(&c, &HealthPolicy::default()));
        c.failure_count = 5;
        assert!(!is_healthy(&c, &HealthPolicy::default()));
    }

    #[test]
    fn test_route_score_penalises_in_flight() {
        let c = comp("a", 3, 10);
        assert!((route_score(&c, 0) - 3.0).abs() < 1e-9);
        assert!((route_score(&c, 2) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_capacity_counts_only_active() {
        let mut b = comp("b", 1, 5);
        b.is_active = false;
        let comps = [comp("a", 1, 10), b, comp("c", 1, 20)];
        assert_eq!(total_capacity(comps.iter()), 30);
    }

    #[test]
    fn test_congestion_is_strict() {
        assert!(!is_congested(35, 35));
        assert!(is_congested(36, 35));
    }

    #[test]
    fn test_load_factor_edge_cases() {
        assert!(load_factor(0, 0).abs() < f64::EPSILON);
        assert!(load_factor(1, 0).is_infinite());
        assert!((load_factor(5, 10) - 0.5).abs() < f64::EPSILON);
    }
}
