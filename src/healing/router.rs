//! # SelfHealingRouter
//!
//! ## Responsibility
//! Own the component registry, the active-request map, the repair log and the
//! response-time window behind a single lock, and expose the caller-facing
//! surface: registration, routing, lifecycle hooks and read-only snapshots.
//!
//! ## Guarantees
//! - Consistent: every mutation happens under one `parking_lot::Mutex`, so a
//!   reader never observes a half-applied outcome
//! - Non-blocking: no method here awaits; the lock is never held across I/O
//! - Infallible: routing and lifecycle hooks never return errors; misuse is
//!   logged and ignored
//!
//! ## NOT Responsible For
//! - Periodic reaping, congestion checks and status recompute (see `monitor`)
//! - Performing the routed work (the caller does that)

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::component::Component;
use super::health::{self, HealthPolicy};
use super::latency::{ResponseTimeStats, ResponseTimes};
use super::monitor::MonitorHandle;
use super::probe::LivenessProbe;
use super::recovery;
use super::repair::{RepairAction, RepairActionView, RepairLog};
use super::status::SystemStatus;
use crate::config::RouterConfig;
use crate::metrics;

/// Confidence reported when the preferred component is honoured.
pub const PREFERRED_CONFIDENCE: f64 = 0.9;

/// Upper bound on confidence for a scored selection.
pub const MAX_SCORED_CONFIDENCE: f64 = 0.95;

/// Confidence reported for a least-degraded fallback target.
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

// ── Shared state ─────────────────────────────────────────────────────────

/// Registry entry: the public record plus router-private bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct ComponentEntry {
    pub(crate) component: Component,
    /// Requests bound to this component between start and end.
    pub(crate) in_flight: usize,
    /// Set when the liveness probe (not an operator) deactivated it.
    pub(crate) suspended_by_probe: bool,
}

/// One in-flight request.
#[derive(Debug, Clone)]
pub(crate) struct ActiveRequest {
    pub(crate) started: Instant,
    pub(crate) component: Option<String>,
}

/// Everything guarded by the router's single lock.
#[derive(Debug)]
pub(crate) struct RouterState {
    /// Ordered by id so ties break towards the smallest id.
    pub(crate) components: BTreeMap<String, ComponentEntry>,
    pub(crate) active: HashMap<String, ActiveRequest>,
    pub(crate) repairs: RepairLog,
    pub(crate) latencies: ResponseTimes,
    pub(crate) status: SystemStatus,
    /// Repair actions appended since the last status recompute.
    pub(crate) repairs_since_tick: usize,
}

impl RouterState {
    fn new(config: &RouterConfig) -> Self {
        Self {
            components: BTreeMap::new(),
            active: HashMap::new(),
            repairs: RepairLog::new(config.repair_log_capacity),
            latencies: ResponseTimes::new(config.response_time_window),
            status: SystemStatus::default(),
            repairs_since_tick: 0,
        }
    }

    pub(crate) fn record_repair(&mut self, action: RepairAction) {
        info!(
            component_id = %action.component_id,
            issue = %action.issue_type,
            action = %action.action,
            success = action.success,
            message = %action.message,
            "repair action recorded"
        );
        metrics::inc_repair(action.issue_type.as_str());
        self.repairs.push(action);
        self.repairs_since_tick += 1;
    }

    /// Drop the per-component in-flight slot held by `request`, if any.
    pub(crate) fn release(&mut self, request: &ActiveRequest) {
        if let Some(id) = &request.component {
            if let Some(entry) = self.components.get_mut(id) {
                entry.in_flight = entry.in_flight.saturating_sub(1);
            }
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        health::total_capacity(self.components.values().map(|e| &e.component))
    }

    pub(crate) fn healthy_count(&self, policy: &HealthPolicy) -> usize {
        self.components
            .values()
            .filter(|e| e.component.is_healthy(policy))
            .count()
    }

    /// Highest-scoring entry, ties to the smallest id. With `healthy_only`
    /// false every registered component competes.
    fn best_candidate(
        &self,
        policy: &HealthPolicy,
        healthy_only: bool,
    ) -> Option<(&ComponentEntry, f64)> {
        let mut best: Option<(&ComponentEntry, f64)> = None;
        for entry in self.components.values() {
            if healthy_only && !entry.component.is_healthy(policy) {
                continue;
            }
            let score = health::route_score(&entry.component, entry.in_flight);
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((entry, score)),
            }
        }
        best
    }
}

/// Apply the registration-time constraints `validate()` enforces for
/// configured components.
fn sanitize(mut component: Component) -> Component {
    if component.id.trim().is_empty() {
        warn!("registering component with an empty id");
    }
    if component.priority == 0 {
        warn!(component_id = %component.id, "priority 0 raised to 1");
        component.priority = 1;
    }
    if component.max_concurrent == 0 {
        warn!(component_id = %component.id, "component adds no capacity (max_concurrent = 0)");
    }
    component
}

/// State shared between the router handle and the monitor task.
pub(crate) struct Shared {
    pub(crate) config: RouterConfig,
    pub(crate) policy: HealthPolicy,
    pub(crate) state: Mutex<RouterState>,
    pub(crate) probe: Option<Arc<dyn LivenessProbe>>,
    /// Serialises ticks between the background task and manual calls.
    pub(crate) tick_lock: tokio::sync::Mutex<()>,
}

// ── Public result types ──────────────────────────────────────────────────

/// Outcome of a single [`SelfHealingRouter::route_request`] call.
///
/// Transient: returned synchronously, never stored by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    /// Selected component, empty when nothing could be selected.
    pub component_id: String,
    /// Selection confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Human-readable justification.
    pub reason: String,
    /// `true` when no real selection could be made.
    pub fallback_used: bool,
}

impl RouteResult {
    fn selected(component_id: &str, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            component_id: component_id.to_string(),
            confidence,
            reason: reason.into(),
            fallback_used: false,
        }
    }

    fn fallback(component_id: &str, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            component_id: component_id.to_string(),
            confidence,
            reason: reason.into(),
            fallback_used: true,
        }
    }
}

/// Per-component row of a [`RouterMetrics`] snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetrics {
    /// Component id.
    pub id: String,
    /// Operator / automatic toggle.
    pub is_active: bool,
    /// Eligibility gate result at snapshot time.
    pub is_healthy: bool,
    /// Current health score.
    pub health_score: f64,
    /// Failures reported.
    pub failure_count: u32,
    /// Successes reported.
    pub success_count: u64,
    /// Requests currently bound to this component.
    pub in_flight: usize,
}

/// Read-only snapshot returned by [`SelfHealingRouter::get_metrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterMetrics {
    /// Status as of the most recent tick.
    pub system_status: SystemStatus,
    /// Operator-facing status line.
    pub status_message: String,
    /// Registered components.
    pub total_components: usize,
    /// Components passing the eligibility gate.
    pub healthy_components: usize,
    /// Components with `is_active == true`.
    pub active_components: usize,
    /// Entries in the active-request map.
    pub active_requests: usize,
    /// Sum of `max_concurrent` over active components.
    pub total_capacity: usize,
    /// `active_requests / total_capacity`.
    pub load_factor: f64,
    /// Response-time statistics over the ring buffer.
    pub response_times: ResponseTimeStats,
    /// Repair actions ever recorded.
    pub total_repairs: u64,
    /// Per-component breakdown, ordered by id.
    pub components: Vec<ComponentMetrics>,
}

impl RouterMetrics {
    /// Render the snapshot as JSON for dashboards and log shippers.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// ── Router ───────────────────────────────────────────────────────────────

/// Health-aware router over a registry of interchangeable components.
///
/// Construct one per process and share it by `Arc` or reference. Call
/// [`start`](Self::start) to launch the background monitor.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tokio_healing_router::{Component, RouterConfig, SelfHealingRouter};
///
/// let router = SelfHealingRouter::new(RouterConfig::default());
/// router.register_component(Component::new("primary", "http://10.0.0.1", 3, 10));
/// router.register_component(Component::new("backup", "http://10.0.0.2", 1, 20));
///
/// let route = router.route_request("summarise report", None);
/// assert_eq!(route.component_id, "primary");
///
/// router.record_request_start_on("req-1", &route.component_id);
/// router.record_request_end("req-1", &route.component_id, true, Duration::from_millis(40));
/// ```
pub struct SelfHealingRouter {
    pub(crate) shared: Arc<Shared>,
    pub(crate) monitor: Mutex<Option<MonitorHandle>>,
}

impl std::fmt::Debug for SelfHealingRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfHealingRouter")
            .field("config", &self.shared.config)
            .field("has_probe", &self.shared.probe.is_some())
            .field("running", &self.is_running())
            .finish()
    }
}

impl SelfHealingRouter {
    /// Create a router without a liveness probe.
    ///
    /// Components listed in `config.components` are registered immediately.
    /// The configuration is validated by [`start`](Self::start), not here.
    pub fn new(config: RouterConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a router whose monitor probes every component each tick.
    pub fn with_probe(config: RouterConfig, probe: Arc<dyn LivenessProbe>) -> Self {
        Self::build(config, Some(probe))
    }

    fn build(config: RouterConfig, probe: Option<Arc<dyn LivenessProbe>>) -> Self {
        let policy = HealthPolicy::from(&config);
        let mut state = RouterState::new(&config);
        for cfg in &config.components {
            let component = sanitize(Component::from(cfg));
            state.components.insert(
                component.id.clone(),
                ComponentEntry {
                    component,
                    in_flight: 0,
                    suspended_by_probe: false,
                },
            );
        }
        Self {
            shared: Arc::new(Shared {
                config,
                policy,
                state: Mutex::new(state),
                probe,
                tick_lock: tokio::sync::Mutex::new(()),
            }),
            monitor: Mutex::new(None),
        }
    }

    /// The configuration this router was built with.
    pub fn config(&self) -> &RouterConfig {
        &self.shared.config
    }

    /// The eligibility and accounting thresholds in effect.
    pub fn policy(&self) -> &HealthPolicy {
        &self.shared.policy
    }

    // ── Registry ─────────────────────────────────────────────────────────

    /// Insert or overwrite a component by id.
    ///
    /// Overwriting keeps the in-flight count of requests already bound to
    /// that id.
    /// A zero priority is raised to 1 so the component can still score;
    /// empty ids and zero capacity are accepted with a warning.
    pub fn register_component(&self, component: Component) {
        let component = sanitize(component);
        let mut state = self.shared.state.lock();
        let id = component.id.clone();
        let in_flight = state.components.get(&id).map_or(0, |e| e.in_flight);
        let replaced = state
            .components
            .insert(
                id.clone(),
                ComponentEntry {
                    component,
                    in_flight,
                    suspended_by_probe: false,
                },
            )
            .is_some();
        info!(component_id = %id, replaced, "component registered");
    }

    /// Operator toggle: make a component eligible again.
    ///
    /// Returns `false` for an unknown id.
    pub fn activate_component(&self, component_id: &str) -> bool {
        self.set_active(component_id, true)
    }

    /// Operator toggle: withdraw a component from routing and capacity.
    ///
    /// Returns `false` for an unknown id.
    pub fn deactivate_component(&self, component_id: &str) -> bool {
        self.set_active(component_id, false)
    }

    fn set_active(&self, component_id: &str, active: bool) -> bool {
        let mut state = self.shared.state.lock();
        match state.components.get_mut(component_id) {
            Some(entry) => {
                entry.component.is_active = active;
                entry.suspended_by_probe = false;
                info!(component_id, active, "component toggled by operator");
                true
            }
            None => {
                warn!(component_id, active, "toggle ignored: unknown component");
                false
            }
        }
    }

    /// Snapshot of one component.
    pub fn component(&self, component_id: &str) -> Option<Component> {
        self.shared
            .state
            .lock()
            .components
            .get(component_id)
            .map(|e| e.component.clone())
    }

    /// Snapshot of all components, ordered by id.
    pub fn components(&self) -> Vec<Component> {
        self.shared
            .state
            .lock()
            .components
            .values()
            .map(|e| e.component.clone())
            .collect()
    }

    /// Requests currently bound to `component_id`.
    pub fn in_flight(&self, component_id: &str) -> Option<usize> {
        self.shared
            .state
            .lock()
            .components
            .get(component_id)
            .map(|e| e.in_flight)
    }

    // ── Routing ──────────────────────────────────────────────────────────

    /// Select a target for one unit of work.
    ///
    /// `work` is used only for log correlation. A healthy
    /// `preferred_component` is honoured outright; otherwise healthy
    /// components compete on `health * priority / (1 + in_flight)`. When no
    /// component is eligible, emergency recovery runs first.
    ///
    /// This never touches the active-request map or in-flight counters;
    /// callers report progress through the lifecycle hooks.
    pub fn route_request(&self, work: &str, preferred_component: Option<&str>) -> RouteResult {
        let result = {
            let mut state = self.shared.state.lock();
            self.select(&mut state, preferred_component)
        };

        debug!(
            work,
            component_id = %result.component_id,
            confidence = result.confidence,
            fallback_used = result.fallback_used,
            reason = %result.reason,
            "request routed"
        );
        metrics::inc_route(
            &result.component_id,
            if result.fallback_used { "fallback" } else { "selected" },
        );
        result
    }

    fn select(&self, state: &mut RouterState, preferred: Option<&str>) -> RouteResult {
        let policy = &self.shared.policy;

        if state.components.is_empty() {
            return RouteResult::fallback("", 0.0, "no components registered");
        }

        if let Some(pref) = preferred {
            match state.components.get(pref) {
                Some(entry) if entry.component.is_healthy(policy) => {
                    return RouteResult::selected(pref, PREFERRED_CONFIDENCE, "preferred");
                }
                Some(_) => debug!(component_id = pref, "preferred component unhealthy"),
                None => debug!(component_id = pref, "preferred component not registered"),
            }
        }

        let mut recovered = false;
        if state.healthy_count(policy) == 0 {
            recovery::emergency_recovery(state, &self.shared.config, policy);
            recovered = true;
        }

        let candidates = state.healthy_count(policy);
        let max_priority = state
            .components
            .values()
            .filter(|e| e.component.is_healthy(policy))
            .map(|e| e.component.priority)
            .max()
            .unwrap_or(0);

        if let Some((entry, score)) = state.best_candidate(policy, true) {
            let ceiling = policy.health_max * f64::from(max_priority);
            let normalized = if ceiling > 0.0 { score / ceiling } else { 0.0 };
            let confidence = normalized.clamp(0.0, MAX_SCORED_CONFIDENCE);
            let mut reason = format!(
                "highest score {score:.3} among {candidates} healthy candidate(s) \
                 (health {:.2}, priority {}, in-flight {})",
                entry.component.health_score, entry.component.priority, entry.in_flight
            );
            if recovered {
                reason.insert_str(0, "after emergency recovery: ");
            }
            return RouteResult::selected(&entry.component.id, confidence, reason);
        }

        // Reactivation alone could not restore eligibility: hand back the
        // least-degraded component and let the caller decide.
        match state.best_candidate(policy, false) {
            Some((entry, _)) => RouteResult::fallback(
                &entry.component.id,
                FALLBACK_CONFIDENCE,
                "no healthy components after emergency recovery; least-degraded fallback",
            ),
            None => RouteResult::fallback("", 0.0, "no components registered"),
        }
    }

    // ── Lifecycle hooks ──────────────────────────────────────────────────

    /// Mark `request_id` as in flight without binding it to a component.
    pub fn record_request_start(&self, request_id: impl Into<String>) {
        self.start_request(request_id.into(), None, Instant::now());
    }

    /// Mark `request_id` as in flight on `component_id`, counting it toward
    /// that component's in-flight load.
    pub fn record_request_start_on(&self, request_id: impl Into<String>, component_id: &str) {
        self.start_request(request_id.into(), Some(component_id), Instant::now());
    }

    /// Mark `request_id` as in flight since `started`.
    pub fn record_request_start_at(
        &self,
        request_id: impl Into<String>,
        component_id: Option<&str>,
        started: Instant,
    ) {
        self.start_request(request_id.into(), component_id, started);
    }

    fn start_request(&self, request_id: String, component_id: Option<&str>, started: Instant) {
        let mut state = self.shared.state.lock();

        let bound = match component_id {
            Some(id) => match state.components.get_mut(id) {
                Some(entry) => {
                    entry.in_flight += 1;
                    Some(id.to_string())
                }
                None => {
                    warn!(%request_id, component_id = id, "request started on unknown component");
                    None
                }
            },
            None => None,
        };

        let request = ActiveRequest {
            started,
            component: bound,
        };
        if let Some(previous) = state.active.insert(request_id.clone(), request) {
            debug!(%request_id, "request id restarted; previous entry replaced");
            state.release(&previous);
        }
        let active = state.active.len();
        drop(state);

        metrics::set_active_requests(active);
    }

    /// Report completion of `request_id` on `component_id`.
    ///
    /// Updates the component's counters and health atomically and records
    /// the duration. An unknown `component_id` is logged and ignored.
    pub fn record_request_end(
        &self,
        request_id: &str,
        component_id: &str,
        success: bool,
        duration: Duration,
    ) {
        let policy = self.shared.policy;
        let mut state = self.shared.state.lock();

        match state.active.remove(request_id) {
            Some(request) => state.release(&request),
            None => debug!(request_id, "request end without active entry"),
        }
        let active = state.active.len();

        let entry = match state.components.get_mut(component_id) {
            Some(entry) => entry,
            None => {
                drop(state);
                warn!(request_id, component_id, "outcome ignored: unknown component");
                metrics::set_active_requests(active);
                return;
            }
        };

        let was_healthy = entry.component.is_healthy(&policy);
        if success {
            entry.component.record_success(&policy);
        } else {
            entry.component.record_failure(&policy);
        }
        let is_healthy = entry.component.is_healthy(&policy);
        let health_score = entry.component.health_score;
        let failure_count = entry.component.failure_count;
        state.latencies.record(duration);
        drop(state);

        if was_healthy && !is_healthy {
            warn!(
                component_id,
                health_score, failure_count, "component dropped below eligibility gate"
            );
        } else if !was_healthy && is_healthy {
            info!(component_id, health_score, "component regained eligibility");
        }

        metrics::observe_request_duration(duration);
        metrics::set_active_requests(active);
    }

    /// Entries in the active-request map.
    pub fn active_request_count(&self) -> usize {
        self.shared.state.lock().active.len()
    }

    // ── Observability ────────────────────────────────────────────────────

    /// Status as of the most recent monitor tick.
    pub fn system_status(&self) -> SystemStatus {
        self.shared.state.lock().status
    }

    /// Operator-facing line for the current status.
    pub fn get_status_message(&self) -> String {
        self.system_status().message().to_string()
    }

    /// Consistent snapshot of status, counts and response-time statistics.
    pub fn get_metrics(&self) -> RouterMetrics {
        let policy = &self.shared.policy;
        let state = self.shared.state.lock();

        let components: Vec<ComponentMetrics> = state
            .components
            .values()
            .map(|e| ComponentMetrics {
                id: e.component.id.clone(),
                is_active: e.component.is_active,
                is_healthy: e.component.is_healthy(policy),
                health_score: e.component.health_score,
                failure_count: e.component.failure_count,
                success_count: e.component.success_count,
                in_flight: e.in_flight,
            })
            .collect();
        let total_capacity = state.capacity();
        let active_requests = state.active.len();

        RouterMetrics {
            system_status: state.status,
            status_message: state.status.message().to_string(),
            total_components: components.len(),
            healthy_components: components.iter().filter(|c| c.is_healthy).count(),
            active_components: components.iter().filter(|c| c.is_active).count(),
            active_requests,
            total_capacity,
            load_factor: health::load_factor(active_requests, total_capacity),
            response_times: state.latencies.stats(),
            total_repairs: state.repairs.total_appended(),
            components,
        }
    }

    /// The `n` most recent repair actions, newest first.
    pub fn get_repair_history(&self, n: usize) -> Vec<RepairActionView> {
        self.shared
            .state
            .lock()
            .repairs
            .recent(n)
            .map(RepairActionView::from)
            .collect()
    }

    /// Number of repair actions currently retained.
    pub fn repair_history_len(&self) -> usize {
        self.shared.state.lock().repairs.len()
    }
}
