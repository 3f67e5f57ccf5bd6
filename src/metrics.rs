//! Prometheus metrics for the router.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup. The helper functions
//! (`inc_route`, `inc_repair`, …) are no-ops if `init_metrics` was never
//! called, so routing is always safe to run and observability simply
//! degrades gracefully.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `router_routes_total` | Counter | `component`, `outcome` |
//! | `router_repairs_total` | Counter | `issue` |
//! | `router_request_duration_seconds` | Histogram | |
//! | `router_active_requests` | Gauge | |
//! | `router_system_status` | Gauge | |
//!
//! `router_system_status` carries [`SystemStatus::severity`](crate::healing::SystemStatus::severity):
//! 0 = FLOWING up to 4 = EMERGENCY.

use crate::RouterError;
use prometheus::{
    core::Collector, CounterVec, Encoder, Histogram, HistogramOpts, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All Prometheus metrics for the router, stored in a single [`OnceLock`].
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Routing decisions by chosen component and outcome (`selected`/`fallback`).
    pub routes_total: CounterVec,
    /// Repair actions by issue type.
    pub repairs_total: CounterVec,
    /// Reported request durations.
    pub request_duration: Histogram,
    /// Requests currently tracked as in flight.
    pub active_requests: IntGauge,
    /// Severity of the last computed system status.
    pub system_status: IntGauge,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn init_err(e: prometheus::Error) -> RouterError {
    RouterError::Other(format!("metrics init failed: {e}"))
}

fn register<C: Collector + Clone + 'static>(registry: &Registry, c: C) -> Result<C, RouterError> {
    registry
        .register(Box::new(c.clone()))
        .map_err(|e| RouterError::Other(format!("metrics registration failed: {e}")))?;
    Ok(c)
}

impl Metrics {
    fn build(prefix: &str) -> Result<Self, RouterError> {
        let registry = Registry::new();

        let routes_total = CounterVec::new(
            Opts::new(format!("{prefix}_routes_total"), "Routing decisions"),
            &["component", "outcome"],
        )
        .map_err(init_err)?;
        let repairs_total = CounterVec::new(
            Opts::new(format!("{prefix}_repairs_total"), "Repair actions by issue"),
            &["issue"],
        )
        .map_err(init_err)?;
        let request_duration = Histogram::with_opts(HistogramOpts::new(
            format!("{prefix}_request_duration_seconds"),
            "Reported request duration",
        ))
        .map_err(init_err)?;
        let active_requests = IntGauge::new(
            format!("{prefix}_active_requests"),
            "Requests currently in flight",
        )
        .map_err(init_err)?;
        let system_status = IntGauge::new(
            format!("{prefix}_system_status"),
            "System status severity (0=FLOWING .. 4=EMERGENCY)",
        )
        .map_err(init_err)?;

        Ok(Self {
            routes_total: register(&registry, routes_total)?,
            repairs_total: register(&registry, repairs_total)?,
            request_duration: register(&registry, request_duration)?,
            active_requests: register(&registry, active_requests)?,
            system_status: register(&registry, system_status)?,
            registry,
        })
    }
}

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all Prometheus metrics and register them with a private registry.
///
/// Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`RouterError::Other`] if metric construction or registration fails.
///
/// # Panics
///
/// This function never panics.
pub fn init_metrics() -> Result<(), RouterError> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    let built = Metrics::build("router")?;
    // A racing initialiser produces identical descriptors; first one wins.
    let _ = METRICS.set(built);
    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Count one routing decision. `outcome` is `"selected"` or `"fallback"`.
///
/// No-op if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn inc_route(component: &str, outcome: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m
            .routes_total
            .get_metric_with_label_values(&[component, outcome])
        {
            c.inc();
        }
    }
}

/// Count one repair action for `issue` (e.g. `"TIMEOUT"`).
///
/// # Panics
///
/// This function never panics.
pub fn inc_repair(issue: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.repairs_total.get_metric_with_label_values(&[issue]) {
            c.inc();
        }
    }
}

/// Observe a reported request duration.
pub fn observe_request_duration(d: Duration) {
    if let Some(m) = metrics() {
        m.request_duration.observe(d.as_secs_f64());
    }
}

/// Set the in-flight request gauge.
pub fn set_active_requests(n: usize) {
    if let Some(m) = metrics() {
        m.active_requests.set(i64::try_from(n).unwrap_or(i64::MAX));
    }
}

/// Set the system status gauge to a severity value.
pub fn set_system_status(severity: i64) {
    if let Some(m) = metrics() {
        m.system_status.set(severity);
    }
}

/// Gather all registered metrics as a raw list of metric families.
///
/// Returns an empty `Vec` if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    metrics().map_or_else(Vec::new, |m| m.registry.gather())
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails.
///
/// # Panics
///
/// This function never panics.
pub fn gather_metrics() -> String {
    let families = gather();
    if families.is_empty() {
        return String::new();
    }
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// A structured snapshot of the counters.
#[derive(Debug, Default)]
pub struct MetricsSummary {
    /// Routing decisions keyed by `"component:outcome"`.
    pub routes_total: HashMap<String, u64>,
    /// Repair actions keyed by issue type.
    pub repairs_total: HashMap<String, u64>,
}

fn label<'a>(metric: &'a prometheus::proto::Metric, name: &str) -> &'a str {
    metric
        .get_label()
        .iter()
        .find(|l| l.get_name() == name)
        .map_or("unknown", |l| l.get_value())
}

/// Return a structured summary of current counter values.
///
/// Returns a zeroed [`MetricsSummary`] if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn get_metrics_summary() -> MetricsSummary {
    metrics().map_or_else(MetricsSummary::default, summarize)
}

fn summarize(m: &Metrics) -> MetricsSummary {
    let mut summary = MetricsSummary::default();

    for family in m.routes_total.collect() {
        for metric in family.get_metric() {
            let key = format!(
                "{}:{}",
                label(metric, "component"),
                label(metric, "outcome")
            );
            let value = metric.get_counter().get_value() as u64;
            summary.routes_total.insert(key, value);
        }
    }

    for family in m.repairs_total.collect() {
        for metric in family.get_metric() {
            let value = metric.get_counter().get_value() as u64;
            summary
                .repairs_total
                .insert(label(metric, "issue").to_string(), value);
        }
    }

    summary
}
