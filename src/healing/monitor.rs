//! # Health monitor: background self-healing loop
//!
//! ## Responsibility
//! Tick on a fixed interval and, in order: probe components, reap stalled
//! requests, flag capacity overruns, and recompute the system status.
//!
//! ## Guarantees
//! - Serialised: at most one tick runs at a time, whether driven by the
//!   background task or by [`SelfHealingRouter::run_health_check`]
//! - Lock discipline: probes run outside the router lock; every mutation
//!   happens inside it
//! - Prompt shutdown: `stop()` returns after at most one in-flight tick;
//!   dropping the router also ends the task
//!
//! ## NOT Responsible For
//! - Routing decisions (see `router`)
//! - Emergency recovery (triggered from routing, see `recovery`)

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::component::Component;
use super::probe::LivenessProbe;
use super::repair::{IssueType, RepairAction};
use super::router::{SelfHealingRouter, Shared};
use super::status::{StatusSignals, SystemStatus};
use crate::{metrics, RouterError};

/// Action text for a reaped request.
pub const TIMEOUT_ACTION: &str = "abandoned stalled request";

/// Action text for a capacity overrun.
pub const CONGESTION_ACTION: &str = "flagged capacity overrun";

/// Action text when a failing probe withdraws a component.
pub const PROBE_DEACTIVATE_ACTION: &str = "deactivated unresponsive component";

/// Action text when a passing probe restores a component it withdrew.
pub const PROBE_REACTIVATE_ACTION: &str = "reactivated component after successful probe";

/// Floor for the tick period; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Ceiling for the tick period, matching the config validation limit.
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 3600);

/// Handle to the running monitor task.
#[derive(Debug)]
pub(crate) struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// What a single monitor tick observed and did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Components handed to the liveness probe (zero without a probe).
    pub probed: usize,
    /// Components withdrawn by a failing probe.
    pub deactivated: usize,
    /// Components restored by a passing probe.
    pub reactivated: usize,
    /// Stalled requests reaped.
    pub timed_out: usize,
    /// Whether the congestion check held.
    pub congested: bool,
    /// Repair actions counted toward this tick's status, including any
    /// emergency recoveries since the previous tick.
    pub repairs: usize,
    /// Status after recompute.
    pub status: SystemStatus,
}

impl SelfHealingRouter {
    /// Validate the configuration and launch the background monitor.
    ///
    /// Idempotent: calling it while the monitor runs is a no-op.
    ///
    /// # Errors
    ///
    /// - [`RouterError::InvalidConfig`] if any threshold is out of range
    /// - [`RouterError::NoRuntime`] if called outside a Tokio runtime
    pub fn start(&self) -> Result<(), RouterError> {
        self.shared.config.validate()?;

        let mut slot = self.monitor.lock();
        if slot.as_ref().is_some_and(|h| !h.task.is_finished()) {
            debug!("health monitor already running");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RouterError::NoRuntime)?;
        let (shutdown, rx) = watch::channel(false);
        let task = runtime.spawn(monitor_loop(Arc::clone(&self.shared), rx));
        *slot = Some(MonitorHandle { shutdown, task });

        info!(
            interval_secs = self.shared.config.health_check_interval_secs,
            request_timeout_secs = self.shared.config.request_timeout_secs,
            probe = self.shared.probe.is_some(),
            "health monitor started"
        );
        Ok(())
    }

    /// Signal the monitor to exit and wait for it. A second call is a no-op.
    pub async fn stop(&self) {
        let handle = self.monitor.lock().take();
        let Some(handle) = handle else {
            return;
        };
        let _ = handle.shutdown.send(true);
        if let Err(e) = handle.task.await {
            warn!(error = %e, "health monitor task ended abnormally");
        }
        info!("health monitor stopped");
    }

    /// `true` while the background monitor task is alive.
    pub fn is_running(&self) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    /// Run exactly one monitor tick now and report what it did.
    ///
    /// Waits for any tick already in progress.
    pub async fn run_health_check(&self) -> TickReport {
        run_tick(&self.shared).await
    }
}

async fn monitor_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let period = shared
        .config
        .health_check_interval()
        .clamp(MIN_PERIOD, MAX_PERIOD);
    let Some(first_tick) = Instant::now().checked_add(period) else {
        warn!(?period, "monitor interval overflows the clock; monitor not running");
        return;
    };
    let mut ticker = tokio::time::interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = run_tick(&shared).await;
                debug!(
                    status = %report.status,
                    timed_out = report.timed_out,
                    congested = report.congested,
                    repairs = report.repairs,
                    "health check tick"
                );
            }
            // Fires on an explicit stop and when the router is dropped.
            _ = shutdown.changed() => {
                debug!("monitor shutdown signal received");
                break;
            }
        }
    }
}

/// One full tick: probe, reap, congestion, status.
pub(crate) async fn run_tick(shared: &Shared) -> TickReport {
    let _tick = shared.tick_lock.lock().await;
    let policy = &shared.policy;

    // ── 1. Probe pass ────────────────────────────────────────────────
    let targets: Vec<Component> = {
        let mut state = shared.state.lock();
        let now = Utc::now();
        for entry in state.components.values_mut() {
            entry.component.last_check = Some(now);
        }
        if shared.probe.is_some() {
            state
                .components
                .values()
                .map(|e| e.component.clone())
                .collect()
        } else {
            Vec::new()
        }
    };
    let probed = targets.len();
    let outcomes = match &shared.probe {
        Some(probe) if !targets.is_empty() => {
            probe_all(probe, targets, shared.config.probe_timeout()).await
        }
        _ => Vec::new(),
    };

    let mut state = shared.state.lock();
    let mut deactivated = 0;
    let mut reactivated = 0;
    for (id, outcome) in outcomes {
        let Some(entry) = state.components.get_mut(&id) else {
            continue;
        };
        let repair = match outcome {
            Err(reason) if entry.component.is_active => {
                entry.component.is_active = false;
                entry.suspended_by_probe = true;
                deactivated += 1;
                Some(RepairAction::new(
                    id,
                    IssueType::Failure,
                    PROBE_DEACTIVATE_ACTION,
                    format!("liveness probe failed: {reason}"),
                ))
            }
            Ok(()) if !entry.component.is_active && entry.suspended_by_probe => {
                entry.component.is_active = true;
                entry.suspended_by_probe = false;
                reactivated += 1;
                Some(RepairAction::new(
                    id,
                    IssueType::Failure,
                    PROBE_REACTIVATE_ACTION,
                    "liveness probe passed",
                ))
            }
            _ => None,
        };
        if let Some(action) = repair {
            state.record_repair(action);
        }
    }

    // ── 2. Stale-request reaping ─────────────────────────────────────
    let timeout = shared.config.request_timeout();
    let now = Instant::now();
    let mut stale: Vec<(String, Instant)> = state
        .active
        .iter()
        .filter(|(_, r)| now.saturating_duration_since(r.started) > timeout)
        .map(|(id, r)| (id.clone(), r.started))
        .collect();
    stale.sort_by_key(|(_, started)| *started);

    let timed_out = stale.len();
    for (request_id, started) in stale {
        let Some(request) = state.active.remove(&request_id) else {
            continue;
        };
        state.release(&request);
        let age = now.saturating_duration_since(started).as_secs_f64();
        state.record_repair(RepairAction::new(
            request.component.unwrap_or_default(),
            IssueType::Timeout,
            TIMEOUT_ACTION,
            format!(
                "request {request_id} in flight for {age:.1}s, exceeding the {:.1}s timeout",
                timeout.as_secs_f64()
            ),
        ));
    }

    // ── 3. Congestion check ──────────────────────────────────────────
    let capacity = state.capacity();
    let active = state.active.len();
    let congested = super::health::is_congested(active, capacity);
    if congested {
        state.record_repair(RepairAction::new(
            "",
            IssueType::Congestion,
            CONGESTION_ACTION,
            format!("{active} active requests exceed total capacity {capacity}"),
        ));
    }

    // ── 4. Status recompute ──────────────────────────────────────────
    let healthy = state.healthy_count(policy);
    let repairs = std::mem::take(&mut state.repairs_since_tick);
    let status = SystemStatus::derive(StatusSignals {
        any_healthy: healthy > 0,
        any_unhealthy: healthy < state.components.len(),
        congested,
        repairs_fired: repairs > 0,
    });
    let previous = std::mem::replace(&mut state.status, status);
    drop(state);

    if status != previous {
        if status > previous {
            warn!(from = %previous, to = %status, "system status escalated");
        } else {
            info!(from = %previous, to = %status, "system status improved");
        }
    }
    metrics::set_system_status(status.severity());
    metrics::set_active_requests(active);

    TickReport {
        probed,
        deactivated,
        reactivated,
        timed_out,
        congested,
        repairs,
        status,
    }
}

/// Probe every target concurrently, each bounded by `limit`.
async fn probe_all(
    probe: &Arc<dyn LivenessProbe>,
    targets: Vec<Component>,
    limit: Duration,
) -> Vec<(String, Result<(), String>)> {
    let mut set = JoinSet::new();
    for component in targets {
        let probe = Arc::clone(probe);
        set.spawn(async move {
            let outcome = match tokio::time::timeout(limit, probe.check(&component)).await {
                Ok(result) => result,
                Err(_) => Err(format!("probe timed out after {}ms", limit.as_millis())),
            };
            (component.id, outcome)
        });
    }

    let mut outcomes = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!(error = %e, "liveness probe task failed"),
        }
    }
    outcomes
}
