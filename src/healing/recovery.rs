//! Emergency recovery.
//!
//! A blunt safety valve: when routing finds no eligible component, every
//! registered component is reactivated. Counters and health scores stay as
//! they are unless `emergency_resets_health` is configured, so a genuinely
//! broken component fails the gate again straight away.

use tracing::warn;

use super::health::HealthPolicy;
use super::repair::{IssueType, RepairAction};
use super::router::RouterState;
use crate::config::RouterConfig;

/// Action text recorded for every emergency recovery.
pub const EMERGENCY_ACTION: &str = "reactivated all components";

/// Message recorded for every emergency recovery.
pub const EMERGENCY_MESSAGE: &str = "emergency recovery: all components were inactive";

/// Reactivate every component and append an `EMERGENCY` repair action.
///
/// The action's `success` flag reports whether at least one component is
/// eligible afterwards. Callers hold the router lock.
pub(crate) fn emergency_recovery(
    state: &mut RouterState,
    config: &RouterConfig,
    policy: &HealthPolicy,
) {
    let total = state.components.len();
    for entry in state.components.values_mut() {
        entry.component.is_active = true;
        entry.suspended_by_probe = false;
        if config.emergency_resets_health {
            entry.component.reset_health();
        }
    }

    let restored = state.healthy_count(policy);
    warn!(
        components = total,
        restored,
        reset_health = config.emergency_resets_health,
        "no eligible components; emergency recovery engaged"
    );

    state.record_repair(
        RepairAction::new("", IssueType::Emergency, EMERGENCY_ACTION, EMERGENCY_MESSAGE)
            .with_success(restored > 0),
    );
}
