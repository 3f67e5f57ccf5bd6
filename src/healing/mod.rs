//! # Healing: health-scored routing with a self-repairing monitor
//!
//! ## Responsibility
//! Pick the best component for each unit of work, track work in flight,
//! and keep the pool usable: reap stalled requests, flag capacity overruns,
//! recover when every component is gone, and summarise it all as one
//! [`SystemStatus`].
//!
//! ## Architecture
//!
//! ```text
//! route_request ──► best_candidate (health · priority / (1 + in_flight))
//!       │                 │ none healthy
//!       │                 └──► recovery::emergency_recovery
//!       ▼
//! RouterState ◄── record_request_start / record_request_end
//!       ▲
//!       └── monitor tick: probe → reap → congestion → status
//! ```
//!
//! ## Modules
//!
//! - [`component`]: Component record and health accounting
//! - [`health`]: eligibility, scoring and capacity arithmetic
//! - [`status`]: SystemStatus and its precedence rules
//! - [`repair`]: RepairAction and the bounded repair log
//! - [`latency`]: bounded response-time window and percentiles
//! - [`probe`]: optional LivenessProbe collaborator
//! - [`recovery`]: emergency recovery when nothing is eligible
//! - [`router`]: SelfHealingRouter, the caller-facing surface
//! - [`monitor`]: background tick and lifecycle
//!
//! ## Guarantees
//!
//! - **Never refuses work**: routing always returns a result
//! - **Consistent snapshots**: all state lives behind one lock
//! - **Bounded memory**: repair log and latency window are capped
//!
//! ## NOT Responsible For
//!
//! - Performing the routed work
//! - Load-balancing fairness beyond the score formula
//! - Persistence across restarts

pub mod component;
pub mod health;
pub mod latency;
pub mod monitor;
pub mod probe;
pub mod recovery;
pub mod repair;
pub mod router;
pub mod status;

pub use component::Component;
pub use health::HealthPolicy;
pub use latency::{ResponseTimeStats, ResponseTimes};
pub use monitor::TickReport;
pub use probe::LivenessProbe;
pub use repair::{IssueType, RepairAction, RepairActionView, RepairLog};
pub use router::{ComponentMetrics, RouteResult, RouterMetrics, SelfHealingRouter};
pub use status::{StatusSignals, SystemStatus};
