//! Liveness probe collaborator.
//!
//! The router never knows how to reach a backend. Deployments that can check
//! liveness plug an implementation in; without one the monitor relies purely
//! on outcomes reported through `record_request_end`.

use async_trait::async_trait;

use super::component::Component;

/// Per-component liveness check invoked during the monitor's probe pass.
///
/// Each call is bounded by `probe_timeout_ms`; a call that overruns is
/// treated as a failure. Implementations must not call back into the router.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use tokio_healing_router::{Component, LivenessProbe};
///
/// struct AlwaysUp;
///
/// #[async_trait]
/// impl LivenessProbe for AlwaysUp {
///     async fn check(&self, _component: &Component) -> Result<(), String> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait LivenessProbe: Send + Sync + 'static {
    /// Return `Ok(())` if the component is reachable, or a reason otherwise.
    async fn check(&self, component: &Component) -> Result<(), String>;
}
