//! Kubernetes controller for Ghost resources.
//!
//! - [`GhostController`]: one reconciliation pass for a Ghost
//! - [`reconcile`] / [`error_policy`]: adapters for `kube::runtime::Controller`
//!
//! # Usage with kube-runtime
//!
//! ```ignore
//! use ghost_operator::controller::{error_policy, reconcile};
//!
//! Controller::new(ghosts, watcher_config)
//!     .run(reconcile, error_policy, context)
//!     .for_each(|_| futures::future::ready(()))
//!     .await;
//! ```

pub mod conditions;
mod ghost;
pub mod sync;

pub use conditions::{Clock, FixedClock, SystemClock};
pub use ghost::{GhostController, SubresourceReadiness};

use crate::client::{GhostKubeClient, KubeGhostClient, ObjectKey};
use crate::config::OperatorConfig;
use crate::crd::Ghost;
use crate::error::OperatorError;
use crate::events::{EventPublisher, KubeEventPublisher};
use kube::ResourceExt;
use kube::runtime::controller::Action;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Shared context for the controller.
pub struct ControllerContext {
    /// Cluster access.
    pub client: Arc<dyn GhostKubeClient>,
    /// Event sink.
    pub events: Arc<dyn EventPublisher>,
    /// Timestamp source for conditions.
    pub clock: Arc<dyn Clock>,
    /// Operator configuration.
    pub config: OperatorConfig,
    backoff: Backoff,
}

impl ControllerContext {
    /// Create a context from its parts.
    pub fn new(
        client: Arc<dyn GhostKubeClient>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        config: OperatorConfig,
    ) -> Self {
        let backoff = Backoff::new(config.backoff_initial, config.backoff_max);
        Self {
            client,
            events,
            clock,
            config,
            backoff,
        }
    }

    /// Create a context talking to a real cluster.
    pub fn from_client(client: kube::Client, config: OperatorConfig) -> Self {
        let events = KubeEventPublisher::new(client.clone(), &config.controller_name);
        Self::new(
            Arc::new(KubeGhostClient::new(client)),
            Arc::new(events),
            Arc::new(SystemClock),
            config,
        )
    }

    /// Per-object retry backoff.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }
}

/// Result type for reconciliation actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Requeue after the specified duration.
    Requeue(Duration),
    /// Don't requeue (reconciliation complete).
    Done,
}

/// Exponential retry delay per object key.
///
/// Each consecutive failure doubles the delay up to `max`. A success resets
/// the key.
#[derive(Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    failures: Mutex<HashMap<ObjectKey, u32>>,
}

impl Backoff {
    /// Create a backoff starting at `initial` and capped at `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure for `key` and return the delay before the next attempt.
    pub fn next_delay(&self, key: &ObjectKey) -> Duration {
        let mut failures = self.failures.lock();
        let count = failures.entry(key.clone()).or_insert(0);
        let exponent = (*count).min(16);
        *count = count.saturating_add(1);

        self.initial
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// Forget the failures of `key`.
    pub fn reset(&self, key: &ObjectKey) {
        self.failures.lock().remove(key);
    }

    /// Consecutive failures recorded for `key`.
    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }
}

fn object_key(ghost: &Ghost) -> ObjectKey {
    ObjectKey::new(ghost.namespace().unwrap_or_default(), ghost.name_any())
}

/// Reconcile entry point for `kube::runtime::Controller`.
///
/// A completed pass is requeued after the resync interval so drift is
/// corrected even when a watch event is missed.
pub async fn reconcile(
    ghost: Arc<Ghost>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, OperatorError> {
    let key = object_key(&ghost);
    let controller = GhostController::new(ctx.clone());

    match controller.reconcile(&key).await? {
        ReconcileAction::Requeue(after) => Ok(Action::requeue(after)),
        ReconcileAction::Done => {
            ctx.backoff.reset(&key);
            Ok(Action::requeue(ctx.config.resync_interval))
        }
    }
}

/// Handle errors during reconciliation.
pub fn error_policy(ghost: Arc<Ghost>, error: &OperatorError, ctx: Arc<ControllerContext>) -> Action {
    let key = object_key(&ghost);
    let delay = ctx.backoff.next_delay(&key);
    tracing::error!(
        ghost = %key,
        error = %error,
        conflict = error.is_conflict(),
        retry_in = ?delay,
        "Reconciliation error"
    );
    Action::requeue(delay)
}
