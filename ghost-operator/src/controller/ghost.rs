//! Ghost controller.
//!
//! Reconciles a Ghost by synchronizing its PVC, Deployment, Service and
//! Ingress in that order, then recording the outcome as status conditions.

use super::conditions::{self, ALL_SUBRESOURCES_READY, GHOST_READY};
use super::sync::{Subresource, SyncOutcome, Synchronizer};
use super::{ControllerContext, ReconcileAction};
use crate::client::ObjectKey;
use crate::crd::{ConditionStatus, Ghost, GhostStatus};
use crate::error::OperatorResult;
use std::sync::Arc;

/// Outcome of each child synchronized during one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubresourceReadiness {
    outcomes: Vec<(Subresource, SyncOutcome)>,
}

impl SubresourceReadiness {
    /// Record that `kind` was synchronized.
    pub fn record(&mut self, kind: Subresource, outcome: SyncOutcome) {
        self.outcomes.push((kind, outcome));
    }

    /// Whether `kind` was synchronized successfully.
    pub fn is_ready(&self, kind: Subresource) -> bool {
        self.outcomes.iter().any(|(k, _)| *k == kind)
    }

    /// Whether every child was synchronized successfully.
    pub fn all_ready(&self) -> bool {
        Subresource::ORDER.iter().all(|kind| self.is_ready(*kind))
    }

    /// Number of children written to during the pass.
    pub fn writes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome != SyncOutcome::Unchanged)
            .count()
    }
}

/// Controller for Ghost resources.
#[derive(Clone)]
pub struct GhostController {
    ctx: Arc<ControllerContext>,
}

impl GhostController {
    /// Create a new Ghost controller.
    pub fn new(ctx: Arc<ControllerContext>) -> Self {
        Self { ctx }
    }

    /// Reconcile the Ghost identified by `key`.
    ///
    /// 1. Loads the Ghost; a missing Ghost ends the pass cleanly
    /// 2. Synchronizes PVC, Deployment, Service and Ingress, stopping at the
    ///    first failure after recording a `<Kind>NotReady` condition
    /// 3. Records `GhostReady` when every child is in place
    /// 4. Writes the status subresource
    pub async fn reconcile(&self, key: &ObjectKey) -> OperatorResult<ReconcileAction> {
        let Some(ghost) = self.ctx.client.get_ghost(&key.namespace, &key.name).await? else {
            // Children are owned by the Ghost and go away with it.
            tracing::info!(ghost = %key, "Ghost not found, assuming deleted");
            return Ok(ReconcileAction::Done);
        };

        tracing::info!(
            name = %key.name,
            team = %key.namespace,
            image_tag = %ghost.spec.image_tag,
            replicas = ghost.spec.replicas,
            enable_ingress = ghost.spec.enable_ingress,
            "Reconciling Ghost"
        );

        let original = ghost.status.clone().unwrap_or_default();
        let mut status = original.clone();
        let sync = Synchronizer::new(
            self.ctx.client.as_ref(),
            self.ctx.events.as_ref(),
            &ghost,
            &key.namespace,
        );

        let mut readiness = SubresourceReadiness::default();
        for kind in Subresource::ORDER {
            match sync.sync(kind).await {
                Ok(outcome) => readiness.record(kind, outcome),
                Err(err) => {
                    tracing::error!(
                        ghost = %key,
                        kind = kind.label(),
                        error = %err,
                        "{}",
                        kind.failure_message()
                    );
                    let condition_type = kind.not_ready_condition();
                    conditions::upsert(
                        &mut status.conditions,
                        &condition_type,
                        ConditionStatus::False,
                        &condition_type,
                        &format!("{}: {}", kind.failure_message(), err),
                        self.ctx.clock.now(),
                    );
                    if let Err(status_err) = self.update_status(&ghost, &original, &status).await {
                        tracing::warn!(
                            ghost = %key,
                            error = %status_err,
                            "Failed to record failure condition"
                        );
                    }
                    return Err(err);
                }
            }
        }

        if readiness.all_ready() {
            conditions::upsert(
                &mut status.conditions,
                GHOST_READY,
                ConditionStatus::True,
                ALL_SUBRESOURCES_READY,
                "All subresources are ready",
                self.ctx.clock.now(),
            );
        }

        self.update_status(&ghost, &original, &status).await?;
        tracing::info!(ghost = %key, writes = readiness.writes(), "Reconciliation complete");
        Ok(ReconcileAction::Done)
    }

    /// Write `status` unless it only differs from `original` in timestamps.
    async fn update_status(
        &self,
        ghost: &Ghost,
        original: &GhostStatus,
        status: &GhostStatus,
    ) -> OperatorResult<()> {
        if conditions::same_ignoring_time(&original.conditions, &status.conditions) {
            tracing::debug!("Ghost status unchanged");
            return Ok(());
        }
        self.ctx.client.update_ghost_status(ghost, status).await
    }
}
