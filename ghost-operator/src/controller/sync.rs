//! Synchronization of the four child resources of a Ghost.
//!
//! Each child goes through the same state machine: the live object is
//! classified as [`SyncState::Absent`], [`SyncState::Matching`] or
//! [`SyncState::Divergent`] and the classification decides the single write
//! (if any) issued to the cluster.
//!
//! | child      | Absent              | Matching | Divergent        |
//! |------------|---------------------|----------|------------------|
//! | PVC        | create              | no-op    | (never)          |
//! | Deployment | create              | no-op    | replace spec     |
//! | Service    | create              | no-op    | (never)          |
//! | Ingress    | create if enabled   | no-op    | delete           |

use crate::client::GhostKubeClient;
use crate::crd::Ghost;
use crate::error::OperatorResult;
use crate::events::{EventPublisher, actions, reasons};
use crate::resources;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::api::networking::v1::Ingress;
use kube::Resource;
use kube::runtime::events::EventType;

/// Observed state of a child resource relative to its desired form.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncState<K> {
    /// No live object.
    Absent,
    /// Live object needs no write.
    Matching(K),
    /// Live object must be rewritten or removed.
    Divergent(K),
}

/// Write performed by a synchronization step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Child created.
    Created,
    /// Child spec replaced.
    Updated,
    /// Child deleted.
    Deleted,
    /// Nothing written.
    Unchanged,
}

/// The child resources, in reconciliation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subresource {
    /// PersistentVolumeClaim holding Ghost content.
    Pvc,
    /// Deployment running Ghost.
    Deployment,
    /// Service exposing the pods.
    Service,
    /// Ingress routing the public host.
    Ingress,
}

impl Subresource {
    /// Reconciliation order.
    pub const ORDER: [Subresource; 4] = [
        Subresource::Pvc,
        Subresource::Deployment,
        Subresource::Service,
        Subresource::Ingress,
    ];

    /// Short kind label used in condition types and logs.
    pub fn label(self) -> &'static str {
        match self {
            Subresource::Pvc => "PVC",
            Subresource::Deployment => "Deployment",
            Subresource::Service => "Service",
            Subresource::Ingress => "Ingress",
        }
    }

    /// Condition type recorded when this child fails, e.g. `DeploymentNotReady`.
    pub fn not_ready_condition(self) -> String {
        format!("{}NotReady", self.label())
    }

    /// Message recorded with the failure condition.
    pub fn failure_message(self) -> &'static str {
        match self {
            Subresource::Pvc => "Failed to add PVC for Ghost",
            Subresource::Deployment => "Failed to add or update Deployment for Ghost",
            Subresource::Service => "Failed to add Service for Ghost",
            Subresource::Ingress => "Failed to add Ingress for Ghost",
        }
    }
}

/// Classify a live Deployment against the Ghost.
///
/// Only replica count and container image are compared. Fields added by
/// the API server or edited by hand do not trigger an update.
pub fn classify_deployment(live: Option<Deployment>, ghost: &Ghost) -> SyncState<Deployment> {
    match live {
        None => SyncState::Absent,
        Some(deploy) if deployment_matches(&deploy, ghost) => SyncState::Matching(deploy),
        Some(deploy) => SyncState::Divergent(deploy),
    }
}

fn deployment_matches(deploy: &Deployment, ghost: &Ghost) -> bool {
    let Some(spec) = deploy.spec.as_ref() else {
        return false;
    };
    // The API server defaults a missing replica count to 1.
    let replicas = spec.replicas.unwrap_or(1);
    let image = spec
        .template
        .spec
        .as_ref()
        .and_then(|pod| pod.containers.first())
        .and_then(|c| c.image.as_deref());

    replicas == ghost.spec.replicas && image == Some(resources::image(&ghost.spec.image_tag).as_str())
}

/// Classify a live Ingress against `enable_ingress`.
pub fn classify_ingress(live: Option<Ingress>, enable_ingress: bool) -> SyncState<Ingress> {
    match live {
        None => SyncState::Absent,
        Some(ingress) if enable_ingress => SyncState::Matching(ingress),
        Some(ingress) => SyncState::Divergent(ingress),
    }
}

/// Classify a child that is never rewritten once it exists.
pub fn classify_immutable<K>(live: Option<K>) -> SyncState<K> {
    match live {
        None => SyncState::Absent,
        Some(obj) => SyncState::Matching(obj),
    }
}

/// Drives the child resources of one Ghost toward their desired state.
pub struct Synchronizer<'a> {
    client: &'a dyn GhostKubeClient,
    events: &'a dyn EventPublisher,
    ghost: &'a Ghost,
    namespace: &'a str,
    ghost_ref: ObjectReference,
}

impl<'a> Synchronizer<'a> {
    /// Create a synchronizer for `ghost`, which lives in `namespace`.
    pub fn new(
        client: &'a dyn GhostKubeClient,
        events: &'a dyn EventPublisher,
        ghost: &'a Ghost,
        namespace: &'a str,
    ) -> Self {
        Self {
            client,
            events,
            ghost,
            namespace,
            ghost_ref: ghost.object_ref(&()),
        }
    }

    /// Synchronize one child.
    pub async fn sync(&self, kind: Subresource) -> OperatorResult<SyncOutcome> {
        match kind {
            Subresource::Pvc => self.sync_pvc().await,
            Subresource::Deployment => self.sync_deployment().await,
            Subresource::Service => self.sync_service().await,
            Subresource::Ingress => self.sync_ingress().await,
        }
    }

    async fn emit(&self, reason: &str, action: &str, note: &str) {
        self.events
            .publish(
                &self.ghost_ref,
                EventType::Normal,
                reason,
                action,
                Some(note.to_string()),
            )
            .await;
    }

    /// Create the PersistentVolumeClaim if it does not exist.
    pub async fn sync_pvc(&self) -> OperatorResult<SyncOutcome> {
        let name = resources::pvc_name(self.namespace);
        let live = self.client.get_pvc(self.namespace, &name).await?;

        match classify_immutable(live) {
            SyncState::Absent => {
                let mut pvc = resources::build_pvc(self.ghost);
                resources::set_controller_owner(self.ghost, &mut pvc.metadata)?;
                self.client.create_pvc(&pvc).await?;
                self.emit(reasons::PVC_READY, actions::CREATE, "PVC created successfully")
                    .await;
                tracing::info!(pvc = %name, "PVC created");
                Ok(SyncOutcome::Created)
            }
            SyncState::Matching(_) | SyncState::Divergent(_) => {
                tracing::debug!(pvc = %name, "PVC already exists");
                Ok(SyncOutcome::Unchanged)
            }
        }
    }

    /// Create the Deployment, or replace its spec when replicas or image drifted.
    pub async fn sync_deployment(&self) -> OperatorResult<SyncOutcome> {
        let name = resources::deployment_name(self.namespace);
        let live = self.client.get_deployment(self.namespace, &name).await?;
        let desired = resources::build_deployment(self.ghost);

        match classify_deployment(live, self.ghost) {
            SyncState::Absent => {
                let mut deploy = desired;
                resources::set_controller_owner(self.ghost, &mut deploy.metadata)?;
                self.client.create_deployment(&deploy).await?;
                self.emit(
                    reasons::DEPLOYMENT_CREATED,
                    actions::CREATE,
                    "Deployment created successfully",
                )
                .await;
                tracing::info!(deployment = %name, team = %self.namespace, "Deployment created");
                Ok(SyncOutcome::Created)
            }
            SyncState::Divergent(mut live) => {
                live.spec = desired.spec;
                self.client.replace_deployment(&live).await?;
                self.emit(
                    reasons::DEPLOYMENT_UPDATED,
                    actions::UPDATE,
                    "Deployment updated successfully",
                )
                .await;
                tracing::info!(
                    deployment = %name,
                    replicas = self.ghost.spec.replicas,
                    image_tag = %self.ghost.spec.image_tag,
                    "Deployment updated"
                );
                Ok(SyncOutcome::Updated)
            }
            SyncState::Matching(_) => {
                tracing::debug!(deployment = %name, "Deployment is up to date");
                Ok(SyncOutcome::Unchanged)
            }
        }
    }

    /// Create the Service if it does not exist.
    pub async fn sync_service(&self) -> OperatorResult<SyncOutcome> {
        let name = resources::service_name(self.namespace);
        let live = self.client.get_service(self.namespace, &name).await?;

        match classify_immutable(live) {
            SyncState::Absent => {
                let mut svc = resources::build_service(self.ghost);
                resources::set_controller_owner(self.ghost, &mut svc.metadata)?;
                self.client.create_service(&svc).await?;
                self.emit(
                    reasons::SERVICE_CREATED,
                    actions::CREATE,
                    "Service created successfully",
                )
                .await;
                tracing::info!(service = %name, "Service created");
                Ok(SyncOutcome::Created)
            }
            SyncState::Matching(_) | SyncState::Divergent(_) => {
                tracing::debug!(service = %name, "Service already exists");
                Ok(SyncOutcome::Unchanged)
            }
        }
    }

    /// Create the Ingress when enabled, delete it when disabled.
    pub async fn sync_ingress(&self) -> OperatorResult<SyncOutcome> {
        let name = resources::ingress_name(self.namespace);
        let enabled = self.ghost.spec.enable_ingress;
        let live = self.client.get_ingress(self.namespace, &name).await?;

        match classify_ingress(live, enabled) {
            SyncState::Absent if !enabled => {
                tracing::debug!(ingress = %name, "Ingress disabled");
                Ok(SyncOutcome::Unchanged)
            }
            SyncState::Absent => {
                let mut ingress = resources::build_ingress(self.ghost);
                resources::set_controller_owner(self.ghost, &mut ingress.metadata)?;
                self.client.create_ingress(&ingress).await?;
                self.emit(
                    reasons::INGRESS_CREATED,
                    actions::CREATE,
                    "Ingress created successfully",
                )
                .await;
                tracing::info!(ingress = %name, "Ingress created");
                Ok(SyncOutcome::Created)
            }
            SyncState::Divergent(_) => {
                self.client.delete_ingress(self.namespace, &name).await?;
                self.emit(
                    reasons::INGRESS_DELETED,
                    actions::DELETE,
                    "Ingress deleted because ingress is disabled",
                )
                .await;
                tracing::info!(ingress = %name, "Ingress disabled, deleted");
                Ok(SyncOutcome::Deleted)
            }
            SyncState::Matching(_) => {
                // Host and backend drift are not corrected.
                tracing::debug!(ingress = %name, "Ingress already exists, ignoring update");
                Ok(SyncOutcome::Unchanged)
            }
        }
    }
}
