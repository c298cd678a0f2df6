//! Kubernetes Event recording for the Ghost controller.
//!
//! Events are fire-and-forget: a failed publish is logged and never fails
//! reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Client;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};

#[cfg(test)]
use mockall::automock;

/// Publishes Kubernetes Events about a Ghost.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an Event on `resource_ref`.
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publisher backed by `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a publisher reporting as `controller_name`.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            tracing::warn!(reason, action, error = %e, "Failed to publish event");
        }
    }
}

/// Publisher that drops every event.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reasons, as shown under REASON in `kubectl get events`.
pub mod reasons {
    /// PersistentVolumeClaim created.
    pub const PVC_READY: &str = "PVCReady";
    /// Deployment created.
    pub const DEPLOYMENT_CREATED: &str = "DeploymentCreated";
    /// Deployment spec replaced.
    pub const DEPLOYMENT_UPDATED: &str = "DeploymentUpdated";
    /// Service created.
    pub const SERVICE_CREATED: &str = "ServiceCreated";
    /// Ingress created.
    pub const INGRESS_CREATED: &str = "IngressCreated";
    /// Ingress removed after `enableIngress` was turned off.
    pub const INGRESS_DELETED: &str = "IngressDeleted";
}

/// Event actions.
pub mod actions {
    /// Child resource created.
    pub const CREATE: &str = "Create";
    /// Child resource updated.
    pub const UPDATE: &str = "Update";
    /// Child resource deleted.
    pub const DELETE: &str = "Delete";
}
