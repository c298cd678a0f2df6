//! Cluster API access used by the Ghost controller.
//!
//! [`GhostKubeClient`] is the only way the controller talks to the API
//! server, which keeps reconciliation testable against mocks and in-memory
//! clusters. Lookups return `Ok(None)` for 404; every other failure is
//! returned unmodified.

use crate::crd::{Ghost, GhostStatus};
use crate::error::OperatorResult;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use std::fmt::Debug;

#[cfg(test)]
use mockall::automock;

/// Namespaced object identifier handed to reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Namespace of the object.
    pub namespace: String,
    /// Name of the object.
    pub name: String,
}

impl ObjectKey {
    /// Create a key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Cluster operations needed to reconcile a Ghost.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GhostKubeClient: Send + Sync {
    /// Get a Ghost.
    async fn get_ghost(&self, namespace: &str, name: &str) -> OperatorResult<Option<Ghost>>;

    /// Write the status subresource of `ghost`.
    ///
    /// The write is guarded by the Ghost's `resourceVersion`.
    async fn update_ghost_status(&self, ghost: &Ghost, status: &GhostStatus)
    -> OperatorResult<()>;

    /// Get a PersistentVolumeClaim.
    async fn get_pvc(
        &self,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<Option<PersistentVolumeClaim>>;

    /// Create a PersistentVolumeClaim.
    async fn create_pvc(&self, pvc: &PersistentVolumeClaim) -> OperatorResult<()>;

    /// Get a Deployment.
    async fn get_deployment(&self, namespace: &str, name: &str)
    -> OperatorResult<Option<Deployment>>;

    /// Create a Deployment.
    async fn create_deployment(&self, deployment: &Deployment) -> OperatorResult<()>;

    /// Replace a Deployment. The live `resourceVersion` must be set.
    async fn replace_deployment(&self, deployment: &Deployment) -> OperatorResult<()>;

    /// Get a Service.
    async fn get_service(&self, namespace: &str, name: &str) -> OperatorResult<Option<Service>>;

    /// Create a Service.
    async fn create_service(&self, service: &Service) -> OperatorResult<()>;

    /// Get an Ingress.
    async fn get_ingress(&self, namespace: &str, name: &str) -> OperatorResult<Option<Ingress>>;

    /// Create an Ingress.
    async fn create_ingress(&self, ingress: &Ingress) -> OperatorResult<()>;

    /// Delete an Ingress.
    async fn delete_ingress(&self, namespace: &str, name: &str) -> OperatorResult<()>;
}

/// [`GhostKubeClient`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeGhostClient {
    client: Client,
}

impl KubeGhostClient {
    /// Wrap a kube client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

async fn get_opt<K>(api: &Api<K>, name: &str) -> OperatorResult<Option<K>>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn namespace_of(meta: &kube::api::ObjectMeta) -> &str {
    meta.namespace.as_deref().unwrap_or_default()
}

fn name_of(meta: &kube::api::ObjectMeta) -> &str {
    meta.name.as_deref().unwrap_or_default()
}

#[async_trait]
impl GhostKubeClient for KubeGhostClient {
    async fn get_ghost(&self, namespace: &str, name: &str) -> OperatorResult<Option<Ghost>> {
        get_opt(&self.api::<Ghost>(namespace), name).await
    }

    async fn update_ghost_status(
        &self,
        ghost: &Ghost,
        status: &GhostStatus,
    ) -> OperatorResult<()> {
        let api = self.api::<Ghost>(namespace_of(&ghost.metadata));
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": ghost.metadata.resource_version },
            "status": status,
        });

        api.patch_status(
            name_of(&ghost.metadata),
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }

    async fn get_pvc(
        &self,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<Option<PersistentVolumeClaim>> {
        get_opt(&self.api::<PersistentVolumeClaim>(namespace), name).await
    }

    async fn create_pvc(&self, pvc: &PersistentVolumeClaim) -> OperatorResult<()> {
        self.api::<PersistentVolumeClaim>(namespace_of(&pvc.metadata))
            .create(&PostParams::default(), pvc)
            .await?;
        Ok(())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<Option<Deployment>> {
        get_opt(&self.api::<Deployment>(namespace), name).await
    }

    async fn create_deployment(&self, deployment: &Deployment) -> OperatorResult<()> {
        self.api::<Deployment>(namespace_of(&deployment.metadata))
            .create(&PostParams::default(), deployment)
            .await?;
        Ok(())
    }

    async fn replace_deployment(&self, deployment: &Deployment) -> OperatorResult<()> {
        self.api::<Deployment>(namespace_of(&deployment.metadata))
            .replace(
                name_of(&deployment.metadata),
                &PostParams::default(),
                deployment,
            )
            .await?;
        Ok(())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> OperatorResult<Option<Service>> {
        get_opt(&self.api::<Service>(namespace), name).await
    }

    async fn create_service(&self, service: &Service) -> OperatorResult<()> {
        self.api::<Service>(namespace_of(&service.metadata))
            .create(&PostParams::default(), service)
            .await?;
        Ok(())
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> OperatorResult<Option<Ingress>> {
        get_opt(&self.api::<Ingress>(namespace), name).await
    }

    async fn create_ingress(&self, ingress: &Ingress) -> OperatorResult<()> {
        self.api::<Ingress>(namespace_of(&ingress.metadata))
            .create(&PostParams::default(), ingress)
            .await?;
        Ok(())
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> OperatorResult<()> {
        self.api::<Ingress>(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}
