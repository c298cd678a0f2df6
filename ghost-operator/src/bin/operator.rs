//! Ghost Kubernetes Operator binary.
//!
//! Watches Ghost custom resources and the children they own, reconciling
//! each Ghost into its PVC, Deployment, Service and Ingress.

use futures::StreamExt;
use ghost_operator::config::OperatorConfig;
use ghost_operator::controller::{ControllerContext, error_policy, reconcile};
use ghost_operator::crd::Ghost;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::Controller;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, CustomResourceExt};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ghost_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    if std::env::args().any(|arg| arg == "--generate-crds") {
        generate_crds()?;
        return Ok(());
    }

    tracing::info!("Starting Ghost Kubernetes Operator");

    let config = OperatorConfig::from_env()?;
    tracing::info!(
        controller = %config.controller_name,
        namespace = config.watch_namespace.as_deref().unwrap_or("*"),
        resync = ?config.resync_interval,
        "Loaded configuration"
    );

    let client = Client::try_default().await?;
    tracing::info!("Connected to Kubernetes cluster");

    let ctx = Arc::new(ControllerContext::from_client(client.clone(), config.clone()));
    run_ghost_controller(client, &config, ctx).await
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <K as kube::Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run the Ghost controller until a shutdown signal arrives.
async fn run_ghost_controller(
    client: Client,
    config: &OperatorConfig,
    ctx: Arc<ControllerContext>,
) -> anyhow::Result<()> {
    let namespace = config.watch_namespace.as_deref();
    let ghosts: Api<Ghost> = api(&client, namespace);

    Controller::new(ghosts, WatcherConfig::default())
        .owns(
            api::<PersistentVolumeClaim>(&client, namespace),
            WatcherConfig::default(),
        )
        .owns(api::<Deployment>(&client, namespace), WatcherConfig::default())
        .owns(api::<Service>(&client, namespace), WatcherConfig::default())
        .owns(api::<Ingress>(&client, namespace), WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    tracing::debug!(
                        ghost = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or_default(),
                        ?action,
                        "Reconciled ghost"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Ghost controller stream error");
                }
            }
        })
        .await;

    tracing::info!("Ghost controller stopped");
    Ok(())
}

/// Print the Ghost CRD as YAML.
fn generate_crds() -> anyhow::Result<()> {
    println!("---");
    println!("{}", serde_yaml::to_string(&Ghost::crd())?);
    Ok(())
}
