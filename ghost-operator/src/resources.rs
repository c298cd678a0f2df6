//! Desired state of the resources owned by a Ghost.
//!
//! Every builder is a pure function of the Ghost: same input, same output.
//! Names are derived from the namespace only, so one Ghost per namespace.

use crate::crd::Ghost;
use crate::error::{OperatorError, OperatorResult};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Service, ServicePort,
    ServiceSpec, Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Prefix of the PersistentVolumeClaim name.
pub const PVC_NAME_PREFIX: &str = "ghost-data-pvc-";
/// Prefix of the Deployment name.
pub const DEPLOYMENT_NAME_PREFIX: &str = "ghost-deployment-";
/// Prefix of the Service name.
pub const SERVICE_NAME_PREFIX: &str = "ghost-service-";
/// Prefix of the Ingress name.
pub const INGRESS_NAME_PREFIX: &str = "ghost-ingress-";

/// Port the Ghost container listens on.
pub const CONTAINER_PORT: i32 = 2368;
/// Port exposed by the Service and targeted by the Ingress.
pub const SERVICE_PORT: i32 = 80;
/// Requested size of the data volume.
pub const STORAGE_SIZE: &str = "1Gi";
/// Domain appended to the Ghost name to form the Ingress host.
pub const INGRESS_DOMAIN: &str = "kb.dev";
/// Ingress class handling the route.
pub const INGRESS_CLASS: &str = "nginx";

const CONTAINER_NAME: &str = "ghost";
const IMAGE_REPOSITORY: &str = "ghost";
const DATA_VOLUME: &str = "ghost-data";
const CONTENT_PATH: &str = "/var/lib/ghost/content";
const DATABASE_FILE: &str = "/var/lib/ghost/content/data/ghost.db";

/// Name of the PersistentVolumeClaim for a namespace.
pub fn pvc_name(namespace: &str) -> String {
    format!("{PVC_NAME_PREFIX}{namespace}")
}

/// Name of the Deployment for a namespace.
pub fn deployment_name(namespace: &str) -> String {
    format!("{DEPLOYMENT_NAME_PREFIX}{namespace}")
}

/// Name of the Service for a namespace.
pub fn service_name(namespace: &str) -> String {
    format!("{SERVICE_NAME_PREFIX}{namespace}")
}

/// Name of the Ingress for a namespace.
pub fn ingress_name(namespace: &str) -> String {
    format!("{INGRESS_NAME_PREFIX}{namespace}")
}

/// Image reference for a tag.
pub fn image(tag: &str) -> String {
    format!("{IMAGE_REPOSITORY}:{tag}")
}

/// Ingress host for a Ghost name.
pub fn host(ghost_name: &str) -> String {
    format!("{ghost_name}.{INGRESS_DOMAIN}")
}

/// Pod labels (and selector) for a namespace.
pub fn labels(namespace: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), format!("ghost-{namespace}"))])
}

fn team(ghost: &Ghost) -> String {
    ghost.namespace().unwrap_or_default()
}

fn metadata(name: String, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

/// Build the PersistentVolumeClaim holding the Ghost content directory.
pub fn build_pvc(ghost: &Ghost) -> PersistentVolumeClaim {
    let namespace = team(ghost);

    PersistentVolumeClaim {
        metadata: metadata(pvc_name(&namespace), &namespace),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(STORAGE_SIZE.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the Deployment running the Ghost container.
pub fn build_deployment(ghost: &Ghost) -> Deployment {
    let namespace = team(ghost);
    let labels = labels(&namespace);

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(image(&ghost.spec.image_tag)),
        env: Some(vec![
            EnvVar {
                name: "NODE_ENV".to_string(),
                value: Some("development".to_string()),
                value_from: None,
            },
            EnvVar {
                name: "database__connection__filename".to_string(),
                value: Some(DATABASE_FILE.to_string()),
                value_from: None,
            },
        ]),
        ports: Some(vec![ContainerPort {
            container_port: CONTAINER_PORT,
            ..Default::default()
        }]),
        volume_mounts: Some(vec![VolumeMount {
            name: DATA_VOLUME.to_string(),
            mount_path: CONTENT_PATH.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    Deployment {
        metadata: metadata(deployment_name(&namespace), &namespace),
        spec: Some(DeploymentSpec {
            replicas: Some(ghost.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                match_expressions: None,
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![Volume {
                        name: DATA_VOLUME.to_string(),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: pvc_name(&namespace),
                            read_only: None,
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the NodePort Service in front of the Ghost pods.
pub fn build_service(ghost: &Ghost) -> Service {
    let namespace = team(ghost);

    Service {
        metadata: metadata(service_name(&namespace), &namespace),
        spec: Some(ServiceSpec {
            type_: Some("NodePort".to_string()),
            ports: Some(vec![ServicePort {
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(CONTAINER_PORT)),
                ..Default::default()
            }]),
            selector: Some(labels(&namespace)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the Ingress routing `<name>.kb.dev/` to the Service.
pub fn build_ingress(ghost: &Ghost) -> Ingress {
    let namespace = team(ghost);

    let path = HTTPIngressPath {
        path: Some("/".to_string()),
        path_type: "Prefix".to_string(),
        backend: IngressBackend {
            service: Some(IngressServiceBackend {
                name: service_name(&namespace),
                port: Some(ServiceBackendPort {
                    number: Some(SERVICE_PORT),
                    name: None,
                }),
            }),
            resource: None,
        },
    };

    Ingress {
        metadata: metadata(ingress_name(&namespace), &namespace),
        spec: Some(IngressSpec {
            ingress_class_name: Some(INGRESS_CLASS.to_string()),
            rules: Some(vec![IngressRule {
                host: Some(host(&ghost.name_any())),
                http: Some(HTTPIngressRuleValue { paths: vec![path] }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Mark `owner` as the controlling owner of `child`.
///
/// The cluster garbage collector deletes `child` once `owner` is gone.
pub fn set_controller_owner(owner: &Ghost, child: &mut ObjectMeta) -> OperatorResult<()> {
    let owner_ref = owner
        .controller_owner_ref(&())
        .ok_or(OperatorError::MissingObjectKey(".metadata.uid"))?;

    let refs = child.owner_references.get_or_insert_with(Vec::new);
    refs.retain(|r| r.uid != owner_ref.uid);
    refs.push(owner_ref);
    Ok(())
}
