//! Ghost Custom Resource Definition.
//!
//! Declares a per-team Ghost blog. The namespace of a Ghost doubles as the
//! team identifier and keys every child resource the operator creates.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Ghost is the Schema for the ghosts API.
///
/// Only one Ghost per namespace is supported: child resource names are
/// derived from the namespace, not from the Ghost's own name.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "marketing.kb.dev",
    version = "v1",
    kind = "Ghost",
    plural = "ghosts",
    namespaced,
    status = "GhostStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Image Tag", "type":"string", "jsonPath":".spec.imageTag"}"#,
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Ingress", "type":"boolean", "jsonPath":".spec.enableIngress"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GhostSpec {
    /// Tag of the `ghost` container image.
    #[schemars(regex(pattern = r"^[-a-z0-9]*$"))]
    pub image_tag: String,

    /// Number of blog pods.
    #[schemars(range(min = 1, max = 3))]
    pub replicas: i32,

    /// Expose the blog through an Ingress at `<name>.kb.dev`.
    #[serde(default)]
    pub enable_ingress: bool,
}

/// Ghost status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GhostStatus {
    /// Conditions, at most one per type, in insertion order.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Status of a condition.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// The condition holds.
    True,
    /// The condition does not hold.
    False,
    /// Not yet determined.
    #[default]
    Unknown,
}

/// Condition representing one readiness aspect of a Ghost.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (GhostReady, DeploymentNotReady, ...).
    #[serde(rename = "type")]
    pub condition_type: String,

    /// Status of the condition.
    pub status: ConditionStatus,

    /// Machine-readable reason.
    pub reason: String,

    /// Human-readable message.
    pub message: String,

    /// Last time the condition was written, RFC 3339.
    pub last_transition_time: String,
}
