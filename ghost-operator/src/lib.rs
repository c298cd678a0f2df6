//! Ghost Kubernetes Operator
//!
//! This crate provides a Kubernetes operator that turns a `Ghost` custom
//! resource into a running Ghost blog: a PersistentVolumeClaim for content,
//! a Deployment, a NodePort Service and, optionally, an Ingress.
//!
//! # Custom Resource Definitions
//!
//! - **Ghost**: One blog instance in a team namespace
//!
//! # Example
//!
//! ```yaml
//! apiVersion: marketing.kb.dev/v1
//! kind: Ghost
//! metadata:
//!   name: blog
//!   namespace: marketing
//! spec:
//!   imageTag: 5-alpine
//!   replicas: 1
//!   enableIngress: true
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod events;
pub mod resources;

pub use config::OperatorConfig;
pub use crd::{Ghost, GhostSpec, GhostStatus};
pub use error::{OperatorError, OperatorResult};
