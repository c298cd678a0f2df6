//! Custom Resource Definitions for the Ghost operator.
//!
//! - [`Ghost`]: a per-team Ghost blog deployment

mod ghost;

pub use ghost::{Condition, ConditionStatus, Ghost, GhostSpec, GhostStatus};
