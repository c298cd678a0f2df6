//! Status condition bookkeeping.
//!
//! Conditions are keyed by type. Upserting an existing type rewrites it in
//! place; a new type is appended. Nothing is ever removed.

use crate::crd::{Condition, ConditionStatus};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Condition type set once every child resource is in place.
pub const GHOST_READY: &str = "GhostReady";
/// Reason attached to [`GHOST_READY`].
pub const ALL_SUBRESOURCES_READY: &str = "AllSubresourcesReady";

/// Source of timestamps for conditions.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock reading the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Freeze the clock at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Insert or replace the condition of type `condition_type`.
///
/// An existing entry keeps its position; its status, reason, message and
/// timestamp are overwritten.
pub fn upsert(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) {
    let timestamp = now.to_rfc3339();

    if let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.condition_type == condition_type)
    {
        existing.status = status;
        existing.reason = reason.to_string();
        existing.message = message.to_string();
        existing.last_transition_time = timestamp;
        return;
    }

    conditions.push(Condition {
        condition_type: condition_type.to_string(),
        status,
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: timestamp,
    });
}

/// Find a condition by type.
pub fn find<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.condition_type == condition_type)
}

/// Compare two condition lists, ignoring timestamps.
pub fn same_ignoring_time(a: &[Condition], b: &[Condition]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.condition_type == y.condition_type
                && x.status == y.status
                && x.reason == y.reason
                && x.message == y.message
        })
}
