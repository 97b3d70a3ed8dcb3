//! Pending actions — the queued unit of reconciliation work.
//!
//! An action is recorded when a request cannot be applied immediately
//! (container not ready, or earlier actions for the same subject+container
//! are still queued). Queue items are append-only: they are never mutated,
//! and are deleted exactly once after successful application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::membership::EnrolWindow;

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// What a pending action does to the enrolment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
  Add,
  Suspend,
  Unsuspend,
  Remove,
}

/// Direction of a single group membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupOp {
  Add,
  Remove,
}

/// One group change attached to an action. The group is resolved by exact
/// name within the container and created if absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChange {
  pub name: String,
  pub op:   GroupOp,
}

impl GroupChange {
  pub fn add(name: impl Into<String>) -> Self {
    Self { name: name.into(), op: GroupOp::Add }
  }

  pub fn remove(name: impl Into<String>) -> Self {
    Self { name: name.into(), op: GroupOp::Remove }
  }
}

// ─── PendingAction ───────────────────────────────────────────────────────────

/// A queued, not-yet-applied membership/group mutation.
///
/// `action_id` is the store-assigned queue sequence: monotonically
/// increasing, so replay in ascending id order is creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
  pub action_id:    i64,
  pub subject_id:   Uuid,
  pub container_id: Uuid,
  pub role_id:      Uuid,
  pub kind:         ActionKind,
  pub window:       EnrolWindow,
  pub groups:       Vec<GroupChange>,
  pub created_at:   DateTime<Utc>,
}

// ─── NewAction ───────────────────────────────────────────────────────────────

/// Input to [`crate::store::RosterStore::submit`]. `action_id` and
/// `created_at` are always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAction {
  pub subject_id:   Uuid,
  pub container_id: Uuid,
  pub role_id:      Uuid,
  pub kind:         ActionKind,
  pub window:       EnrolWindow,
  pub groups:       Vec<GroupChange>,
}

impl NewAction {
  /// Convenience constructor with an open window and no group changes.
  pub fn new(
    subject_id: Uuid,
    container_id: Uuid,
    role_id: Uuid,
    kind: ActionKind,
  ) -> Self {
    Self {
      subject_id,
      container_id,
      role_id,
      kind,
      window: EnrolWindow::default(),
      groups: Vec::new(),
    }
  }
}
