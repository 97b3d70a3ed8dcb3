//! Container — a course-like entity that groups memberships and groups.
//!
//! Containers are created and destroyed by an external collaborator; the
//! core never mutates them. Two externally-managed attributes are consumed
//! read-only: `ready` (has the container received its structural template)
//! and `kind` (a policy-lookup key).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The flavour of a container; used only as a key into the unenrolment
/// policy matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
  Course,
  Module,
}

/// A course-like entity. The `ready` flag gates whether membership
/// mutations may be applied; until it flips, everything queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
  pub container_id: Uuid,
  /// External-facing human key, unique across containers.
  pub external_key: String,
  pub kind:         ContainerKind,
  pub ready:        bool,
  pub created_at:   DateTime<Utc>,
}
