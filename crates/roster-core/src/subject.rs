//! Subject — a user identity mirrored from the records feed.
//!
//! Subjects are created by the identity feed and immutable afterwards. The
//! external key is the records-system identifier used on the wire; the UUID
//! is the internal handle everything else references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user identity. Owned by the identity feed; read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:   Uuid,
  /// Opaque records-system identifier, unique across subjects.
  pub external_key: String,
  pub created_at:   DateTime<Utc>,
}
