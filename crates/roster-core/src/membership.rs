//! Membership state: roles, enrolments, role assignments, and groups.
//!
//! A membership row is the (subject, container, source) enrolment with its
//! status and validity window. Role assignments are separate rows so a
//! subject can hold several roles in one container, each granted by a
//! different source — or by no source at all (a manual grant).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Roles ───────────────────────────────────────────────────────────────────

/// A role identifier. The shortname is stable and doubles as the key into
/// the unenrolment policy matrix. Roles are external, read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
  pub role_id:   Uuid,
  pub shortname: String,
}

// ─── Enrolment status and window ─────────────────────────────────────────────

/// Whether an enrolment currently grants access.
///
/// A suspended membership grants no active access, but the role association
/// may persist depending on policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrolStatus {
  Active,
  Suspended,
}

/// Optional validity window for an enrolment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolWindow {
  pub start: Option<DateTime<Utc>>,
  pub end:   Option<DateTime<Utc>>,
}

impl EnrolWindow {
  /// Reject windows whose end precedes their start. Open-ended windows are
  /// always valid.
  pub fn validate(&self) -> Result<()> {
    if let (Some(start), Some(end)) = (self.start, self.end)
      && end < start
    {
      return Err(Error::InvalidWindow { start, end });
    }
    Ok(())
  }
}

// ─── Membership ──────────────────────────────────────────────────────────────

/// A subject's enrolment in a container via one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
  pub membership_id: Uuid,
  pub subject_id:    Uuid,
  pub container_id:  Uuid,
  /// The enrolment source that owns this row. A source only mutates
  /// memberships it created itself.
  pub source:        String,
  pub status:        EnrolStatus,
  pub window:        EnrolWindow,
  pub created_at:    DateTime<Utc>,
}

/// A role held by a subject in a container. `source` is `None` for manual
/// grants; tagged assignments belong to the named source exclusively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
  pub assignment_id: Uuid,
  pub subject_id:    Uuid,
  pub container_id:  Uuid,
  pub role_id:       Uuid,
  pub source:        Option<String>,
}

// ─── Groups ──────────────────────────────────────────────────────────────────

/// A named group within a container, created on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
  pub group_id:     Uuid,
  pub container_id: Uuid,
  pub name:         String,
}
