//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings; UUIDs as hyphenated
//! lowercase strings; enums as their lowercase/snake_case discriminants.

use chrono::{DateTime, Utc};
use roster_core::{
  action::{ActionKind, GroupChange, GroupOp, PendingAction},
  container::{Container, ContainerKind},
  membership::{EnrolStatus, EnrolWindow, Membership, Role, RoleAssignment},
  subject::Subject,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_kind(k: ContainerKind) -> &'static str {
  match k {
    ContainerKind::Course => "course",
    ContainerKind::Module => "module",
  }
}

pub fn decode_kind(s: &str) -> Result<ContainerKind> {
  match s {
    "course" => Ok(ContainerKind::Course),
    "module" => Ok(ContainerKind::Module),
    other => Err(Error::Decode(format!("unknown container kind: {other:?}"))),
  }
}

pub fn encode_status(s: EnrolStatus) -> &'static str {
  match s {
    EnrolStatus::Active => "active",
    EnrolStatus::Suspended => "suspended",
  }
}

pub fn decode_status(s: &str) -> Result<EnrolStatus> {
  match s {
    "active" => Ok(EnrolStatus::Active),
    "suspended" => Ok(EnrolStatus::Suspended),
    other => Err(Error::Decode(format!("unknown enrol status: {other:?}"))),
  }
}

pub fn encode_action_kind(k: ActionKind) -> &'static str {
  match k {
    ActionKind::Add => "add",
    ActionKind::Suspend => "suspend",
    ActionKind::Unsuspend => "unsuspend",
    ActionKind::Remove => "remove",
  }
}

pub fn decode_action_kind(s: &str) -> Result<ActionKind> {
  match s {
    "add" => Ok(ActionKind::Add),
    "suspend" => Ok(ActionKind::Suspend),
    "unsuspend" => Ok(ActionKind::Unsuspend),
    "remove" => Ok(ActionKind::Remove),
    other => Err(Error::Decode(format!("unknown action kind: {other:?}"))),
  }
}

pub fn encode_group_op(op: GroupOp) -> &'static str {
  match op {
    GroupOp::Add => "add",
    GroupOp::Remove => "remove",
  }
}

pub fn decode_group_op(s: &str) -> Result<GroupOp> {
  match s {
    "add" => Ok(GroupOp::Add),
    "remove" => Ok(GroupOp::Remove),
    other => Err(Error::Decode(format!("unknown group op: {other:?}"))),
  }
}

// ─── In-transaction decode failures ──────────────────────────────────────────

/// Wrap a decode failure so it can be surfaced from inside a
/// `rusqlite::Result` closure. Most decoding happens outside the closure,
/// but the apply path has to read and interpret rows mid-transaction.
pub fn column_err(message: String) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(
    0,
    rusqlite::types::Type::Text,
    message.into(),
  )
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:   String,
  pub external_key: String,
  pub created_at:   String,
}

impl RawSubject {
  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:   decode_uuid(&self.subject_id)?,
      external_key: self.external_key,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `containers` row.
pub struct RawContainer {
  pub container_id: String,
  pub external_key: String,
  pub kind:         String,
  pub ready:        bool,
  pub created_at:   String,
}

impl RawContainer {
  pub fn into_container(self) -> Result<Container> {
    Ok(Container {
      container_id: decode_uuid(&self.container_id)?,
      external_key: self.external_key,
      kind:         decode_kind(&self.kind)?,
      ready:        self.ready,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `roles` row.
pub struct RawRole {
  pub role_id:   String,
  pub shortname: String,
}

impl RawRole {
  pub fn into_role(self) -> Result<Role> {
    Ok(Role {
      role_id:   decode_uuid(&self.role_id)?,
      shortname: self.shortname,
    })
  }
}

/// Raw strings read directly from a `memberships` row.
pub struct RawMembership {
  pub membership_id: String,
  pub subject_id:    String,
  pub container_id:  String,
  pub source:        String,
  pub status:        String,
  pub window_start:  Option<String>,
  pub window_end:    Option<String>,
  pub created_at:    String,
}

impl RawMembership {
  pub fn into_membership(self) -> Result<Membership> {
    Ok(Membership {
      membership_id: decode_uuid(&self.membership_id)?,
      subject_id:    decode_uuid(&self.subject_id)?,
      container_id:  decode_uuid(&self.container_id)?,
      source:        self.source,
      status:        decode_status(&self.status)?,
      window:        decode_window(
        self.window_start.as_deref(),
        self.window_end.as_deref(),
      )?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `role_assignments` row.
pub struct RawAssignment {
  pub assignment_id: String,
  pub subject_id:    String,
  pub container_id:  String,
  pub role_id:       String,
  pub source:        Option<String>,
}

impl RawAssignment {
  pub fn into_assignment(self) -> Result<RoleAssignment> {
    Ok(RoleAssignment {
      assignment_id: decode_uuid(&self.assignment_id)?,
      subject_id:    decode_uuid(&self.subject_id)?,
      container_id:  decode_uuid(&self.container_id)?,
      role_id:       decode_uuid(&self.role_id)?,
      source:        self.source,
    })
  }
}

/// A `queued_actions` row with its `queued_groups` children, still as raw
/// strings.
pub struct RawPendingAction {
  pub action_id:    i64,
  pub subject_id:   String,
  pub container_id: String,
  pub role_id:      String,
  pub kind:         String,
  pub window_start: Option<String>,
  pub window_end:   Option<String>,
  pub created_at:   String,
  /// (name, op) pairs in queue order.
  pub groups:       Vec<(String, String)>,
}

impl RawPendingAction {
  pub fn into_action(self) -> Result<PendingAction> {
    let groups = self
      .groups
      .into_iter()
      .map(|(name, op)| {
        Ok(GroupChange { name, op: decode_group_op(&op)? })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(PendingAction {
      action_id: self.action_id,
      subject_id: decode_uuid(&self.subject_id)?,
      container_id: decode_uuid(&self.container_id)?,
      role_id: decode_uuid(&self.role_id)?,
      kind: decode_action_kind(&self.kind)?,
      window: decode_window(
        self.window_start.as_deref(),
        self.window_end.as_deref(),
      )?,
      groups,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

// ─── Window ──────────────────────────────────────────────────────────────────

pub fn encode_window(w: EnrolWindow) -> (Option<String>, Option<String>) {
  (w.start.map(encode_dt), w.end.map(encode_dt))
}

pub fn decode_window(
  start: Option<&str>,
  end: Option<&str>,
) -> Result<EnrolWindow> {
  Ok(EnrolWindow {
    start: start.map(decode_dt).transpose()?,
    end:   end.map(decode_dt).transpose()?,
  })
}
