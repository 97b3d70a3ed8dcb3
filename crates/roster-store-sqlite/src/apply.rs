//! Synchronous application layer: everything that mutates membership and
//! group state runs here, inside a caller-supplied transaction.
//!
//! The reconciliation driver calls [`apply_action`] both on the immediate
//! path (`submit`) and while draining the queue (`run_sync`); in the latter
//! case the dequeue shares the transaction, so an item is either fully
//! applied and gone or untouched and still queued.

use chrono::Utc;
use roster_core::{
  action::{ActionKind, GroupChange, GroupOp},
  membership::{EnrolStatus, EnrolWindow},
  policy::PolicyAction,
  store::EngineConfig,
};
use rusqlite::{OptionalExtension as _, Transaction, params};
use uuid::Uuid;

use crate::encode::{
  column_err, decode_kind, encode_action_kind, encode_status, encode_uuid,
  encode_window,
};

/// The fields of an action being applied; shared between the immediate
/// path (from a `NewAction`) and queue draining (from a `PendingAction`).
pub(crate) struct ActionInput<'a> {
  pub subject_id:   Uuid,
  pub container_id: Uuid,
  pub role_id:      Uuid,
  pub kind:         ActionKind,
  pub window:       EnrolWindow,
  pub groups:       &'a [GroupChange],
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// Apply one action to the membership store.
pub(crate) fn apply_action(
  tx: &Transaction,
  cfg: &EngineConfig,
  input: &ActionInput,
) -> rusqlite::Result<()> {
  match input.kind {
    ActionKind::Add | ActionKind::Suspend | ActionKind::Unsuspend => {
      apply_enrolment(tx, cfg, input)
    }
    ActionKind::Remove => {
      apply_removal(tx, cfg, input.subject_id, input.container_id, input.role_id)
        .map(|_occurred| ())
    }
  }
}

// ─── Enrolment (add / suspend / unsuspend) ───────────────────────────────────

/// Upsert the engine's own membership row with the requested status and
/// window, ensure the role assignment, then run the group differ.
/// Create-or-update: an existing membership for the pair is updated in
/// place, never duplicated.
fn apply_enrolment(
  tx: &Transaction,
  cfg: &EngineConfig,
  input: &ActionInput,
) -> rusqlite::Result<()> {
  let status = match input.kind {
    ActionKind::Suspend => EnrolStatus::Suspended,
    _ => EnrolStatus::Active,
  };

  let subject = encode_uuid(input.subject_id);
  let container = encode_uuid(input.container_id);
  let (start, end) = encode_window(input.window);

  let existing: Option<String> = tx
    .query_row(
      "SELECT membership_id FROM memberships
       WHERE subject_id = ?1 AND container_id = ?2 AND source = ?3",
      params![subject, container, cfg.source],
      |r| r.get(0),
    )
    .optional()?;

  match existing {
    Some(membership_id) => {
      tx.execute(
        "UPDATE memberships
         SET status = ?2, window_start = ?3, window_end = ?4
         WHERE membership_id = ?1",
        params![membership_id, encode_status(status), start, end],
      )?;
    }
    None => {
      tx.execute(
        "INSERT INTO memberships (
           membership_id, subject_id, container_id, source,
           status, window_start, window_end, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
          encode_uuid(Uuid::new_v4()),
          subject,
          container,
          cfg.source,
          encode_status(status),
          start,
          end,
          crate::encode::encode_dt(Utc::now()),
        ],
      )?;
    }
  }

  ensure_role_assignment(tx, cfg, input.subject_id, input.container_id, input.role_id)?;
  apply_group_changes(tx, input.subject_id, input.container_id, input.groups)
}

/// Record the engine's role assignment for the pair, once.
fn ensure_role_assignment(
  tx: &Transaction,
  cfg: &EngineConfig,
  subject_id: Uuid,
  container_id: Uuid,
  role_id: Uuid,
) -> rusqlite::Result<()> {
  let exists: bool = tx
    .query_row(
      "SELECT 1 FROM role_assignments
       WHERE subject_id = ?1 AND container_id = ?2
         AND role_id = ?3 AND source = ?4",
      params![
        encode_uuid(subject_id),
        encode_uuid(container_id),
        encode_uuid(role_id),
        cfg.source
      ],
      |_| Ok(true),
    )
    .optional()?
    .unwrap_or(false);

  if !exists {
    tx.execute(
      "INSERT INTO role_assignments (
         assignment_id, subject_id, container_id, role_id, source
       ) VALUES (?1, ?2, ?3, ?4, ?5)",
      params![
        encode_uuid(Uuid::new_v4()),
        encode_uuid(subject_id),
        encode_uuid(container_id),
        encode_uuid(role_id),
        cfg.source
      ],
    )?;
  }
  Ok(())
}

// ─── Group differ ────────────────────────────────────────────────────────────

/// Reconcile the requested group changes against current membership, in the
/// caller-specified order. Adds create the group on demand and are no-ops
/// for existing members; removes are no-ops for non-members (and do not
/// create the group). Duplicate group names resolve to the first row by
/// insertion order.
pub(crate) fn apply_group_changes(
  tx: &Transaction,
  subject_id: Uuid,
  container_id: Uuid,
  changes: &[GroupChange],
) -> rusqlite::Result<()> {
  let subject = encode_uuid(subject_id);
  let container = encode_uuid(container_id);

  for change in changes {
    let group_id: Option<String> = tx
      .query_row(
        "SELECT group_id FROM groups
         WHERE container_id = ?1 AND name = ?2
         ORDER BY rowid LIMIT 1",
        params![container, change.name],
        |r| r.get(0),
      )
      .optional()?;

    match change.op {
      GroupOp::Add => {
        let group_id = match group_id {
          Some(id) => id,
          None => {
            let id = encode_uuid(Uuid::new_v4());
            tx.execute(
              "INSERT INTO groups (group_id, container_id, name)
               VALUES (?1, ?2, ?3)",
              params![id, container, change.name],
            )?;
            id
          }
        };
        tx.execute(
          "INSERT OR IGNORE INTO group_members (group_id, subject_id)
           VALUES (?1, ?2)",
          params![group_id, subject],
        )?;
      }
      GroupOp::Remove => {
        if let Some(group_id) = group_id {
          tx.execute(
            "DELETE FROM group_members
             WHERE group_id = ?1 AND subject_id = ?2",
            params![group_id, subject],
          )?;
        }
      }
    }
  }
  Ok(())
}

// ─── Removal (the unenrolment policy machine) ────────────────────────────────

/// Run the policy machine for one removal request. Returns whether an
/// unenrol or suspend-no-roles actually occurred (a plain suspend does not
/// count). Idempotent: re-running against already-suspended or
/// already-removed state changes nothing.
pub(crate) fn apply_removal(
  tx: &Transaction,
  cfg: &EngineConfig,
  subject_id: Uuid,
  container_id: Uuid,
  role_id: Uuid,
) -> rusqlite::Result<bool> {
  let subject = encode_uuid(subject_id);
  let container = encode_uuid(container_id);
  let requested = encode_uuid(role_id);

  let shortname: String = tx.query_row(
    "SELECT shortname FROM roles WHERE role_id = ?1",
    params![requested],
    |r| r.get(0),
  )?;
  let kind_str: String = tx.query_row(
    "SELECT kind FROM containers WHERE container_id = ?1",
    params![container],
    |r| r.get(0),
  )?;
  let kind =
    decode_kind(&kind_str).map_err(|e| column_err(e.to_string()))?;

  let policy = cfg.policy.resolve(&shortname, kind);
  if policy == PolicyAction::Keep {
    return Ok(false);
  }

  // Sources with a membership row for this subject here, visited in
  // registry order. An enrolled source missing from the registry has no
  // declared capabilities and is left alone.
  let enrolled: Vec<String> = {
    let mut stmt = tx.prepare(
      "SELECT DISTINCT source FROM memberships
       WHERE subject_id = ?1 AND container_id = ?2",
    )?;
    let rows = stmt
      .query_map(params![subject, container], |r| r.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    rows
  };

  let mut occurred = false;

  for src in cfg.sources.iter() {
    if !enrolled.iter().any(|s| s == src.name()) {
      continue;
    }

    let component: Vec<String> = {
      let mut stmt = tx.prepare(
        "SELECT role_id FROM role_assignments
         WHERE subject_id = ?1 AND container_id = ?2 AND source = ?3",
      )?;
      stmt
        .query_map(params![subject, container, src.name()], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?
    };
    let manual: Vec<String> = {
      let mut stmt = tx.prepare(
        "SELECT role_id FROM role_assignments
         WHERE subject_id = ?1 AND container_id = ?2 AND source IS NULL",
      )?;
      stmt
        .query_map(params![subject, container], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?
    };
    let total: i64 = tx.query_row(
      "SELECT COUNT(*) FROM role_assignments
       WHERE subject_id = ?1 AND container_id = ?2",
      params![subject, container],
      |r| r.get(0),
    )?;

    // A subject with no role assignments at all gets best-effort cleanup;
    // otherwise only touch a source with a stake in the requested role.
    if total > 0 {
      if !component.is_empty() {
        if !component.contains(&requested) {
          continue;
        }
      } else if !src.protects_roles() && !manual.contains(&requested) {
        // The subject's roles are unrelated manual (or other-source)
        // grants; this source has no reason to act.
        continue;
      }
    }

    match policy {
      PolicyAction::Unenrol if src.allows_unenrol() => {
        tx.execute(
          "DELETE FROM memberships
           WHERE subject_id = ?1 AND container_id = ?2 AND source = ?3",
          params![subject, container, src.name()],
        )?;
        strip_tagged_assignments(tx, &subject, &container, src.name())?;
        occurred = true;
      }
      PolicyAction::SuspendNoRoles if src.can_manage() => {
        suspend_if_active(tx, &subject, &container, src.name())?;
        strip_tagged_assignments(tx, &subject, &container, src.name())?;
        occurred = true;
      }
      PolicyAction::Suspend if src.can_manage() => {
        // Does not count as an unenrolment for the cleanup pass.
        suspend_if_active(tx, &subject, &container, src.name())?;
      }
      _ => {}
    }
  }

  // Nothing owned the removal and no source-tagged roles remain: clear any
  // leftover manual grants so the subject is fully detached.
  if !occurred {
    let tagged: i64 = tx.query_row(
      "SELECT COUNT(*) FROM role_assignments
       WHERE subject_id = ?1 AND container_id = ?2 AND source IS NOT NULL",
      params![subject, container],
      |r| r.get(0),
    )?;
    if tagged == 0 {
      tx.execute(
        "DELETE FROM role_assignments
         WHERE subject_id = ?1 AND container_id = ?2 AND source IS NULL",
        params![subject, container],
      )?;
    }
  }

  Ok(occurred)
}

fn suspend_if_active(
  tx: &Transaction,
  subject: &str,
  container: &str,
  source: &str,
) -> rusqlite::Result<()> {
  tx.execute(
    "UPDATE memberships SET status = 'suspended'
     WHERE subject_id = ?1 AND container_id = ?2 AND source = ?3
       AND status = 'active'",
    params![subject, container, source],
  )?;
  Ok(())
}

fn strip_tagged_assignments(
  tx: &Transaction,
  subject: &str,
  container: &str,
  source: &str,
) -> rusqlite::Result<()> {
  tx.execute(
    "DELETE FROM role_assignments
     WHERE subject_id = ?1 AND container_id = ?2 AND source = ?3",
    params![subject, container, source],
  )?;
  Ok(())
}

// ─── Queue persistence ───────────────────────────────────────────────────────

/// Append an action and its group changes atomically; returns the assigned
/// queue id. No dedup: a second submission for a blocked pair is retained
/// to preserve the pair's causal history.
pub(crate) fn enqueue(
  tx: &Transaction,
  input: &ActionInput,
) -> rusqlite::Result<i64> {
  let (start, end) = encode_window(input.window);
  tx.execute(
    "INSERT INTO queued_actions (
       subject_id, container_id, role_id, kind,
       window_start, window_end, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      encode_uuid(input.subject_id),
      encode_uuid(input.container_id),
      encode_uuid(input.role_id),
      encode_action_kind(input.kind),
      start,
      end,
      crate::encode::encode_dt(Utc::now()),
    ],
  )?;
  let action_id = tx.last_insert_rowid();

  for change in input.groups {
    tx.execute(
      "INSERT INTO queued_groups (action_id, name, op)
       VALUES (?1, ?2, ?3)",
      params![
        action_id,
        change.name,
        crate::encode::encode_group_op(change.op)
      ],
    )?;
  }
  Ok(action_id)
}

/// Delete an applied action and its group changes. A second call for the
/// same id finds nothing and is a no-op, not an error.
pub(crate) fn dequeue(tx: &Transaction, action_id: i64) -> rusqlite::Result<()> {
  // queued_groups rows go with it via ON DELETE CASCADE.
  tx.execute(
    "DELETE FROM queued_actions WHERE action_id = ?1",
    params![action_id],
  )?;
  Ok(())
}
