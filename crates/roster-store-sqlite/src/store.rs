//! [`SqliteStore`] — the SQLite implementation of [`RosterStore`],
//! including the reconciliation driver.

use std::{collections::HashSet, path::Path, sync::Arc};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params};
use uuid::Uuid;

use roster_core::{
  action::{NewAction, PendingAction},
  container::{Container, ContainerKind},
  membership::{EnrolStatus, EnrolWindow, Membership, Role, RoleAssignment},
  report::{SubmitOutcome, SyncFailure, SyncReport},
  store::{EngineConfig, EnrolmentInfo, PendingFilter, RosterStore},
  subject::Subject,
};

use crate::{
  Error, Result,
  apply::{self, ActionInput},
  encode::{
    RawAssignment, RawContainer, RawMembership, RawPendingAction, RawRole,
    RawSubject, encode_dt, encode_kind, encode_uuid, encode_window,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Roster membership store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All
/// access is serialised on the connection's worker thread, which is what
/// makes the single-pass queue draining safe without explicit locks.
#[derive(Clone)]
pub struct SqliteStore {
  conn:      tokio_rusqlite::Connection,
  cfg:       Arc<EngineConfig>,
  /// At most one batch pass runs at a time; `submit` is not gated.
  sync_gate: Arc<tokio::sync::Mutex<()>>,
}

/// What the submit closure decided; domain errors are mapped outside the
/// closure where the richer error type is available.
enum SubmitStep {
  Applied,
  Queued,
  MissingSubject,
  MissingContainer,
  MissingRole,
}

/// Per-item outcome of the batch pass.
enum ItemStep {
  Applied,
  DroppedSubject,
  /// Container gone; left queued for the orphan sweeper.
  Orphaned,
  /// Container flipped back to not-ready between listing and applying.
  NotReady,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(
    path: impl AsRef<Path>,
    cfg: EngineConfig,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self {
      conn,
      cfg: Arc::new(cfg),
      sync_gate: Arc::new(tokio::sync::Mutex::new(())),
    };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory(cfg: EngineConfig) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self {
      conn,
      cfg: Arc::new(cfg),
      sync_gate: Arc::new(tokio::sync::Mutex::new(())),
    };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The source name this engine tags its own rows with.
  pub fn source(&self) -> &str { &self.cfg.source }
}

// ─── RosterStore impl ────────────────────────────────────────────────────────

impl RosterStore for SqliteStore {
  type Error = Error;

  // ── Subject / container / role mirrors ────────────────────────────────

  async fn add_subject(&self, external_key: &str) -> Result<Subject> {
    let subject = Subject {
      subject_id:   Uuid::new_v4(),
      external_key: external_key.to_owned(),
      created_at:   Utc::now(),
    };

    let id_str = encode_uuid(subject.subject_id);
    let key = subject.external_key.clone();
    let at_str = encode_dt(subject.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (subject_id, external_key, created_at)
           VALUES (?1, ?2, ?3)",
          params![id_str, key, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(subject)
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT subject_id, external_key, created_at
               FROM subjects WHERE subject_id = ?1",
              params![id_str],
              |row| {
                Ok(RawSubject {
                  subject_id:   row.get(0)?,
                  external_key: row.get(1)?,
                  created_at:   row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn subject_by_key(&self, external_key: &str) -> Result<Option<Subject>> {
    let key = external_key.to_owned();
    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT subject_id, external_key, created_at
               FROM subjects WHERE external_key = ?1",
              params![key],
              |row| {
                Ok(RawSubject {
                  subject_id:   row.get(0)?,
                  external_key: row.get(1)?,
                  created_at:   row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn delete_subject(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| {
        // group_members carries no subject FK; clear it by hand.
        conn.execute(
          "DELETE FROM group_members WHERE subject_id = ?1",
          params![id_str],
        )?;
        conn.execute(
          "DELETE FROM subjects WHERE subject_id = ?1",
          params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn add_container(
    &self,
    external_key: &str,
    kind: ContainerKind,
    ready: bool,
  ) -> Result<Container> {
    let container = Container {
      container_id: Uuid::new_v4(),
      external_key: external_key.to_owned(),
      kind,
      ready,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(container.container_id);
    let key = container.external_key.clone();
    let kind_str = encode_kind(kind).to_owned();
    let at_str = encode_dt(container.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO containers (
             container_id, external_key, kind, ready, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5)",
          params![id_str, key, kind_str, ready, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(container)
  }

  async fn get_container(&self, id: Uuid) -> Result<Option<Container>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawContainer> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT container_id, external_key, kind, ready, created_at
               FROM containers WHERE container_id = ?1",
              params![id_str],
              |row| {
                Ok(RawContainer {
                  container_id: row.get(0)?,
                  external_key: row.get(1)?,
                  kind:         row.get(2)?,
                  ready:        row.get(3)?,
                  created_at:   row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContainer::into_container).transpose()
  }

  async fn container_by_key(
    &self,
    external_key: &str,
  ) -> Result<Option<Container>> {
    let key = external_key.to_owned();
    let raw: Option<RawContainer> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT container_id, external_key, kind, ready, created_at
               FROM containers WHERE external_key = ?1",
              params![key],
              |row| {
                Ok(RawContainer {
                  container_id: row.get(0)?,
                  external_key: row.get(1)?,
                  kind:         row.get(2)?,
                  ready:        row.get(3)?,
                  created_at:   row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContainer::into_container).transpose()
  }

  async fn set_container_ready(&self, id: Uuid, ready: bool) -> Result<()> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE containers SET ready = ?2 WHERE container_id = ?1",
          params![id_str, ready],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_container(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| {
        // Memberships, assignments, and groups cascade; queued actions
        // intentionally survive as orphans for the sweeper.
        conn.execute(
          "DELETE FROM containers WHERE container_id = ?1",
          params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn add_role(&self, shortname: &str) -> Result<Role> {
    let role = Role {
      role_id:   Uuid::new_v4(),
      shortname: shortname.to_owned(),
    };
    let id_str = encode_uuid(role.role_id);
    let name = role.shortname.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO roles (role_id, shortname) VALUES (?1, ?2)",
          params![id_str, name],
        )?;
        Ok(())
      })
      .await?;

    Ok(role)
  }

  async fn role_by_shortname(&self, shortname: &str) -> Result<Option<Role>> {
    let name = shortname.to_owned();
    let raw: Option<RawRole> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT role_id, shortname FROM roles WHERE shortname = ?1",
              params![name],
              |row| {
                Ok(RawRole {
                  role_id:   row.get(0)?,
                  shortname: row.get(1)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRole::into_role).transpose()
  }

  // ── Readiness gate ────────────────────────────────────────────────────

  async fn is_ready(&self, container_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(container_id);
    let ready: bool = self
      .conn
      .call(move |conn| {
        // Missing container reads as not-ready (fail-closed).
        Ok(
          conn
            .query_row(
              "SELECT ready FROM containers WHERE container_id = ?1",
              params![id_str],
              |r| r.get(0),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(ready)
  }

  // ── Membership primitives ─────────────────────────────────────────────

  async fn add_membership(
    &self,
    source: &str,
    subject_id: Uuid,
    container_id: Uuid,
    status: EnrolStatus,
    window: EnrolWindow,
  ) -> Result<Membership> {
    window.validate().map_err(Error::Core)?;

    let membership = Membership {
      membership_id: Uuid::new_v4(),
      subject_id,
      container_id,
      source: source.to_owned(),
      status,
      window,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(membership.membership_id);
    let subject_str = encode_uuid(subject_id);
    let container_str = encode_uuid(container_id);
    let source_str = membership.source.clone();
    let status_str = crate::encode::encode_status(status).to_owned();
    let (start, end) = encode_window(window);
    let at_str = encode_dt(membership.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO memberships (
             membership_id, subject_id, container_id, source,
             status, window_start, window_end, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![
            id_str, subject_str, container_str, source_str, status_str,
            start, end, at_str
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(membership)
  }

  async fn assign_role(
    &self,
    subject_id: Uuid,
    container_id: Uuid,
    role_id: Uuid,
    source: Option<&str>,
  ) -> Result<RoleAssignment> {
    let assignment = RoleAssignment {
      assignment_id: Uuid::new_v4(),
      subject_id,
      container_id,
      role_id,
      source: source.map(str::to_owned),
    };

    let id_str = encode_uuid(assignment.assignment_id);
    let subject_str = encode_uuid(subject_id);
    let container_str = encode_uuid(container_id);
    let role_str = encode_uuid(role_id);
    let source_str = assignment.source.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO role_assignments (
             assignment_id, subject_id, container_id, role_id, source
           ) VALUES (?1, ?2, ?3, ?4, ?5)",
          params![id_str, subject_str, container_str, role_str, source_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(assignment)
  }

  async fn groups_for(
    &self,
    subject_id: Uuid,
    container_id: Uuid,
  ) -> Result<Vec<String>> {
    let subject_str = encode_uuid(subject_id);
    let container_str = encode_uuid(container_id);

    let names: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT g.name FROM groups g
           JOIN group_members gm ON gm.group_id = g.group_id
           WHERE g.container_id = ?1 AND gm.subject_id = ?2
           ORDER BY g.rowid",
        )?;
        let rows = stmt
          .query_map(params![container_str, subject_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(names)
  }

  // ── Ordered action queue ──────────────────────────────────────────────

  async fn pending_count(
    &self,
    subject_id: Uuid,
    container_id: Uuid,
  ) -> Result<u64> {
    let subject_str = encode_uuid(subject_id);
    let container_str = encode_uuid(container_id);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM queued_actions
           WHERE subject_id = ?1 AND container_id = ?2",
          params![subject_str, container_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count as u64)
  }

  async fn list_pending(
    &self,
    filter: PendingFilter,
  ) -> Result<Vec<PendingAction>> {
    let subject_str = filter.subject_id.map(encode_uuid);
    let container_str = filter.container_id.map(encode_uuid);
    let ready_only = filter.ready_only;

    let raws: Vec<RawPendingAction> = self
      .conn
      .call(move |conn| {
        // NULL filter parameters match everything, so the statement shape
        // is fixed regardless of which filters are set.
        let (join, ready_cond) = if ready_only {
          (
            "JOIN containers c ON c.container_id = q.container_id",
            "AND c.ready = 1",
          )
        } else {
          ("", "")
        };

        let sql = format!(
          "SELECT q.action_id, q.subject_id, q.container_id, q.role_id,
                  q.kind, q.window_start, q.window_end, q.created_at
           FROM queued_actions q
           {join}
           WHERE (?1 IS NULL OR q.subject_id = ?1)
             AND (?2 IS NULL OR q.container_id = ?2)
             {ready_cond}
           ORDER BY q.action_id"
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut actions = stmt
          .query_map(
            params![subject_str.as_deref(), container_str.as_deref()],
            |row| {
              Ok(RawPendingAction {
                action_id:    row.get(0)?,
                subject_id:   row.get(1)?,
                container_id: row.get(2)?,
                role_id:      row.get(3)?,
                kind:         row.get(4)?,
                window_start: row.get(5)?,
                window_end:   row.get(6)?,
                created_at:   row.get(7)?,
                groups:       vec![],
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut group_stmt = conn.prepare(
          "SELECT name, op FROM queued_groups
           WHERE action_id = ?1 ORDER BY id",
        )?;
        for action in &mut actions {
          action.groups = group_stmt
            .query_map(params![action.action_id], |r| {
              Ok((r.get(0)?, r.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        }

        Ok(actions)
      })
      .await?;

    raws.into_iter().map(RawPendingAction::into_action).collect()
  }

  // ── Reconciliation driver ─────────────────────────────────────────────

  async fn submit(&self, action: NewAction) -> Result<SubmitOutcome> {
    action.window.validate().map_err(Error::Core)?;

    let cfg = self.cfg.clone();
    let NewAction {
      subject_id,
      container_id,
      role_id,
      kind,
      window,
      groups,
    } = action;

    let step: SubmitStep = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let subject_str = encode_uuid(subject_id);
        let container_str = encode_uuid(container_id);
        let role_str = encode_uuid(role_id);

        let subject_exists: bool = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE subject_id = ?1",
            params![subject_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !subject_exists {
          return Ok(SubmitStep::MissingSubject);
        }

        let ready: Option<bool> = tx
          .query_row(
            "SELECT ready FROM containers WHERE container_id = ?1",
            params![container_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(ready) = ready else {
          return Ok(SubmitStep::MissingContainer);
        };

        let role_exists: bool = tx
          .query_row(
            "SELECT 1 FROM roles WHERE role_id = ?1",
            params![role_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !role_exists {
          return Ok(SubmitStep::MissingRole);
        }

        let pending: i64 = tx.query_row(
          "SELECT COUNT(*) FROM queued_actions
           WHERE subject_id = ?1 AND container_id = ?2",
          params![subject_str, container_str],
          |r| r.get(0),
        )?;

        let input = ActionInput {
          subject_id,
          container_id,
          role_id,
          kind,
          window,
          groups: &groups,
        };

        // The crux: anything queued for the pair forces this request to
        // queue too, so replay order matches submission order.
        if !ready || pending > 0 {
          apply::enqueue(&tx, &input)?;
          tx.commit()?;
          return Ok(SubmitStep::Queued);
        }

        apply::apply_action(&tx, &cfg, &input)?;
        tx.commit()?;
        Ok(SubmitStep::Applied)
      })
      .await?;

    match step {
      SubmitStep::Applied => Ok(SubmitOutcome::Applied),
      SubmitStep::Queued => Ok(SubmitOutcome::Queued),
      SubmitStep::MissingSubject => {
        Err(Error::Core(roster_core::Error::SubjectNotFound(subject_id)))
      }
      SubmitStep::MissingContainer => Err(Error::Core(
        roster_core::Error::ContainerNotFound(container_id),
      )),
      SubmitStep::MissingRole => {
        Err(Error::Core(roster_core::Error::RoleNotFound(role_id)))
      }
    }
  }

  async fn run_sync(&self) -> Result<SyncReport> {
    // Overlapping passes (interval task + on-demand trigger) would drain
    // the same items; hold the second until the first finishes.
    let _pass = self.sync_gate.lock().await;

    let items = self
      .list_pending(PendingFilter { ready_only: true, ..Default::default() })
      .await?;

    let mut report = SyncReport::default();
    // A failed (or stalled) pair blocks its later items for this pass;
    // other pairs keep draining.
    let mut blocked: HashSet<(Uuid, Uuid)> = HashSet::new();

    for item in items {
      let pair = (item.subject_id, item.container_id);
      if blocked.contains(&pair) {
        continue;
      }

      let cfg = self.cfg.clone();
      let action = item.clone();
      let step = self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;

          let subject_str = encode_uuid(action.subject_id);
          let container_str = encode_uuid(action.container_id);

          let subject_exists: bool = tx
            .query_row(
              "SELECT 1 FROM subjects WHERE subject_id = ?1",
              params![subject_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
          if !subject_exists {
            // Never applicable again; drop it.
            apply::dequeue(&tx, action.action_id)?;
            tx.commit()?;
            return Ok(ItemStep::DroppedSubject);
          }

          let ready: Option<bool> = tx
            .query_row(
              "SELECT ready FROM containers WHERE container_id = ?1",
              params![container_str],
              |r| r.get(0),
            )
            .optional()?;
          let ready = match ready {
            None => return Ok(ItemStep::Orphaned),
            Some(r) => r,
          };
          if !ready {
            return Ok(ItemStep::NotReady);
          }

          let input = ActionInput {
            subject_id:   action.subject_id,
            container_id: action.container_id,
            role_id:      action.role_id,
            kind:         action.kind,
            window:       action.window,
            groups:       &action.groups,
          };

          // Apply and dequeue are one atomic unit: a crash in between
          // rolls both back, and the next pass simply retries.
          apply::apply_action(&tx, &cfg, &input)?;
          apply::dequeue(&tx, action.action_id)?;
          tx.commit()?;
          Ok(ItemStep::Applied)
        })
        .await;

      match step {
        Ok(ItemStep::Applied) => report.applied.push(item.action_id),
        Ok(ItemStep::DroppedSubject) => report.dropped.push(item.action_id),
        Ok(ItemStep::Orphaned) | Ok(ItemStep::NotReady) => {
          blocked.insert(pair);
        }
        Err(e) => {
          report.deferred.push(SyncFailure {
            action_id: item.action_id,
            message:   e.to_string(),
          });
          blocked.insert(pair);
        }
      }
    }

    // Newly orphaned actions from mid-pass deletions are caught on the
    // next cycle; this sweep handles everything orphaned so far.
    report.orphans_removed = self.sweep_orphans().await?;

    Ok(report)
  }

  async fn sweep_orphans(&self) -> Result<usize> {
    let removed: usize = self
      .conn
      .call(|conn| {
        let n = conn.execute(
          "DELETE FROM queued_actions
           WHERE container_id NOT IN
             (SELECT container_id FROM containers)",
          [],
        )?;
        Ok(n)
      })
      .await?;
    Ok(removed)
  }

  // ── Inspection ────────────────────────────────────────────────────────

  async fn enrolments_for(
    &self,
    subject_id: Uuid,
    container_id: Uuid,
  ) -> Result<Option<EnrolmentInfo>> {
    let Some(subject) = self.get_subject(subject_id).await? else {
      return Ok(None);
    };
    let Some(container) = self.get_container(container_id).await? else {
      return Ok(None);
    };

    let subject_str = encode_uuid(subject_id);
    let container_str = encode_uuid(container_id);

    let (raw_memberships, raw_assignments) = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT membership_id, subject_id, container_id, source,
                  status, window_start, window_end, created_at
           FROM memberships
           WHERE subject_id = ?1 AND container_id = ?2
           ORDER BY rowid",
        )?;
        let memberships = stmt
          .query_map(params![subject_str, container_str], |row| {
            Ok(RawMembership {
              membership_id: row.get(0)?,
              subject_id:    row.get(1)?,
              container_id:  row.get(2)?,
              source:        row.get(3)?,
              status:        row.get(4)?,
              window_start:  row.get(5)?,
              window_end:    row.get(6)?,
              created_at:    row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT assignment_id, subject_id, container_id, role_id, source
           FROM role_assignments
           WHERE subject_id = ?1 AND container_id = ?2
           ORDER BY rowid",
        )?;
        let assignments = stmt
          .query_map(params![subject_str, container_str], |row| {
            Ok(RawAssignment {
              assignment_id: row.get(0)?,
              subject_id:    row.get(1)?,
              container_id:  row.get(2)?,
              role_id:       row.get(3)?,
              source:        row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((memberships, assignments))
      })
      .await?;

    let memberships = raw_memberships
      .into_iter()
      .map(RawMembership::into_membership)
      .collect::<Result<Vec<_>>>()?;
    let roles = raw_assignments
      .into_iter()
      .map(RawAssignment::into_assignment)
      .collect::<Result<Vec<_>>>()?;

    let queued = self
      .list_pending(PendingFilter {
        subject_id:   Some(subject_id),
        container_id: Some(container_id),
        ..Default::default()
      })
      .await?;

    Ok(Some(EnrolmentInfo {
      subject,
      container,
      memberships,
      roles,
      queued,
    }))
  }

  async fn enrolments_in(
    &self,
    container_id: Uuid,
  ) -> Result<Option<Vec<EnrolmentInfo>>> {
    if self.get_container(container_id).await?.is_none() {
      return Ok(None);
    }

    let container_str = encode_uuid(container_id);
    let subject_strs: Vec<String> = self
      .conn
      .call(move |conn| {
        // Queued actions count even when nothing is applied yet; queued
        // subjects that have since been deleted fall out below.
        let mut stmt = conn.prepare(
          "SELECT subject_id FROM memberships WHERE container_id = ?1
           UNION
           SELECT subject_id FROM role_assignments WHERE container_id = ?1
           UNION
           SELECT subject_id FROM queued_actions WHERE container_id = ?1
           ORDER BY 1",
        )?;
        let rows = stmt
          .query_map(params![container_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    let mut infos = Vec::with_capacity(subject_strs.len());
    for subject_str in subject_strs {
      let subject_id = crate::encode::decode_uuid(&subject_str)?;
      if let Some(info) =
        self.enrolments_for(subject_id, container_id).await?
      {
        infos.push(info);
      }
    }
    Ok(Some(infos))
  }
}
