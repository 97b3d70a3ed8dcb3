//! The `RosterStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `roster-store-sqlite`). Higher layers (`roster-api`, `roster-server`)
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

use crate::{
  action::{NewAction, PendingAction},
  container::{Container, ContainerKind},
  membership::{EnrolStatus, EnrolWindow, Membership, Role, RoleAssignment},
  policy::UnenrolPolicy,
  report::{SubmitOutcome, SyncReport},
  source::SourceRegistry,
  subject::Subject,
};

// ─── Engine configuration ────────────────────────────────────────────────────

/// Everything the reconciliation engine needs beyond the backing store:
/// the name it tags its own memberships with, the unenrolment policy
/// matrix, and the registry of sibling sources. Passed explicitly at store
/// construction; no component reads ambient global state.
pub struct EngineConfig {
  /// Source name for memberships and role assignments this engine creates.
  pub source:  String,
  pub policy:  UnenrolPolicy,
  pub sources: SourceRegistry,
}

impl EngineConfig {
  /// A config whose registry contains only the engine's own source, with
  /// full capabilities and the default (unenrol-everything) policy.
  pub fn with_source(source: impl Into<String>) -> Self {
    let source = source.into();
    let mut sources = SourceRegistry::new();
    sources.register(crate::source::SourceCaps {
      can_manage:     true,
      allows_unenrol: true,
      ..crate::source::SourceCaps::new(source.clone())
    });
    Self {
      source,
      policy: UnenrolPolicy::new(),
      sources,
    }
  }
}

// ─── Query and view types ────────────────────────────────────────────────────

/// Parameters for [`RosterStore::list_pending`].
#[derive(Debug, Clone, Default)]
pub struct PendingFilter {
  pub subject_id:   Option<Uuid>,
  pub container_id: Option<Uuid>,
  /// Restrict to actions whose container is currently ready — the batch
  /// pass's working set.
  pub ready_only:   bool,
}

/// Inspection view for one (subject, container) pair: current memberships
/// and role assignments plus whatever is still queued.
#[derive(Debug, Clone, Serialize)]
pub struct EnrolmentInfo {
  pub subject:     Subject,
  pub container:   Container,
  pub memberships: Vec<Membership>,
  pub roles:       Vec<RoleAssignment>,
  pub queued:      Vec<PendingAction>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Roster membership store backend.
///
/// Subjects, containers, and roles are mirrors of externally-owned
/// entities; the mirror-management methods exist for the collaborators
/// that own them (and for tests). The reconciliation methods — `submit`,
/// `run_sync`, `sweep_orphans` — are the core of the engine.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait RosterStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Subject / container / role mirrors ────────────────────────────────

  fn add_subject<'a>(
    &'a self,
    external_key: &'a str,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + 'a;

  fn get_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  fn subject_by_key<'a>(
    &'a self,
    external_key: &'a str,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + 'a;

  /// Remove a subject mirror together with its memberships, role
  /// assignments, and group memberships. Queued actions referencing it are
  /// dropped lazily during the next batch pass.
  fn delete_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_container<'a>(
    &'a self,
    external_key: &'a str,
    kind: ContainerKind,
    ready: bool,
  ) -> impl Future<Output = Result<Container, Self::Error>> + Send + 'a;

  fn get_container(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Container>, Self::Error>> + Send + '_;

  fn container_by_key<'a>(
    &'a self,
    external_key: &'a str,
  ) -> impl Future<Output = Result<Option<Container>, Self::Error>> + Send + 'a;

  /// Flip the externally-managed readiness flag. Owned by the structural
  /// template collaborator, not by the core.
  fn set_container_ready(
    &self,
    id: Uuid,
    ready: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove a container mirror. Queued actions referencing it become
  /// orphans and are collected by [`RosterStore::sweep_orphans`].
  fn delete_container(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_role<'a>(
    &'a self,
    shortname: &'a str,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + 'a;

  fn role_by_shortname<'a>(
    &'a self,
    shortname: &'a str,
  ) -> impl Future<Output = Result<Option<Role>, Self::Error>> + Send + 'a;

  // ── Readiness gate ────────────────────────────────────────────────────

  /// Is the container allowed to receive membership mutations right now?
  /// False when the container does not exist (fail-closed). Reads current
  /// state; never cached.
  fn is_ready(
    &self,
    container_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Membership primitives ─────────────────────────────────────────────

  /// Create a membership row tagged with `source`. Used by sibling
  /// sources and fixtures; the engine's own enrolments go through
  /// [`RosterStore::submit`].
  fn add_membership<'a>(
    &'a self,
    source: &'a str,
    subject_id: Uuid,
    container_id: Uuid,
    status: EnrolStatus,
    window: EnrolWindow,
  ) -> impl Future<Output = Result<Membership, Self::Error>> + Send + 'a;

  /// Grant a role, optionally tagged with the granting source. `None`
  /// records a manual grant.
  fn assign_role<'a>(
    &'a self,
    subject_id: Uuid,
    container_id: Uuid,
    role_id: Uuid,
    source: Option<&'a str>,
  ) -> impl Future<Output = Result<RoleAssignment, Self::Error>> + Send + 'a;

  /// Names of the groups the subject belongs to within the container.
  fn groups_for(
    &self,
    subject_id: Uuid,
    container_id: Uuid,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Ordered action queue ──────────────────────────────────────────────

  /// Count of queued actions for the pair; non-zero blocks immediate
  /// application of any further request for the same pair.
  fn pending_count(
    &self,
    subject_id: Uuid,
    container_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Queued actions in creation order, optionally filtered.
  fn list_pending(
    &self,
    filter: PendingFilter,
  ) -> impl Future<Output = Result<Vec<PendingAction>, Self::Error>> + Send + '_;

  // ── Reconciliation driver ─────────────────────────────────────────────

  /// Apply the request immediately if the container is ready and nothing
  /// is queued for the pair; otherwise enqueue it verbatim.
  ///
  /// Unknown subject/container/role ids and invalid windows are rejected
  /// before any queue or apply decision.
  fn submit(
    &self,
    action: NewAction,
  ) -> impl Future<Output = Result<SubmitOutcome, Self::Error>> + Send + '_;

  /// One batch pass: drain queued actions whose container has become
  /// ready, in creation order, then sweep orphans. Per-item failures are
  /// accumulated in the report and block only later items of the same
  /// (subject, container) pair.
  fn run_sync(
    &self,
  ) -> impl Future<Output = Result<SyncReport, Self::Error>> + Send + '_;

  /// Delete queued actions whose container no longer exists; returns the
  /// number removed.
  fn sweep_orphans(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Inspection ────────────────────────────────────────────────────────

  /// Memberships, role assignments, and queued items for one pair.
  /// `None` when the subject or container does not exist.
  fn enrolments_for(
    &self,
    subject_id: Uuid,
    container_id: Uuid,
  ) -> impl Future<Output = Result<Option<EnrolmentInfo>, Self::Error>> + Send + '_;

  /// Container-wide inspection: one [`EnrolmentInfo`] per subject with any
  /// membership, role assignment, or queued item in the container. `None`
  /// when the container does not exist.
  fn enrolments_in(
    &self,
    container_id: Uuid,
  ) -> impl Future<Output = Result<Option<Vec<EnrolmentInfo>>, Self::Error>> + Send + '_;
}
