//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use roster_core::{
  action::{ActionKind, GroupChange, NewAction},
  container::{Container, ContainerKind},
  membership::{EnrolStatus, EnrolWindow, Role},
  policy::PolicyAction,
  report::SubmitOutcome,
  source::SourceCaps,
  store::{EngineConfig, PendingFilter, RosterStore},
  subject::Subject,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory(EngineConfig::with_source("records"))
    .await
    .expect("in-memory store")
}

async fn store_with(cfg: EngineConfig) -> SqliteStore {
  SqliteStore::open_in_memory(cfg).await.expect("in-memory store")
}

struct Fixture {
  subject:   Subject,
  container: Container,
  role:      Role,
}

async fn fixture(s: &SqliteStore, ready: bool) -> Fixture {
  let subject = s.add_subject("s-1001").await.unwrap();
  let container = s
    .add_container("COURSE-101", ContainerKind::Course, ready)
    .await
    .unwrap();
  let role = s.add_role("student").await.unwrap();
  Fixture { subject, container, role }
}

// ─── Mirrors ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_subject() {
  let s = store().await;

  let subject = s.add_subject("s-42").await.unwrap();
  let fetched = s.get_subject(subject.subject_id).await.unwrap().unwrap();
  assert_eq!(fetched.subject_id, subject.subject_id);
  assert_eq!(fetched.external_key, "s-42");

  let by_key = s.subject_by_key("s-42").await.unwrap().unwrap();
  assert_eq!(by_key.subject_id, subject.subject_id);
}

#[tokio::test]
async fn get_subject_missing_returns_none() {
  let s = store().await;
  assert!(s.get_subject(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.subject_by_key("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn container_round_trip_and_ready_flag() {
  let s = store().await;

  let c = s
    .add_container("MOD-7", ContainerKind::Module, false)
    .await
    .unwrap();
  let fetched = s.get_container(c.container_id).await.unwrap().unwrap();
  assert_eq!(fetched.kind, ContainerKind::Module);
  assert!(!fetched.ready);

  s.set_container_ready(c.container_id, true).await.unwrap();
  assert!(s.is_ready(c.container_id).await.unwrap());

  let by_key = s.container_by_key("MOD-7").await.unwrap().unwrap();
  assert!(by_key.ready);
}

#[tokio::test]
async fn is_ready_false_for_missing_container() {
  let s = store().await;
  assert!(!s.is_ready(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn role_round_trip() {
  let s = store().await;
  let role = s.add_role("teacher").await.unwrap();
  let fetched = s.role_by_shortname("teacher").await.unwrap().unwrap();
  assert_eq!(fetched.role_id, role.role_id);
  assert!(s.role_by_shortname("nosuch").await.unwrap().is_none());
}

// ─── Submit: immediate application ───────────────────────────────────────────

#[tokio::test]
async fn submit_applies_when_ready_and_nothing_pending() {
  let s = store().await;
  let f = fixture(&s, true).await;

  let outcome = s
    .submit(NewAction::new(
      f.subject.subject_id,
      f.container.container_id,
      f.role.role_id,
      ActionKind::Add,
    ))
    .await
    .unwrap();
  assert_eq!(outcome, SubmitOutcome::Applied);

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(info.memberships.len(), 1);
  assert_eq!(info.memberships[0].source, "records");
  assert_eq!(info.memberships[0].status, EnrolStatus::Active);
  assert_eq!(info.roles.len(), 1);
  assert_eq!(info.roles[0].source.as_deref(), Some("records"));
  assert!(info.queued.is_empty());
}

#[tokio::test]
async fn submit_add_is_idempotent_for_the_pair() {
  let s = store().await;
  let f = fixture(&s, true).await;

  let action = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  s.submit(action.clone()).await.unwrap();
  s.submit(action).await.unwrap();

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(info.memberships.len(), 1);
  assert_eq!(info.roles.len(), 1);
}

#[tokio::test]
async fn submit_rejects_unknown_ids() {
  let s = store().await;
  let f = fixture(&s, true).await;

  let err = s
    .submit(NewAction::new(
      Uuid::new_v4(),
      f.container.container_id,
      f.role.role_id,
      ActionKind::Add,
    ))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(roster_core::Error::SubjectNotFound(_))
  ));

  let err = s
    .submit(NewAction::new(
      f.subject.subject_id,
      Uuid::new_v4(),
      f.role.role_id,
      ActionKind::Add,
    ))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(roster_core::Error::ContainerNotFound(_))
  ));

  let err = s
    .submit(NewAction::new(
      f.subject.subject_id,
      f.container.container_id,
      Uuid::new_v4(),
      ActionKind::Add,
    ))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(roster_core::Error::RoleNotFound(_))
  ));
}

#[tokio::test]
async fn submit_rejects_inverted_window() {
  let s = store().await;
  let f = fixture(&s, true).await;

  let now = Utc::now();
  let mut action = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  action.window = EnrolWindow {
    start: Some(now),
    end:   Some(now - Duration::days(1)),
  };

  let err = s.submit(action).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(roster_core::Error::InvalidWindow { .. })
  ));
  assert!(
    s.list_pending(PendingFilter::default()).await.unwrap().is_empty(),
    "rejected actions must not be queued"
  );
}

// ─── Submit: queueing ────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_queues_when_container_not_ready() {
  let s = store().await;
  let f = fixture(&s, false).await;

  let outcome = s
    .submit(NewAction::new(
      f.subject.subject_id,
      f.container.container_id,
      f.role.role_id,
      ActionKind::Add,
    ))
    .await
    .unwrap();
  assert_eq!(outcome, SubmitOutcome::Queued);

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert!(info.memberships.is_empty());
  assert_eq!(info.queued.len(), 1);
  assert_eq!(info.queued[0].kind, ActionKind::Add);
}

#[tokio::test]
async fn submit_queues_behind_pending_even_when_ready() {
  let s = store().await;
  let f = fixture(&s, false).await;

  let action = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  s.submit(action.clone()).await.unwrap();

  // Readiness alone is not enough; the queued item blocks the pair.
  s.set_container_ready(f.container.container_id, true).await.unwrap();
  let mut suspend = action;
  suspend.kind = ActionKind::Suspend;
  let outcome = s.submit(suspend).await.unwrap();
  assert_eq!(outcome, SubmitOutcome::Queued);

  assert_eq!(
    s.pending_count(f.subject.subject_id, f.container.container_id)
      .await
      .unwrap(),
    2
  );
}

#[tokio::test]
async fn pending_list_preserves_creation_order() {
  let s = store().await;
  let f = fixture(&s, false).await;

  for kind in [ActionKind::Add, ActionKind::Suspend, ActionKind::Unsuspend] {
    s.submit(NewAction::new(
      f.subject.subject_id,
      f.container.container_id,
      f.role.role_id,
      kind,
    ))
    .await
    .unwrap();
  }

  let pending = s.list_pending(PendingFilter::default()).await.unwrap();
  let kinds: Vec<_> = pending.iter().map(|p| p.kind).collect();
  assert_eq!(
    kinds,
    vec![ActionKind::Add, ActionKind::Suspend, ActionKind::Unsuspend]
  );
  assert!(pending.windows(2).all(|w| w[0].action_id < w[1].action_id));
}

#[tokio::test]
async fn list_pending_ready_only_filters_gated_containers() {
  let s = store().await;
  let f = fixture(&s, false).await;
  let gated = s
    .add_container("COURSE-102", ContainerKind::Course, false)
    .await
    .unwrap();

  let mut a = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  s.submit(a.clone()).await.unwrap();
  a.container_id = gated.container_id;
  s.submit(a).await.unwrap();

  s.set_container_ready(f.container.container_id, true).await.unwrap();

  let all = s.list_pending(PendingFilter::default()).await.unwrap();
  assert_eq!(all.len(), 2);

  let ready = s
    .list_pending(PendingFilter { ready_only: true, ..Default::default() })
    .await
    .unwrap();
  assert_eq!(ready.len(), 1);
  assert_eq!(ready[0].container_id, f.container.container_id);
}

// ─── Batch pass ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn run_sync_replays_in_creation_order() {
  let s = store().await;
  let f = fixture(&s, false).await;

  let base = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  s.submit(base.clone()).await.unwrap();
  let mut suspend = base;
  suspend.kind = ActionKind::Suspend;
  s.submit(suspend).await.unwrap();

  s.set_container_ready(f.container.container_id, true).await.unwrap();
  let report = s.run_sync().await.unwrap();
  assert!(report.is_clean());
  assert_eq!(report.applied.len(), 2);
  assert!(report.applied[0] < report.applied[1]);

  // Add then suspend nets out to a suspended membership.
  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(info.memberships.len(), 1);
  assert_eq!(info.memberships[0].status, EnrolStatus::Suspended);
  assert!(info.queued.is_empty());
}

#[tokio::test]
async fn run_sync_suspend_then_unsuspend_ends_active() {
  let s = store().await;
  let f = fixture(&s, false).await;

  let base = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  s.submit(base.clone()).await.unwrap();
  let mut suspend = base.clone();
  suspend.kind = ActionKind::Suspend;
  s.submit(suspend).await.unwrap();
  let mut unsuspend = base;
  unsuspend.kind = ActionKind::Unsuspend;
  s.submit(unsuspend).await.unwrap();

  s.set_container_ready(f.container.container_id, true).await.unwrap();
  let report = s.run_sync().await.unwrap();
  assert_eq!(report.applied.len(), 3);

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(info.memberships[0].status, EnrolStatus::Active);
}

#[tokio::test]
async fn run_sync_skips_not_ready_containers() {
  let s = store().await;
  let f = fixture(&s, false).await;

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  ))
  .await
  .unwrap();

  let report = s.run_sync().await.unwrap();
  assert!(report.applied.is_empty());
  assert_eq!(
    s.pending_count(f.subject.subject_id, f.container.container_id)
      .await
      .unwrap(),
    1
  );
}

#[tokio::test]
async fn run_sync_drops_actions_for_deleted_subjects() {
  let s = store().await;
  let f = fixture(&s, false).await;

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  ))
  .await
  .unwrap();

  s.delete_subject(f.subject.subject_id).await.unwrap();
  s.set_container_ready(f.container.container_id, true).await.unwrap();

  let report = s.run_sync().await.unwrap();
  assert!(report.applied.is_empty());
  assert_eq!(report.dropped.len(), 1);
  assert!(s.list_pending(PendingFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn run_sync_only_blocks_the_failing_pair() {
  let s = store().await;
  let f = fixture(&s, false).await;
  let other = s.add_subject("s-1002").await.unwrap();

  // First subject's action will be dropped (subject deleted); the other
  // subject's action for the same container still applies.
  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  ))
  .await
  .unwrap();
  s.submit(NewAction::new(
    other.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  ))
  .await
  .unwrap();

  s.delete_subject(f.subject.subject_id).await.unwrap();
  s.set_container_ready(f.container.container_id, true).await.unwrap();

  let report = s.run_sync().await.unwrap();
  assert_eq!(report.dropped.len(), 1);
  assert_eq!(report.applied.len(), 1);

  let info = s
    .enrolments_for(other.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(info.memberships.len(), 1);
}

#[tokio::test]
async fn concurrent_batch_passes_apply_each_action_once() {
  let s = store().await;
  let f = fixture(&s, false).await;
  let other = s.add_subject("s-1002").await.unwrap();

  for subject_id in [f.subject.subject_id, other.subject_id] {
    s.submit(NewAction::new(
      subject_id,
      f.container.container_id,
      f.role.role_id,
      ActionKind::Add,
    ))
    .await
    .unwrap();
  }
  s.set_container_ready(f.container.container_id, true).await.unwrap();

  // Passes serialise: one drains the queue, the other finds it empty.
  let (first, second) = tokio::join!(s.run_sync(), s.run_sync());
  let first = first.unwrap();
  let second = second.unwrap();

  assert!(first.is_clean() && second.is_clean());
  assert_eq!(first.applied.len() + second.applied.len(), 2);
  assert!(first.applied.iter().all(|id| !second.applied.contains(id)));
  assert!(s.list_pending(PendingFilter::default()).await.unwrap().is_empty());
}

// ─── Orphan sweeper ──────────────────────────────────────────────────────────

#[tokio::test]
async fn sweep_removes_actions_for_deleted_containers() {
  let s = store().await;
  let f = fixture(&s, false).await;

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  ))
  .await
  .unwrap();
  s.delete_container(f.container.container_id).await.unwrap();

  let removed = s.sweep_orphans().await.unwrap();
  assert_eq!(removed, 1);
  assert!(s.list_pending(PendingFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn run_sync_reports_swept_orphans() {
  let s = store().await;
  let f = fixture(&s, false).await;

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  ))
  .await
  .unwrap();
  s.delete_container(f.container.container_id).await.unwrap();

  let report = s.run_sync().await.unwrap();
  assert_eq!(report.orphans_removed, 1);
}

// ─── Group differ ────────────────────────────────────────────────────────────

#[tokio::test]
async fn group_add_is_idempotent() {
  let s = store().await;
  let f = fixture(&s, true).await;

  let mut action = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  action.groups = vec![GroupChange::add("Group A")];
  s.submit(action.clone()).await.unwrap();
  s.submit(action).await.unwrap();

  let groups = s
    .groups_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap();
  assert_eq!(groups, vec!["Group A".to_owned()]);
}

#[tokio::test]
async fn group_remove_of_non_member_is_a_noop() {
  let s = store().await;
  let f = fixture(&s, true).await;

  let mut action = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  action.groups = vec![GroupChange::remove("Phantom")];
  s.submit(action).await.unwrap();

  let groups = s
    .groups_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap();
  assert!(groups.is_empty());
}

#[tokio::test]
async fn queued_group_changes_replay_in_order() {
  let s = store().await;
  let f = fixture(&s, false).await;

  let mut first = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  first.groups = vec![GroupChange::add("Group A")];
  s.submit(first).await.unwrap();

  let mut second = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  second.groups =
    vec![GroupChange::remove("Group A"), GroupChange::add("Group B")];
  s.submit(second).await.unwrap();

  s.set_container_ready(f.container.container_id, true).await.unwrap();
  let report = s.run_sync().await.unwrap();
  assert!(report.is_clean());

  let groups = s
    .groups_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap();
  assert_eq!(groups, vec!["Group B".to_owned()]);
}

#[tokio::test]
async fn add_and_remove_of_same_group_in_one_action_nets_out() {
  let s = store().await;
  let f = fixture(&s, true).await;

  let mut action = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  action.groups =
    vec![GroupChange::add("Group A"), GroupChange::remove("Group A")];
  s.submit(action).await.unwrap();

  let groups = s
    .groups_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap();
  assert!(groups.is_empty());
}

// ─── Unenrolment policy ──────────────────────────────────────────────────────

fn cfg_with_policy(role: &str, kind: ContainerKind, action: PolicyAction) -> EngineConfig {
  let mut cfg = EngineConfig::with_source("records");
  cfg.policy.set(role, kind, action);
  cfg
}

async fn enrolled_fixture(s: &SqliteStore) -> Fixture {
  let f = fixture(s, true).await;
  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  ))
  .await
  .unwrap();
  f
}

#[tokio::test]
async fn remove_with_default_policy_unenrols() {
  let s = store().await;
  let f = enrolled_fixture(&s).await;

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Remove,
  ))
  .await
  .unwrap();

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert!(info.memberships.is_empty());
  assert!(info.roles.is_empty());
}

#[tokio::test]
async fn remove_with_keep_policy_changes_nothing() {
  let s = store_with(cfg_with_policy(
    "student",
    ContainerKind::Course,
    PolicyAction::Keep,
  ))
  .await;
  let f = enrolled_fixture(&s).await;

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Remove,
  ))
  .await
  .unwrap();

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(info.memberships.len(), 1);
  assert_eq!(info.memberships[0].status, EnrolStatus::Active);
  assert_eq!(info.roles.len(), 1);
}

#[tokio::test]
async fn remove_with_suspend_policy_keeps_roles() {
  let s = store_with(cfg_with_policy(
    "student",
    ContainerKind::Course,
    PolicyAction::Suspend,
  ))
  .await;
  let f = enrolled_fixture(&s).await;

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Remove,
  ))
  .await
  .unwrap();

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(info.memberships.len(), 1);
  assert_eq!(info.memberships[0].status, EnrolStatus::Suspended);
  assert_eq!(info.roles.len(), 1);
}

#[tokio::test]
async fn remove_with_suspend_no_roles_policy_strips_roles() {
  let s = store_with(cfg_with_policy(
    "student",
    ContainerKind::Course,
    PolicyAction::SuspendNoRoles,
  ))
  .await;
  let f = enrolled_fixture(&s).await;

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Remove,
  ))
  .await
  .unwrap();

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(info.memberships.len(), 1);
  assert_eq!(info.memberships[0].status, EnrolStatus::Suspended);
  assert!(info.roles.is_empty());
}

#[tokio::test]
async fn policy_is_resolved_per_container_kind() {
  // Suspend in courses, default (unenrol) in modules.
  let s = store_with(cfg_with_policy(
    "student",
    ContainerKind::Course,
    PolicyAction::Suspend,
  ))
  .await;
  let f = enrolled_fixture(&s).await;
  let module = s
    .add_container("MOD-1", ContainerKind::Module, true)
    .await
    .unwrap();
  s.submit(NewAction::new(
    f.subject.subject_id,
    module.container_id,
    f.role.role_id,
    ActionKind::Add,
  ))
  .await
  .unwrap();

  for container_id in [f.container.container_id, module.container_id] {
    s.submit(NewAction::new(
      f.subject.subject_id,
      container_id,
      f.role.role_id,
      ActionKind::Remove,
    ))
    .await
    .unwrap();
  }

  let course_info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(course_info.memberships[0].status, EnrolStatus::Suspended);

  let module_info = s
    .enrolments_for(f.subject.subject_id, module.container_id)
    .await
    .unwrap()
    .unwrap();
  assert!(module_info.memberships.is_empty());
}

#[tokio::test]
async fn remove_is_idempotent() {
  let s = store().await;
  let f = enrolled_fixture(&s).await;

  let remove = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Remove,
  );
  s.submit(remove.clone()).await.unwrap();
  s.submit(remove).await.unwrap();

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert!(info.memberships.is_empty());
}

// ─── Cross-source protection ─────────────────────────────────────────────────

fn cfg_with_sibling() -> EngineConfig {
  let mut cfg = EngineConfig::with_source("records");
  cfg.sources.register(SourceCaps {
    can_manage: true,
    allows_unenrol: true,
    ..SourceCaps::new("sis")
  });
  cfg
}

#[tokio::test]
async fn removal_leaves_sibling_source_with_unrelated_roles_alone() {
  let s = store_with(cfg_with_sibling()).await;
  let f = fixture(&s, true).await;
  let teacher = s.add_role("teacher").await.unwrap();

  // The sibling enrolled this subject as a teacher; a student removal
  // request from our side has no claim on it.
  s.add_membership(
    "sis",
    f.subject.subject_id,
    f.container.container_id,
    EnrolStatus::Active,
    EnrolWindow::default(),
  )
  .await
  .unwrap();
  s.assign_role(
    f.subject.subject_id,
    f.container.container_id,
    teacher.role_id,
    Some("sis"),
  )
  .await
  .unwrap();

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Remove,
  ))
  .await
  .unwrap();

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(info.memberships.len(), 1);
  assert_eq!(info.memberships[0].source, "sis");
  assert_eq!(info.memberships[0].status, EnrolStatus::Active);
  assert_eq!(info.roles.len(), 1);
}

#[tokio::test]
async fn removal_unenrols_sibling_holding_the_requested_role() {
  let s = store_with(cfg_with_sibling()).await;
  let f = fixture(&s, true).await;

  s.add_membership(
    "sis",
    f.subject.subject_id,
    f.container.container_id,
    EnrolStatus::Active,
    EnrolWindow::default(),
  )
  .await
  .unwrap();
  s.assign_role(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    Some("sis"),
  )
  .await
  .unwrap();

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Remove,
  ))
  .await
  .unwrap();

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert!(info.memberships.is_empty());
  assert!(info.roles.is_empty());
}

#[tokio::test]
async fn removal_of_tagged_role_leaves_manual_grants_alone() {
  let s = store().await;
  let f = enrolled_fixture(&s).await;
  let tutor = s.add_role("tutor").await.unwrap();

  // Manually granted, owned by no source.
  s.assign_role(
    f.subject.subject_id,
    f.container.container_id,
    tutor.role_id,
    None,
  )
  .await
  .unwrap();

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Remove,
  ))
  .await
  .unwrap();

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert!(info.memberships.is_empty());
  assert_eq!(info.roles.len(), 1);
  assert_eq!(info.roles[0].role_id, tutor.role_id);
  assert!(info.roles[0].source.is_none());
}

#[tokio::test]
async fn removal_skips_sources_missing_from_the_registry() {
  // "legacy" has a membership but no registry entry, so no declared
  // capabilities; it must be left untouched.
  let s = store().await;
  let f = fixture(&s, true).await;

  s.add_membership(
    "legacy",
    f.subject.subject_id,
    f.container.container_id,
    EnrolStatus::Active,
    EnrolWindow::default(),
  )
  .await
  .unwrap();
  s.assign_role(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    Some("legacy"),
  )
  .await
  .unwrap();

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Remove,
  ))
  .await
  .unwrap();

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(info.memberships.len(), 1);
  assert_eq!(info.memberships[0].source, "legacy");
}

// ─── Container-wide inspection ───────────────────────────────────────────────

#[tokio::test]
async fn enrolments_in_lists_applied_and_queued_subjects() {
  let s = store().await;
  let f = fixture(&s, true).await;
  let other = s.add_subject("s-1002").await.unwrap();

  s.submit(NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  ))
  .await
  .unwrap();

  // Second subject only has a queued item.
  s.set_container_ready(f.container.container_id, false).await.unwrap();
  s.submit(NewAction::new(
    other.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  ))
  .await
  .unwrap();

  let infos = s
    .enrolments_in(f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(infos.len(), 2);

  let enrolled = infos
    .iter()
    .find(|i| i.subject.subject_id == f.subject.subject_id)
    .unwrap();
  assert_eq!(enrolled.memberships.len(), 1);
  assert!(enrolled.queued.is_empty());

  let waiting = infos
    .iter()
    .find(|i| i.subject.subject_id == other.subject_id)
    .unwrap();
  assert!(waiting.memberships.is_empty());
  assert_eq!(waiting.queued.len(), 1);
}

#[tokio::test]
async fn enrolments_in_missing_container_returns_none() {
  let s = store().await;
  assert!(s.enrolments_in(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Windows ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_refreshes_the_enrolment_window() {
  let s = store().await;
  let f = fixture(&s, true).await;

  let start = Utc::now();
  let end = start + Duration::days(90);

  let mut action = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  s.submit(action.clone()).await.unwrap();

  action.window = EnrolWindow { start: Some(start), end: Some(end) };
  s.submit(action).await.unwrap();

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(info.memberships.len(), 1);
  let window = info.memberships[0].window;
  assert_eq!(window.start, Some(start));
  assert_eq!(window.end, Some(end));
}

#[tokio::test]
async fn suspend_applies_the_requested_window() {
  let s = store().await;
  let f = fixture(&s, true).await;

  let start = Utc::now();
  let end = start + Duration::days(30);

  let mut action = NewAction::new(
    f.subject.subject_id,
    f.container.container_id,
    f.role.role_id,
    ActionKind::Add,
  );
  s.submit(action.clone()).await.unwrap();

  action.kind = ActionKind::Suspend;
  action.window = EnrolWindow { start: Some(start), end: Some(end) };
  s.submit(action).await.unwrap();

  let info = s
    .enrolments_for(f.subject.subject_id, f.container.container_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(info.memberships[0].status, EnrolStatus::Suspended);
  assert_eq!(info.memberships[0].window.start, Some(start));
  assert_eq!(info.memberships[0].window.end, Some(end));
}
