//! The unenrolment policy matrix.
//!
//! Removal requests do not always mean "delete": what actually happens to the
//! membership is configured per (role, container kind). Unconfigured pairs
//! fall through to [`PolicyAction::Unenrol`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::container::ContainerKind;

/// What a removal request does to the matching enrolment.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
  /// Fully remove the enrolment and the source's role assignments.
  #[default]
  Unenrol,
  /// Leave the membership untouched.
  Keep,
  /// Suspend the membership; role assignments are unaffected.
  Suspend,
  /// Suspend the membership and strip the source's role assignments.
  SuspendNoRoles,
}

/// Typed mapping from (role shortname, container kind) to the configured
/// removal action. Loaded once from configuration; evaluation is a pure
/// lookup with no side effects.
#[derive(Debug, Clone, Default)]
pub struct UnenrolPolicy {
  rules: HashMap<(String, ContainerKind), PolicyAction>,
}

impl UnenrolPolicy {
  pub fn new() -> Self { Self::default() }

  /// Configure the action for one (role, kind) pair, replacing any earlier
  /// rule for the same pair.
  pub fn set(
    &mut self,
    role: impl Into<String>,
    kind: ContainerKind,
    action: PolicyAction,
  ) {
    self.rules.insert((role.into(), kind), action);
  }

  /// Resolve the configured action; defaults to [`PolicyAction::Unenrol`]
  /// for any unconfigured pair.
  pub fn resolve(&self, role: &str, kind: ContainerKind) -> PolicyAction {
    self
      .rules
      .get(&(role.to_owned(), kind))
      .copied()
      .unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unconfigured_pair_defaults_to_unenrol() {
    let policy = UnenrolPolicy::new();
    assert_eq!(
      policy.resolve("student", ContainerKind::Course),
      PolicyAction::Unenrol
    );
  }

  #[test]
  fn configured_pair_is_returned() {
    let mut policy = UnenrolPolicy::new();
    policy.set("teacher", ContainerKind::Module, PolicyAction::Keep);
    policy.set("teacher", ContainerKind::Course, PolicyAction::Suspend);

    assert_eq!(
      policy.resolve("teacher", ContainerKind::Module),
      PolicyAction::Keep
    );
    assert_eq!(
      policy.resolve("teacher", ContainerKind::Course),
      PolicyAction::Suspend
    );
    // Other roles are unaffected.
    assert_eq!(
      policy.resolve("student", ContainerKind::Module),
      PolicyAction::Unenrol
    );
  }

  #[test]
  fn later_rule_replaces_earlier() {
    let mut policy = UnenrolPolicy::new();
    policy.set("student", ContainerKind::Course, PolicyAction::Keep);
    policy.set(
      "student",
      ContainerKind::Course,
      PolicyAction::SuspendNoRoles,
    );
    assert_eq!(
      policy.resolve("student", ContainerKind::Course),
      PolicyAction::SuspendNoRoles
    );
  }
}
