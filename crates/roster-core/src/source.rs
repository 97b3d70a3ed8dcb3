//! Enrolment sources and the source registry.
//!
//! Several independent mechanisms can grant and revoke membership in the
//! same container: this engine's own records feed, a manual admin surface,
//! a self-enrolment form, and so on. Each is described by its capabilities;
//! the unenrolment state machine consults those capabilities rather than
//! inspecting the source's concrete type.

/// Capabilities of one enrolment source. A source may only directly mutate
/// memberships and role assignments it itself tagged.
pub trait EnrolmentSource: Send + Sync {
  /// Stable name used to tag membership and role-assignment rows.
  fn name(&self) -> &str;

  /// May the engine change the status of this source's memberships
  /// (suspend/unsuspend) on its behalf?
  fn can_manage(&self) -> bool { false }

  /// Does this source insist its role assignments survive an unenrolment
  /// driven by another mechanism?
  fn protects_roles(&self) -> bool { false }

  /// May this source's memberships be removed outright?
  fn allows_unenrol(&self) -> bool { false }
}

/// A plain data description of a source; sufficient for every source that
/// has no behaviour beyond its capability flags.
#[derive(Debug, Clone)]
pub struct SourceCaps {
  pub name:           String,
  pub can_manage:     bool,
  pub protects_roles: bool,
  pub allows_unenrol: bool,
}

impl SourceCaps {
  /// All capabilities off; flip the ones a source has with struct-update
  /// syntax.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name:           name.into(),
      can_manage:     false,
      protects_roles: false,
      allows_unenrol: false,
    }
  }
}

impl EnrolmentSource for SourceCaps {
  fn name(&self) -> &str { &self.name }

  fn can_manage(&self) -> bool { self.can_manage }

  fn protects_roles(&self) -> bool { self.protects_roles }

  fn allows_unenrol(&self) -> bool { self.allows_unenrol }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// The set of sources known to the engine, dispatched by name.
///
/// Iteration order is insertion order. When more than one source could act
/// on the same removal, they are processed in this order; no priority
/// scheme is defined beyond that.
#[derive(Default)]
pub struct SourceRegistry {
  sources: Vec<Box<dyn EnrolmentSource>>,
}

impl SourceRegistry {
  pub fn new() -> Self { Self::default() }

  /// Register a source. Lookups return the first match by name.
  pub fn register(&mut self, source: impl EnrolmentSource + 'static) {
    self.sources.push(Box::new(source));
  }

  pub fn get(&self, name: &str) -> Option<&dyn EnrolmentSource> {
    self
      .sources
      .iter()
      .find(|s| s.name() == name)
      .map(AsRef::as_ref)
  }

  pub fn iter(&self) -> impl Iterator<Item = &dyn EnrolmentSource> {
    self.sources.iter().map(AsRef::as_ref)
  }

  pub fn is_empty(&self) -> bool { self.sources.is_empty() }
}
