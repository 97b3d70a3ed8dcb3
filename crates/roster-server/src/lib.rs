//! Runtime configuration for the `rosterd` binary.
//!
//! The TOML / environment configuration is the single place the engine's
//! source name, unenrolment policy matrix, and sibling-source capabilities
//! come from; everything downstream receives them as an explicit
//! [`EngineConfig`].

use std::path::PathBuf;

use roster_core::{
  container::ContainerKind,
  policy::PolicyAction,
  source::SourceCaps,
  store::EngineConfig,
};
use serde::Deserialize;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// Source name this instance tags its memberships with.
  pub source:     String,
  /// Seconds between batch passes; `0` disables the built-in task.
  #[serde(default = "default_sync_interval")]
  pub sync_interval_secs: u64,
  #[serde(default)]
  pub policy:     Vec<PolicyRule>,
  #[serde(default)]
  pub sources:    Vec<SourceEntry>,
}

fn default_sync_interval() -> u64 { 300 }

/// One `[[policy]]` table: the removal action for a (role, kind) pair.
#[derive(Deserialize, Clone)]
pub struct PolicyRule {
  pub role:   String,
  pub kind:   ContainerKind,
  pub action: PolicyAction,
}

/// One `[[sources]]` table: declared capabilities of a sibling enrolment
/// source. Undeclared sources are treated as having none.
#[derive(Deserialize, Clone)]
pub struct SourceEntry {
  pub name:           String,
  #[serde(default)]
  pub can_manage:     bool,
  #[serde(default)]
  pub protects_roles: bool,
  #[serde(default)]
  pub allows_unenrol: bool,
}

impl ServerConfig {
  /// Assemble the engine configuration: own source first (full
  /// capabilities), then sibling sources in declaration order.
  pub fn engine_config(&self) -> EngineConfig {
    let mut cfg = EngineConfig::with_source(self.source.clone());
    for rule in &self.policy {
      cfg.policy.set(rule.role.clone(), rule.kind, rule.action);
    }
    for entry in &self.sources {
      if entry.name == self.source {
        continue;
      }
      cfg.sources.register(SourceCaps {
        can_manage:     entry.can_manage,
        protects_roles: entry.protects_roles,
        allows_unenrol: entry.allows_unenrol,
        ..SourceCaps::new(entry.name.clone())
      });
    }
    cfg
  }
}
