//! Error types for `roster-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  SubjectNotFound(Uuid),

  #[error("container not found: {0}")]
  ContainerNotFound(Uuid),

  #[error("role not found: {0}")]
  RoleNotFound(Uuid),

  /// Enrolment window whose end precedes its start.
  #[error("invalid enrolment window: end {end} precedes start {start}")]
  InvalidWindow {
    start: DateTime<Utc>,
    end:   DateTime<Utc>,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
