//! Submission outcomes and the batch-pass report.

use serde::{Deserialize, Serialize};

/// What happened to a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitOutcome {
  /// The mutation was applied to the membership store immediately.
  Applied,
  /// The container was not ready, or earlier actions for the same pair are
  /// still queued; the request was recorded as a pending action.
  Queued,
}

/// One pending action whose application failed during a batch pass. The
/// action stays queued and is retried on the next pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFailure {
  pub action_id: i64,
  pub message:   String,
}

/// Outcome of one [`crate::store::RosterStore::run_sync`] invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
  /// Queue ids applied and dequeued, in application order.
  pub applied:         Vec<i64>,
  /// Items left queued after an application error.
  pub deferred:        Vec<SyncFailure>,
  /// Items dequeued without applying because their subject no longer
  /// exists. Never retried.
  pub dropped:         Vec<i64>,
  /// Queued actions removed because their container no longer exists.
  pub orphans_removed: usize,
}

impl SyncReport {
  /// True when the pass applied everything it picked up.
  pub fn is_clean(&self) -> bool {
    self.deferred.is_empty() && self.dropped.is_empty()
  }
}
