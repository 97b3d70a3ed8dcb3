//! Handler for `POST /sync` — run one batch pass on demand.

use std::sync::Arc;

use axum::{Json, extract::State};
use roster_core::{report::SyncReport, store::RosterStore};

use crate::{error::ApiError, keys::store_err};

/// `POST /sync`
///
/// Drains queued actions whose containers have become ready and sweeps
/// orphans, returning the pass report. External schedulers can own the
/// cadence instead of (or in addition to) the built-in interval task.
pub async fn run<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<SyncReport>, ApiError>
where
  S: RosterStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let report = store.run_sync().await.map_err(store_err)?;
  Ok(Json(report))
}
