//! Handler for `GET /pending` — queue inspection.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use roster_core::{
  action::PendingAction,
  store::{PendingFilter, RosterStore},
};
use serde::Deserialize;

use crate::{
  error::ApiError,
  keys::{resolve_container, resolve_subject, store_err},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub subject:   Option<String>,
  pub container: Option<String>,
}

/// `GET /pending[?subject=<key>][&container=<key>]`
///
/// Queued actions in creation order, optionally narrowed to a subject
/// and/or container by external key.
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<PendingAction>>, ApiError>
where
  S: RosterStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let mut filter = PendingFilter::default();
  if let Some(key) = &params.subject {
    filter.subject_id =
      Some(resolve_subject(store.as_ref(), key).await?.subject_id);
  }
  if let Some(key) = &params.container {
    filter.container_id =
      Some(resolve_container(store.as_ref(), key).await?.container_id);
  }

  let pending = store.list_pending(filter).await.map_err(store_err)?;
  Ok(Json(pending))
}
