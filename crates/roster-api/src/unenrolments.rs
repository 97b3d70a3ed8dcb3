//! Handler for `POST /unenrolments`.

use std::sync::Arc;

use axum::{Json, extract::State};
use roster_core::{
  action::{ActionKind, NewAction},
  store::RosterStore,
};
use serde::Deserialize;

use crate::{
  enrolments::EnrolResult,
  error::ApiError,
  keys::{resolve_container, resolve_role, resolve_subject, store_err},
};

#[derive(Debug, Deserialize)]
pub struct UnenrolRequest {
  pub subject:   String,
  pub container: String,
  pub role:      String,
}

/// `POST /unenrolments` — body: array of [`UnenrolRequest`].
///
/// Each entry becomes a removal request; what actually happens to the
/// membership is decided by the configured unenrolment policy.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<Vec<UnenrolRequest>>,
) -> Result<Json<Vec<EnrolResult>>, ApiError>
where
  S: RosterStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let mut actions = Vec::with_capacity(body.len());
  for req in body {
    let subject = resolve_subject(store.as_ref(), &req.subject).await?;
    let container = resolve_container(store.as_ref(), &req.container).await?;
    let role = resolve_role(store.as_ref(), &req.role).await?;

    actions.push((
      req.subject,
      req.container,
      NewAction::new(
        subject.subject_id,
        container.container_id,
        role.role_id,
        ActionKind::Remove,
      ),
    ));
  }

  let mut results = Vec::with_capacity(actions.len());
  for (subject, container, action) in actions {
    let outcome = store.submit(action).await.map_err(store_err)?;
    results.push(EnrolResult { subject, container, outcome });
  }
  Ok(Json(results))
}
