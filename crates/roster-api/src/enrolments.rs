//! Handlers for `/enrolments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/enrolments` | Batch of enrolment requests by external key |
//! | `GET`  | `/enrolments?container=[&subject=]` | Inspection for one pair or a whole container |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use roster_core::{
  action::{ActionKind, GroupChange, NewAction},
  membership::EnrolWindow,
  report::SubmitOutcome,
  store::{EnrolmentInfo, RosterStore},
};
use serde::{Deserialize, Serialize};

use crate::{
  error::ApiError,
  keys::{resolve_container, resolve_role, resolve_subject, store_err},
};

// ─── Create ───────────────────────────────────────────────────────────────────

/// One enrolment request, addressed by external keys.
///
/// The optional `suspend` flag selects the action kind: `1` suspends, `0`
/// reactivates, absent enrols.
#[derive(Debug, Deserialize)]
pub struct EnrolRequest {
  pub subject:   String,
  pub container: String,
  pub role:      String,
  #[serde(default)]
  pub groups:    Vec<GroupChange>,
  pub start:     Option<DateTime<Utc>>,
  pub end:       Option<DateTime<Utc>>,
  pub suspend:   Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct EnrolResult {
  pub subject:   String,
  pub container: String,
  pub outcome:   SubmitOutcome,
}

fn kind_for(suspend: Option<u8>) -> Result<ActionKind, ApiError> {
  match suspend {
    None => Ok(ActionKind::Add),
    Some(0) => Ok(ActionKind::Unsuspend),
    Some(1) => Ok(ActionKind::Suspend),
    Some(other) => {
      Err(ApiError::BadRequest(format!("invalid suspend flag {other}")))
    }
  }
}

/// `POST /enrolments` — body: array of [`EnrolRequest`].
///
/// The whole batch is validated (keys resolved, windows checked) before any
/// request is submitted, so an unknown key fails the batch cleanly.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<Vec<EnrolRequest>>,
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

    let window = EnrolWindow { start: req.start, end: req.end };
    window
      .validate()
      .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut action = NewAction::new(
      subject.subject_id,
      container.container_id,
      role.role_id,
      kind_for(req.suspend)?,
    );
    action.window = window;
    action.groups = req.groups;
    actions.push((req.subject, req.container, action));
  }

  let mut results = Vec::with_capacity(actions.len());
  for (subject, container, action) in actions {
    let outcome = store.submit(action).await.map_err(store_err)?;
    results.push(EnrolResult { subject, container, outcome });
  }
  Ok(Json(results))
}

// ─── Inspect ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InspectParams {
  pub subject:   Option<String>,
  pub container: String,
}

/// `GET /enrolments?container=<key>[&subject=<key>]`
///
/// With a subject, the single [`EnrolmentInfo`] for that pair; without,
/// one entry per subject with any enrolment state in the container.
pub async fn inspect<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<InspectParams>,
) -> Result<Response, ApiError>
where
  S: RosterStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let container = resolve_container(store.as_ref(), &params.container).await?;

  let Some(subject_key) = &params.subject else {
    let infos: Vec<EnrolmentInfo> = store
      .enrolments_in(container.container_id)
      .await
      .map_err(store_err)?
      .ok_or_else(|| {
        ApiError::NotFound(format!("container {} not found", params.container))
      })?;
    return Ok(Json(infos).into_response());
  };

  let subject = resolve_subject(store.as_ref(), subject_key).await?;
  let info = store
    .enrolments_for(subject.subject_id, container.container_id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "no enrolment state for {subject_key} in {}",
        params.container
      ))
    })?;
  Ok(Json(info).into_response())
}
