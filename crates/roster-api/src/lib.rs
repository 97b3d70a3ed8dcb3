//! JSON REST API for Roster.
//!
//! Exposes an axum [`Router`] backed by any [`roster_core::store::RosterStore`].
//! Callers address subjects, containers, and roles by their external keys;
//! this layer resolves them to internal ids before touching the store. Auth,
//! TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", roster_api::api_router(store.clone()))
//! ```

pub mod enrolments;
pub mod error;
mod keys;
pub mod pending;
pub mod sync;
pub mod unenrolments;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use roster_core::store::RosterStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: RosterStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Enrolments
    .route(
      "/enrolments",
      get(enrolments::inspect::<S>).post(enrolments::create::<S>),
    )
    .route("/unenrolments", post(unenrolments::create::<S>))
    // Queue
    .route("/pending", get(pending::list::<S>))
    // Batch pass
    .route("/sync", post(sync::run::<S>))
    .with_state(store)
}
