//! External-key resolution shared by the handlers.

use roster_core::{
  container::Container, membership::Role, store::RosterStore, subject::Subject,
};

use crate::error::ApiError;

pub(crate) fn store_err<E>(e: E) -> ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  ApiError::Store(Box::new(e))
}

pub(crate) async fn resolve_subject<S>(
  store: &S,
  key: &str,
) -> Result<Subject, ApiError>
where
  S: RosterStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .subject_by_key(key)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {key} not found")))
}

pub(crate) async fn resolve_container<S>(
  store: &S,
  key: &str,
) -> Result<Container, ApiError>
where
  S: RosterStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .container_by_key(key)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("container {key} not found")))
}

pub(crate) async fn resolve_role<S>(
  store: &S,
  shortname: &str,
) -> Result<Role, ApiError>
where
  S: RosterStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .role_by_shortname(shortname)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("role {shortname} not found")))
}
