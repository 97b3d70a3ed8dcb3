//! SQLite backend for the Roster membership store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! worker thread without blocking the async runtime. The reconciliation
//! driver lives here too: immediate application, queue draining, and the
//! unenrolment policy machine all run inside SQLite transactions so apply
//! and dequeue are a single atomic unit.

mod apply;
mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
