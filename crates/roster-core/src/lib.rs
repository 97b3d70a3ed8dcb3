//! Core types and trait definitions for the Roster membership store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod action;
pub mod container;
pub mod error;
pub mod membership;
pub mod policy;
pub mod report;
pub mod source;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
