//! SQLite-backed storage for versioned cache namespaces.
//!
//! This module provides persistent namespace storage using SQLite with
//! async access via tokio-rusqlite. It supports:
//!
//! - Versioned namespaces (`{prefix}-{purpose}-{version}`)
//! - Whole-entry overwrite keyed by method and URL
//! - Cascade deletion of stale namespaces
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod namespaces;

pub use crate::Error;

pub use connection::CacheDb;
pub use namespaces::{GcReport, Namespace, NamespaceManager};
