//! Core types and shared functionality for sitecache.
//!
//! This crate provides:
//! - Versioned cache namespace storage with a SQLite backend
//! - Request/response model
//! - Unified error types
//! - Layered configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod model;

pub use cache::{CacheDb, GcReport, Namespace, NamespaceManager};
pub use config::{AppConfig, CACHE_VERSION, ConfigError};
pub use error::Error;
pub use model::{CacheNamespace, CachedEntry, Purpose, RequestIdentity, ResponseSnapshot};
