//! MCP tool implementations.
//!
//! This module contains all tools exposed by the sitecache server.

pub mod fetch;
pub mod message;
pub mod status;

pub use fetch::FetchParams;
pub use message::PostMessageParams;
