//! Per-class caching strategies.
//!
//! | Class | Order | Timer | Cache |
//! |-------|-------|-------|-------|
//! | Navigation | network, then cached page, then cached root, then offline document | 3s | core |
//! | Data | network, then cached copy plus background refresh | 5s | data |
//! | External | network, then cached copy younger than the TTL | 8s | runtime |
//! | Static | cached copy plus background refresh, then network | 5s | core |
//!
//! Expected network failures are handled inside each strategy. A strategy
//! returns `Err` only when its fallbacks are exhausted, or when storage
//! itself fails.

mod data;
mod external;
mod navigation;
mod static_asset;

use serde::{Deserialize, Serialize};
use sitecache_core::{CachedEntry, Namespace, ResponseSnapshot};

use crate::classify::RequestClass;
use crate::fetch::Request;
use crate::worker::WorkerContext;
use sitecache_core::Error;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    Fallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Fallback => "fallback",
        }
    }
}

/// Result of handling an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub snapshot: ResponseSnapshot,
    pub source: ResponseSource,
}

impl Response {
    pub fn network(snapshot: ResponseSnapshot) -> Self {
        Self { snapshot, source: ResponseSource::Network }
    }

    pub fn cached(entry: CachedEntry) -> Self {
        Self { snapshot: entry.payload, source: ResponseSource::Cache }
    }

    pub fn fallback(snapshot: ResponseSnapshot) -> Self {
        Self { snapshot, source: ResponseSource::Fallback }
    }
}

/// Run the strategy for `class`.
pub async fn execute(ctx: &WorkerContext, class: RequestClass, request: &Request) -> Result<Response, Error> {
    match class {
        RequestClass::Navigation => navigation::handle(ctx, request).await,
        RequestClass::Data => data::handle(ctx, request).await,
        RequestClass::External => external::handle(ctx, request).await,
        RequestClass::Static => static_asset::handle(ctx, request).await,
    }
}

/// Store a copy of a network response. Failures are logged, not returned:
/// the live response is still good.
pub(crate) async fn store(namespace: &Namespace, request: &Request, snapshot: &ResponseSnapshot, stored_at: Option<i64>) {
    let entry = CachedEntry { key: request.identity(), payload: snapshot.clone(), stored_at };
    if let Err(e) = namespace.put(&entry).await {
        tracing::warn!(url = %request.url, namespace = namespace.name(), error = %e, "failed to cache response");
    }
}
