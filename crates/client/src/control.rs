//! Control channel message types and the prefetch operations behind them.
//!
//! Messages arrive as JSON objects tagged by `type`:
//!
//! | Message | Reply |
//! |---------|-------|
//! | `{"type":"SKIP_WAITING"}` | none |
//! | `{"type":"GET_VERSION"}` | `{"version": "..."}` |
//! | `{"type":"CLEAR_CACHE"}` | `{"success": true}` |
//! | `{"type":"PREFETCH_DATA","urls":[...]}` | none |
//!
//! Anything else is ignored.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sitecache_core::{CachedEntry, Purpose};
use tokio::task::JoinSet;

use crate::fetch::{Request, canonicalize};
use crate::worker::WorkerContext;

/// Date stamp leading a data file name, e.g. `2025-04-04.jsonl`.
static DATED_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})[^/\s]*$").expect("valid regex")
});

/// A message from the host page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
    ClearCache,
    PrefetchData {
        #[serde(default)]
        urls: Vec<String>,
    },
}

impl ControlMessage {
    /// Decode a raw message. Unknown or malformed messages yield `None`.
    pub fn parse(data: &serde_json::Value) -> Option<Self> {
        match serde_json::from_value(data.clone()) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unrecognised control message");
                None
            }
        }
    }
}

/// Reply sent back on the message's reply channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply {
    Version { version: String },
    Cleared { success: bool },
}

/// Counts from a prefetch batch, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchReport {
    pub requested: usize,
    pub stored: usize,
}

/// Fetch each URL and store 2xx answers in the data namespace.
///
/// URLs are independent: one failing never aborts the others.
pub async fn prefetch_data(ctx: &WorkerContext, urls: &[String]) -> PrefetchReport {
    let mut report = PrefetchReport { requested: urls.len(), stored: 0 };

    let data = match ctx.namespaces.open(Purpose::Data).await {
        Ok(ns) => ns,
        Err(e) => {
            tracing::warn!(error = %e, "cannot open data namespace for prefetch");
            return report;
        }
    };

    let mut join_set = JoinSet::new();
    for raw in urls {
        let url = match canonicalize(raw, &ctx.config.origin) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = %raw, error = %e, "skipping invalid prefetch URL");
                continue;
            }
        };
        let network = ctx.network.clone();
        let data = data.clone();

        join_set.spawn(async move {
            let request = Request::get(url);
            let snapshot = match network.fetch(&request).await {
                Ok(snapshot) if snapshot.is_success() => snapshot,
                Ok(snapshot) => {
                    tracing::warn!(url = %request.url, status = snapshot.status, "prefetch got non-success status");
                    return false;
                }
                Err(e) => {
                    tracing::warn!(url = %request.url, error = %e, "prefetch failed");
                    return false;
                }
            };
            let entry = CachedEntry { key: request.identity(), payload: snapshot, stored_at: None };
            match data.put(&entry).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(url = %request.url, error = %e, "failed to store prefetched file");
                    false
                }
            }
        });
    }

    while let Some(result) = join_set.join_next().await {
        if matches!(result, Ok(true)) {
            report.stored += 1;
        }
    }

    tracing::info!(requested = report.requested, stored = report.stored, "prefetch complete");
    report
}

/// Newest `n` date-stamped names from a data manifest.
pub fn recent_data_files(manifest: &str, n: usize) -> Vec<String> {
    let mut names: Vec<&str> = manifest
        .lines()
        .map(str::trim)
        .filter(|line| DATED_FILE.is_match(line))
        .collect();
    names.sort_unstable_by(|a, b| b.cmp(a));
    names.dedup();
    names.into_iter().take(n).map(String::from).collect()
}

/// Read the data manifest and prefetch the newest `n` files it lists.
pub async fn prefetch_recent(ctx: &WorkerContext, n: usize) -> PrefetchReport {
    let request = Request::get(ctx.config.data_manifest.clone());
    let manifest = match ctx.network.fetch(&request).await {
        Ok(snapshot) if snapshot.is_success() => snapshot,
        Ok(snapshot) => {
            tracing::warn!(url = %request.url, status = snapshot.status, "data manifest unavailable");
            return PrefetchReport::default();
        }
        Err(e) => {
            tracing::warn!(url = %request.url, error = %e, "data manifest fetch failed");
            return PrefetchReport::default();
        }
    };

    let prefix = ctx.config.data_prefix.trim_end_matches('/');
    let urls: Vec<String> = recent_data_files(&manifest.text(), n)
        .into_iter()
        .map(|name| format!("{prefix}/{name}"))
        .collect();

    prefetch_data(ctx, &urls).await
}
