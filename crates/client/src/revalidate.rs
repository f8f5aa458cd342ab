//! Background revalidation.
//!
//! A detached task re-fetches a resource without a strategy timer and, on a
//! 2xx answer, overwrites the cached copy. Nothing on the request path awaits
//! it, and its failures only reach the log.

use sitecache_core::{CachedEntry, Purpose};
use tokio::task::JoinHandle;

use crate::fetch::Request;
use crate::worker::WorkerContext;

/// Spawn a refresh of `request` into the current `purpose` namespace.
///
/// The handle is returned for callers that want to observe completion; the
/// strategies drop it.
pub fn spawn_revalidation(ctx: WorkerContext, purpose: Purpose, request: Request) -> JoinHandle<()> {
    tokio::spawn(async move {
        let snapshot = match ctx.network.fetch(&request).await {
            Ok(snapshot) if snapshot.is_success() => snapshot,
            Ok(snapshot) => {
                tracing::debug!(url = %request.url, status = snapshot.status, "revalidation got non-success status");
                return;
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "revalidation fetch failed");
                return;
            }
        };

        let stored_at = (purpose == Purpose::Runtime).then(|| ctx.clock.now_ms());
        let entry = CachedEntry { key: request.identity(), payload: snapshot, stored_at };

        let result = match ctx.namespaces.open(purpose).await {
            Ok(namespace) => namespace.put(&entry).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => tracing::debug!(url = %request.url, %purpose, "revalidated cache entry"),
            Err(e) => tracing::warn!(url = %request.url, %purpose, error = %e, "failed to store revalidated entry"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{active_harness, url};

    #[tokio::test]
    async fn test_revalidation_overwrites_on_success() {
        let h = active_harness().await;
        h.net.respond("https://example.com/a.css", 200, "body{margin:0}");
        let request = Request::get(url("https://example.com/a.css"));

        spawn_revalidation(h.worker.ctx().clone(), Purpose::Core, request.clone()).await.unwrap();

        let core = h.worker.ctx().namespaces.open(Purpose::Core).await.unwrap();
        let entry = core.get(&request.identity()).await.unwrap().unwrap();
        assert_eq!(entry.payload.text(), "body{margin:0}");
    }

    #[tokio::test]
    async fn test_revalidation_failure_is_swallowed() {
        let h = active_harness().await;
        h.net.go_offline();
        let request = Request::get(url("https://example.com/a.css"));

        let joined = spawn_revalidation(h.worker.ctx().clone(), Purpose::Core, request.clone()).await;
        assert!(joined.is_ok());

        let core = h.worker.ctx().namespaces.open(Purpose::Core).await.unwrap();
        assert_eq!(core.get(&request.identity()).await.unwrap().unwrap().payload.text(), "body{}");
    }

    #[tokio::test]
    async fn test_runtime_revalidation_stamps_capture_time() {
        let h = active_harness().await;
        h.net.respond("https://cdn.jsdelivr.net/npm/marked", 200, "js");
        h.clock.set(42);
        let request = Request::get(url("https://cdn.jsdelivr.net/npm/marked"));

        spawn_revalidation(h.worker.ctx().clone(), Purpose::Runtime, request.clone()).await.unwrap();

        let runtime = h.worker.ctx().namespaces.open(Purpose::Runtime).await.unwrap();
        assert_eq!(runtime.get(&request.identity()).await.unwrap().unwrap().stored_at, Some(42));
    }
}
