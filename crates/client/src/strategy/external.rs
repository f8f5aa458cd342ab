//! Network-first for third-party content with a TTL-bound cache.
//!
//! Stored copies carry their capture time in entry metadata. On network
//! failure a copy is served only while `now - stored_at < ttl`; an expired
//! or absent copy is a failure, and an expired copy is evicted.

use sitecache_core::{Error, Purpose};

use super::{Response, store};
use crate::fetch::{Request, fetch_with_timeout};
use crate::worker::WorkerContext;

pub(super) async fn handle(ctx: &WorkerContext, request: &Request) -> Result<Response, Error> {
    let runtime = ctx.namespaces.open(Purpose::Runtime).await?;

    let failure = match fetch_with_timeout(ctx.network.clone(), request, ctx.config.timeouts.external).await {
        Ok(snapshot) => {
            if snapshot.is_success() {
                store(&runtime, request, &snapshot, Some(ctx.clock.now_ms())).await;
            }
            return Ok(Response::network(snapshot));
        }
        Err(e) => e,
    };

    tracing::debug!(url = %request.url, error = %failure, "external network failed, trying cache");

    let Some(entry) = runtime.get(&request.identity()).await? else {
        return Err(failure);
    };

    let ttl_ms = ctx.config.external_ttl.as_millis() as i64;
    // Entries without a capture time cannot prove freshness.
    let age_ms = entry.stored_at.map_or(i64::MAX, |at| ctx.clock.now_ms().saturating_sub(at));
    if age_ms < ttl_ms {
        return Ok(Response::cached(entry));
    }

    tracing::debug!(url = %request.url, age_ms, ttl_ms, "evicting expired external cache entry");
    if let Err(e) = runtime.delete(&entry.key).await {
        tracing::warn!(url = %request.url, error = %e, "failed to evict expired entry");
    }
    Err(Error::Expired { url: request.url.to_string(), age_ms })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ResponseSource;
    use crate::testing::{active_harness, url};
    use sitecache_core::{CachedEntry, ResponseSnapshot};
    use std::time::Duration;

    const FONT_URL: &str = "https://fonts.gstatic.com/s/inter.woff2";
    const T0: i64 = 1_700_000_000_000;

    #[tokio::test]
    async fn test_success_stamped_with_capture_time() {
        let h = active_harness().await;
        h.net.respond(FONT_URL, 200, "font");
        let request = Request::get(url(FONT_URL));

        let response = handle(h.worker.ctx(), &request).await.unwrap();
        assert_eq!(response.source, ResponseSource::Network);

        let runtime = h.worker.ctx().namespaces.open(Purpose::Runtime).await.unwrap();
        let cached = runtime.get(&request.identity()).await.unwrap().unwrap();
        assert_eq!(cached.stored_at, Some(T0));
    }

    #[tokio::test]
    async fn test_fresh_entry_served_offline() {
        let h = active_harness().await;
        h.net.respond(FONT_URL, 200, "font");
        let request = Request::get(url(FONT_URL));
        handle(h.worker.ctx(), &request).await.unwrap();

        h.net.go_offline();
        h.clock.set(T0 + 3_599_999);
        let response = handle(h.worker.ctx(), &request).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.snapshot.text(), "font");
    }

    #[tokio::test]
    async fn test_entry_at_ttl_boundary_is_expired() {
        let h = active_harness().await;
        h.net.respond(FONT_URL, 200, "font");
        let request = Request::get(url(FONT_URL));
        handle(h.worker.ctx(), &request).await.unwrap();

        h.net.go_offline();
        h.clock.set(T0 + 3_600_000);
        let result = handle(h.worker.ctx(), &request).await;
        assert!(matches!(result, Err(Error::Expired { age_ms: 3_600_000, .. })));

        // evicted: the next failure reports the network error, not expiry
        let runtime = h.worker.ctx().namespaces.open(Purpose::Runtime).await.unwrap();
        assert!(runtime.get(&request.identity()).await.unwrap().is_none());
        assert!(matches!(handle(h.worker.ctx(), &request).await, Err(Error::Network(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_cache_fails() {
        let h = active_harness().await;
        h.net.delay(FONT_URL, Duration::from_secs(30), 200, "font");

        let result = handle(h.worker.ctx(), &Request::get(url(FONT_URL))).await;
        assert!(matches!(result, Err(Error::FetchTimeout { timeout_ms: 8000, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_serves_fresh_entry() {
        let h = active_harness().await;
        h.net.respond(FONT_URL, 200, "font");
        let request = Request::get(url(FONT_URL));
        handle(h.worker.ctx(), &request).await.unwrap();

        h.net.delay(FONT_URL, Duration::from_secs(30), 200, "late");
        h.clock.set(T0 + 60_000);
        let response = handle(h.worker.ctx(), &request).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.snapshot.text(), "font");
    }

    #[tokio::test]
    async fn test_entry_without_capture_time_is_expired() {
        let h = active_harness().await;
        let request = Request::get(url(FONT_URL));
        let runtime = h.worker.ctx().namespaces.open(Purpose::Runtime).await.unwrap();
        runtime
            .put(&CachedEntry {
                key: request.identity(),
                payload: ResponseSnapshot::new(FONT_URL, 200, "font"),
                stored_at: None,
            })
            .await
            .unwrap();

        assert!(matches!(handle(h.worker.ctx(), &request).await, Err(Error::Expired { .. })));
    }

    #[tokio::test]
    async fn test_absent_entry_propagates_network_error() {
        let h = active_harness().await;
        let result = handle(h.worker.ctx(), &Request::get(url(FONT_URL))).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
