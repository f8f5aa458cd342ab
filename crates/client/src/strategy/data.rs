//! Network-first for data files. A non-2xx answer counts as a failure. On
//! failure the cached copy is served and refreshed in the background; with
//! no cached copy the failure is returned.

use sitecache_core::{Error, Purpose};

use super::{Response, store};
use crate::fetch::{Request, fetch_with_timeout};
use crate::revalidate::spawn_revalidation;
use crate::worker::WorkerContext;

pub(super) async fn handle(ctx: &WorkerContext, request: &Request) -> Result<Response, Error> {
    let data = ctx.namespaces.open(Purpose::Data).await?;

    let failure = match fetch_with_timeout(ctx.network.clone(), request, ctx.config.timeouts.data).await {
        Ok(snapshot) if snapshot.is_success() => {
            store(&data, request, &snapshot, None).await;
            return Ok(Response::network(snapshot));
        }
        Ok(snapshot) => Error::HttpStatus { url: request.url.to_string(), status: snapshot.status },
        Err(e) => e,
    };

    tracing::debug!(url = %request.url, error = %failure, "data network failed, trying cache");

    match data.get(&request.identity()).await? {
        Some(entry) => {
            spawn_revalidation(ctx.clone(), Purpose::Data, request.clone());
            Ok(Response::cached(entry))
        }
        None => Err(failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ResponseSource;
    use crate::testing::{active_harness, url};
    use std::time::Duration;

    const DATA_URL: &str = "https://example.com/data/2025-04-04.jsonl";

    #[tokio::test]
    async fn test_success_stored_then_served_offline_with_revalidation() {
        let h = active_harness().await;
        h.net.respond(DATA_URL, 200, "{\"id\":1}");
        let request = Request::get(url(DATA_URL));

        let first = handle(h.worker.ctx(), &request).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);
        let data = h.worker.ctx().namespaces.open(Purpose::Data).await.unwrap();
        assert!(data.get(&request.identity()).await.unwrap().is_some());

        h.net.fail(DATA_URL);
        let second = handle(h.worker.ctx(), &request).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.snapshot.text(), "{\"id\":1}");

        // first call, the failed second call, then the background refresh
        h.net.wait_for_calls(DATA_URL, 3).await;
    }

    #[tokio::test]
    async fn test_non_success_treated_as_failure() {
        let h = active_harness().await;
        h.net.respond(DATA_URL, 200, "old");
        let request = Request::get(url(DATA_URL));
        handle(h.worker.ctx(), &request).await.unwrap();

        h.net.respond(DATA_URL, 500, "boom");
        let response = handle(h.worker.ctx(), &request).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.snapshot.text(), "old");
    }

    #[tokio::test]
    async fn test_failed_revalidation_keeps_entry() {
        let h = active_harness().await;
        h.net.respond(DATA_URL, 200, "v1");
        let request = Request::get(url(DATA_URL));
        handle(h.worker.ctx(), &request).await.unwrap();

        // 404 for the strategy's own fetch, so it serves the cached copy...
        h.net.respond(DATA_URL, 404, "gone");
        handle(h.worker.ctx(), &request).await.unwrap();
        h.net.wait_for_calls(DATA_URL, 3).await;

        // ...and the non-2xx revalidation must not overwrite it
        let data = h.worker.ctx().namespaces.open(Purpose::Data).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(data.get(&request.identity()).await.unwrap().unwrap().payload.text(), "v1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_serves_cached_and_revalidates() {
        let h = active_harness().await;
        h.net.respond(DATA_URL, 200, "v1");
        let request = Request::get(url(DATA_URL));
        handle(h.worker.ctx(), &request).await.unwrap();

        h.net.delay(DATA_URL, Duration::from_secs(30), 200, "v2");
        let response = handle(h.worker.ctx(), &request).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.snapshot.text(), "v1");

        // the timed-out fetch plus the background refresh
        h.net.wait_for_calls(DATA_URL, 3).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_cache_fails() {
        let h = active_harness().await;
        h.net.delay(DATA_URL, Duration::from_secs(30), 200, "late");

        let result = handle(h.worker.ctx(), &Request::get(url(DATA_URL))).await;
        assert!(matches!(result, Err(Error::FetchTimeout { timeout_ms: 5000, .. })));
    }

    #[tokio::test]
    async fn test_no_cache_propagates_failure() {
        let h = active_harness().await;
        h.net.respond(DATA_URL, 503, "unavailable");

        let result = handle(h.worker.ctx(), &Request::get(url(DATA_URL))).await;
        assert!(matches!(result, Err(Error::HttpStatus { status: 503, .. })));

        let result = handle(h.worker.ctx(), &Request::get(url("https://example.com/data/other.jsonl"))).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
