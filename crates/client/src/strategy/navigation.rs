//! Network-first for page loads, degrading to cached pages and finally the
//! offline document. Never fails on network errors.

use sitecache_core::{Error, Purpose, RequestIdentity};

use super::{Response, store};
use crate::fallback;
use crate::fetch::{Request, fetch_with_timeout};
use crate::worker::WorkerContext;

pub(super) async fn handle(ctx: &WorkerContext, request: &Request) -> Result<Response, Error> {
    let core = ctx.namespaces.open(Purpose::Core).await?;

    match fetch_with_timeout(ctx.network.clone(), request, ctx.config.timeouts.navigation).await {
        Ok(snapshot) => {
            if snapshot.is_success() {
                store(&core, request, &snapshot, None).await;
            }
            Ok(Response::network(snapshot))
        }
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "navigation network failed, trying cache");

            if let Some(entry) = core.get(&request.identity()).await? {
                return Ok(Response::cached(entry));
            }
            if let Some(entry) = core.get(&RequestIdentity::get(ctx.config.offline_root.clone())).await? {
                return Ok(Response::cached(entry));
            }
            Ok(Response::fallback(fallback::offline_document()))
        }
    }
}
