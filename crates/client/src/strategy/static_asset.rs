//! Cache-first for same-origin assets, refreshing cached copies in the
//! background. On a miss the network is tried once; its failure is returned.

use sitecache_core::{Error, Purpose};

use super::{Response, store};
use crate::fetch::{Request, fetch_with_timeout};
use crate::revalidate::spawn_revalidation;
use crate::worker::WorkerContext;

pub(super) async fn handle(ctx: &WorkerContext, request: &Request) -> Result<Response, Error> {
    let core = ctx.namespaces.open(Purpose::Core).await?;

    if let Some(entry) = core.get(&request.identity()).await? {
        spawn_revalidation(ctx.clone(), Purpose::Core, request.clone());
        return Ok(Response::cached(entry));
    }

    let snapshot = fetch_with_timeout(ctx.network.clone(), request, ctx.config.timeouts.static_asset).await?;
    if snapshot.is_success() {
        store(&core, request, &snapshot, None).await;
    }
    Ok(Response::network(snapshot))
}
