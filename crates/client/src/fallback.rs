//! Last-resort responses.
//!
//! [`respond`] never fails and never touches the network: it tries any
//! cached copy of the request, then the cached site root for navigations,
//! then a fixed offline document.

use sitecache_core::{RequestIdentity, ResponseSnapshot};

use crate::fetch::Request;
use crate::strategy::Response;
use crate::worker::WorkerContext;

const OFFLINE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline</title>
<style>
body{font-family:system-ui,sans-serif;display:flex;align-items:center;justify-content:center;min-height:100vh;margin:0;background:#f5f5f5;color:#333}
main{text-align:center;padding:2rem}
button{margin-top:1rem;padding:.6rem 1.4rem;border:0;border-radius:4px;background:#b31b1b;color:#fff;font-size:1rem;cursor:pointer}
</style>
</head>
<body>
<main>
<h1>You are offline</h1>
<p>This page is not available in the local cache. Check your connection and try again.</p>
<button type="button" onclick="location.reload()">Retry</button>
</main>
</body>
</html>
"#;

/// The synthesized offline page.
pub fn offline_document() -> ResponseSnapshot {
    ResponseSnapshot::new("", 503, OFFLINE_HTML)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_header("cache-control", "no-store")
}

/// Best available response without network I/O.
pub async fn respond(ctx: &WorkerContext, request: &Request) -> Response {
    let mut candidates = vec![request.identity()];
    if request.navigate {
        candidates.push(RequestIdentity::get(ctx.config.offline_root.clone()));
    }

    for identity in &candidates {
        match ctx.namespaces.match_any(identity).await {
            Ok(Some(entry)) => return Response::cached(entry),
            Ok(None) => {}
            Err(e) => tracing::warn!(url = %identity.url, error = %e, "cache lookup failed during fallback"),
        }
    }

    Response::fallback(offline_document())
}
