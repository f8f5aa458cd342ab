//! Install and activation.
//!
//! Install populates the core namespace. Every mandatory asset must be
//! fetched with a 2xx answer before anything is written, and a failed write
//! removes the namespace again, so a failed install never leaves a core
//! namespace that looks complete. Optional assets are best-effort.
//!
//! Activation garbage-collects namespaces from other versions and opens the
//! current ones.

use serde::{Deserialize, Serialize};
use sitecache_core::{CachedEntry, Error, GcReport, Purpose, ResponseSnapshot};
use tokio::task::JoinSet;
use url::Url;

use crate::fetch::Request;
use crate::worker::WorkerContext;

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Created, nothing installed yet.
    Parsed,
    Installing,
    /// Installed and waiting to take control.
    Installed,
    Activating,
    /// In control: requests are intercepted.
    Activated,
    /// Install failed; this worker never activates.
    Redundant,
}

impl LifecycleState {
    pub fn is_controlling(&self) -> bool {
        matches!(self, LifecycleState::Activated)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// What install managed to cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub core_cached: usize,
    pub optional_cached: usize,
    pub optional_failed: usize,
}

async fn fetch_all(ctx: &WorkerContext, urls: &[Url]) -> Vec<(Url, Result<ResponseSnapshot, Error>)> {
    let mut join_set = JoinSet::new();
    for url in urls {
        let network = ctx.network.clone();
        let request = Request::get(url.clone());
        join_set.spawn(async move {
            let result = match network.fetch(&request).await {
                Ok(snapshot) if snapshot.is_success() => Ok(snapshot),
                Ok(snapshot) => Err(Error::HttpStatus { url: request.url.to_string(), status: snapshot.status }),
                Err(e) => Err(e),
            };
            (request.url, result)
        });
    }

    let mut results = Vec::with_capacity(urls.len());
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!(error = %e, "install fetch task panicked"),
        }
    }
    results
}

/// Drop the current version's core namespace so nothing half-installed survives.
async fn discard_core(ctx: &WorkerContext) {
    let name = ctx.namespaces.current(Purpose::Core).name;
    if let Err(e) = ctx.namespaces.db().delete_namespace(&name).await {
        tracing::error!(namespace = %name, error = %e, "failed to remove core namespace after failed install");
    }
}

/// Populate the core namespace.
///
/// # Errors
///
/// Returns `Error::InstallFailed` if any mandatory asset cannot be fetched
/// or stored.
pub async fn install(ctx: &WorkerContext) -> Result<InstallReport, Error> {
    let mandatory = &ctx.config.core_assets;
    let fetched = fetch_all(ctx, mandatory).await;
    if fetched.len() != mandatory.len() {
        return Err(Error::InstallFailed("mandatory asset fetch did not complete".into()));
    }

    let mut snapshots = Vec::with_capacity(fetched.len());
    for (url, result) in fetched {
        match result {
            Ok(snapshot) => snapshots.push((url, snapshot)),
            Err(e) => {
                discard_core(ctx).await;
                return Err(Error::InstallFailed(format!("{url}: {e}")));
            }
        }
    }

    let core = ctx
        .namespaces
        .open(Purpose::Core)
        .await
        .map_err(|e| Error::InstallFailed(format!("opening core namespace: {e}")))?;

    for (url, snapshot) in snapshots {
        let entry = CachedEntry { key: Request::get(url.clone()).identity(), payload: snapshot, stored_at: None };
        if let Err(e) = core.put(&entry).await {
            discard_core(ctx).await;
            return Err(Error::InstallFailed(format!("storing {url}: {e}")));
        }
    }

    let mut report = InstallReport { core_cached: mandatory.len(), ..Default::default() };

    for (url, result) in fetch_all(ctx, &ctx.config.optional_assets).await {
        let stored = match result {
            Ok(snapshot) => {
                let entry = CachedEntry { key: Request::get(url.clone()).identity(), payload: snapshot, stored_at: None };
                core.put(&entry).await
            }
            Err(e) => Err(e),
        };
        match stored {
            Ok(()) => report.optional_cached += 1,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "optional asset not cached");
                report.optional_failed += 1;
            }
        }
    }

    tracing::info!(
        version = ctx.namespaces.version(),
        core = report.core_cached,
        optional = report.optional_cached,
        optional_failed = report.optional_failed,
        "install complete"
    );
    Ok(report)
}

/// Remove namespaces from other versions and open the current ones.
///
/// GC failures are logged; failing to open a current namespace is returned.
pub async fn activate(ctx: &WorkerContext) -> Result<GcReport, Error> {
    let report = match ctx.namespaces.gc().await {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(error = %e, "cache namespace enumeration failed; stale namespaces kept");
            GcReport::default()
        }
    };

    for purpose in Purpose::ALL {
        ctx.namespaces.open(purpose).await?;
    }

    tracing::info!(
        version = ctx.namespaces.version(),
        deleted = report.deleted.len(),
        kept = report.kept.len(),
        "activation complete"
    );
    Ok(report)
}
