//! status tool implementation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_client::Worker;
use sitecache_core::{Error, Purpose};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceStatus {
    pub name: String,
    pub purpose: Purpose,
    pub version: String,
    pub entries: u64,
}

/// Output from the status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusOutput {
    /// Lifecycle state, e.g. `activated`.
    pub state: String,
    /// Whether requests are currently intercepted.
    pub controlling: bool,
    pub version: String,
    /// Namespaces under this worker's prefix, any version.
    pub namespaces: Vec<NamespaceStatus>,
}

/// Implementation of the status tool.
pub async fn status_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let manager = &worker.ctx().namespaces;

    let mut namespaces = Vec::new();
    for ns in manager.list().await? {
        let entries = manager.db().count_entries(&ns.name).await?;
        namespaces.push(NamespaceStatus { name: ns.name, purpose: ns.purpose, version: ns.version, entries });
    }

    let state = worker.state();
    let output = StatusOutput {
        state: state.to_string(),
        controlling: state.is_controlling(),
        version: worker.version().to_string(),
        namespaces,
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{output, started_worker, worker};

    #[tokio::test]
    async fn test_status_before_start() {
        let (worker, _) = worker().await;
        let out: StatusOutput = output(&status_impl(&worker).await.unwrap());
        assert_eq!(out.state, "parsed");
        assert!(!out.controlling);
        assert!(out.namespaces.is_empty());
    }

    #[tokio::test]
    async fn test_status_after_start() {
        let (worker, _) = started_worker().await;
        let out: StatusOutput = output(&status_impl(&worker).await.unwrap());

        assert_eq!(out.state, "activated");
        assert!(out.controlling);
        assert_eq!(out.version, "v-test");

        let names: Vec<_> = out.namespaces.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["app-core-v-test", "app-data-v-test", "app-runtime-v-test"]);
        assert_eq!(out.namespaces[0].entries, 1);
        assert_eq!(out.namespaces[1].entries, 0);
    }
}
