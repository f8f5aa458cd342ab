//! fetch tool implementation.
//!
//! Routes a request through the worker exactly as an intercepted page
//! request would be routed.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_client::{Method, Request, Worker, canonicalize};
use sitecache_core::Error;

/// Input parameters for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute URL, or a path resolved against the site origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Treat the request as a top-level page navigation.
    #[serde(default)]
    pub navigate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

/// Output structure for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchOutput {
    /// The canonical request URL.
    pub url: String,
    pub status: u16,
    pub headers: Vec<HeaderField>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    /// `network`, `cache` or `fallback`.
    pub source: String,
    /// Request class, absent when the request bypassed the worker.
    pub class: Option<String>,
}

fn parse_method(raw: Option<&str>) -> Result<Method, Error> {
    let Some(raw) = raw.map(str::trim).filter(|m| !m.is_empty()) else {
        return Ok(Method::GET);
    };
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes()).map_err(|_| Error::UnsupportedMethod(raw.to_string()))
}

/// Implementation of the fetch tool.
pub async fn fetch_impl(worker: &Worker, params: FetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let url = canonicalize(&params.url, &worker.ctx().config.origin).map_err(Error::from)?;
    let method = parse_method(params.method.as_deref())?;
    let request = Request { method, url, navigate: params.navigate };

    let class = worker.route(&request);
    let response = worker.handle_fetch(request.clone()).await?;

    let output = FetchOutput {
        url: request.url.to_string(),
        status: response.snapshot.status,
        headers: response
            .snapshot
            .headers
            .iter()
            .map(|(name, value)| HeaderField { name: name.clone(), value: value.clone() })
            .collect(),
        body: response.snapshot.text(),
        source: response.source.as_str().to_string(),
        class: class.map(|c| c.as_str().to_string()),
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
