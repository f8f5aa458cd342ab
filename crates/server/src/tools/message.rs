//! post_message tool implementation.
//!
//! Delivers a control message to the worker and waits for its reply, if the
//! message type has one.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_client::{ControlReply, Event, Worker};
use sitecache_core::Error;
use tokio::sync::oneshot;

/// Parameters for the post_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostMessageParams {
    /// Control message, e.g. `{"type": "GET_VERSION"}`.
    pub message: serde_json::Value,
}

/// Output from the post_message tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageOutput {
    /// The worker's reply; `null` for messages without one.
    pub reply: Option<ControlReply>,
}

/// Implementation of the post_message tool.
pub async fn post_message_impl(worker: &Worker, params: PostMessageParams) -> Result<CallToolResult, McpError> {
    if !params.message.is_object() {
        return Err(Error::InvalidInput("message must be a JSON object".into()).into());
    }

    let (tx, rx) = oneshot::channel();
    worker.dispatch(Event::Message { data: params.message, reply: Some(tx) }).await?;
    // the sender is dropped without a reply for messages that have none
    let reply = rx.await.ok();

    let json = serde_json::to_string_pretty(&PostMessageOutput { reply })
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
