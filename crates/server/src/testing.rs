//! In-memory network for tool tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sitecache_client::{Network, Request, SystemClock, Worker};
use sitecache_core::{AppConfig, CacheDb, Error, ResponseSnapshot};

/// Serves fixed bodies by URL; anything else fails like an offline network.
#[derive(Default)]
pub(crate) struct FixedNetwork {
    pages: Mutex<HashMap<String, (u16, String)>>,
}

impl FixedNetwork {
    pub(crate) fn serve(&self, url: &str, status: u16, body: &str) {
        self.pages.lock().unwrap().insert(url.to_string(), (status, body.to_string()));
    }

    pub(crate) fn clear(&self) {
        self.pages.lock().unwrap().clear();
    }
}

#[async_trait]
impl Network for FixedNetwork {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error> {
        let url = request.url.to_string();
        match self.pages.lock().unwrap().get(&url) {
            Some((status, body)) => {
                Ok(ResponseSnapshot::new(url, *status, body.clone()).with_header("content-type", "text/plain"))
            }
            None => Err(Error::Network(format!("{url}: offline"))),
        }
    }
}

pub(crate) fn config() -> AppConfig {
    AppConfig {
        origin: "https://example.com/".into(),
        version: "v-test".into(),
        cache_prefix: "app".into(),
        core_assets: vec!["/".into()],
        optional_assets: vec![],
        ..Default::default()
    }
}

/// A worker over an in-memory database, not yet started.
pub(crate) async fn worker() -> (Arc<Worker>, Arc<FixedNetwork>) {
    let db = CacheDb::open_in_memory().await.unwrap();
    let net = Arc::new(FixedNetwork::default());
    net.serve("https://example.com/", 200, "<html>home</html>");
    let worker = Worker::new(config().worker_config().unwrap(), db, net.clone(), Arc::new(SystemClock));
    (Arc::new(worker), net)
}

/// A started worker.
pub(crate) async fn started_worker() -> (Arc<Worker>, Arc<FixedNetwork>) {
    let (worker, net) = worker().await;
    worker.start().await.unwrap();
    (worker, net)
}

/// Decode the JSON text content of a tool result.
pub(crate) fn output<T: serde::de::DeserializeOwned>(result: &rmcp::model::CallToolResult) -> T {
    let content = serde_json::to_value(&result.content[0]).unwrap();
    let text = content
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
