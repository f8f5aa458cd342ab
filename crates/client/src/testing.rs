//! Test doubles: a scripted network and a manual clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sitecache_core::{AppConfig, CacheDb, Error, ResponseSnapshot};

use crate::clock::Clock;
use crate::fetch::{Network, Request};
use crate::worker::Worker;

pub(crate) const ORIGIN: &str = "https://example.com/";

#[derive(Clone)]
enum Route {
    Respond { status: u16, body: String, delay: Option<Duration> },
    Fail,
}

/// Per-URL canned responses. Unknown URLs fail like an offline network.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<HashMap<String, usize>>,
    completed: Mutex<HashMap<String, usize>>,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route::Respond { status, body: body.to_string(), delay: None });
    }

    pub(crate) fn delay(&self, url: &str, delay: Duration, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route::Respond { status, body: body.to_string(), delay: Some(delay) });
    }

    pub(crate) fn fail(&self, url: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), Route::Fail);
    }

    /// Drop every route: the network is now offline.
    pub(crate) fn go_offline(&self) {
        self.routes.lock().unwrap().clear();
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub(crate) fn completed(&self, url: &str) -> usize {
        self.completed.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Poll until `url` has been requested `n` times.
    pub(crate) async fn wait_for_calls(&self, url: &str, n: usize) {
        for _ in 0..200 {
            if self.calls(url) >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {n} calls to {url}, saw {}", self.calls(url));
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error> {
        let url = request.url.to_string();
        *self.calls.lock().unwrap().entry(url.clone()).or_default() += 1;

        let route = self.routes.lock().unwrap().get(&url).cloned();
        let result = match route {
            Some(Route::Respond { status, body, delay }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(ResponseSnapshot::new(url.clone(), status, body).with_header("content-type", "text/plain"))
            }
            Some(Route::Fail) | None => Err(Error::Network(format!("{url}: connection refused"))),
        };

        *self.completed.lock().unwrap().entry(url).or_default() += 1;
        result
    }
}

/// Clock advanced by hand.
pub(crate) struct ManualClock(AtomicI64);

impl ManualClock {
    pub(crate) fn at(ms: i64) -> Self {
        Self(AtomicI64::new(ms))
    }

    pub(crate) fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        origin: ORIGIN.into(),
        version: "v-test".into(),
        cache_prefix: "app".into(),
        core_assets: vec!["/".into(), "/a.css".into()],
        optional_assets: vec!["/icon.png".into()],
        ..Default::default()
    }
}

pub(crate) struct Harness {
    pub(crate) worker: Worker,
    pub(crate) net: Arc<ScriptedNetwork>,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) db: CacheDb,
}

/// A worker over an in-memory database, not yet installed.
pub(crate) async fn harness_with(config: AppConfig) -> Harness {
    let db = CacheDb::open_in_memory().await.unwrap();
    let net = Arc::new(ScriptedNetwork::new());
    let clock = Arc::new(ManualClock::at(1_700_000_000_000));
    let worker = Worker::new(config.worker_config().unwrap(), db.clone(), net.clone(), clock.clone());
    Harness { worker, net, clock, db }
}

/// A worker that has installed and activated with the default test assets.
pub(crate) async fn active_harness() -> Harness {
    let h = harness_with(test_config()).await;
    h.net.respond("https://example.com/", 200, "<html>home</html>");
    h.net.respond("https://example.com/a.css", 200, "body{}");
    h.worker.start().await.unwrap();
    h
}

pub(crate) fn url(s: &str) -> url::Url {
    url::Url::parse(s).unwrap()
}
