//! The worker: an explicit context plus an event dispatcher.
//!
//! All state lives in a [`Worker`] instance, so independent workers (e.g. two
//! versions in one test) never share anything but the storage they are given.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sitecache_core::config::WorkerConfig;
use sitecache_core::{CacheDb, Error, GcReport, NamespaceManager};
use tokio::sync::{oneshot, watch};

use crate::classify::{Classifier, RequestClass};
use crate::clock::Clock;
use crate::control::{self, ControlMessage, ControlReply};
use crate::fallback;
use crate::fetch::{Method, Network, Request};
use crate::lifecycle::{self, InstallReport, LifecycleState};
use crate::strategy::{self, Response};

/// Everything an operation needs. Cheap to clone; background tasks take
/// their own copy.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<WorkerConfig>,
    pub namespaces: NamespaceManager,
    pub network: Arc<dyn Network>,
    pub clock: Arc<dyn Clock>,
    pub classifier: Arc<Classifier>,
}

/// Events delivered by the host.
#[derive(Debug)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Message { data: serde_json::Value, reply: Option<oneshot::Sender<ControlReply>> },
}

/// Result of a dispatched event.
#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(GcReport),
    Response(Response),
    Message(Option<ControlReply>),
}

pub struct Worker {
    ctx: WorkerContext,
    state: watch::Sender<LifecycleState>,
    skip_waiting: AtomicBool,
}

impl Worker {
    pub fn new(config: WorkerConfig, db: CacheDb, network: Arc<dyn Network>, clock: Arc<dyn Clock>) -> Self {
        let namespaces = NamespaceManager::new(db, config.cache_prefix.clone(), config.version.clone());
        let classifier = Arc::new(Classifier::new(&config));
        let ctx = WorkerContext { config: Arc::new(config), namespaces, network, clock, classifier };
        Self { ctx, state: watch::Sender::new(LifecycleState::Parsed), skip_waiting: AtomicBool::new(false) }
    }

    pub fn ctx(&self) -> &WorkerContext {
        &self.ctx
    }

    pub fn version(&self) -> &str {
        &self.ctx.config.version
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    fn transition(&self, to: LifecycleState) {
        let from = self.state.send_replace(to);
        tracing::debug!(%from, %to, version = self.version(), "lifecycle transition");
    }

    /// Route an event to its handler.
    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome, Error> {
        match event {
            Event::Install => self.install().await.map(EventOutcome::Installed),
            Event::Activate => self.activate().await.map(EventOutcome::Activated),
            Event::Fetch(request) => self.handle_fetch(request).await.map(EventOutcome::Response),
            Event::Message { data, reply } => Ok(EventOutcome::Message(self.post_message(&data, reply).await)),
        }
    }

    /// Install, then activate. Activation is idempotent, so a pending
    /// `SKIP_WAITING` that already activated only repeats collection.
    pub async fn start(&self) -> Result<GcReport, Error> {
        self.install().await?;
        self.activate().await
    }

    /// Populate the core namespace. Only a fresh or previously failed worker
    /// installs; an installed or active one keeps what it has.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let state = self.state();
        if !matches!(state, LifecycleState::Parsed | LifecycleState::Redundant) {
            return Err(Error::InvalidInput(format!("cannot install a worker in state {state}")));
        }

        self.transition(LifecycleState::Installing);

        match lifecycle::install(&self.ctx).await {
            Ok(report) => {
                self.transition(LifecycleState::Installed);
                if self.skip_waiting.load(Ordering::SeqCst) {
                    if let Err(e) = self.activate().await {
                        tracing::warn!(version = self.version(), error = %e, "activation after SKIP_WAITING failed");
                    }
                }
                Ok(report)
            }
            Err(e) => {
                tracing::error!(version = self.version(), error = %e, "install failed");
                self.transition(LifecycleState::Redundant);
                Err(e)
            }
        }
    }

    /// Take control. Allowed once installed; re-running an active worker's
    /// activation only repeats garbage collection.
    pub async fn activate(&self) -> Result<GcReport, Error> {
        let state = self.state();
        if !matches!(state, LifecycleState::Installed | LifecycleState::Activated) {
            return Err(Error::InvalidInput(format!("cannot activate a worker in state {state}")));
        }

        self.transition(LifecycleState::Activating);
        let report = match lifecycle::activate(&self.ctx).await {
            Ok(report) => report,
            Err(e) => {
                self.transition(state);
                return Err(e);
            }
        };
        self.transition(LifecycleState::Activated);

        let recent = self.ctx.config.prefetch_recent;
        if recent > 0 && state != LifecycleState::Activated {
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                control::prefetch_recent(&ctx, recent).await;
            });
        }

        Ok(report)
    }

    /// The class a request would be handled as, or `None` when it bypasses
    /// the worker.
    pub fn route(&self, request: &Request) -> Option<RequestClass> {
        if !self.state().is_controlling() || request.method != Method::GET {
            return None;
        }
        Some(self.ctx.classifier.classify(request))
    }

    /// Handle an intercepted request.
    ///
    /// Before activation, and for anything but `GET`, the request goes
    /// straight to the network. Otherwise the classified strategy runs; a
    /// storage failure, or any failure of a navigation, is answered by the
    /// fallback responder. Exhausted fallbacks for other classes are
    /// returned as errors.
    pub async fn handle_fetch(&self, request: Request) -> Result<Response, Error> {
        if !matches!(request.url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(request.url.to_string()));
        }

        let Some(class) = self.route(&request) else {
            return self.ctx.network.fetch(&request).await.map(Response::network);
        };

        match strategy::execute(&self.ctx, class, &request).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_storage() || class == RequestClass::Navigation => {
                tracing::error!(url = %request.url, %class, error = %e, "strategy failed, serving fallback");
                Ok(fallback::respond(&self.ctx, &request).await)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, %class, error = %e, "request failed");
                Err(e)
            }
        }
    }

    /// Deliver a control message, answering on `reply` at most once.
    pub async fn post_message(
        &self, data: &serde_json::Value, reply: Option<oneshot::Sender<ControlReply>>,
    ) -> Option<ControlReply> {
        let answer = self.handle_message(data).await;
        if let (Some(port), Some(answer)) = (reply, answer.clone()) {
            if port.send(answer).is_err() {
                tracing::debug!("control reply receiver dropped");
            }
        }
        answer
    }

    async fn handle_message(&self, data: &serde_json::Value) -> Option<ControlReply> {
        let message = ControlMessage::parse(data)?;
        tracing::debug!(?message, "control message");

        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                if self.state() == LifecycleState::Installed {
                    if let Err(e) = self.activate().await {
                        tracing::warn!(error = %e, "activation after SKIP_WAITING failed");
                    }
                }
                None
            }
            ControlMessage::GetVersion => Some(ControlReply::Version { version: self.version().to_string() }),
            ControlMessage::ClearCache => {
                let success = match self.ctx.namespaces.clear_all().await {
                    Ok(deleted) => {
                        tracing::info!(deleted, "cleared cache namespaces");
                        true
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "clearing cache namespaces failed");
                        false
                    }
                };
                Some(ControlReply::Cleared { success })
            }
            ControlMessage::PrefetchData { urls } => {
                control::prefetch_data(&self.ctx, &urls).await;
                None
            }
        }
    }
}
