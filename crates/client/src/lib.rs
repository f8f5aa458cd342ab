//! Request routing and caching strategies for an offline-capable site.
//!
//! A [`Worker`] intercepts requests for one site version, classifies each
//! one, and answers it with the matching strategy over versioned cache
//! namespaces. Lifecycle events and control messages are delivered through
//! [`Worker::dispatch`].

pub mod classify;
pub mod clock;
pub mod control;
pub mod fallback;
pub mod fetch;
pub mod lifecycle;
pub mod revalidate;
pub mod strategy;
pub mod worker;

#[cfg(test)]
mod testing;

pub use classify::{Classifier, RequestClass};
pub use clock::{Clock, SystemClock};
pub use control::{ControlMessage, ControlReply, PrefetchReport};
pub use fetch::{FetchConfig, HttpNetwork, Method, Network, Request, canonicalize, fetch_with_timeout};
pub use lifecycle::{InstallReport, LifecycleState};
pub use strategy::{Response, ResponseSource};
pub use worker::{Event, EventOutcome, Worker, WorkerContext};
