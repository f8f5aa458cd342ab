//! Request classification.
//!
//! Classification is a pure function of the request and the worker
//! configuration. Rules are evaluated in a fixed priority order and the first
//! match wins; anything unmatched is [`RequestClass::Static`].

use serde::{Deserialize, Serialize};
use sitecache_core::config::WorkerConfig;

use crate::fetch::Request;

/// Handling strategy for a request. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestClass {
    Navigation,
    Data,
    External,
    Static,
}

impl RequestClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::Navigation => "navigation",
            RequestClass::Data => "data",
            RequestClass::External => "external",
            RequestClass::Static => "static",
        }
    }
}

impl std::fmt::Display for RequestClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type Predicate = fn(&Classifier, &Request) -> bool;

/// Priority-ordered rules.
const RULES: &[(RequestClass, Predicate)] = &[
    (RequestClass::Navigation, Classifier::is_navigation),
    (RequestClass::Data, Classifier::is_data_file),
    (RequestClass::External, Classifier::is_external),
];

/// Maps requests to a [`RequestClass`].
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: url::Origin,
    data_prefix: String,
    data_extensions: Vec<String>,
    data_manifest_path: String,
    external_hosts: Vec<String>,
}

impl Classifier {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            origin: config.origin.origin(),
            data_prefix: config.data_prefix.clone(),
            data_extensions: config.data_extensions.clone(),
            data_manifest_path: config.data_manifest.path().to_string(),
            external_hosts: config.external_origins.clone(),
        }
    }

    pub fn classify(&self, request: &Request) -> RequestClass {
        RULES
            .iter()
            .find(|(_, matches)| matches(self, request))
            .map(|(class, _)| *class)
            .unwrap_or(RequestClass::Static)
    }

    fn is_navigation(&self, request: &Request) -> bool {
        request.navigate
    }

    /// Structured-data payloads under the data prefix, plus the manifest.
    fn is_data_file(&self, request: &Request) -> bool {
        let path = request.url.path();
        if path == self.data_manifest_path {
            return true;
        }
        path.starts_with(&self.data_prefix) && self.data_extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    /// Cross-origin, or an allow-listed host (either condition suffices).
    fn is_external(&self, request: &Request) -> bool {
        if request.url.origin() != self.origin {
            return true;
        }
        let Some(host) = request.url.host_str() else {
            return false;
        };
        self.external_hosts
            .iter()
            .any(|allowed| host == allowed.as_str() || host.strip_suffix(allowed.as_str()).is_some_and(|rest| rest.ends_with('.')))
    }
}
