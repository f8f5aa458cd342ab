//! Request/response model shared by storage and the strategy engine.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::hash::compute_cache_key;

/// What a cache namespace holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    /// Install-time shell plus same-origin static assets and navigations.
    Core,
    /// Third-party responses, TTL-bound.
    Runtime,
    /// Structured data files and their manifest.
    Data,
}

impl Purpose {
    pub const ALL: [Purpose; 3] = [Purpose::Core, Purpose::Runtime, Purpose::Data];

    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Core => "core",
            Purpose::Runtime => "runtime",
            Purpose::Data => "data",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A versioned cache namespace name: `{prefix}-{purpose}-{version}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheNamespace {
    pub name: String,
    pub version: String,
    pub purpose: Purpose,
}

impl CacheNamespace {
    pub fn new(prefix: &str, purpose: Purpose, version: &str) -> Self {
        Self { name: format!("{prefix}-{purpose}-{version}"), version: version.to_string(), purpose }
    }

    /// Recover purpose and version from a stored name.
    ///
    /// Returns `None` for names that do not belong to `prefix` or whose
    /// purpose segment is unknown.
    pub fn parse(prefix: &str, name: &str) -> Option<Self> {
        let rest = name.strip_prefix(prefix)?.strip_prefix('-')?;
        let (purpose, version) = rest.split_once('-')?;
        let purpose = Purpose::parse(purpose)?;
        if version.is_empty() {
            return None;
        }
        Some(Self { name: name.to_string(), version: version.to_string(), purpose })
    }
}

/// Cache key identity: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    pub method: String,
    pub url: Url,
}

impl RequestIdentity {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        let mut url = url;
        url.set_fragment(None);
        Self { method: method.into().to_ascii_uppercase(), url }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method, self.url.as_str())
    }
}

/// Immutable copy of a response taken at store time.
///
/// The body is reference-counted, so handing the same snapshot to the cache
/// and to the caller never consumes it twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseSnapshot {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self { url: url.into(), status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A stored response.
///
/// `stored_at` (unix millis) is only set for TTL-bound entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub key: RequestIdentity,
    pub payload: ResponseSnapshot,
    pub stored_at: Option<i64>,
}
