//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SITECACHE_*)
//! 2. TOML config file (if SITECACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Cache version of the running build.
///
/// Embedded in every namespace name; changing it invalidates all previously
/// cached content on the next activation.
pub const CACHE_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SITECACHE_*)
/// 2. TOML config file (if SITECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via SITECACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Serving origin of the site, e.g. `https://example.github.io/`.
    ///
    /// Set via SITECACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Cache version embedded in namespace names.
    #[serde(default = "default_version")]
    pub version: String,

    /// Shared prefix of every namespace this application owns.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Client-level HTTP timeout in milliseconds. Applies to install and
    /// prefetch fetches, which have no strategy timer.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    #[serde(default = "default_data_timeout_ms")]
    pub data_timeout_ms: u64,

    #[serde(default = "default_external_timeout_ms")]
    pub external_timeout_ms: u64,

    #[serde(default = "default_static_timeout_ms")]
    pub static_timeout_ms: u64,

    /// Maximum age of a third-party cached response.
    #[serde(default = "default_external_ttl_ms")]
    pub external_ttl_ms: u64,

    /// Paths that must be cached for install to succeed.
    #[serde(default = "default_core_assets")]
    pub core_assets: Vec<String>,

    /// Paths cached on install when available.
    #[serde(default = "default_optional_assets")]
    pub optional_assets: Vec<String>,

    /// Third-party hosts always routed to the external strategy.
    ///
    /// Set via SITECACHE_EXTERNAL_ORIGINS environment variable (`[host1,host2]`).
    #[serde(default = "default_external_origins")]
    pub external_origins: Vec<String>,

    /// Directory holding data files.
    #[serde(default = "default_data_prefix")]
    pub data_prefix: String,

    /// File suffixes that mark a data file under `data_prefix`.
    #[serde(default = "default_data_extensions")]
    pub data_extensions: Vec<String>,

    /// Manifest listing available data file names, one per line.
    #[serde(default = "default_data_manifest")]
    pub data_manifest: String,

    /// Number of newest data files to prefetch after activation (0 disables).
    #[serde(default)]
    pub prefetch_recent: usize,

    /// Page served for navigations when the exact page is not cached.
    #[serde(default = "default_offline_root")]
    pub offline_root: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sitecache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_version() -> String {
    CACHE_VERSION.into()
}

fn default_cache_prefix() -> String {
    "sitecache".into()
}

fn default_user_agent() -> String {
    concat!("sitecache/", env!("CARGO_PKG_VERSION")).into()
}

fn default_fetch_timeout_ms() -> u64 {
    20_000
}

fn default_navigation_timeout_ms() -> u64 {
    3_000
}

fn default_data_timeout_ms() -> u64 {
    5_000
}

fn default_external_timeout_ms() -> u64 {
    8_000
}

fn default_static_timeout_ms() -> u64 {
    5_000
}

fn default_external_ttl_ms() -> u64 {
    3_600_000 // 1h
}

fn default_core_assets() -> Vec<String> {
    ["/", "/index.html", "/css/style.css", "/js/app.js", "/manifest.json"]
        .map(String::from)
        .to_vec()
}

fn default_optional_assets() -> Vec<String> {
    ["/images/icon-192.png", "/images/icon-512.png", "/favicon.ico"]
        .map(String::from)
        .to_vec()
}

fn default_external_origins() -> Vec<String> {
    ["fonts.googleapis.com", "fonts.gstatic.com", "cdn.jsdelivr.net", "arxiv.org"]
        .map(String::from)
        .to_vec()
}

fn default_data_prefix() -> String {
    "/data/".into()
}

fn default_data_extensions() -> Vec<String> {
    [".jsonl", ".json"].map(String::from).to_vec()
}

fn default_data_manifest() -> String {
    "/data/file-list.txt".into()
}

fn default_offline_root() -> String {
    "/".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            user_agent: default_user_agent(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            data_timeout_ms: default_data_timeout_ms(),
            external_timeout_ms: default_external_timeout_ms(),
            static_timeout_ms: default_static_timeout_ms(),
            external_ttl_ms: default_external_ttl_ms(),
            core_assets: default_core_assets(),
            optional_assets: default_optional_assets(),
            external_origins: default_external_origins(),
            data_prefix: default_data_prefix(),
            data_extensions: default_data_extensions(),
            data_manifest: default_data_manifest(),
            prefetch_recent: 0,
            offline_root: default_offline_root(),
        }
    }
}

/// Per-class strategy timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyTimeouts {
    pub navigation: Duration,
    pub data: Duration,
    pub external: Duration,
    pub static_asset: Duration,
}

/// Configuration resolved against the serving origin, ready for the worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub origin: Url,
    pub version: String,
    pub cache_prefix: String,
    pub timeouts: StrategyTimeouts,
    pub external_ttl: Duration,
    pub core_assets: Vec<Url>,
    pub optional_assets: Vec<Url>,
    pub external_origins: Vec<String>,
    pub data_prefix: String,
    pub data_extensions: Vec<String>,
    pub data_manifest: Url,
    pub prefetch_recent: usize,
    pub offline_root: Url,
}

impl AppConfig {
    /// Client-level timeout as Duration for use with reqwest.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn timeouts(&self) -> StrategyTimeouts {
        StrategyTimeouts {
            navigation: Duration::from_millis(self.navigation_timeout_ms),
            data: Duration::from_millis(self.data_timeout_ms),
            external: Duration::from_millis(self.external_timeout_ms),
            static_asset: Duration::from_millis(self.static_timeout_ms),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SITECACHE_`
    /// 2. TOML file from `SITECACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SITECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SITECACHE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Resolve paths against the origin into a [`WorkerConfig`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin or any asset path
    /// cannot be parsed.
    pub fn worker_config(&self) -> Result<WorkerConfig, ConfigError> {
        let origin = self.parsed_origin()?;
        let resolve = |field: &str, path: &str| {
            origin
                .join(path)
                .map_err(|e| ConfigError::Invalid { field: field.into(), reason: format!("{path}: {e}") })
        };

        let core_assets = self
            .core_assets
            .iter()
            .map(|p| resolve("core_assets", p))
            .collect::<Result<Vec<_>, _>>()?;
        let optional_assets = self
            .optional_assets
            .iter()
            .map(|p| resolve("optional_assets", p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(WorkerConfig {
            data_manifest: resolve("data_manifest", &self.data_manifest)?,
            offline_root: resolve("offline_root", &self.offline_root)?,
            origin,
            version: self.version.clone(),
            cache_prefix: self.cache_prefix.clone(),
            timeouts: self.timeouts(),
            external_ttl: Duration::from_millis(self.external_ttl_ms),
            core_assets,
            optional_assets,
            external_origins: self.external_origins.iter().map(|h| h.to_ascii_lowercase()).collect(),
            data_prefix: self.data_prefix.clone(),
            data_extensions: self.data_extensions.clone(),
            prefetch_recent: self.prefetch_recent,
        })
    }

    pub(crate) fn parsed_origin(&self) -> Result<Url, ConfigError> {
        let origin = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match origin.scheme() {
            "http" | "https" => Ok(origin),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {scheme}") }),
        }
    }
}
