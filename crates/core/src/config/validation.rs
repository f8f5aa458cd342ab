//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 300_000;

fn check_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value < MIN_TIMEOUT_MS {
        return Err(ConfigError::Invalid { field: field.into(), reason: "must be at least 100ms".into() });
    }
    if value > MAX_TIMEOUT_MS {
        return Err(ConfigError::Invalid {
            field: field.into(),
            reason: "must not exceed 5 minutes (300000ms)".into(),
        });
    }
    Ok(())
}

fn check_token(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid { field: field.into(), reason: "must not be empty".into() });
    }
    if value.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid { field: field.into(), reason: "must not contain whitespace".into() });
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - any timeout is below 100ms or above 5 minutes
    /// - `external_ttl_ms` is 0
    /// - `version` or `cache_prefix` is empty or contains whitespace
    /// - `user_agent` is empty
    ///
    /// Returns `ConfigError::Missing` if `core_assets` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_origin()?;

        check_timeout("fetch_timeout_ms", self.fetch_timeout_ms)?;
        check_timeout("navigation_timeout_ms", self.navigation_timeout_ms)?;
        check_timeout("data_timeout_ms", self.data_timeout_ms)?;
        check_timeout("external_timeout_ms", self.external_timeout_ms)?;
        check_timeout("static_timeout_ms", self.static_timeout_ms)?;

        if self.external_ttl_ms == 0 {
            return Err(ConfigError::Invalid { field: "external_ttl_ms".into(), reason: "must be greater than 0".into() });
        }

        check_token("version", &self.version)?;
        check_token("cache_prefix", &self.cache_prefix)?;

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.core_assets.is_empty() {
            return Err(ConfigError::Missing {
                field: "core_assets".into(),
                hint: "list at least the site root, e.g. [\"/\"]".into(),
            });
        }

        if !self.data_prefix.starts_with('/') {
            return Err(ConfigError::Invalid { field: "data_prefix".into(), reason: "must start with '/'".into() });
        }

        if self.data_extensions.is_empty() {
            tracing::warn!("data_extensions is empty; only the data manifest will use the data strategy");
        }

        Ok(())
    }
}
