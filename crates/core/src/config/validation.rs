//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { field: field.into(), reason: reason.into() }
    }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version` is empty or contains whitespace
    /// - `origin` is not a bare http(s) origin
    /// - a resource path does not start with `/`
    /// - `offline_page` is not one of the resources
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `install_attempts` is 0
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.is_empty() {
            return Err(ConfigError::invalid("version", "must not be empty"));
        }
        if self.version.chars().any(char::is_whitespace) {
            return Err(ConfigError::invalid("version", "must not contain whitespace"));
        }

        let origin = url::Url::parse(&self.origin).map_err(|e| ConfigError::invalid("origin", e.to_string()))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::invalid("origin", format!("unsupported scheme: {}", origin.scheme())));
        }
        if origin.path() != "/" || origin.query().is_some() || origin.fragment().is_some() {
            return Err(ConfigError::invalid("origin", "must not carry a path, query or fragment"));
        }

        if let Some(bad) = self.resources.iter().find(|r| !r.starts_with('/')) {
            return Err(ConfigError::invalid("resources", format!("path must start with '/': {bad}")));
        }

        if !self.resources.iter().any(|r| r == &self.offline_page) {
            return Err(ConfigError::invalid(
                "offline_page",
                format!("{} is not listed in resources", self.offline_page),
            ));
        }

        let unique: HashSet<&str> = self.resources.iter().map(String::as_str).collect();
        if unique.len() != self.resources.len() {
            tracing::warn!(
                listed = self.resources.len(),
                unique = unique.len(),
                "resources contain duplicate paths"
            );
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.install_attempts == 0 {
            return Err(ConfigError::invalid("install_attempts", "must be at least 1"));
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::invalid("user_agent", "must not be empty"));
        }

        Ok(())
    }
}
