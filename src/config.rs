// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration for the dual writer and its ambient stack.
//!
//! Configuration can be loaded from YAML or assembled from environment
//! variables. Environment variables always win over file values so an
//! operator can raise the log level without editing the file.
//!
//! # Example
//!
//! ```rust
//! use dualwrite::config::{DualWriterConfig, LogFormat};
//!
//! let config: DualWriterConfig = serde_yaml::from_str(
//!     "logging:\n  level: debug\n  format: json\nmetrics:\n  enabled: false\n",
//! )
//! .unwrap();
//!
//! assert_eq!(config.logging.format, LogFormat::Json);
//! assert!(!config.metrics.enabled);
//! ```

use crate::constants::{DEFAULT_LOG_LEVEL, ENV_METRICS_ENABLED, ENV_RUST_LOG, ENV_RUST_LOG_FORMAT};
use anyhow::{Context as _, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse a format name; anything other than `json` means text.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `dualwrite=debug`
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Metrics settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsConfig {
    /// Record per-operation and per-store metrics
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Top-level dual writer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DualWriterConfig {
    /// Logging settings
    pub logging: LoggingConfig,
    /// Metrics settings
    pub metrics: MetricsConfig,
}

impl DualWriterConfig {
    /// Defaults overridden by the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Load a YAML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Separated from [`Self::from_env`] so tests do not mutate the process
    /// environment.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_RUST_LOG).filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
        if let Some(format) = lookup(ENV_RUST_LOG_FORMAT) {
            self.logging.format = LogFormat::parse(&format);
        }
        if let Some(enabled) = lookup(ENV_METRICS_ENABLED) {
            self.metrics.enabled = !matches!(
                enabled.to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        self
    }

    /// JSON schema of the configuration file.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(DualWriterConfig)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
