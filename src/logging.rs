// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Structured logging setup.
//!
//! The dual writer logs through `tracing`; every operation opens a span with
//! the mode, kind, name and resource version, and both stores run inside it.
//! Embedding binaries call [`init_tracing`] once at startup.
//!
//! Format: timestamp file:line LEVEL message
//! Example: `2025-11-29T23:45:00.123456Z dualwriter.rs:120 WARN unable to delete object in storage`

use crate::config::{LogFormat, LoggingConfig};
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Build the filter for `config`; `RUST_LOG` takes precedence when set.
#[must_use]
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config);

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_target(false)
            .json()
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_target(false)
            .with_ansi(true)
            .compact()
            .try_init(),
    };

    result.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;
    tracing::debug!("Logging initialized with file and line number tracking");
    Ok(())
}
