// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Request-scoped context threaded through every store call.
//!
//! A [`RequestContext`] bundles the caller's cancellation token with the
//! structured logger (a `tracing` span) for the current request. The dual
//! writer derives a child context annotated with kind, name and resource
//! version and hands it to both stores, so every event a store emits carries
//! those fields.
//!
//! Cancellation is cooperative: stores check [`RequestContext::is_cancelled`]
//! and the dual writer races each sub-call against the token through
//! [`RequestContext::run`]. No timeout is imposed here.

use crate::storage_errors::{Result, StorageError};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

/// Cancellation and logging scope for one storage request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancel: CancellationToken,
    span: Span,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// A fresh context that is never cancelled unless [`Self::cancel`] is called.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            span: Span::current(),
        }
    }

    /// A context bound to an existing cancellation token.
    #[must_use]
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            span: Span::current(),
        }
    }

    /// Derive a context sharing this cancellation token but logging into `span`.
    #[must_use]
    pub fn with_span(&self, span: Span) -> Self {
        Self {
            cancel: self.cancel.clone(),
            span,
        }
    }

    /// The structured logger for this request.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// The underlying cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel the request and every context derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the request has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast with [`StorageError::Cancelled`] if the request is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Cancelled`] once the token has fired.
    pub fn ensure_active(&self, operation: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(StorageError::Cancelled {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// Drive `fut` inside this context's span, aborting on cancellation.
    ///
    /// # Errors
    ///
    /// Returns the future's own error, or [`StorageError::Cancelled`] if the
    /// token fires first.
    pub async fn run<F, T>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.ensure_active(operation)?;
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(StorageError::Cancelled {
                operation: operation.to_string(),
            }),
            result = fut.instrument(self.span.clone()) => result,
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
