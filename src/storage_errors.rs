// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Storage error types shared by both backends and the dual writer.
//!
//! Every store implementation reports failures through [`StorageError`] so the
//! dual writer can apply its asymmetric policy:
//! - `NotFound` is not an abort signal for `get` (fallback) or `delete`
//!   (already absent)
//! - `Validation` comes from caller-supplied callbacks and stops the call
//! - `Rejected` is a store refusing a malformed object on its own terms
//! - `Backend` from the legacy store is always fatal, from the new store it is
//!   logged for create/delete/delete-collection
//! - `Reconciliation` is always fatal because a partially merged list is wrong

use crate::selector::SelectorError;
use thiserror::Error;

/// Errors returned by [`crate::storage::Storage`] implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The object does not exist in the store
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Resource kind
        kind: String,
        /// Object name
        name: String,
    },

    /// An object with the same name already exists
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Resource kind
        kind: String,
        /// Object name
        name: String,
    },

    /// Optimistic concurrency or precondition failure
    #[error("Conflict on {kind} '{name}': {reason}")]
    Conflict {
        /// Resource kind
        kind: String,
        /// Object name
        name: String,
        /// What did not match
        reason: String,
    },

    /// A caller-supplied validation callback rejected the object
    #[error("Invalid {kind} '{name}': {reason}")]
    Validation {
        /// Resource kind
        kind: String,
        /// Object name
        name: String,
        /// Validation message
        reason: String,
    },

    /// The store itself refused the object as malformed
    #[error("{kind} '{name}' rejected by store: {reason}")]
    Rejected {
        /// Resource kind
        kind: String,
        /// Object name
        name: String,
        /// Store message
        reason: String,
    },

    /// Any other store-level failure
    #[error("{store} storage failed during {operation}: {reason}")]
    Backend {
        /// Which store failed (`legacy`, `storage`, or an implementation name)
        store: String,
        /// Operation that failed
        operation: String,
        /// Underlying error message
        reason: String,
    },

    /// Failure to extract, correlate, or merge a list across stores
    #[error("Failed to reconcile {kind} list: {reason}")]
    Reconciliation {
        /// Resource kind
        kind: String,
        /// What went wrong
        reason: String,
    },

    /// The request context was cancelled before the operation completed
    #[error("Request cancelled during {operation}")]
    Cancelled {
        /// Operation that observed the cancellation
        operation: String,
    },
}

/// Result alias used throughout the crate.
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

impl StorageError {
    /// Shorthand for a [`StorageError::NotFound`].
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Shorthand for a [`StorageError::Backend`].
    pub fn backend(
        store: impl Into<String>,
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Backend {
            store: store.into(),
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`StorageError::Reconciliation`].
    pub fn reconciliation(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Reconciliation {
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the object was absent from the store.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the error came from a validation callback.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns true if retrying the same call may succeed.
    ///
    /// The adapter never retries; this is exposed for callers.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend { .. } | Self::Conflict { .. } => true,
            Self::NotFound { .. }
            | Self::AlreadyExists { .. }
            | Self::Validation { .. }
            | Self::Rejected { .. }
            | Self::Reconciliation { .. }
            | Self::Cancelled { .. } => false,
        }
    }

    /// Returns the Kubernetes status reason for this error.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::AlreadyExists { .. } => "AlreadyExists",
            Self::Conflict { .. } => "Conflict",
            Self::Validation { .. } => "Invalid",
            Self::Rejected { .. } => "BadRequest",
            Self::Backend { .. } => "InternalError",
            Self::Reconciliation { .. } => "ReconciliationFailed",
            Self::Cancelled { .. } => "Timeout",
        }
    }
}

impl From<SelectorError> for StorageError {
    fn from(err: SelectorError) -> Self {
        Self::Reconciliation {
            kind: "selector".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Map a kube client error onto a [`StorageError`].
///
/// | API code | Result |
/// |----------|--------|
/// | 404 | `NotFound` |
/// | 409 (`AlreadyExists` reason) | `AlreadyExists` |
/// | 409 (other) | `Conflict` |
/// | 400, 422 | `Rejected` |
/// | other | `Backend` |
#[must_use]
pub fn from_kube_error(err: kube::Error, kind: &str, name: &str, operation: &str) -> StorageError {
    match err {
        kube::Error::Api(ae) => match ae.code {
            404 => StorageError::not_found(kind, name),
            409 if ae.reason == "AlreadyExists" => StorageError::AlreadyExists {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            409 => StorageError::Conflict {
                kind: kind.to_string(),
                name: name.to_string(),
                reason: ae.message.clone(),
            },
            400 | 422 => StorageError::Rejected {
                kind: kind.to_string(),
                name: name.to_string(),
                reason: ae.message.clone(),
            },
            code => StorageError::backend(
                "kubernetes",
                operation,
                format!("HTTP {code}: {}", ae.message),
            ),
        },
        other => StorageError::backend("kubernetes", operation, other.to_string()),
    }
}

#[cfg(test)]
#[path = "storage_errors_tests.rs"]
mod storage_errors_tests;
