// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the dual-write adapter.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Mode Constants
// ============================================================================

/// Mode label for the legacy-authoritative dual writer.
///
/// Writes go to the legacy store first and then to the new store; reads prefer
/// the new store and fall back to the legacy store.
pub const MODE_LEGACY_PRIMARY: &str = "2";

// ============================================================================
// Store Names
// ============================================================================

/// Store label used in logs and metrics for the legacy backend
pub const STORE_LEGACY: &str = "legacy";

/// Store label used in logs and metrics for the new backend
pub const STORE_STORAGE: &str = "storage";

// ============================================================================
// Operation Names
// ============================================================================

/// Method name for create operations
pub const METHOD_CREATE: &str = "create";

/// Method name for get operations
pub const METHOD_GET: &str = "get";

/// Method name for list operations
pub const METHOD_LIST: &str = "list";

/// Method name for update operations
pub const METHOD_UPDATE: &str = "update";

/// Method name for delete operations
pub const METHOD_DELETE: &str = "delete";

/// Method name for collection deletes
pub const METHOD_DELETE_COLLECTION: &str = "delete_collection";

// ============================================================================
// Outcome Values
// ============================================================================

/// Outcome label for a successful operation
pub const OUTCOME_SUCCESS: &str = "success";

/// Outcome label for a failed operation
pub const OUTCOME_ERROR: &str = "error";

// ============================================================================
// Label Syntax Limits
// ============================================================================

/// Maximum length of a label value and of the name segment of a label key
pub const LABEL_VALUE_MAX_LENGTH: usize = 63;

/// Maximum length of the DNS subdomain prefix of a label key
pub const LABEL_PREFIX_MAX_LENGTH: usize = 253;

// ============================================================================
// In-Memory Store Constants
// ============================================================================

/// First resource version handed out by an in-memory store
pub const INITIAL_RESOURCE_VERSION: u64 = 1;

// ============================================================================
// Logging Defaults
// ============================================================================

/// Default log level when neither configuration nor `RUST_LOG` provide one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable overriding the log filter
pub const ENV_RUST_LOG: &str = "RUST_LOG";

/// Environment variable overriding the log output format (`text` or `json`)
pub const ENV_RUST_LOG_FORMAT: &str = "RUST_LOG_FORMAT";

/// Environment variable toggling metrics recording
pub const ENV_METRICS_ENABLED: &str = "DUALWRITE_METRICS_ENABLED";
