// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label and annotation keys shared by both stores.
//!
//! The origin key is persisted as an annotation on every object so the same
//! logical object can be located in the legacy store and in the new store,
//! even though each store assigns its own internal identity. Correlation
//! selectors address it through a synthetic label with the same key.

// ============================================================================
// Correlation
// ============================================================================

/// Annotation holding the stable cross-store correlation id
pub const ORIGIN_KEY_ANNOTATION: &str = "dualwrite.io/origin-key";

/// Synthetic label key used in correlation selectors.
///
/// The in-memory store exposes the origin key under this key when evaluating
/// selectors. Stores backed by an API server write it as a real label.
pub const ORIGIN_KEY_LABEL: &str = ORIGIN_KEY_ANNOTATION;
