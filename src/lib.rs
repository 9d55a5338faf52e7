// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Dualwrite - Dual-write storage adapter for live migrations
//!
//! Dualwrite sits in front of two object stores (a legacy store and a new
//! store) holding the same logical resource, and keeps them consistent while
//! data is migrated from one to the other. The adapter implements the same
//! storage contract as the stores it wraps, so callers see a single store.
//!
//! ## Overview
//!
//! - Mode 2 dual writing: the legacy store stays authoritative, the new store
//!   is written second and read first
//! - List reconciliation by origin key, without ever growing the legacy page
//! - Update enrichment that carries labels, annotations, resource version and
//!   uid across stores
//! - Per-store latency and outcome metrics via Prometheus
//!
//! ## Modules
//!
//! - [`storage`] - The storage contract and its option types
//! - [`dualwriter`] - The legacy-authoritative dual writer
//! - [`reconcile`] - Origin-key correlation and list merging
//! - [`enrich`] - Identity enrichment between stores
//! - [`accessor`] - Identity metadata accessors
//! - [`selector`] - Label selector requirements and matching
//! - [`memory`] - In-process store, usable on either side
//! - [`kube_store`] - Store backed by a Kubernetes API server
//! - [`metrics`] - Prometheus metrics
//! - [`config`] / [`logging`] - Ambient configuration and tracing setup
//!
//! ## Example
//!
//! ```rust
//! use dualwrite::context::RequestContext;
//! use dualwrite::dualwriter::DualWriterMode2;
//! use dualwrite::memory::InMemoryStorage;
//! use dualwrite::storage::{CreateOptions, GetOptions, Storage, ValidateObject};
//! use k8s_openapi::api::core::v1::ConfigMap;
//! use kube::api::ObjectMeta;
//!
//! # async fn example() -> dualwrite::storage_errors::Result<()> {
//! let writer = DualWriterMode2::new(
//!     InMemoryStorage::<ConfigMap>::new("legacy"),
//!     InMemoryStorage::<ConfigMap>::new("unified"),
//! );
//! let ctx = RequestContext::new();
//!
//! let cm = ConfigMap {
//!     metadata: ObjectMeta { name: Some("settings".to_string()), ..Default::default() },
//!     ..Default::default()
//! };
//! writer.create(&ctx, cm, &ValidateObject::none(), &CreateOptions::default()).await?;
//!
//! // Reads prefer the new store
//! let fetched = writer.get(&ctx, "settings", &GetOptions::default()).await?;
//! assert_eq!(fetched.metadata.name.as_deref(), Some("settings"));
//! # Ok(())
//! # }
//! ```

pub mod accessor;
pub mod config;
pub mod constants;
pub mod context;
pub mod dualwriter;
pub mod enrich;
pub mod kube_store;
pub mod labels;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod reconcile;
pub mod selector;
pub mod storage;
pub mod storage_errors;
pub mod table;
