// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Dual writer keeping a legacy store and a new store consistent during a
//! live migration.
//!
//! [`DualWriterMode2`] sits in front of both stores and implements the same
//! [`Storage`] contract, so callers use it exactly like either backend.
//!
//! # Mode 2
//!
//! The legacy store is the durability guarantee; the new store is kept in
//! sync on a best-effort basis until the migration completes.
//!
//! | Method | Order | Caller-visible result |
//! |--------|-------|-----------------------|
//! | `create` | legacy, then new (enriched) | new store's result; legacy failure aborts |
//! | `get` | new, falling back to legacy on any error | whichever answered |
//! | `list` | legacy, then new filtered by origin key | legacy page with new rows merged in |
//! | `update` | read new, write legacy, write new (enriched) | new store's result; legacy failure aborts |
//! | `delete` | legacy, then new | legacy result; new store failure is logged |
//! | `delete_collection` | legacy, then new scoped to the deleted origin keys | legacy result |
//! | type descriptors, `destroy`, `convert_to_table` | new only | new store's result |
//!
//! Sub-calls run strictly one after another inside the caller's request
//! context. There is no distributed transaction: when the second write fails
//! the stores diverge until a later write succeeds, and list/get
//! reconciliation covers the gap.

use crate::accessor::kind_of;
use crate::config::DualWriterConfig;
use crate::constants::{
    METHOD_CREATE, METHOD_DELETE, METHOD_DELETE_COLLECTION, METHOD_GET, METHOD_LIST,
    METHOD_UPDATE, MODE_LEGACY_PRIMARY, STORE_LEGACY, STORE_STORAGE,
};
use crate::context::RequestContext;
use crate::enrich::enrich_returned_object;
use crate::metrics;
use crate::reconcile::{correlate, merge_by_name, Correlation};
use crate::storage::{
    CreateOptions, DeleteOptions, GetOptions, ListOptions, ObjectList, Storage, UpdateOptions,
    UpdateWrapper, UpdatedObjectInfo, ValidateObject, ValidateObjectUpdate,
};
use crate::storage_errors::Result;
use crate::table::{Table, TableOptions};
use async_trait::async_trait;
use kube::Resource;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Instant;
use tracing::{debug, error, field, info, info_span, warn, Instrument, Span};

/// Legacy-authoritative dual writer.
pub struct DualWriterMode2<K, L, S> {
    legacy: L,
    storage: S,
    kind: String,
    metrics_enabled: bool,
    _kind: PhantomData<fn() -> K>,
}

impl<K, L, S> DualWriterMode2<K, L, S>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
    L: Storage<K>,
    S: Storage<K>,
{
    /// Compose `legacy` and `storage` with default configuration.
    pub fn new(legacy: L, storage: S) -> Self {
        Self::with_config(legacy, storage, &DualWriterConfig::default())
    }

    /// Compose `legacy` and `storage` with explicit configuration.
    pub fn with_config(legacy: L, storage: S, config: &DualWriterConfig) -> Self {
        Self {
            legacy,
            storage,
            kind: kind_of::<K>(),
            metrics_enabled: config.metrics.enabled,
            _kind: PhantomData,
        }
    }

    /// The mode label, `"2"`.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        MODE_LEGACY_PRIMARY
    }

    /// The legacy store.
    pub fn legacy(&self) -> &L {
        &self.legacy
    }

    /// The new store.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn span(&self, method: &'static str, name: Option<&str>, resource_version: Option<&str>) -> Span {
        let span = info_span!(
            "dual_writer",
            mode = MODE_LEGACY_PRIMARY,
            kind = %self.kind,
            method,
            name = field::Empty,
            resource_version = field::Empty
        );
        if let Some(name) = name {
            span.record("name", name);
        }
        if let Some(rv) = resource_version {
            span.record("resource_version", rv);
        }
        span
    }

    async fn call<T, F>(
        &self,
        store: &'static str,
        ctx: &RequestContext,
        method: &'static str,
        fut: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let start = Instant::now();
        let result = ctx.run(method, fut).await;
        if self.metrics_enabled {
            metrics::record_store_call(
                store,
                MODE_LEGACY_PRIMARY,
                &self.kind,
                method,
                result.is_err(),
                start.elapsed(),
            );
        }
        result
    }

    fn finish<T>(&self, method: &'static str, start: Instant, result: Result<T>) -> Result<T> {
        if self.metrics_enabled {
            metrics::record_request(
                MODE_LEGACY_PRIMARY,
                &self.kind,
                method,
                result.is_ok(),
                start.elapsed(),
            );
        }
        result
    }

    fn diverged(&self, method: &'static str) {
        if self.metrics_enabled {
            metrics::record_divergence(MODE_LEGACY_PRIMARY, &self.kind, method);
        }
    }

    async fn create_inner(
        &self,
        ctx: &RequestContext,
        original: K,
        validation: &ValidateObject<K>,
        options: &CreateOptions,
    ) -> Result<K> {
        let created = self
            .call(
                STORE_LEGACY,
                ctx,
                METHOD_CREATE,
                self.legacy.create(ctx, original.clone(), validation, options),
            )
            .await
            .inspect_err(|e| error!(error = %e, "unable to create object in legacy storage"))?;

        let enriched = enrich_returned_object(&original, &created);

        self.call(
            STORE_STORAGE,
            ctx,
            METHOD_CREATE,
            self.storage.create(ctx, enriched, validation, options),
        )
        .await
        .inspect_err(|e| {
            error!(error = %e, "unable to create object in storage");
            self.diverged(METHOD_CREATE);
        })
    }

    async fn get_inner(&self, ctx: &RequestContext, name: &str, options: &GetOptions) -> Result<K> {
        match self
            .call(STORE_STORAGE, ctx, METHOD_GET, self.storage.get(ctx, name, options))
            .await
        {
            Ok(obj) => return Ok(obj),
            Err(e) if e.is_not_found() => info!("object not found in storage"),
            Err(e) => warn!(error = %e, "unable to fetch object from storage"),
        }

        self.call(STORE_LEGACY, ctx, METHOD_GET, self.legacy.get(ctx, name, options))
            .await
    }

    async fn list_inner(&self, ctx: &RequestContext, options: &ListOptions) -> Result<ObjectList<K>> {
        let mut legacy_list = self
            .call(STORE_LEGACY, ctx, METHOD_LIST, self.legacy.list(ctx, options))
            .await
            .inspect_err(|e| error!(error = %e, "unable to list objects from legacy storage"))?;

        let (selector, index) = match correlate(&legacy_list.items)? {
            Correlation::NoCorrelationNeeded => {
                debug!("no origin keys in legacy list, skipping reconciliation");
                return Ok(legacy_list);
            }
            Correlation::Selector { selector, index } => (selector, index),
        };

        let storage_options = ListOptions::with_selector(selector);
        let storage_list = self
            .call(STORE_STORAGE, ctx, METHOD_LIST, self.storage.list(ctx, &storage_options))
            .await
            .inspect_err(|e| error!(error = %e, "unable to list objects from storage"))?;

        let replaced = merge_by_name(&mut legacy_list.items, &index, storage_list.items)?;
        debug!(
            items = legacy_list.items.len(),
            replaced, "reconciled legacy list with storage"
        );
        Ok(legacy_list)
    }

    #[allow(clippy::too_many_arguments)]
    async fn update_inner(
        &self,
        ctx: &RequestContext,
        name: &str,
        obj_info: &dyn UpdatedObjectInfo<K>,
        create_validation: &ValidateObject<K>,
        update_validation: &ValidateObjectUpdate<K>,
        force_allow_create: bool,
        options: &UpdateOptions,
    ) -> Result<(K, bool)> {
        let baseline = GetOptions::default();
        let original = match self
            .call(STORE_STORAGE, ctx, METHOD_GET, self.storage.get(ctx, name, &baseline))
            .await
        {
            Ok(obj) => Some(obj),
            Err(e) if e.is_not_found() => {
                info!("object not found for update, creating one");
                None
            }
            Err(e) => {
                error!(error = %e, "could not get object to update");
                return Err(e);
            }
        };

        // Caller preconditions describe the copy it read: the new store's when
        // the new store holds the object, the legacy store's otherwise.
        let legacy_info = match &original {
            Some(current) => {
                if let Some(preconditions) = obj_info.preconditions() {
                    preconditions.check(current).inspect_err(
                        |e| warn!(error = %e, "update preconditions do not hold in storage"),
                    )?;
                }
                let updated = obj_info
                    .updated_object(Some(current))
                    .inspect_err(|e| error!(error = %e, "could not update or create object"))?;
                UpdateWrapper::without_preconditions(updated)
            }
            None => {
                let updated = obj_info
                    .updated_object(None)
                    .inspect_err(|e| error!(error = %e, "could not update or create object"))?;
                UpdateWrapper::new(obj_info, updated)
            }
        };

        let (legacy_obj, _) = self
            .call(
                STORE_LEGACY,
                ctx,
                METHOD_UPDATE,
                self.legacy.update(
                    ctx,
                    name,
                    &legacy_info,
                    create_validation,
                    update_validation,
                    force_allow_create,
                    options,
                ),
            )
            .await
            .inspect_err(|e| error!(error = %e, "could not update in legacy storage"))?;

        // Enrichment is idempotent, so one pass from the baseline covers both
        // the baseline and the legacy result.
        let enriched = match &original {
            Some(original) => enrich_returned_object(original, &legacy_obj),
            None => legacy_obj,
        };

        let storage_info = UpdateWrapper::new(obj_info, enriched);
        self.call(
            STORE_STORAGE,
            ctx,
            METHOD_UPDATE,
            self.storage.update(
                ctx,
                name,
                &storage_info,
                create_validation,
                update_validation,
                force_allow_create,
                options,
            ),
        )
        .await
        .inspect_err(|e| {
            error!(error = %e, "could not update in storage");
            self.diverged(METHOD_UPDATE);
        })
    }

    async fn delete_inner(
        &self,
        ctx: &RequestContext,
        name: &str,
        validation: &ValidateObject<K>,
        options: &DeleteOptions,
    ) -> Result<(K, bool)> {
        let legacy_result = self
            .call(
                STORE_LEGACY,
                ctx,
                METHOD_DELETE,
                self.legacy.delete(ctx, name, validation, options),
            )
            .await;

        match &legacy_result {
            Ok(_) => {}
            Err(e) if e.is_not_found() => info!("object not found in legacy storage"),
            Err(e) => {
                error!(error = %e, "could not delete from legacy storage");
                return legacy_result;
            }
        }

        match self
            .call(
                STORE_STORAGE,
                ctx,
                METHOD_DELETE,
                self.storage.delete(ctx, name, validation, options),
            )
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => debug!("object not found in storage"),
            Err(e) => {
                warn!(error = %e, "could not delete from storage");
                if legacy_result.is_ok() {
                    self.diverged(METHOD_DELETE);
                }
            }
        }

        legacy_result
    }

    async fn delete_collection_inner(
        &self,
        ctx: &RequestContext,
        validation: &ValidateObject<K>,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> Result<ObjectList<K>> {
        let deleted = self
            .call(
                STORE_LEGACY,
                ctx,
                METHOD_DELETE_COLLECTION,
                self.legacy
                    .delete_collection(ctx, validation, options, list_options),
            )
            .await
            .inspect_err(|e| {
                error!(error = %e, "failed to delete collection from legacy storage");
            })?;

        // Only the items removed from the legacy store are targeted in storage.
        let Correlation::Selector { selector, .. } = correlate(&deleted.items)? else {
            debug!("no origin keys in deleted collection, skipping storage");
            return Ok(deleted);
        };

        let storage_options = ListOptions::with_selector(selector);
        match self
            .call(
                STORE_STORAGE,
                ctx,
                METHOD_DELETE_COLLECTION,
                self.storage
                    .delete_collection(ctx, validation, options, &storage_options),
            )
            .await
        {
            Ok(res) => debug!(deleted = res.items.len(), "deleted collection from storage"),
            Err(e) => {
                warn!(error = %e, "failed to delete collection from storage");
                self.diverged(METHOD_DELETE_COLLECTION);
            }
        }

        Ok(deleted)
    }
}

#[async_trait]
impl<K, L, S> Storage<K> for DualWriterMode2<K, L, S>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
    L: Storage<K>,
    S: Storage<K>,
{
    async fn create(
        &self,
        ctx: &RequestContext,
        obj: K,
        validation: &ValidateObject<K>,
        options: &CreateOptions,
    ) -> Result<K> {
        let start = Instant::now();
        let ctx = ctx.with_span(self.span(METHOD_CREATE, obj.meta().name.as_deref(), None));
        let span = ctx.span().clone();
        let result = self
            .create_inner(&ctx, obj, validation, options)
            .instrument(span)
            .await;
        self.finish(METHOD_CREATE, start, result)
    }

    async fn get(&self, ctx: &RequestContext, name: &str, options: &GetOptions) -> Result<K> {
        let start = Instant::now();
        let ctx = ctx.with_span(self.span(
            METHOD_GET,
            Some(name),
            options.resource_version.as_deref(),
        ));
        let span = ctx.span().clone();
        let result = self.get_inner(&ctx, name, options).instrument(span).await;
        self.finish(METHOD_GET, start, result)
    }

    async fn list(&self, ctx: &RequestContext, options: &ListOptions) -> Result<ObjectList<K>> {
        let start = Instant::now();
        let ctx = ctx.with_span(self.span(METHOD_LIST, None, options.resource_version.as_deref()));
        let span = ctx.span().clone();
        let result = self.list_inner(&ctx, options).instrument(span).await;
        self.finish(METHOD_LIST, start, result)
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        name: &str,
        obj_info: &dyn UpdatedObjectInfo<K>,
        create_validation: &ValidateObject<K>,
        update_validation: &ValidateObjectUpdate<K>,
        force_allow_create: bool,
        options: &UpdateOptions,
    ) -> Result<(K, bool)> {
        let start = Instant::now();
        let ctx = ctx.with_span(self.span(METHOD_UPDATE, Some(name), None));
        let span = ctx.span().clone();
        let result = self
            .update_inner(
                &ctx,
                name,
                obj_info,
                create_validation,
                update_validation,
                force_allow_create,
                options,
            )
            .instrument(span)
            .await;
        self.finish(METHOD_UPDATE, start, result)
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        name: &str,
        validation: &ValidateObject<K>,
        options: &DeleteOptions,
    ) -> Result<(K, bool)> {
        let start = Instant::now();
        let ctx = ctx.with_span(self.span(METHOD_DELETE, Some(name), None));
        let span = ctx.span().clone();
        let result = self
            .delete_inner(&ctx, name, validation, options)
            .instrument(span)
            .await;
        self.finish(METHOD_DELETE, start, result)
    }

    async fn delete_collection(
        &self,
        ctx: &RequestContext,
        validation: &ValidateObject<K>,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> Result<ObjectList<K>> {
        let start = Instant::now();
        let ctx = ctx.with_span(self.span(
            METHOD_DELETE_COLLECTION,
            None,
            list_options.resource_version.as_deref(),
        ));
        let span = ctx.span().clone();
        let result = self
            .delete_collection_inner(&ctx, validation, options, list_options)
            .instrument(span)
            .await;
        self.finish(METHOD_DELETE_COLLECTION, start, result)
    }

    fn destroy(&self) {
        self.storage.destroy();
    }

    fn singular_name(&self) -> String {
        self.storage.singular_name()
    }

    fn namespace_scoped(&self) -> bool {
        self.storage.namespace_scoped()
    }

    fn new_object(&self) -> K {
        self.storage.new_object()
    }

    fn new_list(&self) -> ObjectList<K> {
        self.storage.new_list()
    }

    async fn convert_to_table(
        &self,
        ctx: &RequestContext,
        objects: &[K],
        options: &TableOptions,
    ) -> Result<Table> {
        self.storage.convert_to_table(ctx, objects, options).await
    }
}

#[cfg(test)]
#[path = "dualwriter_tests.rs"]
mod dualwriter_tests;
