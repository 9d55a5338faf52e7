// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The storage contract shared by the legacy store, the new store and the
//! dual writer itself.
//!
//! Any two implementations of [`Storage`] can be composed by
//! [`crate::dualwriter::DualWriterMode2`], and the composition is again a
//! [`Storage`], so callers cannot tell the adapter apart from either backend.
//!
//! # Overview
//!
//! | Method | Semantics |
//! |--------|-----------|
//! | `create` | Persist a new object, running the create validation |
//! | `get` | Fetch one object by name |
//! | `list` | Fetch objects matching [`ListOptions`] |
//! | `update` | Replace an object computed by an [`UpdatedObjectInfo`] |
//! | `delete` | Remove one object, returning the last state |
//! | `delete_collection` | Remove every object matching [`ListOptions`] |
//! | `destroy` | Release resources held by the store |
//! | `singular_name`, `namespace_scoped`, `new_object`, `new_list` | Type descriptors |
//! | `convert_to_table` | Render objects as a [`Table`] |

use crate::context::RequestContext;
use crate::selector::LabelSelector;
use crate::storage_errors::{Result, StorageError};
use crate::table::{Table, TableOptions};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ListMeta;
use kube::Resource;
use std::sync::Arc;

// ============================================================================
// Options
// ============================================================================

/// Options for [`Storage::create`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Validate and compute the result without persisting it
    pub dry_run: bool,
    /// Name of the actor making the change
    pub field_manager: Option<String>,
}

/// Options for [`Storage::get`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Resource version the caller last observed
    pub resource_version: Option<String>,
}

/// Options for [`Storage::list`] and [`Storage::delete_collection`].
///
/// `label_selector: None` selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Restrict results to objects whose labels match
    pub label_selector: Option<LabelSelector>,
    /// Field selector passed through to backends that support one
    pub field_selector: Option<String>,
    /// Maximum number of items to return
    pub limit: Option<u32>,
    /// Continuation token from a previous page
    pub continue_token: Option<String>,
    /// Resource version the caller last observed
    pub resource_version: Option<String>,
}

impl ListOptions {
    /// Options selecting only objects matching `selector`.
    #[must_use]
    pub fn with_selector(selector: LabelSelector) -> Self {
        Self {
            label_selector: Some(selector),
            ..Self::default()
        }
    }
}

/// Options for [`Storage::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Validate and compute the result without persisting it
    pub dry_run: bool,
    /// Name of the actor making the change
    pub field_manager: Option<String>,
}

/// Conditions the stored object must satisfy for a write to proceed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preconditions {
    /// Required uid
    pub uid: Option<String>,
    /// Required resource version
    pub resource_version: Option<String>,
}

impl Preconditions {
    /// Check the preconditions against the currently stored object.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] when a precondition does not hold.
    pub fn check<K>(&self, current: &K) -> Result<()>
    where
        K: Resource<DynamicType = ()>,
    {
        let meta = current.meta();
        let kind = crate::accessor::kind_of::<K>();
        let name = meta.name.clone().unwrap_or_default();

        if let Some(uid) = &self.uid {
            if meta.uid.as_ref() != Some(uid) {
                return Err(StorageError::Conflict {
                    kind,
                    name,
                    reason: format!("precondition failed: uid in precondition {uid}, uid in object {:?}", meta.uid),
                });
            }
        }
        if let Some(rv) = &self.resource_version {
            if meta.resource_version.as_ref() != Some(rv) {
                return Err(StorageError::Conflict {
                    kind,
                    name,
                    reason: format!(
                        "precondition failed: resourceVersion in precondition {rv}, resourceVersion in object {:?}",
                        meta.resource_version
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Options for [`Storage::delete`] and [`Storage::delete_collection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Validate without deleting
    pub dry_run: bool,
    /// Conditions the stored object must satisfy
    pub preconditions: Option<Preconditions>,
    /// Grace period before the deletion takes effect
    pub grace_period_seconds: Option<i64>,
}

// ============================================================================
// Lists
// ============================================================================

/// A page of objects plus list metadata (continuation, resource version).
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectList<K> {
    /// Pagination and resource version metadata
    pub metadata: ListMeta,
    /// The objects, in store order
    pub items: Vec<K>,
}

impl<K> Default for ObjectList<K> {
    fn default() -> Self {
        Self {
            metadata: ListMeta::default(),
            items: Vec::new(),
        }
    }
}

impl<K> ObjectList<K> {
    /// A list with default metadata.
    #[must_use]
    pub fn new(items: Vec<K>) -> Self {
        Self {
            metadata: ListMeta::default(),
            items,
        }
    }

    /// Number of items in the page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the page holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K> From<kube::core::ObjectList<K>> for ObjectList<K>
where
    K: Clone,
{
    fn from(list: kube::core::ObjectList<K>) -> Self {
        Self {
            metadata: list.metadata,
            items: list.items,
        }
    }
}

// ============================================================================
// Validation Callbacks
// ============================================================================

type ValidateFn<K> = dyn Fn(&K) -> Result<()> + Send + Sync;
type ValidateUpdateFn<K> = dyn Fn(&K, &K) -> Result<()> + Send + Sync;

/// Caller-supplied validation run by a store before it persists an object.
pub struct ValidateObject<K>(Option<Arc<ValidateFn<K>>>);

impl<K> ValidateObject<K> {
    /// A validation that accepts everything.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    /// Wrap a validation closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&K) -> Result<()> + Send + Sync + 'static,
    {
        Self(Some(Arc::new(f)))
    }

    /// Run the validation.
    ///
    /// # Errors
    ///
    /// Returns whatever the wrapped closure returns.
    pub fn validate(&self, obj: &K) -> Result<()> {
        match &self.0 {
            Some(f) => f(obj),
            None => Ok(()),
        }
    }
}

impl<K> Clone for ValidateObject<K> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<K> Default for ValidateObject<K> {
    fn default() -> Self {
        Self::none()
    }
}

/// Caller-supplied validation run against `(new, old)` before an update.
pub struct ValidateObjectUpdate<K>(Option<Arc<ValidateUpdateFn<K>>>);

impl<K> ValidateObjectUpdate<K> {
    /// A validation that accepts everything.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    /// Wrap a validation closure taking `(new, old)`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&K, &K) -> Result<()> + Send + Sync + 'static,
    {
        Self(Some(Arc::new(f)))
    }

    /// Run the validation.
    ///
    /// # Errors
    ///
    /// Returns whatever the wrapped closure returns.
    pub fn validate(&self, new: &K, old: &K) -> Result<()> {
        match &self.0 {
            Some(f) => f(new, old),
            None => Ok(()),
        }
    }
}

impl<K> Clone for ValidateObjectUpdate<K> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<K> Default for ValidateObjectUpdate<K> {
    fn default() -> Self {
        Self::none()
    }
}

// ============================================================================
// Updated Object Computation
// ============================================================================

/// Computes the desired object for an update from the currently stored one.
pub trait UpdatedObjectInfo<K>: Send + Sync {
    /// Conditions the stored object must meet, if any.
    fn preconditions(&self) -> Option<Preconditions>;

    /// The object to persist, given the current object (`None` when absent).
    ///
    /// # Errors
    ///
    /// Returns an error when the update cannot be computed.
    fn updated_object(&self, old: Option<&K>) -> Result<K>;
}

/// Full replacement with a fixed object.
#[derive(Debug, Clone)]
pub struct DefaultUpdatedObjectInfo<K> {
    obj: K,
}

impl<K> DefaultUpdatedObjectInfo<K> {
    /// Replace the stored object with `obj`.
    pub fn new(obj: K) -> Self {
        Self { obj }
    }
}

impl<K> UpdatedObjectInfo<K> for DefaultUpdatedObjectInfo<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync,
{
    fn preconditions(&self) -> Option<Preconditions> {
        let meta = self.obj.meta();
        meta.uid.as_ref().map(|uid| Preconditions {
            uid: Some(uid.clone()),
            resource_version: None,
        })
    }

    fn updated_object(&self, _old: Option<&K>) -> Result<K> {
        Ok(self.obj.clone())
    }
}

/// Update computed by a closure over the current object.
pub struct UpdateFn<F> {
    f: F,
}

impl<F> UpdateFn<F> {
    /// Compute updates with `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<K, F> UpdatedObjectInfo<K> for UpdateFn<F>
where
    F: Fn(Option<&K>) -> Result<K> + Send + Sync,
{
    fn preconditions(&self) -> Option<Preconditions> {
        None
    }

    fn updated_object(&self, old: Option<&K>) -> Result<K> {
        (self.f)(old)
    }
}

/// Hands a precomputed object to a store, so the second store receives
/// exactly what the first one produced.
pub struct UpdateWrapper<K> {
    preconditions: Option<Preconditions>,
    updated: K,
}

impl<K> UpdateWrapper<K> {
    /// Wrap `upstream`, keeping its preconditions and overriding its computed
    /// object with `updated`.
    pub fn new(upstream: &dyn UpdatedObjectInfo<K>, updated: K) -> Self {
        Self {
            preconditions: upstream.preconditions(),
            updated,
        }
    }

    /// Hand `updated` over unconditionally.
    ///
    /// Used when the upstream preconditions describe another store's copy of
    /// the object and have already been checked against it.
    pub fn without_preconditions(updated: K) -> Self {
        Self {
            preconditions: None,
            updated,
        }
    }
}

impl<K> UpdatedObjectInfo<K> for UpdateWrapper<K>
where
    K: Clone + Send + Sync,
{
    fn preconditions(&self) -> Option<Preconditions> {
        self.preconditions.clone()
    }

    fn updated_object(&self, _old: Option<&K>) -> Result<K> {
        Ok(self.updated.clone())
    }
}

// ============================================================================
// Storage Contract
// ============================================================================

/// CRUD + list contract implemented by every backend and by the dual writer.
#[async_trait]
pub trait Storage<K>: Send + Sync
where
    K: Clone + Send + Sync + 'static,
{
    /// Persist a new object.
    async fn create(
        &self,
        ctx: &RequestContext,
        obj: K,
        validation: &ValidateObject<K>,
        options: &CreateOptions,
    ) -> Result<K>;

    /// Fetch one object by name.
    async fn get(&self, ctx: &RequestContext, name: &str, options: &GetOptions) -> Result<K>;

    /// Fetch the objects matching `options`.
    async fn list(&self, ctx: &RequestContext, options: &ListOptions) -> Result<ObjectList<K>>;

    /// Replace an object. Returns the stored object and whether it was created.
    #[allow(clippy::too_many_arguments)]
    async fn update(
        &self,
        ctx: &RequestContext,
        name: &str,
        obj_info: &dyn UpdatedObjectInfo<K>,
        create_validation: &ValidateObject<K>,
        update_validation: &ValidateObjectUpdate<K>,
        force_allow_create: bool,
        options: &UpdateOptions,
    ) -> Result<(K, bool)>;

    /// Delete one object. Returns its last state and whether deletion is
    /// still in progress asynchronously.
    async fn delete(
        &self,
        ctx: &RequestContext,
        name: &str,
        validation: &ValidateObject<K>,
        options: &DeleteOptions,
    ) -> Result<(K, bool)>;

    /// Delete every object matching `list_options`, returning the deleted set.
    async fn delete_collection(
        &self,
        ctx: &RequestContext,
        validation: &ValidateObject<K>,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> Result<ObjectList<K>>;

    /// Release resources held by the store.
    fn destroy(&self);

    /// Singular resource name, e.g. `configmap`.
    fn singular_name(&self) -> String;

    /// True when objects live inside a namespace.
    fn namespace_scoped(&self) -> bool;

    /// An empty object of the stored kind.
    fn new_object(&self) -> K;

    /// An empty list of the stored kind.
    fn new_list(&self) -> ObjectList<K>;

    /// Render objects as a table.
    async fn convert_to_table(
        &self,
        ctx: &RequestContext,
        objects: &[K],
        options: &TableOptions,
    ) -> Result<Table>;
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod storage_tests;
