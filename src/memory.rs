// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process implementation of the storage contract.
//!
//! [`InMemoryStorage`] keeps objects in a name-ordered map, assigns
//! monotonically increasing resource versions and random uids, and honours
//! validations, preconditions, dry runs, label selectors and pagination. It can
//! stand in for either side of a dual writer, and supports failure injection
//! per operation so callers can exercise partial-failure paths.
//!
//! # Example
//!
//! ```rust
//! use dualwrite::context::RequestContext;
//! use dualwrite::memory::InMemoryStorage;
//! use dualwrite::storage::{CreateOptions, GetOptions, Storage, ValidateObject};
//! use k8s_openapi::api::core::v1::ConfigMap;
//! use kube::api::ObjectMeta;
//!
//! # async fn example() -> dualwrite::storage_errors::Result<()> {
//! let store = InMemoryStorage::<ConfigMap>::new("legacy");
//! let ctx = RequestContext::new();
//!
//! let cm = ConfigMap {
//!     metadata: ObjectMeta { name: Some("a".to_string()), ..Default::default() },
//!     ..Default::default()
//! };
//! store.create(&ctx, cm, &ValidateObject::none(), &CreateOptions::default()).await?;
//! let fetched = store.get(&ctx, "a", &GetOptions::default()).await?;
//! assert_eq!(fetched.metadata.resource_version.as_deref(), Some("1"));
//! # Ok(())
//! # }
//! ```

use crate::accessor::{kind_of, ObjectAccessor};
use crate::constants::{
    INITIAL_RESOURCE_VERSION, METHOD_CREATE, METHOD_DELETE, METHOD_DELETE_COLLECTION, METHOD_GET,
    METHOD_LIST, METHOD_UPDATE,
};
use crate::context::RequestContext;
use crate::storage::{
    CreateOptions, DeleteOptions, GetOptions, ListOptions, ObjectList, Storage, UpdateOptions,
    UpdatedObjectInfo, ValidateObject, ValidateObjectUpdate,
};
use crate::storage_errors::{Result, StorageError};
use crate::table::{default_table, Table, TableOptions};
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::RwLock;
use tracing::debug;

/// Storage operations that can be counted and made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageOperation {
    /// [`Storage::create`]
    Create,
    /// [`Storage::get`]
    Get,
    /// [`Storage::list`]
    List,
    /// [`Storage::update`]
    Update,
    /// [`Storage::delete`]
    Delete,
    /// [`Storage::delete_collection`]
    DeleteCollection,
}

impl StorageOperation {
    /// Method name used in errors and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => METHOD_CREATE,
            Self::Get => METHOD_GET,
            Self::List => METHOD_LIST,
            Self::Update => METHOD_UPDATE,
            Self::Delete => METHOD_DELETE,
            Self::DeleteCollection => METHOD_DELETE_COLLECTION,
        }
    }
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct State<K> {
    objects: BTreeMap<String, K>,
    next_resource_version: u64,
}

impl<K> State<K> {
    fn bump(&mut self) -> String {
        let rv = self.next_resource_version;
        self.next_resource_version += 1;
        rv.to_string()
    }

    fn current_resource_version(&self) -> String {
        (self.next_resource_version - 1).to_string()
    }
}

/// A complete [`Storage`] implementation held in memory.
pub struct InMemoryStorage<K> {
    name: String,
    singular_name: String,
    namespace: Option<String>,
    check_resource_version: bool,
    state: RwLock<State<K>>,
    injected_failures: Mutex<BTreeMap<StorageOperation, usize>>,
    calls: Mutex<BTreeMap<StorageOperation, usize>>,
    destroyed: AtomicBool,
}

impl<K> InMemoryStorage<K>
where
    K: Resource<DynamicType = ()> + Clone + Default + Send + Sync + 'static,
{
    /// A cluster-scoped store. `name` identifies the store in errors and logs.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            singular_name: kind_of::<K>().to_lowercase(),
            namespace: None,
            check_resource_version: false,
            state: RwLock::new(State {
                objects: BTreeMap::new(),
                next_resource_version: INITIAL_RESOURCE_VERSION,
            }),
            injected_failures: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(BTreeMap::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Scope the store to `namespace`; objects without one are placed in it.
    #[must_use]
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    /// Reject updates whose resource version differs from the stored one.
    ///
    /// Off by default: a store fed objects computed against the other store
    /// sees that store's resource versions.
    #[must_use]
    pub fn with_resource_version_checks(mut self, enabled: bool) -> Self {
        self.check_resource_version = enabled;
        self
    }

    /// Make the next call of `operation` fail with a backend error.
    pub fn fail_next(&self, operation: StorageOperation) {
        self.fail_times(operation, 1);
    }

    /// Make the next `times` calls of `operation` fail with a backend error.
    pub fn fail_times(&self, operation: StorageOperation, times: usize) {
        let mut failures = self
            .injected_failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *failures.entry(operation).or_default() += times;
    }

    /// Make every call of `operation` fail with a backend error.
    pub fn fail_always(&self, operation: StorageOperation) {
        self.fail_times(operation, usize::MAX / 2);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.injected_failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    /// Number of times `operation` has been called.
    #[must_use]
    pub fn calls(&self, operation: StorageOperation) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// True once [`Storage::destroy`] has been called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.state.read().await.objects.len()
    }

    /// True when the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.objects.is_empty()
    }

    /// All stored objects in name order.
    pub async fn snapshot(&self) -> Vec<K> {
        self.state.read().await.objects.values().cloned().collect()
    }

    /// Insert an object directly, bypassing validation and failure injection.
    ///
    /// A resource version is always assigned; a uid only when absent.
    ///
    /// # Errors
    ///
    /// Returns a rejection if the object has no name.
    pub async fn seed(&self, mut obj: K) -> Result<K> {
        let name = self.require_name(&obj)?;
        let mut state = self.state.write().await;
        self.stamp_new(&mut obj, &mut state);
        state.objects.insert(name, obj.clone());
        Ok(obj)
    }

    fn begin(&self, ctx: &RequestContext, operation: StorageOperation) -> Result<()> {
        *self
            .calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(operation)
            .or_default() += 1;

        ctx.ensure_active(operation.as_str())?;

        if self.is_destroyed() {
            return Err(StorageError::backend(
                &self.name,
                operation.as_str(),
                "store has been destroyed",
            ));
        }

        let mut failures = self
            .injected_failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(remaining) = failures.get_mut(&operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StorageError::backend(
                    &self.name,
                    operation.as_str(),
                    "injected failure",
                ));
            }
        }
        Ok(())
    }

    fn require_name(&self, obj: &K) -> Result<String> {
        obj.meta()
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| StorageError::Rejected {
                kind: kind_of::<K>(),
                name: String::new(),
                reason: "metadata.name: Required value".to_string(),
            })
    }

    fn stamp_new(&self, obj: &mut K, state: &mut State<K>) {
        if obj.meta().namespace.is_none() {
            obj.set_namespace(self.namespace.clone());
        }
        if obj.meta().uid.is_none() {
            obj.set_uid(Some(uuid::Uuid::new_v4().to_string()));
        }
        obj.set_resource_version(Some(state.bump()));
    }

    fn not_found(name: &str) -> StorageError {
        StorageError::not_found(kind_of::<K>(), name)
    }
}

#[async_trait]
impl<K> Storage<K> for InMemoryStorage<K>
where
    K: Resource<DynamicType = ()> + Clone + Default + Send + Sync + 'static,
{
    async fn create(
        &self,
        ctx: &RequestContext,
        mut obj: K,
        validation: &ValidateObject<K>,
        options: &CreateOptions,
    ) -> Result<K> {
        self.begin(ctx, StorageOperation::Create)?;
        let name = self.require_name(&obj)?;
        validation.validate(&obj)?;

        let mut state = self.state.write().await;
        if state.objects.contains_key(&name) {
            return Err(StorageError::AlreadyExists {
                kind: kind_of::<K>(),
                name,
            });
        }

        self.stamp_new(&mut obj, &mut state);
        if !options.dry_run {
            state.objects.insert(name.clone(), obj.clone());
        }
        debug!(store = %self.name, name = %name, resource_version = ?obj.resource_version(), "created object");
        Ok(obj)
    }

    async fn get(&self, ctx: &RequestContext, name: &str, _options: &GetOptions) -> Result<K> {
        self.begin(ctx, StorageOperation::Get)?;
        self.state
            .read()
            .await
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| Self::not_found(name))
    }

    async fn list(&self, ctx: &RequestContext, options: &ListOptions) -> Result<ObjectList<K>> {
        self.begin(ctx, StorageOperation::List)?;
        let state = self.state.read().await;

        let mut matching = state
            .objects
            .iter()
            .filter(|(name, _)| {
                options
                    .continue_token
                    .as_ref()
                    .is_none_or(|token| name.as_str() > token.as_str())
            })
            .filter(|(_, obj)| {
                options
                    .label_selector
                    .as_ref()
                    .is_none_or(|selector| selector.matches(&obj.selectable_labels()))
            })
            .map(|(_, obj)| obj.clone());

        let mut list = ObjectList::default();
        list.metadata.resource_version = Some(state.current_resource_version());

        match options.limit.filter(|l| *l > 0) {
            Some(limit) => {
                list.items = matching.by_ref().take(limit as usize).collect();
                let remaining = matching.count();
                if remaining > 0 {
                    list.metadata.continue_ = list.items.last().map(ResourceExt::name_any);
                    list.metadata.remaining_item_count = i64::try_from(remaining).ok();
                }
            }
            None => list.items = matching.collect(),
        }

        debug!(store = %self.name, items = list.items.len(), selector = ?options.label_selector.as_ref().map(ToString::to_string), "listed objects");
        Ok(list)
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
        self.begin(ctx, StorageOperation::Update)?;
        let mut state = self.state.write().await;
        let current = state.objects.get(name).cloned();

        if let (Some(preconditions), Some(current)) = (obj_info.preconditions(), current.as_ref()) {
            preconditions.check(current)?;
        }

        let mut updated = obj_info.updated_object(current.as_ref())?;
        updated.set_name(name);

        let Some(current) = current else {
            if !force_allow_create {
                return Err(Self::not_found(name));
            }
            create_validation.validate(&updated)?;
            self.stamp_new(&mut updated, &mut state);
            if !options.dry_run {
                state.objects.insert(name.to_string(), updated.clone());
            }
            debug!(store = %self.name, name = %name, "created object through update");
            return Ok((updated, true));
        };

        if self.check_resource_version {
            if let Some(rv) = updated.meta().resource_version.as_ref() {
                if current.meta().resource_version.as_ref() != Some(rv) {
                    return Err(StorageError::Conflict {
                        kind: kind_of::<K>(),
                        name: name.to_string(),
                        reason: "the object has been modified; please apply your changes to the latest version and try again".to_string(),
                    });
                }
            }
        }

        update_validation.validate(&updated, &current)?;

        if updated.meta().namespace.is_none() {
            updated.set_namespace(current.meta().namespace.clone());
        }
        updated.set_uid(current.meta().uid.clone());
        updated.set_resource_version(Some(state.bump()));
        if !options.dry_run {
            state.objects.insert(name.to_string(), updated.clone());
        }
        debug!(store = %self.name, name = %name, resource_version = ?updated.resource_version(), "updated object");
        Ok((updated, false))
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        name: &str,
        validation: &ValidateObject<K>,
        options: &DeleteOptions,
    ) -> Result<(K, bool)> {
        self.begin(ctx, StorageOperation::Delete)?;
        let mut state = self.state.write().await;
        let current = state
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| Self::not_found(name))?;

        if let Some(preconditions) = &options.preconditions {
            preconditions.check(&current)?;
        }
        validation.validate(&current)?;

        if !options.dry_run {
            state.objects.remove(name);
        }
        debug!(store = %self.name, name = %name, "deleted object");
        Ok((current, false))
    }

    async fn delete_collection(
        &self,
        ctx: &RequestContext,
        validation: &ValidateObject<K>,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> Result<ObjectList<K>> {
        self.begin(ctx, StorageOperation::DeleteCollection)?;
        let mut state = self.state.write().await;

        let selected: Vec<K> = state
            .objects
            .values()
            .filter(|obj| {
                list_options
                    .label_selector
                    .as_ref()
                    .is_none_or(|selector| selector.matches(&obj.selectable_labels()))
            })
            .cloned()
            .collect();

        for obj in &selected {
            validation.validate(obj)?;
        }

        if !options.dry_run {
            for obj in &selected {
                state.objects.remove(&obj.name_any());
            }
        }

        let mut deleted = ObjectList::new(selected);
        deleted.metadata.resource_version = Some(state.current_resource_version());
        debug!(store = %self.name, items = deleted.items.len(), "deleted collection");
        Ok(deleted)
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    fn singular_name(&self) -> String {
        self.singular_name.clone()
    }

    fn namespace_scoped(&self) -> bool {
        self.namespace.is_some()
    }

    fn new_object(&self) -> K {
        K::default()
    }

    fn new_list(&self) -> ObjectList<K> {
        ObjectList::default()
    }

    async fn convert_to_table(
        &self,
        _ctx: &RequestContext,
        objects: &[K],
        options: &TableOptions,
    ) -> Result<Table> {
        default_table(objects, options)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
