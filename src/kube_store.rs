// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Storage contract backed by a Kubernetes API server.
//!
//! [`KubeStorage`] adapts a `kube::Api<K>` to [`Storage`], so a dual writer
//! can migrate objects into (or out of) any resource served by an API server.
//! Options are translated to `PostParams`, `ListParams` and `DeleteParams`, and
//! API errors are mapped through [`from_kube_error`].
//!
//! Objects handed over by the dual writer carry identity from the other
//! store. Before a write, the namespace is pinned to the one this store
//! serves, the origin key is mirrored into `metadata.labels` (API servers
//! only evaluate label selectors against real labels), and on replace the
//! uid and resource version are taken from the stored object.
//!
//! # Example
//!
//! ```rust,no_run
//! use dualwrite::kube_store::KubeStorage;
//! use k8s_openapi::api::core::v1::ConfigMap;
//! use kube::Client;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = Client::try_default().await?;
//! let storage: KubeStorage<ConfigMap> = KubeStorage::namespaced(client, "default");
//! # Ok(())
//! # }
//! ```

use crate::accessor::{kind_of, ObjectAccessor};
use crate::constants::{
    METHOD_CREATE, METHOD_DELETE, METHOD_DELETE_COLLECTION, METHOD_GET, METHOD_LIST,
    METHOD_UPDATE,
};
use crate::context::RequestContext;
use crate::labels::ORIGIN_KEY_LABEL;
use crate::storage::{
    CreateOptions, DeleteOptions, GetOptions, ListOptions, ObjectList, Storage, UpdateOptions,
    UpdatedObjectInfo, ValidateObject, ValidateObjectUpdate,
};
use crate::storage_errors::{from_kube_error, Result, StorageError};
use crate::table::{default_table, Table, TableOptions};
use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, PostParams};
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// [`Storage`] over a `kube::Api<K>`.
pub struct KubeStorage<K>
where
    K: Resource<DynamicType = ()>,
{
    api: Api<K>,
    namespace: Option<String>,
}

impl<K> KubeStorage<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    /// Store for a namespaced resource, holding the objects of `namespace`.
    #[must_use]
    pub fn namespaced(client: Client, namespace: &str) -> Self
    where
        K: Resource<Scope = NamespaceResourceScope>,
    {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: Some(namespace.to_string()),
        }
    }

    /// Store for a cluster-scoped resource.
    #[must_use]
    pub fn cluster(client: Client) -> Self
    where
        K: Resource<Scope = ClusterResourceScope>,
    {
        Self {
            api: Api::all(client),
            namespace: None,
        }
    }

    fn post_params(dry_run: bool, field_manager: Option<&String>) -> PostParams {
        PostParams {
            dry_run,
            field_manager: field_manager.cloned(),
        }
    }
}

/// Make `obj` addressable by this API server before it is written.
///
/// Pins the namespace and mirrors the origin key annotation into the labels
/// under [`ORIGIN_KEY_LABEL`].
fn prepare_object<K>(obj: &mut K, namespace: Option<&str>)
where
    K: Resource<DynamicType = ()>,
{
    obj.set_namespace(namespace.map(str::to_string));
    if let Some(key) = obj.origin_key().map(str::to_string) {
        obj.labels_mut().insert(ORIGIN_KEY_LABEL.to_string(), key);
    }
}

/// Translate [`ListOptions`] into kube `ListParams`.
#[must_use]
pub fn list_params(options: &ListOptions) -> ListParams {
    let mut params = ListParams::default();
    if let Some(selector) = options.label_selector.as_ref().filter(|s| !s.is_empty()) {
        params.label_selector = Some(selector.to_string());
    }
    params.field_selector.clone_from(&options.field_selector);
    params.limit = options.limit;
    params.continue_token.clone_from(&options.continue_token);
    params
}

/// Translate [`DeleteOptions`] into kube `DeleteParams`.
#[must_use]
pub fn delete_params(options: &DeleteOptions) -> DeleteParams {
    let mut params = DeleteParams {
        dry_run: options.dry_run,
        grace_period_seconds: options
            .grace_period_seconds
            .and_then(|s| u32::try_from(s).ok()),
        ..DeleteParams::default()
    };
    if let Some(preconditions) = &options.preconditions {
        params.preconditions = Some(kube::api::Preconditions {
            resource_version: preconditions.resource_version.clone(),
            uid: preconditions.uid.clone(),
        });
    }
    params
}

#[async_trait]
impl<K> Storage<K> for KubeStorage<K>
where
    K: Resource<DynamicType = ()>
        + Clone
        + Default
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn create(
        &self,
        ctx: &RequestContext,
        mut obj: K,
        validation: &ValidateObject<K>,
        options: &CreateOptions,
    ) -> Result<K> {
        ctx.ensure_active(METHOD_CREATE)?;
        validation.validate(&obj)?;
        let name = obj.meta().name.clone().unwrap_or_default();
        prepare_object(&mut obj, self.namespace.as_deref());
        obj.set_uid(None);
        obj.set_resource_version(None);
        let params = Self::post_params(options.dry_run, options.field_manager.as_ref());
        self.api
            .create(&params, &obj)
            .await
            .map_err(|e| from_kube_error(e, &kind_of::<K>(), &name, METHOD_CREATE))
    }

    async fn get(&self, ctx: &RequestContext, name: &str, _options: &GetOptions) -> Result<K> {
        ctx.ensure_active(METHOD_GET)?;
        self.api
            .get(name)
            .await
            .map_err(|e| from_kube_error(e, &kind_of::<K>(), name, METHOD_GET))
    }

    async fn list(&self, ctx: &RequestContext, options: &ListOptions) -> Result<ObjectList<K>> {
        ctx.ensure_active(METHOD_LIST)?;
        let params = list_params(options);
        let list = self
            .api
            .list(&params)
            .await
            .map_err(|e| from_kube_error(e, &kind_of::<K>(), "", METHOD_LIST))?;
        debug!(items = list.items.len(), selector = ?params.label_selector, "listed objects from API server");
        Ok(ObjectList::from(list))
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
        ctx.ensure_active(METHOD_UPDATE)?;
        let kind = kind_of::<K>();
        let current = self
            .api
            .get_opt(name)
            .await
            .map_err(|e| from_kube_error(e, &kind, name, METHOD_UPDATE))?;

        if let (Some(preconditions), Some(current)) = (obj_info.preconditions(), current.as_ref()) {
            preconditions.check(current)?;
        }

        let mut updated = obj_info.updated_object(current.as_ref())?;
        updated.meta_mut().name = Some(name.to_string());
        let params = Self::post_params(options.dry_run, options.field_manager.as_ref());

        let Some(current) = current else {
            if !force_allow_create {
                return Err(StorageError::not_found(kind, name));
            }
            create_validation.validate(&updated)?;
            prepare_object(&mut updated, self.namespace.as_deref());
            updated.set_uid(None);
            updated.set_resource_version(None);
            let created = self
                .api
                .create(&params, &updated)
                .await
                .map_err(|e| from_kube_error(e, &kind, name, METHOD_UPDATE))?;
            return Ok((created, true));
        };

        update_validation.validate(&updated, &current)?;
        prepare_object(&mut updated, self.namespace.as_deref());
        updated.set_uid(current.meta().uid.clone());
        updated.set_resource_version(current.meta().resource_version.clone());
        let replaced = self
            .api
            .replace(name, &params, &updated)
            .await
            .map_err(|e| from_kube_error(e, &kind, name, METHOD_UPDATE))?;
        Ok((replaced, false))
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        name: &str,
        validation: &ValidateObject<K>,
        options: &DeleteOptions,
    ) -> Result<(K, bool)> {
        ctx.ensure_active(METHOD_DELETE)?;
        let kind = kind_of::<K>();
        let current = self
            .api
            .get(name)
            .await
            .map_err(|e| from_kube_error(e, &kind, name, METHOD_DELETE))?;
        validation.validate(&current)?;

        let outcome = self
            .api
            .delete(name, &delete_params(options))
            .await
            .map_err(|e| from_kube_error(e, &kind, name, METHOD_DELETE))?;

        // Left: the object is still terminating (finalizers pending)
        Ok(match outcome.left() {
            Some(terminating) => (terminating, true),
            None => (current, false),
        })
    }

    async fn delete_collection(
        &self,
        ctx: &RequestContext,
        validation: &ValidateObject<K>,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> Result<ObjectList<K>> {
        ctx.ensure_active(METHOD_DELETE_COLLECTION)?;
        let kind = kind_of::<K>();
        let params = list_params(list_options);

        let selected = self
            .api
            .list(&params)
            .await
            .map_err(|e| from_kube_error(e, &kind, "", METHOD_DELETE_COLLECTION))?;
        for obj in &selected.items {
            validation.validate(obj)?;
        }

        let outcome = self
            .api
            .delete_collection(&delete_params(options), &params)
            .await
            .map_err(|e| from_kube_error(e, &kind, "", METHOD_DELETE_COLLECTION))?;

        Ok(match outcome.left() {
            Some(deleted) => ObjectList::from(deleted),
            None => ObjectList::from(selected),
        })
    }

    fn destroy(&self) {
        debug!(kind = %kind_of::<K>(), "releasing API server storage");
    }

    fn singular_name(&self) -> String {
        kind_of::<K>().to_lowercase()
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
#[path = "kube_store_tests.rs"]
mod kube_store_tests;
