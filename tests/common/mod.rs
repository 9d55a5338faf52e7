// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use dualwrite::accessor::ObjectAccessor;
use dualwrite::context::RequestContext;
use dualwrite::storage::{
    CreateOptions, DeleteOptions, GetOptions, ListOptions, ObjectList, Storage, UpdateOptions,
    UpdatedObjectInfo, ValidateObject, ValidateObjectUpdate,
};
use dualwrite::storage_errors::Result;
use dualwrite::table::{Table, TableOptions};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace};
use kube::api::{Api, DeleteParams, ObjectMeta, PostParams};
use kube::client::Client;
use std::collections::BTreeMap;
use std::sync::Mutex;

// ============================================================================
// Object Builders
// ============================================================================

/// A `ConfigMap` named `name` carrying `origin_key` and a single `v` entry.
pub fn config_map(name: &str, origin_key: Option<&str>, value: &str) -> ConfigMap {
    let mut cm = ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([("v".to_string(), value.to_string())])),
        ..Default::default()
    };
    if let Some(key) = origin_key {
        cm.set_origin_key(key);
    }
    cm
}

/// Add a label to a `ConfigMap`.
pub fn labelled(mut cm: ConfigMap, key: &str, value: &str) -> ConfigMap {
    cm.metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), value.to_string());
    cm
}

/// The `v` entry of a `ConfigMap`, or `""`.
pub fn value(cm: &ConfigMap) -> &str {
    cm.data.as_ref().and_then(|d| d.get("v")).map_or("", String::as_str)
}

/// Names of the objects, in order.
pub fn names(items: &[ConfigMap]) -> Vec<String> {
    items
        .iter()
        .map(|cm| cm.metadata.name.clone().unwrap_or_default())
        .collect()
}

// ============================================================================
// Recording Store
// ============================================================================

/// Wraps a store and records the list options of every list and
/// delete-collection call.
pub struct RecordingStorage<S> {
    inner: S,
    lists: Mutex<Vec<ListOptions>>,
    delete_collections: Mutex<Vec<ListOptions>>,
}

impl<S> RecordingStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            lists: Mutex::new(Vec::new()),
            delete_collections: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn list_calls(&self) -> Vec<ListOptions> {
        self.lists.lock().unwrap().clone()
    }

    pub fn delete_collection_calls(&self) -> Vec<ListOptions> {
        self.delete_collections.lock().unwrap().clone()
    }
}

#[async_trait]
impl<S> Storage<ConfigMap> for RecordingStorage<S>
where
    S: Storage<ConfigMap>,
{
    async fn create(
        &self,
        ctx: &RequestContext,
        obj: ConfigMap,
        validation: &ValidateObject<ConfigMap>,
        options: &CreateOptions,
    ) -> Result<ConfigMap> {
        self.inner.create(ctx, obj, validation, options).await
    }

    async fn get(&self, ctx: &RequestContext, name: &str, options: &GetOptions) -> Result<ConfigMap> {
        self.inner.get(ctx, name, options).await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        options: &ListOptions,
    ) -> Result<ObjectList<ConfigMap>> {
        self.lists.lock().unwrap().push(options.clone());
        self.inner.list(ctx, options).await
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        name: &str,
        obj_info: &dyn UpdatedObjectInfo<ConfigMap>,
        create_validation: &ValidateObject<ConfigMap>,
        update_validation: &ValidateObjectUpdate<ConfigMap>,
        force_allow_create: bool,
        options: &UpdateOptions,
    ) -> Result<(ConfigMap, bool)> {
        self.inner
            .update(
                ctx,
                name,
                obj_info,
                create_validation,
                update_validation,
                force_allow_create,
                options,
            )
            .await
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        name: &str,
        validation: &ValidateObject<ConfigMap>,
        options: &DeleteOptions,
    ) -> Result<(ConfigMap, bool)> {
        self.inner.delete(ctx, name, validation, options).await
    }

    async fn delete_collection(
        &self,
        ctx: &RequestContext,
        validation: &ValidateObject<ConfigMap>,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> Result<ObjectList<ConfigMap>> {
        self.delete_collections
            .lock()
            .unwrap()
            .push(list_options.clone());
        self.inner
            .delete_collection(ctx, validation, options, list_options)
            .await
    }

    fn destroy(&self) {
        self.inner.destroy();
    }

    fn singular_name(&self) -> String {
        self.inner.singular_name()
    }

    fn namespace_scoped(&self) -> bool {
        self.inner.namespace_scoped()
    }

    fn new_object(&self) -> ConfigMap {
        self.inner.new_object()
    }

    fn new_list(&self) -> ObjectList<ConfigMap> {
        self.inner.new_list()
    }

    async fn convert_to_table(
        &self,
        ctx: &RequestContext,
        objects: &[ConfigMap],
        options: &TableOptions,
    ) -> Result<Table> {
        self.inner.convert_to_table(ctx, objects, options).await
    }
}

// ============================================================================
// Cluster Helpers
// ============================================================================

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([
                ("test".to_string(), "integration".to_string()),
                ("managed-by".to_string(), "dualwrite-test".to_string()),
            ])),
            ..Default::default()
        },
        ..Default::default()
    };

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("Test namespace already deleted: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
