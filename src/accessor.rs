// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Uniform read/write access to object identity metadata.
//!
//! `kube::ResourceExt` already covers the getters for name, namespace, labels,
//! annotations, resource version and uid. [`ObjectAccessor`] adds the setters
//! the dual writer needs and the origin key, which is persisted as the
//! [`ORIGIN_KEY_ANNOTATION`] annotation.
//!
//! # Example
//!
//! ```rust
//! use dualwrite::accessor::ObjectAccessor;
//! use k8s_openapi::api::core::v1::ConfigMap;
//!
//! let mut cm = ConfigMap::default();
//! cm.set_origin_key("k1");
//! assert_eq!(cm.origin_key(), Some("k1"));
//! ```

use crate::labels::{ORIGIN_KEY_ANNOTATION, ORIGIN_KEY_LABEL};
use crate::storage_errors::{Result, StorageError};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Owned snapshot of the identity fields of an object.
///
/// This is the value the update enrichment step merges; it never aliases the
/// object it was taken from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectIdentity {
    /// Object name
    pub name: Option<String>,
    /// Object namespace
    pub namespace: Option<String>,
    /// Labels (`None` when the object carries no label map)
    pub labels: Option<BTreeMap<String, String>>,
    /// Annotations (`None` when the object carries no annotation map)
    pub annotations: Option<BTreeMap<String, String>>,
    /// Store-assigned resource version
    pub resource_version: Option<String>,
    /// Store-assigned unique id
    pub uid: Option<String>,
}

impl ObjectIdentity {
    /// The origin key carried in the snapshot's annotations.
    #[must_use]
    pub fn origin_key(&self) -> Option<&str> {
        self.annotations
            .as_ref()
            .and_then(|a| a.get(ORIGIN_KEY_ANNOTATION))
            .map(String::as_str)
    }
}

/// Identity metadata accessor for any Kubernetes-style resource.
pub trait ObjectAccessor {
    /// The object name, or a reconciliation error if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Reconciliation`] when `metadata.name` is unset.
    fn object_name(&self) -> Result<&str>;

    /// The cross-store correlation id, if set.
    fn origin_key(&self) -> Option<&str>;

    /// Set the cross-store correlation id.
    fn set_origin_key(&mut self, key: &str);

    /// Set the name.
    fn set_name(&mut self, name: &str);

    /// Set the namespace.
    fn set_namespace(&mut self, namespace: Option<String>);

    /// Replace the full label map.
    fn set_labels(&mut self, labels: Option<BTreeMap<String, String>>);

    /// Replace the full annotation map.
    fn set_annotations(&mut self, annotations: Option<BTreeMap<String, String>>);

    /// Set the resource version.
    fn set_resource_version(&mut self, resource_version: Option<String>);

    /// Set the unique id.
    fn set_uid(&mut self, uid: Option<String>);

    /// Labels as seen by selectors: the real labels plus the origin key
    /// under [`ORIGIN_KEY_LABEL`].
    fn selectable_labels(&self) -> BTreeMap<String, String>;

    /// Owned snapshot of all identity fields.
    fn identity(&self) -> ObjectIdentity;

    /// Overwrite all identity fields from a snapshot.
    fn apply_identity(&mut self, identity: ObjectIdentity);
}

impl<K> ObjectAccessor for K
where
    K: Resource<DynamicType = ()>,
{
    fn object_name(&self) -> Result<&str> {
        self.meta().name.as_deref().ok_or_else(|| {
            StorageError::reconciliation(kind_of::<K>(), "object has no metadata.name")
        })
    }

    fn origin_key(&self) -> Option<&str> {
        self.meta()
            .annotations
            .as_ref()
            .and_then(|a| a.get(ORIGIN_KEY_ANNOTATION))
            .map(String::as_str)
    }

    fn set_origin_key(&mut self, key: &str) {
        self.annotations_mut()
            .insert(ORIGIN_KEY_ANNOTATION.to_string(), key.to_string());
    }

    fn set_name(&mut self, name: &str) {
        self.meta_mut().name = Some(name.to_string());
    }

    fn set_namespace(&mut self, namespace: Option<String>) {
        self.meta_mut().namespace = namespace;
    }

    fn set_labels(&mut self, labels: Option<BTreeMap<String, String>>) {
        self.meta_mut().labels = labels;
    }

    fn set_annotations(&mut self, annotations: Option<BTreeMap<String, String>>) {
        self.meta_mut().annotations = annotations;
    }

    fn set_resource_version(&mut self, resource_version: Option<String>) {
        self.meta_mut().resource_version = resource_version;
    }

    fn set_uid(&mut self, uid: Option<String>) {
        self.meta_mut().uid = uid;
    }

    fn selectable_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.labels().clone();
        if let Some(key) = self.origin_key() {
            labels.insert(ORIGIN_KEY_LABEL.to_string(), key.to_string());
        }
        labels
    }

    fn identity(&self) -> ObjectIdentity {
        let meta = self.meta();
        ObjectIdentity {
            name: meta.name.clone(),
            namespace: meta.namespace.clone(),
            labels: meta.labels.clone(),
            annotations: meta.annotations.clone(),
            resource_version: meta.resource_version.clone(),
            uid: meta.uid.clone(),
        }
    }

    fn apply_identity(&mut self, identity: ObjectIdentity) {
        let meta = self.meta_mut();
        meta.name = identity.name;
        meta.namespace = identity.namespace;
        meta.labels = identity.labels;
        meta.annotations = identity.annotations;
        meta.resource_version = identity.resource_version;
        meta.uid = identity.uid;
    }
}

/// Name of a kind for logs, metrics and errors.
#[must_use]
pub fn kind_of<K>() -> String
where
    K: Resource<DynamicType = ()>,
{
    K::kind(&()).to_string()
}

#[cfg(test)]
#[path = "accessor_tests.rs"]
mod accessor_tests;
