// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Update enrichment: carry identity bookkeeping across stores.
//!
//! After one store produces an object, the counterpart handed to the other
//! store must keep the caller's labels, provenance annotations (including the
//! origin key), resource version and uid. Enrichment merges the identity of an
//! authoritative object onto a copy of the returned object:
//!
//! - labels: overwritten by the authoritative labels
//! - annotations: union, authoritative value wins on a key collision
//! - resource version and uid: taken from the authoritative object
//!
//! Neither input is modified, and the payload of the returned object is left
//! untouched. The operation is idempotent: enriching twice from the same
//! authoritative object yields the same result as enriching once.

use crate::accessor::{ObjectAccessor, ObjectIdentity};
use kube::Resource;

/// Merge two identity snapshots; `authoritative` wins every contested field.
#[must_use]
pub fn merge_identity(authoritative: &ObjectIdentity, returned: &ObjectIdentity) -> ObjectIdentity {
    let annotations = match (&returned.annotations, &authoritative.annotations) {
        (None, None) => None,
        (returned, authoritative) => {
            let mut merged = returned.clone().unwrap_or_default();
            if let Some(authoritative) = authoritative {
                merged.extend(
                    authoritative
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
            }
            Some(merged)
        }
    };

    ObjectIdentity {
        name: returned.name.clone(),
        namespace: returned.namespace.clone(),
        labels: authoritative.labels.clone(),
        annotations,
        resource_version: authoritative.resource_version.clone(),
        uid: authoritative.uid.clone(),
    }
}

/// Produce a copy of `returned` enriched with the identity of `original`.
///
/// # Example
///
/// ```rust
/// use dualwrite::accessor::ObjectAccessor;
/// use dualwrite::enrich::enrich_returned_object;
/// use k8s_openapi::api::core::v1::ConfigMap;
/// use kube::Resource;
///
/// let mut original = ConfigMap::default();
/// original.set_origin_key("k1");
///
/// let mut returned = ConfigMap::default();
/// returned.set_name("a");
/// returned.set_uid(Some("legacy-uid".to_string()));
///
/// let enriched = enrich_returned_object(&original, &returned);
/// assert_eq!(enriched.origin_key(), Some("k1"));
/// assert_eq!(enriched.meta().uid, None);
/// ```
#[must_use]
pub fn enrich_returned_object<K>(original: &K, returned: &K) -> K
where
    K: Resource<DynamicType = ()> + Clone,
{
    let merged = merge_identity(&original.identity(), &returned.identity());
    let mut enriched = returned.clone();
    enriched.apply_identity(merged);
    enriched
}

#[cfg(test)]
#[path = "enrich_tests.rs"]
mod enrich_tests;
