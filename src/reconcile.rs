// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! List reconciliation across the two stores.
//!
//! The primary store owns ordering and pagination of a list. The secondary
//! store is queried only for the logical objects the primary returned,
//! identified by their origin keys, and any secondary object whose name
//! matches a primary row replaces that row in place.
//!
//! # Architecture
//!
//! 1. [`correlate`] walks the primary page, records each object's position by
//!    name and collects the origin keys. It returns a [`Correlation`]:
//!    either [`Correlation::NoCorrelationNeeded`] (nothing to look up) or a
//!    selector `origin-key in (...)` together with the name index.
//! 2. The caller lists the secondary store with that selector.
//! 3. [`merge_by_name`] overlays the secondary objects onto the primary page.
//!    Rows without a counterpart are left alone and secondary objects without
//!    a matching name are dropped, so the page never gains rows.
//!
//! The same selector also scopes secondary deletes to exactly the set removed
//! from the primary store.

use crate::accessor::{kind_of, ObjectAccessor};
use crate::labels::ORIGIN_KEY_LABEL;
use crate::selector::{LabelSelector, Operator, Requirement};
use crate::storage_errors::{Result, StorageError};
use kube::Resource;
use std::collections::{BTreeMap, BTreeSet};

/// Position of each primary object, keyed by name.
pub type NameIndex = BTreeMap<String, usize>;

/// Outcome of correlating a primary page with the secondary store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    /// No object carries an origin key; the secondary store must not be asked.
    NoCorrelationNeeded,
    /// Query the secondary store with `selector` and merge through `index`.
    Selector {
        /// `origin-key in (...)` over every collected origin key
        selector: LabelSelector,
        /// Position of each primary object by name
        index: NameIndex,
    },
}

/// Build `origin-key in (keys...)`.
///
/// Returns `Ok(None)` for an empty key set.
///
/// # Errors
///
/// Returns a reconciliation error if a key is not a valid label value.
pub fn origin_key_selector<I, V>(kind: &str, keys: I) -> Result<Option<LabelSelector>>
where
    I: IntoIterator<Item = V>,
    V: Into<String>,
{
    let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
    if keys.is_empty() {
        return Ok(None);
    }
    let requirement = Requirement::new(ORIGIN_KEY_LABEL, Operator::In, keys)
        .map_err(|e| StorageError::reconciliation(kind, e.to_string()))?;
    Ok(Some(LabelSelector::from(requirement)))
}

/// Index a primary page by name and build the correlation selector.
///
/// Objects without an origin key are indexed but contribute nothing to the
/// selector. When a name occurs twice the later position wins.
///
/// # Errors
///
/// Returns a reconciliation error if an object has no name or an origin key
/// is not a valid label value.
pub fn correlate<K>(items: &[K]) -> Result<Correlation>
where
    K: Resource<DynamicType = ()>,
{
    let mut index = NameIndex::new();
    let mut origin_keys = BTreeSet::new();

    for (i, obj) in items.iter().enumerate() {
        index.insert(obj.object_name()?.to_string(), i);
        if let Some(key) = obj.origin_key() {
            origin_keys.insert(key.to_string());
        }
    }

    match origin_key_selector(&kind_of::<K>(), origin_keys)? {
        None => Ok(Correlation::NoCorrelationNeeded),
        Some(selector) => Ok(Correlation::Selector { selector, index }),
    }
}

/// Replace primary rows with the secondary objects of the same name.
///
/// Returns the number of rows replaced.
///
/// # Errors
///
/// Returns a reconciliation error if a secondary object has no name or the
/// index points outside the primary page.
pub fn merge_by_name<K>(primary: &mut [K], index: &NameIndex, secondary: Vec<K>) -> Result<usize>
where
    K: Resource<DynamicType = ()>,
{
    let len = primary.len();
    let mut replaced = 0;
    for obj in secondary {
        let Some(&position) = index.get(obj.object_name()?) else {
            continue;
        };
        let slot = primary.get_mut(position).ok_or_else(|| {
            StorageError::reconciliation(
                kind_of::<K>(),
                format!("index {position} outside list of {len} items"),
            )
        })?;
        *slot = obj;
        replaced += 1;
    }
    Ok(replaced)
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod reconcile_tests;
