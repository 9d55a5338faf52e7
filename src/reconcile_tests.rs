// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `reconcile.rs`

#[cfg(test)]
mod tests {
    use crate::accessor::ObjectAccessor;
    use crate::labels::ORIGIN_KEY_LABEL;
    use crate::reconcile::{correlate, merge_by_name, origin_key_selector, Correlation, NameIndex};
    use crate::selector::Operator;
    use crate::storage_errors::StorageError;
    use k8s_openapi::api::core::v1::ConfigMap;
    use std::collections::BTreeMap;

    fn config_map(name: &str, origin_key: Option<&str>, payload: &str) -> ConfigMap {
        let mut cm = ConfigMap {
            data: Some(BTreeMap::from([("v".to_string(), payload.to_string())])),
            ..Default::default()
        };
        cm.set_name(name);
        if let Some(key) = origin_key {
            cm.set_origin_key(key);
        }
        cm
    }

    fn payload(cm: &ConfigMap) -> &str {
        cm.data.as_ref().map_or("", |d| d["v"].as_str())
    }

    // ========================================================================
    // Selector Construction
    // ========================================================================

    #[test]
    fn test_origin_key_selector_deduplicates() {
        let selector = origin_key_selector("ConfigMap", ["k2", "k1", "k2"])
            .unwrap()
            .unwrap();

        let requirement = &selector.requirements()[0];
        assert_eq!(requirement.key(), ORIGIN_KEY_LABEL);
        assert_eq!(requirement.operator(), Operator::In);
        assert_eq!(requirement.values().len(), 2);
        assert_eq!(
            selector.to_string(),
            format!("{ORIGIN_KEY_LABEL} in (k1,k2)")
        );
    }

    #[test]
    fn test_origin_key_selector_empty() {
        let selector = origin_key_selector("ConfigMap", Vec::<String>::new()).unwrap();
        assert_eq!(selector, None);
    }

    #[test]
    fn test_origin_key_selector_rejects_invalid_key() {
        let err = origin_key_selector("ConfigMap", ["not a label value"]).unwrap_err();
        assert!(matches!(err, StorageError::Reconciliation { ref kind, .. } if kind == "ConfigMap"));
    }

    // ========================================================================
    // Correlation
    // ========================================================================

    #[test]
    fn test_correlate_empty_list_needs_nothing() {
        let correlation = correlate::<ConfigMap>(&[]).unwrap();
        assert_eq!(correlation, Correlation::NoCorrelationNeeded);
    }

    #[test]
    fn test_correlate_without_origin_keys_needs_nothing() {
        let items = vec![config_map("a", None, "1"), config_map("b", None, "2")];
        assert_eq!(correlate(&items).unwrap(), Correlation::NoCorrelationNeeded);
    }

    #[test]
    fn test_correlate_indexes_every_object() {
        let items = vec![
            config_map("a", Some("k1"), "1"),
            config_map("b", None, "2"),
            config_map("c", Some("k3"), "3"),
        ];

        let Correlation::Selector { selector, index } = correlate(&items).unwrap() else {
            panic!("expected a selector");
        };

        assert_eq!(index.len(), 3);
        assert_eq!(index["a"], 0);
        assert_eq!(index["b"], 1);
        assert_eq!(index["c"], 2);
        let keys: Vec<&str> = selector.requirements()[0]
            .values()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["k1", "k3"]);
    }

    #[test]
    fn test_correlate_duplicate_name_keeps_later_position() {
        let items = vec![
            config_map("a", Some("k1"), "1"),
            config_map("a", Some("k1"), "2"),
        ];

        let Correlation::Selector { index, .. } = correlate(&items).unwrap() else {
            panic!("expected a selector");
        };
        assert_eq!(index["a"], 1);
    }

    #[test]
    fn test_correlate_rejects_unnamed_object() {
        let mut unnamed = ConfigMap::default();
        unnamed.set_origin_key("k1");

        let err = correlate(&[unnamed]).unwrap_err();
        assert!(matches!(err, StorageError::Reconciliation { .. }));
    }

    // ========================================================================
    // Merge
    // ========================================================================

    #[test]
    fn test_merge_replaces_matching_rows_in_place() {
        let mut primary = vec![
            config_map("a", Some("k1"), "legacy-a"),
            config_map("b", Some("k2"), "legacy-b"),
            config_map("c", Some("k3"), "legacy-c"),
        ];
        let Correlation::Selector { index, .. } = correlate(&primary).unwrap() else {
            panic!("expected a selector");
        };
        let secondary = vec![
            config_map("c", Some("k3"), "unified-c"),
            config_map("a", Some("k1"), "unified-a"),
        ];

        let replaced = merge_by_name(&mut primary, &index, secondary).unwrap();

        assert_eq!(replaced, 2);
        let payloads: Vec<&str> = primary.iter().map(payload).collect();
        assert_eq!(payloads, vec!["unified-a", "legacy-b", "unified-c"]);
    }

    #[test]
    fn test_merge_never_adds_rows() {
        let mut primary = vec![config_map("a", Some("k1"), "legacy-a")];
        let Correlation::Selector { index, .. } = correlate(&primary).unwrap() else {
            panic!("expected a selector");
        };
        let secondary = vec![
            config_map("z", Some("k1"), "stray"),
            config_map("y", Some("k9"), "stray"),
        ];

        let replaced = merge_by_name(&mut primary, &index, secondary).unwrap();

        assert_eq!(replaced, 0);
        assert_eq!(primary.len(), 1);
        assert_eq!(payload(&primary[0]), "legacy-a");
    }

    #[test]
    fn test_merge_rejects_unnamed_secondary() {
        let mut primary = vec![config_map("a", Some("k1"), "1")];
        let index = NameIndex::from([("a".to_string(), 0)]);

        let err = merge_by_name(&mut primary, &index, vec![ConfigMap::default()]).unwrap_err();
        assert!(matches!(err, StorageError::Reconciliation { .. }));
    }

    #[test]
    fn test_merge_rejects_out_of_range_index() {
        let mut primary = vec![config_map("a", Some("k1"), "1")];
        let index = NameIndex::from([("a".to_string(), 5)]);

        let err = merge_by_name(&mut primary, &index, vec![config_map("a", None, "2")])
            .unwrap_err();
        assert!(err.to_string().contains("index 5 outside list of 1 items"));
    }
}
