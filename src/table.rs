// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tabular rendering of objects for `convert_to_table`.

use crate::accessor::ObjectAccessor;
use crate::storage_errors::Result;
use kube::{Resource, ResourceExt};
use serde::{Deserialize, Serialize};

/// Options controlling table rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOptions {
    /// Omit column definitions from the result
    pub no_headers: bool,
}

/// A column of a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumnDefinition {
    /// Human-readable column name
    pub name: String,
    /// OpenAPI type of the cells (`string`, `integer`, ...)
    #[serde(rename = "type")]
    pub type_: String,
    /// OpenAPI format hint (`name`, `date-time`, ...)
    pub format: String,
    /// Column description
    pub description: String,
    /// Display priority; 0 is always shown
    pub priority: i32,
}

/// A row of a [`Table`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    /// Cell values in column order
    pub cells: Vec<serde_json::Value>,
    /// Name of the object the row was rendered from
    pub object_name: String,
}

/// Objects rendered as rows under column definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Column definitions (empty when headers were suppressed)
    pub column_definitions: Vec<TableColumnDefinition>,
    /// One row per object
    pub rows: Vec<TableRow>,
}

fn column(name: &str, format: &str, description: &str) -> TableColumnDefinition {
    TableColumnDefinition {
        name: name.to_string(),
        type_: "string".to_string(),
        format: format.to_string(),
        description: description.to_string(),
        priority: 0,
    }
}

/// Render objects with Name, Resource Version and Origin Key columns.
///
/// # Errors
///
/// Returns a reconciliation error if an object has no name.
pub fn default_table<K>(objects: &[K], options: &TableOptions) -> Result<Table>
where
    K: Resource<DynamicType = ()>,
{
    let column_definitions = if options.no_headers {
        Vec::new()
    } else {
        vec![
            column("Name", "name", "Name of the object"),
            column("Resource Version", "", "Store-assigned resource version"),
            column("Origin Key", "", "Cross-store correlation id"),
        ]
    };

    let rows = objects
        .iter()
        .map(|obj| {
            let name = obj.object_name()?.to_string();
            Ok(TableRow {
                cells: vec![
                    serde_json::Value::String(name.clone()),
                    serde_json::Value::String(obj.resource_version().unwrap_or_default()),
                    serde_json::Value::String(obj.origin_key().unwrap_or_default().to_string()),
                ],
                object_name: name,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Table {
        column_definitions,
        rows,
    })
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod table_tests;
