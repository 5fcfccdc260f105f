//! dbt catalog.json parsing
//!
//! The catalog describes what was actually materialized in the warehouse:
//! one entry per relation with its physical column types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::manifest::{lowercase_columns, NamedColumn};

/// dbt catalog.json structure (subset of fields we care about)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Materialized nodes keyed by manifest unique_id
    #[serde(default)]
    pub nodes: BTreeMap<String, CatalogNode>,
}

impl Catalog {
    /// Build a typed catalog from an already loaded document
    pub fn from_value(raw: &Value) -> Result<Self, CatalogError> {
        Catalog::deserialize(raw).map_err(|e| CatalogError::ParseError(e.to_string()))
    }

    /// Parse catalog from JSON string
    pub fn from_str(json: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(json).map_err(|e| CatalogError::ParseError(e.to_string()))
    }

    pub fn get(&self, unique_id: &str) -> Option<&CatalogNode> {
        self.nodes.get(unique_id)
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.nodes.contains_key(unique_id)
    }

    /// Physical type of a column, looked up by node id and lower-cased column name
    pub fn column_type(&self, unique_id: &str, column_name: &str) -> Option<&str> {
        self.get(unique_id)?.column_type(column_name)
    }
}

/// A materialized relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogNode {
    pub metadata: CatalogNodeMetadata,

    /// Columns keyed by lower-cased name
    #[serde(deserialize_with = "deserialize_columns")]
    pub columns: BTreeMap<String, CatalogColumn>,
}

impl CatalogNode {
    pub fn column_type(&self, column_name: &str) -> Option<&str> {
        self.columns.get(column_name).map(|column| column.data_type.as_str())
    }
}

/// Relation metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogNodeMetadata {
    /// Relation kind as reported by the warehouse (BASE TABLE, VIEW, ...)
    #[serde(rename = "type")]
    pub relation_type: String,

    pub schema: String,

    pub name: String,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub owner: Option<String>,
}

/// A physical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogColumn {
    /// Warehouse type name, e.g. `INT64` or `character varying`
    #[serde(rename = "type")]
    pub data_type: String,

    #[serde(default)]
    pub comment: Option<String>,

    /// Ordinal position in the relation
    pub index: i64,

    pub name: String,
}

impl NamedColumn for CatalogColumn {
    fn name_mut(&mut self) -> &mut String {
        &mut self.name
    }
}

fn deserialize_columns<'de, D>(deserializer: D) -> Result<BTreeMap<String, CatalogColumn>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lowercase_columns(BTreeMap::deserialize(deserializer)?))
}

/// Catalog parsing errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to parse catalog JSON: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog_json() -> Value {
        json!({
            "metadata": {"dbt_version": "1.7.0"},
            "nodes": {
                "model.shop.orders": {
                    "metadata": {"type": "BASE TABLE", "schema": "marts", "name": "orders", "comment": null, "owner": "dbt"},
                    "columns": {
                        "ORDER_ID": {"type": "INTEGER", "index": 1, "name": "ORDER_ID", "comment": null},
                        "Amount": {"type": "NUMERIC(10,2)", "index": 2, "name": "Amount"}
                    }
                }
            },
            "sources": {}
        })
    }

    #[test]
    fn columns_are_lowercased() {
        let catalog = Catalog::from_value(&catalog_json()).unwrap();
        let node = catalog.get("model.shop.orders").unwrap();

        assert_eq!(node.metadata.relation_type, "BASE TABLE");
        assert_eq!(node.columns["order_id"].name, "order_id");
        assert_eq!(node.columns["amount"].index, 2);
        assert!(!node.columns.contains_key("ORDER_ID"));
    }

    #[test]
    fn column_type_lookup() {
        let catalog = Catalog::from_value(&catalog_json()).unwrap();

        assert_eq!(catalog.column_type("model.shop.orders", "order_id"), Some("INTEGER"));
        assert_eq!(catalog.column_type("model.shop.orders", "missing"), None);
        assert_eq!(catalog.column_type("model.shop.customers", "order_id"), None);
    }

    #[test]
    fn missing_column_type_is_parse_error() {
        let raw = json!({
            "nodes": {
                "model.shop.orders": {
                    "metadata": {"type": "VIEW", "schema": "marts", "name": "orders"},
                    "columns": {"id": {"index": 1, "name": "id"}}
                }
            }
        });
        assert!(matches!(Catalog::from_value(&raw), Err(CatalogError::ParseError(_))));
    }
}
