//! dbt manifest.json parsing
//!
//! Decoding a manifest is also its validation: adapter support, measure
//! filter shape and exposure main models are checked while the typed
//! records are built. Column maps are keyed by lower-cased column name.

use looksmith_core::DiagnosticCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::catalog::CatalogNode;
use crate::meta::{null_as_default, ColumnMeta, ModelMeta};

/// Warehouse adapters the generator knows how to map types for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    BigQuery,
    Postgres,
    Redshift,
    Snowflake,
    Spark,
}

impl AdapterType {
    pub const ALL: [AdapterType; 5] = [
        Self::BigQuery,
        Self::Postgres,
        Self::Redshift,
        Self::Snowflake,
        Self::Spark,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigQuery => "bigquery",
            Self::Postgres => "postgres",
            Self::Redshift => "redshift",
            Self::Snowflake => "snowflake",
            Self::Spark => "spark",
        }
    }
}

impl FromStr for AdapterType {
    type Err = ManifestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|adapter| adapter.as_str() == value)
            .ok_or_else(|| ManifestError::UnsupportedAdapter {
                value: value.to_string(),
            })
    }
}

impl std::fmt::Display for AdapterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Node tags
///
/// Normally a list; a bare string is accepted as a single tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tags(BTreeSet<String>);

impl Tags {
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'de> Deserialize<'de> for Tags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawTags {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Option::<RawTags>::deserialize(deserializer)? {
            Some(RawTags::One(tag)) => Tags::from_iter([tag]),
            Some(RawTags::Many(tags)) => Tags::from_iter(tags),
            None => Tags::default(),
        })
    }
}

/// Column maps whose keys are normalized to the column's lower-cased name
pub(crate) trait NamedColumn {
    fn name_mut(&mut self) -> &mut String;
}

pub(crate) fn lowercase_columns<C: NamedColumn>(columns: BTreeMap<String, C>) -> BTreeMap<String, C> {
    columns
        .into_iter()
        .map(|(key, mut column)| {
            let name = column.name_mut();
            *name = name.to_lowercase();
            (key.to_lowercase(), column)
        })
        .collect()
}

fn deserialize_columns<'de, D>(deserializer: D) -> Result<BTreeMap<String, Column>, D::Error>
where
    D: Deserializer<'de>,
{
    let columns = Option::<BTreeMap<String, Column>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(lowercase_columns(columns))
}

/// Column declared on a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name (lower-cased)
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    /// Physical type, filled in from the catalog
    #[serde(default)]
    pub data_type: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub meta: ColumnMeta,
}

impl NamedColumn for Column {
    fn name_mut(&mut self) -> &mut String {
        &mut self.name
    }
}

impl Column {
    /// Copy of this column carrying the given physical type
    pub fn with_data_type(&self, data_type: Option<String>) -> Self {
        Self {
            data_type,
            ..self.clone()
        }
    }
}

/// A dbt model node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Unique identifier (e.g., "model.my_project.orders")
    pub unique_id: String,

    /// Always "model"
    pub resource_type: String,

    /// Fully qualified physical relation; dbt leaves it null for ephemeral models
    #[serde(default)]
    pub relation_name: Option<String>,

    /// Physical schema name
    pub schema: String,

    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default)]
    pub tags: Tags,

    /// Columns keyed by lower-cased name
    #[serde(default, deserialize_with = "deserialize_columns")]
    pub columns: BTreeMap<String, Column>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub meta: ModelMeta,

    /// Whether this model gets its own explore
    #[serde(default = "default_true")]
    pub create_explorer: bool,
}

impl Model {
    /// Decode and validate a model node
    pub fn from_value(raw: &Value) -> Result<Self, ManifestError> {
        let model = Model::deserialize(raw).map_err(|e| ManifestError::InvalidNode {
            unique_id: raw_unique_id(raw),
            message: e.to_string(),
        })?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        self.meta.validate(&format!("{}.meta", self.unique_id))?;
        for (name, column) in &self.columns {
            column
                .meta
                .validate(&format!("{}.columns.{}.meta", self.unique_id, name))?;
        }
        Ok(())
    }

    /// Copy of this model with the explore flag set
    pub fn with_create_explorer(&self, create_explorer: bool) -> Self {
        Self {
            create_explorer,
            ..self.clone()
        }
    }

    /// Copy of this model whose column types come from the catalog entry
    ///
    /// Columns the catalog does not know end up untyped.
    pub fn with_catalog_types(&self, node: &CatalogNode) -> Self {
        let columns = self
            .columns
            .values()
            .map(|column| {
                let data_type = node.column_type(&column.name).map(str::to_string);
                (column.name.clone(), column.with_data_type(data_type))
            })
            .collect();

        Self {
            columns,
            ..self.clone()
        }
    }

    /// Total measures declared on the model and its columns
    pub fn measure_count(&self) -> usize {
        self.meta.measures.len()
            + self
                .columns
                .values()
                .map(|column| column.meta.measures.len())
                .sum::<usize>()
    }

    pub fn relation(&self) -> &str {
        self.relation_name.as_deref().unwrap_or("<no relation>")
    }
}

/// Dependencies of an exposure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureDependsOn {
    #[serde(default)]
    pub macros: Vec<String>,

    #[serde(default)]
    pub nodes: Vec<String>,
}

/// A dbt exposure node, used to drive a joined explore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    pub unique_id: String,

    /// Always "exposure"
    pub resource_type: String,

    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default)]
    pub tags: Tags,

    #[serde(default, deserialize_with = "null_as_default")]
    pub depends_on: ExposureDependsOn,

    /// Must carry `looker.main_model`
    #[serde(default, deserialize_with = "null_as_default")]
    pub meta: ModelMeta,

    #[serde(default)]
    pub original_file_path: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub root_path: Option<String>,
}

impl Exposure {
    /// Decode and validate an exposure node
    pub fn from_value(raw: &Value) -> Result<Self, ManifestError> {
        let exposure = Exposure::deserialize(raw).map_err(|e| ManifestError::InvalidNode {
            unique_id: raw_unique_id(raw),
            message: e.to_string(),
        })?;
        exposure.validate()?;
        Ok(exposure)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.meta.main_model().is_none() {
            return Err(ManifestError::MissingMainModel {
                unique_id: self.unique_id.clone(),
            });
        }
        self.meta.validate(&format!("{}.meta", self.unique_id))
    }

    /// Stem of the file the exposure was declared in (`models/marts/sales.yml` -> `sales`)
    pub fn file_stem(&self) -> Option<&str> {
        std::path::Path::new(&self.original_file_path)
            .file_stem()
            .and_then(|stem| stem.to_str())
    }
}

/// Node kept only for lookup by id (seeds, tests, or nodes too empty to type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UntypedNode {
    pub unique_id: String,

    pub resource_type: String,

    #[serde(default)]
    pub name: Option<String>,
}

/// A node in the manifest, typed by `resource_type`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ManifestNode {
    Model(Model),
    Exposure(Exposure),
    Untyped(UntypedNode),
}

impl ManifestNode {
    /// Decode a node, choosing the variant from its `resource_type`
    ///
    /// Models and exposures without a usable `name` are kept untyped; the
    /// resolver treats those as fatal.
    pub fn from_value(key: &str, raw: &Value) -> Result<Self, ManifestError> {
        let header = UntypedNode::deserialize(raw).map_err(|e| ManifestError::InvalidNode {
            unique_id: key.to_string(),
            message: e.to_string(),
        })?;

        let named = raw
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.is_empty());

        match header.resource_type.as_str() {
            "model" if named => Model::from_value(raw).map(ManifestNode::Model),
            "exposure" if named => Exposure::from_value(raw).map(ManifestNode::Exposure),
            _ => Ok(ManifestNode::Untyped(header)),
        }
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Model(model) => &model.unique_id,
            Self::Exposure(exposure) => &exposure.unique_id,
            Self::Untyped(node) => &node.unique_id,
        }
    }

    pub fn resource_type(&self) -> &str {
        match self {
            Self::Model(model) => &model.resource_type,
            Self::Exposure(exposure) => &exposure.resource_type,
            Self::Untyped(node) => &node.resource_type,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Model(model) => Some(&model.name),
            Self::Exposure(exposure) => Some(&exposure.name),
            Self::Untyped(node) => node.name.as_deref(),
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Self::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_exposure(&self) -> Option<&Exposure> {
        match self {
            Self::Exposure(exposure) => Some(exposure),
            _ => None,
        }
    }
}

/// Manifest metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestMetadata {
    pub adapter_type: AdapterType,
}

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub metadata: ManifestMetadata,

    /// Models, seeds, tests, ... keyed by unique_id
    pub nodes: BTreeMap<String, ManifestNode>,

    /// Exposures keyed by unique_id
    pub exposures: BTreeMap<String, ManifestNode>,
}

#[derive(Deserialize)]
struct RawManifest {
    metadata: RawMetadata,

    #[serde(default)]
    nodes: BTreeMap<String, Value>,

    #[serde(default)]
    exposures: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct RawMetadata {
    adapter_type: String,
}

impl Manifest {
    /// Build a typed manifest from an already loaded document
    pub fn from_value(raw: &Value) -> Result<Self, ManifestError> {
        let raw = RawManifest::deserialize(raw).map_err(|e| ManifestError::ParseError(e.to_string()))?;

        let metadata = ManifestMetadata {
            adapter_type: raw.metadata.adapter_type.parse()?,
        };

        let nodes = raw
            .nodes
            .iter()
            .map(|(key, node)| Ok((key.clone(), ManifestNode::from_value(key, node)?)))
            .collect::<Result<BTreeMap<_, _>, ManifestError>>()?;

        let exposures = raw
            .exposures
            .iter()
            .map(|(key, node)| Ok((key.clone(), ManifestNode::from_value(key, node)?)))
            .collect::<Result<BTreeMap<_, _>, ManifestError>>()?;

        Ok(Self {
            metadata,
            nodes,
            exposures,
        })
    }

    /// Parse manifest from JSON string
    pub fn from_str(json: &str) -> Result<Self, ManifestError> {
        let raw: Value = serde_json::from_str(json)
            .map_err(|e| ManifestError::ParseError(e.to_string()))?;
        Self::from_value(&raw)
    }

    pub fn adapter_type(&self) -> AdapterType {
        self.metadata.adapter_type
    }

    /// Get a specific node by unique_id
    pub fn get_node(&self, unique_id: &str) -> Option<&ManifestNode> {
        self.nodes.get(unique_id)
    }

    /// Get a typed model by unique_id
    pub fn get_model(&self, unique_id: &str) -> Option<&Model> {
        self.nodes.get(unique_id).and_then(ManifestNode::as_model)
    }

    /// Qualified node key of a model in a project: `model.<project>.<name>`
    pub fn model_key(project_name: &str, model_name: &str) -> String {
        format!("model.{}.{}", project_name, model_name)
    }
}

fn raw_unique_id(raw: &Value) -> String {
    raw.get("unique_id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string()
}

fn default_true() -> bool {
    true
}

/// Manifest parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),

    #[error("Invalid node {unique_id}: {message}")]
    InvalidNode { unique_id: String, message: String },

    #[error("Invalid measure at {path}: {message}")]
    InvalidMeasure { path: String, message: String },

    #[error("{value} is not a supported dbt adapter")]
    UnsupportedAdapter { value: String },

    #[error("Multiple filter names provided for a single filter in measure block at {path} ({fields} fields)")]
    MalformedMeasureFilter { path: String, fields: usize },

    #[error("Exposure {unique_id} has no meta.looker.main_model")]
    MissingMainModel { unique_id: String },
}

impl ManifestError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::ParseError(_) | Self::InvalidNode { .. } | Self::InvalidMeasure { .. } => {
                DiagnosticCode::InvalidDocument
            }
            Self::UnsupportedAdapter { .. } => DiagnosticCode::UnsupportedAdapter,
            Self::MalformedMeasureFilter { .. } => DiagnosticCode::MalformedMeasureFilter,
            Self::MissingMainModel { .. } => DiagnosticCode::MissingMainModel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model_json() -> Value {
        json!({
            "unique_id": "model.shop.orders",
            "resource_type": "model",
            "relation_name": "\"analytics\".\"marts\".\"orders\"",
            "schema": "marts",
            "name": "orders",
            "description": "One row per order",
            "tags": ["finance"],
            "columns": {
                "Order_ID": {"name": "Order_ID", "description": "", "meta": {}},
                "amount": {
                    "name": "amount",
                    "description": "Order total",
                    "meta": {"measures": {"total_amount": {"type": "sum"}}}
                }
            },
            "meta": {}
        })
    }

    fn manifest_json(adapter: &str) -> Value {
        json!({
            "metadata": {"adapter_type": adapter},
            "nodes": {
                "model.shop.orders": model_json(),
                "seed.shop.countries": {
                    "unique_id": "seed.shop.countries",
                    "resource_type": "seed",
                    "name": "countries"
                }
            },
            "exposures": {}
        })
    }

    #[test]
    fn column_keys_are_lowercased() {
        let model = Model::from_value(&model_json()).unwrap();

        assert!(model.columns.contains_key("order_id"));
        assert!(!model.columns.contains_key("Order_ID"));
        for (key, column) in &model.columns {
            assert_eq!(key, &column.name);
            assert_eq!(key, &key.to_lowercase());
        }
    }

    #[test]
    fn model_defaults() {
        let model = Model::from_value(&model_json()).unwrap();
        assert!(model.create_explorer);
        assert_eq!(model.measure_count(), 1);
        assert!(model.tags.contains("finance"));
        assert!(model.columns.values().all(|c| c.data_type.is_none()));
    }

    #[test]
    fn tags_accept_bare_string() {
        let mut raw = model_json();
        raw["tags"] = json!("finance");
        let model = Model::from_value(&raw).unwrap();
        assert!(model.tags.contains("finance"));
        assert_eq!(model.tags.len(), 1);

        raw["tags"] = Value::Null;
        let model = Model::from_value(&raw).unwrap();
        assert!(model.tags.is_empty());
    }

    #[test]
    fn malformed_filter_names_field_path() {
        let mut raw = model_json();
        raw["columns"]["amount"]["meta"]["measures"]["total_amount"]["filters"] =
            json!([{"status": "complete", "region": "EU"}]);

        let err = Model::from_value(&raw).unwrap_err();
        match err {
            ManifestError::MalformedMeasureFilter { path, fields } => {
                assert_eq!(
                    path,
                    "model.shop.orders.columns.amount.meta.measures.total_amount.filters[0]"
                );
                assert_eq!(fields, 2);
            }
            other => panic!("Expected MalformedMeasureFilter, got {:?}", other),
        }
    }

    #[test]
    fn parse_manifest_round_trips_identity() {
        let manifest = Manifest::from_value(&manifest_json("postgres")).unwrap();

        assert_eq!(manifest.adapter_type(), AdapterType::Postgres);
        for (key, node) in &manifest.nodes {
            assert_eq!(key, node.unique_id());
        }
        assert_eq!(manifest.get_node("model.shop.orders").unwrap().resource_type(), "model");
        assert!(manifest.get_model("model.shop.orders").is_some());

        let seed = manifest.get_node("seed.shop.countries").unwrap();
        assert_eq!(seed.resource_type(), "seed");
        assert_eq!(seed.name(), Some("countries"));
        assert!(seed.as_model().is_none());
    }

    #[test]
    fn unsupported_adapter_names_value() {
        let err = Manifest::from_value(&manifest_json("oracle")).unwrap_err();
        match err {
            ManifestError::UnsupportedAdapter { value } => assert_eq!(value, "oracle"),
            other => panic!("Expected UnsupportedAdapter, got {:?}", other),
        }
    }

    #[test]
    fn every_supported_adapter_parses() {
        for adapter in AdapterType::ALL {
            let manifest = Manifest::from_value(&manifest_json(adapter.as_str())).unwrap();
            assert_eq!(manifest.adapter_type(), adapter);
        }
    }

    #[test]
    fn nameless_model_is_kept_untyped() {
        let mut raw = manifest_json("snowflake");
        raw["nodes"]["model.shop.empty"] = json!({
            "unique_id": "model.shop.empty",
            "resource_type": "model"
        });

        let manifest = Manifest::from_value(&raw).unwrap();
        let node = manifest.get_node("model.shop.empty").unwrap();
        assert!(matches!(node, ManifestNode::Untyped(_)));
        assert_eq!(node.resource_type(), "model");
        assert!(manifest.get_model("model.shop.empty").is_none());
    }

    #[test]
    fn named_model_with_bad_shape_fails() {
        let mut raw = manifest_json("snowflake");
        raw["nodes"]["model.shop.orders"]["schema"] = json!(42);

        let err = Manifest::from_value(&raw).unwrap_err();
        match err {
            ManifestError::InvalidNode { unique_id, .. } => assert_eq!(unique_id, "model.shop.orders"),
            other => panic!("Expected InvalidNode, got {:?}", other),
        }
    }

    #[test]
    fn exposure_requires_main_model() {
        let err = Exposure::from_value(&json!({
            "unique_id": "exposure.shop.sales",
            "resource_type": "exposure",
            "name": "sales",
            "meta": {"joins": []}
        }))
        .unwrap_err();

        assert!(matches!(err, ManifestError::MissingMainModel { .. }));
        assert_eq!(err.code(), DiagnosticCode::MissingMainModel);
    }

    #[test]
    fn exposure_file_stem() {
        let exposure = Exposure::from_value(&json!({
            "unique_id": "exposure.shop.sales",
            "resource_type": "exposure",
            "name": "sales",
            "original_file_path": "models/marts/sales_dashboard.yml",
            "meta": {"looker": {"main_model": "ref('orders')"}}
        }))
        .unwrap();

        assert_eq!(exposure.file_stem(), Some("sales_dashboard"));
        assert_eq!(exposure.meta.main_model(), Some("ref('orders')"));
    }

    #[test]
    fn missing_metadata_is_parse_error() {
        let err = Manifest::from_value(&json!({"nodes": {}, "exposures": {}})).unwrap_err();
        assert!(matches!(err, ManifestError::ParseError(_)));
    }

    #[test]
    fn model_key_format() {
        assert_eq!(Manifest::model_key("shop", "orders"), "model.shop.orders");
    }
}
