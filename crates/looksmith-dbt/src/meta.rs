//! LookML generation hints carried in dbt `meta` blocks
//!
//! Columns and models may declare measures, a dimension override, joins and
//! (for exposures) the model an explore is centered on. Measure definitions
//! arrive under four interchangeable keys (`measures`, `measure`, `metrics`,
//! `metric`); they are merged into one map when the block is decoded.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use crate::manifest::ManifestError;

/// LookML aggregate measure types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Average,
    AverageDistinct,
    Count,
    CountDistinct,
    List,
    Max,
    Median,
    MedianDistinct,
    Min,
    Sum,
    SumDistinct,
}

impl AggregateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::AverageDistinct => "average_distinct",
            Self::Count => "count",
            Self::CountDistinct => "count_distinct",
            Self::List => "list",
            Self::Max => "max",
            Self::Median => "median",
            Self::MedianDistinct => "median_distinct",
            Self::Min => "min",
            Self::Sum => "sum",
            Self::SumDistinct => "sum_distinct",
        }
    }
}

impl std::fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// LookML `value_format_name` identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueFormatName {
    #[serde(rename = "decimal_0")]
    Decimal0,
    #[serde(rename = "decimal_1")]
    Decimal1,
    #[serde(rename = "decimal_2")]
    Decimal2,
    #[serde(rename = "decimal_3")]
    Decimal3,
    #[serde(rename = "decimal_4")]
    Decimal4,
    #[serde(rename = "usd_0")]
    Usd0,
    #[serde(rename = "usd")]
    Usd,
    #[serde(rename = "gbp_0")]
    Gbp0,
    #[serde(rename = "gbp")]
    Gbp,
    #[serde(rename = "eur_0")]
    Eur0,
    #[serde(rename = "eur")]
    Eur,
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "percent_0")]
    Percent0,
    #[serde(rename = "percent_1")]
    Percent1,
    #[serde(rename = "percent_2")]
    Percent2,
    #[serde(rename = "percent_3")]
    Percent3,
    #[serde(rename = "percent_4")]
    Percent4,
}

impl ValueFormatName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decimal0 => "decimal_0",
            Self::Decimal1 => "decimal_1",
            Self::Decimal2 => "decimal_2",
            Self::Decimal3 => "decimal_3",
            Self::Decimal4 => "decimal_4",
            Self::Usd0 => "usd_0",
            Self::Usd => "usd",
            Self::Gbp0 => "gbp_0",
            Self::Gbp => "gbp",
            Self::Eur0 => "eur_0",
            Self::Eur => "eur",
            Self::Id => "id",
            Self::Percent0 => "percent_0",
            Self::Percent1 => "percent_1",
            Self::Percent2 => "percent_2",
            Self::Percent3 => "percent_3",
            Self::Percent4 => "percent_4",
        }
    }
}

/// Explore join type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    #[default]
    LeftOuter,
    FullOuter,
    Inner,
    Cross,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftOuter => "left_outer",
            Self::FullOuter => "full_outer",
            Self::Inner => "inner",
            Self::Cross => "cross",
        }
    }
}

/// Explore join cardinality
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinRelationship {
    #[default]
    ManyToOne,
    ManyToMany,
    OneToMany,
    OneToOne,
}

impl JoinRelationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManyToOne => "many_to_one",
            Self::ManyToMany => "many_to_many",
            Self::OneToMany => "one_to_many",
            Self::OneToOne => "one_to_one",
        }
    }
}

/// An aggregate measure definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    /// Aggregate type
    #[serde(rename = "type")]
    pub kind: AggregateKind,

    /// Filters, each restricted to a single field: `[{"status": "complete"}]`
    #[serde(default, deserialize_with = "null_as_default")]
    pub filters: Vec<BTreeMap<String, String>>,

    #[serde(default)]
    pub description: Option<String>,

    /// Custom SQL; defaults to the owning column when absent
    #[serde(default)]
    pub sql: Option<String>,

    #[serde(default)]
    pub value_format_name: Option<ValueFormatName>,
}

impl Measure {
    /// Decode and validate a standalone measure block found at `path`
    pub fn from_value(raw: &serde_json::Value, path: &str) -> Result<Self, ManifestError> {
        let measure = Measure::deserialize(raw).map_err(|e| ManifestError::InvalidMeasure {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        measure.validate(path)?;
        Ok(measure)
    }

    /// Every filter must name exactly one field
    pub fn validate(&self, path: &str) -> Result<(), ManifestError> {
        for (index, filter) in self.filters.iter().enumerate() {
            if filter.len() != 1 {
                return Err(ManifestError::MalformedMeasureFilter {
                    path: format!("{}.filters[{}]", path, index),
                    fields: filter.len(),
                });
            }
        }
        Ok(())
    }
}

/// Dimension override for a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Disabled dimensions are not generated
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub enabled: bool,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub sql: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub value_format_name: Option<ValueFormatName>,
}

impl Default for Dimension {
    fn default() -> Self {
        Self {
            enabled: true,
            name: None,
            sql: None,
            description: None,
            value_format_name: None,
        }
    }
}

/// A join from an explore to another view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    /// Target view name
    pub join: String,

    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub join_type: JoinType,

    #[serde(default, deserialize_with = "null_as_default")]
    pub relationship: JoinRelationship,

    /// Join condition, expected to embed `ref('model')` expressions
    pub sql_on: String,
}

/// Nested `looker` block on a model or exposure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookerModelMeta {
    #[serde(default, deserialize_with = "null_as_default")]
    pub joins: Vec<Join>,

    /// The model an exposure's explore is centered on, as `ref('model')`
    #[serde(default)]
    pub main_model: Option<String>,
}

/// Column-level hints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawColumnMeta")]
pub struct ColumnMeta {
    /// Union of every measure alias, including the nested `looker` block
    pub measures: BTreeMap<String, Measure>,

    pub dimension: Dimension,
}

impl ColumnMeta {
    pub fn validate(&self, path: &str) -> Result<(), ManifestError> {
        validate_measures(&self.measures, path)
    }
}

/// Model-level hints (also used by exposures)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawModelMeta")]
pub struct ModelMeta {
    pub measures: BTreeMap<String, Measure>,

    pub dimension: Dimension,

    pub looker: Option<LookerModelMeta>,

    /// Fallback joins, used only when there is no `looker` block
    pub joins: Vec<Join>,

    /// Primary key column, or a comma-separated compound key
    #[serde(rename = "primary-key")]
    pub primary_key: Option<String>,
}

impl ModelMeta {
    /// Joins declared for this model: the `looker` block's when present, else the top-level ones
    pub fn joins(&self) -> &[Join] {
        match &self.looker {
            Some(looker) => &looker.joins,
            None => &self.joins,
        }
    }

    pub fn main_model(&self) -> Option<&str> {
        self.looker.as_ref()?.main_model.as_deref()
    }

    /// Primary key column names, split on commas
    pub fn primary_key_columns(&self) -> Vec<String> {
        self.primary_key
            .as_deref()
            .map(|key| {
                key.split(',')
                    .map(|part| part.trim().to_lowercase())
                    .filter(|part| !part.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn validate(&self, path: &str) -> Result<(), ManifestError> {
        validate_measures(&self.measures, path)
    }
}

fn validate_measures(measures: &BTreeMap<String, Measure>, path: &str) -> Result<(), ManifestError> {
    for (name, measure) in measures {
        measure.validate(&format!("{}.measures.{}", path, name))?;
    }
    Ok(())
}

/// The four measure aliases as they appear on the wire
#[derive(Debug, Default, Deserialize)]
struct MeasureBuckets {
    #[serde(default, deserialize_with = "null_as_default")]
    measures: BTreeMap<String, Measure>,

    #[serde(default, deserialize_with = "null_as_default")]
    measure: BTreeMap<String, Measure>,

    #[serde(default, deserialize_with = "null_as_default")]
    metrics: BTreeMap<String, Measure>,

    #[serde(default, deserialize_with = "null_as_default")]
    metric: BTreeMap<String, Measure>,
}

impl MeasureBuckets {
    /// Later aliases win on a name clash
    fn merge_into(self, merged: &mut BTreeMap<String, Measure>) {
        merged.extend(self.measures);
        merged.extend(self.measure);
        merged.extend(self.metrics);
        merged.extend(self.metric);
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawInnerLooker {
    #[serde(flatten)]
    buckets: MeasureBuckets,

    #[serde(default)]
    dimension: Option<Dimension>,
}

#[derive(Debug, Default, Deserialize)]
struct RawColumnMeta {
    #[serde(default)]
    looker: Option<RawInnerLooker>,

    #[serde(flatten)]
    buckets: MeasureBuckets,

    #[serde(default)]
    dimension: Option<Dimension>,
}

impl From<RawColumnMeta> for ColumnMeta {
    fn from(raw: RawColumnMeta) -> Self {
        let mut measures = BTreeMap::new();
        let mut nested_dimension = None;

        if let Some(looker) = raw.looker {
            looker.buckets.merge_into(&mut measures);
            nested_dimension = looker.dimension;
        }
        raw.buckets.merge_into(&mut measures);

        Self {
            measures,
            dimension: raw.dimension.or(nested_dimension).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawModelMeta {
    #[serde(default)]
    looker: Option<LookerModelMeta>,

    #[serde(default, deserialize_with = "null_as_default")]
    joins: Vec<Join>,

    #[serde(default, rename = "primary-key")]
    primary_key: Option<String>,

    #[serde(flatten)]
    buckets: MeasureBuckets,

    #[serde(default)]
    dimension: Option<Dimension>,
}

impl From<RawModelMeta> for ModelMeta {
    fn from(raw: RawModelMeta) -> Self {
        let mut measures = BTreeMap::new();
        raw.buckets.merge_into(&mut measures);

        Self {
            measures,
            dimension: raw.dimension.unwrap_or_default(),
            looker: raw.looker,
            joins: raw.joins,
            primary_key: raw.primary_key,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Treat an explicit `null` like a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}
