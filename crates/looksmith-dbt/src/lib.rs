//! dbt artifact validation and resolution for LookML generation
//!
//! This crate handles:
//! - Validating manifest.json against a bundled JSON Schema
//! - Parsing manifest.json and catalog.json into typed records
//! - Extracting `ref(...)` model references from exposure metadata
//! - Resolving tagged and exposure-referenced models into catalog-typed models
//! - Mapping warehouse column types to LookML field types

pub mod catalog;
pub mod manifest;
pub mod meta;
pub mod project;
pub mod refs;
pub mod resolver;
pub mod types;
pub mod validate;

pub use catalog::{Catalog, CatalogColumn, CatalogError, CatalogNode, CatalogNodeMetadata};
pub use manifest::{
    AdapterType, Column, Exposure, ExposureDependsOn, Manifest, ManifestError, ManifestMetadata,
    ManifestNode, Model, Tags, UntypedNode,
};
pub use meta::{
    AggregateKind, ColumnMeta, Dimension, Join, JoinRelationship, JoinType, LookerModelMeta,
    Measure, ModelMeta, ValueFormatName,
};
pub use project::{DbtProjectConfig, ProjectError};
pub use refs::extract_refs;
pub use resolver::{
    discover_models, resolve, select_exposures, select_models, tags_match, DiscoveredModel, Resolution,
    ResolveError, Resolver,
};
pub use types::{looker_type, LookerType};
pub use validate::{validate_catalog, validate_manifest, validate_manifest_with, SchemaError, Violation};
