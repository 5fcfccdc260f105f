//! Typed model resolution
//!
//! Joins the manifest and the catalog into the list of models the LookML
//! emitter works from:
//! - models selected by tag, each getting its own explore
//! - models pulled in by exposures (main model and join targets)
//! - every survivor typed from its catalog entry
//!
//! A join target is joined into the exposure's explore instead of getting
//! one of its own, even when the tag selected it.
//!
//! Broken identity (a model or exposure without a name) and broken exposure
//! references abort the run. A model that is missing from the catalog is
//! dropped with a warning.

use looksmith_core::{Config, Diagnostic, DiagnosticCode, ExposureScope, Severity, SeverityThreshold};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, error, warn};

use crate::catalog::{Catalog, CatalogError};
use crate::manifest::{AdapterType, Exposure, Manifest, ManifestError, ManifestNode, Model, Tags};
use crate::refs::extract_refs;
use crate::types::looker_type;

/// Output of a resolver run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub adapter_type: AdapterType,

    /// Tag-selected models first, then models only reachable through exposures
    pub models: Vec<Model>,

    /// Recoverable problems found along the way
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn get_model(&self, unique_id: &str) -> Option<&Model> {
        self.models.iter().find(|model| model.unique_id == unique_id)
    }

    /// Diagnostics with the given code
    pub fn diagnostics_with(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |diag| diag.code == code)
    }
}

/// Builds typed, catalog-enriched models from a project's artifacts
#[derive(Debug, Clone)]
pub struct Resolver {
    /// dbt project name, used to qualify model keys
    project_name: String,

    tag: Option<String>,

    exposure_scope: ExposureScope,

    severity: SeverityThreshold,
}

impl Resolver {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            tag: None,
            exposure_scope: ExposureScope::default(),
            severity: SeverityThreshold::default(),
        }
    }

    /// Create a resolver using the run options of a config file
    pub fn from_config(project_name: impl Into<String>, config: &Config) -> Self {
        Self {
            project_name: project_name.into(),
            tag: config.tag.clone(),
            exposure_scope: config.exposure_scope,
            severity: config.severity.clone(),
        }
    }

    pub fn with_tag(mut self, tag: Option<impl Into<String>>) -> Self {
        self.tag = tag.map(Into::into);
        self
    }

    pub fn with_exposure_scope(mut self, scope: ExposureScope) -> Self {
        self.exposure_scope = scope;
        self
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Parse both documents and resolve them
    pub fn resolve(&self, raw_manifest: &Value, raw_catalog: &Value) -> Result<Resolution, ResolveError> {
        let catalog = Catalog::from_value(raw_catalog)?;
        let manifest = Manifest::from_value(raw_manifest)?;
        self.resolve_typed(&manifest, &catalog)
    }

    /// Resolve already parsed documents
    pub fn resolve_typed(&self, manifest: &Manifest, catalog: &Catalog) -> Result<Resolution, ResolveError> {
        let tag = self.tag.as_deref();
        let adapter_type = manifest.adapter_type();

        let selected = select_models(manifest, tag)?;
        let exposures = match self.exposure_scope {
            ExposureScope::All => select_exposures(manifest, None)?,
            ExposureScope::Tagged => select_exposures(manifest, tag)?,
        };
        debug!(
            "Selected {} models and {} exposures (tag: {})",
            selected.len(),
            exposures.len(),
            tag.unwrap_or("<none>")
        );

        let discovered = discover_models(&exposures)?;

        let mut appended = Vec::new();
        let mut join_targets = HashSet::new();
        let selected_ids: HashSet<&str> = selected.iter().map(|model| model.unique_id.as_str()).collect();

        for (name, found) in &discovered {
            let key = Manifest::model_key(&self.project_name, name);
            let node = manifest.get_node(&key).ok_or_else(|| {
                error!("Exposure {} references model {} which is missing from the manifest", found.exposure, key);
                ResolveError::DanglingModelReference {
                    key: key.clone(),
                    exposure: found.exposure.clone(),
                }
            })?;
            let model = node.as_model().ok_or_else(|| degenerate(node))?;

            if found.join_target {
                join_targets.insert(model.unique_id.as_str());
            }
            if !selected_ids.contains(model.unique_id.as_str()) {
                appended.push(model.with_create_explorer(false));
            }
        }

        // join targets only get an explore through the exposure joining them
        let mut models: Vec<Model> = selected
            .iter()
            .map(|model| {
                if join_targets.contains(model.unique_id.as_str()) {
                    model.with_create_explorer(false)
                } else {
                    (*model).clone()
                }
            })
            .collect();
        models.extend(appended);
        debug!("Parsed {} models from manifest.json", models.len());

        for model in &models {
            debug!(
                "Model {} has {} columns with {} measures",
                model.name,
                model.columns.len(),
                model.measure_count()
            );
        }

        let mut diagnostics = Vec::new();
        let total = models.len();
        let mut typed = Vec::with_capacity(total);

        for model in &models {
            let Some(node) = catalog.get(&model.unique_id) else {
                warn!(
                    "Model {} not found in catalog. No looker view will be generated. Check if model has materialized in {} at {}",
                    model.unique_id,
                    adapter_type,
                    model.relation()
                );
                diagnostics.push(self.diagnostic(
                    DiagnosticCode::CatalogMiss,
                    Severity::Warn,
                    format!(
                        "Model not found in catalog; check if it has materialized in {} at {}",
                        adapter_type,
                        model.relation()
                    ),
                    &model.unique_id,
                ));
                continue;
            };

            let enriched = model.with_catalog_types(node);
            self.inspect_columns(&enriched, adapter_type, &mut diagnostics);
            typed.push(enriched);
        }

        debug!("Found catalog entries for {} models", typed.len());
        debug!("Catalog entries missing for {} models", total - typed.len());

        Ok(Resolution {
            adapter_type,
            models: typed,
            diagnostics,
        })
    }

    /// Column-type checks that only produce diagnostics
    fn inspect_columns(&self, model: &Model, adapter_type: AdapterType, diagnostics: &mut Vec<Diagnostic>) {
        if model.columns.values().all(|column| column.data_type.is_none()) {
            debug!(
                "Model {} has no typed columns, no dimensions will be generated",
                model.unique_id
            );
            diagnostics.push(self.diagnostic(
                DiagnosticCode::AllColumnsUntyped,
                Severity::Info,
                "No typed columns, no dimensions will be generated",
                &model.unique_id,
            ));
            return;
        }

        let mut dimensions = 0;
        for column in model.columns.values() {
            let Some(data_type) = column.data_type.as_deref() else {
                continue;
            };

            match looker_type(adapter_type, data_type) {
                Some(looker) => {
                    if looker.is_scalar() && column.meta.dimension.enabled {
                        dimensions += 1;
                    }
                }
                None => {
                    warn!(
                        "Column {}.{} has type {} which has no looker equivalent for {}",
                        model.name, column.name, data_type, adapter_type
                    );
                    diagnostics.push(self.diagnostic(
                        DiagnosticCode::UnmappedColumnType,
                        Severity::Warn,
                        format!(
                            "Column '{}' has {} type '{}' with no looker equivalent",
                            column.name, adapter_type, data_type
                        ),
                        &model.unique_id,
                    ));
                }
            }
        }

        debug!("Model {} will generate {} dimensions", model.name, dimensions);
    }

    fn diagnostic(
        &self,
        code: DiagnosticCode,
        default: Severity,
        message: impl Into<String>,
        unique_id: &str,
    ) -> Diagnostic {
        Diagnostic::new(code, self.severity.get_severity(code, default), message).with_unique_id(unique_id)
    }
}

/// Resolve a project's artifacts in one call
pub fn resolve(
    raw_manifest: &Value,
    raw_catalog: &Value,
    project_name: &str,
    tag: Option<&str>,
) -> Result<Vec<Model>, ResolveError> {
    Resolver::new(project_name)
        .with_tag(tag)
        .resolve(raw_manifest, raw_catalog)
        .map(|resolution| resolution.models)
}

/// Whether a node's tags match an optional tag filter
pub fn tags_match(tags: &Tags, tag: Option<&str>) -> bool {
    match tag {
        Some(tag) => tags.contains(tag),
        None => true,
    }
}

/// All typed models, filtered by tag
///
/// Fails if any model node could not be typed.
pub fn select_models<'a>(manifest: &'a Manifest, tag: Option<&str>) -> Result<Vec<&'a Model>, ResolveError> {
    let mut models = Vec::new();

    for node in manifest.nodes.values() {
        if node.resource_type() != "model" {
            continue;
        }

        let model = node.as_model().ok_or_else(|| degenerate(node))?;
        if tags_match(&model.tags, tag) {
            models.push(model);
        }
    }

    Ok(models)
}

/// All typed exposures, filtered by tag
///
/// Fails if any exposure could not be typed.
pub fn select_exposures<'a>(manifest: &'a Manifest, tag: Option<&str>) -> Result<Vec<&'a Exposure>, ResolveError> {
    let mut exposures = Vec::new();

    for node in manifest.exposures.values() {
        let exposure = node.as_exposure().ok_or_else(|| degenerate(node))?;
        if tags_match(&exposure.tags, tag) {
            exposures.push(exposure);
        }
    }

    Ok(exposures)
}

/// A model pulled in by an exposure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredModel {
    /// First exposure referencing the model
    pub exposure: String,

    /// Joined into some exposure's explore, as opposed to only being a main model
    pub join_target: bool,
}

/// Model names referenced by exposures
///
/// Every exposure contributes the first `ref` of its `main_model` and every
/// `ref` in its joins' `sql_on`. A model referenced in `sql_on` is a join
/// target unless it is that exposure's own main model.
pub fn discover_models(exposures: &[&Exposure]) -> Result<BTreeMap<String, DiscoveredModel>, ResolveError> {
    let mut discovered: BTreeMap<String, DiscoveredModel> = BTreeMap::new();

    for exposure in exposures {
        let main_model = exposure.meta.main_model().unwrap_or_default();
        let main_name = refs_or_fail(exposure, "main_model", main_model)?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut found = vec![(main_name.clone(), false)];
        for join in exposure.meta.joins() {
            for name in refs_or_fail(exposure, "sql_on", &join.sql_on)? {
                let join_target = name != main_name;
                found.push((name, join_target));
            }
        }

        for (name, join_target) in found {
            let entry = discovered.entry(name).or_insert_with(|| DiscoveredModel {
                exposure: exposure.unique_id.clone(),
                join_target: false,
            });
            entry.join_target |= join_target;
        }
    }

    Ok(discovered)
}

fn refs_or_fail(exposure: &Exposure, field: &'static str, value: &str) -> Result<Vec<String>, ResolveError> {
    extract_refs(value).ok_or_else(|| {
        error!("Exposure {} {} {} should be ref('model_name')", exposure.unique_id, field, value);
        ResolveError::UnresolvableReference {
            unique_id: exposure.unique_id.clone(),
            field,
            value: value.to_string(),
        }
    })
}

fn degenerate(node: &ManifestNode) -> ResolveError {
    error!(
        "Cannot parse {} with id: \"{}\" - is the file empty?",
        node.resource_type(),
        node.unique_id()
    );
    ResolveError::DegenerateNode {
        unique_id: node.unique_id().to_string(),
        resource_type: node.resource_type().to_string(),
    }
}

/// Fatal resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Cannot parse {resource_type} with id \"{unique_id}\": is the file empty?")]
    DegenerateNode { unique_id: String, resource_type: String },

    #[error("Exposure {unique_id} {field} {value} should be ref('model_name')")]
    UnresolvableReference {
        unique_id: String,
        field: &'static str,
        value: String,
    },

    #[error("Exposure {exposure} references model {key} which is missing from the manifest")]
    DanglingModelReference { key: String, exposure: String },
}

impl ResolveError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::Manifest(err) => err.code(),
            Self::Catalog(_) => DiagnosticCode::InvalidDocument,
            Self::DegenerateNode { .. } => DiagnosticCode::DegenerateNode,
            Self::UnresolvableReference { .. } => DiagnosticCode::UnresolvableReference,
            Self::DanglingModelReference { .. } => DiagnosticCode::DanglingModelReference,
        }
    }
}
