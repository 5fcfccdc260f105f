//! Structural validation of raw dbt artifacts
//!
//! The manifest is checked against a bundled JSON Schema (draft 7) before any
//! typed parsing. Every violation is collected and logged; the check fails
//! once, after all of them have been reported.

use jsonschema_valid::schemas::Draft;
use jsonschema_valid::ValidationError;
use looksmith_core::DiagnosticCode;
use serde_json::{Map, Value};
use tracing::error;

/// JSON Schema for the manifest fields looksmith reads
pub const MANIFEST_SCHEMA: &str = include_str!("../schemas/manifest.schema.json");

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Location in the document, e.g. `nodes.model.shop.orders.columns`
    pub path: String,

    /// Location of the failing keyword in the schema, outermost first
    pub schema_path: Vec<String>,

    pub message: String,

    /// Violations found underneath this one (e.g. the branches of an `anyOf`)
    pub causes: Vec<Violation>,
}

impl Violation {
    pub fn new(path: impl Into<String>, schema_path: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            schema_path,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Number of violations in this tree, including this one
    pub fn count(&self) -> usize {
        1 + self.causes.iter().map(Violation::count).sum::<usize>()
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Parse the bundled manifest schema
pub fn bundled_manifest_schema() -> Result<Value, SchemaError> {
    serde_json::from_str(MANIFEST_SCHEMA).map_err(|e| SchemaError::InvalidSchema(e.to_string()))
}

/// Validate a raw manifest against the bundled schema
pub fn validate_manifest(raw_manifest: &Value) -> Result<(), SchemaError> {
    let schema = bundled_manifest_schema()?;
    validate_manifest_with(raw_manifest, &schema)
}

/// Validate a raw manifest against a caller-supplied schema
pub fn validate_manifest_with(raw_manifest: &Value, schema: &Value) -> Result<(), SchemaError> {
    let violations = collect_violations(raw_manifest, schema)?;
    if violations.is_empty() {
        return Ok(());
    }

    for violation in &violations {
        report(violation, 0);
    }
    Err(SchemaError::Violations(violations))
}

/// Catalogs are trusted output of the same dbt run and are accepted as-is
pub fn validate_catalog(_raw_catalog: &Value) -> Result<(), SchemaError> {
    Ok(())
}

fn collect_violations(instance: &Value, schema: &Value) -> Result<Vec<Violation>, SchemaError> {
    let mut violations = check(instance, schema, &[], &[], schema)?;
    violations.sort_by(|a, b| a.schema_path.cmp(&b.schema_path));
    Ok(violations)
}

/// Validate `instance` against `schema` and turn each error into a
/// violation rooted at the given path prefixes. `root` supplies the
/// `definitions` that branch `$ref`s point into.
fn check(
    instance: &Value,
    schema: &Value,
    path_prefix: &[String],
    schema_prefix: &[String],
    root: &Value,
) -> Result<Vec<Violation>, SchemaError> {
    let config = jsonschema_valid::Config::from_schema(schema, Some(Draft::Draft7))
        .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;

    let mut violations = Vec::new();
    if let Err(errors) = config.validate(instance) {
        for error in errors {
            violations.push(to_violation(error, path_prefix, schema_prefix, root)?);
        }
    }
    Ok(violations)
}

fn to_violation(
    error: ValidationError,
    path_prefix: &[String],
    schema_prefix: &[String],
    root: &Value,
) -> Result<Violation, SchemaError> {
    let ValidationError {
        msg,
        instance,
        schema,
        instance_path,
        schema_path,
    } = error;

    // jsonschema-valid records both paths innermost first
    let path: Vec<String> = path_prefix
        .iter()
        .cloned()
        .chain(instance_path.into_iter().rev())
        .collect();
    let schema_path: Vec<String> = schema_prefix
        .iter()
        .cloned()
        .chain(schema_path.into_iter().rev())
        .collect();

    let mut violation = Violation::new(dotted(&path), schema_path, msg);

    // anyOf/oneOf report a single error; the branch failures are rebuilt here
    let combinator = matches!(
        violation.schema_path.last().map(String::as_str),
        Some("anyOf") | Some("oneOf")
    );
    if combinator {
        if let (Some(instance), Some(Value::Array(branches))) = (&instance, &schema) {
            for (index, branch) in branches.iter().enumerate() {
                let mut branch_path = violation.schema_path.clone();
                branch_path.push(index.to_string());
                let causes = check(instance, &standalone(branch, root), &path, &branch_path, root)?;
                violation.causes.extend(causes);
            }
        }
    }

    Ok(violation)
}

/// A branch schema that validates on its own, carrying the root `definitions`
fn standalone(branch: &Value, root: &Value) -> Value {
    let mut schema = match branch {
        Value::Object(map) => map.clone(),
        Value::Bool(false) => {
            let mut map = Map::new();
            map.insert("not".to_string(), Value::Object(Map::new()));
            map
        }
        _ => Map::new(),
    };
    if let Some(definitions) = root.get("definitions") {
        schema
            .entry("definitions")
            .or_insert_with(|| definitions.clone());
    }
    Value::Object(schema)
}

fn dotted(path: &[String]) -> String {
    if path.is_empty() {
        "manifest".to_string()
    } else {
        path.join(".")
    }
}

fn report(violation: &Violation, depth: usize) {
    let indent = "  ".repeat(depth);
    error!("{}Error in manifest at {}", indent, violation);
    for cause in &violation.causes {
        report(cause, depth + 1);
    }
}

/// Schema validation errors
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Manifest schema is unusable: {0}")]
    InvalidSchema(String),

    #[error("Failed to parse dbt manifest.json: {} schema violation(s)", count_all(.0))]
    Violations(Vec<Violation>),
}

fn count_all(violations: &[Violation]) -> usize {
    violations.iter().map(Violation::count).sum()
}

impl SchemaError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::InvalidSchema(_) => DiagnosticCode::InvalidDocument,
            Self::Violations(_) => DiagnosticCode::SchemaViolation,
        }
    }

    /// Flattened violation messages in report order
    pub fn messages(&self) -> Vec<String> {
        fn walk(violation: &Violation, out: &mut Vec<String>) {
            out.push(violation.to_string());
            for cause in &violation.causes {
                walk(cause, out);
            }
        }

        let mut out = Vec::new();
        if let Self::Violations(violations) = self {
            for violation in violations {
                walk(violation, &mut out);
            }
        }
        out
    }
}
