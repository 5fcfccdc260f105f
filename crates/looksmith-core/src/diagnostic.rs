//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// Fatal conditions (validation, identity, references) and recoverable
/// materialization gaps share one vocabulary so a caller can render both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Document validation
    /// Manifest failed the structural JSON Schema check
    SchemaViolation,

    /// Manifest or catalog could not be decoded into typed records
    InvalidDocument,

    /// `metadata.adapter_type` is not a supported warehouse adapter
    UnsupportedAdapter,

    /// A measure filter names zero or several fields
    MalformedMeasureFilter,

    /// An exposure has no `meta.looker.main_model`
    MissingMainModel,

    // Resolution (fatal)
    /// A model or exposure is missing its name
    DegenerateNode,

    /// A `main_model` or `sql_on` holds no `ref(...)` expression
    UnresolvableReference,

    /// A referenced model does not exist in the manifest
    DanglingModelReference,

    // Resolution (recoverable)
    /// A model has no catalog entry and was dropped
    CatalogMiss,

    /// Every column of a model is untyped after catalog enrichment
    AllColumnsUntyped,

    /// A physical column type has no LookML equivalent
    UnmappedColumnType,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaViolation => "SCHEMA_VIOLATION",
            Self::InvalidDocument => "INVALID_DOCUMENT",
            Self::UnsupportedAdapter => "UNSUPPORTED_ADAPTER",
            Self::MalformedMeasureFilter => "MALFORMED_MEASURE_FILTER",
            Self::MissingMainModel => "MISSING_MAIN_MODEL",
            Self::DegenerateNode => "DEGENERATE_NODE",
            Self::UnresolvableReference => "UNRESOLVABLE_REFERENCE",
            Self::DanglingModelReference => "DANGLING_MODEL_REFERENCE",
            Self::CatalogMiss => "CATALOG_MISS",
            Self::AllColumnsUntyped => "ALL_COLUMNS_UNTYPED",
            Self::UnmappedColumnType => "UNMAPPED_COLUMN_TYPE",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - output is degraded but the run continues
    Warn,

    /// Error - the run cannot produce trustworthy output
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Manifest unique_id of the node concerned, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            unique_id: None,
        }
    }

    /// Attach the node this diagnostic is about
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.unique_id {
            Some(id) => write!(f, "[{}] {} ({}): {}", self.severity, self.code, id, self.message),
            None => write!(f, "[{}] {}: {}", self.severity, self.code, self.message),
        }
    }
}
