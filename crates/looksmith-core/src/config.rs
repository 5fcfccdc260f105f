//! Configuration schema (looksmith.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::diagnostic::{DiagnosticCode, Severity};

/// Which exposures contribute join targets during model discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureScope {
    /// Every exposure in the manifest, regardless of the tag filter
    #[default]
    All,

    /// Only exposures that pass the tag filter
    Tagged,
}

/// Severity threshold overrides for specific diagnostic codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Map of diagnostic code to severity override
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

impl SeverityThreshold {
    /// Get severity for a diagnostic code, or default
    pub fn get_severity(&self, code: DiagnosticCode, default: Severity) -> Severity {
        self.overrides
            .get(code.as_str())
            .copied()
            .unwrap_or(default)
    }

    /// Set severity override for a code
    pub fn set_override(&mut self, code: DiagnosticCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Only resolve models (and, with `exposure_scope = "tagged"`, exposures) carrying this tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Exposure discovery scope
    #[serde(default)]
    pub exposure_scope: ExposureScope,

    /// Severity thresholds
    #[serde(default)]
    pub severity: SeverityThreshold,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.tag, None);
        assert_eq!(config.exposure_scope, ExposureScope::All);
    }

    #[test]
    fn severity_override() {
        let mut threshold = SeverityThreshold::default();
        threshold.set_override(DiagnosticCode::CatalogMiss, Severity::Error);

        assert_eq!(
            threshold.get_severity(DiagnosticCode::CatalogMiss, Severity::Warn),
            Severity::Error
        );
        assert_eq!(
            threshold.get_severity(DiagnosticCode::AllColumnsUntyped, Severity::Info),
            Severity::Info
        );
    }

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml(
            r#"
            tag = "finance"
            exposure_scope = "tagged"

            [severity.overrides]
            CATALOG_MISS = "error"
            "#,
        )
        .unwrap();

        assert_eq!(config.tag.as_deref(), Some("finance"));
        assert_eq!(config.exposure_scope, ExposureScope::Tagged);
        assert_eq!(
            config.severity.get_severity(DiagnosticCode::CatalogMiss, Severity::Warn),
            Severity::Error
        );
    }

    #[test]
    fn unknown_scope_is_rejected() {
        let err = Config::from_toml("exposure_scope = \"some\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut config = Config::default();
        config.tag = Some("marts".to_string());
        config.severity.set_override(DiagnosticCode::UnmappedColumnType, Severity::Info);

        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn config_file_roundtrip() {
        let path = std::env::temp_dir().join(format!(
            "looksmith-config-{}-roundtrip.toml",
            std::process::id()
        ));

        let mut config = Config::default();
        config.tag = Some("finance".to_string());
        config.exposure_scope = ExposureScope::Tagged;
        config.severity.set_override(DiagnosticCode::CatalogMiss, Severity::Error);

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.unwrap(), config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join(format!(
            "looksmith-config-{}-missing.toml",
            std::process::id()
        ));

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
