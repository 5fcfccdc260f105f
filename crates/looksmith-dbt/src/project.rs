//! dbt_project.yml subset
//!
//! Only the project name is needed: it qualifies model keys
//! (`model.<project>.<name>`) when exposures reference models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// dbt project configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbtProjectConfig {
    pub name: String,
}

impl DbtProjectConfig {
    /// Build from an already loaded dbt_project.yml document
    pub fn from_value(raw: &Value) -> Result<Self, ProjectError> {
        let config = DbtProjectConfig::deserialize(raw).map_err(|e| ProjectError::ParseError(e.to_string()))?;

        if config.name.trim().is_empty() {
            return Err(ProjectError::MissingName);
        }

        Ok(config)
    }
}

/// Project config errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Failed to parse dbt project config: {0}")]
    ParseError(String),

    #[error("dbt project config has an empty name")]
    MissingName,
}
