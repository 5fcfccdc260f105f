//! Looksmith Core
//!
//! Stable domain types shared by the dbt resolver and its consumers.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use config::{Config, ConfigError, ExposureScope, SeverityThreshold};
