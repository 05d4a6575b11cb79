use thiserror::Error;
use xsdforge_config::ValidationIssue;

use crate::model::GenerationReport;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("schema error: {0}")]
    Schema(#[from] xsdforge_core::Error),
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        issues: Vec<ValidationIssue>,
    },
    #[error("generation timed out after {steps} steps ({elapsed_ms} ms)")]
    Timeout { steps: u64, elapsed_ms: u64 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("generation failed")]
    Failed(GenerationReport),
}

impl GenerationError {
    pub fn configuration(message: impl Into<String>) -> Self {
        GenerationError::Configuration {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        GenerationError::Schema(xsdforge_core::Error::InvalidSchema(message.into()))
    }
}
