//! Error types for Detox Detach

use thiserror::Error;

/// Errors that can occur during training or inference
#[derive(Debug, Error)]
pub enum DetoxError {
    /// Training CSV missing, unreadable, malformed or empty after cleaning
    #[error("Data load error: {0}")]
    DataLoad(String),

    /// Categorical value outside the fitted encoder vocabulary
    #[error("Unseen category for {field}: {value:?}")]
    UnseenCategory { field: String, value: String },

    /// Model/scaler/encoder set incomplete or inconsistent
    #[error("Artifact mismatch: {0}")]
    ArtifactMismatch(String),

    /// Screenshot analysis failed or returned an unusable result
    #[error("{0}")]
    ExternalExtraction(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl DetoxError {
    /// Stable machine-readable code for the error class
    pub fn code(&self) -> &'static str {
        match self {
            DetoxError::DataLoad(_) => "DATA_LOAD_ERROR",
            DetoxError::UnseenCategory { .. } => "UNSEEN_CATEGORY",
            DetoxError::ArtifactMismatch(_) => "ARTIFACT_MISMATCH",
            DetoxError::ExternalExtraction(_) => "EXTERNAL_EXTRACTION_ERROR",
            DetoxError::Config(_) => "CONFIG_ERROR",
            DetoxError::Training(_) => "TRAINING_ERROR",
            DetoxError::Image(_) => "IMAGE_ERROR",
            DetoxError::Io(_) => "IO_ERROR",
            DetoxError::Json(_) => "JSON_ERROR",
        }
    }
}
