use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RazmetkaError {
    #[error("Input directory does not exist: {path}")]
    InputDirMissing { path: PathBuf },

    #[error("Invalid metadata in {path}: {reason}")]
    MetadataInvalid { path: PathBuf, reason: String },

    #[error("Media file not found: {path}")]
    MediaMissing { path: PathBuf },

    #[error("Media preprocessing failed for {path}: {reason}")]
    MediaPreprocessing { path: PathBuf, reason: String },

    #[error("Generation failed: {reason}")]
    Generation { reason: String },

    #[error("Model {model} is not available at {api_base}: {reason}")]
    ModelUnavailable {
        model: String,
        api_base: String,
        reason: String,
    },

    #[error("Invalid prompt template: {reason}")]
    TemplateInvalid { reason: String },

    #[error("Invalid value {value:?} for {key}: {reason}")]
    ConfigInvalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid result naming: {reason}")]
    InvalidNaming { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

impl RazmetkaError {
    /// Transient errors skip the record and leave it pending for the next run.
    pub fn is_transient(&self) -> bool {
        matches!(self, RazmetkaError::MediaPreprocessing { .. })
    }
}

pub type Result<T> = std::result::Result<T, RazmetkaError>;
