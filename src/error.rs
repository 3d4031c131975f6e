// src/error.rs

use crate::models::GraderId;

/// Failure of a key-value store backing the grade cache or the profiles.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Any failure talking to the upstream LMS.
#[derive(Debug, thiserror::Error)]
#[error("Failed to fetch {resource}: {message}")]
pub struct UpstreamFetchError {
    pub resource: String,
    pub message: String,
}

impl UpstreamFetchError {
    pub fn new(resource: impl Into<String>, message: impl ToString) -> Self {
        Self {
            resource: resource.into(),
            message: message.to_string(),
        }
    }
}

/// Persisted profile state that could not be used. Never fatal: the profile starts untrained.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Could not read stored profile: {0}")]
    Store(#[from] StoreError),

    #[error("Stored profile is corrupted: {0}")]
    Corrupted(#[from] serde_json::Error),

    #[error("Stored profile uses feature schema v{found}, expected v{expected}")]
    SchemaMismatch { found: u32, expected: u32 },
}

/// Failures of single-profile operations.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Need at least {required} labeled samples to train, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Profile for grader {0} is not trained yet")]
    NotTrained(GraderId),

    #[error("Model training failed: {0}")]
    Training(String),

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Failed to persist profile: {0}")]
    Persistence(#[from] StoreError),
}
