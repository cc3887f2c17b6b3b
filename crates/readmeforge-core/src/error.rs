//! Error types for ReadmeForge.

use thiserror::Error;

/// Core error type for all ReadmeForge operations.
///
/// Recoverable provider failures never surface as this type outside the
/// fallback controller; only `NoUsableBackend` and `ExhaustedRetries` are
/// terminal from a caller's point of view.
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No usable LLM backend: {0}")]
    NoUsableBackend(String),

    #[error("LLM call failed after {attempts} attempts. Last error: {last_error}")]
    ExhaustedRetries { attempts: usize, last_error: String },

    #[error("{0}")]
    Other(String),
}

impl ForgeError {
    /// True for the terminal "every avenue tried" failure.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::ExhaustedRetries { .. })
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;
