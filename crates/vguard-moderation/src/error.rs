//! Classification error types.

use thiserror::Error;

pub type ClassifierResult<T> = Result<T, ClassifierError>;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Backend request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Classification timed out after {0} ms")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not read frame: {0}")]
    Io(#[from] std::io::Error),
}

impl ClassifierError {
    /// Short outcome label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            ClassifierError::Timeout(_) => "timeout",
            _ => "error",
        }
    }
}
