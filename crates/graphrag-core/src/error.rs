use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or placeholder secret, or an invalid tunable. Fatal at startup.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Corpus file not found: {}", .0.display())]
    InputMissing(PathBuf),

    /// Wraps whatever broke chunking, extraction, persistence or ingestion.
    #[error("Index build failed: {0}")]
    BuildFailed(#[source] Box<Error>),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Malformed persisted state in {}: {reason}", path.display())]
    MalformedPersistedState { path: PathBuf, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn build_failed(cause: Error) -> Self {
        match cause {
            already @ Error::BuildFailed(_) => already,
            other => Error::BuildFailed(Box::new(other)),
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::MalformedPersistedState { path: path.into(), reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
