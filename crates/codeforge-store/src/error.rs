use codeforge_core::ForgeError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[cfg(feature = "sqlite")]
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http: {0}")]
    Http(String),

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("backend not available in this build: {0}")]
    Unsupported(String),

    #[error("background task failed: {0}")]
    Task(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

impl From<StoreError> for ForgeError {
    fn from(e: StoreError) -> Self {
        ForgeError::storage(e.to_string())
    }
}
