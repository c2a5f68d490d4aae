use thiserror::Error;

use crate::scraper::source::SourceError;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("A scrape run is already in progress")]
    AlreadyRunning,

    #[error("No scrape run is in progress")]
    NotRunning,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transient fetch error: {0}")]
    TransientFetch(String),

    #[error("Source unavailable: {0}")]
    UnrecoverableSource(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<uuid::Error> for BoardError {
    fn from(err: uuid::Error) -> Self {
        BoardError::Validation(err.to_string())
    }
}

impl From<SourceError> for BoardError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Transient(message) => BoardError::TransientFetch(message),
            SourceError::Unrecoverable(message) => BoardError::UnrecoverableSource(message),
        }
    }
}
