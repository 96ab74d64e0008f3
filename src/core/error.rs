//! Error taxonomy shared by the store, repository and refresh pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FxError {
    /// The local store could not be opened, read or written.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Transport failure or non-success response from the rate provider.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Refresh worker is no longer running")]
    WorkerUnavailable,
}

pub type Result<T, E = FxError> = std::result::Result<T, E>;

impl From<reqwest::Error> for FxError {
    /// The request URL carries the API key, so it is never part of the message.
    fn from(err: reqwest::Error) -> Self {
        FxError::NetworkFailure(err.without_url().to_string())
    }
}

impl From<fjall::Error> for FxError {
    fn from(err: fjall::Error) -> Self {
        FxError::StorageUnavailable(err.to_string())
    }
}

impl FxError {
    pub fn is_network(&self) -> bool {
        matches!(self, FxError::NetworkFailure(_))
    }
}
