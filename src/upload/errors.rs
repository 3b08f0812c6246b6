use thiserror::Error;
use super::types::UploadId;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UploadError {
    #[error("Upload not found: {0}")]
    NotFound(UploadId),

    #[error("Upload {0} is in flight and cannot be removed")]
    InFlight(UploadId),

    #[error("A batch upload is already running")]
    AlreadyRunning,
}

pub type Result<T, E = UploadError> = std::result::Result<T, E>;
