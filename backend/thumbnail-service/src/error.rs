/// Error types for thumbnail-service
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// Input image is not in a supported container format or fails to decode
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// A target thumbnail size is malformed (e.g. zero height)
    #[error("invalid thumbnail spec: {0}")]
    InvalidThumbnailSpec(String),

    #[error("image job not found: {0}")]
    JobNotFound(Uuid),

    /// The job is already in the pending state; duplicate dispatch
    #[error("image job {0} is already being processed")]
    AlreadyProcessing(Uuid),

    /// External link resolution failed: unknown id, wrong format or expired
    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("blob storage error: {0}")]
    Storage(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}
