use thiserror::Error;

/// Main error type for the record linkage toolkit
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Report serialization error: {0}")]
    Report(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(std::time::Duration),
}

/// Result type alias for linkage operations
pub type Result<T> = std::result::Result<T, LinkError>;
