use thiserror::Error;

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
pub enum ScanIndexError {
    /// A build or query argument failed validation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, ScanIndexError>;
