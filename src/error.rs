//! Error types for blob-volumes

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Incorrect mime type: {0}")]
    InvalidMimeType(String),

    #[error("Size to store is too big {size}, max allowed size is {max} bytes")]
    TooBigItem { size: u64, max: u64 },

    #[error("No blob volumes are available to store the item")]
    NoVolumeAvailable,

    #[error("There is no such blob volume with ID {0}")]
    NoSuchVolume(u32),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// How a boundary layer should present an error to its client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The addressed volume (or item) does not exist
    NotFound,
    /// The request itself was unacceptable
    ClientInput,
    /// Allocation, database or configuration fault
    Server,
}

impl StorageError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StorageError::NoSuchVolume(_) => ErrorClass::NotFound,
            StorageError::InvalidMimeType(_)
            | StorageError::TooBigItem { .. }
            | StorageError::Validation(_) => ErrorClass::ClientInput,
            _ => ErrorClass::Server,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(StorageError::NoSuchVolume(77).class(), ErrorClass::NotFound);
        assert_eq!(
            StorageError::TooBigItem { size: 30_000_000, max: 20_971_520 }.class(),
            ErrorClass::ClientInput
        );
        assert_eq!(
            StorageError::InvalidMimeType("x".into()).class(),
            ErrorClass::ClientInput
        );
        assert_eq!(StorageError::NoVolumeAvailable.class(), ErrorClass::Server);
        assert_eq!(StorageError::Database("boom".into()).class(), ErrorClass::Server);
    }

    #[test]
    fn test_too_big_message() {
        let err = StorageError::TooBigItem { size: 30, max: 20 };
        assert!(err.to_string().starts_with("Size to store is too big"));
    }
}
