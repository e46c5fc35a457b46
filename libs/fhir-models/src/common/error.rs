//! Error types for FHIR models

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),

    #[error("Invalid field value: {0}")]
    InvalidFieldValue(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid element path: {0}")]
    InvalidPath(String),
}

pub type Result<T> = std::result::Result<T, Error>;
