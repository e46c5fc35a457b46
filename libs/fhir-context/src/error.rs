//! Error types for the schema catalogue

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Type not found in schema catalogue: {0}")]
    UnknownType(String),

    #[error("Type defined twice in schema catalogue: {0}")]
    DuplicateType(String),

    #[error("Field '{field}' defined twice on {type_name}")]
    DuplicateField { type_name: String, field: String },

    #[error("Wire name '{wire_name}' of {type_name} maps to more than one field")]
    DuplicateWireName { type_name: String, wire_name: String },

    #[error("Invalid field '{field}' on {type_name}: {reason}")]
    InvalidField {
        type_name: String,
        field: String,
        reason: String,
    },

    #[error("Unresolved type '{target}' referenced by {type_name}.{field}")]
    UnresolvedReference {
        type_name: String,
        field: String,
        target: String,
    },

    #[error("Invalid StructureDefinition: {0}")]
    InvalidStructureDefinition(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Model error: {0}")]
    Model(#[from] ferrum_models::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
