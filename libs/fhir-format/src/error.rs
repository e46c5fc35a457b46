//! Codec errors

use ferrum_models::DataType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("expected a JSON object for the resource")]
    ExpectedObject,
    #[error("missing resourceType property at {path}")]
    MissingResourceType { path: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("{path}: {message}")]
    Structure { path: String, message: String },
    #[error("{path}: unexpected namespace {namespace:?}")]
    Namespace {
        path: String,
        namespace: Option<String>,
    },
    #[error("{path}: unexpected attribute '{attribute}'")]
    UnexpectedAttribute { path: String, attribute: String },
    #[error("{path}: unknown element '{name}'")]
    UnknownElement { path: String, name: String },
    #[error("{path}: invalid {data_type} value {value:?}")]
    InvalidPrimitive {
        path: String,
        data_type: DataType,
        value: String,
    },
    #[error("{path}: nesting deeper than {limit} levels")]
    DepthLimit { path: String, limit: usize },

    #[error("{path}: choice field '{field}' has more than one variant: {}", variant_list(.variants))]
    ChoiceConflict {
        path: String,
        field: String,
        variants: Vec<DataType>,
    },

    #[error("{path}: unknown resource type '{resource_type}'")]
    UnknownResourceType { path: String, resource_type: String },

    #[error("{path}: '_{field}' has {shadows} entries but '{field}' has {values}")]
    ArrayAlignment {
        path: String,
        field: String,
        values: usize,
        shadows: usize,
    },

    #[error("{path}: {data_type} is not an allowed variant of choice field '{field}'")]
    InvalidChoiceVariant {
        path: String,
        field: String,
        data_type: DataType,
    },
    #[error("{path}: {message}")]
    SchemaMismatch { path: String, message: String },
    #[error("type not found in schema catalogue: {0}")]
    UnknownType(String),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry setup: {0}")]
    Registry(String),
    #[error("schema catalogue: {0}")]
    Catalog(#[from] ferrum_context::Error),
}

fn variant_list(variants: &[DataType]) -> String {
    variants
        .iter()
        .map(|v| v.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coarse classification of a [`FormatError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: syntax, unexpected keys or elements, bad namespaces,
    /// unparsable primitives, excessive nesting
    Structural,
    /// More than one variant of a choice field present
    ChoiceConflict,
    /// Discriminator not registered
    UnknownDiscriminator,
    /// Shadow array does not line up with its values array
    ArrayAlignment,
    /// Record graph does not fit the schema on encode
    Encode,
    /// Registry or catalogue construction
    Setup,
}

impl FormatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FormatError::ExpectedObject
            | FormatError::MissingResourceType { .. }
            | FormatError::Json(_)
            | FormatError::Xml(_)
            | FormatError::Utf8(_)
            | FormatError::Structure { .. }
            | FormatError::Namespace { .. }
            | FormatError::UnexpectedAttribute { .. }
            | FormatError::UnknownElement { .. }
            | FormatError::InvalidPrimitive { .. }
            | FormatError::DepthLimit { .. } => ErrorKind::Structural,
            FormatError::ChoiceConflict { .. } => ErrorKind::ChoiceConflict,
            FormatError::UnknownResourceType { .. } => ErrorKind::UnknownDiscriminator,
            FormatError::ArrayAlignment { .. } => ErrorKind::ArrayAlignment,
            FormatError::InvalidChoiceVariant { .. }
            | FormatError::SchemaMismatch { .. }
            | FormatError::UnknownType(_)
            | FormatError::XmlWrite(_)
            | FormatError::Io(_) => ErrorKind::Encode,
            FormatError::Registry(_) | FormatError::Catalog(_) => ErrorKind::Setup,
        }
    }

    /// Field path the error was raised at, when it has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            FormatError::MissingResourceType { path }
            | FormatError::Structure { path, .. }
            | FormatError::Namespace { path, .. }
            | FormatError::UnexpectedAttribute { path, .. }
            | FormatError::UnknownElement { path, .. }
            | FormatError::InvalidPrimitive { path, .. }
            | FormatError::DepthLimit { path, .. }
            | FormatError::ChoiceConflict { path, .. }
            | FormatError::UnknownResourceType { path, .. }
            | FormatError::ArrayAlignment { path, .. }
            | FormatError::InvalidChoiceVariant { path, .. }
            | FormatError::SchemaMismatch { path, .. } => Some(path),
            _ => None,
        }
    }

    pub(crate) fn structure(path: &str, message: impl Into<String>) -> Self {
        FormatError::Structure {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn mismatch(path: &str, message: impl Into<String>) -> Self {
        FormatError::SchemaMismatch {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn unknown_element(path: &str, name: &str) -> Self {
        FormatError::UnknownElement {
            path: path.to_string(),
            name: name.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FormatError>;
