//! Primitive value cells and extensions
//!
//! A FHIR primitive is a scalar that may additionally carry an element `id`
//! and extensions. The metadata may be present while the value is not.

use super::data_type::ScalarKind;
use super::record::Choice;
use rust_decimal::Decimal;
use std::fmt;

/// Scalar payload of a primitive.
///
/// Date-like values (`date`, `dateTime`, `instant`, `time`) are kept in their
/// lexical form so they survive a round trip byte for byte.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Boolean(_) => ScalarKind::Boolean,
            Scalar::Integer(_) => ScalarKind::Integer,
            Scalar::Decimal(_) => ScalarKind::Decimal,
            Scalar::String(_) => ScalarKind::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Scalar::Decimal(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Decimal(d) => write!(f, "{}", d),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Boolean(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Integer(value.into())
    }
}

impl From<Decimal> for Scalar {
    fn from(value: Decimal) -> Self {
        Scalar::Decimal(value)
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

/// A primitive value with its side-channel metadata.
///
/// `value == None` with an `id` or extensions is a legal "absent but
/// annotated" value. A cell with neither is empty and is never emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive<T = Scalar> {
    pub value: Option<T>,
    pub id: Option<String>,
    pub extension: Vec<Extension>,
}

impl<T> Default for Primitive<T> {
    fn default() -> Self {
        Self {
            value: None,
            id: None,
            extension: Vec::new(),
        }
    }
}

impl<T> Primitive<T> {
    pub fn new(value: impl Into<T>) -> Self {
        Self {
            value: Some(value.into()),
            id: None,
            extension: Vec::new(),
        }
    }

    /// A cell carrying metadata but no value.
    pub fn metadata_only(id: Option<String>, extension: Vec<Extension>) -> Self {
        Self {
            value: None,
            id,
            extension,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension.push(extension);
        self
    }

    pub fn has_metadata(&self) -> bool {
        self.id.is_some() || !self.extension.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && !self.has_metadata()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Primitive<U> {
        Primitive {
            value: self.value.map(f),
            id: self.id,
            extension: self.extension,
        }
    }
}

impl Primitive<Scalar> {
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Scalar::as_str)
    }
}

impl From<bool> for Primitive {
    fn from(value: bool) -> Self {
        Primitive::new(value)
    }
}

impl From<i64> for Primitive {
    fn from(value: i64) -> Self {
        Primitive::new(value)
    }
}

impl From<i32> for Primitive {
    fn from(value: i32) -> Self {
        Primitive::new(value)
    }
}

impl From<Decimal> for Primitive {
    fn from(value: Decimal) -> Self {
        Primitive::new(value)
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Primitive::new(value)
    }
}

impl From<String> for Primitive {
    fn from(value: String) -> Self {
        Primitive::new(value)
    }
}

/// FHIR Extension
///
/// Identified by `url`; the value is a choice over the open type list and
/// extensions nest to arbitrary depth. Sequence order is significant for
/// round-tripping.
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub id: Option<String>,
    pub url: String,
    pub value: Option<Choice>,
    pub extension: Vec<Extension>,
}

impl Extension {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: None,
            url: url.into(),
            value: None,
            extension: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: Choice) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension.push(extension);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}
