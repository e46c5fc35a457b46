//! Records, choice values and resource envelopes
//!
//! A [`Record`] is the generic in-memory form of any FHIR resource, data type
//! or backbone element. Its fields are keyed by their logical name; the wire
//! order comes from the schema, so equality does not depend on the order in
//! which fields were set.

use super::data_type::DataType;
use super::error::{Error, Result};
use super::primitive::{Extension, Primitive};
use std::collections::BTreeMap;

/// Value of one logical field of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// `Element.id` of a data type or backbone element
    ElementId(String),
    Primitive(Primitive),
    Primitives(Vec<Primitive>),
    Complex(Record),
    Complexes(Vec<Record>),
    Choice(Choice),
    Extensions(Vec<Extension>),
    Resource(ResourceEnvelope),
    Resources(Vec<ResourceEnvelope>),
    /// Narrative XHTML, kept verbatim
    Xhtml(String),
}

impl FieldValue {
    /// Short description of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::ElementId(_) => "element id",
            FieldValue::Primitive(_) => "primitive",
            FieldValue::Primitives(_) => "primitive list",
            FieldValue::Complex(_) => "complex",
            FieldValue::Complexes(_) => "complex list",
            FieldValue::Choice(_) => "choice",
            FieldValue::Extensions(_) => "extension list",
            FieldValue::Resource(_) => "resource",
            FieldValue::Resources(_) => "resource list",
            FieldValue::Xhtml(_) => "xhtml",
        }
    }
}

impl From<Primitive> for FieldValue {
    fn from(value: Primitive) -> Self {
        FieldValue::Primitive(value)
    }
}

impl From<Vec<Primitive>> for FieldValue {
    fn from(value: Vec<Primitive>) -> Self {
        FieldValue::Primitives(value)
    }
}

impl From<Record> for FieldValue {
    fn from(value: Record) -> Self {
        FieldValue::Complex(value)
    }
}

impl From<Vec<Record>> for FieldValue {
    fn from(value: Vec<Record>) -> Self {
        FieldValue::Complexes(value)
    }
}

impl From<Choice> for FieldValue {
    fn from(value: Choice) -> Self {
        FieldValue::Choice(value)
    }
}

impl From<Vec<Extension>> for FieldValue {
    fn from(value: Vec<Extension>) -> Self {
        FieldValue::Extensions(value)
    }
}

impl From<ResourceEnvelope> for FieldValue {
    fn from(value: ResourceEnvelope) -> Self {
        FieldValue::Resource(value)
    }
}

impl From<Vec<ResourceEnvelope>> for FieldValue {
    fn from(value: Vec<ResourceEnvelope>) -> Self {
        FieldValue::Resources(value)
    }
}

/// A named collection of typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Type name as known to the schema catalogue (`Patient`, `Period`,
    /// `Observation.component`).
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.fields.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn element_id(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::ElementId(id)) => Some(id),
            _ => None,
        }
    }

    pub fn primitive(&self, name: &str) -> Option<&Primitive> {
        match self.fields.get(name) {
            Some(FieldValue::Primitive(p)) => Some(p),
            _ => None,
        }
    }

    pub fn primitives(&self, name: &str) -> Option<&[Primitive]> {
        match self.fields.get(name) {
            Some(FieldValue::Primitives(p)) => Some(p),
            _ => None,
        }
    }

    pub fn complex(&self, name: &str) -> Option<&Record> {
        match self.fields.get(name) {
            Some(FieldValue::Complex(r)) => Some(r),
            _ => None,
        }
    }

    pub fn complexes(&self, name: &str) -> Option<&[Record]> {
        match self.fields.get(name) {
            Some(FieldValue::Complexes(r)) => Some(r),
            _ => None,
        }
    }

    pub fn choice(&self, name: &str) -> Option<&Choice> {
        match self.fields.get(name) {
            Some(FieldValue::Choice(c)) => Some(c),
            _ => None,
        }
    }

    pub fn extensions(&self, name: &str) -> Option<&[Extension]> {
        match self.fields.get(name) {
            Some(FieldValue::Extensions(e)) => Some(e),
            _ => None,
        }
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceEnvelope> {
        match self.fields.get(name) {
            Some(FieldValue::Resource(r)) => Some(r),
            _ => None,
        }
    }

    pub fn resources(&self, name: &str) -> Option<&[ResourceEnvelope]> {
        match self.fields.get(name) {
            Some(FieldValue::Resources(r)) => Some(r),
            _ => None,
        }
    }
}

/// Payload of a choice value.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceValue {
    Primitive(Primitive),
    Complex(Record),
}

/// A populated choice field: exactly one variant, tagged with its type.
///
/// The constructors keep the tag and the payload consistent: primitive tags
/// carry a [`Primitive`] whose scalar matches the type, complex tags carry a
/// [`Record`] of that type.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    data_type: DataType,
    value: ChoiceValue,
}

impl Choice {
    pub fn primitive(data_type: DataType, value: Primitive) -> Result<Self> {
        let kind = data_type.scalar_kind().ok_or_else(|| {
            Error::InvalidFieldValue(format!("{} is not a primitive type", data_type))
        })?;
        if let Some(scalar) = &value.value {
            if scalar.kind() != kind {
                return Err(Error::InvalidFieldValue(format!(
                    "{} value for {} choice variant",
                    scalar.kind().name(),
                    data_type
                )));
            }
        }
        Ok(Self {
            data_type,
            value: ChoiceValue::Primitive(value),
        })
    }

    pub fn complex(record: Record) -> Result<Self> {
        let data_type = DataType::from_name(record.type_name())
            .filter(|t| !t.is_primitive())
            .ok_or_else(|| Error::UnknownDataType(record.type_name().to_string()))?;
        Ok(Self {
            data_type,
            value: ChoiceValue::Complex(record),
        })
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn value(&self) -> &ChoiceValue {
        &self.value
    }

    pub fn into_value(self) -> ChoiceValue {
        self.value
    }

    pub fn as_primitive(&self) -> Option<&Primitive> {
        match &self.value {
            ChoiceValue::Primitive(p) => Some(p),
            ChoiceValue::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&Record> {
        match &self.value {
            ChoiceValue::Complex(r) => Some(r),
            ChoiceValue::Primitive(_) => None,
        }
    }
}

/// A resource of the polymorphic family, paired with its discriminator.
///
/// The record is boxed so that large resource lists (`contained`,
/// `Bundle.entry.resource`) stay cheap to move.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEnvelope {
    resource_type: String,
    record: Box<Record>,
}

impl ResourceEnvelope {
    /// Wrap a record; the discriminator is the record's type name.
    pub fn new(record: Record) -> Self {
        Self {
            resource_type: record.type_name().to_string(),
            record: Box::new(record),
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    pub fn into_record(self) -> Record {
        *self.record
    }
}
