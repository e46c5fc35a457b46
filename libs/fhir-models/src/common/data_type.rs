//! Closed set of FHIR data types used to tag choice values
//!
//! Resource types are open-ended and live in the schema catalogue; data types
//! are a small fixed list, so choice variants carry a [`DataType`] and every
//! `match` over them is checked by the compiler.

use super::error::{Error, Result};
use phf::phf_map;
use std::fmt;
use std::str::FromStr;

/// Scalar representation a primitive data type uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// JSON `true`/`false`, XML `value="true"`
    Boolean,
    /// JSON number without fraction
    Integer,
    /// JSON number, arbitrary precision
    Decimal,
    /// JSON string (dates, codes, uris, ... are lexical strings)
    String,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Boolean => "boolean",
            ScalarKind::Integer => "integer",
            ScalarKind::Decimal => "decimal",
            ScalarKind::String => "string",
        }
    }
}

/// FHIR data types that may appear as a choice variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    // Primitive types
    Base64Binary,
    Boolean,
    Canonical,
    Code,
    Date,
    DateTime,
    Decimal,
    Id,
    Instant,
    Integer,
    Markdown,
    Oid,
    PositiveInt,
    String,
    Time,
    UnsignedInt,
    Uri,
    Url,
    Uuid,

    // General-purpose complex types
    Address,
    Age,
    Annotation,
    Attachment,
    CodeableConcept,
    Coding,
    ContactPoint,
    Count,
    Distance,
    Duration,
    HumanName,
    Identifier,
    Money,
    Period,
    Quantity,
    Range,
    Ratio,
    Reference,
    SampledData,
    Signature,
    Timing,

    // Metadata and special-purpose types
    ContactDetail,
    Contributor,
    DataRequirement,
    Dosage,
    Expression,
    Meta,
    ParameterDefinition,
    RelatedArtifact,
    TriggerDefinition,
    UsageContext,
}

static BY_NAME: phf::Map<&'static str, DataType> = phf_map! {
    "base64Binary" => DataType::Base64Binary,
    "boolean" => DataType::Boolean,
    "canonical" => DataType::Canonical,
    "code" => DataType::Code,
    "date" => DataType::Date,
    "dateTime" => DataType::DateTime,
    "decimal" => DataType::Decimal,
    "id" => DataType::Id,
    "instant" => DataType::Instant,
    "integer" => DataType::Integer,
    "markdown" => DataType::Markdown,
    "oid" => DataType::Oid,
    "positiveInt" => DataType::PositiveInt,
    "string" => DataType::String,
    "time" => DataType::Time,
    "unsignedInt" => DataType::UnsignedInt,
    "uri" => DataType::Uri,
    "url" => DataType::Url,
    "uuid" => DataType::Uuid,
    "Address" => DataType::Address,
    "Age" => DataType::Age,
    "Annotation" => DataType::Annotation,
    "Attachment" => DataType::Attachment,
    "CodeableConcept" => DataType::CodeableConcept,
    "Coding" => DataType::Coding,
    "ContactPoint" => DataType::ContactPoint,
    "Count" => DataType::Count,
    "Distance" => DataType::Distance,
    "Duration" => DataType::Duration,
    "HumanName" => DataType::HumanName,
    "Identifier" => DataType::Identifier,
    "Money" => DataType::Money,
    "Period" => DataType::Period,
    "Quantity" => DataType::Quantity,
    "Range" => DataType::Range,
    "Ratio" => DataType::Ratio,
    "Reference" => DataType::Reference,
    "SampledData" => DataType::SampledData,
    "Signature" => DataType::Signature,
    "Timing" => DataType::Timing,
    "ContactDetail" => DataType::ContactDetail,
    "Contributor" => DataType::Contributor,
    "DataRequirement" => DataType::DataRequirement,
    "Dosage" => DataType::Dosage,
    "Expression" => DataType::Expression,
    "Meta" => DataType::Meta,
    "ParameterDefinition" => DataType::ParameterDefinition,
    "RelatedArtifact" => DataType::RelatedArtifact,
    "TriggerDefinition" => DataType::TriggerDefinition,
    "UsageContext" => DataType::UsageContext,
};

impl DataType {
    /// Every data type, primitives first, in declaration order.
    pub const ALL: &'static [DataType] = &[
        DataType::Base64Binary,
        DataType::Boolean,
        DataType::Canonical,
        DataType::Code,
        DataType::Date,
        DataType::DateTime,
        DataType::Decimal,
        DataType::Id,
        DataType::Instant,
        DataType::Integer,
        DataType::Markdown,
        DataType::Oid,
        DataType::PositiveInt,
        DataType::String,
        DataType::Time,
        DataType::UnsignedInt,
        DataType::Uri,
        DataType::Url,
        DataType::Uuid,
        DataType::Address,
        DataType::Age,
        DataType::Annotation,
        DataType::Attachment,
        DataType::CodeableConcept,
        DataType::Coding,
        DataType::ContactPoint,
        DataType::Count,
        DataType::Distance,
        DataType::Duration,
        DataType::HumanName,
        DataType::Identifier,
        DataType::Money,
        DataType::Period,
        DataType::Quantity,
        DataType::Range,
        DataType::Ratio,
        DataType::Reference,
        DataType::SampledData,
        DataType::Signature,
        DataType::Timing,
        DataType::ContactDetail,
        DataType::Contributor,
        DataType::DataRequirement,
        DataType::Dosage,
        DataType::Expression,
        DataType::Meta,
        DataType::ParameterDefinition,
        DataType::RelatedArtifact,
        DataType::TriggerDefinition,
        DataType::UsageContext,
    ];

    /// Types allowed in `Extension.value[x]` (the "open" type list).
    pub const OPEN_TYPES: &'static [DataType] = DataType::ALL;

    /// Look up a type by its FHIR name (`dateTime`, `Period`, ...).
    pub fn from_name(name: &str) -> Option<DataType> {
        BY_NAME.get(name).copied()
    }

    /// Look up a type by its choice suffix (`DateTime`, `Period`, ...).
    pub fn from_tag(tag: &str) -> Option<DataType> {
        DataType::ALL.iter().copied().find(|t| t.tag() == tag)
    }

    /// FHIR type name, as used in StructureDefinitions.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Base64Binary => "base64Binary",
            DataType::Boolean => "boolean",
            DataType::Canonical => "canonical",
            DataType::Code => "code",
            DataType::Date => "date",
            DataType::DateTime => "dateTime",
            DataType::Decimal => "decimal",
            DataType::Id => "id",
            DataType::Instant => "instant",
            DataType::Integer => "integer",
            DataType::Markdown => "markdown",
            DataType::Oid => "oid",
            DataType::PositiveInt => "positiveInt",
            DataType::String => "string",
            DataType::Time => "time",
            DataType::UnsignedInt => "unsignedInt",
            DataType::Uri => "uri",
            DataType::Url => "url",
            DataType::Uuid => "uuid",
            other => other.tag(),
        }
    }

    /// Suffix appended to a choice field's name on the wire.
    ///
    /// The type name with its first letter upper-cased: `valueDateTime`,
    /// `effectivePeriod`.
    pub fn tag(self) -> &'static str {
        match self {
            DataType::Base64Binary => "Base64Binary",
            DataType::Boolean => "Boolean",
            DataType::Canonical => "Canonical",
            DataType::Code => "Code",
            DataType::Date => "Date",
            DataType::DateTime => "DateTime",
            DataType::Decimal => "Decimal",
            DataType::Id => "Id",
            DataType::Instant => "Instant",
            DataType::Integer => "Integer",
            DataType::Markdown => "Markdown",
            DataType::Oid => "Oid",
            DataType::PositiveInt => "PositiveInt",
            DataType::String => "String",
            DataType::Time => "Time",
            DataType::UnsignedInt => "UnsignedInt",
            DataType::Uri => "Uri",
            DataType::Url => "Url",
            DataType::Uuid => "Uuid",
            DataType::Address => "Address",
            DataType::Age => "Age",
            DataType::Annotation => "Annotation",
            DataType::Attachment => "Attachment",
            DataType::CodeableConcept => "CodeableConcept",
            DataType::Coding => "Coding",
            DataType::ContactPoint => "ContactPoint",
            DataType::Count => "Count",
            DataType::Distance => "Distance",
            DataType::Duration => "Duration",
            DataType::HumanName => "HumanName",
            DataType::Identifier => "Identifier",
            DataType::Money => "Money",
            DataType::Period => "Period",
            DataType::Quantity => "Quantity",
            DataType::Range => "Range",
            DataType::Ratio => "Ratio",
            DataType::Reference => "Reference",
            DataType::SampledData => "SampledData",
            DataType::Signature => "Signature",
            DataType::Timing => "Timing",
            DataType::ContactDetail => "ContactDetail",
            DataType::Contributor => "Contributor",
            DataType::DataRequirement => "DataRequirement",
            DataType::Dosage => "Dosage",
            DataType::Expression => "Expression",
            DataType::Meta => "Meta",
            DataType::ParameterDefinition => "ParameterDefinition",
            DataType::RelatedArtifact => "RelatedArtifact",
            DataType::TriggerDefinition => "TriggerDefinition",
            DataType::UsageContext => "UsageContext",
        }
    }

    /// Scalar representation for primitive types, `None` for complex types.
    pub fn scalar_kind(self) -> Option<ScalarKind> {
        match self {
            DataType::Boolean => Some(ScalarKind::Boolean),
            DataType::Integer | DataType::PositiveInt | DataType::UnsignedInt => {
                Some(ScalarKind::Integer)
            }
            DataType::Decimal => Some(ScalarKind::Decimal),
            DataType::Base64Binary
            | DataType::Canonical
            | DataType::Code
            | DataType::Date
            | DataType::DateTime
            | DataType::Id
            | DataType::Instant
            | DataType::Markdown
            | DataType::Oid
            | DataType::String
            | DataType::Time
            | DataType::Uri
            | DataType::Url
            | DataType::Uuid => Some(ScalarKind::String),
            _ => None,
        }
    }

    pub fn is_primitive(self) -> bool {
        self.scalar_kind().is_some()
    }

    /// Wire name of this variant for the choice field `field`.
    pub fn choice_key(self, field: &str) -> String {
        let tag = self.tag();
        let mut key = String::with_capacity(field.len() + tag.len());
        key.push_str(field);
        key.push_str(tag);
        key
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DataType::from_name(s).ok_or_else(|| Error::UnknownDataType(s.to_string()))
    }
}
