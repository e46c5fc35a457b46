//! Built-in schema catalogue for a slice of FHIR R4
//!
//! Covers the general-purpose data types and a handful of resources that
//! exercise every field kind: choice fields (`Observation.value[x]`),
//! recursive backbones (`Composition.section`, `Parameters.parameter.part`),
//! embedded resources (`contained`, `Bundle.entry.resource`) and narrative.

use crate::catalog::SchemaCatalog;
use crate::error::Result;
use crate::schema::{TypeBuilder, TypeKind, TypeSchema};
use ferrum_models::DataType::{self, *};

/// `Element`: id and extensions.
fn element(name: &str) -> TypeBuilder {
    TypeSchema::builder(name, TypeKind::ComplexType)
        .element_id()
        .extensions("extension")
}

/// Data types derived from `BackboneElement` (`Timing`, `Dosage`).
fn backbone_type(name: &str) -> TypeBuilder {
    element(name).extensions("modifierExtension")
}

/// Anonymous nested element named by its path.
fn backbone(path: &str) -> TypeBuilder {
    TypeSchema::builder(path, TypeKind::Backbone)
        .element_id()
        .extensions("extension")
        .extensions("modifierExtension")
}

/// Nested element of a data type: id and extensions, no modifiers.
fn element_backbone(path: &str) -> TypeBuilder {
    TypeSchema::builder(path, TypeKind::Backbone)
        .element_id()
        .extensions("extension")
}

/// `Resource` base fields.
fn resource(name: &str) -> TypeBuilder {
    TypeSchema::builder(name, TypeKind::Resource)
        .primitive("id", Id)
        .complex("meta", "Meta")
        .primitive("implicitRules", Uri)
        .primitive("language", Code)
}

/// `DomainResource` base fields.
fn domain_resource(name: &str) -> TypeBuilder {
    resource(name)
        .complex("text", "Narrative")
        .resources("contained")
        .extensions("extension")
        .extensions("modifierExtension")
}

/// Quantity and its specializations share one shape.
fn quantity(name: &str) -> TypeBuilder {
    element(name)
        .primitive("value", Decimal)
        .primitive("comparator", Code)
        .primitive("unit", DataType::String)
        .primitive("system", Uri)
        .primitive("code", Code)
}

const OBSERVATION_VALUE: &[DataType] = &[
    Quantity,
    CodeableConcept,
    DataType::String,
    Boolean,
    Integer,
    Range,
    Ratio,
    SampledData,
    Time,
    DateTime,
    Period,
];

const PARAMETER_VALUE: &[DataType] = &[
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
    DataType::String,
    Time,
    UnsignedInt,
    Uri,
    Url,
    Uuid,
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
    Timing,
    Dosage,
    Meta,
];

fn datatypes() -> Vec<TypeBuilder> {
    vec![
        element("Coding")
            .primitive("system", Uri)
            .primitive("version", DataType::String)
            .primitive("code", Code)
            .primitive("display", DataType::String)
            .primitive("userSelected", Boolean),
        element("CodeableConcept")
            .complexes("coding", "Coding")
            .primitive("text", DataType::String),
        quantity("Quantity"),
        quantity("Age"),
        quantity("Count"),
        quantity("Distance"),
        quantity("Duration"),
        element("Money")
            .primitive("value", Decimal)
            .primitive("currency", Code),
        element("Range")
            .complex("low", "Quantity")
            .complex("high", "Quantity"),
        element("Ratio")
            .complex("numerator", "Quantity")
            .complex("denominator", "Quantity"),
        element("Period")
            .primitive("start", DateTime)
            .primitive("end", DateTime),
        element("Reference")
            .primitive("reference", DataType::String)
            .primitive("type", Uri)
            .complex("identifier", "Identifier")
            .primitive("display", DataType::String),
        element("Identifier")
            .primitive("use", Code)
            .complex("type", "CodeableConcept")
            .primitive("system", Uri)
            .primitive("value", DataType::String)
            .complex("period", "Period")
            .complex("assigner", "Reference"),
        element("HumanName")
            .primitive("use", Code)
            .primitive("text", DataType::String)
            .primitive("family", DataType::String)
            .primitives("given", DataType::String)
            .primitives("prefix", DataType::String)
            .primitives("suffix", DataType::String)
            .complex("period", "Period"),
        element("ContactPoint")
            .primitive("system", Code)
            .primitive("value", DataType::String)
            .primitive("use", Code)
            .primitive("rank", PositiveInt)
            .complex("period", "Period"),
        element("Address")
            .primitive("use", Code)
            .primitive("type", Code)
            .primitive("text", DataType::String)
            .primitives("line", DataType::String)
            .primitive("city", DataType::String)
            .primitive("district", DataType::String)
            .primitive("state", DataType::String)
            .primitive("postalCode", DataType::String)
            .primitive("country", DataType::String)
            .complex("period", "Period"),
        element("Annotation")
            .choice("author", &[Reference, DataType::String])
            .primitive("time", DateTime)
            .primitive("text", Markdown),
        element("Attachment")
            .primitive("contentType", Code)
            .primitive("language", Code)
            .primitive("data", Base64Binary)
            .primitive("url", Url)
            .primitive("size", UnsignedInt)
            .primitive("hash", Base64Binary)
            .primitive("title", DataType::String)
            .primitive("creation", DateTime),
        element("SampledData")
            .complex("origin", "Quantity")
            .primitive("period", Decimal)
            .primitive("factor", Decimal)
            .primitive("lowerLimit", Decimal)
            .primitive("upperLimit", Decimal)
            .primitive("dimensions", PositiveInt)
            .primitive("data", DataType::String),
        element("Meta")
            .primitive("versionId", Id)
            .primitive("lastUpdated", Instant)
            .primitive("source", Uri)
            .primitives("profile", Canonical)
            .complexes("security", "Coding")
            .complexes("tag", "Coding"),
        element("Narrative")
            .primitive("status", Code)
            .xhtml("div"),
        backbone_type("Timing")
            .primitives("event", DateTime)
            .complex("repeat", "Timing.repeat")
            .complex("code", "CodeableConcept"),
        element_backbone("Timing.repeat")
            .choice("bounds", &[Duration, Range, Period])
            .primitive("count", PositiveInt)
            .primitive("countMax", PositiveInt)
            .primitive("duration", Decimal)
            .primitive("durationMax", Decimal)
            .primitive("durationUnit", Code)
            .primitive("frequency", PositiveInt)
            .primitive("frequencyMax", PositiveInt)
            .primitive("period", Decimal)
            .primitive("periodMax", Decimal)
            .primitive("periodUnit", Code)
            .primitives("dayOfWeek", Code)
            .primitives("timeOfDay", Time)
            .primitives("when", Code)
            .primitive("offset", UnsignedInt),
        backbone_type("Dosage")
            .primitive("sequence", Integer)
            .primitive("text", DataType::String)
            .complexes("additionalInstruction", "CodeableConcept")
            .primitive("patientInstruction", DataType::String)
            .complex("timing", "Timing")
            .choice("asNeeded", &[Boolean, CodeableConcept])
            .complex("site", "CodeableConcept")
            .complex("route", "CodeableConcept")
            .complex("method", "CodeableConcept")
            .complexes("doseAndRate", "Dosage.doseAndRate")
            .complex("maxDosePerPeriod", "Ratio")
            .complex("maxDosePerAdministration", "Quantity")
            .complex("maxDosePerLifetime", "Quantity"),
        element_backbone("Dosage.doseAndRate")
            .complex("type", "CodeableConcept")
            .choice("dose", &[Range, Quantity])
            .choice("rate", &[Ratio, Range, Quantity]),
    ]
}

/// Metadata types: never used by the resources here, but open to
/// `Extension.value[x]`.
fn metadata_types() -> Vec<TypeBuilder> {
    vec![
        element("Signature")
            .complexes("type", "Coding")
            .primitive("when", Instant)
            .complex("who", "Reference")
            .complex("onBehalfOf", "Reference")
            .primitive("targetFormat", Code)
            .primitive("sigFormat", Code)
            .primitive("data", Base64Binary),
        element("ContactDetail")
            .primitive("name", DataType::String)
            .complexes("telecom", "ContactPoint"),
        element("Contributor")
            .primitive("type", Code)
            .primitive("name", DataType::String)
            .complexes("contact", "ContactDetail"),
        element("DataRequirement")
            .primitive("type", Code)
            .primitives("profile", Canonical)
            .choice("subject", &[CodeableConcept, Reference])
            .primitives("mustSupport", DataType::String)
            .complexes("codeFilter", "DataRequirement.codeFilter")
            .complexes("dateFilter", "DataRequirement.dateFilter")
            .primitive("limit", PositiveInt)
            .complexes("sort", "DataRequirement.sort"),
        element_backbone("DataRequirement.codeFilter")
            .primitive("path", DataType::String)
            .primitive("searchParam", DataType::String)
            .primitive("valueSet", Canonical)
            .complexes("code", "Coding"),
        element_backbone("DataRequirement.dateFilter")
            .primitive("path", DataType::String)
            .primitive("searchParam", DataType::String)
            .choice("value", &[DateTime, Period, Duration]),
        element_backbone("DataRequirement.sort")
            .primitive("path", DataType::String)
            .primitive("direction", Code),
        element("Expression")
            .primitive("description", DataType::String)
            .primitive("name", Id)
            .primitive("language", Code)
            .primitive("expression", DataType::String)
            .primitive("reference", Uri),
        element("ParameterDefinition")
            .primitive("name", Code)
            .primitive("use", Code)
            .primitive("min", Integer)
            .primitive("max", DataType::String)
            .primitive("documentation", DataType::String)
            .primitive("type", Code)
            .primitive("profile", Canonical),
        element("RelatedArtifact")
            .primitive("type", Code)
            .primitive("label", DataType::String)
            .primitive("display", DataType::String)
            .primitive("citation", Markdown)
            .primitive("url", Url)
            .complex("document", "Attachment")
            .primitive("resource", Canonical),
        element("TriggerDefinition")
            .primitive("type", Code)
            .primitive("name", DataType::String)
            .choice("timing", &[Timing, Reference, Date, DateTime])
            .complexes("data", "DataRequirement")
            .complex("condition", "Expression"),
        element("UsageContext")
            .complex("code", "Coding")
            .choice("value", &[CodeableConcept, Quantity, Range, Reference]),
    ]
}

fn resources() -> Vec<TypeBuilder> {
    vec![
        domain_resource("Patient")
            .complexes("identifier", "Identifier")
            .primitive("active", Boolean)
            .complexes("name", "HumanName")
            .complexes("telecom", "ContactPoint")
            .primitive("gender", Code)
            .primitive("birthDate", Date)
            .choice("deceased", &[Boolean, DateTime])
            .complexes("address", "Address")
            .complex("maritalStatus", "CodeableConcept")
            .choice("multipleBirth", &[Boolean, Integer])
            .complexes("photo", "Attachment")
            .complexes("contact", "Patient.contact")
            .complexes("generalPractitioner", "Reference")
            .complex("managingOrganization", "Reference")
            .complexes("link", "Patient.link"),
        backbone("Patient.contact")
            .complexes("relationship", "CodeableConcept")
            .complex("name", "HumanName")
            .complexes("telecom", "ContactPoint")
            .complex("address", "Address")
            .primitive("gender", Code)
            .complex("organization", "Reference")
            .complex("period", "Period"),
        backbone("Patient.link")
            .complex("other", "Reference")
            .primitive("type", Code),
        domain_resource("Observation")
            .complexes("identifier", "Identifier")
            .complexes("basedOn", "Reference")
            .complexes("partOf", "Reference")
            .primitive("status", Code)
            .complexes("category", "CodeableConcept")
            .complex("code", "CodeableConcept")
            .complex("subject", "Reference")
            .complexes("focus", "Reference")
            .complex("encounter", "Reference")
            .choice("effective", &[DateTime, Period, Timing, Instant])
            .primitive("issued", Instant)
            .complexes("performer", "Reference")
            .choice("value", OBSERVATION_VALUE)
            .complex("dataAbsentReason", "CodeableConcept")
            .complexes("interpretation", "CodeableConcept")
            .complexes("note", "Annotation")
            .complex("bodySite", "CodeableConcept")
            .complex("method", "CodeableConcept")
            .complex("specimen", "Reference")
            .complex("device", "Reference")
            .complexes("referenceRange", "Observation.referenceRange")
            .complexes("hasMember", "Reference")
            .complexes("derivedFrom", "Reference")
            .complexes("component", "Observation.component"),
        backbone("Observation.referenceRange")
            .complex("low", "Quantity")
            .complex("high", "Quantity")
            .complex("type", "CodeableConcept")
            .complexes("appliesTo", "CodeableConcept")
            .complex("age", "Range")
            .primitive("text", DataType::String),
        backbone("Observation.component")
            .complex("code", "CodeableConcept")
            .choice("value", OBSERVATION_VALUE)
            .complex("dataAbsentReason", "CodeableConcept")
            .complexes("interpretation", "CodeableConcept")
            .complexes("referenceRange", "Observation.referenceRange"),
        domain_resource("Encounter")
            .complexes("identifier", "Identifier")
            .primitive("status", Code)
            .complex("class", "Coding")
            .complexes("type", "CodeableConcept")
            .complex("priority", "CodeableConcept")
            .complex("subject", "Reference")
            .complex("period", "Period")
            .complex("length", "Duration")
            .complexes("reasonCode", "CodeableConcept")
            .complex("serviceProvider", "Reference")
            .complex("partOf", "Reference"),
        domain_resource("MedicationRequest")
            .complexes("identifier", "Identifier")
            .primitive("status", Code)
            .primitive("intent", Code)
            .choice("reported", &[Boolean, Reference])
            .choice("medication", &[CodeableConcept, Reference])
            .complex("subject", "Reference")
            .complex("encounter", "Reference")
            .primitive("authoredOn", DateTime)
            .complex("requester", "Reference")
            .complexes("reasonCode", "CodeableConcept")
            .complexes("note", "Annotation")
            .complexes("dosageInstruction", "Dosage"),
        domain_resource("Composition")
            .complex("identifier", "Identifier")
            .primitive("status", Code)
            .complex("type", "CodeableConcept")
            .complexes("category", "CodeableConcept")
            .complex("subject", "Reference")
            .complex("encounter", "Reference")
            .primitive("date", DateTime)
            .complexes("author", "Reference")
            .primitive("title", DataType::String)
            .primitive("confidentiality", Code)
            .complexes("section", "Composition.section"),
        backbone("Composition.section")
            .primitive("title", DataType::String)
            .complex("code", "CodeableConcept")
            .complexes("author", "Reference")
            .complex("focus", "Reference")
            .complex("text", "Narrative")
            .primitive("mode", Code)
            .complex("orderedBy", "CodeableConcept")
            .complexes("entry", "Reference")
            .complex("emptyReason", "CodeableConcept")
            .complexes("section", "Composition.section"),
        resource("Bundle")
            .complex("identifier", "Identifier")
            .primitive("type", Code)
            .primitive("timestamp", Instant)
            .primitive("total", UnsignedInt)
            .complexes("link", "Bundle.link")
            .complexes("entry", "Bundle.entry"),
        backbone("Bundle.link")
            .primitive("relation", DataType::String)
            .primitive("url", Uri),
        backbone("Bundle.entry")
            .complexes("link", "Bundle.link")
            .primitive("fullUrl", Uri)
            .resource("resource")
            .complex("search", "Bundle.entry.search")
            .complex("request", "Bundle.entry.request")
            .complex("response", "Bundle.entry.response"),
        backbone("Bundle.entry.search")
            .primitive("mode", Code)
            .primitive("score", Decimal),
        backbone("Bundle.entry.request")
            .primitive("method", Code)
            .primitive("url", Uri)
            .primitive("ifNoneMatch", DataType::String)
            .primitive("ifModifiedSince", Instant)
            .primitive("ifMatch", DataType::String)
            .primitive("ifNoneExist", DataType::String),
        backbone("Bundle.entry.response")
            .primitive("status", DataType::String)
            .primitive("location", Uri)
            .primitive("etag", DataType::String)
            .primitive("lastModified", Instant)
            .resource("outcome"),
        resource("Parameters").complexes("parameter", "Parameters.parameter"),
        backbone("Parameters.parameter")
            .primitive("name", DataType::String)
            .choice("value", PARAMETER_VALUE)
            .resource("resource")
            .complexes("part", "Parameters.parameter"),
        domain_resource("OperationOutcome").complexes("issue", "OperationOutcome.issue"),
        backbone("OperationOutcome.issue")
            .primitive("severity", Code)
            .primitive("code", Code)
            .complex("details", "CodeableConcept")
            .primitive("diagnostics", DataType::String)
            .primitives("location", DataType::String)
            .primitives("expression", DataType::String),
        domain_resource("Basic")
            .complexes("identifier", "Identifier")
            .complex("code", "CodeableConcept")
            .complex("subject", "Reference")
            .primitive("created", Date)
            .complex("author", "Reference"),
    ]
}

/// Build the built-in catalogue.
///
/// The result is validated: every complex reference resolves.
pub fn catalog() -> Result<SchemaCatalog> {
    let mut catalog = SchemaCatalog::new();
    for builder in datatypes()
        .into_iter()
        .chain(metadata_types())
        .chain(resources())
    {
        catalog.insert(builder.build()?)?;
    }
    catalog.validate()?;
    tracing::debug!(types = catalog.len(), "Built core schema catalogue");
    Ok(catalog)
}
