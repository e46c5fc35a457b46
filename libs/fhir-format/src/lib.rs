//! Schema-driven FHIR JSON and XML codecs.
//!
//! Resources are decoded into the dynamic record graph of `ferrum-models`
//! using the type schemas registered in a [`Registry`], and encoded back from
//! it. Both wire formats share one logical model:
//!
//! - Primitives carry an optional value plus `id`/`extension` metadata. JSON
//!   keeps the metadata under a `_field` shadow key (an aligned array for
//!   repeated fields), XML as the `id` attribute and `extension` children.
//! - Choice fields (`value[x]`) hold exactly one variant; the wire name is the
//!   field name followed by the type tag (`valueQuantity`).
//! - Resources are dispatched on their type name (`resourceType` in JSON, the
//!   element name in XML). Unknown types are an error, never a guess.
//!
//! ```
//! use ferrum_format::{JsonCodec, Registry, XmlCodec};
//!
//! let registry = Registry::core();
//! let patient = JsonCodec::new(registry)
//!     .decode_resource(r#"{"resourceType":"Patient","active":true}"#)
//!     .unwrap();
//! let xml = XmlCodec::new(registry).encode_resource(&patient).unwrap();
//! assert!(xml.contains(r#"<active value="true"/>"#));
//! ```

mod choice;
pub mod error;
mod json;
pub mod merge;
mod options;
mod path;
pub mod registry;
mod scalar;
mod xml;

pub use choice::{detect_variant, wire_name};
pub use error::{ErrorKind, FormatError, Result};
pub use json::JsonCodec;
pub use merge::{
    merge_array, merge_scalar, split_array, split_scalar, PrimitiveAccess, Shadow, ShadowRef,
    SplitArray,
};
pub use options::{CodecOptions, DEFAULT_MAX_DEPTH};
pub use registry::{RecordCodec, Registry, RegistryBuilder};
pub use xml::{XmlCodec, FHIR_NS, XHTML_NS};

use ferrum_models::ResourceEnvelope;
use serde_json::Value;

/// Decode a JSON resource document.
pub fn from_json_str(registry: &Registry, input: &str) -> Result<ResourceEnvelope> {
    JsonCodec::new(registry).decode_resource(input)
}

/// Decode an already parsed JSON resource.
pub fn from_json_value(registry: &Registry, value: &Value) -> Result<ResourceEnvelope> {
    JsonCodec::new(registry).decode_value(value)
}

/// Encode a resource as pretty-printed JSON.
pub fn to_json_string(registry: &Registry, envelope: &ResourceEnvelope) -> Result<String> {
    JsonCodec::new(registry).encode_resource(envelope)
}

/// Encode a resource as a JSON value tree.
pub fn to_json_value(registry: &Registry, envelope: &ResourceEnvelope) -> Result<Value> {
    JsonCodec::new(registry).encode_value(envelope)
}

/// Decode an XML resource document.
pub fn from_xml_str(registry: &Registry, input: &str) -> Result<ResourceEnvelope> {
    XmlCodec::new(registry).decode_resource(input)
}

/// Encode a resource as indented XML.
pub fn to_xml_string(registry: &Registry, envelope: &ResourceEnvelope) -> Result<String> {
    XmlCodec::new(registry).encode_resource(envelope)
}

/// Convert a FHIR JSON payload into its XML representation.
///
/// The conversion goes through the record model, so the payload is fully
/// validated against the registry on the way.
pub fn json_to_xml(registry: &Registry, input: &str) -> Result<String> {
    let envelope = from_json_str(registry, input)?;
    to_xml_string(registry, &envelope)
}

/// Convert a FHIR XML payload into its JSON representation.
pub fn xml_to_json(registry: &Registry, input: &str) -> Result<String> {
    let envelope = from_xml_str(registry, input)?;
    to_json_string(registry, &envelope)
}
