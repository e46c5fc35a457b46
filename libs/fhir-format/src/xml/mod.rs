//! XML adapter
//!
//! Every element lives in the FHIR namespace except narrative `div`s, which
//! are XHTML and pass through verbatim. Primitives carry their value in a
//! `value` attribute, element ids are `id` attributes and contained resources
//! sit inside a wrapper element named after the field.

mod de;
mod ser;

use crate::error::{FormatError, Result};
use crate::options::CodecOptions;
use crate::registry::Registry;
use de::Decoder;
use ferrum_models::{Record, ResourceEnvelope};
use roxmltree::Document;
use ser::Encoder;

pub const FHIR_NS: &str = "http://hl7.org/fhir";
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Schema-driven XML codec over a [`Registry`].
#[derive(Debug, Clone)]
pub struct XmlCodec<'a> {
    registry: &'a Registry,
    options: CodecOptions,
}

impl<'a> XmlCodec<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self::with_options(registry, CodecOptions::default())
    }

    pub fn with_options(registry: &'a Registry, options: CodecOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Parse and decode a resource document.
    pub fn decode_resource(&self, input: &str) -> Result<ResourceEnvelope> {
        let document = Document::parse(input)?;
        let result =
            Decoder::new(self.registry, &self.options, input).envelope(document.root_element(), "");
        match &result {
            Ok(envelope) => {
                tracing::debug!(resource_type = envelope.resource_type(), "Decoded XML resource")
            }
            Err(error) => tracing::debug!(%error, "XML decoding failed"),
        }
        result
    }

    pub fn encode_resource(&self, envelope: &ResourceEnvelope) -> Result<String> {
        let mut encoder = Encoder::new(self.registry, &self.options);
        let result = encoder.envelope(envelope, "").and_then(|_| encoder.finish());
        if let Err(error) = &result {
            tracing::debug!(
                resource_type = envelope.resource_type(),
                %error,
                "XML encoding failed"
            );
        }
        result
    }

    /// Decode a standalone data type or backbone element whose root element
    /// is named `type_name`.
    pub fn decode_record(&self, type_name: &str, input: &str) -> Result<Record> {
        let schema = self.registry.type_schema(type_name)?;
        let document = Document::parse(input)?;
        let root = document.root_element();
        if root.tag_name().name() != type_name {
            return Err(FormatError::structure(
                type_name,
                format!("expected root element '{}'", type_name),
            ));
        }
        if root.tag_name().namespace() != Some(FHIR_NS) {
            return Err(FormatError::Namespace {
                path: type_name.to_string(),
                namespace: root.tag_name().namespace().map(str::to_string),
            });
        }
        Decoder::new(self.registry, &self.options, input).record(schema, root, type_name)
    }

    pub fn encode_record(&self, record: &Record) -> Result<String> {
        let schema = self.registry.type_schema(record.type_name())?;
        let mut encoder = Encoder::new(self.registry, &self.options);
        encoder.root_record(schema, record)?;
        encoder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrum_models::Primitive;

    #[test]
    fn test_standalone_record() {
        let codec = XmlCodec::with_options(Registry::core(), CodecOptions::default().compact());
        let period = codec
            .decode_record(
                "Period",
                r#"<Period xmlns="http://hl7.org/fhir"><start value="2024-01-01"/><end id="e"/></Period>"#,
            )
            .unwrap();
        assert_eq!(
            period.primitive("start"),
            Some(&Primitive::from("2024-01-01"))
        );
        assert_eq!(
            period.primitive("end"),
            Some(&Primitive::metadata_only(Some("e".to_string()), Vec::new()))
        );

        let xml = codec.encode_record(&period).unwrap();
        assert_eq!(
            xml,
            r#"<Period xmlns="http://hl7.org/fhir"><start value="2024-01-01"/><end id="e"/></Period>"#
        );
    }

    #[test]
    fn test_root_name_must_match() {
        let codec = XmlCodec::new(Registry::core());
        let err = codec
            .decode_record("Period", r#"<Range xmlns="http://hl7.org/fhir"/>"#)
            .unwrap_err();
        assert!(matches!(err, FormatError::Structure { .. }));
    }

    #[test]
    fn test_pretty_output_is_indented() {
        let codec = XmlCodec::new(Registry::core());
        let envelope = ResourceEnvelope::new(Record::new("Patient").with("active", Primitive::from(true)));
        let xml = codec.encode_resource(&envelope).unwrap();
        assert_eq!(
            xml,
            "<Patient xmlns=\"http://hl7.org/fhir\">\n  <active value=\"true\"/>\n</Patient>"
        );
    }
}
