//! JSON adapter
//!
//! Field wire names are object keys, repeated fields are arrays, primitive
//! metadata lives under `_name` shadow keys and resources open with their
//! `resourceType` discriminator.

mod de;
mod ser;

use crate::error::{FormatError, Result};
use crate::options::CodecOptions;
use crate::registry::Registry;
use de::Decoder;
use ferrum_models::{Record, ResourceEnvelope};
use ser::Encoder;
use serde_json::Value;

/// Schema-driven JSON codec over a [`Registry`].
#[derive(Debug, Clone)]
pub struct JsonCodec<'a> {
    registry: &'a Registry,
    options: CodecOptions,
}

impl<'a> JsonCodec<'a> {
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
        let value: Value = serde_json::from_str(input)?;
        self.decode_value(&value)
    }

    pub fn decode_value(&self, value: &Value) -> Result<ResourceEnvelope> {
        let result = Decoder::new(self.registry, &self.options).envelope(value, "");
        match &result {
            Ok(envelope) => {
                tracing::debug!(resource_type = envelope.resource_type(), "Decoded JSON resource")
            }
            Err(error) => tracing::debug!(%error, "JSON decoding failed"),
        }
        result
    }

    pub fn encode_resource(&self, envelope: &ResourceEnvelope) -> Result<String> {
        let value = self.encode_value(envelope)?;
        let output = if self.options.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(output)
    }

    pub fn encode_value(&self, envelope: &ResourceEnvelope) -> Result<Value> {
        let result = Encoder::new(self.registry, &self.options).envelope(envelope, "");
        if let Err(error) = &result {
            tracing::debug!(
                resource_type = envelope.resource_type(),
                %error,
                "JSON encoding failed"
            );
        }
        result
    }

    /// Decode a standalone data type or backbone element of `type_name`.
    pub fn decode_record(&self, type_name: &str, input: &str) -> Result<Record> {
        let value: Value = serde_json::from_str(input)?;
        let schema = self.registry.type_schema(type_name)?;
        let object = value.as_object().ok_or(FormatError::ExpectedObject)?;
        Decoder::new(self.registry, &self.options).record(schema, object, type_name)
    }

    /// Encode a standalone record using the schema named by its type.
    pub fn encode_record(&self, record: &Record) -> Result<String> {
        let schema = self.registry.type_schema(record.type_name())?;
        let value =
            Encoder::new(self.registry, &self.options).record(schema, record, record.type_name())?;
        let output = if self.options.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(output)
    }
}
