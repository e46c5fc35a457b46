//! JSON encoding: records → wire keys in schema order

use crate::choice::wire_name;
use crate::error::{FormatError, Result};
use crate::merge::{split_array, split_scalar, ShadowRef};
use crate::options::CodecOptions;
use crate::path;
use crate::registry::{check_record, Registry};
use crate::scalar;
use ferrum_context::{FieldKind, FieldSchema, TypeSchema};
use ferrum_models::{
    Choice, ChoiceValue, DataType, Extension, FieldValue, Primitive, Record, ResourceEnvelope,
};
use serde_json::{Map, Value};

type Object = Map<String, Value>;

pub(crate) struct Encoder<'a> {
    registry: &'a Registry,
    options: &'a CodecOptions,
    depth: usize,
}

impl<'a> Encoder<'a> {
    pub(crate) fn new(registry: &'a Registry, options: &'a CodecOptions) -> Self {
        Self {
            registry,
            options,
            depth: 0,
        }
    }

    fn nested<T>(&mut self, path: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= self.options.max_depth {
            return Err(FormatError::DepthLimit {
                path: path.to_string(),
                limit: self.options.max_depth,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Encode a resource; `resourceType` is always the first key.
    pub(crate) fn envelope(&mut self, envelope: &ResourceEnvelope, path: &str) -> Result<Value> {
        let resource_type = envelope.resource_type();
        let path = if path.is_empty() { resource_type } else { path };
        let registry = self.registry;
        let codec = registry.resolve(resource_type, path)?;

        let mut object = Object::new();
        object.insert(
            "resourceType".to_string(),
            Value::String(resource_type.to_string()),
        );
        self.nested(path, |this| {
            this.record_into(codec.schema(), envelope.record(), path, &mut object)
        })?;
        Ok(Value::Object(object))
    }

    pub(crate) fn record(&mut self, schema: &TypeSchema, record: &Record, path: &str) -> Result<Value> {
        let mut object = Object::new();
        self.nested(path, |this| this.record_into(schema, record, path, &mut object))?;
        Ok(Value::Object(object))
    }

    fn record_into(
        &mut self,
        schema: &TypeSchema,
        record: &Record,
        path: &str,
        object: &mut Object,
    ) -> Result<()> {
        check_record(schema, record, path)?;
        for field in schema.fields() {
            if let Some(value) = record.get(&field.name) {
                self.field(field, value, path, object)?;
            }
        }
        Ok(())
    }

    fn field(
        &mut self,
        field: &FieldSchema,
        value: &FieldValue,
        record_path: &str,
        object: &mut Object,
    ) -> Result<()> {
        let path = path::child(record_path, &field.name);
        let registry = self.registry;
        let name = field.name.clone();

        match (&field.kind, field.repeated, value) {
            (FieldKind::ElementId, _, FieldValue::ElementId(id)) => {
                object.insert(name, Value::String(id.clone()));
            }
            (FieldKind::Primitive(data_type), false, FieldValue::Primitive(primitive)) => {
                primitive_into(&field.name, *data_type, primitive, &path, object, self)?;
            }
            (FieldKind::Primitive(data_type), true, FieldValue::Primitives(items)) => {
                for (i, item) in items.iter().enumerate() {
                    scalar::check_primitive(&path::index(&path, i), *data_type, item)?;
                }
                let split = split_array(items);
                if split.is_empty() {
                    return Ok(());
                }
                let values = split
                    .values
                    .iter()
                    .map(|value| value.map_or(Ok(Value::Null), scalar::to_json))
                    .collect::<Result<Vec<_>>>()?;
                object.insert(name.clone(), Value::Array(values));
                if let Some(shadows) = split.shadows {
                    let shadows = shadows
                        .into_iter()
                        .enumerate()
                        .map(|(i, shadow)| match shadow {
                            Some(shadow) => self.shadow(shadow, &path::index(&path, i)),
                            None => Ok(Value::Null),
                        })
                        .collect::<Result<Vec<_>>>()?;
                    object.insert(format!("_{}", name), Value::Array(shadows));
                }
            }
            (FieldKind::Complex(type_name), false, FieldValue::Complex(record)) => {
                let schema = registry.type_schema(type_name)?;
                let value = self.record(schema, record, &path)?;
                object.insert(name, value);
            }
            (FieldKind::Complex(type_name), true, FieldValue::Complexes(records)) => {
                let schema = registry.type_schema(type_name)?;
                if records.is_empty() {
                    return Ok(());
                }
                let mut values = Vec::with_capacity(records.len());
                for (i, record) in records.iter().enumerate() {
                    values.push(self.record(schema, record, &path::index(&path, i))?);
                }
                object.insert(name, Value::Array(values));
            }
            (FieldKind::Choice(allowed), false, FieldValue::Choice(choice)) => {
                self.choice_into(record_path, &field.name, allowed, choice, object)?;
            }
            (FieldKind::Extension, true, FieldValue::Extensions(extensions)) => {
                if !extensions.is_empty() {
                    let value = self.extensions(extensions, &path)?;
                    object.insert(name, value);
                }
            }
            (FieldKind::Resource, false, FieldValue::Resource(envelope)) => {
                let value = self.envelope(envelope, &path)?;
                object.insert(name, value);
            }
            (FieldKind::Resource, true, FieldValue::Resources(envelopes)) => {
                if envelopes.is_empty() {
                    return Ok(());
                }
                let mut values = Vec::with_capacity(envelopes.len());
                for (i, envelope) in envelopes.iter().enumerate() {
                    values.push(self.envelope(envelope, &path::index(&path, i))?);
                }
                object.insert(name, Value::Array(values));
            }
            (FieldKind::Xhtml, false, FieldValue::Xhtml(div)) => {
                object.insert(name, Value::String(div.clone()));
            }
            (_, _, other) => {
                return Err(FormatError::mismatch(
                    &path,
                    format!("field '{}' cannot hold a {}", field.name, other.kind_name()),
                ))
            }
        }
        Ok(())
    }

    fn choice_into(
        &mut self,
        record_path: &str,
        field: &str,
        allowed: &[DataType],
        choice: &Choice,
        object: &mut Object,
    ) -> Result<()> {
        let key = wire_name(record_path, field, allowed, choice)?;
        let path = path::child(record_path, &key);
        match choice.value() {
            ChoiceValue::Primitive(primitive) => {
                primitive_into(&key, choice.data_type(), primitive, &path, object, self)
            }
            ChoiceValue::Complex(record) => {
                let registry = self.registry;
                let schema = registry.type_schema(choice.data_type().name())?;
                let value = self.record(schema, record, &path)?;
                object.insert(key, value);
                Ok(())
            }
        }
    }

    fn extensions(&mut self, extensions: &[Extension], path: &str) -> Result<Value> {
        let mut values = Vec::with_capacity(extensions.len());
        for (i, extension) in extensions.iter().enumerate() {
            values.push(self.extension(extension, &path::index(path, i))?);
        }
        Ok(Value::Array(values))
    }

    fn extension(&mut self, extension: &Extension, path: &str) -> Result<Value> {
        self.nested(path, |this| {
            let mut object = Object::new();
            if let Some(id) = &extension.id {
                object.insert("id".to_string(), Value::String(id.clone()));
            }
            if !extension.extension.is_empty() {
                let nested = this.extensions(&extension.extension, &path::child(path, "extension"))?;
                object.insert("extension".to_string(), nested);
            }
            object.insert("url".to_string(), Value::String(extension.url.clone()));
            if let Some(value) = &extension.value {
                this.choice_into(path, "value", DataType::OPEN_TYPES, value, &mut object)?;
            }
            Ok(Value::Object(object))
        })
    }

    fn shadow(&mut self, shadow: ShadowRef<'_>, path: &str) -> Result<Value> {
        let mut object = Object::new();
        if let Some(id) = shadow.id {
            object.insert("id".to_string(), Value::String(id.to_string()));
        }
        if !shadow.extension.is_empty() {
            let extensions = self.extensions(shadow.extension, &path::child(path, "extension"))?;
            object.insert("extension".to_string(), extensions);
        }
        Ok(Value::Object(object))
    }
}

/// Emit `key` and, when the primitive carries metadata, `_key`.
///
/// A metadata-only primitive writes an explicit `null` under `key`.
fn primitive_into(
    key: &str,
    data_type: DataType,
    primitive: &Primitive,
    path: &str,
    object: &mut Object,
    encoder: &mut Encoder<'_>,
) -> Result<()> {
    scalar::check_primitive(path, data_type, primitive)?;
    let (value, shadow) = split_scalar(primitive);
    if value.is_none() && shadow.is_none() {
        return Ok(());
    }

    let value = value.map_or(Ok(Value::Null), scalar::to_json)?;
    object.insert(key.to_string(), value);
    if let Some(shadow) = shadow {
        let shadow = encoder.shadow(shadow, path)?;
        object.insert(format!("_{}", key), shadow);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use ferrum_models::{Choice, Primitive};
    use serde_json::json;

    fn encode(envelope: &ResourceEnvelope) -> Result<Value> {
        let options = CodecOptions::default();
        Encoder::new(Registry::core(), &options).envelope(envelope, "")
    }

    #[test]
    fn test_resource_type_first_and_schema_order() {
        let patient = Record::new("Patient")
            .with("gender", Primitive::from("female"))
            .with("active", Primitive::from(true))
            .with("id", Primitive::from("p1"));
        let value = encode(&ResourceEnvelope::new(patient)).unwrap();

        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["resourceType", "id", "active", "gender"]);
    }

    #[test]
    fn test_metadata_only_primitive_emits_null() {
        let patient = Record::new("Patient").with(
            "birthDate",
            Primitive::metadata_only(Some("x".to_string()), Vec::new()),
        );
        let value = encode(&ResourceEnvelope::new(patient)).unwrap();
        assert_eq!(
            value,
            json!({ "resourceType": "Patient", "birthDate": null, "_birthDate": { "id": "x" } })
        );
    }

    #[test]
    fn test_empty_primitive_omitted() {
        let patient = Record::new("Patient").with("active", Primitive::default());
        let value = encode(&ResourceEnvelope::new(patient)).unwrap();
        assert_eq!(value, json!({ "resourceType": "Patient" }));
    }

    #[test]
    fn test_array_shadow_alignment() {
        let name = Record::new("HumanName").with(
            "given",
            vec![
                Primitive::from("A"),
                Primitive::from("B").with_id("m"),
                Primitive::from("C"),
            ],
        );
        let patient = Record::new("Patient").with("name", vec![name]);
        let value = encode(&ResourceEnvelope::new(patient)).unwrap();
        assert_eq!(value["name"][0]["given"], json!(["A", "B", "C"]));
        assert_eq!(value["name"][0]["_given"], json!([null, { "id": "m" }, null]));
    }

    #[test]
    fn test_disallowed_choice_variant() {
        let observation = Record::new("Observation").with(
            "effective",
            Choice::primitive(DataType::Boolean, Primitive::from(true)).unwrap(),
        );
        let err = encode(&ResourceEnvelope::new(observation)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
        assert!(matches!(err, FormatError::InvalidChoiceVariant { .. }));
    }

    #[test]
    fn test_schema_mismatches() {
        let wrong_kind = Record::new("Patient").with("active", Primitive::from("yes"));
        assert!(matches!(
            encode(&ResourceEnvelope::new(wrong_kind)),
            Err(FormatError::SchemaMismatch { .. })
        ));

        let undeclared = Record::new("Patient").with("colour", Primitive::from("blue"));
        assert!(matches!(
            encode(&ResourceEnvelope::new(undeclared)),
            Err(FormatError::SchemaMismatch { .. })
        ));

        let wrong_shape = Record::new("Patient").with("name", Record::new("HumanName"));
        assert!(matches!(
            encode(&ResourceEnvelope::new(wrong_shape)),
            Err(FormatError::SchemaMismatch { .. })
        ));

        let wrong_type =
            Record::new("Patient").with("maritalStatus", Record::new("Coding"));
        assert!(matches!(
            encode(&ResourceEnvelope::new(wrong_type)),
            Err(FormatError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_resource_type() {
        let err = encode(&ResourceEnvelope::new(Record::new("Spaceship"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownDiscriminator);
    }
}
