//! JSON decoding: wire keys → records

use crate::choice::{complex_variant, detect_variant, primitive_variant};
use crate::error::{FormatError, Result};
use crate::merge::{merge_array, merge_scalar, PrimitiveAccess, Shadow};
use crate::options::CodecOptions;
use crate::path;
use crate::registry::Registry;
use crate::scalar;
use ferrum_context::{FieldKind, FieldSchema, TypeSchema};
use ferrum_models::{
    Choice, DataType, Extension, FieldValue, Record, ResourceEnvelope, Scalar,
};
use serde_json::{Map, Value};

type Object = Map<String, Value>;

pub(crate) struct Decoder<'a> {
    registry: &'a Registry,
    options: &'a CodecOptions,
    depth: usize,
}

impl<'a> Decoder<'a> {
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

    /// Decode a resource object. An empty `path` marks the document root.
    pub(crate) fn envelope(&mut self, value: &Value, path: &str) -> Result<ResourceEnvelope> {
        let object = match value.as_object() {
            Some(object) => object,
            None if path.is_empty() => return Err(FormatError::ExpectedObject),
            None => return Err(FormatError::structure(path, "expected a resource object")),
        };

        let resource_type = match object.get("resourceType") {
            Some(Value::String(resource_type)) => resource_type.as_str(),
            Some(_) => {
                return Err(FormatError::structure(
                    path,
                    "resourceType must be a string",
                ))
            }
            None => {
                return Err(FormatError::MissingResourceType {
                    path: path.to_string(),
                })
            }
        };

        let path = if path.is_empty() { resource_type } else { path };
        let registry = self.registry;
        let codec = registry.resolve(resource_type, path)?;
        let record = self.record(codec.schema(), object, path)?;
        Ok(ResourceEnvelope::new(record))
    }

    pub(crate) fn record(
        &mut self,
        schema: &TypeSchema,
        object: &Object,
        path: &str,
    ) -> Result<Record> {
        self.nested(path, |this| this.record_fields(schema, object, path))
    }

    fn record_fields(&mut self, schema: &TypeSchema, object: &Object, path: &str) -> Result<Record> {
        let mut present = vec![false; schema.fields().len()];

        for key in object.keys() {
            if key == "resourceType" && schema.is_resource() {
                continue;
            }
            let (is_shadow, wire_name) = match key.strip_prefix('_') {
                Some(wire_name) => (true, wire_name),
                None => (false, key.as_str()),
            };

            let slot = schema.resolve(wire_name).filter(|slot| {
                !is_shadow
                    || match slot.variant {
                        Some(variant) => variant.is_primitive(),
                        None => matches!(schema.field_at(slot.field).kind, FieldKind::Primitive(_)),
                    }
            });

            match slot {
                Some(slot) => present[slot.field] = true,
                None if self.options.allow_unknown_elements => {
                    tracing::trace!(path, key = %key, "Ignoring unknown JSON property");
                }
                None => return Err(FormatError::unknown_element(path, key)),
            }
        }

        let mut record = Record::new(schema.name());
        for (field, _) in schema
            .fields()
            .iter()
            .zip(present)
            .filter(|(_, present)| *present)
        {
            if let Some(value) = self.field(field, object, path)? {
                record.set(field.name.clone(), value);
            }
        }
        Ok(record)
    }

    fn field(
        &mut self,
        field: &FieldSchema,
        object: &Object,
        record_path: &str,
    ) -> Result<Option<FieldValue>> {
        let path = path::child(record_path, &field.name);
        let value = object.get(&field.name).filter(|v| !v.is_null());
        let registry = self.registry;

        let decoded = match &field.kind {
            FieldKind::ElementId => match value {
                None => None,
                Some(Value::String(id)) => Some(FieldValue::ElementId(id.clone())),
                Some(_) => return Err(FormatError::structure(&path, "element id must be a string")),
            },

            FieldKind::Primitive(data_type) if field.repeated => {
                let values = value
                    .map(|v| primitive_values(&path, *data_type, v))
                    .transpose()?;
                let shadows = match object.get(&shadow_key(&field.name)) {
                    None | Some(Value::Null) => None,
                    Some(v) => Some(self.shadow_array(v, &path)?),
                };
                let items = merge_array(record_path, &field.name, values, shadows)?;
                (!items.is_empty()).then_some(FieldValue::Primitives(items))
            }

            FieldKind::Primitive(data_type) => {
                let mut access = JsonPrimitive {
                    decoder: &mut *self,
                    data_type: *data_type,
                    value,
                    shadow: object.get(&shadow_key(&field.name)),
                    path: &path,
                };
                merge_scalar(&mut access)?.map(FieldValue::Primitive)
            }

            FieldKind::Complex(type_name) => {
                let schema = registry.type_schema(type_name)?;
                match value {
                    None => None,
                    Some(value) if field.repeated => {
                        let mut records = Vec::new();
                        for (i, item) in expect_array(value, &path)?.iter().enumerate() {
                            let item_path = path::index(&path, i);
                            records.push(self.record(schema, expect_object(item, &item_path)?, &item_path)?);
                        }
                        (!records.is_empty()).then_some(FieldValue::Complexes(records))
                    }
                    Some(value) => Some(FieldValue::Complex(self.record(
                        schema,
                        expect_object(value, &path)?,
                        &path,
                    )?)),
                }
            }

            FieldKind::Choice(variants) => self
                .choice(record_path, &field.name, variants, object)?
                .map(FieldValue::Choice),

            FieldKind::Extension => match value {
                None => None,
                Some(value) => {
                    let extensions = self.extensions(value, &path)?;
                    (!extensions.is_empty()).then_some(FieldValue::Extensions(extensions))
                }
            },

            FieldKind::Resource => match value {
                None => None,
                Some(value) if field.repeated => {
                    let mut resources = Vec::new();
                    for (i, item) in expect_array(value, &path)?.iter().enumerate() {
                        resources.push(self.envelope(item, &path::index(&path, i))?);
                    }
                    (!resources.is_empty()).then_some(FieldValue::Resources(resources))
                }
                Some(value) => Some(FieldValue::Resource(self.envelope(value, &path)?)),
            },

            FieldKind::Xhtml => match value {
                None => None,
                Some(Value::String(div)) => Some(FieldValue::Xhtml(div.clone())),
                Some(_) => return Err(FormatError::structure(&path, "narrative must be a string")),
            },
        };

        Ok(decoded)
    }

    /// Decode the single present variant of choice field `field`, if any.
    fn choice(
        &mut self,
        record_path: &str,
        field: &str,
        allowed: &[DataType],
        object: &Object,
    ) -> Result<Option<Choice>> {
        let present = |key: &str| object.get(key).is_some_and(|v| !v.is_null());
        let variant = detect_variant(record_path, field, allowed, |variant| {
            let key = variant.choice_key(field);
            present(key.as_str()) || (variant.is_primitive() && present(shadow_key(&key).as_str()))
        })?;
        let Some(data_type) = variant else {
            return Ok(None);
        };

        let key = data_type.choice_key(field);
        let path = path::child(record_path, &key);
        let value = object.get(&key).filter(|v| !v.is_null());

        if data_type.is_primitive() {
            let mut access = JsonPrimitive {
                decoder: &mut *self,
                data_type,
                value,
                shadow: object.get(&shadow_key(&key)),
                path: &path,
            };
            return match merge_scalar(&mut access)? {
                Some(primitive) => Ok(Some(primitive_variant(&path, data_type, primitive)?)),
                None => Ok(None),
            };
        }

        let Some(value) = value else {
            return Ok(None);
        };
        let registry = self.registry;
        let schema = registry.variant_schema(data_type, &path)?;
        let record = self.record(schema, expect_object(value, &path)?, &path)?;
        Ok(Some(complex_variant(&path, record)?))
    }

    fn extensions(&mut self, value: &Value, path: &str) -> Result<Vec<Extension>> {
        let mut extensions = Vec::new();
        for (i, item) in expect_array(value, path)?.iter().enumerate() {
            extensions.push(self.extension(item, &path::index(path, i))?);
        }
        Ok(extensions)
    }

    fn extension(&mut self, value: &Value, path: &str) -> Result<Extension> {
        let object = expect_object(value, path)?;
        self.nested(path, |this| {
            let mut url = None;
            let mut id = None;
            let mut extension = Vec::new();

            for (key, value) in object {
                match key.as_str() {
                    "url" => url = Some(expect_string(value, path, "extension url")?),
                    "id" => id = Some(expect_string(value, path, "extension id")?),
                    "extension" => {
                        extension = this.extensions(value, &path::child(path, "extension"))?
                    }
                    key if is_extension_value_key(key) => {}
                    key if this.options.allow_unknown_elements => {
                        tracing::trace!(path, key, "Ignoring unknown extension property");
                    }
                    key => return Err(FormatError::unknown_element(path, key)),
                }
            }

            let url = url.ok_or_else(|| FormatError::structure(path, "extension without url"))?;
            let value = this.choice(path, "value", DataType::OPEN_TYPES, object)?;
            Ok(Extension {
                id,
                url,
                value,
                extension,
            })
        })
    }

    /// Read a `_name` shadow object.
    fn shadow(&mut self, value: &Value, path: &str) -> Result<Shadow> {
        let object = value
            .as_object()
            .ok_or_else(|| FormatError::structure(path, "primitive metadata must be an object"))?;

        let mut shadow = Shadow::default();
        for (key, value) in object {
            match key.as_str() {
                "id" => shadow.id = Some(expect_string(value, path, "element id")?),
                "extension" => {
                    shadow.extension = self.extensions(value, &path::child(path, "extension"))?
                }
                key => {
                    return Err(FormatError::structure(
                        path,
                        format!("unexpected property '{}' in primitive metadata", key),
                    ))
                }
            }
        }
        Ok(shadow)
    }

    fn shadow_array(&mut self, value: &Value, path: &str) -> Result<Vec<Option<Shadow>>> {
        expect_array(value, path)?
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Null => Ok(None),
                item => self.shadow(item, &path::index(path, i)).map(Some),
            })
            .collect()
    }
}

/// One JSON primitive: the value under `name`, the metadata under `_name`.
struct JsonPrimitive<'d, 'a, 'v> {
    decoder: &'d mut Decoder<'a>,
    data_type: DataType,
    value: Option<&'v Value>,
    shadow: Option<&'v Value>,
    path: &'v str,
}

impl PrimitiveAccess<Scalar> for JsonPrimitive<'_, '_, '_> {
    fn value(&mut self) -> Result<Option<Scalar>> {
        match self.value {
            Some(value) => scalar::from_json(self.path, self.data_type, value),
            None => Ok(None),
        }
    }

    fn shadow(&mut self) -> Result<Option<Shadow>> {
        match self.shadow {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.decoder.shadow(value, self.path).map(Some),
        }
    }
}

fn primitive_values(path: &str, data_type: DataType, value: &Value) -> Result<Vec<Option<Scalar>>> {
    expect_array(value, path)?
        .iter()
        .enumerate()
        .map(|(i, item)| scalar::from_json(&path::index(path, i), data_type, item))
        .collect()
}

fn shadow_key(name: &str) -> String {
    format!("_{}", name)
}

fn is_extension_value_key(key: &str) -> bool {
    let (is_shadow, wire_name) = match key.strip_prefix('_') {
        Some(wire_name) => (true, wire_name),
        None => (false, key),
    };
    wire_name
        .strip_prefix("value")
        .and_then(DataType::from_tag)
        .is_some_and(|data_type| !is_shadow || data_type.is_primitive())
}

fn expect_array<'v>(value: &'v Value, path: &str) -> Result<&'v Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| FormatError::structure(path, "expected an array"))
}

fn expect_object<'v>(value: &'v Value, path: &str) -> Result<&'v Object> {
    value
        .as_object()
        .ok_or_else(|| FormatError::structure(path, "expected an object"))
}

fn expect_string(value: &Value, path: &str, what: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| FormatError::structure(path, format!("{} must be a string", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn decode(value: Value) -> Result<ResourceEnvelope> {
        let options = CodecOptions::default();
        Decoder::new(Registry::core(), &options).envelope(&value, "")
    }

    #[test]
    fn test_metadata_only_primitive() {
        let envelope = decode(json!({
            "resourceType": "Patient",
            "birthDate": null,
            "_birthDate": { "id": "x" }
        }))
        .unwrap();

        let birth_date = envelope.record().primitive("birthDate").unwrap();
        assert_eq!(birth_date.value, None);
        assert_eq!(birth_date.id.as_deref(), Some("x"));
    }

    #[test]
    fn test_null_without_metadata_is_absent() {
        let envelope = decode(json!({ "resourceType": "Patient", "active": null })).unwrap();
        assert!(!envelope.record().contains("active"));
    }

    #[test]
    fn test_shadow_rejects_other_properties() {
        let err = decode(json!({
            "resourceType": "Patient",
            "_active": { "id": "a", "value": true }
        }))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(err.path(), Some("Patient.active"));
    }

    #[test]
    fn test_shadow_rejects_other_properties_when_lenient() {
        let options = CodecOptions::default().lenient();
        let err = Decoder::new(Registry::core(), &options)
            .envelope(
                &json!({
                    "resourceType": "Patient",
                    "active": true,
                    "_active": { "id": "a", "bogus": 1 }
                }),
                "",
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(err.path(), Some("Patient.active"));
    }

    #[test]
    fn test_null_choice_variant_is_absent() {
        let envelope = decode(json!({
            "resourceType": "Observation",
            "status": "final",
            "valueString": null,
            "valueBoolean": true
        }))
        .unwrap();
        let value = envelope.record().choice("value").unwrap();
        assert_eq!(value.data_type(), DataType::Boolean);

        let envelope = decode(json!({
            "resourceType": "Observation",
            "status": "final",
            "valueQuantity": null,
            "_valueString": null
        }))
        .unwrap();
        assert!(envelope.record().choice("value").is_none());
    }

    #[test]
    fn test_shadow_key_for_complex_field_rejected() {
        let err = decode(json!({ "resourceType": "Patient", "_maritalStatus": { "id": "a" } }))
            .unwrap_err();
        assert!(matches!(err, FormatError::UnknownElement { .. }));
    }

    #[test]
    fn test_unknown_property() {
        let err = decode(json!({ "resourceType": "Patient", "colour": "blue" })).unwrap_err();
        match err {
            FormatError::UnknownElement { path, name } => {
                assert_eq!(path, "Patient");
                assert_eq!(name, "colour");
            }
            other => panic!("unexpected error {:?}", other),
        }

        let options = CodecOptions::default().lenient();
        let envelope = Decoder::new(Registry::core(), &options)
            .envelope(&json!({ "resourceType": "Patient", "colour": "blue" }), "")
            .unwrap();
        assert!(envelope.record().is_empty());
    }

    #[test]
    fn test_extension_value_and_nesting() {
        let envelope = decode(json!({
            "resourceType": "Patient",
            "extension": [{
                "url": "http://example.org/outer",
                "extension": [{ "url": "inner", "valueCode": "a" }],
                "_valueBoolean": { "id": "v" },
                "valueBoolean": true
            }]
        }))
        .unwrap();

        let extension = &envelope.record().extensions("extension").unwrap()[0];
        assert_eq!(extension.url, "http://example.org/outer");
        assert_eq!(extension.extension[0].url, "inner");
        let value = extension.value.as_ref().unwrap();
        assert_eq!(value.data_type(), DataType::Boolean);
        assert_eq!(value.as_primitive().unwrap().id.as_deref(), Some("v"));
    }

    #[test]
    fn test_extension_requires_url() {
        let err = decode(json!({
            "resourceType": "Patient",
            "extension": [{ "valueString": "x" }]
        }))
        .unwrap_err();
        assert_eq!(err.path(), Some("Patient.extension[0]"));
    }

    #[test]
    fn test_missing_and_invalid_resource_type() {
        assert!(matches!(
            decode(json!({ "id": "x" })),
            Err(FormatError::MissingResourceType { .. })
        ));
        assert!(matches!(decode(json!([])), Err(FormatError::ExpectedObject)));
        assert!(matches!(
            decode(json!({ "resourceType": 5 })),
            Err(FormatError::Structure { .. })
        ));
    }

    #[test]
    fn test_repeated_field_requires_array() {
        let err = decode(json!({
            "resourceType": "Patient",
            "name": { "family": "Chalmers" }
        }))
        .unwrap_err();
        assert_eq!(err.path(), Some("Patient.name"));
    }

    #[test]
    fn test_depth_limit() {
        let mut section = json!({ "title": "leaf" });
        for _ in 0..20 {
            section = json!({ "title": "level", "section": [section] });
        }
        let document = json!({ "resourceType": "Composition", "section": [section] });

        let options = CodecOptions::default().with_max_depth(10);
        let err = Decoder::new(Registry::core(), &options)
            .envelope(&document, "")
            .unwrap_err();
        assert!(matches!(err, FormatError::DepthLimit { limit: 10, .. }));

        assert!(decode(document).is_ok());
    }
}
