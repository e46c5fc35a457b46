//! XML encoding: records → elements in schema order

use super::FHIR_NS;
use crate::choice::wire_name;
use crate::error::{FormatError, Result};
use crate::options::CodecOptions;
use crate::path;
use crate::registry::{check_record, Registry};
use crate::scalar;
use ferrum_context::{FieldKind, FieldSchema, TypeSchema};
use ferrum_models::{
    Choice, ChoiceValue, DataType, Extension, FieldValue, Primitive, Record, ResourceEnvelope,
};
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::Cursor;

pub(crate) struct Encoder<'a> {
    registry: &'a Registry,
    options: &'a CodecOptions,
    writer: Writer<Cursor<Vec<u8>>>,
    depth: usize,
}

impl<'a> Encoder<'a> {
    pub(crate) fn new(registry: &'a Registry, options: &'a CodecOptions) -> Self {
        let writer = if options.pretty {
            Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
        } else {
            Writer::new(Cursor::new(Vec::new()))
        };
        Self {
            registry,
            options,
            writer,
            depth: 0,
        }
    }

    pub(crate) fn finish(self) -> Result<String> {
        let bytes = self.writer.into_inner().into_inner();
        Ok(String::from_utf8(bytes)?)
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

    /// Write a resource element. Only the document root (empty `path`)
    /// declares the FHIR namespace; contained resources inherit it.
    pub(crate) fn envelope(&mut self, envelope: &ResourceEnvelope, path: &str) -> Result<()> {
        let resource_type = envelope.resource_type();
        let root = path.is_empty();
        let path = if root { resource_type } else { path };
        let registry = self.registry;
        let codec = registry.resolve(resource_type, path)?;

        let mut start = BytesStart::new(resource_type);
        if root {
            start.push_attribute(("xmlns", FHIR_NS));
        }
        self.record_element(start, codec.schema(), envelope.record(), path)
    }

    /// Write a standalone record as the document root.
    pub(crate) fn root_record(&mut self, schema: &TypeSchema, record: &Record) -> Result<()> {
        let mut start = BytesStart::new(schema.name());
        start.push_attribute(("xmlns", FHIR_NS));
        self.record_element(start, schema, record, schema.name())
    }

    fn record_element(
        &mut self,
        mut start: BytesStart<'_>,
        schema: &TypeSchema,
        record: &Record,
        path: &str,
    ) -> Result<()> {
        self.nested(path, |this| {
            check_record(schema, record, path)?;

            let mut has_children = false;
            for field in schema.fields() {
                match (&field.kind, record.get(&field.name)) {
                    (FieldKind::ElementId, Some(FieldValue::ElementId(id))) => {
                        start.push_attribute(attribute("id", id));
                    }
                    (FieldKind::ElementId, Some(other)) => {
                        return Err(FormatError::mismatch(
                            &path::child(path, &field.name),
                            format!("field '{}' cannot hold a {}", field.name, other.kind_name()),
                        ))
                    }
                    (_, Some(value)) => has_children |= !is_empty_value(value),
                    (_, None) => {}
                }
            }

            if !has_children {
                this.writer.write_event(Event::Empty(start))?;
                return Ok(());
            }

            let end = start.to_end().into_owned();
            this.writer.write_event(Event::Start(start))?;
            for field in schema.fields() {
                if let Some(value) = record.get(&field.name) {
                    this.field(field, value, path)?;
                }
            }
            this.writer.write_event(Event::End(end))?;
            Ok(())
        })
    }

    fn field(&mut self, field: &FieldSchema, value: &FieldValue, record_path: &str) -> Result<()> {
        let path = path::child(record_path, &field.name);
        let registry = self.registry;
        let name = field.name.as_str();

        match (&field.kind, field.repeated, value) {
            // written as an attribute by the enclosing element
            (FieldKind::ElementId, _, FieldValue::ElementId(_)) => {}
            (FieldKind::Primitive(data_type), false, FieldValue::Primitive(primitive)) => {
                self.primitive_element(name, *data_type, primitive, &path)?;
            }
            (FieldKind::Primitive(data_type), true, FieldValue::Primitives(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.primitive_element(name, *data_type, item, &path::index(&path, i))?;
                }
            }
            (FieldKind::Complex(type_name), false, FieldValue::Complex(record)) => {
                let schema = registry.type_schema(type_name)?;
                self.record_element(BytesStart::new(name), schema, record, &path)?;
            }
            (FieldKind::Complex(type_name), true, FieldValue::Complexes(records)) => {
                let schema = registry.type_schema(type_name)?;
                for (i, record) in records.iter().enumerate() {
                    self.record_element(BytesStart::new(name), schema, record, &path::index(&path, i))?;
                }
            }
            (FieldKind::Choice(allowed), false, FieldValue::Choice(choice)) => {
                self.choice_element(record_path, name, allowed, choice)?;
            }
            (FieldKind::Extension, true, FieldValue::Extensions(extensions)) => {
                self.extensions(extensions, &path)?;
            }
            (FieldKind::Resource, false, FieldValue::Resource(envelope)) => {
                self.wrapped_resource(name, envelope, &path)?;
            }
            (FieldKind::Resource, true, FieldValue::Resources(envelopes)) => {
                for (i, envelope) in envelopes.iter().enumerate() {
                    self.wrapped_resource(name, envelope, &path::index(&path, i))?;
                }
            }
            (FieldKind::Xhtml, false, FieldValue::Xhtml(div)) => {
                self.writer
                    .write_event(Event::Text(BytesText::from_escaped(div.as_str())))?;
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

    fn choice_element(
        &mut self,
        record_path: &str,
        field: &str,
        allowed: &[DataType],
        choice: &Choice,
    ) -> Result<()> {
        let key = wire_name(record_path, field, allowed, choice)?;
        let path = path::child(record_path, &key);
        match choice.value() {
            ChoiceValue::Primitive(primitive) => {
                self.primitive_element(&key, choice.data_type(), primitive, &path)
            }
            ChoiceValue::Complex(record) => {
                let registry = self.registry;
                let schema = registry.type_schema(choice.data_type().name())?;
                self.record_element(BytesStart::new(key.as_str()), schema, record, &path)
            }
        }
    }

    /// `<name value=".." id="..">` with metadata extensions as children.
    fn primitive_element(
        &mut self,
        name: &str,
        data_type: DataType,
        primitive: &Primitive,
        path: &str,
    ) -> Result<()> {
        scalar::check_primitive(path, data_type, primitive)?;
        if primitive.is_empty() {
            return Ok(());
        }

        let mut start = BytesStart::new(name);
        if let Some(value) = &primitive.value {
            start.push_attribute(attribute("value", &value.to_string()));
        }
        if let Some(id) = &primitive.id {
            start.push_attribute(attribute("id", id));
        }

        if primitive.extension.is_empty() {
            self.writer.write_event(Event::Empty(start))?;
        } else {
            self.writer.write_event(Event::Start(start.clone()))?;
            self.extensions(&primitive.extension, &path::child(path, "extension"))?;
            self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        Ok(())
    }

    fn extensions(&mut self, extensions: &[Extension], path: &str) -> Result<()> {
        for (i, extension) in extensions.iter().enumerate() {
            self.extension(extension, &path::index(path, i))?;
        }
        Ok(())
    }

    fn extension(&mut self, extension: &Extension, path: &str) -> Result<()> {
        self.nested(path, |this| {
            let mut start = BytesStart::new("extension");
            if let Some(id) = &extension.id {
                start.push_attribute(attribute("id", id));
            }
            start.push_attribute(attribute("url", &extension.url));

            if extension.extension.is_empty() && extension.value.is_none() {
                this.writer.write_event(Event::Empty(start))?;
                return Ok(());
            }

            this.writer.write_event(Event::Start(start))?;
            this.extensions(&extension.extension, &path::child(path, "extension"))?;
            if let Some(value) = &extension.value {
                this.choice_element(path, "value", DataType::OPEN_TYPES, value)?;
            }
            this.writer
                .write_event(Event::End(BytesEnd::new("extension")))?;
            Ok(())
        })
    }

    fn wrapped_resource(
        &mut self,
        name: &str,
        envelope: &ResourceEnvelope,
        path: &str,
    ) -> Result<()> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))?;
        self.envelope(envelope, path)?;
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }
}

/// Attribute with `value` escaped, including the whitespace characters that
/// attribute-value normalization would otherwise turn into spaces.
fn attribute<'b>(key: &'b str, value: &'b str) -> Attribute<'b> {
    let escaped = escape(value);
    let escaped = if escaped.contains(['\t', '\n', '\r']) {
        Cow::Owned(
            escaped
                .replace('\t', "&#9;")
                .replace('\n', "&#10;")
                .replace('\r', "&#13;"),
        )
    } else {
        escaped
    };
    Attribute {
        key: QName(key.as_bytes()),
        value: match escaped {
            Cow::Borrowed(text) => Cow::Borrowed(text.as_bytes()),
            Cow::Owned(text) => Cow::Owned(text.into_bytes()),
        },
    }
}

fn is_empty_value(value: &FieldValue) -> bool {
    match value {
        FieldValue::Primitive(primitive) => primitive.is_empty(),
        FieldValue::Primitives(items) => items.iter().all(Primitive::is_empty),
        FieldValue::Complexes(records) => records.is_empty(),
        FieldValue::Extensions(extensions) => extensions.is_empty(),
        FieldValue::Resources(resources) => resources.is_empty(),
        FieldValue::ElementId(_)
        | FieldValue::Complex(_)
        | FieldValue::Choice(_)
        | FieldValue::Resource(_)
        | FieldValue::Xhtml(_) => false,
    }
}
