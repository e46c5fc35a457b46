//! XML decoding: element tree → records

use super::{FHIR_NS, XHTML_NS};
use crate::choice::{complex_variant, detect_variant, primitive_variant};
use crate::error::{FormatError, Result};
use crate::merge::{merge_scalar, PrimitiveAccess, Shadow};
use crate::options::CodecOptions;
use crate::path;
use crate::registry::Registry;
use crate::scalar;
use ferrum_context::{FieldKind, FieldSchema, TypeSchema};
use ferrum_models::{Choice, DataType, Extension, FieldValue, Record, ResourceEnvelope, Scalar};
use roxmltree::Node;

/// Element children grouped under one field, with the choice variant their
/// name selected.
type Group<'n, 'i> = Vec<(Node<'n, 'i>, Option<DataType>)>;

pub(crate) struct Decoder<'a, 'i> {
    registry: &'a Registry,
    options: &'a CodecOptions,
    source: &'i str,
    depth: usize,
}

impl<'a, 'i> Decoder<'a, 'i> {
    pub(crate) fn new(registry: &'a Registry, options: &'a CodecOptions, source: &'i str) -> Self {
        Self {
            registry,
            options,
            source,
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

    /// Decode a resource element. An empty `path` marks the document root.
    pub(crate) fn envelope(&mut self, node: Node<'_, 'i>, path: &str) -> Result<ResourceEnvelope> {
        let resource_type = node.tag_name().name();
        let path = if path.is_empty() { resource_type } else { path };
        check_namespace(node, FHIR_NS, path)?;

        let registry = self.registry;
        let codec = registry.resolve(resource_type, path)?;
        let record = self.record(codec.schema(), node, path)?;
        Ok(ResourceEnvelope::new(record))
    }

    pub(crate) fn record(
        &mut self,
        schema: &TypeSchema,
        node: Node<'_, 'i>,
        path: &str,
    ) -> Result<Record> {
        self.nested(path, |this| this.record_fields(schema, node, path))
    }

    fn record_fields<'n>(
        &mut self,
        schema: &TypeSchema,
        node: Node<'n, 'i>,
        path: &str,
    ) -> Result<Record> {
        let has_element_id = schema
            .fields()
            .iter()
            .any(|field| field.kind == FieldKind::ElementId);
        check_attributes(node, if has_element_id { &["id"] } else { &[] }, path)?;

        let mut groups: Vec<Group<'n, 'i>> = vec![Vec::new(); schema.fields().len()];
        for child in element_children(node, path)? {
            let name = child.tag_name().name();
            match schema.resolve(name) {
                Some(slot) if schema.field_at(slot.field).kind != FieldKind::ElementId => {
                    groups[slot.field].push((child, slot.variant));
                }
                _ if self.options.allow_unknown_elements => {
                    tracing::trace!(path, name, "Ignoring unknown XML element");
                }
                _ => return Err(FormatError::unknown_element(path, name)),
            }
        }

        let mut record = Record::new(schema.name());
        for (field, group) in schema.fields().iter().zip(&groups) {
            let value = match field.kind {
                FieldKind::ElementId => node
                    .attribute("id")
                    .map(|id| FieldValue::ElementId(id.to_string())),
                _ if group.is_empty() => None,
                _ => self.field(field, group, path)?,
            };
            if let Some(value) = value {
                record.set(field.name.clone(), value);
            }
        }
        Ok(record)
    }

    fn field(
        &mut self,
        field: &FieldSchema,
        group: &[(Node<'_, 'i>, Option<DataType>)],
        record_path: &str,
    ) -> Result<Option<FieldValue>> {
        let path = path::child(record_path, &field.name);
        let repeats = field.repeated || matches!(field.kind, FieldKind::Choice(_));
        if group.len() > 1 && !repeats {
            return Err(FormatError::structure(
                &path,
                format!("element '{}' repeated", field.name),
            ));
        }

        let expected_namespace = match field.kind {
            FieldKind::Xhtml => XHTML_NS,
            _ => FHIR_NS,
        };
        for (node, _) in group {
            check_namespace(*node, expected_namespace, &path)?;
        }

        let item_path = |i: usize| {
            if field.repeated {
                path::index(&path, i)
            } else {
                path.clone()
            }
        };
        let registry = self.registry;

        let decoded = match &field.kind {
            FieldKind::ElementId => None,

            FieldKind::Primitive(data_type) => {
                let mut items = Vec::new();
                for (i, (node, _)) in group.iter().enumerate() {
                    let item_path = item_path(i);
                    let mut access = XmlPrimitive {
                        decoder: &mut *self,
                        node: *node,
                        data_type: *data_type,
                        path: &item_path,
                    };
                    if let Some(primitive) = merge_scalar(&mut access)? {
                        items.push(primitive);
                    }
                }
                if field.repeated {
                    (!items.is_empty()).then_some(FieldValue::Primitives(items))
                } else {
                    items.pop().map(FieldValue::Primitive)
                }
            }

            FieldKind::Complex(type_name) => {
                let schema = registry.type_schema(type_name)?;
                let mut records = Vec::with_capacity(group.len());
                for (i, (node, _)) in group.iter().enumerate() {
                    records.push(self.record(schema, *node, &item_path(i))?);
                }
                if field.repeated {
                    Some(FieldValue::Complexes(records))
                } else {
                    records.pop().map(FieldValue::Complex)
                }
            }

            FieldKind::Choice(variants) => self
                .choice(record_path, &field.name, variants, group)?
                .map(FieldValue::Choice),

            FieldKind::Extension => {
                let mut extensions = Vec::with_capacity(group.len());
                for (i, (node, _)) in group.iter().enumerate() {
                    extensions.push(self.extension(*node, &item_path(i))?);
                }
                Some(FieldValue::Extensions(extensions))
            }

            FieldKind::Resource => {
                let mut resources = Vec::with_capacity(group.len());
                for (i, (node, _)) in group.iter().enumerate() {
                    resources.push(self.wrapped_resource(*node, &item_path(i))?);
                }
                if field.repeated {
                    Some(FieldValue::Resources(resources))
                } else {
                    resources.pop().map(FieldValue::Resource)
                }
            }

            FieldKind::Xhtml => group
                .first()
                .map(|(node, _)| FieldValue::Xhtml(self.source[node.range()].to_string())),
        };

        Ok(decoded)
    }

    /// Decode the single present variant among `group`, if any.
    fn choice(
        &mut self,
        record_path: &str,
        field: &str,
        allowed: &[DataType],
        group: &[(Node<'_, 'i>, Option<DataType>)],
    ) -> Result<Option<Choice>> {
        let variant = detect_variant(record_path, field, allowed, |variant| {
            group.iter().any(|(_, found)| *found == Some(variant))
        })?;
        let Some(data_type) = variant else {
            return Ok(None);
        };

        let path = path::child(record_path, &data_type.choice_key(field));
        let node = match group {
            [(node, _)] => *node,
            _ => {
                return Err(FormatError::structure(
                    &path,
                    format!("element '{}' repeated", data_type.choice_key(field)),
                ))
            }
        };

        if data_type.is_primitive() {
            let mut access = XmlPrimitive {
                decoder: &mut *self,
                node,
                data_type,
                path: &path,
            };
            return match merge_scalar(&mut access)? {
                Some(primitive) => Ok(Some(primitive_variant(&path, data_type, primitive)?)),
                None => Ok(None),
            };
        }

        let registry = self.registry;
        let schema = registry.variant_schema(data_type, &path)?;
        let record = self.record(schema, node, &path)?;
        Ok(Some(complex_variant(&path, record)?))
    }

    fn extension(&mut self, node: Node<'_, 'i>, path: &str) -> Result<Extension> {
        self.nested(path, |this| {
            check_attributes(node, &["id", "url"], path)?;
            let url = node
                .attribute("url")
                .ok_or_else(|| FormatError::structure(path, "extension without url"))?;

            let extension_path = path::child(path, "extension");
            let mut extension = Vec::new();
            let mut values = Vec::new();
            for child in element_children(node, path)? {
                check_namespace(child, FHIR_NS, path)?;
                let name = child.tag_name().name();
                if name == "extension" {
                    let child_path = path::index(&extension_path, extension.len());
                    extension.push(this.extension(child, &child_path)?);
                } else if let Some(data_type) = name.strip_prefix("value").and_then(DataType::from_tag)
                {
                    values.push((child, Some(data_type)));
                } else if this.options.allow_unknown_elements {
                    tracing::trace!(path, name, "Ignoring unknown extension element");
                } else {
                    return Err(FormatError::unknown_element(path, name));
                }
            }

            let value = this.choice(path, "value", DataType::OPEN_TYPES, &values)?;
            Ok(Extension {
                id: node.attribute("id").map(str::to_string),
                url: url.to_string(),
                value,
                extension,
            })
        })
    }

    /// `<contained><Patient>...</Patient></contained>`
    fn wrapped_resource(&mut self, node: Node<'_, 'i>, path: &str) -> Result<ResourceEnvelope> {
        check_attributes(node, &[], path)?;
        match element_children(node, path)?.as_slice() {
            [resource] => self.envelope(*resource, path),
            [] => Err(FormatError::structure(path, "empty resource wrapper")),
            _ => Err(FormatError::structure(
                path,
                "resource wrapper holds more than one resource",
            )),
        }
    }
}

/// One XML primitive: the `value` attribute, the `id` attribute and
/// `extension` children of a single element.
struct XmlPrimitive<'d, 'a, 'i, 'n> {
    decoder: &'d mut Decoder<'a, 'i>,
    node: Node<'n, 'i>,
    data_type: DataType,
    path: &'d str,
}

impl PrimitiveAccess<Scalar> for XmlPrimitive<'_, '_, '_, '_> {
    fn value(&mut self) -> Result<Option<Scalar>> {
        check_attributes(self.node, &["value", "id"], self.path)?;
        self.node
            .attribute("value")
            .map(|text| scalar::parse_lexical(self.path, self.data_type, text))
            .transpose()
    }

    fn shadow(&mut self) -> Result<Option<Shadow>> {
        let extension_path = path::child(self.path, "extension");
        let mut extension = Vec::new();
        for child in element_children(self.node, self.path)? {
            check_namespace(child, FHIR_NS, self.path)?;
            let name = child.tag_name().name();
            if name != "extension" {
                if self.decoder.options.allow_unknown_elements {
                    continue;
                }
                return Err(FormatError::unknown_element(self.path, name));
            }
            let child_path = path::index(&extension_path, extension.len());
            extension.push(self.decoder.extension(child, &child_path)?);
        }

        Ok(Some(Shadow {
            id: self.node.attribute("id").map(str::to_string),
            extension,
        }))
    }
}

fn check_namespace(node: Node<'_, '_>, expected: &str, path: &str) -> Result<()> {
    match node.tag_name().namespace() {
        Some(namespace) if namespace == expected => Ok(()),
        other => Err(FormatError::Namespace {
            path: path.to_string(),
            namespace: other.map(str::to_string),
        }),
    }
}

fn check_attributes(node: Node<'_, '_>, allowed: &[&str], path: &str) -> Result<()> {
    match node
        .attributes()
        .find(|attribute| attribute.namespace().is_some() || !allowed.contains(&attribute.name()))
    {
        Some(attribute) => Err(FormatError::UnexpectedAttribute {
            path: path.to_string(),
            attribute: attribute.name().to_string(),
        }),
        None => Ok(()),
    }
}

/// Element children of `node`; any non-whitespace text is an error.
fn element_children<'n, 'i>(node: Node<'n, 'i>, path: &str) -> Result<Vec<Node<'n, 'i>>> {
    let mut elements = Vec::new();
    for child in node.children() {
        if child.is_element() {
            elements.push(child);
        } else if child.is_text() && !child.text().unwrap_or_default().trim().is_empty() {
            return Err(FormatError::structure(path, "unexpected text content"));
        }
    }
    Ok(elements)
}
