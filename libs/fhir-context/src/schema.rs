//! Type schemas: the ordered field descriptors of one FHIR type

use crate::error::{Error, Result};
use ferrum_models::DataType;
use std::collections::HashMap;

/// What a field holds and therefore how it is coded on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// `Element.id` of a data type or backbone element. JSON `"id"` key,
    /// XML `id` attribute.
    ElementId,
    /// Primitive cell with optional id/extension metadata.
    Primitive(DataType),
    /// Nested record of the named type (data type or backbone element).
    Complex(String),
    /// `name[x]`: exactly one of the listed variants, in declaration order.
    Choice(Vec<DataType>),
    /// `extension` / `modifierExtension` lists.
    Extension,
    /// Embedded resource, dispatched on its discriminator.
    Resource,
    /// Narrative XHTML `div`.
    Xhtml,
}

impl FieldKind {
    /// Whether the field may carry a JSON `_name` shadow key.
    pub fn has_shadow(&self) -> bool {
        match self {
            FieldKind::Primitive(_) => true,
            FieldKind::Choice(variants) => variants.iter().any(|v| v.is_primitive()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    pub repeated: bool,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: FieldKind, repeated: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            repeated,
        }
    }

    /// Allowed variants of a choice field, empty for every other kind.
    pub fn variants(&self) -> &[DataType] {
        match &self.kind {
            FieldKind::Choice(variants) => variants,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Member of the resource family, carries a discriminator on the wire
    Resource,
    /// Reusable data type (`Period`, `HumanName`, ...)
    ComplexType,
    /// Anonymous nested element named by its path (`Observation.component`)
    Backbone,
}

/// Position of a wire name within a [`TypeSchema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireSlot {
    /// Index into [`TypeSchema::fields`]
    pub field: usize,
    /// Variant selected by the wire name when the field is a choice
    pub variant: Option<DataType>,
}

/// Ordered field list of one type plus a wire-name index.
///
/// Field order is the wire order on encode. The index maps every name that can
/// appear on the wire (`effectivePeriod`, `status`, `id`) back to its field.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSchema {
    name: String,
    kind: TypeKind,
    fields: Vec<FieldSchema>,
    wire_index: HashMap<String, WireSlot>,
}

impl TypeSchema {
    pub fn builder(name: impl Into<String>, kind: TypeKind) -> TypeBuilder {
        TypeBuilder {
            name: name.into(),
            kind,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_resource(&self) -> bool {
        self.kind == TypeKind::Resource
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Field by logical name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field at an index obtained from [`TypeSchema::resolve`].
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn field_at(&self, index: usize) -> &FieldSchema {
        &self.fields[index]
    }

    /// Resolve a wire name (without any `_` shadow prefix).
    pub fn resolve(&self, wire_name: &str) -> Option<WireSlot> {
        self.wire_index.get(wire_name).copied()
    }

    /// Names of complex types this schema points at, for catalogue validation.
    pub(crate) fn referenced_types(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().flat_map(|field| {
            let targets: Vec<&str> = match &field.kind {
                FieldKind::Complex(target) => vec![target.as_str()],
                FieldKind::Choice(variants) => variants
                    .iter()
                    .filter(|v| !v.is_primitive())
                    .map(|v| v.name())
                    .collect(),
                _ => Vec::new(),
            };
            targets
                .into_iter()
                .map(move |target| (field.name.as_str(), target))
        })
    }
}

/// Fluent builder for [`TypeSchema`].
///
/// The shorthand methods mirror the field kinds; `build` checks that field
/// names and wire names are unique and that each kind is used sensibly.
#[derive(Debug, Clone)]
pub struct TypeBuilder {
    name: String,
    kind: TypeKind,
    fields: Vec<FieldSchema>,
}

impl TypeBuilder {
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind, repeated: bool) -> Self {
        self.fields.push(FieldSchema::new(name, kind, repeated));
        self
    }

    pub fn element_id(self) -> Self {
        self.field("id", FieldKind::ElementId, false)
    }

    pub fn primitive(self, name: &str, data_type: DataType) -> Self {
        self.field(name, FieldKind::Primitive(data_type), false)
    }

    pub fn primitives(self, name: &str, data_type: DataType) -> Self {
        self.field(name, FieldKind::Primitive(data_type), true)
    }

    pub fn complex(self, name: &str, type_name: &str) -> Self {
        self.field(name, FieldKind::Complex(type_name.to_string()), false)
    }

    pub fn complexes(self, name: &str, type_name: &str) -> Self {
        self.field(name, FieldKind::Complex(type_name.to_string()), true)
    }

    pub fn choice(self, name: &str, variants: &[DataType]) -> Self {
        self.field(name, FieldKind::Choice(variants.to_vec()), false)
    }

    pub fn extensions(self, name: &str) -> Self {
        self.field(name, FieldKind::Extension, true)
    }

    pub fn resource(self, name: &str) -> Self {
        self.field(name, FieldKind::Resource, false)
    }

    pub fn resources(self, name: &str) -> Self {
        self.field(name, FieldKind::Resource, true)
    }

    pub fn xhtml(self, name: &str) -> Self {
        self.field(name, FieldKind::Xhtml, false)
    }

    pub fn build(self) -> Result<TypeSchema> {
        let mut wire_index = HashMap::new();

        for (index, field) in self.fields.iter().enumerate() {
            if self.fields[..index].iter().any(|f| f.name == field.name) {
                return Err(Error::DuplicateField {
                    type_name: self.name.clone(),
                    field: field.name.clone(),
                });
            }
            self.check_field(field)?;

            let wire_names: Vec<(String, Option<DataType>)> = match &field.kind {
                FieldKind::Choice(variants) => variants
                    .iter()
                    .map(|v| (v.choice_key(&field.name), Some(*v)))
                    .collect(),
                _ => vec![(field.name.clone(), None)],
            };

            for (wire_name, variant) in wire_names {
                let slot = WireSlot {
                    field: index,
                    variant,
                };
                if wire_index.insert(wire_name.clone(), slot).is_some() {
                    return Err(Error::DuplicateWireName {
                        type_name: self.name.clone(),
                        wire_name,
                    });
                }
            }
        }

        Ok(TypeSchema {
            name: self.name,
            kind: self.kind,
            fields: self.fields,
            wire_index,
        })
    }

    fn check_field(&self, field: &FieldSchema) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidField {
            type_name: self.name.clone(),
            field: field.name.clone(),
            reason: reason.to_string(),
        };

        if field.name.is_empty() || field.name.starts_with('_') {
            return Err(invalid("field names must be non-empty and not start with '_'"));
        }

        match &field.kind {
            FieldKind::ElementId if field.repeated => Err(invalid("element id cannot repeat")),
            FieldKind::ElementId if field.name != "id" => {
                Err(invalid("element id must be named 'id'"))
            }
            FieldKind::ElementId if self.kind == TypeKind::Resource => Err(invalid(
                "resources carry their id as a primitive field",
            )),
            FieldKind::Primitive(data_type) if !data_type.is_primitive() => {
                Err(invalid("primitive field with a complex data type"))
            }
            FieldKind::Choice(_) if field.repeated => Err(invalid("choice fields cannot repeat")),
            FieldKind::Choice(variants) if variants.is_empty() => {
                Err(invalid("choice field without variants"))
            }
            FieldKind::Choice(variants)
                if variants
                    .iter()
                    .enumerate()
                    .any(|(i, v)| variants[..i].contains(v)) =>
            {
                Err(invalid("choice variant listed twice"))
            }
            FieldKind::Extension if !field.repeated => {
                Err(invalid("extension fields are always lists"))
            }
            FieldKind::Xhtml if field.repeated => Err(invalid("narrative cannot repeat")),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period() -> TypeSchema {
        TypeSchema::builder("Period", TypeKind::ComplexType)
            .element_id()
            .extensions("extension")
            .primitive("start", DataType::DateTime)
            .primitive("end", DataType::DateTime)
            .build()
            .unwrap()
    }

    #[test]
    fn test_fields_keep_declaration_order() {
        let schema = period();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "extension", "start", "end"]);
    }

    #[test]
    fn test_resolve_choice_variants() {
        let schema = TypeSchema::builder("Observation", TypeKind::Resource)
            .primitive("id", DataType::Id)
            .choice("effective", &[DataType::DateTime, DataType::Period])
            .build()
            .unwrap();

        let slot = schema.resolve("effectiveDateTime").unwrap();
        assert_eq!(slot.field, 1);
        assert_eq!(slot.variant, Some(DataType::DateTime));
        assert_eq!(
            schema.resolve("effectivePeriod").unwrap().variant,
            Some(DataType::Period)
        );
        assert!(schema.resolve("effective").is_none());
        assert!(schema.resolve("effectiveString").is_none());
        assert!(schema.field("effective").unwrap().kind.has_shadow());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = TypeSchema::builder("Coding", TypeKind::ComplexType)
            .primitive("code", DataType::Code)
            .primitive("code", DataType::String)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateField { .. }));
    }

    #[test]
    fn test_wire_name_collision_rejected() {
        // `valueString` is both a plain field and a choice variant
        let err = TypeSchema::builder("Odd", TypeKind::ComplexType)
            .primitive("valueString", DataType::String)
            .choice("value", &[DataType::String, DataType::Boolean])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateWireName { .. }));
    }

    #[test]
    fn test_invalid_kinds_rejected() {
        assert!(TypeSchema::builder("X", TypeKind::ComplexType)
            .choice("value", &[])
            .build()
            .is_err());
        assert!(TypeSchema::builder("X", TypeKind::ComplexType)
            .primitive("p", DataType::Period)
            .build()
            .is_err());
        assert!(TypeSchema::builder("X", TypeKind::ComplexType)
            .field("extension", FieldKind::Extension, false)
            .build()
            .is_err());
        assert!(TypeSchema::builder("X", TypeKind::Resource)
            .element_id()
            .build()
            .is_err());
        assert!(TypeSchema::builder("X", TypeKind::ComplexType)
            .choice("value", &[DataType::String, DataType::String])
            .build()
            .is_err());
    }

    #[test]
    fn test_referenced_types() {
        let schema = TypeSchema::builder("Observation", TypeKind::Resource)
            .complex("code", "CodeableConcept")
            .choice("value", &[DataType::String, DataType::Quantity])
            .build()
            .unwrap();
        let refs: Vec<_> = schema.referenced_types().collect();
        assert_eq!(
            refs,
            vec![("code", "CodeableConcept"), ("value", "Quantity")]
        );
    }
}
