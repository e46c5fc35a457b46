//! Schema generation from StructureDefinition snapshots

use crate::catalog::SchemaCatalog;
use crate::error::{Error, Result};
use crate::schema::{FieldKind, TypeBuilder, TypeKind, TypeSchema};
use ferrum_models::{
    DataType, ElementDefinition, Snapshot, StructureDefinition, StructureDefinitionKind,
};

/// Prefix of FHIRPath system types used for `Element.id` and friends
const SYSTEM_TYPE_PREFIX: &str = "http://hl7.org/fhirpath/System.";

impl SchemaCatalog {
    /// Build a catalogue from StructureDefinitions.
    ///
    /// Only specializations of complex types and resources produce schemas;
    /// profiles, primitive types, logical models and `Extension` itself are
    /// skipped. Every BackboneElement in a snapshot becomes its own type named
    /// by its element path. The result is not validated, so definitions may be
    /// loaded in several batches and merged before calling
    /// [`SchemaCatalog::validate`].
    pub fn from_structure_definitions<'a>(
        definitions: impl IntoIterator<Item = &'a StructureDefinition>,
    ) -> Result<SchemaCatalog> {
        let mut catalog = SchemaCatalog::new();
        let mut skipped = 0usize;

        for sd in definitions {
            if !is_generated(sd) {
                tracing::trace!(url = %sd.url, "Skipping StructureDefinition");
                skipped += 1;
                continue;
            }

            let snapshot = sd.snapshot.as_ref().ok_or_else(|| {
                Error::InvalidStructureDefinition(format!("{} has no snapshot", sd.url))
            })?;

            let kind = match sd.kind {
                StructureDefinitionKind::Resource => TypeKind::Resource,
                _ => TypeKind::ComplexType,
            };

            let mut schemas = Vec::new();
            build_type(snapshot, &sd.type_, &sd.type_, kind, &mut schemas)?;
            for schema in schemas {
                catalog.insert(schema)?;
            }
        }

        tracing::debug!(
            types = catalog.len(),
            skipped,
            "Generated schema catalogue from StructureDefinitions"
        );
        Ok(catalog)
    }
}

fn is_generated(sd: &StructureDefinition) -> bool {
    sd.is_specialization()
        && matches!(
            sd.kind,
            StructureDefinitionKind::ComplexType | StructureDefinitionKind::Resource
        )
        && sd.type_ != "Extension"
}

fn build_type(
    snapshot: &Snapshot,
    path: &str,
    root_type: &str,
    kind: TypeKind,
    out: &mut Vec<TypeSchema>,
) -> Result<()> {
    let mut builder = TypeSchema::builder(path, kind);

    for child in snapshot.get_children(path) {
        if child.is_prohibited() {
            continue;
        }
        builder = add_field(builder, snapshot, child, root_type, kind, out)?;
    }

    out.push(builder.build()?);
    Ok(())
}

fn add_field(
    builder: TypeBuilder,
    snapshot: &Snapshot,
    element: &ElementDefinition,
    root_type: &str,
    owner_kind: TypeKind,
    out: &mut Vec<TypeSchema>,
) -> Result<TypeBuilder> {
    let repeated = element.is_array();

    if let Some(base) = element.choice_base_name() {
        let variants: Vec<DataType> = element
            .type_codes()
            .into_iter()
            .filter_map(|code| {
                let variant = DataType::from_name(code);
                if variant.is_none() {
                    tracing::warn!(path = %element.path, code, "Unsupported choice variant");
                }
                variant
            })
            .collect();
        return Ok(builder.field(base, FieldKind::Choice(variants), false));
    }

    let name = element.name();

    if let Some(reference) = &element.content_reference {
        let target = reference
            .rsplit_once('#')
            .map(|(_, target)| target)
            .unwrap_or(reference.as_str());
        return Ok(builder.field(name, FieldKind::Complex(target.to_string()), repeated));
    }

    if name == "id" && element.parent_path() == Some(root_type) && owner_kind == TypeKind::Resource
    {
        return Ok(builder.field(name, FieldKind::Primitive(DataType::Id), false));
    }
    if name == "id" && owner_kind != TypeKind::Resource {
        return Ok(builder.field(name, FieldKind::ElementId, false));
    }

    if element.is_xhtml() {
        return Ok(builder.field(name, FieldKind::Xhtml, false));
    }

    let codes = element.type_codes();
    let code = match codes.as_slice() {
        [code] => *code,
        [] => {
            return Err(Error::InvalidStructureDefinition(format!(
                "{} has no type",
                element.path
            )))
        }
        _ => {
            return Err(Error::InvalidStructureDefinition(format!(
                "{} has several types but is not a choice",
                element.path
            )))
        }
    };

    let kind = match code {
        "Extension" => FieldKind::Extension,
        "Resource" => FieldKind::Resource,
        "BackboneElement" | "Element" if snapshot.has_children(&element.path) => {
            build_type(snapshot, &element.path, root_type, TypeKind::Backbone, out)?;
            FieldKind::Complex(element.path.clone())
        }
        code if code.starts_with(SYSTEM_TYPE_PREFIX) => {
            tracing::trace!(path = %element.path, code, "System type mapped to string");
            FieldKind::Primitive(DataType::String)
        }
        code => match DataType::from_name(code) {
            Some(data_type) if data_type.is_primitive() => FieldKind::Primitive(data_type),
            _ => FieldKind::Complex(code.to_string()),
        },
    };

    Ok(builder.field(name, kind, repeated))
}
