//! Schema catalogue: every known type by name

use crate::error::{Error, Result};
use crate::schema::{TypeKind, TypeSchema};
use std::collections::HashMap;
use std::sync::Arc;

/// Collection of [`TypeSchema`]s keyed by type name.
///
/// Backbone types are keyed by their element path (`Observation.component`),
/// everything else by its FHIR type name. The catalogue is filled once and then
/// only read; schemas are shared behind `Arc` so codecs can hold on to them.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    types: HashMap<String, Arc<TypeSchema>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type. Fails if a type of the same name is already present.
    pub fn insert(&mut self, schema: TypeSchema) -> Result<()> {
        if self.types.contains_key(schema.name()) {
            return Err(Error::DuplicateType(schema.name().to_string()));
        }
        self.types
            .insert(schema.name().to_string(), Arc::new(schema));
        Ok(())
    }

    /// Move every type of `other` into this catalogue.
    pub fn merge(&mut self, other: SchemaCatalog) -> Result<()> {
        for (name, schema) in other.types {
            if self.types.contains_key(&name) {
                return Err(Error::DuplicateType(name));
            }
            self.types.insert(name, schema);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeSchema>> {
        self.types.get(name)
    }

    /// Like [`SchemaCatalog::get`], but an unknown name is an error.
    pub fn require(&self, name: &str) -> Result<&Arc<TypeSchema>> {
        self.get(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Type names in sorted order.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resource schemas, sorted by name.
    pub fn resources(&self) -> Vec<&Arc<TypeSchema>> {
        let mut resources: Vec<&Arc<TypeSchema>> = self
            .types
            .values()
            .filter(|schema| schema.kind() == TypeKind::Resource)
            .collect();
        resources.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        resources
    }

    /// Check that every complex field and complex choice variant points at a
    /// type in this catalogue.
    pub fn validate(&self) -> Result<()> {
        for name in self.type_names() {
            let schema = &self.types[name];
            for (field, target) in schema.referenced_types() {
                if !self.types.contains_key(target) {
                    return Err(Error::UnresolvedReference {
                        type_name: name.to_string(),
                        field: field.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrum_models::DataType;

    fn period() -> TypeSchema {
        TypeSchema::builder("Period", TypeKind::ComplexType)
            .primitive("start", DataType::DateTime)
            .build()
            .unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut catalog = SchemaCatalog::new();
        catalog.insert(period()).unwrap();

        assert!(catalog.contains("Period"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.require("Period").unwrap().name(), "Period");
        assert!(matches!(
            catalog.require("Range"),
            Err(Error::UnknownType(name)) if name == "Range"
        ));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut catalog = SchemaCatalog::new();
        catalog.insert(period()).unwrap();
        assert!(matches!(
            catalog.insert(period()),
            Err(Error::DuplicateType(_))
        ));

        let mut other = SchemaCatalog::new();
        other.insert(period()).unwrap();
        assert!(catalog.merge(other).is_err());
    }

    #[test]
    fn test_validate_reports_dangling_reference() {
        let mut catalog = SchemaCatalog::new();
        catalog
            .insert(
                TypeSchema::builder("Encounter", TypeKind::Resource)
                    .complex("period", "Period")
                    .choice("reported", &[DataType::Boolean, DataType::Reference])
                    .build()
                    .unwrap(),
            )
            .unwrap();
        catalog.insert(period()).unwrap();

        match catalog.validate() {
            Err(Error::UnresolvedReference {
                type_name,
                field,
                target,
            }) => {
                assert_eq!(type_name, "Encounter");
                assert_eq!(field, "reported");
                assert_eq!(target, "Reference");
            }
            other => panic!("expected unresolved reference, got {:?}", other),
        }
    }

    #[test]
    fn test_resources_sorted() {
        let mut catalog = SchemaCatalog::new();
        for name in ["Patient", "Basic"] {
            catalog
                .insert(
                    TypeSchema::builder(name, TypeKind::Resource)
                        .primitive("id", DataType::Id)
                        .build()
                        .unwrap(),
                )
                .unwrap();
        }
        catalog.insert(period()).unwrap();

        let names: Vec<&str> = catalog.resources().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Basic", "Patient"]);
    }
}
