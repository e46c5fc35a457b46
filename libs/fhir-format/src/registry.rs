//! Resource registry: discriminator → record codec
//!
//! Filled once through [`RegistryBuilder`], then frozen. A frozen
//! [`Registry`] is `Send + Sync` and shared by reference across threads; the
//! codecs never mutate it.

use crate::error::{FormatError, Result};
use ferrum_context::{SchemaCatalog, TypeSchema};
use ferrum_models::{DataType, Record};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

static CORE_REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let catalog = ferrum_context::core::catalog().expect("built-in schema catalogue is valid");
    Registry::from_catalog(catalog).expect("built-in schema catalogue registers cleanly")
});

/// Codec for one resource type, driven by its schema.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    schema: Arc<TypeSchema>,
}

impl RecordCodec {
    pub fn new(schema: Arc<TypeSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<TypeSchema> {
        &self.schema
    }

    pub fn type_name(&self) -> &str {
        self.schema.name()
    }
}

#[derive(Debug)]
pub struct Registry {
    catalog: Arc<SchemaCatalog>,
    codecs: HashMap<String, RecordCodec>,
}

impl Registry {
    pub fn builder(catalog: impl Into<Arc<SchemaCatalog>>) -> RegistryBuilder {
        RegistryBuilder {
            catalog: catalog.into(),
            codecs: HashMap::new(),
        }
    }

    /// Registry with a codec for every resource type of `catalog`.
    pub fn from_catalog(catalog: SchemaCatalog) -> Result<Self> {
        let catalog = Arc::new(catalog);
        let mut builder = Registry::builder(Arc::clone(&catalog));
        for schema in catalog.resources() {
            builder = builder.register(schema.name(), RecordCodec::new(Arc::clone(schema)))?;
        }
        builder.build()
    }

    /// Process-wide registry over the built-in R4 catalogue, built on first use.
    pub fn core() -> &'static Registry {
        &CORE_REGISTRY
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn codec(&self, discriminator: &str) -> Option<&RecordCodec> {
        self.codecs.get(discriminator)
    }

    /// Codec for `discriminator`; an unregistered one is a hard error.
    pub fn resolve(&self, discriminator: &str, path: &str) -> Result<&RecordCodec> {
        self.codec(discriminator)
            .ok_or_else(|| FormatError::UnknownResourceType {
                path: path.to_string(),
                resource_type: discriminator.to_string(),
            })
    }

    /// Schema of a data type or backbone element.
    pub fn type_schema(&self, name: &str) -> Result<&Arc<TypeSchema>> {
        self.catalog
            .get(name)
            .ok_or_else(|| FormatError::UnknownType(name.to_string()))
    }

    /// Schema of a complex choice variant found in the input at `path`.
    ///
    /// A variant the catalogue does not define cannot be read, which is a
    /// fault of the document rather than of the encoder.
    pub(crate) fn variant_schema(
        &self,
        data_type: DataType,
        path: &str,
    ) -> Result<&Arc<TypeSchema>> {
        self.catalog.get(data_type.name()).ok_or_else(|| {
            FormatError::structure(
                path,
                format!("type {} is not defined in the registry's catalogue", data_type.name()),
            )
        })
    }

    /// Registered discriminators, sorted.
    pub fn resource_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

/// Setup phase of a [`Registry`].
#[derive(Debug)]
pub struct RegistryBuilder {
    catalog: Arc<SchemaCatalog>,
    codecs: HashMap<String, RecordCodec>,
}

impl RegistryBuilder {
    /// Register `codec` under `discriminator`.
    ///
    /// The codec's schema must be a resource of the builder's catalogue, named
    /// like the discriminator, and each discriminator may be registered once.
    pub fn register(mut self, discriminator: impl Into<String>, codec: RecordCodec) -> Result<Self> {
        let discriminator = discriminator.into();
        let schema = codec.schema();

        if !schema.is_resource() {
            return Err(FormatError::Registry(format!(
                "{} is not a resource type",
                schema.name()
            )));
        }
        if schema.name() != discriminator {
            return Err(FormatError::Registry(format!(
                "codec for {} registered under '{}'",
                schema.name(),
                discriminator
            )));
        }
        if !self.catalog.contains(schema.name()) {
            return Err(FormatError::Registry(format!(
                "{} is not part of the registry's catalogue",
                schema.name()
            )));
        }
        if self.codecs.contains_key(&discriminator) {
            return Err(FormatError::Registry(format!(
                "'{}' registered twice",
                discriminator
            )));
        }

        self.codecs.insert(discriminator, codec);
        Ok(self)
    }

    /// Register the catalogue's schema of `name` under its own name.
    pub fn register_type(self, name: &str) -> Result<Self> {
        let schema = Arc::clone(self.catalog.require(name)?);
        self.register(name, RecordCodec::new(schema))
    }

    /// Freeze the registry. The catalogue must be closed under type references.
    pub fn build(self) -> Result<Registry> {
        self.catalog.validate()?;
        tracing::debug!(
            resources = self.codecs.len(),
            types = self.catalog.len(),
            "Built resource registry"
        );
        Ok(Registry {
            catalog: self.catalog,
            codecs: self.codecs,
        })
    }
}

/// The record must be of the schema's type and use only declared fields.
pub(crate) fn check_record(schema: &TypeSchema, record: &Record, path: &str) -> Result<()> {
    if record.type_name() != schema.name() {
        return Err(FormatError::mismatch(
            path,
            format!(
                "expected a {} record, got {}",
                schema.name(),
                record.type_name()
            ),
        ));
    }
    if let Some((name, _)) = record
        .fields()
        .find(|(name, _)| schema.field(name).is_none())
    {
        return Err(FormatError::mismatch(
            path,
            format!("{} has no field '{}'", schema.name(), name),
        ));
    }
    Ok(())
}
