//! FHIR schema catalogue
//!
//! Describes, per FHIR type, the ordered list of logical fields the codec
//! engine in `ferrum-format` walks: each field's name, its kind (primitive,
//! complex, choice, extension list, embedded resource, ...) and whether it
//! repeats. Choice fields carry their ordered list of allowed variants.
//!
//! Catalogues come from two places:
//!
//! - [`core::catalog`]: a built-in slice of FHIR R4
//! - [`SchemaCatalog::from_structure_definitions`]: generated from the
//!   snapshots of `StructureDefinition` resources
//!
//! ```rust
//! use ferrum_context::{core, FieldKind};
//! use ferrum_models::DataType;
//!
//! let catalog = core::catalog().unwrap();
//! let observation = catalog.get("Observation").unwrap();
//!
//! let slot = observation.resolve("effectivePeriod").unwrap();
//! assert_eq!(slot.variant, Some(DataType::Period));
//! assert!(matches!(
//!     observation.field_at(slot.field).kind,
//!     FieldKind::Choice(_)
//! ));
//! ```

pub mod catalog;
pub mod core;
pub mod error;
mod generate;
pub mod schema;

pub use catalog::SchemaCatalog;
pub use error::{Error, Result};
pub use schema::{FieldKind, FieldSchema, TypeBuilder, TypeKind, TypeSchema, WireSlot};
