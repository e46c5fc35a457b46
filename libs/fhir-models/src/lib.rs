//! FHIR element models
//!
//! This crate provides the in-memory object graph the `ferrum-format` codec
//! engine reads and writes, plus the conformance models used to generate
//! schemas.
//!
//! # Module Organization
//!
//! - `common`: Version-agnostic models that work across FHIR R4, R4B, and R5
//!
//! # Design Philosophy
//!
//! - **Schema-driven**: a [`Record`] is a named bag of typed fields; which
//!   fields exist and how they look on the wire is decided by a schema, not by
//!   one Rust struct per resource
//! - **Three-state primitives**: "field absent", "value absent but annotated"
//!   and "value present" are distinct ([`Primitive`])
//! - **Closed choice tags**: choice variants are tagged with [`DataType`], a
//!   closed enumeration, while the resource family stays open
//!
//! # Example
//!
//! ```rust
//! use ferrum_models::common::{Choice, DataType, Primitive, Record, ResourceEnvelope};
//!
//! let period = Record::new("Period")
//!     .with("start", Primitive::from("2024-01-01T08:00:00Z"))
//!     .with("end", Primitive::from("2024-01-01T09:00:00Z"));
//!
//! let observation = Record::new("Observation")
//!     .with("status", Primitive::from("final"))
//!     .with("effective", Choice::complex(period).unwrap());
//!
//! let envelope = ResourceEnvelope::new(observation);
//! assert_eq!(envelope.resource_type(), "Observation");
//! assert_eq!(
//!     envelope.record().choice("effective").map(|c| c.data_type()),
//!     Some(DataType::Period)
//! );
//! ```

pub mod common;

// Re-export commonly used types
pub use common::*;
