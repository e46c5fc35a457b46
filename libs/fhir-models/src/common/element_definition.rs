//! FHIR ElementDefinition model
//!
//! The subset of ElementDefinition needed to derive wire schemas from
//! StructureDefinition snapshots: paths, cardinality, type codes and content
//! references. Unknown properties are ignored on deserialization.

use super::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// FHIR ElementDefinition - defines an element in a resource or data type structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinition {
    /// Unique id for inter-element referencing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Path of the element in the hierarchy (e.g., "Patient.name")
    pub path: String,

    /// Name for this particular element (in a slice)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice_name: Option<String>,

    /// Minimum cardinality
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,

    /// Maximum cardinality (can be "*")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,

    /// Reference to definition of content if present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_reference: Option<String>,

    /// Data type and profile for this element
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<ElementDefinitionType>>,

    /// Codes that define how this element is represented
    #[serde(skip_serializing_if = "Option::is_none")]
    pub representation: Option<Vec<PropertyRepresentation>>,
}

/// How a property is represented when serialized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyRepresentation {
    XmlAttr,
    XmlText,
    TypeAttr,
    CdaText,
    Xhtml,
}

/// Data type for an element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementDefinitionType {
    /// Data type code
    pub code: String,
}

/// Snapshot - a set of elements that define the structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Snapshot {
    pub element: Vec<ElementDefinition>,
}

impl Snapshot {
    /// Parse from JSON Value
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(Error::from)
    }

    /// Get an element by path
    pub fn get_element(&self, path: &str) -> Option<&ElementDefinition> {
        self.element.iter().find(|e| e.path == path && !e.is_slice())
    }

    /// Get all direct children of a path, in snapshot order, slices excluded
    pub fn get_children(&self, parent_path: &str) -> Vec<&ElementDefinition> {
        let expected_depth = parent_path.matches('.').count() + 1;
        self.element
            .iter()
            .filter(|e| {
                !e.is_slice()
                    && e.is_descendant_of(parent_path)
                    && e.path.matches('.').count() == expected_depth
            })
            .collect()
    }

    /// Whether any element lives below `path`
    pub fn has_children(&self, path: &str) -> bool {
        self.element.iter().any(|e| e.is_descendant_of(path))
    }
}

impl ElementDefinition {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Builder helper used by tests and hand-written definitions
    pub fn with_types(mut self, codes: &[&str]) -> Self {
        self.types = Some(
            codes
                .iter()
                .map(|code| ElementDefinitionType {
                    code: (*code).to_string(),
                })
                .collect(),
        );
        self
    }

    pub fn with_max(mut self, max: &str) -> Self {
        self.max = Some(max.to_string());
        self
    }

    pub fn with_content_reference(mut self, reference: &str) -> Self {
        self.content_reference = Some(reference.to_string());
        self
    }

    /// Check if this element has a slice name
    pub fn is_slice(&self) -> bool {
        self.slice_name.is_some()
    }

    /// Last path segment (e.g. "value[x]" for "Observation.value[x]")
    pub fn name(&self) -> &str {
        self.path
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(&self.path)
    }

    /// Get the parent path (everything before the last '.')
    pub fn parent_path(&self) -> Option<&str> {
        self.path.rsplit_once('.').map(|(parent, _)| parent)
    }

    /// Check if this element is a descendant of the given path
    pub fn is_descendant_of(&self, parent_path: &str) -> bool {
        self.path.starts_with(parent_path)
            && self.path.len() > parent_path.len()
            && self.path.as_bytes().get(parent_path.len()) == Some(&b'.')
    }

    /// Check if this is a choice type element (ends with [x])
    pub fn is_choice_type(&self) -> bool {
        self.path.ends_with("[x]")
    }

    /// Name of a choice element without the `[x]` suffix
    pub fn choice_base_name(&self) -> Option<&str> {
        self.name().strip_suffix("[x]")
    }

    /// Get type codes for this element
    pub fn type_codes(&self) -> Vec<&str> {
        self.types
            .as_ref()
            .map(|types| types.iter().map(|t| t.code.as_str()).collect())
            .unwrap_or_default()
    }

    /// Check if element is array/list (max = "*" or max > 1)
    pub fn is_array(&self) -> bool {
        self.max
            .as_ref()
            .map(|m| m == "*" || m.parse::<u32>().map(|n| n > 1).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Check if the element is prohibited (max = "0")
    pub fn is_prohibited(&self) -> bool {
        self.max.as_deref() == Some("0")
    }

    /// Whether the element is serialized as raw XHTML
    pub fn is_xhtml(&self) -> bool {
        self.type_codes().contains(&"xhtml")
            || self
                .representation
                .as_ref()
                .is_some_and(|r| r.contains(&PropertyRepresentation::Xhtml))
    }
}
