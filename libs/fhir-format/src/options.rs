//! Codec configuration

use serde::{Deserialize, Serialize};

/// Default nesting limit for records, extensions and embedded resources.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Knobs shared by the JSON and XML codecs.
///
/// Plain data with defaults for every field, so it can be read from a section
/// of the caller's own configuration file:
///
/// ```rust
/// use ferrum_format::CodecOptions;
///
/// let options: CodecOptions = serde_json::from_str(r#"{ "pretty": false }"#).unwrap();
/// assert!(!options.pretty);
/// assert_eq!(options.max_depth, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodecOptions {
    /// Maximum nesting of records; deeper input fails with a depth error
    /// instead of exhausting the stack.
    pub max_depth: usize,
    /// Skip wire keys and elements the schema does not declare instead of
    /// failing.
    pub allow_unknown_elements: bool,
    /// Indented output.
    pub pretty: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            allow_unknown_elements: false,
            pretty: true,
        }
    }
}

impl CodecOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn lenient(mut self) -> Self {
        self.allow_unknown_elements = true;
        self
    }

    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }
}
