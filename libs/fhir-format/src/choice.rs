//! Choice-field (`name[x]`) variant selection
//!
//! On the wire a choice field appears under `name + Tag` where `Tag` is the
//! variant's type name with its first letter upper-cased (`valueQuantity`,
//! `effectiveDateTime`). At most one variant may be present.

use crate::error::{FormatError, Result};
use ferrum_models::{Choice, DataType, Primitive, Record};

/// Find the variant of `field` present on the wire.
///
/// `present` is asked once per allowed variant, in declaration order. No hit
/// means the field is absent; more than one is a [`FormatError::ChoiceConflict`]
/// listing every variant seen.
pub fn detect_variant(
    path: &str,
    field: &str,
    allowed: &[DataType],
    mut present: impl FnMut(DataType) -> bool,
) -> Result<Option<DataType>> {
    let found: Vec<DataType> = allowed.iter().copied().filter(|v| present(*v)).collect();
    match found.as_slice() {
        [] => Ok(None),
        [variant] => Ok(Some(*variant)),
        _ => Err(FormatError::ChoiceConflict {
            path: path.to_string(),
            field: field.to_string(),
            variants: found,
        }),
    }
}

/// Wire name for encoding `choice` as field `field`.
///
/// A variant outside `allowed` is a caller error reported as
/// [`FormatError::InvalidChoiceVariant`].
pub fn wire_name(path: &str, field: &str, allowed: &[DataType], choice: &Choice) -> Result<String> {
    let data_type = choice.data_type();
    if !allowed.contains(&data_type) {
        return Err(FormatError::InvalidChoiceVariant {
            path: path.to_string(),
            field: field.to_string(),
            data_type,
        });
    }
    Ok(data_type.choice_key(field))
}

pub(crate) fn primitive_variant(
    path: &str,
    data_type: DataType,
    primitive: Primitive,
) -> Result<Choice> {
    Choice::primitive(data_type, primitive).map_err(|e| FormatError::mismatch(path, e.to_string()))
}

pub(crate) fn complex_variant(path: &str, record: Record) -> Result<Choice> {
    Choice::complex(record).map_err(|e| FormatError::mismatch(path, e.to_string()))
}
