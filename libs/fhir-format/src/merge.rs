//! Primitive side-channel merging
//!
//! A primitive's value and its metadata (`id`, `extension`) travel in
//! different places on the wire: JSON keeps the metadata under a `_name`
//! shadow key (a parallel array for repeated fields), XML keeps it as the `id`
//! attribute and `extension` children of the element holding the `value`
//! attribute. Both adapters funnel through the functions here so the
//! three-state rule is applied in one place:
//!
//! | value | metadata | logical result |
//! |-------|----------|----------------|
//! | no    | no       | field absent (array position dropped) |
//! | yes   | no       | value only |
//! | no    | yes      | metadata only, `value: None` |
//! | yes   | yes      | both |

use crate::error::{FormatError, Result};
use ferrum_models::{Extension, Primitive};

/// Owned primitive metadata as read from the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Shadow {
    pub id: Option<String>,
    pub extension: Vec<Extension>,
}

impl Shadow {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.extension.is_empty()
    }
}

/// Borrowed primitive metadata, produced when encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowRef<'a> {
    pub id: Option<&'a str>,
    pub extension: &'a [Extension],
}

/// Adapter-side access to the two halves of one primitive.
pub trait PrimitiveAccess<T> {
    /// The value, `None` when absent (or JSON `null`).
    fn value(&mut self) -> Result<Option<T>>;
    /// The metadata, `None` when absent.
    fn shadow(&mut self) -> Result<Option<Shadow>>;
}

/// Combine the value and metadata of one primitive.
///
/// Returns `None` when neither half is present, so the caller omits the field.
pub fn merge_scalar<T, A>(access: &mut A) -> Result<Option<Primitive<T>>>
where
    A: PrimitiveAccess<T> + ?Sized,
{
    let value = access.value()?;
    let shadow = access.shadow()?;
    Ok(combine(value, shadow))
}

/// Split a primitive into the value and the metadata to emit.
///
/// The metadata half is `None` unless an id or an extension is present.
pub fn split_scalar<T>(primitive: &Primitive<T>) -> (Option<&T>, Option<ShadowRef<'_>>) {
    let shadow = primitive.has_metadata().then(|| ShadowRef {
        id: primitive.id.as_deref(),
        extension: &primitive.extension,
    });
    (primitive.value.as_ref(), shadow)
}

/// Align a JSON values array with its shadow array.
///
/// Positions carrying neither value nor metadata do not exist in the logical
/// array. Without a values array the shadows alone define the positions; a
/// shadow array shorter than the values leaves the tail value-only; a longer
/// one is rejected.
pub fn merge_array<T>(
    path: &str,
    field: &str,
    values: Option<Vec<Option<T>>>,
    shadows: Option<Vec<Option<Shadow>>>,
) -> Result<Vec<Primitive<T>>> {
    let shadows = shadows.unwrap_or_default();
    let len = match &values {
        Some(values) if shadows.len() > values.len() => {
            return Err(FormatError::ArrayAlignment {
                path: path.to_string(),
                field: field.to_string(),
                values: values.len(),
                shadows: shadows.len(),
            });
        }
        Some(values) => values.len(),
        None => shadows.len(),
    };

    let mut values = values.map(Vec::into_iter);
    let mut shadows = shadows.into_iter();
    let mut merged = Vec::with_capacity(len);
    for _ in 0..len {
        let value = values.as_mut().and_then(Iterator::next).flatten();
        let shadow = shadows.next().flatten();
        if let Some(primitive) = combine(value, shadow) {
            merged.push(primitive);
        }
    }
    Ok(merged)
}

/// Parallel arrays produced by [`split_array`].
#[derive(Debug, Clone, PartialEq)]
pub struct SplitArray<'a, T> {
    /// One entry per logical element; `None` marks a metadata-only position
    pub values: Vec<Option<&'a T>>,
    /// Present only when at least one element carries metadata
    pub shadows: Option<Vec<Option<ShadowRef<'a>>>>,
}

impl<T> SplitArray<'_, T> {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Split repeated primitives into a values array and a shadow array.
///
/// Elements with neither value nor metadata are skipped.
pub fn split_array<T>(items: &[Primitive<T>]) -> SplitArray<'_, T> {
    let mut values = Vec::with_capacity(items.len());
    let mut shadows = Vec::with_capacity(items.len());
    for item in items.iter().filter(|item| !item.is_empty()) {
        let (value, shadow) = split_scalar(item);
        values.push(value);
        shadows.push(shadow);
    }
    let shadows = shadows.iter().any(Option::is_some).then_some(shadows);
    SplitArray { values, shadows }
}

fn combine<T>(value: Option<T>, shadow: Option<Shadow>) -> Option<Primitive<T>> {
    let shadow = shadow.filter(|shadow| !shadow.is_empty());
    if value.is_none() && shadow.is_none() {
        return None;
    }
    let Shadow { id, extension } = shadow.unwrap_or_default();
    Some(Primitive {
        value,
        id,
        extension,
    })
}
