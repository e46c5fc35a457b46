//! Scalar conversion shared by both adapters

use crate::error::{FormatError, Result};
use ferrum_models::{DataType, Primitive, Scalar, ScalarKind};
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::str::FromStr;

fn invalid(path: &str, data_type: DataType, value: impl ToString) -> FormatError {
    FormatError::InvalidPrimitive {
        path: path.to_string(),
        data_type,
        value: value.to_string(),
    }
}

fn kind_of(path: &str, data_type: DataType) -> Result<ScalarKind> {
    data_type
        .scalar_kind()
        .ok_or_else(|| FormatError::mismatch(path, format!("{} is not a primitive type", data_type)))
}

/// FHIR integers are 32-bit; the unsigned flavours are range-restricted.
fn check_integer(path: &str, data_type: DataType, value: i64) -> Result<i64> {
    let min = match data_type {
        DataType::PositiveInt => 1,
        DataType::UnsignedInt => 0,
        _ => i64::from(i32::MIN),
    };
    if value < min || value > i64::from(i32::MAX) {
        return Err(invalid(path, data_type, value));
    }
    Ok(value)
}

fn parse_decimal(path: &str, data_type: DataType, text: &str) -> Result<Decimal> {
    Decimal::from_str_exact(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| invalid(path, data_type, text))
}

/// Parse the lexical form used by XML `value` attributes.
pub(crate) fn parse_lexical(path: &str, data_type: DataType, text: &str) -> Result<Scalar> {
    match kind_of(path, data_type)? {
        ScalarKind::Boolean => match text {
            "true" => Ok(Scalar::Boolean(true)),
            "false" => Ok(Scalar::Boolean(false)),
            _ => Err(invalid(path, data_type, text)),
        },
        ScalarKind::Integer => {
            let value = text
                .parse::<i64>()
                .map_err(|_| invalid(path, data_type, text))?;
            Ok(Scalar::Integer(check_integer(path, data_type, value)?))
        }
        ScalarKind::Decimal => Ok(Scalar::Decimal(parse_decimal(path, data_type, text)?)),
        ScalarKind::String => Ok(Scalar::String(text.to_string())),
    }
}

/// Read a JSON primitive. `null` is an absent value.
pub(crate) fn from_json(path: &str, data_type: DataType, value: &Value) -> Result<Option<Scalar>> {
    let scalar = match (kind_of(path, data_type)?, value) {
        (_, Value::Null) => return Ok(None),
        (ScalarKind::Boolean, Value::Bool(b)) => Scalar::Boolean(*b),
        (ScalarKind::Integer, Value::Number(n)) => {
            let value = n.as_i64().ok_or_else(|| invalid(path, data_type, n))?;
            Scalar::Integer(check_integer(path, data_type, value)?)
        }
        (ScalarKind::Decimal, Value::Number(n)) => {
            Scalar::Decimal(parse_decimal(path, data_type, &n.to_string())?)
        }
        (ScalarKind::String, Value::String(s)) => Scalar::String(s.clone()),
        (_, other) => return Err(invalid(path, data_type, other)),
    };
    Ok(Some(scalar))
}

/// JSON form of a scalar. Decimals keep their scale (`1.50` stays `1.50`).
pub(crate) fn to_json(scalar: &Scalar) -> Result<Value> {
    Ok(match scalar {
        Scalar::Boolean(b) => Value::Bool(*b),
        Scalar::Integer(i) => Value::Number((*i).into()),
        Scalar::Decimal(d) => Value::Number(Number::from_str(&d.to_string())?),
        Scalar::String(s) => Value::String(s.clone()),
    })
}

/// Check that a primitive about to be encoded holds the scalar its type needs.
pub(crate) fn check_primitive(path: &str, data_type: DataType, primitive: &Primitive) -> Result<()> {
    let kind = kind_of(path, data_type)?;
    match &primitive.value {
        Some(value) if value.kind() != kind => Err(FormatError::mismatch(
            path,
            format!(
                "{} value for a {} primitive",
                value.kind().name(),
                data_type
            ),
        )),
        _ => Ok(()),
    }
}
