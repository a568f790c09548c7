use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::FieldError;

/// Values returned by a driver for a single column, or bound as statement parameters.
///
/// The same enum is used by every executor so field conversion never branches on driver types:
/// ```rust
/// use sql_materialize::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // Try "YYYY-MM-DD HH:MM:SS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            // Try "YYYY-MM-DD HH:MM:SS.fff" with any fractional precision
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    /// Short name of the variant, used in conversion error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            RowValues::Int(_) => "int",
            RowValues::Float(_) => "float",
            RowValues::Text(_) => "text",
            RowValues::Bool(_) => "bool",
            RowValues::Timestamp(_) => "timestamp",
            RowValues::Null => "null",
            RowValues::JSON(_) => "json",
            RowValues::Blob(_) => "blob",
        }
    }
}

/// Conversion from a driver value into a model field type.
///
/// Implemented for the scalar types a model field usually has. `Option<T>` maps `NULL` to
/// `None`; every other implementation rejects `NULL`.
pub trait FromRowValue: Sized {
    /// Convert `value` into `Self`.
    ///
    /// # Errors
    ///
    /// Returns `FieldError` when the value's kind or range does not fit the target type.
    fn from_row_value(value: &RowValues) -> Result<Self, FieldError>;
}

fn mismatch<T>(value: &RowValues) -> FieldError {
    FieldError::Mismatch {
        expected: std::any::type_name::<T>(),
        found: value.kind_name(),
    }
}

fn to_i64(value: &RowValues) -> Result<i64, FieldError> {
    match value {
        RowValues::Int(i) => Ok(*i),
        RowValues::Bool(b) => Ok(i64::from(*b)),
        #[allow(clippy::cast_possible_truncation)]
        RowValues::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i64),
        RowValues::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| FieldError::Parse(format!("{s:?} is not an integer: {e}"))),
        RowValues::Null => Err(FieldError::UnexpectedNull),
        other => Err(mismatch::<i64>(other)),
    }
}

macro_rules! impl_from_row_value_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromRowValue for $ty {
                fn from_row_value(value: &RowValues) -> Result<Self, FieldError> {
                    let wide = to_i64(value)?;
                    <$ty>::try_from(wide).map_err(|_| FieldError::OutOfRange {
                        value: wide,
                        target: stringify!($ty),
                    })
                }
            }
        )*
    };
}

impl_from_row_value_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromRowValue for f64 {
    fn from_row_value(value: &RowValues) -> Result<Self, FieldError> {
        match value {
            RowValues::Float(f) => Ok(*f),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(i) => Ok(*i as f64),
            RowValues::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| FieldError::Parse(format!("{s:?} is not a number: {e}"))),
            RowValues::Null => Err(FieldError::UnexpectedNull),
            other => Err(mismatch::<f64>(other)),
        }
    }
}

impl FromRowValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_row_value(value: &RowValues) -> Result<Self, FieldError> {
        f64::from_row_value(value).map(|f| f as f32)
    }
}

impl FromRowValue for bool {
    fn from_row_value(value: &RowValues) -> Result<Self, FieldError> {
        if value.is_null() {
            return Err(FieldError::UnexpectedNull);
        }
        value.as_bool().copied().ok_or_else(|| mismatch::<bool>(value))
    }
}

impl FromRowValue for String {
    fn from_row_value(value: &RowValues) -> Result<Self, FieldError> {
        match value {
            RowValues::Text(s) => Ok(s.clone()),
            RowValues::Int(i) => Ok(i.to_string()),
            RowValues::Float(f) => Ok(f.to_string()),
            RowValues::Bool(b) => Ok(b.to_string()),
            RowValues::Timestamp(dt) => Ok(dt.format("%F %T%.f").to_string()),
            RowValues::JSON(j) => Ok(j.to_string()),
            RowValues::Blob(bytes) => String::from_utf8(bytes.clone())
                .map_err(|e| FieldError::Parse(format!("blob is not utf-8: {e}"))),
            RowValues::Null => Err(FieldError::UnexpectedNull),
        }
    }
}

impl FromRowValue for Vec<u8> {
    fn from_row_value(value: &RowValues) -> Result<Self, FieldError> {
        match value {
            RowValues::Blob(bytes) => Ok(bytes.clone()),
            RowValues::Text(s) => Ok(s.as_bytes().to_vec()),
            RowValues::Null => Err(FieldError::UnexpectedNull),
            other => Err(mismatch::<Vec<u8>>(other)),
        }
    }
}

impl FromRowValue for NaiveDateTime {
    fn from_row_value(value: &RowValues) -> Result<Self, FieldError> {
        if value.is_null() {
            return Err(FieldError::UnexpectedNull);
        }
        value.as_timestamp().ok_or_else(|| match value {
            RowValues::Text(s) => FieldError::Parse(format!("{s:?} is not a timestamp")),
            other => mismatch::<NaiveDateTime>(other),
        })
    }
}

impl FromRowValue for JsonValue {
    fn from_row_value(value: &RowValues) -> Result<Self, FieldError> {
        match value {
            RowValues::JSON(j) => Ok(j.clone()),
            RowValues::Text(s) => serde_json::from_str(s)
                .map_err(|e| FieldError::Parse(format!("invalid json: {e}"))),
            RowValues::Int(i) => Ok(JsonValue::from(*i)),
            RowValues::Float(f) => Ok(JsonValue::from(*f)),
            RowValues::Bool(b) => Ok(JsonValue::from(*b)),
            RowValues::Null => Err(FieldError::UnexpectedNull),
            other => Err(mismatch::<JsonValue>(other)),
        }
    }
}

impl<T: FromRowValue> FromRowValue for Option<T> {
    fn from_row_value(value: &RowValues) -> Result<Self, FieldError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_row_value(value).map(Some)
        }
    }
}

impl FromRowValue for RowValues {
    fn from_row_value(value: &RowValues) -> Result<Self, FieldError> {
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_range_checked() {
        assert_eq!(i32::from_row_value(&RowValues::Int(42)).unwrap(), 42);
        assert!(matches!(
            u8::from_row_value(&RowValues::Int(300)),
            Err(FieldError::OutOfRange { value: 300, .. })
        ));
        assert_eq!(i64::from_row_value(&RowValues::Text(" 7 ".into())).unwrap(), 7);
        assert_eq!(i64::from_row_value(&RowValues::Float(3.0)).unwrap(), 3);
        assert!(i64::from_row_value(&RowValues::Float(3.5)).is_err());
    }

    #[test]
    fn null_only_fits_option() {
        assert!(matches!(
            String::from_row_value(&RowValues::Null),
            Err(FieldError::UnexpectedNull)
        ));
        assert_eq!(Option::<String>::from_row_value(&RowValues::Null).unwrap(), None);
        assert_eq!(
            Option::<i64>::from_row_value(&RowValues::Int(5)).unwrap(),
            Some(5)
        );
    }

    #[test]
    fn sqlite_style_values_convert() {
        // sqlite hands back booleans as integers and timestamps as text
        assert!(bool::from_row_value(&RowValues::Int(1)).unwrap());
        assert!(bool::from_row_value(&RowValues::Int(2)).is_err());

        let ts = NaiveDateTime::from_row_value(&RowValues::Text("2024-01-02 03:04:05.123".into()))
            .unwrap();
        assert_eq!(ts.format("%F %T%.3f").to_string(), "2024-01-02 03:04:05.123");

        let json = JsonValue::from_row_value(&RowValues::Text(r#"{"a":1}"#.into())).unwrap();
        assert_eq!(json["a"], 1);
    }

    #[test]
    fn blob_into_string_requires_utf8() {
        assert_eq!(
            String::from_row_value(&RowValues::Blob(b"abc".to_vec())).unwrap(),
            "abc"
        );
        assert!(String::from_row_value(&RowValues::Blob(vec![0xff, 0xfe])).is_err());
    }
}
