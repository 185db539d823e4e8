use std::hash::{Hash, Hasher};
use std::mem;

use chrono::NaiveDateTime;

/// Timestamps travel as text through drivers without a native type; parsing
/// tries the fractional spelling first since that is what the crate writes.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// A dynamically typed SQL value, bound as a parameter or read from a row.
///
/// Typed extraction goes through [`FromSqlValue`], which also carries the
/// lossless coercions drivers rely on (integer-encoded booleans, textual
/// timestamps):
/// ```rust
/// use sql_affinity::results::SqlValue;
///
/// assert_eq!(SqlValue::Int(0).read::<bool>(), Some(false));
/// assert_eq!(SqlValue::Text("7".into()).read::<i64>(), None);
/// assert!(SqlValue::Null.is_null());
/// ```
#[derive(Debug, Clone)]
pub enum SqlValue {
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
    /// Binary data
    Blob(Vec<u8>),
}

impl SqlValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Extract the value as `T`, applying `T`'s coercion rules.
    #[must_use]
    pub fn read<T: FromSqlValue>(&self) -> Option<T> {
        T::from_sql(self)
    }

    /// Borrow the text content without copying.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Borrow the binary content without copying.
    #[must_use]
    pub fn blob(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }
}

// Floats compare and hash by bit pattern so values can key maps and sets
// (the map/set result adaptors require Eq + Hash).
impl PartialEq for SqlValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SqlValue::Int(a), SqlValue::Int(b)) => a == b,
            (SqlValue::Float(a), SqlValue::Float(b)) => a.to_bits() == b.to_bits(),
            (SqlValue::Text(a), SqlValue::Text(b)) => a == b,
            (SqlValue::Bool(a), SqlValue::Bool(b)) => a == b,
            (SqlValue::Timestamp(a), SqlValue::Timestamp(b)) => a == b,
            (SqlValue::Null, SqlValue::Null) => true,
            (SqlValue::Blob(a), SqlValue::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SqlValue {}

impl Hash for SqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            SqlValue::Int(v) => v.hash(state),
            SqlValue::Float(v) => v.to_bits().hash(state),
            SqlValue::Text(v) => v.hash(state),
            SqlValue::Bool(v) => v.hash(state),
            SqlValue::Timestamp(v) => v.hash(state),
            SqlValue::Null => {}
            SqlValue::Blob(v) => v.hash(state),
        }
    }
}

/// Typed extraction from a [`SqlValue`].
///
/// Implementations decide which coercions they accept; `from_sql` returns
/// `None` for a value the target type cannot represent, NULL included.
pub trait FromSqlValue: Sized {
    fn from_sql(value: &SqlValue) -> Option<Self>;
}

impl FromSqlValue for i64 {
    fn from_sql(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Int(number) => Some(*number),
            _ => None,
        }
    }
}

impl FromSqlValue for f64 {
    fn from_sql(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Float(number) => Some(*number),
            // Integers widen losslessly up to 2^53.
            SqlValue::Int(number) => Some(*number as f64),
            _ => None,
        }
    }
}

impl FromSqlValue for bool {
    fn from_sql(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Bool(flag) => Some(*flag),
            // Drivers without a boolean type round-trip through 0/1.
            SqlValue::Int(0) => Some(false),
            SqlValue::Int(1) => Some(true),
            _ => None,
        }
    }
}

impl FromSqlValue for String {
    fn from_sql(value: &SqlValue) -> Option<Self> {
        value.text().map(str::to_owned)
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql(value: &SqlValue) -> Option<Self> {
        value.blob().map(<[u8]>::to_vec)
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Timestamp(stamp) => Some(*stamp),
            SqlValue::Text(text) => TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok()),
            _ => None,
        }
    }
}
