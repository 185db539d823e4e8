//! Conversions between the crate's SQL values and rusqlite's.
//!
//! Both directions are `From` impls so call sites bind and decode through
//! the standard conversion traits instead of a bespoke parameter type.

use crate::results::SqlValue;

impl From<&SqlValue> for rusqlite::types::Value {
    fn from(value: &SqlValue) -> Self {
        use rusqlite::types::Value;
        match value {
            SqlValue::Null => Value::Null,
            // SQLite has no boolean affinity; 0/1 round-trips.
            SqlValue::Bool(flag) => Value::Integer(i64::from(*flag)),
            SqlValue::Int(number) => Value::Integer(*number),
            SqlValue::Float(number) => Value::Real(*number),
            SqlValue::Text(text) => Value::Text(text.clone()),
            // Textual timestamps; the fractional spelling is what
            // FromSqlValue parses back first.
            SqlValue::Timestamp(stamp) => {
                Value::Text(stamp.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
        }
    }
}

impl From<rusqlite::types::ValueRef<'_>> for SqlValue {
    fn from(value: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(number) => SqlValue::Int(number),
            ValueRef::Real(number) => SqlValue::Float(number),
            ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
        }
    }
}

/// Convert a parameter slice for binding.
pub(crate) fn bind_values(params: &[SqlValue]) -> Vec<rusqlite::types::Value> {
    params.iter().map(rusqlite::types::Value::from).collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use rusqlite::types::Value;

    use super::*;

    #[test]
    fn booleans_bind_as_integers() {
        assert_eq!(Value::from(&SqlValue::Bool(true)), Value::Integer(1));
        assert_eq!(Value::from(&SqlValue::Bool(false)), Value::Integer(0));
    }

    #[test]
    fn timestamps_bind_as_text_that_reads_back() {
        let stamp =
            NaiveDateTime::parse_from_str("2026-03-04 05:06:07.250", "%Y-%m-%d %H:%M:%S%.f")
                .expect("stamp");
        let text = match Value::from(&SqlValue::Timestamp(stamp)) {
            Value::Text(text) => text,
            other => panic!("timestamps must bind as text, got {other:?}"),
        };
        let read_back = SqlValue::Text(text).read::<NaiveDateTime>().expect("parse");
        assert_eq!(read_back, stamp);
    }
}
