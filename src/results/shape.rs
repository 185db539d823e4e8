//! Cardinality and shape adaptors over [`ResultSet`].

use std::collections::{HashMap, HashSet};

use super::rows::{ResultSet, Row};
use super::value::SqlValue;
use crate::error::DbError;

impl ResultSet {
    /// First row of the result.
    ///
    /// # Errors
    /// Returns `DbError::NoRecordsMatch` when the result is empty.
    pub fn first(&self) -> Result<&Row, DbError> {
        self.rows.first().ok_or(DbError::NoRecordsMatch)
    }

    /// First row of the result, if any.
    #[must_use]
    pub fn first_opt(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// The single row of the result.
    ///
    /// # Errors
    /// Returns `DbError::MoreThanOneRecord` when a second row exists and
    /// `DbError::NoRecordsMatch` when the result is empty.
    pub fn single(&self) -> Result<&Row, DbError> {
        match self.rows.len() {
            0 => Err(DbError::NoRecordsMatch),
            1 => Ok(&self.rows[0]),
            _ => Err(DbError::MoreThanOneRecord),
        }
    }

    /// The single row of the result, or `None` when empty.
    ///
    /// A second row is still a cardinality violation.
    ///
    /// # Errors
    /// Returns `DbError::MoreThanOneRecord` when a second row exists.
    pub fn single_opt(&self) -> Result<Option<&Row>, DbError> {
        match self.rows.len() {
            0 => Ok(None),
            1 => Ok(Some(&self.rows[0])),
            _ => Err(DbError::MoreThanOneRecord),
        }
    }

    /// Consume the result set into its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Consume the result set into a map keyed by `key_column`.
    ///
    /// # Errors
    /// Returns `DbError::Execution` when the column is missing or a key is
    /// duplicated, and `DbError::UnexpectedNullField` for a NULL key.
    pub fn into_map(self, key_column: &str) -> Result<HashMap<SqlValue, Row>, DbError> {
        let mut map = HashMap::with_capacity(self.rows.len());
        for row in self.rows {
            let key = row
                .value(key_column)
                .ok_or_else(|| {
                    DbError::Execution(format!("result has no column named {key_column}"))
                })?
                .clone();
            if key.is_null() {
                return Err(DbError::UnexpectedNullField(key_column.to_string()));
            }
            if map.insert(key, row).is_some() {
                return Err(DbError::Execution(format!(
                    "duplicate key in column {key_column} while building a map"
                )));
            }
        }
        Ok(map)
    }

    /// Consume the result set into the set of values in `column`.
    ///
    /// # Errors
    /// Returns `DbError::Execution` when the column is missing and
    /// `DbError::UnexpectedNullField` for a NULL value.
    pub fn into_set(self, column: &str) -> Result<HashSet<SqlValue>, DbError> {
        let mut set = HashSet::with_capacity(self.rows.len());
        for row in &self.rows {
            let value = row
                .value(column)
                .ok_or_else(|| DbError::Execution(format!("result has no column named {column}")))?
                .clone();
            if value.is_null() {
                return Err(DbError::UnexpectedNullField(column.to_string()));
            }
            set.insert(value);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_set(rows: &[&[SqlValue]]) -> ResultSet {
        let mut rs = ResultSet::for_columns(vec!["id".into(), "name".into()]);
        for row in rows {
            rs.push_values(row.to_vec());
        }
        rs
    }

    #[test]
    fn single_enforces_cardinality_with_exact_messages() {
        let empty = result_set(&[]);
        assert_eq!(
            empty.single().unwrap_err().to_string(),
            "No records match the condition"
        );
        assert!(matches!(empty.single_opt(), Ok(None)));

        let two = result_set(&[
            &[SqlValue::Int(1), SqlValue::Text("a".into())],
            &[SqlValue::Int(2), SqlValue::Text("b".into())],
        ]);
        assert_eq!(
            two.single().unwrap_err().to_string(),
            "More than one record match the condition"
        );
        assert!(matches!(two.single_opt(), Err(DbError::MoreThanOneRecord)));

        let one = result_set(&[&[SqlValue::Int(1), SqlValue::Text("a".into())]]);
        assert_eq!(one.single().unwrap().read::<i64>("id"), Some(1));
    }

    #[test]
    fn into_map_rejects_null_and_duplicate_keys() {
        let with_null = result_set(&[&[SqlValue::Null, SqlValue::Text("a".into())]]);
        assert!(matches!(
            with_null.into_map("id"),
            Err(DbError::UnexpectedNullField(field)) if field == "id"
        ));

        let duplicated = result_set(&[
            &[SqlValue::Int(1), SqlValue::Text("a".into())],
            &[SqlValue::Int(1), SqlValue::Text("b".into())],
        ]);
        assert!(matches!(
            duplicated.into_map("id"),
            Err(DbError::Execution(_))
        ));

        let ok = result_set(&[
            &[SqlValue::Int(1), SqlValue::Text("a".into())],
            &[SqlValue::Int(2), SqlValue::Text("b".into())],
        ]);
        let map = ok.into_map("id").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get(&SqlValue::Int(2)).and_then(|row| row.value("name")),
            Some(&SqlValue::Text("b".into()))
        );
    }

    #[test]
    fn into_set_collects_distinct_values() {
        let rs = result_set(&[
            &[SqlValue::Int(1), SqlValue::Text("a".into())],
            &[SqlValue::Int(2), SqlValue::Text("a".into())],
        ]);
        let set = rs.into_set("name").unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains(&SqlValue::Text("a".into())));
    }
}
