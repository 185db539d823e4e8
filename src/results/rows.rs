use std::collections::HashMap;
use std::sync::Arc;

use super::value::{FromSqlValue, SqlValue};

/// Column header shared by every row of one result set.
///
/// Built once per statement; rows hold an `Arc` to it instead of carrying
/// their own name lists and lookup tables.
#[derive(Debug)]
pub struct ColumnSet {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColumnSet {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let positions = names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index))
            .collect();
        Self { names, positions }
    }

    /// Index of `name`, if the statement produced such a column.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One row of a result set.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<ColumnSet>,
    values: Vec<SqlValue>,
}

impl Row {
    #[must_use]
    pub fn new(columns: Arc<ColumnSet>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    #[must_use]
    pub fn columns(&self) -> &Arc<ColumnSet> {
        &self.columns
    }

    /// The raw value under `column`, if present.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .position(column)
            .and_then(|index| self.values.get(index))
    }

    /// The raw value at `index`, if within the row's width.
    #[must_use]
    pub fn value_at(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Typed extraction of `column` through [`FromSqlValue`].
    #[must_use]
    pub fn read<T: FromSqlValue>(&self, column: &str) -> Option<T> {
        self.value(column).and_then(T::from_sql)
    }

    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

/// What one statement produced: rows for queries, an affected count for DML.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Option<Arc<ColumnSet>>,
    /// The rows returned by the query
    pub rows: Vec<Row>,
    /// The number of rows affected (for DML statements)
    pub rows_affected: u64,
}

impl ResultSet {
    /// Result set with no header; rows cannot be appended to it.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Row-bearing result set for a statement producing `names` columns.
    #[must_use]
    pub fn for_columns(names: Vec<String>) -> Self {
        Self {
            columns: Some(Arc::new(ColumnSet::new(names))),
            rows: Vec::new(),
            rows_affected: 0,
        }
    }

    /// Result set for a DML statement that produced no rows.
    #[must_use]
    pub fn from_rows_affected(rows_affected: u64) -> Self {
        Self {
            columns: None,
            rows: Vec::new(),
            rows_affected,
        }
    }

    #[must_use]
    pub fn columns(&self) -> Option<&Arc<ColumnSet>> {
        self.columns.as_ref()
    }

    /// Append a row from raw values, sharing the header. Ignored when the
    /// result set has no header.
    pub fn push_values(&mut self, values: Vec<SqlValue>) {
        if let Some(columns) = &self.columns {
            self.rows.push(Row::new(Arc::clone(columns), values));
        }
    }

    /// Append a pre-built row, adopting its header if none is set yet.
    pub fn push_row(&mut self, row: Row) {
        if self.columns.is_none() {
            self.columns = Some(Arc::clone(row.columns()));
        }
        self.rows.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
