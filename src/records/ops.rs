//! SQL assembly for the record helpers.
//!
//! Statements use `?` placeholders and rely on `RETURNING *` for insert
//! copy-back, which both the reference SQLite source and the other
//! RETURNING-capable drivers understand.

use crate::error::DbError;
use crate::results::{Row, SqlValue};

use super::TableRecord;

pub(crate) struct SqlPlan {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

pub(crate) fn changed_indexes<R: TableRecord>(record: &R) -> Vec<usize> {
    (0..R::COLUMNS.len())
        .filter(|&index| record.is_changed(index))
        .collect()
}

pub(crate) fn primary_key_indexes<R: TableRecord>() -> Vec<usize> {
    R::COLUMNS
        .iter()
        .enumerate()
        .filter(|(_, column)| column.primary_key)
        .map(|(index, _)| index)
        .collect()
}

/// `store` inserts when any primary-key field is either marked changed or is
/// NULL in a non-nullable column; otherwise it updates.
pub(crate) fn needs_insert<R: TableRecord>(record: &R) -> bool {
    primary_key_indexes::<R>().into_iter().any(|index| {
        record.is_changed(index)
            || (record.value(index).is_null() && !R::COLUMNS[index].nullable)
    })
}

pub(crate) fn insert_plan<R: TableRecord>(
    record: &R,
    on_conflict_do_nothing: bool,
) -> Option<SqlPlan> {
    let changed = changed_indexes(record);
    if changed.is_empty() {
        return None;
    }
    let columns: Vec<&str> = changed.iter().map(|&index| R::COLUMNS[index].name).collect();
    let placeholders = vec!["?"; changed.len()].join(", ");
    let conflict_clause = if on_conflict_do_nothing {
        " ON CONFLICT DO NOTHING"
    } else {
        ""
    };
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders}){conflict_clause} RETURNING *",
        R::TABLE,
        columns.join(", "),
    );
    let params = changed.iter().map(|&index| record.value(index)).collect();
    Some(SqlPlan { sql, params })
}

/// Multi-row insert over the union of changed columns across all records.
pub(crate) fn insert_all_plan<R: TableRecord>(records: &[R]) -> Option<SqlPlan> {
    let mut union: Vec<usize> = Vec::new();
    for index in 0..R::COLUMNS.len() {
        if records.iter().any(|record| record.is_changed(index)) {
            union.push(index);
        }
    }
    if union.is_empty() {
        return None;
    }
    let columns: Vec<&str> = union.iter().map(|&index| R::COLUMNS[index].name).collect();
    let row_placeholders = format!("({})", vec!["?"; union.len()].join(", "));
    let all_placeholders = vec![row_placeholders.as_str(); records.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES {all_placeholders} RETURNING *",
        R::TABLE,
        columns.join(", "),
    );
    let mut params = Vec::with_capacity(union.len() * records.len());
    for record in records {
        for &index in &union {
            params.push(record.value(index));
        }
    }
    Some(SqlPlan { sql, params })
}

/// `UPDATE .. SET <changed> WHERE <primary key>`, or `None` when nothing
/// changed.
///
/// # Errors
/// Returns `DbError::Execution` when the table declares no primary key.
pub(crate) fn update_plan<R: TableRecord>(record: &R) -> Result<Option<SqlPlan>, DbError> {
    let changed = changed_indexes(record);
    if changed.is_empty() {
        return Ok(None);
    }
    let keys = primary_key_indexes::<R>();
    if keys.is_empty() {
        return Err(DbError::Execution(format!(
            "table {} has no primary key to target",
            R::TABLE
        )));
    }
    let assignments: Vec<String> = changed
        .iter()
        .map(|&index| format!("{} = ?", R::COLUMNS[index].name))
        .collect();
    let predicate: Vec<String> = keys
        .iter()
        .map(|&index| format!("{} = ?", R::COLUMNS[index].name))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        R::TABLE,
        assignments.join(", "),
        predicate.join(" AND "),
    );
    let mut params: Vec<SqlValue> = changed.iter().map(|&index| record.value(index)).collect();
    params.extend(keys.iter().map(|&index| record.value(index)));
    Ok(Some(SqlPlan { sql, params }))
}

/// `DELETE .. WHERE (pk) OR (pk) ..` over each record's key conjunction.
///
/// # Errors
/// Returns `DbError::Execution` when the table declares no primary key.
pub(crate) fn delete_plan<R: TableRecord>(records: &[R]) -> Result<Option<SqlPlan>, DbError> {
    if records.is_empty() {
        return Ok(None);
    }
    let keys = primary_key_indexes::<R>();
    if keys.is_empty() {
        return Err(DbError::Execution(format!(
            "table {} has no primary key to target",
            R::TABLE
        )));
    }
    let conjunction = keys
        .iter()
        .map(|&index| format!("{} = ?", R::COLUMNS[index].name))
        .collect::<Vec<_>>()
        .join(" AND ");
    let predicate = vec![format!("({conjunction})"); records.len()].join(" OR ");
    let sql = format!("DELETE FROM {} WHERE {predicate}", R::TABLE);
    let mut params = Vec::with_capacity(keys.len() * records.len());
    for record in records {
        for &index in &keys {
            params.push(record.value(index));
        }
    }
    Ok(Some(SqlPlan { sql, params }))
}

pub(crate) fn count_plan(
    table: &str,
    filter: Option<(&str, Vec<SqlValue>)>,
    group_by: &str,
) -> SqlPlan {
    let (where_clause, params) = match filter {
        Some((predicate, params)) => (format!(" WHERE {predicate}"), params),
        None => (String::new(), Vec::new()),
    };
    SqlPlan {
        sql: format!(
            "SELECT {group_by}, COUNT(*) FROM {table}{where_clause} GROUP BY {group_by}"
        ),
        params,
    }
}

/// Copy a server-returned row into the record and clear all changed flags.
pub(crate) fn copy_back<R: TableRecord>(record: &mut R, row: &Row) -> Result<(), DbError> {
    for (index, column) in R::COLUMNS.iter().enumerate() {
        if let Some(value) = row.value(column.name) {
            record.set_value(index, value.clone())?;
        }
    }
    clear_changed(record);
    Ok(())
}

pub(crate) fn clear_changed<R: TableRecord>(record: &mut R) {
    for index in 0..R::COLUMNS.len() {
        record.set_changed(index, false);
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ChangeFlags, ColumnDef};
    use super::*;

    struct Pair {
        org: i64,
        id: i64,
        note: Option<String>,
        changed: ChangeFlags,
    }

    impl Pair {
        fn new(org: i64, id: i64, note: Option<&str>) -> Self {
            Self {
                org,
                id,
                note: note.map(str::to_owned),
                changed: ChangeFlags::dirty(3),
            }
        }
    }

    impl TableRecord for Pair {
        const TABLE: &'static str = "pairs";
        const COLUMNS: &'static [ColumnDef] = &[
            ColumnDef::key("org"),
            ColumnDef::key("id"),
            ColumnDef::nullable("note"),
        ];

        fn value(&self, index: usize) -> SqlValue {
            match index {
                0 => SqlValue::Int(self.org),
                1 => SqlValue::Int(self.id),
                2 => self
                    .note
                    .clone()
                    .map_or(SqlValue::Null, SqlValue::Text),
                _ => SqlValue::Null,
            }
        }

        fn set_value(&mut self, index: usize, value: SqlValue) -> Result<(), DbError> {
            match index {
                0 => self.org = value.read::<i64>().unwrap_or(0),
                1 => self.id = value.read::<i64>().unwrap_or(0),
                2 => self.note = value.text().map(str::to_owned),
                _ => return Err(DbError::Execution("column index out of range".into())),
            }
            Ok(())
        }

        fn is_changed(&self, index: usize) -> bool {
            self.changed.is_set(index)
        }

        fn set_changed(&mut self, index: usize, changed: bool) {
            self.changed.set(index, changed);
        }
    }

    #[test]
    fn insert_targets_only_changed_columns() {
        let mut record = Pair::new(1, 7, Some("hello"));
        record.set_changed(2, false);
        let plan = insert_plan(&record, false).unwrap();
        assert_eq!(
            plan.sql,
            "INSERT INTO pairs (org, id) VALUES (?, ?) RETURNING *"
        );
        assert_eq!(plan.params, vec![SqlValue::Int(1), SqlValue::Int(7)]);

        let conflict = insert_plan(&record, true).unwrap();
        assert!(conflict.sql.contains("ON CONFLICT DO NOTHING RETURNING *"));
    }

    #[test]
    fn unchanged_records_produce_no_insert_plan() {
        let mut record = Pair::new(1, 7, None);
        clear_changed(&mut record);
        assert!(insert_plan(&record, false).is_none());
        assert!(update_plan(&record).unwrap().is_none());
    }

    #[test]
    fn update_composes_the_primary_key_in_declared_order() {
        let mut record = Pair::new(3, 9, Some("x"));
        record.set_changed(0, false);
        record.set_changed(1, false);
        let plan = update_plan(&record).unwrap().unwrap();
        assert_eq!(plan.sql, "UPDATE pairs SET note = ? WHERE org = ? AND id = ?");
        assert_eq!(
            plan.params,
            vec![SqlValue::Text("x".into()), SqlValue::Int(3), SqlValue::Int(9)]
        );
    }

    #[test]
    fn delete_ors_per_record_key_conjunctions() {
        let records = vec![Pair::new(1, 2, None), Pair::new(1, 3, None)];
        let plan = delete_plan(&records).unwrap().unwrap();
        assert_eq!(
            plan.sql,
            "DELETE FROM pairs WHERE (org = ? AND id = ?) OR (org = ? AND id = ?)"
        );
        assert_eq!(plan.params.len(), 4);
        assert!(delete_plan::<Pair>(&[]).unwrap().is_none());
    }

    #[test]
    fn store_decision_follows_key_state() {
        // Fresh record: keys marked changed -> insert.
        assert!(needs_insert(&Pair::new(1, 2, None)));

        // Keys clean and populated -> update.
        let mut stored = Pair::new(1, 2, None);
        clear_changed(&mut stored);
        assert!(!needs_insert(&stored));

        // A NULL non-nullable key forces an insert even when clean.
        struct NullKey;
        impl TableRecord for NullKey {
            const TABLE: &'static str = "t";
            const COLUMNS: &'static [ColumnDef] = &[ColumnDef::key("id")];
            fn value(&self, _index: usize) -> SqlValue {
                SqlValue::Null
            }
            fn set_value(&mut self, _index: usize, _value: SqlValue) -> Result<(), DbError> {
                Ok(())
            }
            fn is_changed(&self, _index: usize) -> bool {
                false
            }
            fn set_changed(&mut self, _index: usize, _changed: bool) {}
        }
        assert!(needs_insert(&NullKey));
    }

    #[test]
    fn count_plan_spells_out_the_group_by() {
        let plan = count_plan("users", Some(("active = ?", vec![SqlValue::Bool(true)])), "org");
        assert_eq!(
            plan.sql,
            "SELECT org, COUNT(*) FROM users WHERE active = ? GROUP BY org"
        );
        let bare = count_plan("users", None, "org");
        assert_eq!(bare.sql, "SELECT org, COUNT(*) FROM users GROUP BY org");
    }

    #[test]
    fn insert_all_uses_the_union_of_changed_columns() {
        let mut first = Pair::new(1, 2, None);
        first.set_changed(2, false);
        let second = Pair::new(1, 3, Some("note"));
        let plan = insert_all_plan(&[first, second]).unwrap();
        assert_eq!(
            plan.sql,
            "INSERT INTO pairs (org, id, note) VALUES (?, ?, ?), (?, ?, ?) RETURNING *"
        );
        assert_eq!(plan.params.len(), 6);
    }
}
