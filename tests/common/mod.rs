#![allow(dead_code)]

use std::sync::Arc;

use sql_affinity::prelude::*;
use sql_affinity::sqlite::SqliteSource;

pub const USERS_DDL: &str = "CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL,
    email TEXT,
    deactivated INTEGER NOT NULL DEFAULT 0,
    created TEXT
)";

/// Record over the `users` table, flags managed with `ChangeFlags`.
pub struct UserRecord {
    pub id: Option<i64>,
    pub username: String,
    pub email: Option<String>,
    pub deactivated: bool,
    pub created: Option<String>,
    changed: ChangeFlags,
}

impl UserRecord {
    /// Record with an explicit id; every column marked changed.
    pub fn new(id: i64, username: &str, email: Option<&str>) -> Self {
        Self {
            id: Some(id),
            username: username.to_owned(),
            email: email.map(str::to_owned),
            deactivated: false,
            created: Some("2026-01-01 00:00:00".to_owned()),
            changed: ChangeFlags::dirty(5),
        }
    }

    /// Record without an id, letting the database generate one.
    pub fn generated(username: &str, email: Option<&str>) -> Self {
        let mut record = Self::new(0, username, email);
        record.id = None;
        record.changed.set(0, false);
        record
    }

    pub fn set_username(&mut self, username: &str) {
        self.username = username.to_owned();
        self.changed.set(1, true);
    }
}

impl TableRecord for UserRecord {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::key("id"),
        ColumnDef::required("username"),
        ColumnDef::nullable("email"),
        ColumnDef::required("deactivated"),
        ColumnDef::nullable("created"),
    ];

    fn value(&self, index: usize) -> SqlValue {
        match index {
            0 => self.id.map_or(SqlValue::Null, SqlValue::Int),
            1 => SqlValue::Text(self.username.clone()),
            2 => self.email.clone().map_or(SqlValue::Null, SqlValue::Text),
            3 => SqlValue::Bool(self.deactivated),
            4 => self.created.clone().map_or(SqlValue::Null, SqlValue::Text),
            _ => SqlValue::Null,
        }
    }

    fn set_value(&mut self, index: usize, value: SqlValue) -> Result<(), DbError> {
        match index {
            0 => self.id = value.read::<i64>(),
            1 => {
                if let Some(text) = value.text() {
                    self.username = text.to_owned();
                }
            }
            2 => self.email = value.text().map(str::to_owned),
            3 => self.deactivated = value.read::<bool>().unwrap_or(false),
            4 => self.created = value.text().map(str::to_owned),
            _ => {
                return Err(DbError::Execution(format!(
                    "users has no column at index {index}"
                )))
            }
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

/// Fresh file-backed database plus a transaction manager over it.
pub fn setup_manager(
    pool_size: usize,
) -> (tempfile::TempDir, TransactionManager<SqliteSource>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir
        .path()
        .join("affinity-test.db")
        .to_string_lossy()
        .into_owned();
    let source = Arc::new(SqliteSource::builder(db_path).build());
    let dispatcher = Arc::new(
        DispatcherSettings::builder()
            .pool_size(pool_size)
            .finish()
            .build_dispatcher("test-db"),
    );
    (dir, TransactionManager::new(source, dispatcher))
}

pub async fn create_users_table(manager: &TransactionManager<SqliteSource>) {
    manager
        .transaction(TransactionOptions::default(), |tx| async move {
            tx.execute(USERS_DDL, vec![]).await
        })
        .await
        .expect("create users table");
}

pub async fn user_exists(manager: &TransactionManager<SqliteSource>, id: i64) -> bool {
    manager
        .transaction(TransactionOptions::default(), |tx| async move {
            let rows = tx
                .query(
                    "SELECT COUNT(*) AS cnt FROM users WHERE id = ?",
                    vec![SqlValue::Int(id)],
                )
                .await?;
            Ok(rows.first()?.read::<i64>("cnt").unwrap_or(0))
        })
        .await
        .expect("exists query")
        > 0
}

pub async fn user_count(manager: &TransactionManager<SqliteSource>) -> i64 {
    manager
        .transaction(TransactionOptions::default(), |tx| async move {
            let rows = tx.query("SELECT COUNT(*) AS cnt FROM users", vec![]).await?;
            Ok(rows.first()?.read::<i64>("cnt").unwrap_or(0))
        })
        .await
        .expect("count query")
}
