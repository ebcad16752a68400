//! SQLite Storage Implementation
//!
//! Drives a single sqlx `SqliteConnection` from a private current-thread
//! tokio runtime so the rest of the crate stays synchronous. Must not be
//! used from inside another tokio runtime.

use std::str::FromStr;

use indexmap::IndexMap;
use serde_json::{Number, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Row as _, Sqlite, TypeInfo, ValueRef};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::backends::core::{ColumnInfo, Row, Storage, StorageError};
use crate::config::SessionConfig;
use crate::error::OrmResult;

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Storage backed by one SQLite connection
pub struct SqliteStorage {
    runtime: Runtime,
    conn: SqliteConnection,
    last_insert_id: Option<i64>,
    in_transaction: bool,
}

impl SqliteStorage {
    /// Open a connection to `url` (`sqlite::memory:`, `sqlite://path.db`, ...)
    pub fn connect(url: &str) -> Result<Self, StorageError> {
        Self::open(url, true, true)
    }

    /// Private in-memory database, alive as long as this storage
    pub fn memory() -> Result<Self, StorageError> {
        Self::connect("sqlite::memory:")
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, StorageError> {
        Self::open(&config.database_url, config.create_if_missing, config.foreign_keys)
    }

    fn open(url: &str, create_if_missing: bool, foreign_keys: bool) -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::ConnectionFailed(format!("Invalid database url '{}': {}", url, e)))?
            .create_if_missing(create_if_missing)
            .foreign_keys(foreign_keys);

        let conn = runtime
            .block_on(SqliteConnection::connect_with(&options))
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("Opened SQLite connection to {}", url);

        Ok(Self {
            runtime,
            conn,
            last_insert_id: None,
            in_transaction: false,
        })
    }

    fn run(&mut self, sql: &str) -> Result<(), StorageError> {
        self.runtime.block_on(sqlx::query(sql).execute(&mut self.conn))?;
        Ok(())
    }

    fn unique_columns(&mut self, table: &str) -> OrmResult<Vec<String>> {
        let indexes = self.execute_read(&format!("PRAGMA index_list({})", quote(table)), &[])?;
        let mut unique = Vec::new();
        for index in indexes {
            if index.try_get::<i64>("unique")? != 1 {
                continue;
            }
            let name: String = index.try_get("name")?;
            let columns = self.execute_read(&format!("PRAGMA index_info({})", quote(&name)), &[])?;
            if let [column] = columns.as_slice() {
                unique.push(column.try_get::<String>("name")?);
            }
        }
        Ok(unique)
    }
}

impl Storage for SqliteStorage {
    fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        let query = params.iter().fold(sqlx::query(sql), bind_value);
        let result = self
            .runtime
            .block_on(query.execute(&mut self.conn))
            .map_err(StorageError::from)?;
        self.last_insert_id = Some(result.last_insert_rowid());
        Ok(result.rows_affected())
    }

    fn execute_read(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        let query = params.iter().fold(sqlx::query(sql), bind_value);
        let rows = self
            .runtime
            .block_on(query.fetch_all(&mut self.conn))
            .map_err(StorageError::from)?;
        rows.iter()
            .map(|row| decode_row(row).map_err(Into::into))
            .collect()
    }

    fn last_insert_key(&mut self) -> OrmResult<Option<Value>> {
        Ok(self.last_insert_id.map(Value::from))
    }

    fn table_exists(&mut self, table: &str) -> OrmResult<bool> {
        let rows = self.execute_read(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
            &[Value::from(table)],
        )?;
        Ok(!rows.is_empty())
    }

    fn columns_of(&mut self, table: &str) -> OrmResult<Vec<ColumnInfo>> {
        let rows = self.execute_read(&format!("PRAGMA table_info({})", quote(table)), &[])?;
        let unique = self.unique_columns(table)?;

        rows.into_iter()
            .map(|row| -> OrmResult<ColumnInfo> {
                let name: String = row.try_get("name")?;
                let default = match row.get("dflt_value") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(text)) => Some(text.clone()),
                    Some(other) => Some(other.to_string()),
                };
                Ok(ColumnInfo {
                    is_unique: unique.contains(&name),
                    data_type: row.try_get("type")?,
                    nullable: row.try_get::<i64>("notnull")? == 0,
                    default,
                    is_primary: row.try_get::<i64>("pk")? > 0,
                    name,
                })
            })
            .collect()
    }

    fn begin(&mut self) -> OrmResult<()> {
        if self.in_transaction {
            return Err(StorageError::TransactionState {
                message: "a transaction is already open".to_string(),
            }
            .into());
        }
        self.run("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> OrmResult<()> {
        if !self.in_transaction {
            return Err(StorageError::TransactionState {
                message: "commit without an open transaction".to_string(),
            }
            .into());
        }
        self.in_transaction = false;
        self.run("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> OrmResult<()> {
        if !self.in_transaction {
            return Err(StorageError::TransactionState {
                message: "rollback without an open transaction".to_string(),
            }
            .into());
        }
        self.in_transaction = false;
        self.run("ROLLBACK")?;
        Ok(())
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Bind a JSON value as the closest SQLite type
fn bind_value<'q>(query: SqliteQuery<'q>, value: &'q Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.to_string()),
    }
}

fn decode_row(row: &SqliteRow) -> Result<Row, StorageError> {
    let mut values = IndexMap::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        values.insert(column.name().to_string(), decode_value(row, index)?);
    }
    Ok(Row::new(values))
}

/// Decode by the stored value's runtime type, not the declared column type
fn decode_value(row: &SqliteRow, index: usize) -> Result<Value, StorageError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => Value::from(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" | "NUMERIC" => {
            let float = row.try_get_unchecked::<f64, _>(index)?;
            Number::from_f64(float).map(Value::Number).unwrap_or(Value::Null)
        }
        "BLOB" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
            Value::Array(bytes.into_iter().map(Value::from).collect())
        }
        "TEXT" | "DATE" | "TIME" | "DATETIME" => Value::String(row.try_get_unchecked::<String, _>(index)?),
        other => {
            return Err(StorageError::UnsupportedValue {
                column: row.columns()[index].name().to_string(),
                type_name: other.to_string(),
            })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn storage() -> SqliteStorage {
        let mut storage = SqliteStorage::memory().unwrap();
        storage
            .execute(
                "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE, price REAL, data BLOB)",
                &[],
            )
            .unwrap();
        storage
    }

    #[test]
    fn test_execute_and_read_back() {
        let mut storage = storage();
        let affected = storage
            .execute("INSERT INTO items (name, price) VALUES (?, ?)", &[json!("pen"), json!(1.5)])
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(storage.last_insert_key().unwrap(), Some(json!(1)));

        let rows = storage.execute_read("SELECT id, name, price, data FROM items", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&json!(1)));
        assert_eq!(rows[0].get("name"), Some(&json!("pen")));
        assert_eq!(rows[0].get("price"), Some(&json!(1.5)));
        assert_eq!(rows[0].get("data"), Some(&Value::Null));
    }

    #[test]
    fn test_bool_binds_as_integer() {
        let mut storage = storage();
        storage
            .execute("INSERT INTO items (name, data) VALUES (?, ?)", &[json!("flag"), json!(true)])
            .unwrap();
        let rows = storage.execute_read("SELECT data FROM items", &[]).unwrap();
        assert_eq!(rows[0].get("data"), Some(&json!(1)));
    }

    #[test]
    fn test_introspection() {
        let mut storage = storage();
        assert!(storage.table_exists("items").unwrap());
        assert!(!storage.table_exists("missing").unwrap());

        let columns = storage.columns_of("items").unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "price", "data"]);
        assert!(columns[0].is_primary);
        assert!(!columns[1].nullable);
        assert!(columns[1].is_unique);
        assert_eq!(columns[2].data_type, "REAL");
    }

    #[test]
    fn test_transaction_state() {
        let mut storage = storage();
        assert!(storage.commit().is_err());

        storage.begin().unwrap();
        assert!(storage.begin().is_err());
        storage
            .execute("INSERT INTO items (name) VALUES (?)", &[json!("gone")])
            .unwrap();
        storage.rollback().unwrap();

        let rows = storage.execute_read("SELECT * FROM items", &[]).unwrap();
        assert!(rows.is_empty());
    }
}
