//! Core Storage Traits
//!
//! The storage collaborator the query engine talks to. Implementations run
//! one statement at a time against a single connection; parameters are
//! positional and bound in order.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ModelError, OrmResult};

/// Storage driver error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Statement failed: {0}")]
    StatementFailed(#[from] sqlx::Error),

    #[error("Runtime unavailable: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Unsupported value for column '{column}': {type_name}")]
    UnsupportedValue { column: String, type_name: String },

    #[error("Transaction state: {message}")]
    TransactionState { message: String },
}

impl From<StorageError> for ModelError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(msg) => ModelError::Connection(msg),
            StorageError::Runtime(io) => ModelError::Connection(io.to_string()),
            StorageError::StatementFailed(sqlx_err) => ModelError::Database(sqlx_err.to_string()),
            StorageError::UnsupportedValue { .. } => ModelError::Serialization(err.to_string()),
            StorageError::TransactionState { message } => ModelError::Transaction(message),
        }
    }
}

/// Column description returned by schema introspection
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub is_primary: bool,
    pub is_unique: bool,
}

/// A fetched row: column names in select order mapped to their values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: IndexMap<String, Value>,
}

impl Row {
    pub fn new(values: IndexMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Typed column access
    pub fn try_get<T: DeserializeOwned>(&self, column: &str) -> OrmResult<T> {
        let value = self
            .values
            .get(column)
            .cloned()
            .ok_or_else(|| ModelError::Schema(format!("Column '{}' not in row", column)))?;
        serde_json::from_value(value).map_err(|e| {
            ModelError::Serialization(format!("Failed to deserialize column '{}': {}", column, e))
        })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_map(self) -> IndexMap<String, Value> {
        self.values
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Synchronous storage collaborator
pub trait Storage {
    /// Run a write statement and return the affected row count
    fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<u64>;

    /// Run a read statement and return every row
    fn execute_read(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>>;

    /// Run one statement once per parameter row
    fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> OrmResult<u64> {
        let mut affected = 0;
        for params in rows {
            affected += self.execute(sql, params)?;
        }
        Ok(affected)
    }

    /// Key generated by the last INSERT
    fn last_insert_key(&mut self) -> OrmResult<Option<Value>>;

    fn table_exists(&mut self, table: &str) -> OrmResult<bool>;

    fn columns_of(&mut self, table: &str) -> OrmResult<Vec<ColumnInfo>>;

    fn begin(&mut self) -> OrmResult<()>;

    fn commit(&mut self) -> OrmResult<()>;

    fn rollback(&mut self) -> OrmResult<()>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        (**self).execute(sql, params)
    }

    fn execute_read(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        (**self).execute_read(sql, params)
    }

    fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> OrmResult<u64> {
        (**self).execute_many(sql, rows)
    }

    fn last_insert_key(&mut self) -> OrmResult<Option<Value>> {
        (**self).last_insert_key()
    }

    fn table_exists(&mut self, table: &str) -> OrmResult<bool> {
        (**self).table_exists(table)
    }

    fn columns_of(&mut self, table: &str) -> OrmResult<Vec<ColumnInfo>> {
        (**self).columns_of(table)
    }

    fn begin(&mut self) -> OrmResult<()> {
        (**self).begin()
    }

    fn commit(&mut self) -> OrmResult<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> OrmResult<()> {
        (**self).rollback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_typed_access() {
        let row: Row = vec![
            ("id".to_string(), json!(7)),
            ("name".to_string(), json!("ada")),
            ("score".to_string(), Value::Null),
        ]
        .into_iter()
        .collect();

        assert_eq!(row.try_get::<i64>("id").unwrap(), 7);
        assert_eq!(row.try_get::<String>("name").unwrap(), "ada");
        assert_eq!(row.try_get::<Option<f64>>("score").unwrap(), None);
        assert!(matches!(row.try_get::<i64>("missing"), Err(ModelError::Schema(_))));
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "name", "score"]);
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: ModelError = StorageError::TransactionState {
            message: "no transaction open".to_string(),
        }
        .into();
        assert_eq!(err, ModelError::Transaction("no transaction open".to_string()));
    }
}
