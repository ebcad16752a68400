//! Query Builder DML operations (INSERT, UPDATE, DELETE)
//!
//! `update()` and `delete()` act on whatever the builder matches; there is
//! no guard against an unfiltered call. `truncate()` is the explicit way
//! to empty a table.

use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use super::builder::QueryBuilder;
use crate::error::ModelResult;
use crate::model::Record;
use crate::sql;

impl QueryBuilder {
    /// Update the matched rows, returning the number of affected rows
    pub fn update<I, K, V>(&self, values: I) -> ModelResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let fragment = self.update_sql(values)?;
        let affected = self.session()?.execute(&fragment.sql, &fragment.params)?;
        debug!(table = self.spec.table_name(), affected, "Updated rows");
        Ok(affected)
    }

    /// Delete the matched rows, returning the number of affected rows
    pub fn delete(&self) -> ModelResult<u64> {
        let fragment = self.delete_sql()?;
        let affected = self.session()?.execute(&fragment.sql, &fragment.params)?;
        debug!(table = self.spec.table_name(), affected, "Deleted rows");
        Ok(affected)
    }

    /// Delete every row of the table, ignoring any filter
    pub fn truncate(&self) -> ModelResult<u64> {
        self.check()?;
        let statement = sql::delete_clause(self.spec.table_name());
        self.session()?.execute(&statement, &[])
    }

    /// Insert one row, returning its generated key
    pub fn insert<I, K, V>(&self, values: I) -> ModelResult<Option<Value>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.check()?;
        let mut columns = Vec::new();
        let mut params = Vec::new();
        for (field, value) in values {
            let field = field.as_ref();
            params.push(self.encode_field(field, value.into())?);
            columns.push(field.to_string());
        }
        let session = self.session()?;
        session.execute(&sql::insert_clause(self.spec.table_name(), &columns), &params)?;
        session.last_insert_key()
    }

    /// Unsaved record of the builder's model or table
    pub fn new_record(&self) -> ModelResult<Rc<Record>> {
        self.check()?;
        Ok(Rc::new(Record::new(self.session()?, self.result_meta())))
    }
}
