//! Query Builder SQL generation
//!
//! One pass over the pending query produces one SQL string and one ordered
//! parameter list. WHERE parameters always precede HAVING parameters.

use serde_json::Value;

use super::builder::QueryBuilder;
use crate::error::{ModelError, ModelResult};
use crate::sql::{self, SqlFragment};

/// Column name of aggregate results
pub(crate) const AGGREGATE_COLUMN: &str = "aggregate";

impl QueryBuilder {
    /// Compile the SELECT statement
    pub fn to_fragment(&self) -> ModelResult<SqlFragment> {
        self.check()?;
        let spec = &self.spec;
        let alias = spec.alias();

        let mut fragment = SqlFragment::new(
            sql::select_clause(&spec.table, &spec.select_fields, spec.distinct),
            Vec::new(),
        );
        if let Some(join) = &spec.join {
            fragment.push_sql(&sql::join_clause(join));
        }
        fragment.push(sql::filter_clause(&spec.where_conditions, &spec.existence, alias)?);

        if !spec.group_by.is_empty() {
            fragment.push(sql::group_by_clause(&spec.group_by, spec.having.as_ref(), alias)?);
        } else if spec.having.is_some() {
            return Err(ModelError::Query("HAVING needs a GROUP BY".to_string()));
        }

        if !spec.order_by.is_empty() {
            fragment.push_sql(&sql::order_by_clause(&spec.order_by));
        }
        fragment.push_sql(&sql::limit_clause(spec.limit, spec.offset));
        Ok(fragment)
    }

    /// Generate SQL with parameter placeholders and return parameters
    pub fn to_sql_with_params(&self) -> ModelResult<(String, Vec<Value>)> {
        let fragment = self.to_fragment()?;
        Ok((fragment.sql, fragment.params))
    }

    /// Generate the SELECT SQL
    pub fn get_sql(&self) -> ModelResult<String> {
        Ok(self.to_fragment()?.sql)
    }

    /// Compile an UPDATE of the matched rows
    pub fn update_sql<I, K, V>(&self, values: I) -> ModelResult<SqlFragment>
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
        if columns.is_empty() {
            return Err(ModelError::Query("UPDATE needs at least one value".to_string()));
        }

        let mut fragment = SqlFragment::new(
            sql::update_clause(self.spec.table_name(), &columns),
            params,
        );
        fragment.push(self.dml_filter()?);
        Ok(fragment)
    }

    /// Compile a DELETE of the matched rows
    pub fn delete_sql(&self) -> ModelResult<SqlFragment> {
        self.check()?;
        let mut fragment = SqlFragment::new(sql::delete_clause(self.spec.table_name()), Vec::new());
        fragment.push(self.dml_filter()?);
        Ok(fragment)
    }

    /// `SELECT <expression> AS aggregate` over the matched rows
    pub(crate) fn aggregate_fragment(&self, function: &str, field: &str) -> ModelResult<SqlFragment> {
        let spec = &self.spec;
        let needs_subquery = spec.distinct
            || !spec.group_by.is_empty()
            || spec.limit.is_some()
            || spec.offset.is_some();

        if !needs_subquery {
            let mut flat = self.clone();
            flat.spec.select_fields = vec![format!("{}({}) AS {}", function, field, AGGREGATE_COLUMN)];
            flat.spec.order_by.clear();
            return flat.to_fragment();
        }

        let inner = self.to_fragment()?;
        let column = match field.rsplit_once('.') {
            Some((_, column)) => column,
            None => field,
        };
        Ok(SqlFragment::new(
            format!(
                "SELECT {}({}) AS {} FROM ({})",
                function, column, AGGREGATE_COLUMN, inner.sql
            ),
            inner.params,
        ))
    }

    pub(crate) fn encode_field(&self, field: &str, value: Value) -> ModelResult<Value> {
        match &self.meta {
            Some(meta) => {
                meta.validate_value(field, &value)?;
                meta.encode_value(field, &value)
            }
            None => Ok(value),
        }
    }

    /// Stored form of a filter value, so comparisons see what `save()`
    /// wrote. Prefixed fields and fields the model does not declare are
    /// bound as given.
    pub(crate) fn encode_filter(&self, field: &str, value: Value) -> ModelResult<Value> {
        let def = match &self.meta {
            Some(meta) if !field.contains('.') => match meta.field(field) {
                Some(def) => def,
                None => return Ok(value),
            },
            _ => return Ok(value),
        };
        match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => items
                .into_iter()
                .map(|item| def.encode(&item))
                .collect::<ModelResult<Vec<_>>>()
                .map(Value::Array),
            other => def.encode(&other),
        }
    }

    fn key_column(&self) -> &str {
        match &self.meta {
            Some(meta) => meta.primary_key(),
            None => "rowid",
        }
    }

    /// WHERE clause of UPDATE and DELETE. Aliases, joins, relation filters
    /// and limits cannot appear in those statements directly, so such
    /// queries select the matching keys in a sub-select instead.
    fn dml_filter(&self) -> ModelResult<SqlFragment> {
        let spec = &self.spec;
        let direct = spec.alias().is_none()
            && spec.join.is_none()
            && spec.existence.is_empty()
            && spec.group_by.is_empty()
            && spec.limit.is_none()
            && spec.offset.is_none();
        if direct {
            return sql::filter_clause(&spec.where_conditions, &[], None);
        }

        let key = self.key_column();
        let qualified_key = format!("{}.{}", spec.alias().unwrap_or(spec.table_name()), key);
        let mut keys = self.clone();
        keys.spec.select_fields = vec![qualified_key];
        keys.spec.distinct = false;
        keys.spec.having = None;
        keys.spec.group_by.clear();
        let inner = keys.to_fragment()?;
        Ok(SqlFragment::new(
            format!("WHERE {} IN ({})", key, inner.sql),
            inner.params,
        ))
    }
}
