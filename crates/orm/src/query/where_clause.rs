//! Query Builder WHERE clause operations

use serde_json::Value;

use super::builder::{QueryBuilder, QUERY_ALIAS};
use crate::conditions::{ConditionClause, Connector, Operator};
use crate::error::ModelError;

impl QueryBuilder {
    fn push_condition(mut self, connector: Connector, field: &str, operator: Operator, value: Value) -> Self {
        let condition = self
            .encode_filter(field, value)
            .and_then(|value| ConditionClause::new(connector, field, operator, value));
        if let Some(condition) = self.record(condition) {
            self.spec.where_conditions.push(condition);
        }
        self
    }

    fn push_parsed(mut self, connector: Connector, field: &str, symbol: &str, value: Value) -> Self {
        match self.record(symbol.parse::<Operator>()) {
            Some(operator) => self.push_condition(connector, field, operator, value),
            None => self,
        }
    }

    /// Add WHERE condition joined with AND, e.g. `("age", ">=", 18)`
    pub fn where_condition<T: Into<Value>>(self, field: &str, symbol: &str, value: T) -> Self {
        self.push_parsed(Connector::And, field, symbol, value.into())
    }

    /// Add WHERE condition joined with OR
    pub fn or_where<T: Into<Value>>(self, field: &str, symbol: &str, value: T) -> Self {
        self.push_parsed(Connector::Or, field, symbol, value.into())
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(self, field: &str, value: T) -> Self {
        self.push_condition(Connector::And, field, Operator::Equal, value.into())
    }

    /// Add WHERE condition with not equal. Rows where the field is NULL
    /// match as well.
    pub fn where_ne<T: Into<Value>>(self, field: &str, value: T) -> Self {
        self.push_condition(Connector::And, field, Operator::NotEqual, value.into())
    }

    pub fn where_gt<T: Into<Value>>(self, field: &str, value: T) -> Self {
        self.push_condition(Connector::And, field, Operator::GreaterThan, value.into())
    }

    pub fn where_gte<T: Into<Value>>(self, field: &str, value: T) -> Self {
        self.push_condition(Connector::And, field, Operator::GreaterThanOrEqual, value.into())
    }

    pub fn where_lt<T: Into<Value>>(self, field: &str, value: T) -> Self {
        self.push_condition(Connector::And, field, Operator::LessThan, value.into())
    }

    pub fn where_lte<T: Into<Value>>(self, field: &str, value: T) -> Self {
        self.push_condition(Connector::And, field, Operator::LessThanOrEqual, value.into())
    }

    /// Add WHERE IN condition
    pub fn where_in<I, T>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.push_condition(Connector::And, field, Operator::In, Value::Array(values))
    }

    /// Add WHERE NOT IN condition
    pub fn where_not_in<I, T>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.push_condition(Connector::And, field, Operator::NotIn, Value::Array(values))
    }

    /// Add WHERE IS NULL condition
    pub fn where_null(self, field: &str) -> Self {
        self.push_condition(Connector::And, field, Operator::Is, Value::Null)
    }

    /// Add WHERE IS NOT NULL condition
    pub fn where_not_null(self, field: &str) -> Self {
        self.push_condition(Connector::And, field, Operator::IsNot, Value::Null)
    }

    /// Add several `(field, symbol, value)` conditions joined with AND
    pub fn where_many<I, F, S, V>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (F, S, V)>,
        F: AsRef<str>,
        S: AsRef<str>,
        V: Into<Value>,
    {
        conditions.into_iter().fold(self, |query, (field, symbol, value)| {
            query.where_condition(field.as_ref(), symbol.as_ref(), value)
        })
    }

    /// Add several conditions joined with OR
    pub fn or_where_many<I, F, S, V>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (F, S, V)>,
        F: AsRef<str>,
        S: AsRef<str>,
        V: Into<Value>,
    {
        conditions.into_iter().fold(self, |query, (field, symbol, value)| {
            query.or_where(field.as_ref(), symbol.as_ref(), value)
        })
    }

    /// Keep rows that have at least one related record
    pub fn has(self, relation: &str) -> Self {
        self.push_existence(relation, false)
    }

    /// Keep rows that have no related record
    pub fn doesnt_have(self, relation: &str) -> Self {
        self.push_existence(relation, true)
    }

    fn push_existence(mut self, relation: &str, negated: bool) -> Self {
        let (session, meta) = match (&self.session, &self.meta) {
            (Some(session), Some(meta)) => (session.clone(), meta.clone()),
            _ => {
                let err = ModelError::Query(format!(
                    "Relation filter '{}' needs a model query bound to a session",
                    relation
                ));
                self.record::<()>(Err(err));
                return self;
            }
        };

        if self.spec.alias().is_none() {
            self = self.alias(QUERY_ALIAS);
        }
        let alias = self.spec.alias().unwrap_or(QUERY_ALIAS).to_string();

        let clause = meta
            .relation(relation)
            .and_then(|descriptor| descriptor.existence(&session, negated, &alias));
        if let Some(clause) = self.record(clause) {
            self.spec.existence.push(clause);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_where_shortcuts() {
        let query = QueryBuilder::table("t")
            .where_eq("a", 1)
            .where_in("b", vec![1, 2])
            .where_null("c");
        let (sql, params) = query.to_sql_with_params().unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = ? AND b IN (?, ?) AND c IS ?");
        assert_eq!(params, vec![json!(1), json!(1), json!(2), Value::Null]);
    }

    #[test]
    fn test_or_where_many() {
        let query = QueryBuilder::table("t")
            .where_eq("a", 1)
            .or_where_many(vec![("b", "=", 2), ("c", "=", 3)]);
        assert_eq!(
            query.get_sql().unwrap(),
            "SELECT * FROM t WHERE a = ? OR b = ? OR c = ?"
        );
    }

    #[test]
    fn test_bad_symbol_is_kept_until_compile() {
        let query = QueryBuilder::table("t").where_condition("a", "~~", 1).where_eq("b", 2);
        assert!(matches!(query.error(), Some(ModelError::InvalidClause(_))));
        assert!(matches!(query.get_sql(), Err(ModelError::InvalidClause(_))));
    }

    #[test]
    fn test_has_without_session_fails() {
        let query = QueryBuilder::table("t").has("posts");
        assert!(matches!(query.get_sql(), Err(ModelError::Query(_))));
    }
}
