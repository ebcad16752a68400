//! Query Builder ORDER BY, GROUP BY, HAVING operations

use serde_json::Value;

use super::builder::QueryBuilder;
use crate::conditions::{ConditionClause, Order, OrderClause};

impl QueryBuilder {
    /// Add ORDER BY clause (ascending)
    pub fn order_by(mut self, field: &str) -> Self {
        self.spec.order_by.push(OrderClause::new(field, Order::Asc));
        self
    }

    /// Add ORDER BY clause (descending)
    pub fn order_by_desc(mut self, field: &str) -> Self {
        self.spec.order_by.push(OrderClause::new(field, Order::Desc));
        self
    }

    /// Add ORDER BY clause with a textual direction, `"ASC"` or `"DESC"`
    pub fn order_by_direction(mut self, field: &str, order: &str) -> Self {
        if let Some(clause) = self.record(OrderClause::parse(field, order)) {
            self.spec.order_by.push(clause);
        }
        self
    }

    /// Add GROUP BY clause (ascending)
    pub fn group_by(mut self, field: &str) -> Self {
        self.spec.group_by.push(OrderClause::new(field, Order::Asc));
        self
    }

    pub fn group_by_direction(mut self, field: &str, order: &str) -> Self {
        if let Some(clause) = self.record(OrderClause::parse(field, order)) {
            self.spec.group_by.push(clause);
        }
        self
    }

    /// Set the HAVING condition of the grouping. A later call replaces it.
    pub fn having<T: Into<Value>>(mut self, field: &str, symbol: &str, value: T) -> Self {
        let condition = self
            .encode_filter(field, value.into())
            .and_then(|value| ConditionClause::and(field, symbol, value));
        if let Some(condition) = self.record(condition) {
            self.spec.having = Some(condition);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use serde_json::json;

    #[test]
    fn test_group_by_having() {
        let query = QueryBuilder::table("t")
            .where_eq("c", 1)
            .group_by("a")
            .having("b", ">", 1);
        let (sql, params) = query.to_sql_with_params().unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE c = ? GROUP BY a ASC HAVING b > ?");
        assert_eq!(params, vec![json!(1), json!(1)]);
    }

    #[test]
    fn test_order_by() {
        let query = QueryBuilder::table("t")
            .order_by("a")
            .order_by_desc("b")
            .order_by_direction("c", "desc");
        assert_eq!(
            query.get_sql().unwrap(),
            "SELECT * FROM t ORDER BY a ASC, b DESC, c DESC"
        );
    }

    #[test]
    fn test_unknown_direction() {
        let query = QueryBuilder::table("t").order_by_direction("a", "sideways");
        assert!(matches!(query.get_sql(), Err(ModelError::InvalidClause(_))));
    }

    #[test]
    fn test_having_without_group_by_fails() {
        let query = QueryBuilder::table("t").having("b", ">", 1);
        assert!(matches!(query.get_sql(), Err(ModelError::Query(_))));
    }
}
