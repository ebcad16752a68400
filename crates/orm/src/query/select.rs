//! Query Builder SELECT operations and eager-load requests

use std::rc::Rc;

use super::builder::QueryBuilder;
use super::types::EagerLoad;

impl QueryBuilder {
    /// Add SELECT fields to the query
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.spec
            .select_fields
            .extend(fields.into_iter().map(|field| field.as_ref().trim().to_string()));
        self
    }

    /// Add SELECT DISTINCT to the query
    pub fn distinct(mut self) -> Self {
        self.spec.distinct = true;
        self
    }

    /// Eager-load relations of every fetched record, one batch query per
    /// relation
    pub fn with_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for relation in relations {
            self.spec.eager.push(EagerLoad::new(relation.as_ref()));
        }
        self
    }

    /// Eager-load one relation with extra constraints on its batch query
    pub fn with_relation<F>(mut self, relation: &str, constraint: F) -> Self
    where
        F: Fn(QueryBuilder) -> QueryBuilder + 'static,
    {
        self.spec.eager.push(EagerLoad {
            relation: relation.to_string(),
            constraint: Some(Rc::new(constraint)),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_fields() {
        let (sql, params) = QueryBuilder::table("t")
            .select(["a", "b"])
            .where_eq("a", 2)
            .to_sql_with_params()
            .unwrap();
        assert_eq!(sql, "SELECT a, b FROM t WHERE a = ?");
        assert_eq!(params, vec![json!(2)]);
    }

    #[test]
    fn test_distinct() {
        assert_eq!(
            QueryBuilder::table("t").select(["a"]).distinct().get_sql().unwrap(),
            "SELECT DISTINCT a FROM t"
        );
    }

    #[test]
    fn test_with_relations_records_requests() {
        let query = QueryBuilder::table("t")
            .with_relations(["posts"])
            .with_relation("tags", |q| q.order_by("name"));
        let eager = &query.spec().eager;
        assert_eq!(eager.len(), 2);
        assert_eq!(eager[0].relation, "posts");
        assert!(eager[0].constraint.is_none());
        assert!(eager[1].constraint.is_some());
    }
}
