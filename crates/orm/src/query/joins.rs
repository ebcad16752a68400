//! Query Builder JOIN operations
//!
//! A query carries at most one join; starting a new one replaces it.
//! `using` and `on` refine the current join.

use super::builder::QueryBuilder;
use super::types::*;
use crate::conditions::{Connector, JoinCondition};
use crate::error::ModelError;

impl QueryBuilder {
    /// INNER JOIN; renders as a NATURAL join until `using` or `on` is added
    pub fn join(mut self, table: &str) -> Self {
        self.spec.join = Some(JoinClause::new(JoinKind::Inner, table));
        self
    }

    /// OUTER JOIN; renders as a NATURAL join until `using` or `on` is added
    pub fn outer_join(mut self, table: &str) -> Self {
        self.spec.join = Some(JoinClause::new(JoinKind::Outer, table));
        self
    }

    pub fn cross_join(mut self, table: &str) -> Self {
        self.spec.join = Some(JoinClause::new(JoinKind::Cross, table));
        self
    }

    /// Join on identically named columns
    pub fn using<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.spec.join.as_mut() {
            Some(join) => join
                .using
                .extend(fields.into_iter().map(|field| field.as_ref().to_string())),
            None => {
                self.record::<()>(Err(ModelError::Query("using() needs a join".to_string())));
            }
        }
        self
    }

    /// Join condition comparing two columns, joined with AND
    pub fn on(self, left: &str, symbol: &str, right: &str) -> Self {
        self.push_on(Connector::And, left, symbol, right)
    }

    /// Join condition joined with OR
    pub fn or_on(self, left: &str, symbol: &str, right: &str) -> Self {
        self.push_on(Connector::Or, left, symbol, right)
    }

    fn push_on(mut self, connector: Connector, left: &str, symbol: &str, right: &str) -> Self {
        if self.spec.join.is_none() {
            self.record::<()>(Err(ModelError::Query("on() needs a join".to_string())));
            return self;
        }
        let condition = JoinCondition::new(connector, left, symbol, right);
        if let Some(condition) = self.record(condition) {
            if let Some(join) = self.spec.join.as_mut() {
                join.on.push(condition);
            }
        }
        self
    }
}
