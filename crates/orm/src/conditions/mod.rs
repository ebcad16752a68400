//! Query Conditions and Clauses
//!
//! Value types for a single filter condition, a join condition and an
//! ordering term. Connectors, comparison symbols and orderings are closed
//! sets; anything else is rejected at construction.

pub mod ordering;

pub use ordering::*;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{ModelError, ModelResult};

/// How a condition attaches to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Connector {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Connector::And),
            "OR" => Ok(Connector::Or),
            other => Err(ModelError::InvalidClause(format!("unknown connector '{}'", other))),
        }
    }
}

/// Comparison symbol of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Is,
    IsNot,
    GreaterThanOrEqual,
    GreaterThan,
    LessThanOrEqual,
    LessThan,
    In,
    NotIn,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
            Operator::GreaterThanOrEqual => ">=",
            Operator::GreaterThan => ">",
            Operator::LessThanOrEqual => "<=",
            Operator::LessThan => "<",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }

    /// `<`, `<=`, `>` and `>=`
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThanOrEqual
                | Operator::GreaterThan
                | Operator::LessThanOrEqual
                | Operator::LessThan
        )
    }

    /// `IN` and `NOT IN`, which take a sequence value
    pub fn is_membership(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
        match normalized.as_str() {
            "=" => Ok(Operator::Equal),
            "!=" => Ok(Operator::NotEqual),
            "IS" => Ok(Operator::Is),
            "IS NOT" => Ok(Operator::IsNot),
            ">=" => Ok(Operator::GreaterThanOrEqual),
            ">" => Ok(Operator::GreaterThan),
            "<=" => Ok(Operator::LessThanOrEqual),
            "<" => Ok(Operator::LessThan),
            "IN" => Ok(Operator::In),
            "NOT IN" => Ok(Operator::NotIn),
            _ => Err(ModelError::InvalidClause(format!("unknown comparison symbol '{}'", s))),
        }
    }
}

/// A single filter condition: `connector field symbol value`
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionClause {
    pub connector: Connector,
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl ConditionClause {
    pub fn new(connector: Connector, field: &str, operator: Operator, value: Value) -> ModelResult<Self> {
        if field.trim().is_empty() {
            return Err(ModelError::InvalidClause("condition field is empty".to_string()));
        }
        if operator.is_membership() && !value.is_array() {
            return Err(ModelError::InvalidClause(format!(
                "'{}' on '{}' needs a sequence value, got {}",
                operator, field, value
            )));
        }
        Ok(Self {
            connector,
            field: field.to_string(),
            operator,
            value,
        })
    }

    /// Build a condition from its textual connector and symbol
    pub fn parse(connector: &str, field: &str, symbol: &str, value: Value) -> ModelResult<Self> {
        Self::new(connector.parse()?, field, symbol.parse()?, value)
    }

    /// Condition joined with AND
    pub fn and(field: &str, symbol: &str, value: Value) -> ModelResult<Self> {
        Self::new(Connector::And, field, symbol.parse()?, value)
    }

    /// Condition joined with OR
    pub fn or(field: &str, symbol: &str, value: Value) -> ModelResult<Self> {
        Self::new(Connector::Or, field, symbol.parse()?, value)
    }
}

/// Join condition comparing two columns. The right-hand side is a column
/// reference and is rendered as-is, never bound.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinCondition {
    pub connector: Connector,
    pub left: String,
    pub operator: Operator,
    pub right: String,
}

impl JoinCondition {
    pub fn new(connector: Connector, left: &str, symbol: &str, right: &str) -> ModelResult<Self> {
        let operator: Operator = symbol.parse()?;
        if operator.is_membership() {
            return Err(ModelError::InvalidClause(format!(
                "'{}' cannot compare two columns",
                operator
            )));
        }
        Ok(Self {
            connector,
            left: left.to_string(),
            operator,
            right: right.to_string(),
        })
    }
}
