//! Query Builder Types - join and existence clauses, eager-load requests

use std::fmt;
use std::rc::Rc;

use crate::conditions::JoinCondition;
use crate::query::builder::QueryBuilder;

/// Join kinds. An INNER or OUTER join with neither ON nor USING renders
/// as a NATURAL join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Outer,
    Cross,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "INNER JOIN"),
            JoinKind::Outer => write!(f, "OUTER JOIN"),
            JoinKind::Cross => write!(f, "CROSS JOIN"),
        }
    }
}

/// Join clause
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: String,
    pub using: Vec<String>,
    pub on: Vec<JoinCondition>,
}

impl JoinClause {
    pub fn new(kind: JoinKind, table: &str) -> Self {
        Self {
            kind,
            table: table.to_string(),
            using: Vec::new(),
            on: Vec::new(),
        }
    }
}

/// `[NOT] EXISTS` sub-select correlating a related table with the outer row
#[derive(Debug, Clone, PartialEq)]
pub struct ExistenceClause {
    pub negated: bool,
    pub table: String,
    pub inner_column: String,
    pub outer_column: String,
    /// Outer column whose NULL also counts as "has none"
    pub null_column: Option<String>,
}

/// Extra constraints applied to the batch query of an eager-loaded relation
pub type EagerConstraint = Rc<dyn Fn(QueryBuilder) -> QueryBuilder>;

/// A relation to eager-load, with its optional constraint
#[derive(Clone)]
pub struct EagerLoad {
    pub relation: String,
    pub constraint: Option<EagerConstraint>,
}

impl EagerLoad {
    pub fn new(relation: &str) -> Self {
        Self {
            relation: relation.to_string(),
            constraint: None,
        }
    }
}

impl fmt::Debug for EagerLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerLoad")
            .field("relation", &self.relation)
            .field("constrained", &self.constraint.is_some())
            .finish()
    }
}
