//! Query Builder Module - fluent builder compiling to parameterized SQL

pub mod builder;
pub mod dml;
pub mod execution;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use builder::{PendingQuerySpec, QueryBuilder, QUERY_ALIAS};
pub use types::{EagerConstraint, EagerLoad, ExistenceClause, JoinClause, JoinKind};
