//! Query Builder - Core builder implementation
//!
//! Chained calls accumulate into a `PendingQuerySpec`. A call that fails
//! validation records the error on the builder instead of breaking the
//! chain; every compile or terminal operation then returns that error.

use std::rc::Rc;

use crate::conditions::{ConditionClause, OrderClause};
use crate::error::{ModelError, ModelResult};
use crate::model::ModelMeta;
use crate::session::Session;
use crate::sql::split_alias;

use super::types::*;

/// Alias given to the main table by existence filters and many-to-many
/// relation queries
pub const QUERY_ALIAS: &str = "oxygent";

/// Accumulated clauses of one query
#[derive(Debug, Clone, Default)]
pub struct PendingQuerySpec {
    /// Table name, optionally followed by an alias (`"posts oxygent"`)
    pub table: String,
    pub select_fields: Vec<String>,
    pub distinct: bool,
    pub where_conditions: Vec<ConditionClause>,
    pub existence: Vec<ExistenceClause>,
    pub join: Option<JoinClause>,
    pub group_by: Vec<OrderClause>,
    pub having: Option<ConditionClause>,
    pub order_by: Vec<OrderClause>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub eager: Vec<EagerLoad>,
}

impl PendingQuerySpec {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.trim().to_string(),
            ..Self::default()
        }
    }

    /// Table name without alias
    pub fn table_name(&self) -> &str {
        split_alias(&self.table).0
    }

    pub fn alias(&self) -> Option<&str> {
        split_alias(&self.table).1
    }
}

/// Query builder for constructing and running queries
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub(crate) session: Option<Session>,
    pub(crate) meta: Option<Rc<ModelMeta>>,
    pub(crate) pivot_meta: Option<Rc<ModelMeta>>,
    pub(crate) spec: PendingQuerySpec,
    pub(crate) error: Option<ModelError>,
}

impl QueryBuilder {
    /// Builder over a plain table, not yet bound to a session. SQL can be
    /// inspected; running it needs `with_session`.
    pub fn table(table: &str) -> Self {
        let error = if table.trim().is_empty() {
            Some(ModelError::Query("Table name is empty".to_string()))
        } else {
            None
        };
        Self {
            session: None,
            meta: None,
            pivot_meta: None,
            spec: PendingQuerySpec::new(table),
            error,
        }
    }

    pub(crate) fn for_model(session: Session, meta: Rc<ModelMeta>) -> Self {
        let spec = PendingQuerySpec::new(meta.table());
        Self {
            session: Some(session),
            meta: Some(meta),
            pivot_meta: None,
            spec,
            error: None,
        }
    }

    /// Builder carrying an error from its construction
    pub(crate) fn failed(table: &str, error: ModelError) -> Self {
        let mut builder = Self::table(table);
        builder.error = Some(error);
        builder
    }

    /// Bind the builder to a session
    pub fn with_session(mut self, session: &Session) -> Self {
        self.session = Some(session.clone());
        self
    }

    pub(crate) fn with_pivot(mut self, pivot_meta: Rc<ModelMeta>) -> Self {
        self.pivot_meta = Some(pivot_meta);
        self
    }

    /// Alias the main table; bare fields in WHERE, GROUP BY and HAVING are
    /// qualified with it
    pub fn alias(mut self, alias: &str) -> Self {
        let table = self.spec.table_name().to_string();
        self.spec.table = format!("{} {}", table, alias);
        self
    }

    pub fn spec(&self) -> &PendingQuerySpec {
        &self.spec
    }

    pub fn meta(&self) -> Option<&Rc<ModelMeta>> {
        self.meta.as_ref()
    }

    /// First error recorded while building, if any
    pub fn error(&self) -> Option<&ModelError> {
        self.error.as_ref()
    }

    pub(crate) fn check(&self) -> ModelResult<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Record the first failure of a chained call
    pub(crate) fn record<T>(&mut self, result: ModelResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(err);
                }
                None
            }
        }
    }

    /// Name used for results and errors: the model name or the table
    pub(crate) fn model_name(&self) -> String {
        match &self.meta {
            Some(meta) => meta.name().to_string(),
            None => self.spec.table_name().to_string(),
        }
    }
}
