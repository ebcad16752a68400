//! Query Builder execution
//!
//! `get()` defers the SELECT until the returned container is first read;
//! `all()`, `first()` and the aggregates run immediately.

use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use super::builder::QueryBuilder;
use super::sql_generation::AGGREGATE_COLUMN;
use crate::backends::Row;
use crate::container::ModelContainer;
use crate::error::{ModelError, ModelResult};
use crate::model::record::Hydrator;
use crate::model::{ModelMeta, Record};
use crate::relationships::eager_loading::load_relations;
use crate::session::Session;

impl QueryBuilder {
    pub(crate) fn session(&self) -> ModelResult<Session> {
        self.check()?;
        self.session.clone().ok_or_else(|| {
            ModelError::Query(format!(
                "Query on '{}' is not bound to a session",
                self.spec.table_name()
            ))
        })
    }

    /// Metadata used to hydrate rows: the model's, or a schema-less one
    /// named after the table
    pub(crate) fn result_meta(&self) -> Rc<ModelMeta> {
        match &self.meta {
            Some(meta) => Rc::clone(meta),
            None => Rc::new(ModelMeta::anonymous(self.spec.table_name())),
        }
    }

    fn hydrator(&self, session: &Session) -> Hydrator {
        Hydrator::new(session.clone(), self.result_meta(), self.pivot_meta.clone())
    }

    /// Run the SELECT and return the raw rows
    pub fn rows(&self) -> ModelResult<Vec<Row>> {
        let fragment = self.to_fragment()?;
        self.session()?.execute_read(&fragment.sql, &fragment.params)
    }

    /// Lazy result container. The query runs on first access. Queries with
    /// eager-loaded relations run immediately, like `all()`.
    pub fn get(self) -> ModelResult<ModelContainer> {
        if !self.spec.eager.is_empty() {
            return self.all();
        }
        let fragment = self.to_fragment()?;
        let session = self.session()?;
        let hydrator = self.hydrator(&session);
        Ok(ModelContainer::lazy(hydrator, move || {
            session.execute_read(&fragment.sql, &fragment.params)
        }))
    }

    /// Run the query now and hydrate every row
    pub fn all(self) -> ModelResult<ModelContainer> {
        let session = self.session()?;
        let rows = self.rows()?;
        let hydrator = self.hydrator(&session);
        let records = rows
            .into_iter()
            .map(|row| hydrator.hydrate(row))
            .collect::<ModelResult<Vec<Rc<Record>>>>()?;

        if !self.spec.eager.is_empty() {
            debug!(
                model = hydrator.meta.name(),
                relations = self.spec.eager.len(),
                "Eager loading relations"
            );
            load_relations(&session, &hydrator.meta, &records, &self.spec.eager)?;
        }
        Ok(ModelContainer::from_records(hydrator.meta.name(), records))
    }

    /// First matching record, if any
    pub fn first(self) -> ModelResult<Option<Rc<Record>>> {
        self.limit(1).all()?.first()
    }

    /// First matching record, or `EmptyResult`
    pub fn first_or_fail(self) -> ModelResult<Rc<Record>> {
        let name = self.model_name();
        self.first()?.ok_or(ModelError::EmptyResult(name))
    }

    fn aggregate(&self, function: &str, field: &str) -> ModelResult<Value> {
        let fragment = self.aggregate_fragment(function, field)?;
        let rows = self.session()?.execute_read(&fragment.sql, &fragment.params)?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.get(AGGREGATE_COLUMN).cloned())
            .unwrap_or(Value::Null))
    }

    /// Number of matching rows
    pub fn count(&self) -> ModelResult<u64> {
        let value = self.aggregate("COUNT", "*")?;
        Ok(value.as_u64().unwrap_or(0))
    }

    pub fn max(&self, field: &str) -> ModelResult<Value> {
        self.aggregate("MAX", field)
    }

    pub fn min(&self, field: &str) -> ModelResult<Value> {
        self.aggregate("MIN", field)
    }

    pub fn sum(&self, field: &str) -> ModelResult<Value> {
        self.aggregate("SUM", field)
    }

    pub fn avg(&self, field: &str) -> ModelResult<Value> {
        self.aggregate("AVG", field)
    }

    /// Whether any row matches
    pub fn exists(&self) -> ModelResult<bool> {
        Ok(self.count()? > 0)
    }
}
