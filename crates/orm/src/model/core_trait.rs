//! Core Model Trait - declaration surface for database entities
//!
//! A model is a marker type naming a table, its key, optional field
//! declarations and its relations. Column types not declared in `fields`
//! are taken from the table itself.

use std::rc::Rc;

use serde_json::Value;

use crate::container::ModelContainer;
use crate::error::{ModelError, ModelResult};
use crate::model::fields::FieldSet;
use crate::model::record::Record;
use crate::query::QueryBuilder;
use crate::relationships::metadata::RelationSet;
use crate::session::Session;

/// Core trait for database models
pub trait Model: Sized + 'static {
    /// Model name, used for default table and key names
    const NAME: &'static str;

    /// Table name for this model. Defaults to the lowercase name plus `s`.
    fn table_name() -> String {
        format!("{}s", Self::NAME.to_lowercase())
    }

    /// Primary key field name
    fn primary_key_name() -> &'static str {
        "id"
    }

    /// Field declarations overriding what the table reports
    fn fields(fields: &mut FieldSet) {
        let _ = fields;
    }

    /// Relation declarations
    fn relations(relations: &mut RelationSet) {
        let _ = relations;
    }

    /// Start a query over this model's table
    fn query(session: &Session) -> QueryBuilder {
        session.query::<Self>()
    }

    /// Unsaved record of this model
    fn new(session: &Session) -> ModelResult<Rc<Record>> {
        session.new_record::<Self>()
    }

    /// Every record of this model
    fn all(session: &Session) -> ModelResult<ModelContainer> {
        Self::query(session).all()
    }

    /// Find a record by primary key
    fn find(session: &Session, key: impl Into<Value>) -> ModelResult<Option<Rc<Record>>> {
        Self::query(session)
            .where_eq(Self::primary_key_name(), key)
            .first()
    }

    /// Find a record by primary key or fail with `NotFound`
    fn find_or_fail(session: &Session, key: impl Into<Value>) -> ModelResult<Rc<Record>> {
        Self::find(session, key)?.ok_or_else(|| ModelError::NotFound(Self::table_name()))
    }

    /// Create and save a record from field values
    fn create<I, K, V>(session: &Session, values: I) -> ModelResult<Rc<Record>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let record = Self::new(session)?;
        record.fill(values)?;
        record.save()?;
        Ok(record)
    }

    /// Delete records by primary key
    fn destroy<I, V>(session: &Session, keys: I) -> ModelResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::query(session)
            .where_in(Self::primary_key_name(), keys)
            .delete()
    }

    /// Delete every row of this model's table
    fn truncate(session: &Session) -> ModelResult<u64> {
        Self::query(session).truncate()
    }

    /// Records with at least one related record through `relation`
    fn has(session: &Session, relation: &str) -> QueryBuilder {
        Self::query(session).has(relation)
    }

    /// Records with no related record through `relation`
    fn doesnt_have(session: &Session, relation: &str) -> QueryBuilder {
        Self::query(session).doesnt_have(relation)
    }

    /// Query with relations eager-loaded in one batch each
    fn with_relations<I, S>(session: &Session, relations: I) -> QueryBuilder
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::query(session).with_relations(relations)
    }

    /// Query over the pivot table of a many-to-many relation
    fn pivots(session: &Session, relation: &str) -> QueryBuilder {
        session.pivots::<Self>(relation)
    }
}
