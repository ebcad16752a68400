//! Records - model instances
//!
//! A record holds its current field values, the snapshot taken when it was
//! loaded or last saved, loaded relations and the queue of relation
//! commands waiting for the next `save()`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::backends::Row;
use crate::container::ModelContainer;
use crate::error::{ModelError, ModelResult};
use crate::model::meta::ModelMeta;
use crate::relationships::commands::RelationCommand;
use crate::relationships::lazy::{LazyRelation, Related};
use crate::relationships::metadata::RelationKind;
use crate::relationships::query_builder::RelationQueryBuilder;
use crate::session::Session;

pub struct Record {
    pub(crate) meta: Rc<ModelMeta>,
    pub(crate) session: Session,
    pub(crate) values: RefCell<IndexMap<String, Value>>,
    pub(crate) original: RefCell<IndexMap<String, Value>>,
    pub(crate) relation_cache: RefCell<HashMap<String, Related>>,
    pub(crate) is_new: Cell<bool>,
    pub(crate) deleted: Cell<bool>,
    pub(crate) queue: RefCell<Vec<RelationCommand>>,
    pivot: Option<Rc<Record>>,
}

impl Record {
    /// Unsaved record with default field values
    pub fn new(session: Session, meta: Rc<ModelMeta>) -> Self {
        let values = meta.blank_values();
        Self {
            meta,
            session,
            values: RefCell::new(values),
            original: RefCell::new(IndexMap::new()),
            relation_cache: RefCell::new(HashMap::new()),
            is_new: Cell::new(true),
            deleted: Cell::new(false),
            queue: RefCell::new(Vec::new()),
            pivot: None,
        }
    }

    pub(crate) fn loaded(
        session: Session,
        meta: Rc<ModelMeta>,
        values: IndexMap<String, Value>,
        pivot: Option<Rc<Record>>,
    ) -> Self {
        Self {
            meta,
            session,
            original: RefCell::new(values.clone()),
            values: RefCell::new(values),
            relation_cache: RefCell::new(HashMap::new()),
            is_new: Cell::new(false),
            deleted: Cell::new(false),
            queue: RefCell::new(Vec::new()),
            pivot,
        }
    }

    pub fn meta(&self) -> &Rc<ModelMeta> {
        &self.meta
    }

    pub fn model_name(&self) -> &str {
        self.meta.name()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current value of a field
    pub fn get(&self, field: &str) -> Option<Value> {
        self.values.borrow().get(field).cloned()
    }

    /// Typed field access
    pub fn try_get<T: DeserializeOwned>(&self, field: &str) -> ModelResult<T> {
        let value = self.get(field).ok_or_else(|| {
            ModelError::Validation(format!("Model '{}' has no field '{}'", self.model_name(), field))
        })?;
        serde_json::from_value(value).map_err(|e| {
            ModelError::Serialization(format!("Failed to deserialize field '{}': {}", field, e))
        })
    }

    /// Assign a field after validating it against its declaration
    pub fn set(&self, field: &str, value: impl Into<Value>) -> ModelResult<()> {
        let value = value.into();
        self.meta.validate_value(field, &value)?;
        self.values.borrow_mut().insert(field.to_string(), value);
        Ok(())
    }

    /// Assign any serializable value, e.g. a `chrono::NaiveDate`
    pub fn set_serialized<T: Serialize>(&self, field: &str, value: &T) -> ModelResult<()> {
        self.set(field, serde_json::to_value(value)?)
    }

    pub fn fill<I, K, V>(&self, values: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (field, value) in values {
            self.set(field.as_ref(), value)?;
        }
        Ok(())
    }

    pub fn primary_key(&self) -> Option<Value> {
        self.get(self.meta.primary_key()).filter(|value| !value.is_null())
    }

    pub fn is_new(&self) -> bool {
        self.is_new.get()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.get()
    }

    /// Persisted and still holding a key
    pub fn is_persisted(&self) -> bool {
        !self.is_new() && !self.is_deleted() && self.primary_key().is_some()
    }

    /// Fields whose value differs from the loaded snapshot. A new record
    /// reports every non-null field.
    pub fn changes(&self) -> IndexMap<String, Value> {
        let values = self.values.borrow();
        if self.is_new() {
            return values
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect();
        }
        let original = self.original.borrow();
        values
            .iter()
            .filter(|(field, value)| original.get(field.as_str()) != Some(*value))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.changes().is_empty() || !self.queue.borrow().is_empty()
    }

    pub fn to_map(&self) -> IndexMap<String, Value> {
        self.values.borrow().clone()
    }

    pub fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string(&*self.values.borrow())?)
    }

    /// Pivot row joined to this record by a many-to-many query
    pub fn pivot(&self) -> Option<Rc<Record>> {
        self.pivot.clone()
    }

    /// Relation commands queued for the next save
    pub fn pending_commands(&self) -> Vec<RelationCommand> {
        self.queue.borrow().clone()
    }

    pub(crate) fn enqueue(&self, command: RelationCommand) {
        self.queue.borrow_mut().push(command);
    }

    /// Relation builder for reads and association changes
    pub fn rel(self: &Rc<Self>, name: &str) -> ModelResult<RelationQueryBuilder> {
        let descriptor = self.meta.relation(name)?;
        Ok(RelationQueryBuilder::new(Rc::clone(self), descriptor))
    }

    /// Whether `name` has been loaded into this record
    pub fn is_loaded(&self, name: &str) -> bool {
        self.relation_cache.borrow().contains_key(name)
    }

    pub(crate) fn cache_relation(&self, name: &str, related: Related) {
        self.relation_cache.borrow_mut().insert(name.to_string(), related);
    }

    pub(crate) fn cached(&self, name: &str) -> Option<Related> {
        self.relation_cache.borrow().get(name).cloned()
    }

    /// Related records of a to-many relation. Loaded lazily on first use
    /// unless eager-loaded.
    pub fn many(self: &Rc<Self>, name: &str) -> ModelResult<ModelContainer> {
        if let Some(related) = self.cached(name) {
            return related.into_many(name);
        }
        let builder = self.rel(name)?;
        if !builder.descriptor().kind().is_many() {
            return Err(ModelError::Relationship(format!(
                "Relation '{}' is singular, use one()",
                name
            )));
        }
        let container = builder.get()?;
        self.cache_relation(name, Related::Many(container.clone()));
        Ok(container)
    }

    /// Related record of a to-one relation
    pub fn one(self: &Rc<Self>, name: &str) -> ModelResult<Option<Rc<Record>>> {
        if let Some(related) = self.cached(name) {
            return related.into_one(name);
        }
        let mut lazy = self.lazy(name)?;
        let record = lazy.resolve()?;
        self.cache_relation(name, Related::One(record.clone()));
        Ok(record)
    }

    /// Deferred handle to a to-one relation
    pub fn lazy(self: &Rc<Self>, name: &str) -> ModelResult<LazyRelation> {
        let descriptor = self.meta.relation(name)?;
        if !matches!(descriptor.kind(), RelationKind::HasOne | RelationKind::BelongsTo) {
            return Err(ModelError::Relationship(format!(
                "Relation '{}' returns many records, use many()",
                name
            )));
        }
        if let Some(related) = self.cached(name) {
            return Ok(LazyRelation::from(related.into_one(name)?));
        }

        let keys = descriptor.resolve(&self.session)?;
        let owner_value = self.get(keys.owner_column()).unwrap_or(Value::Null);
        if owner_value.is_null() {
            return Ok(LazyRelation::Empty);
        }

        let session = self.session.clone();
        Ok(LazyRelation::Unloaded(Box::new(move || {
            descriptor.query_for(&session, owner_value.clone())?.get()?.first()
        })))
    }

    /// Reload field values from storage, discarding unsaved changes
    pub fn refresh(&self) -> ModelResult<()> {
        let key = self.primary_key().ok_or(ModelError::MissingPrimaryKey)?;
        let values = self.fetch_stored(&key)?.ok_or_else(|| ModelError::NotFound(self.meta.table().to_string()))?;
        *self.values.borrow_mut() = values.clone();
        *self.original.borrow_mut() = values;
        self.relation_cache.borrow_mut().clear();
        Ok(())
    }

    pub(crate) fn fetch_stored(&self, key: &Value) -> ModelResult<Option<IndexMap<String, Value>>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            self.meta.table(),
            self.meta.primary_key()
        );
        let rows = self.session.execute_read(&sql, std::slice::from_ref(key))?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(self.meta.decode_row(row)?.0)),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.meta.name())
            .field("values", &*self.values.borrow())
            .field("is_new", &self.is_new.get())
            .finish()
    }
}

/// Turns fetched rows into records of one model
#[derive(Clone)]
pub(crate) struct Hydrator {
    pub(crate) session: Session,
    pub(crate) meta: Rc<ModelMeta>,
    pub(crate) pivot: Option<Rc<ModelMeta>>,
}

impl Hydrator {
    pub(crate) fn new(session: Session, meta: Rc<ModelMeta>, pivot: Option<Rc<ModelMeta>>) -> Self {
        Self { session, meta, pivot }
    }

    pub(crate) fn hydrate(&self, row: Row) -> ModelResult<Rc<Record>> {
        let (values, pivot_values) = self.meta.decode_row(row)?;
        let pivot = match &self.pivot {
            Some(pivot_meta) if !pivot_values.is_empty() => Some(Rc::new(Record::loaded(
                self.session.clone(),
                Rc::clone(pivot_meta),
                pivot_values,
                None,
            ))),
            _ => None,
        };
        Ok(Rc::new(Record::loaded(
            self.session.clone(),
            Rc::clone(&self.meta),
            values,
            pivot,
        )))
    }
}
