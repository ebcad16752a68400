//! Sessions
//!
//! A `Session` is the explicit handle threaded through builders, records
//! and relations. It owns the storage, a registry of resolved model
//! metadata and the transaction depth. Cloning a session is cheap and
//! shares all of it.

use std::any::TypeId;
use std::cell::{Cell, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::backends::{ColumnInfo, Row, SqliteStorage, Storage};
use crate::config::SessionConfig;
use crate::error::{ModelError, ModelResult};
use crate::model::{Model, ModelMeta, ModelType, Record};
use crate::query::QueryBuilder;
use crate::transaction::with_transaction;

struct SessionInner {
    storage: RefCell<Box<dyn Storage>>,
    registry: RefCell<HashMap<TypeId, Rc<ModelMeta>>>,
    depth: Cell<u32>,
    rollback_only: Cell<bool>,
    config: SessionConfig,
}

#[derive(Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

impl Session {
    pub fn new<S: Storage + 'static>(storage: S) -> Self {
        Self::with_config(storage, SessionConfig::default())
    }

    pub fn with_config<S: Storage + 'static>(storage: S, config: SessionConfig) -> Self {
        Self {
            inner: Rc::new(SessionInner {
                storage: RefCell::new(Box::new(storage)),
                registry: RefCell::new(HashMap::new()),
                depth: Cell::new(0),
                rollback_only: Cell::new(false),
                config,
            }),
        }
    }

    /// Open a SQLite-backed session
    pub fn open(config: &SessionConfig) -> ModelResult<Self> {
        config.validate()?;
        let storage = SqliteStorage::from_config(config)?;
        Ok(Self::with_config(storage, config.clone()))
    }

    /// Session over a private in-memory database
    pub fn in_memory() -> ModelResult<Self> {
        Self::open(&SessionConfig::in_memory())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Query over a plain table; rows come back as schema-less records
    pub fn table(&self, table: &str) -> QueryBuilder {
        QueryBuilder::table(table).with_session(self)
    }

    /// Query over a model's table
    pub fn query<M: Model>(&self) -> QueryBuilder {
        self.query_type(&ModelType::of::<M>())
    }

    pub(crate) fn query_type(&self, model_type: &ModelType) -> QueryBuilder {
        match self.meta_of(model_type) {
            Ok(meta) => QueryBuilder::for_model(self.clone(), meta),
            Err(err) => QueryBuilder::failed(&model_type.table(), err),
        }
    }

    /// Query over the pivot table of a many-to-many relation
    pub fn pivots<M: Model>(&self, relation: &str) -> QueryBuilder {
        let pivot_table = self.meta::<M>().and_then(|meta| {
            let descriptor = meta.relation(relation)?;
            let keys = descriptor.resolve(self)?;
            keys.middle_table.clone().ok_or_else(|| {
                ModelError::Relationship(format!("Relation '{}' has no pivot table", relation))
            })
        });
        match pivot_table {
            Ok(table) => self.table(&table),
            Err(err) => QueryBuilder::failed(&M::table_name(), err),
        }
    }

    /// Resolved metadata for a model, built on first use
    pub fn meta<M: Model>(&self) -> ModelResult<Rc<ModelMeta>> {
        self.meta_of(&ModelType::of::<M>())
    }

    pub(crate) fn meta_of(&self, model_type: &ModelType) -> ModelResult<Rc<ModelMeta>> {
        if let Some(meta) = self.inner.registry.borrow().get(&model_type.type_id()) {
            return Ok(Rc::clone(meta));
        }

        let meta = Rc::new(model_type.describe(self)?);
        debug!(
            model = meta.name(),
            table = meta.table(),
            "Registered model"
        );
        self.inner
            .registry
            .borrow_mut()
            .insert(model_type.type_id(), Rc::clone(&meta));
        Ok(meta)
    }

    /// Drop every cached model description, e.g. after a schema change
    pub fn forget_models(&self) {
        self.inner.registry.borrow_mut().clear();
    }

    /// Unsaved record of a model
    pub fn new_record<M: Model>(&self) -> ModelResult<Rc<Record>> {
        let meta = self.meta::<M>()?;
        Ok(Rc::new(Record::new(self.clone(), meta)))
    }

    fn storage(&self) -> ModelResult<RefMut<'_, Box<dyn Storage>>> {
        self.inner
            .storage
            .try_borrow_mut()
            .map_err(|_| ModelError::Connection("Storage is already in use".to_string()))
    }

    fn log_statement(&self, sql: &str, params: &[Value]) {
        if self.inner.config.log_statements {
            debug!(params = params.len(), "{}", sql);
        }
    }

    /// Run a write statement
    pub fn execute(&self, sql: &str, params: &[Value]) -> ModelResult<u64> {
        self.log_statement(sql, params);
        self.storage()?.execute(sql, params)
    }

    /// Run a read statement
    pub fn execute_read(&self, sql: &str, params: &[Value]) -> ModelResult<Vec<Row>> {
        self.log_statement(sql, params);
        self.storage()?.execute_read(sql, params)
    }

    /// Run one statement for each parameter row
    pub fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> ModelResult<u64> {
        if self.inner.config.log_statements {
            debug!(rows = rows.len(), "{}", sql);
        }
        self.storage()?.execute_many(sql, rows)
    }

    pub(crate) fn last_insert_key(&self) -> ModelResult<Option<Value>> {
        self.storage()?.last_insert_key()
    }

    pub fn table_exists(&self, table: &str) -> ModelResult<bool> {
        self.storage()?.table_exists(table)
    }

    pub fn columns_of(&self, table: &str) -> ModelResult<Vec<ColumnInfo>> {
        self.storage()?.columns_of(table)
    }

    /// Run `f` in a transaction. Nested calls join the outer transaction.
    pub fn transaction<R, F>(&self, f: F) -> ModelResult<R>
    where
        F: FnOnce() -> ModelResult<R>,
    {
        with_transaction(self, f)
    }

    pub fn in_transaction(&self) -> bool {
        self.inner.depth.get() > 0
    }

    /// Enter a transaction scope, beginning a storage transaction at the
    /// outermost level. Returns whether this scope is nested.
    pub(crate) fn begin_scope(&self) -> ModelResult<bool> {
        let depth = self.inner.depth.get();
        if depth == 0 {
            debug!("Beginning transaction");
            self.storage()?.begin()?;
            self.inner.rollback_only.set(false);
        }
        self.inner.depth.set(depth + 1);
        Ok(depth > 0)
    }

    /// Leave a transaction scope. A failed nested scope marks the whole
    /// transaction for rollback.
    pub(crate) fn end_scope(&self, commit: bool) -> ModelResult<()> {
        let depth = self.inner.depth.get();
        if depth == 0 {
            return Err(ModelError::Transaction("No transaction is open".to_string()));
        }
        self.inner.depth.set(depth - 1);

        if depth > 1 {
            if !commit {
                self.inner.rollback_only.set(true);
            }
            return Ok(());
        }

        let rollback_only = self.inner.rollback_only.replace(false);
        if commit && !rollback_only {
            debug!("Committing transaction");
            return self.storage()?.commit();
        }

        debug!("Rolling back transaction");
        self.storage()?.rollback()?;
        if commit {
            return Err(ModelError::Transaction(
                "A nested transaction scope failed; all changes were rolled back".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("database_url", &self.inner.config.database_url)
            .field("models", &self.inner.registry.borrow().len())
            .field("transaction_depth", &self.inner.depth.get())
            .finish()
    }
}
