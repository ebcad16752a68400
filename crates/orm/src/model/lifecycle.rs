//! Record lifecycle - save and delete
//!
//! `save()` runs in one transaction: the row write, the flush of queued
//! relation commands and the re-read of the stored row. On failure the
//! transaction is rolled back, the queued commands are put back and the
//! record keeps its unsaved state.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::model::record::Record;
use crate::relationships::commands::RelationCommand;
use crate::sql;

impl Record {
    /// Insert or update this record and flush its relation queue
    pub fn save(&self) -> ModelResult<()> {
        if self.is_deleted() {
            return Err(ModelError::Query(format!(
                "Cannot save a deleted '{}' record",
                self.model_name()
            )));
        }

        let commands = self.queue.take();
        let session = self.session.clone();
        match session.transaction(|| self.persist(&commands)) {
            Ok(stored) => {
                *self.values.borrow_mut() = stored.clone();
                *self.original.borrow_mut() = stored;
                self.is_new.set(false);
                self.relation_cache.borrow_mut().clear();
                debug!(
                    model = self.model_name(),
                    commands = commands.len(),
                    "Saved record"
                );
                Ok(())
            }
            Err(err) => {
                let mut queue = self.queue.borrow_mut();
                let queued_since: Vec<_> = queue.drain(..).collect();
                *queue = commands;
                queue.extend(queued_since);
                Err(err)
            }
        }
    }

    fn persist(&self, commands: &[RelationCommand]) -> ModelResult<IndexMap<String, Value>> {
        let meta = &self.meta;
        let primary_key = meta.primary_key();
        let mut current = self.to_map();

        if self.is_new() {
            let mut columns = Vec::new();
            let mut params = Vec::new();
            for (field, value) in &current {
                if value.is_null() {
                    continue;
                }
                columns.push(field.clone());
                params.push(meta.encode_value(field, value)?);
            }
            self.session
                .execute(&sql::insert_clause(meta.table(), &columns), &params)?;

            let has_key = current.get(primary_key).map(|v| !v.is_null()).unwrap_or(false);
            if !has_key {
                let key = self.session.last_insert_key()?.ok_or(ModelError::MissingPrimaryKey)?;
                current.insert(primary_key.to_string(), key);
            }
        } else {
            let changes = self.changes();
            if !changes.is_empty() {
                let key = self
                    .original
                    .borrow()
                    .get(primary_key)
                    .cloned()
                    .filter(|v| !v.is_null())
                    .ok_or(ModelError::MissingPrimaryKey)?;

                let columns: Vec<String> = changes.keys().cloned().collect();
                let mut params = Vec::with_capacity(columns.len() + 1);
                for (field, value) in &changes {
                    params.push(meta.encode_value(field, value)?);
                }
                params.push(key);
                let statement = format!(
                    "{} WHERE {} = ?",
                    sql::update_clause(meta.table(), &columns),
                    primary_key
                );
                self.session.execute(&statement, &params)?;
            }
        }

        if !commands.is_empty() {
            debug!(model = self.model_name(), count = commands.len(), "Flushing relation commands");
        }
        for command in commands {
            let owner_value = current
                .get(command.owner_column())
                .cloned()
                .unwrap_or(Value::Null);
            command.apply(&self.session, &owner_value)?;
        }

        let key = current.get(primary_key).cloned().unwrap_or(Value::Null);
        if key.is_null() {
            return Ok(current);
        }
        Ok(self.fetch_stored(&key)?.unwrap_or(current))
    }

    /// Delete this record's row. The record cannot be saved afterwards.
    pub fn delete(&self) -> ModelResult<()> {
        if self.is_new() {
            return Err(ModelError::UnsavedModel(self.model_name().to_string()));
        }
        let key = self.primary_key().ok_or(ModelError::MissingPrimaryKey)?;
        let statement = format!(
            "{} WHERE {} = ?",
            sql::delete_clause(self.meta.table()),
            self.meta.primary_key()
        );
        self.session.execute(&statement, &[key])?;
        self.deleted.set(true);
        self.queue.borrow_mut().clear();
        debug!(model = self.model_name(), "Deleted record");
        Ok(())
    }
}
