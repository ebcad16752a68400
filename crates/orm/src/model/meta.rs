//! Model metadata
//!
//! `ModelType` is a copyable handle to a model declaration. `ModelMeta` is
//! the resolved description of a model against a live schema, built once
//! per session and shared by every record of that model.

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::backends::Row;
use crate::error::{ModelError, ModelResult, RelationshipError};
use crate::model::core_trait::Model;
use crate::model::fields::{FieldDef, FieldSet};
use crate::relationships::metadata::{RelationDescriptor, RelationSet};
use crate::session::Session;

/// Prefix marking pivot-table columns in a relation query's select list
pub const PIVOT_PREFIX: &str = "pivot__";

/// Type-erased handle to a `Model` implementation
#[derive(Clone, Copy)]
pub struct ModelType {
    type_id: TypeId,
    name: &'static str,
    table: fn() -> String,
    primary_key: fn() -> &'static str,
    describe: fn(&Session) -> ModelResult<ModelMeta>,
}

impl ModelType {
    pub fn of<M: Model>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: M::NAME,
            table: M::table_name,
            primary_key: M::primary_key_name,
            describe: ModelMeta::build::<M>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn table(&self) -> String {
        (self.table)()
    }

    pub fn primary_key(&self) -> &'static str {
        (self.primary_key)()
    }

    pub(crate) fn describe(&self, session: &Session) -> ModelResult<ModelMeta> {
        (self.describe)(session)
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ModelType {}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelType").field(&self.name).finish()
    }
}

/// Resolved model description: table, key, fields and relations
#[derive(Debug)]
pub struct ModelMeta {
    name: String,
    model_type: Option<ModelType>,
    table: String,
    primary_key: String,
    fields: IndexMap<String, FieldDef>,
    relations: IndexMap<String, Rc<RelationDescriptor>>,
}

impl ModelMeta {
    /// Schema-less description of a plain table. Values pass through
    /// undecoded.
    pub fn anonymous(table: &str) -> Self {
        Self {
            name: table.to_string(),
            model_type: None,
            table: table.to_string(),
            primary_key: "id".to_string(),
            fields: IndexMap::new(),
            relations: IndexMap::new(),
        }
    }

    pub(crate) fn build<M: Model>(session: &Session) -> ModelResult<ModelMeta> {
        let table = M::table_name();
        if !session.table_exists(&table)? {
            return Err(ModelError::Schema(format!(
                "Table '{}' for model '{}' does not exist",
                table,
                M::NAME
            )));
        }

        let mut declared = FieldSet::new();
        M::fields(&mut declared);

        let mut fields = IndexMap::new();
        for column in session.columns_of(&table)? {
            let def = declared
                .take(&column.name)
                .unwrap_or_else(|| FieldDef::from_column(&column));
            fields.insert(column.name.clone(), def);
        }
        if let Some(orphan) = declared.names().next() {
            return Err(ModelError::Schema(format!(
                "Field '{}' of model '{}' has no column in table '{}'",
                orphan,
                M::NAME,
                table
            )));
        }

        let primary_key = M::primary_key_name().to_string();
        if !fields.contains_key(&primary_key) {
            return Err(ModelError::Schema(format!(
                "Primary key '{}' of model '{}' has no column in table '{}'",
                primary_key,
                M::NAME,
                table
            )));
        }

        let mut relations = RelationSet::new(ModelType::of::<M>());
        M::relations(&mut relations);

        Ok(ModelMeta {
            name: M::NAME.to_string(),
            model_type: Some(ModelType::of::<M>()),
            table,
            primary_key,
            fields,
            relations: relations.into_map(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn model_type(&self) -> Option<ModelType> {
        self.model_type
    }

    pub fn is_model(&self, model_type: &ModelType) -> bool {
        self.model_type.as_ref() == Some(model_type)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Anonymous metas accept any column
    pub fn has_schema(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn relation(&self, name: &str) -> ModelResult<Rc<RelationDescriptor>> {
        self.relations.get(name).cloned().ok_or_else(|| {
            RelationshipError::NotFound {
                model: self.name.clone(),
                relation: name.to_string(),
            }
            .into()
        })
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Initial values of a new record
    pub(crate) fn blank_values(&self) -> IndexMap<String, Value> {
        self.fields
            .values()
            .map(|def| (def.name.clone(), def.default.clone().unwrap_or(Value::Null)))
            .collect()
    }

    pub(crate) fn validate_value(&self, field: &str, value: &Value) -> ModelResult<()> {
        match self.fields.get(field) {
            Some(def) => def.validate(value),
            None if self.has_schema() => Err(ModelError::Validation(format!(
                "Model '{}' has no field '{}'",
                self.name, field
            ))),
            None => Ok(()),
        }
    }

    /// Validate and encode a value for storage
    pub(crate) fn encode_value(&self, field: &str, value: &Value) -> ModelResult<Value> {
        match self.fields.get(field) {
            Some(def) => {
                def.validate(value)?;
                def.encode(value)
            }
            None => Ok(value.clone()),
        }
    }

    /// Decode a fetched row, splitting off `pivot__` columns
    pub(crate) fn decode_row(
        &self,
        row: Row,
    ) -> ModelResult<(IndexMap<String, Value>, IndexMap<String, Value>)> {
        let mut values = IndexMap::with_capacity(row.len());
        let mut pivot = IndexMap::new();
        for (column, stored) in row.into_map() {
            if let Some(pivot_column) = column.strip_prefix(PIVOT_PREFIX) {
                pivot.insert(pivot_column.to_string(), stored);
                continue;
            }
            let value = match self.fields.get(&column) {
                Some(def) => def.decode(stored)?,
                None => stored,
            };
            values.insert(column, value);
        }
        Ok((values, pivot))
    }
}
