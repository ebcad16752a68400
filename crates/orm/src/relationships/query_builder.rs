//! Relation query builders
//!
//! Reads go straight to the database. Mutators validate their arguments
//! now and queue a `RelationCommand` on the owner, applied by the owner's
//! next `save()`. BelongsTo mutators only change the owner's own foreign
//! key field.

use std::rc::Rc;

use serde_json::Value;

use crate::container::ModelContainer;
use crate::error::{ModelError, ModelResult, RelationshipError};
use crate::model::Record;
use crate::query::QueryBuilder;
use crate::relationships::commands::{PivotRow, RelationCommand};
use crate::relationships::metadata::{RelationDescriptor, RelationKeys, RelationKind};

/// Relation of one owner record
pub struct RelationQueryBuilder {
    owner: Rc<Record>,
    descriptor: Rc<RelationDescriptor>,
}

impl RelationQueryBuilder {
    pub fn new(owner: Rc<Record>, descriptor: Rc<RelationDescriptor>) -> Self {
        Self { owner, descriptor }
    }

    pub fn descriptor(&self) -> &RelationDescriptor {
        &self.descriptor
    }

    pub fn owner(&self) -> &Rc<Record> {
        &self.owner
    }

    fn keys(&self) -> ModelResult<&RelationKeys> {
        self.descriptor.resolve(self.owner.session())
    }

    /// Query of the related records. An unsaved owner matches nothing.
    pub fn query(&self) -> ModelResult<QueryBuilder> {
        let keys = self.keys()?;
        let owner_value = self.owner.get(keys.owner_column()).unwrap_or(Value::Null);
        self.descriptor.query_for(self.owner.session(), owner_value)
    }

    /// Query with extra constraints
    pub fn filter<F>(&self, constrain: F) -> ModelResult<QueryBuilder>
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        Ok(constrain(self.query()?))
    }

    /// Lazy container of the related records
    pub fn get(&self) -> ModelResult<ModelContainer> {
        self.query()?.get()
    }

    pub fn all(&self) -> ModelResult<ModelContainer> {
        self.query()?.all()
    }

    pub fn first(&self) -> ModelResult<Option<Rc<Record>>> {
        self.query()?.first()
    }

    pub fn count(&self) -> ModelResult<u64> {
        self.query()?.count()
    }

    /// Associate `other` with the owner
    pub fn add(&self, other: &Rc<Record>) -> ModelResult<Rc<Record>> {
        let key = self.validate(other)?;
        let keys = self.keys()?;
        match keys.kind {
            RelationKind::BelongsTo => self.set_owner_key(keys, key)?,
            RelationKind::BelongsToMany => self.enqueue(self.insert_pivot(keys, vec![PivotRow::new(key)])?),
            RelationKind::HasOne | RelationKind::HasMany => self.enqueue(self.set_foreign_key(keys, vec![key])),
        }
        Ok(Rc::clone(&self.owner))
    }

    /// Associate `other` through the pivot table, with extra pivot columns
    pub fn add_with_pivot<I, K, V>(&self, other: &Rc<Record>, values: I) -> ModelResult<Rc<Record>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.require_kind(&[RelationKind::BelongsToMany], "add_with_pivot")?;
        let key = self.validate(other)?;
        let keys = self.keys()?;
        let mut row = PivotRow::new(key);
        for (column, value) in values {
            let column = column.as_ref();
            if !keys.pivot_columns.iter().any(|c| c == column) {
                return Err(ModelError::Validation(format!(
                    "Relation '{}' declares no pivot column '{}'",
                    self.descriptor.name(),
                    column
                )));
            }
            row.extra.insert(column.to_string(), value.into());
        }
        self.enqueue(self.insert_pivot(keys, vec![row])?);
        Ok(Rc::clone(&self.owner))
    }

    /// Associate several records in one statement
    pub fn add_many(&self, others: &[Rc<Record>]) -> ModelResult<Rc<Record>> {
        self.require_kind(&[RelationKind::HasMany, RelationKind::BelongsToMany], "add_many")?;
        let values = others
            .iter()
            .map(|other| self.validate(other))
            .collect::<ModelResult<Vec<_>>>()?;
        let keys = self.keys()?;
        let command = match keys.kind {
            RelationKind::BelongsToMany => self.insert_pivot(keys, values.into_iter().map(PivotRow::new).collect())?,
            _ => self.set_foreign_key(keys, values),
        };
        self.enqueue(command);
        Ok(Rc::clone(&self.owner))
    }

    /// Make `other` the only associated record
    pub fn assign(&self, other: &Rc<Record>) -> ModelResult<Rc<Record>> {
        let key = self.validate(other)?;
        let keys = self.keys()?;
        if keys.kind == RelationKind::BelongsTo {
            self.set_owner_key(keys, key)?;
            return Ok(Rc::clone(&self.owner));
        }
        self.deassign_all()?;
        self.add(other)
    }

    /// Make `others` exactly the associated records
    pub fn reassign(&self, others: &[Rc<Record>]) -> ModelResult<Rc<Record>> {
        self.require_kind(&[RelationKind::HasMany, RelationKind::BelongsToMany], "reassign")?;
        for other in others {
            self.validate(other)?;
        }
        self.deassign_all()?;
        self.add_many(others)
    }

    pub fn assign_many(&self, others: &[Rc<Record>]) -> ModelResult<Rc<Record>> {
        self.reassign(others)
    }

    /// Dissociate `other` from the owner
    pub fn deassign(&self, other: &Rc<Record>) -> ModelResult<Rc<Record>> {
        let key = self.validate(other)?;
        let keys = self.keys()?;
        match keys.kind {
            RelationKind::BelongsTo => self.set_owner_key(keys, Value::Null)?,
            RelationKind::BelongsToMany => self.enqueue(RelationCommand::DeletePivot {
                table: self.middle_table(keys)?,
                self_key: keys.self_key.clone(),
                other_key: keys.other_key.clone(),
                owner_column: keys.owner_column().to_string(),
                others: Some(vec![key]),
            }),
            RelationKind::HasOne | RelationKind::HasMany => self.enqueue(RelationCommand::UnsetForeignKey {
                table: keys.target_table.clone(),
                key_column: keys.target_key.clone(),
                foreign_key: keys.other_key.clone(),
                owner_column: keys.owner_column().to_string(),
                keys: vec![key],
            }),
        }
        Ok(Rc::clone(&self.owner))
    }

    /// Dissociate every related record
    pub fn deassign_all(&self) -> ModelResult<Rc<Record>> {
        let keys = self.keys()?;
        match keys.kind {
            RelationKind::BelongsTo => self.set_owner_key(keys, Value::Null)?,
            RelationKind::BelongsToMany => self.enqueue(RelationCommand::DeletePivot {
                table: self.middle_table(keys)?,
                self_key: keys.self_key.clone(),
                other_key: keys.other_key.clone(),
                owner_column: keys.owner_column().to_string(),
                others: None,
            }),
            RelationKind::HasOne | RelationKind::HasMany => self.enqueue(RelationCommand::ClearForeignKeys {
                table: keys.target_table.clone(),
                foreign_key: keys.other_key.clone(),
                owner_column: keys.owner_column().to_string(),
            }),
        }
        Ok(Rc::clone(&self.owner))
    }

    /// Check `other` belongs to the target model and is saved; returns the
    /// value the relation stores for it
    fn validate(&self, other: &Rc<Record>) -> ModelResult<Value> {
        let target = self.descriptor.target();
        if !other.meta().is_model(&target) {
            return Err(ModelError::RelationType {
                expected: target.name().to_string(),
                found: other.model_name().to_string(),
            });
        }
        if !other.is_persisted() {
            return Err(ModelError::UnsavedModel(other.model_name().to_string()));
        }
        let keys = self.keys()?;
        let column = keys.target_column();
        other.get(column).filter(|v| !v.is_null()).ok_or_else(|| {
            RelationshipError::MissingKey {
                relation: self.descriptor.name().to_string(),
                column: column.to_string(),
            }
            .into()
        })
    }

    fn require_kind(&self, kinds: &[RelationKind], operation: &str) -> ModelResult<()> {
        if kinds.contains(&self.descriptor.kind()) {
            return Ok(());
        }
        Err(RelationshipError::UnsupportedOperation {
            relation: self.descriptor.name().to_string(),
            operation: operation.to_string(),
        }
        .into())
    }

    fn middle_table(&self, keys: &RelationKeys) -> ModelResult<String> {
        keys.middle_table.clone().ok_or_else(|| {
            ModelError::Relationship(format!(
                "Relation '{}' has no pivot table",
                self.descriptor.name()
            ))
        })
    }

    fn set_foreign_key(&self, keys: &RelationKeys, values: Vec<Value>) -> RelationCommand {
        RelationCommand::SetForeignKey {
            table: keys.target_table.clone(),
            key_column: keys.target_key.clone(),
            foreign_key: keys.other_key.clone(),
            owner_column: keys.owner_column().to_string(),
            keys: values,
        }
    }

    fn insert_pivot(&self, keys: &RelationKeys, rows: Vec<PivotRow>) -> ModelResult<RelationCommand> {
        Ok(RelationCommand::InsertPivot {
            table: self.middle_table(keys)?,
            self_key: keys.self_key.clone(),
            other_key: keys.other_key.clone(),
            owner_column: keys.owner_column().to_string(),
            rows,
        })
    }

    fn set_owner_key(&self, keys: &RelationKeys, value: Value) -> ModelResult<()> {
        self.owner.set(&keys.self_key, value)?;
        self.forget_loaded();
        Ok(())
    }

    fn enqueue(&self, command: RelationCommand) {
        self.owner.enqueue(command);
        self.forget_loaded();
    }

    fn forget_loaded(&self) {
        self.owner.relation_cache.borrow_mut().remove(self.descriptor.name());
    }
}
