//! Relationship Metadata System - relation declarations and key resolution
//!
//! Models declare their relations in `Model::relations`. Key columns left
//! unset are derived from naming conventions the first time the relation
//! is used, once both models are known to the session.

use std::rc::Rc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use serde_json::Value;
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::model::meta::PIVOT_PREFIX;
use crate::model::{Model, ModelMeta, ModelType, Record};
use crate::query::{ExistenceClause, QueryBuilder, QUERY_ALIAS};
use crate::session::Session;

/// Defines the type of relationship between models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// One-to-one, foreign key on the target
    HasOne,
    /// One-to-many, foreign key on the target
    HasMany,
    /// Inverse of HasOne/HasMany, foreign key on the owner
    BelongsTo,
    /// Many-to-many through a pivot table
    BelongsToMany,
}

impl RelationKind {
    /// Returns true if this relationship returns a collection
    pub fn is_many(self) -> bool {
        matches!(self, Self::HasMany | Self::BelongsToMany)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::HasOne => "has_one",
            Self::HasMany => "has_many",
            Self::BelongsTo => "belongs_to",
            Self::BelongsToMany => "belongs_to_many",
        }
    }
}

/// Extra pivot-table columns exposed on many-to-many results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotSchema {
    columns: Vec<String>,
}

impl PivotSchema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            columns: columns.into_iter().map(|c| c.as_ref().to_string()).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Resolved key columns of a relation
#[derive(Debug, Clone, PartialEq)]
pub struct RelationKeys {
    pub kind: RelationKind,
    /// Owner-side key: owner pk for HasOne/HasMany, the foreign key on the
    /// owner for BelongsTo, the pivot column naming the owner for
    /// BelongsToMany
    pub self_key: String,
    /// Target-side key: the foreign key on the target for HasOne/HasMany,
    /// the target key for BelongsTo, the pivot column naming the target for
    /// BelongsToMany
    pub other_key: String,
    pub middle_table: Option<String>,
    pub owner_key: String,
    pub target_key: String,
    pub target_table: String,
    pub pivot_columns: Vec<String>,
}

impl RelationKeys {
    /// Owner field whose value identifies the related rows
    pub fn owner_column(&self) -> &str {
        match self.kind {
            RelationKind::BelongsToMany => &self.owner_key,
            _ => &self.self_key,
        }
    }

    /// Value on a fetched target record matching the owner's
    /// `owner_column`
    pub fn related_key(&self, record: &Record) -> Option<Value> {
        let value = match self.kind {
            RelationKind::BelongsToMany => record.pivot()?.get(&self.self_key),
            _ => record.get(&self.other_key),
        };
        value.filter(|v| !v.is_null())
    }

    /// Target field a mutator reads from the record being associated
    pub fn target_column(&self) -> &str {
        match self.kind {
            RelationKind::BelongsTo => &self.other_key,
            _ => &self.target_key,
        }
    }
}

/// A declared relation
#[derive(Debug)]
pub struct RelationDescriptor {
    name: String,
    kind: RelationKind,
    owner: ModelType,
    target: ModelType,
    self_key: Option<String>,
    other_key: Option<String>,
    middle_table: Option<String>,
    pivot: Option<PivotSchema>,
    resolved: OnceCell<RelationKeys>,
}

impl RelationDescriptor {
    pub fn new(name: &str, kind: RelationKind, owner: ModelType, target: ModelType) -> Self {
        Self {
            name: name.to_string(),
            kind,
            owner,
            target,
            self_key: None,
            other_key: None,
            middle_table: None,
            pivot: None,
            resolved: OnceCell::new(),
        }
    }

    /// Override the owner-side key column
    pub fn self_key(&mut self, column: &str) -> &mut Self {
        self.self_key = Some(column.to_string());
        self
    }

    /// Override the target-side key column
    pub fn other_key(&mut self, column: &str) -> &mut Self {
        self.other_key = Some(column.to_string());
        self
    }

    pub fn middle_table(&mut self, table: &str) -> &mut Self {
        self.middle_table = Some(table.to_string());
        self
    }

    pub fn pivot(&mut self, schema: PivotSchema) -> &mut Self {
        self.pivot = Some(schema);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn owner(&self) -> ModelType {
        self.owner
    }

    pub fn target(&self) -> ModelType {
        self.target
    }

    /// Key columns of the relation, derived once and memoized
    pub fn resolve(&self, session: &Session) -> ModelResult<&RelationKeys> {
        self.resolved.get_or_try_init(|| {
            let keys = self.derive_keys(session)?;
            debug!(
                relation = self.name.as_str(),
                kind = self.kind.name(),
                self_key = keys.self_key.as_str(),
                other_key = keys.other_key.as_str(),
                "Resolved relation keys"
            );
            Ok(keys)
        })
    }

    fn derive_keys(&self, session: &Session) -> ModelResult<RelationKeys> {
        let owner_meta = session.meta_of(&self.owner)?;
        let target_meta = session.meta_of(&self.target)?;
        let owner_name = self.owner.name().to_lowercase();
        let target_name = self.target.name().to_lowercase();

        let (self_key, other_key, middle_table) = match self.kind {
            RelationKind::HasOne | RelationKind::HasMany => {
                let self_key = self.self_key.clone().unwrap_or_else(|| owner_meta.primary_key().to_string());
                let other_key = self.other_key.clone().unwrap_or_else(|| format!("{}_id", owner_name));
                self.require_column(&owner_meta, &self_key)?;
                self.require_column(&target_meta, &other_key)?;
                (self_key, other_key, None)
            }
            RelationKind::BelongsTo => {
                let self_key = self.self_key.clone().unwrap_or_else(|| format!("{}_id", target_name));
                let other_key = self.other_key.clone().unwrap_or_else(|| target_meta.primary_key().to_string());
                self.require_column(&owner_meta, &self_key)?;
                self.require_column(&target_meta, &other_key)?;
                (self_key, other_key, None)
            }
            RelationKind::BelongsToMany => {
                let middle = self.middle_table.clone().unwrap_or_else(|| {
                    let mut names = [owner_name.clone(), target_name.clone()];
                    names.sort();
                    names.join("_")
                });
                if !session.table_exists(&middle)? {
                    return Err(ModelError::Schema(format!(
                        "Pivot table '{}' of relation '{}' does not exist",
                        middle, self.name
                    )));
                }
                let self_key = self.self_key.clone().unwrap_or_else(|| format!("{}_id", owner_name));
                let other_key = self.other_key.clone().unwrap_or_else(|| format!("{}_id", target_name));
                let columns: Vec<String> = session
                    .columns_of(&middle)?
                    .into_iter()
                    .map(|column| column.name)
                    .collect();
                let pivot_columns = self.pivot.as_ref().map(|p| p.columns()).unwrap_or(&[]);
                for column in [&self_key, &other_key].into_iter().chain(pivot_columns) {
                    if !columns.contains(column) {
                        return Err(ModelError::Schema(format!(
                            "Pivot table '{}' of relation '{}' has no column '{}'",
                            middle, self.name, column
                        )));
                    }
                }
                (self_key, other_key, Some(middle))
            }
        };

        Ok(RelationKeys {
            kind: self.kind,
            self_key,
            other_key,
            middle_table,
            owner_key: owner_meta.primary_key().to_string(),
            target_key: target_meta.primary_key().to_string(),
            target_table: target_meta.table().to_string(),
            pivot_columns: self.pivot.as_ref().map(|p| p.columns().to_vec()).unwrap_or_default(),
        })
    }

    fn require_column(&self, meta: &ModelMeta, column: &str) -> ModelResult<()> {
        if meta.has_schema() && meta.field(column).is_none() {
            return Err(ModelError::Schema(format!(
                "Relation '{}' uses column '{}' which table '{}' does not have",
                self.name,
                column,
                meta.table()
            )));
        }
        Ok(())
    }

    /// Query of the records related to one owner key value
    pub(crate) fn query_for(&self, session: &Session, owner_value: Value) -> ModelResult<QueryBuilder> {
        let keys = self.resolve(session)?;
        if owner_value.is_null() {
            return self.batch_query(session, Vec::new());
        }
        Ok(match &keys.middle_table {
            Some(middle) => self
                .pivot_query(session, keys, middle)
                .where_eq(&format!("{}.{}", middle, keys.self_key), owner_value),
            None => session.query_type(&self.target).where_eq(&keys.other_key, owner_value),
        })
    }

    /// Query of the records related to any of the owner key values. An
    /// empty list matches nothing.
    pub(crate) fn batch_query(&self, session: &Session, owner_values: Vec<Value>) -> ModelResult<QueryBuilder> {
        let keys = self.resolve(session)?;
        Ok(match &keys.middle_table {
            Some(middle) => self
                .pivot_query(session, keys, middle)
                .where_in(&format!("{}.{}", middle, keys.self_key), owner_values),
            None => session.query_type(&self.target).where_in(&keys.other_key, owner_values),
        })
    }

    /// `SELECT oxygent.*, <pivot columns> FROM target oxygent CROSS JOIN
    /// middle ON oxygent.<target pk> = middle.<other_key>`
    fn pivot_query(&self, session: &Session, keys: &RelationKeys, middle: &str) -> QueryBuilder {
        let mut fields = vec![format!("{}.*", QUERY_ALIAS)];
        let mut pivot_columns = vec![&keys.self_key, &keys.other_key];
        pivot_columns.extend(keys.pivot_columns.iter());
        for column in pivot_columns {
            fields.push(format!("{}.{} AS {}{}", middle, column, PIVOT_PREFIX, column));
        }

        session
            .query_type(&self.target)
            .alias(QUERY_ALIAS)
            .select(fields)
            .cross_join(middle)
            .on(
                &format!("{}.{}", QUERY_ALIAS, keys.target_key),
                "=",
                &format!("{}.{}", middle, keys.other_key),
            )
            .with_pivot(Rc::new(ModelMeta::anonymous(middle)))
    }

    /// Correlated `[NOT] EXISTS` filter for owner queries aliased `alias`
    pub(crate) fn existence(&self, session: &Session, negated: bool, alias: &str) -> ModelResult<ExistenceClause> {
        let keys = self.resolve(session)?;
        let clause = match (&keys.middle_table, keys.kind) {
            (Some(middle), _) => ExistenceClause {
                negated,
                table: middle.clone(),
                inner_column: format!("{}.{}", middle, keys.self_key),
                outer_column: format!("{}.{}", alias, keys.owner_key),
                null_column: None,
            },
            (None, RelationKind::BelongsTo) => ExistenceClause {
                negated,
                table: keys.target_table.clone(),
                inner_column: format!("{}.{}", keys.target_table, keys.other_key),
                outer_column: format!("{}.{}", alias, keys.self_key),
                null_column: negated.then(|| format!("{}.{}", alias, keys.self_key)),
            },
            (None, _) => ExistenceClause {
                negated,
                table: keys.target_table.clone(),
                inner_column: format!("{}.{}", keys.target_table, keys.other_key),
                outer_column: format!("{}.{}", alias, keys.self_key),
                null_column: None,
            },
        };
        Ok(clause)
    }
}

/// Relation declarations of one model
pub struct RelationSet {
    owner: ModelType,
    relations: IndexMap<String, RelationDescriptor>,
}

impl RelationSet {
    pub fn new(owner: ModelType) -> Self {
        Self {
            owner,
            relations: IndexMap::new(),
        }
    }

    pub fn has_one<T: Model>(&mut self, name: &str) -> &mut RelationDescriptor {
        self.declare(name, RelationKind::HasOne, ModelType::of::<T>())
    }

    pub fn has_many<T: Model>(&mut self, name: &str) -> &mut RelationDescriptor {
        self.declare(name, RelationKind::HasMany, ModelType::of::<T>())
    }

    pub fn belongs_to<T: Model>(&mut self, name: &str) -> &mut RelationDescriptor {
        self.declare(name, RelationKind::BelongsTo, ModelType::of::<T>())
    }

    pub fn belongs_to_many<T: Model>(&mut self, name: &str) -> &mut RelationDescriptor {
        self.declare(name, RelationKind::BelongsToMany, ModelType::of::<T>())
    }

    /// Declaring a name twice replaces the earlier declaration
    fn declare(&mut self, name: &str, kind: RelationKind, target: ModelType) -> &mut RelationDescriptor {
        let descriptor = RelationDescriptor::new(name, kind, self.owner, target);
        match self.relations.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(descriptor);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(descriptor),
        }
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub(crate) fn into_map(self) -> IndexMap<String, Rc<RelationDescriptor>> {
        self.relations
            .into_iter()
            .map(|(name, descriptor)| (name, Rc::new(descriptor)))
            .collect()
    }
}

/// Hashable form of a key value
pub(crate) fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
