//! Relation commands
//!
//! Relation mutators do not touch storage. They queue one of these
//! commands on the owner record; `save()` applies the queue inside the
//! owner's transaction, once the owner's key is known.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::conditions::{ConditionClause, Connector, Operator};
use crate::error::{ModelError, ModelResult};
use crate::relationships::metadata::key_string;
use crate::session::Session;
use crate::sql::{self, SqlFragment};

/// One pivot row to insert: the target key plus extra pivot columns
#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub other: Value,
    pub extra: IndexMap<String, Value>,
}

impl PivotRow {
    pub fn new(other: Value) -> Self {
        Self {
            other,
            extra: IndexMap::new(),
        }
    }
}

/// A pending association change
#[derive(Debug, Clone, PartialEq)]
pub enum RelationCommand {
    /// Point the foreign key of the listed target rows at the owner
    SetForeignKey {
        table: String,
        key_column: String,
        foreign_key: String,
        owner_column: String,
        keys: Vec<Value>,
    },
    /// Null the foreign key of every target row pointing at the owner
    ClearForeignKeys {
        table: String,
        foreign_key: String,
        owner_column: String,
    },
    /// Null the foreign key of the listed target rows pointing at the owner
    UnsetForeignKey {
        table: String,
        key_column: String,
        foreign_key: String,
        owner_column: String,
        keys: Vec<Value>,
    },
    /// Insert pivot rows, skipping pairs that already exist
    InsertPivot {
        table: String,
        self_key: String,
        other_key: String,
        owner_column: String,
        rows: Vec<PivotRow>,
    },
    /// Delete the owner's pivot rows, all of them or those naming `others`
    DeletePivot {
        table: String,
        self_key: String,
        other_key: String,
        owner_column: String,
        others: Option<Vec<Value>>,
    },
}

impl RelationCommand {
    /// Owner field whose saved value the command needs
    pub fn owner_column(&self) -> &str {
        match self {
            RelationCommand::SetForeignKey { owner_column, .. }
            | RelationCommand::ClearForeignKeys { owner_column, .. }
            | RelationCommand::UnsetForeignKey { owner_column, .. }
            | RelationCommand::InsertPivot { owner_column, .. }
            | RelationCommand::DeletePivot { owner_column, .. } => owner_column,
        }
    }

    /// Run the command for the owner key `owner`, returning affected rows
    pub(crate) fn apply(&self, session: &Session, owner: &Value) -> ModelResult<u64> {
        if owner.is_null() {
            return Err(ModelError::MissingPrimaryKey);
        }

        match self {
            RelationCommand::SetForeignKey {
                table,
                key_column,
                foreign_key,
                keys,
                ..
            } => {
                if keys.is_empty() {
                    return Ok(0);
                }
                let conditions = keys
                    .iter()
                    .map(|key| ConditionClause::new(Connector::Or, key_column, Operator::Equal, key.clone()))
                    .collect::<ModelResult<Vec<_>>>()?;
                let mut statement = SqlFragment::new(
                    sql::update_clause(table, std::slice::from_ref(foreign_key)),
                    vec![owner.clone()],
                );
                statement.push(sql::where_clause(&conditions, None)?);
                run(session, statement)
            }
            RelationCommand::ClearForeignKeys {
                table, foreign_key, ..
            } => {
                let conditions = vec![ConditionClause::new(
                    Connector::And,
                    foreign_key,
                    Operator::Equal,
                    owner.clone(),
                )?];
                let mut statement = SqlFragment::new(
                    sql::update_clause(table, std::slice::from_ref(foreign_key)),
                    vec![Value::Null],
                );
                statement.push(sql::where_clause(&conditions, None)?);
                run(session, statement)
            }
            RelationCommand::UnsetForeignKey {
                table,
                key_column,
                foreign_key,
                keys,
                ..
            } => {
                if keys.is_empty() {
                    return Ok(0);
                }
                let conditions = vec![
                    ConditionClause::new(Connector::And, foreign_key, Operator::Equal, owner.clone())?,
                    ConditionClause::new(Connector::And, key_column, Operator::In, Value::Array(keys.clone()))?,
                ];
                let mut statement = SqlFragment::new(
                    sql::update_clause(table, std::slice::from_ref(foreign_key)),
                    vec![Value::Null],
                );
                statement.push(sql::where_clause(&conditions, None)?);
                run(session, statement)
            }
            RelationCommand::InsertPivot {
                table,
                self_key,
                other_key,
                rows,
                ..
            } => insert_pivot_rows(session, table, self_key, other_key, owner, rows),
            RelationCommand::DeletePivot {
                table,
                self_key,
                other_key,
                others,
                ..
            } => {
                let mut conditions = vec![ConditionClause::new(
                    Connector::And,
                    self_key,
                    Operator::Equal,
                    owner.clone(),
                )?];
                if let Some(others) = others {
                    if others.is_empty() {
                        return Ok(0);
                    }
                    conditions.push(ConditionClause::new(
                        Connector::And,
                        other_key,
                        Operator::In,
                        Value::Array(others.clone()),
                    )?);
                }
                let mut statement = SqlFragment::new(sql::delete_clause(table), Vec::new());
                statement.push(sql::where_clause(&conditions, None)?);
                run(session, statement)
            }
        }
    }
}

fn run(session: &Session, statement: SqlFragment) -> ModelResult<u64> {
    session.execute(&statement.sql, &statement.params)
}

fn insert_pivot_rows(
    session: &Session,
    table: &str,
    self_key: &str,
    other_key: &str,
    owner: &Value,
    rows: &[PivotRow],
) -> ModelResult<u64> {
    let existing_sql = format!("SELECT {} FROM {} WHERE {} = ?", other_key, table, self_key);
    let mut seen: HashSet<String> = session
        .execute_read(&existing_sql, std::slice::from_ref(owner))?
        .iter()
        .filter_map(|row| row.get(other_key).map(key_string))
        .collect();

    let fresh: Vec<&PivotRow> = rows
        .iter()
        .filter(|row| seen.insert(key_string(&row.other)))
        .collect();
    let skipped = rows.len() - fresh.len();
    if skipped > 0 {
        debug!(table, skipped, "Skipping pivot rows that already exist");
    }
    if fresh.is_empty() {
        return Ok(0);
    }

    let mut columns = vec![self_key.to_string(), other_key.to_string()];
    for row in &fresh {
        for column in row.extra.keys() {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
    }

    let params: Vec<Vec<Value>> = fresh
        .iter()
        .map(|row| {
            let mut values = vec![owner.clone(), row.other.clone()];
            values.extend(
                columns[2..]
                    .iter()
                    .map(|column| row.extra.get(column).cloned().unwrap_or(Value::Null)),
            );
            values
        })
        .collect();

    session.execute_many(&sql::insert_clause(table, &columns), &params)
}
