//! Statement recording
//!
//! `RecordingStorage` wraps another storage and appends every statement it
//! runs to a shared `StatementLog`. Schema introspection and transaction
//! control are passed through without being recorded.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::backends::core::{ColumnInfo, Row, Storage};
use crate::error::OrmResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Shared, cloneable log of executed statements
#[derive(Debug, Clone, Default)]
pub struct StatementLog {
    entries: Rc<RefCell<Vec<RecordedStatement>>>,
}

impl StatementLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, kind: StatementKind, sql: &str, params: &[Value]) {
        self.entries.borrow_mut().push(RecordedStatement {
            kind,
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }

    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.entries.borrow().clone()
    }

    pub fn reads(&self) -> Vec<String> {
        self.of_kind(StatementKind::Read)
    }

    pub fn writes(&self) -> Vec<String> {
        self.of_kind(StatementKind::Write)
    }

    fn of_kind(&self, kind: StatementKind) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.sql.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Storage decorator that records statements into a `StatementLog`
pub struct RecordingStorage<S> {
    inner: S,
    log: StatementLog,
}

impl<S: Storage> RecordingStorage<S> {
    pub fn new(inner: S, log: StatementLog) -> Self {
        Self { inner, log }
    }

    pub fn log(&self) -> &StatementLog {
        &self.log
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Storage> Storage for RecordingStorage<S> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        self.log.record(StatementKind::Write, sql, params);
        self.inner.execute(sql, params)
    }

    fn execute_read(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        self.log.record(StatementKind::Read, sql, params);
        self.inner.execute_read(sql, params)
    }

    fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> OrmResult<u64> {
        let flattened: Vec<Value> = rows.iter().flatten().cloned().collect();
        self.log.record(StatementKind::Write, sql, &flattened);
        self.inner.execute_many(sql, rows)
    }

    fn last_insert_key(&mut self) -> OrmResult<Option<Value>> {
        self.inner.last_insert_key()
    }

    fn table_exists(&mut self, table: &str) -> OrmResult<bool> {
        self.inner.table_exists(table)
    }

    fn columns_of(&mut self, table: &str) -> OrmResult<Vec<ColumnInfo>> {
        self.inner.columns_of(table)
    }

    fn begin(&mut self) -> OrmResult<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> OrmResult<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> OrmResult<()> {
        self.inner.rollback()
    }
}
