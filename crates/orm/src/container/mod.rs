//! Result containers
//!
//! A `ModelContainer` wraps the rows of one query. Rows are fetched on
//! first access and converted into records one at a time as they are
//! reached; converted records are cached, so every access to an index
//! returns the same `Rc<Record>`. Clones share the cache.

mod render;

use std::cell::RefCell;
use std::ops::{Bound, RangeBounds};
use std::rc::Rc;
use std::vec;

use serde_json::Value;
use tracing::debug;

use crate::backends::Row;
use crate::error::{ModelError, ModelResult};
use crate::model::record::Hydrator;
use crate::model::Record;
use crate::query::EagerLoad;
use crate::relationships::eager_loading::load_relations;

type RowSource = Box<dyn FnOnce() -> ModelResult<Vec<Row>>>;

struct ContainerState {
    model: String,
    source: Option<RowSource>,
    pending: Option<vec::IntoIter<Row>>,
    hydrator: Option<Hydrator>,
    records: Vec<Rc<Record>>,
    failure: Option<ModelError>,
}

/// Lazily materialized query result
#[derive(Clone)]
pub struct ModelContainer {
    state: Rc<RefCell<ContainerState>>,
}

impl ModelContainer {
    pub(crate) fn lazy<F>(hydrator: Hydrator, source: F) -> Self
    where
        F: FnOnce() -> ModelResult<Vec<Row>> + 'static,
    {
        Self::with_state(ContainerState {
            model: hydrator.meta.name().to_string(),
            source: Some(Box::new(source)),
            pending: None,
            hydrator: Some(hydrator),
            records: Vec::new(),
            failure: None,
        })
    }

    /// Container over records that are already loaded
    pub fn from_records(model: &str, records: Vec<Rc<Record>>) -> Self {
        Self::with_state(ContainerState {
            model: model.to_string(),
            source: None,
            pending: None,
            hydrator: None,
            records,
            failure: None,
        })
    }

    fn with_state(state: ContainerState) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn model_name(&self) -> String {
        self.state.borrow().model.clone()
    }

    /// Whether every row has been converted
    pub fn is_exhausted(&self) -> bool {
        let state = self.state.borrow();
        state.source.is_none() && state.pending.is_none() && state.failure.is_none()
    }

    /// Number of records converted so far
    pub fn materialized_len(&self) -> usize {
        self.state.borrow().records.len()
    }

    /// Convert the next row, running the query first if it has not run yet
    fn pull(&self) -> ModelResult<Option<Rc<Record>>> {
        let mut state = self.state.borrow_mut();
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }
        if let Some(source) = state.source.take() {
            match source() {
                Ok(rows) => {
                    debug!(model = state.model.as_str(), rows = rows.len(), "Fetched rows");
                    state.pending = Some(rows.into_iter());
                }
                Err(err) => {
                    state.failure = Some(err.clone());
                    return Err(err);
                }
            }
        }

        let row = match state.pending.as_mut().and_then(Iterator::next) {
            Some(row) => row,
            None => {
                state.pending = None;
                return Ok(None);
            }
        };
        let converted = match &state.hydrator {
            Some(hydrator) => hydrator.hydrate(row),
            None => return Ok(None),
        };
        // A row that fails to convert ends the result at its position
        let record = match converted {
            Ok(record) => record,
            Err(err) => {
                state.pending = None;
                state.failure = Some(err.clone());
                return Err(err);
            }
        };
        state.records.push(Rc::clone(&record));
        Ok(Some(record))
    }

    fn fill_to(&self, len: usize) -> ModelResult<()> {
        while self.materialized_len() < len {
            if self.pull()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    fn fill_all(&self) -> ModelResult<()> {
        while self.pull()?.is_some() {}
        Ok(())
    }

    fn out_of_range(&self, index: isize) -> ModelError {
        ModelError::IndexOutOfRange {
            index,
            len: self.materialized_len(),
        }
    }

    /// Record at `index`, converting rows up to it
    pub fn get(&self, index: usize) -> ModelResult<Rc<Record>> {
        self.fill_to(index.saturating_add(1))?;
        let record = self.state.borrow().records.get(index).cloned();
        record.ok_or_else(|| self.out_of_range(index as isize))
    }

    /// Like `get`, counting negative indices from the end
    pub fn at(&self, index: isize) -> ModelResult<Rc<Record>> {
        if index >= 0 {
            return self.get(index as usize);
        }
        self.fill_all()?;
        let len = self.materialized_len() as isize;
        let position = len + index;
        if position < 0 {
            return Err(self.out_of_range(index));
        }
        self.get(position as usize)
    }

    /// Materialized container of the records in `range`. Bounds past the
    /// end are clamped.
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> ModelResult<ModelContainer> {
        self.fill_all()?;
        let state = self.state.borrow();
        let len = state.records.len();
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&end) => end.saturating_add(1),
            Bound::Excluded(&end) => end,
            Bound::Unbounded => len,
        }
        .min(len)
        .max(start);
        Ok(ModelContainer::from_records(&state.model, state.records[start..end].to_vec()))
    }

    /// Drop the record at `index` from this container. Storage is not
    /// touched.
    pub fn remove(&self, index: usize) -> ModelResult<Rc<Record>> {
        self.fill_to(index.saturating_add(1))?;
        let mut state = self.state.borrow_mut();
        if index < state.records.len() {
            return Ok(state.records.remove(index));
        }
        let len = state.records.len();
        Err(ModelError::IndexOutOfRange {
            index: index as isize,
            len,
        })
    }

    pub fn len(&self) -> ModelResult<usize> {
        self.fill_all()?;
        Ok(self.materialized_len())
    }

    pub fn is_empty(&self) -> ModelResult<bool> {
        self.fill_to(1)?;
        Ok(self.materialized_len() == 0)
    }

    /// Iterate the records, converting rows as they are reached
    pub fn iter(&self) -> ContainerIter {
        ContainerIter {
            container: self.clone(),
            index: 0,
            done: false,
        }
    }

    pub fn to_vec(&self) -> ModelResult<Vec<Rc<Record>>> {
        self.fill_all()?;
        Ok(self.state.borrow().records.clone())
    }

    pub fn first(&self) -> ModelResult<Option<Rc<Record>>> {
        self.fill_to(1)?;
        Ok(self.state.borrow().records.first().cloned())
    }

    pub fn first_or_fail(&self) -> ModelResult<Rc<Record>> {
        self.first()?
            .ok_or_else(|| ModelError::EmptyResult(self.model_name()))
    }

    /// Materialized container of the records matching `predicate`
    pub fn filter<F>(&self, mut predicate: F) -> ModelResult<ModelContainer>
    where
        F: FnMut(&Record) -> bool,
    {
        let records = self
            .to_vec()?
            .into_iter()
            .filter(|record| predicate(&**record))
            .collect();
        Ok(ModelContainer::from_records(&self.model_name(), records))
    }

    /// First record matching `predicate`, converting no further than needed
    pub fn find<F>(&self, mut predicate: F) -> ModelResult<Option<Rc<Record>>>
    where
        F: FnMut(&Record) -> bool,
    {
        for record in self.iter() {
            let record = record?;
            if predicate(&*record) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Lazy iterator over one field of every record. Missing fields yield
    /// null.
    pub fn pluck(&self, field: &str) -> impl Iterator<Item = ModelResult<Value>> {
        let field = field.to_string();
        self.iter()
            .map(move |record| record.map(|record| record.get(&field).unwrap_or(Value::Null)))
    }

    /// Eager-load relations onto every record, one query per relation
    pub fn load<I, S>(&self, relations: I) -> ModelResult<ModelContainer>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let loads: Vec<EagerLoad> = relations
            .into_iter()
            .map(|relation| EagerLoad::new(relation.as_ref()))
            .collect();
        let records = self.to_vec()?;
        if let Some(first) = records.first() {
            let session = first.session().clone();
            let meta = Rc::clone(first.meta());
            load_relations(&session, &meta, &records, &loads)?;
        }
        Ok(self.clone())
    }
}

/// Iterator over a container's records
pub struct ContainerIter {
    container: ModelContainer,
    index: usize,
    done: bool,
}

impl Iterator for ContainerIter {
    type Item = ModelResult<Rc<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let cached = self.container.state.borrow().records.get(self.index).cloned();
        let next = match cached {
            Some(record) => Ok(Some(record)),
            None => self.container.pull(),
        };
        match next {
            Ok(Some(record)) => {
                self.index += 1;
                Some(Ok(record))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl IntoIterator for &ModelContainer {
    type Item = ModelResult<Rc<Record>>;
    type IntoIter = ContainerIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldSet, Model, ModelMeta};
    use crate::session::Session;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::cell::Cell;

    fn rows(values: &[&str]) -> Vec<Row> {
        values
            .iter()
            .map(|value| {
                let mut map = IndexMap::new();
                map.insert("a".to_string(), json!(value));
                Row::new(map)
            })
            .collect()
    }

    fn container(calls: Rc<Cell<usize>>) -> ModelContainer {
        let session = Session::in_memory().unwrap();
        let hydrator = Hydrator::new(session, Rc::new(ModelMeta::anonymous("tests")), None);
        ModelContainer::lazy(hydrator, move || {
            calls.set(calls.get() + 1);
            Ok(rows(&["a", "b", "c"]))
        })
    }

    #[test]
    fn test_nothing_runs_before_access() {
        let calls = Rc::new(Cell::new(0));
        let container = container(Rc::clone(&calls));
        assert_eq!(calls.get(), 0);
        assert_eq!(container.materialized_len(), 0);

        let second = container.get(1).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(container.materialized_len(), 2);
        assert!(Rc::ptr_eq(&second, &container.get(1).unwrap()));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_iteration_is_repeatable() {
        let calls = Rc::new(Cell::new(0));
        let container = container(Rc::clone(&calls));
        let first: Vec<_> = container.iter().collect::<ModelResult<_>>().unwrap();
        let second: Vec<_> = (&container).into_iter().collect::<ModelResult<_>>().unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);
        assert!(container.is_exhausted());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_indexing() {
        let container = container(Rc::new(Cell::new(0)));
        assert_eq!(container.at(-1).unwrap().get("a"), Some(json!("c")));
        assert_eq!(
            container.get(3).unwrap_err(),
            ModelError::IndexOutOfRange { index: 3, len: 3 }
        );
        assert!(container.at(-4).is_err());
    }

    #[test]
    fn test_slice_and_remove() {
        let container = container(Rc::new(Cell::new(0)));
        let head: Vec<Value> = container.slice(0..2).unwrap().pluck("a").collect::<ModelResult<_>>().unwrap();
        assert_eq!(head, vec![json!("a"), json!("b")]);
        let tail: Vec<Value> = container.slice(1..).unwrap().pluck("a").collect::<ModelResult<_>>().unwrap();
        assert_eq!(tail, vec![json!("b"), json!("c")]);

        container.remove(1).unwrap();
        assert_eq!(container.len().unwrap(), 2);
        assert_eq!(container.get(1).unwrap().get("a"), Some(json!("c")));
    }

    #[test]
    fn test_first_and_find() {
        let container = container(Rc::new(Cell::new(0)));
        assert_eq!(container.first().unwrap().unwrap().get("a"), Some(json!("a")));
        let found = container.find(|r| r.get("a") == Some(json!("b"))).unwrap();
        assert!(found.is_some());
        assert_eq!(container.materialized_len(), 2);

        let empty = ModelContainer::from_records("Test", Vec::new());
        assert!(empty.first().unwrap().is_none());
        assert_eq!(
            empty.first_or_fail().unwrap_err(),
            ModelError::EmptyResult("Test".to_string())
        );
        assert!(empty.is_empty().unwrap());
    }

    #[test]
    fn test_failed_source_reports_every_time() {
        let session = Session::in_memory().unwrap();
        let hydrator = Hydrator::new(session, Rc::new(ModelMeta::anonymous("tests")), None);
        let container = ModelContainer::lazy(hydrator, || Err(ModelError::Database("gone".to_string())));
        assert!(container.first().is_err());
        assert!(container.len().is_err());
        assert!(!container.is_exhausted());
    }

    struct Event;

    impl Model for Event {
        const NAME: &'static str = "Event";

        fn fields(fields: &mut FieldSet) {
            fields.date("day");
        }
    }

    #[test]
    fn test_failed_row_is_not_skipped() {
        let session = Session::in_memory().unwrap();
        session
            .execute("CREATE TABLE events (id INTEGER PRIMARY KEY, day DATE)", &[])
            .unwrap();
        session
            .execute(
                "INSERT INTO events (day) VALUES (?), (?)",
                &[json!("not a date"), json!("2024-01-02")],
            )
            .unwrap();
        let hydrator = Hydrator::new(session.clone(), session.meta::<Event>().unwrap(), None);
        let reader = session.clone();
        let container = ModelContainer::lazy(hydrator, move || {
            reader.execute_read("SELECT * FROM events ORDER BY id", &[])
        });

        assert!(matches!(container.get(0), Err(ModelError::Serialization(_))));
        assert!(matches!(container.get(0), Err(ModelError::Serialization(_))));
        assert!(container.len().is_err());
        assert_eq!(container.materialized_len(), 0);
    }
}
