//! Loaded relation values and the deferred to-one handle

use std::fmt;
use std::rc::Rc;

use crate::container::ModelContainer;
use crate::error::{ModelError, ModelResult};
use crate::model::Record;

/// A relation value cached on a record
#[derive(Clone)]
pub enum Related {
    One(Option<Rc<Record>>),
    Many(ModelContainer),
}

impl Related {
    pub fn into_many(self, name: &str) -> ModelResult<ModelContainer> {
        match self {
            Related::Many(container) => Ok(container),
            Related::One(_) => Err(ModelError::Relationship(format!(
                "Relation '{}' is singular, use one()",
                name
            ))),
        }
    }

    pub fn into_one(self, name: &str) -> ModelResult<Option<Rc<Record>>> {
        match self {
            Related::One(record) => Ok(record),
            Related::Many(_) => Err(ModelError::Relationship(format!(
                "Relation '{}' returns many records, use many()",
                name
            ))),
        }
    }
}

impl fmt::Debug for Related {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Related::One(record) => f.debug_tuple("One").field(record).finish(),
            Related::Many(container) => f.debug_tuple("Many").field(&container.model_name()).finish(),
        }
    }
}

type Loader = Box<dyn Fn() -> ModelResult<Option<Rc<Record>>>>;

/// Handle to a to-one relation that queries on first resolution
pub enum LazyRelation {
    Unloaded(Loader),
    Loaded(Rc<Record>),
    Empty,
}

impl LazyRelation {
    /// Run the query if needed. A failed load leaves the handle unloaded.
    pub fn resolve(&mut self) -> ModelResult<Option<Rc<Record>>> {
        let record = match self {
            LazyRelation::Loaded(record) => return Ok(Some(Rc::clone(record))),
            LazyRelation::Empty => return Ok(None),
            LazyRelation::Unloaded(loader) => loader()?,
        };
        *self = LazyRelation::from(record.clone());
        Ok(record)
    }

    pub fn is_loaded(&self) -> bool {
        !matches!(self, LazyRelation::Unloaded(_))
    }
}

impl From<Option<Rc<Record>>> for LazyRelation {
    fn from(record: Option<Rc<Record>>) -> Self {
        match record {
            Some(record) => LazyRelation::Loaded(record),
            None => LazyRelation::Empty,
        }
    }
}

impl fmt::Debug for LazyRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LazyRelation::Unloaded(_) => write!(f, "Unloaded"),
            LazyRelation::Loaded(record) => f.debug_tuple("Loaded").field(record).finish(),
            LazyRelation::Empty => write!(f, "Empty"),
        }
    }
}
