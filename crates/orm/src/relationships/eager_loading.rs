//! Eager Loading System - Prevents N+1 query problems with batch loading
//!
//! For each requested relation the owner keys of every record are
//! collected, one query fetches all related rows, and the results are
//! partitioned back onto their owners' relation caches.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use crate::container::ModelContainer;
use crate::error::ModelResult;
use crate::model::{ModelMeta, Record};
use crate::query::EagerLoad;
use crate::relationships::lazy::Related;
use crate::relationships::metadata::key_string;
use crate::session::Session;

/// Load `loads` onto `records`, one query per relation
pub(crate) fn load_relations(
    session: &Session,
    meta: &ModelMeta,
    records: &[Rc<Record>],
    loads: &[EagerLoad],
) -> ModelResult<()> {
    if records.is_empty() {
        return Ok(());
    }
    for load in loads {
        load_relation(session, meta, records, load)?;
    }
    Ok(())
}

fn load_relation(
    session: &Session,
    meta: &ModelMeta,
    records: &[Rc<Record>],
    load: &EagerLoad,
) -> ModelResult<()> {
    let descriptor = meta.relation(&load.relation)?;
    let keys = descriptor.resolve(session)?;
    let owner_column = keys.owner_column();

    let mut owner_keys = Vec::new();
    let mut seen = HashSet::new();
    for record in records {
        if let Some(value) = record.get(owner_column).filter(|v| !v.is_null()) {
            if seen.insert(key_string(&value)) {
                owner_keys.push(value);
            }
        }
    }

    let mut related: HashMap<String, Vec<Rc<Record>>> = HashMap::new();
    if !owner_keys.is_empty() {
        let mut query = descriptor.batch_query(session, owner_keys)?;
        if let Some(constraint) = &load.constraint {
            query = constraint(query);
        }
        for record in query.all()?.to_vec()? {
            if let Some(value) = keys.related_key(&record) {
                related.entry(key_string(&value)).or_default().push(record);
            }
        }
    }
    debug!(
        relation = load.relation.as_str(),
        owners = records.len(),
        groups = related.len(),
        "Eager loaded relation"
    );

    let target_name = descriptor.target().name();
    for record in records {
        let matches = record
            .get(owner_column)
            .filter(|v| !v.is_null())
            .and_then(|value| related.get(&key_string(&value)))
            .cloned()
            .unwrap_or_default();
        let value = if descriptor.kind().is_many() {
            Related::Many(ModelContainer::from_records(target_name, matches))
        } else {
            Related::One(matches.into_iter().next())
        };
        record.cache_relation(&load.relation, value);
    }
    Ok(())
}
