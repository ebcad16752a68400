//! Text and JSON renderings of a container

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use super::ModelContainer;
use crate::error::ModelResult;

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ModelContainer {
    /// Field maps of every record, in column order
    pub fn to_dicts(&self) -> ModelResult<Vec<IndexMap<String, Value>>> {
        Ok(self.to_vec()?.iter().map(|record| record.to_map()).collect())
    }

    /// Compact JSON array of the records
    pub fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string(&self.to_dicts()?)?)
    }

    /// Indented listing: the model name, then each record numbered from 1
    /// with one `field: value` line per field
    pub fn pretty(&self) -> ModelResult<String> {
        let mut out = format!("{}:\n", self.model_name());
        for (position, record) in self.to_vec()?.iter().enumerate() {
            out.push_str(&format!("\t{}:\n", position + 1));
            for (field, value) in record.to_map() {
                out.push_str(&format!("\t\t{}: {}\n", field, display_value(&value)));
            }
        }
        Ok(out)
    }
}

impl fmt::Display for ModelContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pretty() {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "{}: <{}>", self.model_name(), err),
        }
    }
}

impl fmt::Debug for ModelContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
