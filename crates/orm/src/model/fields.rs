//! Field definitions and codecs
//!
//! Each field validates values assigned to it, encodes them into what the
//! storage keeps and decodes stored values back.

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde_json::{Number, Value};

use crate::backends::ColumnInfo;
use crate::error::{ModelError, ModelResult};

const DATE_FORMAT: &str = "%Y-%m-%d";
const STORED_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Id,
    Integer,
    Float,
    Text,
    Bool,
    Json,
    Date,
    Datetime,
}

impl FieldType {
    /// Map a declared SQLite column type onto a field type
    pub fn from_declared(declared: &str) -> Self {
        let declared = declared.to_ascii_uppercase();
        if declared.contains("BOOL") {
            FieldType::Bool
        } else if declared.contains("INT") {
            FieldType::Integer
        } else if declared.contains("REAL") || declared.contains("FLOA") || declared.contains("DOUB") {
            FieldType::Float
        } else if declared.contains("JSON") {
            FieldType::Json
        } else if declared.contains("DATETIME") || declared.contains("TIMESTAMP") {
            FieldType::Datetime
        } else if declared.contains("DATE") {
            FieldType::Date
        } else {
            FieldType::Text
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Id => "id",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Bool => "bool",
            FieldType::Json => "json",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub default: Option<Value>,
}

impl FieldDef {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            nullable: true,
            default: None,
        }
    }

    pub(crate) fn from_column(column: &ColumnInfo) -> Self {
        let field_type = if column.is_primary {
            FieldType::Id
        } else {
            FieldType::from_declared(&column.data_type)
        };
        Self {
            name: column.name.clone(),
            field_type,
            nullable: column.nullable,
            default: None,
        }
    }

    pub fn nullable(&mut self, nullable: bool) -> &mut Self {
        self.nullable = nullable;
        self
    }

    pub fn default_value(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    /// Check a value before it is assigned
    pub fn validate(&self, value: &Value) -> ModelResult<()> {
        if value.is_null() {
            if self.nullable || self.field_type == FieldType::Id {
                return Ok(());
            }
            return Err(ModelError::Validation(format!("Field '{}' cannot be null", self.name)));
        }

        let valid = match self.field_type {
            FieldType::Id | FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Text => value.is_string(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Json => true,
            FieldType::Date => value.as_str().map(|s| parse_date(s).is_some()).unwrap_or(false),
            FieldType::Datetime => value.as_str().map(|s| parse_datetime(s).is_some()).unwrap_or(false),
        };

        if valid {
            Ok(())
        } else {
            Err(ModelError::Validation(format!(
                "Field '{}' expects a {} value, got {}",
                self.name,
                self.field_type.name(),
                value
            )))
        }
    }

    /// Convert an assigned value into its stored form
    pub fn encode(&self, value: &Value) -> ModelResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self.field_type {
            FieldType::Bool => match value {
                Value::Bool(flag) => Ok(Value::from(i64::from(*flag))),
                other => Ok(other.clone()),
            },
            FieldType::Json => Ok(Value::String(serde_json::to_string(value)?)),
            FieldType::Date => {
                let date = value.as_str().and_then(parse_date).ok_or_else(|| self.invalid(value))?;
                Ok(Value::String(date.format(DATE_FORMAT).to_string()))
            }
            FieldType::Datetime => {
                let datetime = value.as_str().and_then(parse_datetime).ok_or_else(|| self.invalid(value))?;
                Ok(Value::String(datetime.format(STORED_DATETIME_FORMAT).to_string()))
            }
            _ => Ok(value.clone()),
        }
    }

    /// Convert a stored value back into its assigned form
    pub fn decode(&self, stored: Value) -> ModelResult<Value> {
        if stored.is_null() {
            return Ok(Value::Null);
        }
        match self.field_type {
            FieldType::Bool => match &stored {
                Value::Bool(_) => Ok(stored),
                Value::Number(n) => Ok(Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false))),
                _ => Err(self.undecodable(&stored)),
            },
            FieldType::Json => match stored {
                Value::String(text) => serde_json::from_str(&text)
                    .map_err(|e| ModelError::Serialization(format!("Field '{}': {}", self.name, e))),
                other => Ok(other),
            },
            FieldType::Float => match &stored {
                Value::Number(n) if !n.is_f64() => Ok(n
                    .as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(stored.clone())),
                _ => Ok(stored),
            },
            FieldType::Date => {
                let date = stored.as_str().and_then(parse_date).ok_or_else(|| self.undecodable(&stored))?;
                Ok(Value::String(date.format(DATE_FORMAT).to_string()))
            }
            FieldType::Datetime => {
                let datetime = stored
                    .as_str()
                    .and_then(parse_datetime)
                    .ok_or_else(|| self.undecodable(&stored))?;
                Ok(Value::String(datetime.format(DATETIME_FORMAT).to_string()))
            }
            _ => Ok(stored),
        }
    }

    fn invalid(&self, value: &Value) -> ModelError {
        ModelError::Validation(format!(
            "Field '{}' expects a {} value, got {}",
            self.name,
            self.field_type.name(),
            value
        ))
    }

    fn undecodable(&self, stored: &Value) -> ModelError {
        ModelError::Serialization(format!(
            "Stored value {} of field '{}' is not a valid {}",
            stored,
            self.name,
            self.field_type.name()
        ))
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, STORED_DATETIME_FORMAT))
        .ok()
}

/// Field declarations collected from `Model::fields`
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    fields: IndexMap<String, FieldDef>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&mut self, name: &str, field_type: FieldType) -> &mut FieldDef {
        self.fields
            .entry(name.to_string())
            .and_modify(|def| def.field_type = field_type)
            .or_insert_with(|| FieldDef::new(name, field_type))
    }

    pub fn id(&mut self, name: &str) -> &mut FieldDef {
        self.field(name, FieldType::Id)
    }

    pub fn integer(&mut self, name: &str) -> &mut FieldDef {
        self.field(name, FieldType::Integer)
    }

    pub fn float(&mut self, name: &str) -> &mut FieldDef {
        self.field(name, FieldType::Float)
    }

    pub fn text(&mut self, name: &str) -> &mut FieldDef {
        self.field(name, FieldType::Text)
    }

    pub fn boolean(&mut self, name: &str) -> &mut FieldDef {
        self.field(name, FieldType::Bool)
    }

    pub fn json(&mut self, name: &str) -> &mut FieldDef {
        self.field(name, FieldType::Json)
    }

    pub fn date(&mut self, name: &str) -> &mut FieldDef {
        self.field(name, FieldType::Date)
    }

    pub fn datetime(&mut self, name: &str) -> &mut FieldDef {
        self.field(name, FieldType::Datetime)
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<FieldDef> {
        self.fields.shift_remove(name)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
