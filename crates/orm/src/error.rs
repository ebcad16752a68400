//! Error types for the ORM system
//!
//! Provides error handling for clause construction, query compilation,
//! relation mutation, result access and storage operations.

use std::fmt;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Unknown connector, comparison symbol or ordering, or a malformed clause value
    InvalidClause(String),
    /// A WHERE/HAVING fragment was requested for an empty condition list
    EmptyCondition,
    /// A relation mutator received a record of the wrong model
    RelationType { expected: String, found: String },
    /// A relation mutator received a record that has not been persisted
    UnsavedModel(String),
    /// `first_or_fail` on an empty result
    EmptyResult(String),
    /// Container index past the end of the result
    IndexOutOfRange { index: isize, len: usize },
    /// Storage failure, propagated unchanged
    Database(String),
    /// Model not found in database
    NotFound(String),
    /// Field value failed validation
    Validation(String),
    /// Primary key is missing or invalid
    MissingPrimaryKey,
    /// Unknown relation or unusable relation configuration
    Relationship(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Connection error
    Connection(String),
    /// Transaction error
    Transaction(String),
    /// Schema error (missing table, unknown column)
    Schema(String),
    /// Query building error
    Query(String),
    /// Configuration error
    Configuration(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidClause(msg) => write!(f, "Invalid clause: {}", msg),
            ModelError::EmptyCondition => write!(f, "Condition list is empty"),
            ModelError::RelationType { expected, found } => {
                write!(f, "Relation expects a '{}' record, got '{}'", expected, found)
            }
            ModelError::UnsavedModel(model) => {
                write!(f, "Record of '{}' must be saved before it can be associated", model)
            }
            ModelError::EmptyResult(model) => write!(f, "No results for '{}'", model),
            ModelError::IndexOutOfRange { index, len } => {
                write!(f, "Index {} is out of range for a result of {} records", index, len)
            }
            ModelError::Database(msg) => write!(f, "Database error: {}", msg),
            ModelError::NotFound(table) => write!(f, "Record not found in table '{}'", table),
            ModelError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ModelError::MissingPrimaryKey => write!(f, "Primary key is missing or invalid"),
            ModelError::Relationship(msg) => write!(f, "Relationship error: {}", msg),
            ModelError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ModelError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ModelError::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            ModelError::Schema(msg) => write!(f, "Schema error: {}", msg),
            ModelError::Query(msg) => write!(f, "Query error: {}", msg),
            ModelError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Database(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

/// Error types for relationship declarations
#[derive(Debug, Clone)]
pub enum RelationshipError {
    /// Relationship not declared on the model
    NotFound { model: String, relation: String },
    /// Operation not available for this kind of relationship
    UnsupportedOperation { relation: String, operation: String },
    /// Owner record carries no value for the relation key
    MissingKey { relation: String, column: String },
}

impl fmt::Display for RelationshipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipError::NotFound { model, relation } => {
                write!(f, "Model '{}' has no relation named '{}'", model, relation)
            }
            RelationshipError::UnsupportedOperation { relation, operation } => {
                write!(f, "Relation '{}' does not support '{}'", relation, operation)
            }
            RelationshipError::MissingKey { relation, column } => {
                write!(f, "Relation '{}' needs a value for '{}'", relation, column)
            }
        }
    }
}

impl std::error::Error for RelationshipError {}

impl From<RelationshipError> for ModelError {
    fn from(err: RelationshipError) -> Self {
        ModelError::Relationship(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(ModelError::EmptyCondition.to_string(), "Condition list is empty");
        assert_eq!(
            ModelError::IndexOutOfRange { index: 4, len: 3 }.to_string(),
            "Index 4 is out of range for a result of 3 records"
        );
        let err = ModelError::RelationType { expected: "Post".into(), found: "User".into() };
        assert_eq!(err.to_string(), "Relation expects a 'Post' record, got 'User'");
    }

    #[test]
    fn test_relationship_error_conversion() {
        let err: ModelError = RelationshipError::NotFound {
            model: "User".into(),
            relation: "posts".into(),
        }
        .into();
        assert!(matches!(err, ModelError::Relationship(ref msg) if msg.contains("posts")));
    }
}
