//! Relationships
//!
//! - `metadata`: relation declarations and key resolution
//! - `query_builder`: per-record relation reads and mutators
//! - `commands`: queued association changes applied on save
//! - `lazy`: cached relation values and the deferred to-one handle
//! - `eager_loading`: batch loading of relations over many records

pub mod commands;
pub mod eager_loading;
pub mod lazy;
pub mod metadata;
pub mod query_builder;

pub use commands::{PivotRow, RelationCommand};
pub use lazy::{LazyRelation, Related};
pub use metadata::{PivotSchema, RelationDescriptor, RelationKeys, RelationKind, RelationSet};
pub use query_builder::RelationQueryBuilder;
