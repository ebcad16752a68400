//! # oxygen-orm: query construction and relation resolution
//!
//! A small ORM over SQLite: a chainable query builder compiling to
//! parameterized SQL with null-safe comparisons, model metadata built from
//! the live schema, records with queued relation changes, and lazily
//! materialized result containers with batched eager loading.
//!
//! ```no_run
//! use oxygen_orm::{Model, RelationSet, Session};
//!
//! struct User;
//! struct Post;
//!
//! impl Model for User {
//!     const NAME: &'static str = "User";
//!
//!     fn relations(relations: &mut RelationSet) {
//!         relations.has_many::<Post>("posts");
//!     }
//! }
//!
//! impl Model for Post {
//!     const NAME: &'static str = "Post";
//! }
//!
//! # fn main() -> oxygen_orm::ModelResult<()> {
//! let session = Session::in_memory()?;
//! let users = User::query(&session).has("posts").with_relations(["posts"]).get()?;
//! println!("{}", users);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod conditions;
pub mod config;
pub mod container;
pub mod error;
pub mod model;
pub mod query;
pub mod relationships;
pub mod session;
pub mod sql;
pub mod transaction;

pub use backends::{ColumnInfo, RecordingStorage, Row, SqliteStorage, StatementKind, StatementLog, Storage, StorageError};
pub use conditions::{ConditionClause, Connector, JoinCondition, Operator, Order, OrderClause};
pub use config::SessionConfig;
pub use container::{ContainerIter, ModelContainer};
pub use error::{ModelError, ModelResult, OrmError, OrmResult, RelationshipError};
pub use model::{FieldDef, FieldSet, FieldType, Model, ModelMeta, ModelType, Record};
pub use query::{QueryBuilder, QUERY_ALIAS};
pub use relationships::{
    LazyRelation, PivotRow, PivotSchema, RelationCommand, RelationKind, RelationQueryBuilder, RelationSet,
};
pub use session::Session;
pub use sql::SqlFragment;
pub use transaction::{with_transaction, Transaction};
