//! Model System
//!
//! - `core_trait`: the `Model` declaration trait
//! - `meta`: model handles and resolved metadata
//! - `fields`: field declarations and codecs
//! - `record`: model instances and row hydration
//! - `lifecycle`: save and delete

pub mod core_trait;
pub mod fields;
pub mod lifecycle;
pub mod meta;
pub mod record;

pub use core_trait::Model;
pub use fields::{FieldDef, FieldSet, FieldType};
pub use meta::{ModelMeta, ModelType, PIVOT_PREFIX};
pub use record::Record;
