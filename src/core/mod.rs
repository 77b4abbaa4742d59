pub mod error;
pub mod types;
pub mod value;

pub use error::{ModelError, Result};
pub use types::{EntitySchema, EntitySchemaBuilder, FieldDescriptor, FieldKind, SchemaPolicy, Writable, PRIMARY_KEY};
pub use value::Value;
