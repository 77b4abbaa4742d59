// ============================================================================
// recordkit Library
// ============================================================================

//! Active-record style mapping between typed entities and relational tables.
//!
//! ```
//! use std::sync::Arc;
//! use recordkit::storage::{Column, DataType};
//! use recordkit::{EntitySchema, FieldKind, ModelConfig, ModelContext, MemoryDatabase, Writable};
//!
//! # tokio_test::block_on(async {
//! let db = MemoryDatabase::new();
//! db.create_table("ats_users", vec![
//!     Column::new("username", DataType::Text),
//!     Column::new("created_at", DataType::Text),
//!     Column::new("updated_at", DataType::Text),
//! ]).await?;
//!
//! let users = EntitySchema::builder("ats_users")
//!     .field("username", FieldKind::Text, Writable::ON_INSERT)
//!     .field("created_at", FieldKind::Text, Writable::ON_INSERT)
//!     .field("updated_at", FieldKind::Text, Writable::BOTH)
//!     .build()?;
//!
//! let ctx = ModelContext::from_config(&ModelConfig::default(), Arc::new(db)).await?;
//! let repo = ctx.repository(users);
//!
//! let mut user = repo.create();
//! user.set("username", "alice")?;
//! assert!(repo.save(&mut user).await?);
//! assert_eq!(user.id(), Some(1));
//! # Ok::<(), recordkit::ModelError>(())
//! # }).unwrap();
//! ```

pub mod cache;
pub mod config;
pub mod connection;
pub mod core;
pub mod model;
pub mod result;
pub mod statement;
pub mod storage;

// Re-export main types for convenience
pub use core::{
    EntitySchema, EntitySchemaBuilder, FieldDescriptor, FieldKind, ModelError, Result, SchemaPolicy, Value,
    Writable, PRIMARY_KEY,
};
pub use result::{ExecOutcome, QueryResult};
pub use statement::{Filter, FindOptions, OrderDirection, Statement, StatementBuilder};

pub use cache::{CacheBackend, CacheKey, CacheProvider, MemoryCache, NullCache};
#[cfg(feature = "redis")]
pub use cache::{RedisCache, RedisOptions};
pub use config::{CacheConfig, ModelConfig, PoolConfig};
pub use connection::{
    Connection, Driver,
    config::ConnectionConfig,
    pool::{ConnectionPool, PoolGuard, PoolStats},
};
pub use storage::MemoryDatabase;

pub use model::{
    Clock, Entity, EntityState, Hydrator, ManualClock, ModelContext, ModelContextBuilder, Repository, SystemClock,
};
