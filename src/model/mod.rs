//! Entity lifecycle: creating, saving, deleting and finding records.
//!
//! A [`ModelContext`] carries the pool, cache and clock. A [`Repository`]
//! binds one [`EntitySchema`](crate::core::EntitySchema) to a context and
//! hands out [`Entity`] values.

mod clock;
mod context;
mod entity;
mod hydrator;
mod repository;

pub use clock::{Clock, ManualClock, SystemClock, TIMESTAMP_FORMAT};
pub use context::{ModelContext, ModelContextBuilder};
pub use entity::{Entity, EntityState};
pub use hydrator::Hydrator;
pub use repository::{Repository, CREATED_AT, IS_HIDDEN, UPDATED_AT};
