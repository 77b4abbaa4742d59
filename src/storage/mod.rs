//! In-memory relational driver.

pub mod memory;
pub mod table;

pub use memory::{MemoryConnection, MemoryDatabase};
pub use table::{Column, DataType, Table};
