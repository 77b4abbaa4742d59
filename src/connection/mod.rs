//! Database handle abstraction.
//!
//! The mapping layer only needs prepared statements with positional parameters,
//! auto-increment key retrieval and affected-row counts. [`Driver`] opens
//! [`Connection`]s; [`pool::ConnectionPool`] hands them out one operation at a time.

pub mod config;
pub mod pool;

use async_trait::async_trait;
use crate::core::Result;
use crate::result::{ExecOutcome, QueryResult};
use crate::statement::Statement;

/// One open database session.
///
/// Implementations report a statement that cannot be prepared as
/// `ModelError::PreparationFailed` and a statement that fails while running as
/// `ModelError::ExecutionFailed`.
#[async_trait]
pub trait Connection: Send {
    /// Runs an INSERT, UPDATE or DELETE.
    async fn execute(&mut self, statement: &Statement) -> Result<ExecOutcome>;

    /// Runs a SELECT and materializes every row.
    async fn query(&mut self, statement: &Statement) -> Result<QueryResult>;

    /// Whether the session can still be reused. Invalid connections are not returned to the pool.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Factory for connections to one database.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    async fn connect(&self) -> Result<Box<dyn Connection>>;
}
