use crate::core::Value;

pub type Row = Vec<Value>;

/// Rows returned by a SELECT, with column names in result order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What a driver reports after an INSERT, UPDATE or DELETE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub affected_rows: u64,
    /// Primary key assigned by the last INSERT, if any.
    pub last_insert_id: Option<i64>,
}

impl ExecOutcome {
    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            last_insert_id: None,
        }
    }

    pub fn inserted(id: i64) -> Self {
        Self {
            affected_rows: 1,
            last_insert_id: Some(id),
        }
    }
}
