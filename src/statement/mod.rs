//! Parameterized statement construction.
//!
//! [`StatementBuilder`] turns an [`EntitySchema`](crate::core::EntitySchema) plus filter
//! or assignment values into a [`Statement`]: SQL text with positional `?` placeholders
//! and the parameter list that binds to them, in placeholder order.

mod builder;

pub use builder::StatementBuilder;

use std::fmt;
use std::str::FromStr;
use crate::core::{ModelError, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

impl FromStr for OrderDirection {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(ModelError::PreparationFailed(format!(
                "Unknown order direction '{}'",
                other
            ))),
        }
    }
}

/// A built statement, ready to hand to a [`Connection`](crate::connection::Connection).
///
/// Besides the SQL text the statement keeps its structured parts, so drivers that
/// do not speak SQL natively can execute it without re-parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub table: String,
    /// Projected columns for SELECT, assigned columns for INSERT/UPDATE.
    pub columns: Vec<String>,
    /// Columns compared for equality in the WHERE clause, ANDed.
    pub predicate: Vec<String>,
    pub order: Option<(String, OrderDirection)>,
    pub limit: Option<u64>,
    pub offset: u64,
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// Ordered set of `field = value` constraints.
///
/// Setting a field twice keeps its original position and replaces the value,
/// so a filter behaves like an insertion-ordered map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pairs: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.pairs.iter().find(|(name, _)| name == field).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.pairs.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filter = Filter::new();
        for (field, value) in iter {
            filter.insert(field, value);
        }
        filter
    }
}

/// Paging and ordering for bulk finds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Maximum rows to return; 0 means unbounded.
    pub limit: u64,
    /// Rows to skip. Only applied together with a non-zero `limit`.
    pub offset: u64,
    pub order_by: Option<String>,
    pub direction: OrderDirection,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a single-row lookup.
    pub fn single() -> Self {
        Self::new().limit(1)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by = Some(field.into());
        self.direction = direction;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_keeps_first_position_on_overwrite() {
        let filter = Filter::new().eq("a", 1).eq("b", 2).eq("a", 3);
        let pairs: Vec<_> = filter.iter().collect();
        assert_eq!(pairs, vec![("a", &Value::Integer(3)), ("b", &Value::Integer(2))]);
    }

    #[test]
    fn test_filter_from_iter() {
        let filter: Filter = vec![("is_hidden", 0), ("lockout", 1)].into_iter().collect();
        assert_eq!(filter.len(), 2);
        assert_eq!(filter.get("lockout"), Some(&Value::Integer(1)));
        assert!(filter.get("missing").is_none());
    }

    #[test]
    fn test_order_direction_parse() {
        assert_eq!("asc".parse::<OrderDirection>().unwrap(), OrderDirection::Asc);
        assert_eq!(" DESC ".parse::<OrderDirection>().unwrap(), OrderDirection::Desc);
        assert!("sideways".parse::<OrderDirection>().is_err());
    }
}
