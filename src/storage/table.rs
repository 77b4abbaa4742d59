use crate::core::{ModelError, Result, Value, PRIMARY_KEY};
use crate::result::Row;
use crate::statement::OrderDirection;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Integer,
    Float,
    Text,
}

impl DataType {
    pub fn is_compatible(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (Self::Integer, Value::Integer(_))
                | (Self::Float, Value::Float(_))
                | (Self::Float, Value::Integer(_))
                | (Self::Text, Value::Text(_))
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Text => write!(f, "TEXT"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(ModelError::ExecutionFailed(format!(
                    "Column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        if !self.data_type.is_compatible(value) {
            return Err(ModelError::ExecutionFailed(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

/// Equality conditions resolved to column positions, ANDed.
pub type Predicate<'a> = &'a [(usize, Value)];

/// Rows of one table, keyed by their auto-increment primary key.
///
/// Key order is insertion order, which is the default result order of a scan.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: BTreeMap<i64, Row>,
    next_id: i64,
}

impl Table {
    /// Creates a table; an integer `id` column is prepended unless one is declared.
    pub fn new(name: impl Into<String>, mut columns: Vec<Column>) -> Self {
        if !columns.iter().any(|c| c.name == PRIMARY_KEY) {
            columns.insert(0, Column::new(PRIMARY_KEY, DataType::Integer).not_null());
        }
        Self {
            name: name.into(),
            columns,
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| {
                ModelError::PreparationFailed(format!(
                    "Column '{}' not found in table '{}'",
                    name, self.name
                ))
            })
    }

    fn primary_key_index(&self) -> usize {
        // `new` guarantees the column exists
        self.columns
            .iter()
            .position(|c| c.name == PRIMARY_KEY)
            .unwrap_or(0)
    }

    /// Inserts a row and returns its generated primary key.
    pub fn insert(&mut self, assignments: &[(usize, Value)]) -> Result<i64> {
        let pk = self.primary_key_index();
        let id = self.next_id;

        let mut row: Row = vec![Value::Null; self.columns.len()];
        row[pk] = Value::Integer(id);
        for (idx, value) in assignments {
            if *idx == pk {
                return Err(ModelError::ExecutionFailed(format!(
                    "Primary key of '{}' is generated and cannot be assigned",
                    self.name
                )));
            }
            row[*idx] = value.clone();
        }
        self.validate_row(&row)?;

        self.next_id += 1;
        self.rows.insert(id, row);
        Ok(id)
    }

    /// Applies `assignments` to every row matching `predicate`; returns the affected count.
    pub fn update(&mut self, assignments: &[(usize, Value)], predicate: Predicate<'_>) -> Result<u64> {
        let pk = self.primary_key_index();
        if assignments.iter().any(|(idx, _)| *idx == pk) {
            return Err(ModelError::ExecutionFailed(format!(
                "Primary key of '{}' cannot be updated",
                self.name
            )));
        }

        let ids = self.matching_ids(predicate);
        let mut updated = Vec::with_capacity(ids.len());
        for id in &ids {
            let mut row = self.rows[id].clone();
            for (idx, value) in assignments {
                row[*idx] = value.clone();
            }
            self.validate_row(&row)?;
            updated.push((*id, row));
        }

        // Apply only after every row validated, so a failure leaves the table untouched
        for (id, row) in updated {
            self.rows.insert(id, row);
        }
        Ok(ids.len() as u64)
    }

    pub fn delete(&mut self, predicate: Predicate<'_>) -> u64 {
        let ids = self.matching_ids(predicate);
        for id in &ids {
            self.rows.remove(id);
        }
        ids.len() as u64
    }

    pub fn select(
        &self,
        projection: &[usize],
        predicate: Predicate<'_>,
        order: Option<(usize, OrderDirection)>,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Row>> {
        let mut matched: Vec<&Row> = self
            .rows
            .values()
            .filter(|row| Self::matches(row, predicate))
            .collect();

        if let Some((idx, direction)) = order {
            // Surface the first comparison failure instead of sorting arbitrarily
            let mut failure = None;
            matched.sort_by(|a, b| match a[idx].compare(&b[idx]) {
                Ok(ordering) => match direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                },
                Err(err) => {
                    failure.get_or_insert(err);
                    std::cmp::Ordering::Equal
                }
            });
            if let Some(err) = failure {
                return Err(err);
            }
        }

        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|row| projection.iter().map(|idx| row[*idx].clone()).collect())
            .collect())
    }

    fn matching_ids(&self, predicate: Predicate<'_>) -> Vec<i64> {
        self.rows
            .iter()
            .filter(|(_, row)| Self::matches(row, predicate))
            .map(|(id, _)| *id)
            .collect()
    }

    fn matches(row: &Row, predicate: Predicate<'_>) -> bool {
        // NULL never compares equal, as in SQL
        predicate
            .iter()
            .all(|(idx, value)| !value.is_null() && row[*idx] == *value)
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        for (column, value) in self.columns.iter().zip(row) {
            column.validate(value)?;
        }
        Ok(())
    }
}
