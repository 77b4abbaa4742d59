use super::table::{Column, Table};
use crate::connection::{Connection, Driver};
use crate::core::{ModelError, Result, Value};
use crate::result::{ExecOutcome, QueryResult};
use crate::statement::{Statement, StatementKind};
use async_trait::async_trait;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// In-process relational store implementing [`Driver`].
///
/// Statement text is checked with a SQL parser and its table and columns are
/// resolved against the catalog before anything runs; execution then works from
/// the statement's structured parts. Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    tables: RwLock<HashMap<String, Table>>,
    queries: AtomicU64,
    statements: AtomicU64,
}

/// A statement with its table and column names resolved to positions.
struct Plan {
    assignments: Vec<(usize, Value)>,
    predicate: Vec<(usize, Value)>,
    projection: Vec<usize>,
    order: Option<(usize, crate::statement::OrderDirection)>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table. An integer `id` primary key is added unless declared.
    pub async fn create_table(&self, name: &str, columns: Vec<Column>) -> Result<()> {
        let mut tables = self.inner.tables.write().await;
        if tables.contains_key(name) {
            return Err(ModelError::ExecutionFailed(format!(
                "Table '{}' already exists",
                name
            )));
        }
        tables.insert(name.to_string(), Table::new(name, columns));
        Ok(())
    }

    pub async fn drop_table(&self, name: &str) -> Result<()> {
        match self.inner.tables.write().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(ModelError::ExecutionFailed(format!(
                "Table '{}' not found",
                name
            ))),
        }
    }

    pub async fn row_count(&self, table: &str) -> Option<usize> {
        self.inner.tables.read().await.get(table).map(Table::row_count)
    }

    /// Number of SELECT statements executed so far.
    pub fn query_count(&self) -> u64 {
        self.inner.queries.load(Ordering::SeqCst)
    }

    /// Number of INSERT/UPDATE/DELETE statements executed so far.
    pub fn statement_count(&self) -> u64 {
        self.inner.statements.load(Ordering::SeqCst)
    }

    async fn execute(&self, statement: &Statement) -> Result<ExecOutcome> {
        check_syntax(statement)?;
        let mut tables = self.inner.tables.write().await;
        let table = lookup_mut(&mut tables, &statement.table)?;
        let plan = resolve(table, statement)?;

        self.inner.statements.fetch_add(1, Ordering::SeqCst);
        match statement.kind {
            StatementKind::Insert => {
                let id = table.insert(&plan.assignments)?;
                Ok(ExecOutcome::inserted(id))
            }
            StatementKind::Update => {
                let affected = table.update(&plan.assignments, &plan.predicate)?;
                Ok(ExecOutcome::affected(affected))
            }
            StatementKind::Delete => Ok(ExecOutcome::affected(table.delete(&plan.predicate))),
            StatementKind::Select => Err(ModelError::ExecutionFailed(
                "SELECT must be run as a query".into(),
            )),
        }
    }

    async fn query(&self, statement: &Statement) -> Result<QueryResult> {
        if statement.kind != StatementKind::Select {
            return Err(ModelError::ExecutionFailed(format!(
                "{} does not return rows",
                statement.kind
            )));
        }
        check_syntax(statement)?;
        let tables = self.inner.tables.read().await;
        let table = tables.get(&statement.table).ok_or_else(|| table_not_found(&statement.table))?;
        let plan = resolve(table, statement)?;

        self.inner.queries.fetch_add(1, Ordering::SeqCst);
        let rows = table.select(
            &plan.projection,
            &plan.predicate,
            plan.order,
            statement.limit,
            statement.offset,
        )?;
        Ok(QueryResult::new(statement.columns.clone(), rows))
    }
}

#[async_trait]
impl Driver for MemoryDatabase {
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(MemoryConnection { db: self.clone() }))
    }
}

/// Connection handed out by [`MemoryDatabase`].
pub struct MemoryConnection {
    db: MemoryDatabase,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(&mut self, statement: &Statement) -> Result<ExecOutcome> {
        self.db.execute(statement).await
    }

    async fn query(&mut self, statement: &Statement) -> Result<QueryResult> {
        self.db.query(statement).await
    }
}

fn check_syntax(statement: &Statement) -> Result<()> {
    let parsed = Parser::parse_sql(&MySqlDialect {}, &statement.sql)
        .map_err(|e| ModelError::PreparationFailed(format!("{}: {}", statement.sql, e)))?;
    if parsed.len() != 1 {
        return Err(ModelError::PreparationFailed(format!(
            "Expected exactly one statement, found {}",
            parsed.len()
        )));
    }
    if statement.placeholder_count() != statement.params.len() {
        return Err(ModelError::PreparationFailed(format!(
            "Statement has {} placeholders but {} parameters",
            statement.placeholder_count(),
            statement.params.len()
        )));
    }
    Ok(())
}

fn table_not_found(name: &str) -> ModelError {
    ModelError::PreparationFailed(format!("Table '{}' not found", name))
}

fn lookup_mut<'a>(tables: &'a mut HashMap<String, Table>, name: &str) -> Result<&'a mut Table> {
    tables.get_mut(name).ok_or_else(|| table_not_found(name))
}

/// Pairs the statement's columns with its parameters in placeholder order:
/// assignments first, then WHERE columns.
fn resolve(table: &Table, statement: &Statement) -> Result<Plan> {
    let mut params = statement.params.iter().cloned();

    let (assignments, projection) = match statement.kind {
        StatementKind::Select => {
            let projection = statement
                .columns
                .iter()
                .map(|c| table.column_index(c))
                .collect::<Result<Vec<_>>>()?;
            (Vec::new(), projection)
        }
        _ => {
            let mut assignments = Vec::with_capacity(statement.columns.len());
            for column in &statement.columns {
                let value = params.next().unwrap_or(Value::Null);
                assignments.push((table.column_index(column)?, value));
            }
            (assignments, Vec::new())
        }
    };

    let mut predicate = Vec::with_capacity(statement.predicate.len());
    for column in &statement.predicate {
        let value = params.next().unwrap_or(Value::Null);
        predicate.push((table.column_index(column)?, value));
    }

    let order = match &statement.order {
        Some((column, direction)) => Some((table.column_index(column)?, *direction)),
        None => None,
    };

    Ok(Plan {
        assignments,
        predicate,
        projection,
        order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntitySchema, FieldKind, Writable};
    use crate::statement::{Filter, FindOptions, StatementBuilder};
    use crate::storage::DataType;

    async fn setup() -> (MemoryDatabase, std::sync::Arc<EntitySchema>) {
        let db = MemoryDatabase::new();
        db.create_table(
            "notes",
            vec![
                Column::new("title", DataType::Text),
                Column::new("score", DataType::Float),
            ],
        )
        .await
        .unwrap();
        let schema = EntitySchema::builder("notes")
            .field("title", FieldKind::Text, Writable::BOTH)
            .field("score", FieldKind::Float, Writable::BOTH)
            .build()
            .unwrap();
        (db, schema)
    }

    #[tokio::test]
    async fn test_insert_then_select() {
        let (db, schema) = setup().await;
        let builder = StatementBuilder::new(&schema);
        let mut conn = db.connect().await.unwrap();

        let insert = builder
            .insert(&[Value::Null, "first".into(), Value::Float(1.5)])
            .unwrap();
        let outcome = conn.execute(&insert).await.unwrap();
        assert_eq!(outcome, ExecOutcome::inserted(1));

        let select = builder
            .select(&Filter::new().eq("title", "first"), &FindOptions::new())
            .unwrap();
        let result = conn.query(&select).await.unwrap();
        assert_eq!(result.columns, vec!["id", "title", "score"]);
        assert_eq!(result.rows, vec![vec![Value::Integer(1), "first".into(), Value::Float(1.5)]]);
        assert_eq!(db.query_count(), 1);
        assert_eq!(db.statement_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_table_fails_preparation() {
        let (db, _) = setup().await;
        let schema = EntitySchema::builder("missing").build().unwrap();
        let select = StatementBuilder::new(&schema)
            .select(&Filter::new(), &FindOptions::new())
            .unwrap();

        let mut conn = db.connect().await.unwrap();
        let err = conn.query(&select).await.unwrap_err();
        assert!(matches!(err, ModelError::PreparationFailed(_)));
        assert_eq!(db.query_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_sql_fails_preparation() {
        let (db, schema) = setup().await;
        let mut select = StatementBuilder::new(&schema)
            .select(&Filter::new(), &FindOptions::new())
            .unwrap();
        select.sql = "SELEC id FROM".into();

        let mut conn = db.connect().await.unwrap();
        assert!(matches!(
            conn.query(&select).await,
            Err(ModelError::PreparationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_type_mismatch_fails_execution() {
        let (db, schema) = setup().await;
        let mut insert = StatementBuilder::new(&schema)
            .insert(&[Value::Null, "x".into(), Value::Float(0.0)])
            .unwrap();
        insert.params[1] = "not a number".into();

        let mut conn = db.connect().await.unwrap();
        assert!(matches!(
            conn.execute(&insert).await,
            Err(ModelError::ExecutionFailed(_))
        ));
        assert_eq!(db.row_count("notes").await, Some(0));
    }

    #[tokio::test]
    async fn test_duplicate_table_rejected() {
        let (db, _) = setup().await;
        assert!(db.create_table("notes", Vec::new()).await.is_err());
        db.drop_table("notes").await.unwrap();
        assert_eq!(db.row_count("notes").await, None);
    }
}
