use std::sync::Arc;
use tracing::warn;
use super::Entity;
use crate::core::{EntitySchema, ModelError, Result, Value};
use crate::result::QueryResult;

/// Builds entities from result rows.
///
/// Columns are matched to fields by name. Every declared field is populated
/// regardless of its writability; result columns the schema does not declare
/// are ignored, and declared fields missing from the result stay `Null`.
#[derive(Clone)]
pub struct Hydrator {
    schema: Arc<EntitySchema>,
}

impl Hydrator {
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self { schema }
    }

    pub fn hydrate_row(&self, columns: &[String], row: &[Value]) -> Result<Entity> {
        let positions = self.positions(columns);
        self.build(&positions, columns, row)
    }

    /// Hydrates every row in result order. Rows that cannot be converted are
    /// logged and skipped; the remaining rows are still returned.
    pub fn hydrate_all(&self, result: &QueryResult) -> Vec<Entity> {
        let positions = self.positions(&result.columns);
        let mut entities = Vec::with_capacity(result.row_count());

        for (row_number, row) in result.rows.iter().enumerate() {
            match self.build(&positions, &result.columns, row) {
                Ok(entity) => entities.push(entity),
                Err(err) => warn!(
                    table = self.schema.table(),
                    row = row_number,
                    error = %err,
                    "skipping row that does not match the schema"
                ),
            }
        }

        entities
    }

    fn positions(&self, columns: &[String]) -> Vec<Option<usize>> {
        columns.iter().map(|c| self.schema.index_of(c)).collect()
    }

    fn build(&self, positions: &[Option<usize>], columns: &[String], row: &[Value]) -> Result<Entity> {
        if row.len() != columns.len() {
            return Err(ModelError::SchemaViolation(format!(
                "Row has {} values for {} columns",
                row.len(),
                columns.len()
            )));
        }

        let mut entity = Entity::new(Arc::clone(&self.schema));
        for ((position, column), value) in positions.iter().zip(columns).zip(row) {
            let Some(idx) = *position else {
                continue;
            };
            let kind = self.schema.fields()[idx].kind;
            let value = kind.coerce(value.clone()).ok_or_else(|| {
                ModelError::SchemaViolation(format!(
                    "Column '{}' holds {}, field expects {}",
                    column,
                    value.type_name(),
                    kind
                ))
            })?;
            entity.assign(idx, value);
        }

        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldKind, Writable};
    use crate::model::EntityState;

    fn hydrator() -> Hydrator {
        let schema = EntitySchema::builder("ats_users")
            .field("username", FieldKind::Text, Writable::ON_INSERT)
            .field("created_at", FieldKind::Text, Writable::NONE)
            .field("is_hidden", FieldKind::BooleanInt, Writable::BOTH)
            .build()
            .unwrap();
        Hydrator::new(schema)
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_populates_non_writable_fields() {
        let entity = hydrator()
            .hydrate_row(
                &columns(&["id", "username", "created_at", "is_hidden"]),
                &[Value::Integer(4), "alice".into(), "2024-01-01 00:00:00".into(), Value::Integer(1)],
            )
            .unwrap();

        assert_eq!(entity.id(), Some(4));
        assert_eq!(entity.get("created_at"), Some(&Value::from("2024-01-01 00:00:00")));
        assert_eq!(entity.state(), EntityState::Persisted);
    }

    #[test]
    fn test_maps_by_name_and_ignores_extra_columns() {
        let entity = hydrator()
            .hydrate_row(
                &columns(&["username", "password", "id"]),
                &["bob".into(), "secret".into(), Value::Integer(2)],
            )
            .unwrap();

        assert_eq!(entity.id(), Some(2));
        assert_eq!(entity.get("username"), Some(&Value::from("bob")));
        assert_eq!(entity.get("is_hidden"), Some(&Value::Null));
        assert_eq!(entity.get("password"), None);
    }

    #[test]
    fn test_bulk_skips_bad_rows_and_keeps_order() {
        let result = QueryResult::new(
            columns(&["id", "username"]),
            vec![
                vec![Value::Integer(3), "c".into()],
                vec![Value::Text("oops".into()), "x".into()],
                vec![Value::Integer(1), "a".into()],
            ],
        );

        let entities = hydrator().hydrate_all(&result);
        let ids: Vec<_> = entities.iter().map(Entity::id).collect();
        assert_eq!(ids, vec![Some(3), Some(1)]);
    }

    #[test]
    fn test_row_width_mismatch_is_rejected() {
        let err = hydrator()
            .hydrate_row(&columns(&["id", "username"]), &[Value::Integer(1)])
            .unwrap_err();
        assert!(matches!(err, ModelError::SchemaViolation(_)));
    }
}
