use crate::core::{EntitySchema, ModelError, Result, Value, Writable, PRIMARY_KEY};
use super::{Filter, FindOptions, Statement, StatementKind};

/// Builds SELECT/INSERT/UPDATE/DELETE statements for one entity type.
///
/// Values passed to `insert` and `update` are an entity's full value list,
/// aligned with the schema's declaration order.
pub struct StatementBuilder<'a> {
    schema: &'a EntitySchema,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(schema: &'a EntitySchema) -> Self {
        Self { schema }
    }

    pub fn select(&self, filter: &Filter, options: &FindOptions) -> Result<Statement> {
        let table = self.schema.table();
        let columns: Vec<String> = self.schema.field_names().map(str::to_string).collect();

        let mut predicate = Vec::with_capacity(filter.len());
        let mut params = Vec::with_capacity(filter.len());
        for (name, value) in filter.iter() {
            params.push(self.bind(name, value.clone())?);
            predicate.push(name.to_string());
        }

        let order = match &options.order_by {
            Some(field) => {
                if !self.schema.has_field(field) {
                    return Err(ModelError::PreparationFailed(format!(
                        "Cannot order '{}' by unknown field '{}'",
                        table, field
                    )));
                }
                Some((field.clone(), options.direction))
            }
            None => None,
        };

        let mut sql = format!(
            "SELECT {} FROM {} WHERE {}",
            column_list(&columns),
            quote(table),
            where_clause(&predicate)
        );
        if let Some((field, direction)) = &order {
            sql.push_str(&format!(" ORDER BY {} {}", quote(field), direction));
        }
        let (limit, offset) = if options.limit > 0 {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", options.limit, options.offset));
            (Some(options.limit), options.offset)
        } else {
            (None, 0)
        };

        Ok(Statement {
            kind: StatementKind::Select,
            table: table.to_string(),
            columns,
            predicate,
            order,
            limit,
            offset,
            sql,
            params,
        })
    }

    pub fn insert(&self, values: &[Value]) -> Result<Statement> {
        self.check_arity(values)?;
        let (columns, params) = self.writable_columns(values, Writable::ON_INSERT);

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(self.schema.table()),
            column_list(&columns),
            placeholders
        );

        Ok(Statement {
            kind: StatementKind::Insert,
            table: self.schema.table().to_string(),
            columns,
            predicate: Vec::new(),
            order: None,
            limit: None,
            offset: 0,
            sql,
            params,
        })
    }

    pub fn update(&self, values: &[Value]) -> Result<Statement> {
        self.check_arity(values)?;
        let id = self.primary_key(values)?;
        let (columns, mut params) = self.writable_columns(values, Writable::ON_UPDATE);

        if columns.is_empty() {
            return Err(ModelError::PreparationFailed(format!(
                "'{}' declares no updatable fields",
                self.schema.table()
            )));
        }

        let assignments = columns
            .iter()
            .map(|c| format!("{} = ?", quote(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote(self.schema.table()),
            assignments,
            quote(PRIMARY_KEY)
        );
        params.push(id);

        Ok(Statement {
            kind: StatementKind::Update,
            table: self.schema.table().to_string(),
            columns,
            predicate: vec![PRIMARY_KEY.to_string()],
            order: None,
            limit: None,
            offset: 0,
            sql,
            params,
        })
    }

    pub fn delete(&self, id: &Value) -> Result<Statement> {
        let id = self.bind(PRIMARY_KEY, id.clone())?;
        if id.is_null() {
            return Err(ModelError::PreparationFailed(format!(
                "Cannot delete from '{}' without a primary key",
                self.schema.table()
            )));
        }

        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote(self.schema.table()),
            quote(PRIMARY_KEY)
        );

        Ok(Statement {
            kind: StatementKind::Delete,
            table: self.schema.table().to_string(),
            columns: Vec::new(),
            predicate: vec![PRIMARY_KEY.to_string()],
            order: None,
            limit: None,
            offset: 0,
            sql,
            params: vec![id],
        })
    }

    /// Coerces a filter value to the declared kind of `field`.
    fn bind(&self, field: &str, value: Value) -> Result<Value> {
        let descriptor = self.schema.field(field).ok_or_else(|| {
            ModelError::PreparationFailed(format!(
                "Unknown field '{}' on '{}'",
                field,
                self.schema.table()
            ))
        })?;

        let type_name = value.type_name();
        descriptor.kind.coerce(value).ok_or_else(|| {
            ModelError::PreparationFailed(format!(
                "Field '{}' expects {}, got {}",
                field, descriptor.kind, type_name
            ))
        })
    }

    fn writable_columns(&self, values: &[Value], rule: Writable) -> (Vec<String>, Vec<Value>) {
        self.schema
            .fields()
            .iter()
            .zip(values)
            .filter(|(field, _)| !field.is_primary_key() && field.writable.contains(rule))
            .map(|(field, value)| (field.name.clone(), value.clone()))
            .unzip()
    }

    fn primary_key(&self, values: &[Value]) -> Result<Value> {
        match self.schema.index_of(PRIMARY_KEY).map(|idx| &values[idx]) {
            Some(id @ Value::Integer(_)) => Ok(id.clone()),
            _ => Err(ModelError::PreparationFailed(format!(
                "Cannot update '{}' without a primary key",
                self.schema.table()
            ))),
        }
    }

    fn check_arity(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.schema.field_count() {
            return Err(ModelError::PreparationFailed(format!(
                "'{}' expects {} values, got {}",
                self.schema.table(),
                self.schema.field_count(),
                values.len()
            )));
        }
        Ok(())
    }
}

fn quote(identifier: &str) -> String {
    format!("`{}`", identifier)
}

fn column_list(columns: &[String]) -> String {
    columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
}

fn where_clause(predicate: &[String]) -> String {
    if predicate.is_empty() {
        return "1".to_string();
    }
    predicate
        .iter()
        .map(|c| format!("{} = ?", quote(c)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldKind;
    use crate::statement::OrderDirection;
    use std::sync::Arc;

    fn schema() -> Arc<EntitySchema> {
        EntitySchema::builder("ats_users")
            .field("username", FieldKind::Text, Writable::ON_INSERT)
            .field("email", FieldKind::Text, Writable::BOTH)
            .field("created_at", FieldKind::Text, Writable::ON_INSERT)
            .field("updated_at", FieldKind::Text, Writable::BOTH)
            .field("is_hidden", FieldKind::BooleanInt, Writable::BOTH)
            .build()
            .unwrap()
    }

    fn values() -> Vec<Value> {
        vec![
            Value::Integer(7),
            "alice".into(),
            "alice@example.com".into(),
            "2024-01-01 00:00:00".into(),
            "2024-01-02 00:00:00".into(),
            Value::Integer(0),
        ]
    }

    #[test]
    fn test_select_without_filters_selects_all() {
        let schema = schema();
        let stmt = StatementBuilder::new(&schema)
            .select(&Filter::new(), &FindOptions::new())
            .unwrap();

        assert_eq!(
            stmt.sql,
            "SELECT `id`, `username`, `email`, `created_at`, `updated_at`, `is_hidden` FROM `ats_users` WHERE 1"
        );
        assert!(stmt.params.is_empty());
        assert_eq!(stmt.limit, None);
    }

    #[test]
    fn test_select_filters_in_filter_order() {
        let schema = schema();
        let filter = Filter::new().eq("is_hidden", false).eq("email", "a@b.c");
        let options = FindOptions::new()
            .limit(10)
            .offset(20)
            .order_by("created_at", OrderDirection::Desc);
        let stmt = StatementBuilder::new(&schema).select(&filter, &options).unwrap();

        assert!(stmt.sql.ends_with(
            "WHERE `is_hidden` = ? AND `email` = ? ORDER BY `created_at` DESC LIMIT 10 OFFSET 20"
        ));
        assert_eq!(stmt.params, vec![Value::Integer(0), Value::Text("a@b.c".into())]);
        assert_eq!(stmt.placeholder_count(), stmt.params.len());
        assert_eq!(stmt.order, Some(("created_at".to_string(), OrderDirection::Desc)));
    }

    #[test]
    fn test_select_rejects_unknown_fields() {
        let schema = schema();
        let builder = StatementBuilder::new(&schema);

        let err = builder
            .select(&Filter::new().eq("password", "x"), &FindOptions::new())
            .unwrap_err();
        assert!(matches!(err, ModelError::PreparationFailed(_)));

        let err = builder
            .select(&Filter::new(), &FindOptions::new().order_by("password", OrderDirection::Asc))
            .unwrap_err();
        assert!(matches!(err, ModelError::PreparationFailed(_)));
    }

    #[test]
    fn test_select_rejects_mistyped_filter_value() {
        let schema = schema();
        let err = StatementBuilder::new(&schema)
            .select(&Filter::new().eq("id", "seven"), &FindOptions::new())
            .unwrap_err();
        assert!(matches!(err, ModelError::PreparationFailed(_)));
    }

    #[test]
    fn test_insert_uses_insertable_fields_without_primary_key() {
        let schema = schema();
        let stmt = StatementBuilder::new(&schema).insert(&values()).unwrap();

        assert_eq!(
            stmt.sql,
            "INSERT INTO `ats_users` (`username`, `email`, `created_at`, `updated_at`, `is_hidden`) VALUES (?, ?, ?, ?, ?)"
        );
        assert_eq!(stmt.params.len(), 5);
        assert_eq!(stmt.params[0], Value::Text("alice".into()));
    }

    #[test]
    fn test_update_appends_primary_key_last() {
        let schema = schema();
        let stmt = StatementBuilder::new(&schema).update(&values()).unwrap();

        assert_eq!(
            stmt.sql,
            "UPDATE `ats_users` SET `email` = ?, `updated_at` = ?, `is_hidden` = ? WHERE `id` = ?"
        );
        assert_eq!(stmt.columns, vec!["email", "updated_at", "is_hidden"]);
        assert_eq!(stmt.params.last(), Some(&Value::Integer(7)));
        assert_eq!(stmt.params.len(), 4);
    }

    #[test]
    fn test_update_without_primary_key_fails() {
        let schema = schema();
        let mut values = values();
        values[0] = Value::Null;
        assert!(StatementBuilder::new(&schema).update(&values).is_err());
    }

    #[test]
    fn test_delete_binds_single_primary_key() {
        let schema = schema();
        let builder = StatementBuilder::new(&schema);
        let stmt = builder.delete(&Value::Integer(3)).unwrap();

        assert_eq!(stmt.sql, "DELETE FROM `ats_users` WHERE `id` = ?");
        assert_eq!(stmt.params, vec![Value::Integer(3)]);
        assert!(builder.delete(&Value::Null).is_err());
    }

    #[test]
    fn test_value_count_must_match_schema() {
        let schema = schema();
        let err = StatementBuilder::new(&schema)
            .insert(&[Value::Null])
            .unwrap_err();
        assert!(matches!(err, ModelError::PreparationFailed(_)));
    }
}
