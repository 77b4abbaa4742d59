use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use super::{ModelError, Result, Value};

/// Name of the implicit, server-assigned primary key column.
pub const PRIMARY_KEY: &str = "id";

/// Scalar kind of a declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Integer,
    Float,
    Text,
    /// Boolean persisted as an integer column holding 0 or 1.
    BooleanInt,
}

impl FieldKind {
    /// Converts `value` into the representation stored for this kind.
    ///
    /// Returns `None` when the value cannot be held by a column of this kind.
    /// `Null` is accepted by every kind.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (_, Value::Null) => Some(Value::Null),
            (Self::Integer, v @ Value::Integer(_)) => Some(v),
            (Self::Float, v @ Value::Float(_)) => Some(v),
            (Self::Float, Value::Integer(i)) => Some(Value::Float(i as f64)),
            (Self::Text, v @ Value::Text(_)) => Some(v),
            (Self::BooleanInt, Value::Integer(i)) => Some(Value::Integer(i64::from(i != 0))),
            _ => None,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        self.coerce(value.clone()).is_some()
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Text => write!(f, "TEXT"),
            Self::BooleanInt => write!(f, "BOOLEAN_INT"),
        }
    }
}

/// Which outgoing statements may write a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Writable(u8);

impl Writable {
    pub const NONE: Writable = Writable(0b00);
    pub const ON_INSERT: Writable = Writable(0b01);
    pub const ON_UPDATE: Writable = Writable(0b10);
    pub const BOTH: Writable = Writable(0b11);

    pub fn contains(self, other: Writable) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for Writable {
    type Output = Writable;

    fn bitor(self, rhs: Writable) -> Writable {
        Writable(self.0 | rhs.0)
    }
}

/// What happens when code writes a field the schema does not declare,
/// or a value the field's kind cannot hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPolicy {
    /// The write is dropped and logged at debug level.
    #[default]
    Permissive,
    /// The write fails with `ModelError::SchemaViolation`.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub writable: Writable,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind, writable: Writable) -> Self {
        Self {
            name: name.into(),
            kind,
            writable,
        }
    }

    pub fn is_primary_key(&self) -> bool {
        self.name == PRIMARY_KEY
    }
}

/// Column layout of one entity type, shared read-only by all of its instances.
#[derive(Debug)]
pub struct EntitySchema {
    table: String,
    fields: Vec<FieldDescriptor>,
    policy: SchemaPolicy,
}

impl EntitySchema {
    pub fn builder(table: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder::new(table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index_of(name).map(|idx| &self.fields[idx])
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn policy(&self) -> SchemaPolicy {
        self.policy
    }
}

pub struct EntitySchemaBuilder {
    table: String,
    fields: Vec<FieldDescriptor>,
    policy: SchemaPolicy,
}

impl EntitySchemaBuilder {
    fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: vec![FieldDescriptor::new(PRIMARY_KEY, FieldKind::Integer, Writable::NONE)],
            policy: SchemaPolicy::default(),
        }
    }

    /// Declares a column. Columns keep their declaration order.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind, writable: Writable) -> Self {
        self.fields.push(FieldDescriptor::new(name, kind, writable));
        self
    }

    pub fn policy(mut self, policy: SchemaPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn strict(self) -> Self {
        self.policy(SchemaPolicy::Strict)
    }

    pub fn build(self) -> Result<Arc<EntitySchema>> {
        if !is_identifier(&self.table) {
            return Err(ModelError::SchemaViolation(format!(
                "'{}' is not a valid table name",
                self.table
            )));
        }

        for (idx, field) in self.fields.iter().enumerate() {
            if !is_identifier(&field.name) {
                return Err(ModelError::SchemaViolation(format!(
                    "'{}' is not a valid field name",
                    field.name
                )));
            }
            if self.fields[..idx].iter().any(|f| f.name == field.name) {
                return Err(ModelError::SchemaViolation(format!(
                    "Field '{}' declared twice on '{}'",
                    field.name, self.table
                )));
            }
        }

        Ok(Arc::new(EntitySchema {
            table: self.table,
            fields: self.fields,
            policy: self.policy,
        }))
    }
}

/// Names are spliced into statement text, so only plain identifiers are allowed.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
