use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::core::{EntitySchema, ModelError, Result, SchemaPolicy, Value, PRIMARY_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Not yet inserted; `save` will INSERT.
    New,
    /// Has a primary key; `save` will UPDATE.
    Persisted,
    /// Removed by `delete`. Terminal.
    Deleted,
}

/// One record of an entity type: a value for every declared field.
///
/// Reads and writes go through the field names declared in the schema.
/// Writes are checked against the declared kind. Writes to undeclared fields,
/// and writes the kind cannot hold, follow the schema's [`SchemaPolicy`].
#[derive(Clone)]
pub struct Entity {
    schema: Arc<EntitySchema>,
    values: Vec<Value>,
    deleted: bool,
}

/// Cache payload for an entity.
#[derive(Serialize, Deserialize)]
struct CachedRecord {
    table: String,
    values: Vec<Value>,
}

impl Entity {
    /// An empty entity with every field set to `Null`.
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        let values = vec![Value::Null; schema.field_count()];
        Self {
            schema,
            values,
            deleted: false,
        }
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn table(&self) -> &str {
        self.schema.table()
    }

    pub fn id(&self) -> Option<i64> {
        self.get(PRIMARY_KEY).and_then(Value::as_i64)
    }

    pub fn state(&self) -> EntityState {
        if self.deleted {
            EntityState::Deleted
        } else if self.id().is_some() {
            EntityState::Persisted
        } else {
            EntityState::New
        }
    }

    /// Current value of `name`, or `None` if the schema does not declare it.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).map(|idx| &self.values[idx])
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let Some(idx) = self.schema.index_of(name) else {
            return self.reject(format!(
                "'{}' has no field '{}'",
                self.schema.table(),
                name
            ));
        };

        let kind = self.schema.fields()[idx].kind;
        let type_name = value.type_name();
        match kind.coerce(value) {
            Some(value) => {
                self.values[idx] = value;
                Ok(())
            }
            None => self.reject(format!(
                "Field '{}' of '{}' expects {}, got {}",
                name,
                self.schema.table(),
                kind,
                type_name
            )),
        }
    }

    /// Sets several fields at once. Stops at the first rejected write under a strict policy.
    pub fn set_attributes<I, K, V>(&mut self, attributes: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in attributes {
            self.set(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Field names and values, in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema.field_names().zip(self.values.iter())
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// JSON object of every field, for serialization to clients.
    pub fn to_json(&self) -> serde_json::Value {
        let object = self
            .attributes()
            .map(|(name, value)| (name.to_string(), json_value(value)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(object)
    }

    /// Writes a field without the policy or kind checks. Used by hydration and
    /// by the repository for server-assigned values.
    pub(crate) fn assign(&mut self, idx: usize, value: Value) {
        self.values[idx] = value;
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        if let Some(idx) = self.schema.index_of(PRIMARY_KEY) {
            self.values[idx] = Value::Integer(id);
        }
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    pub(crate) fn to_cache_bytes(&self) -> Result<Vec<u8>> {
        let record = CachedRecord {
            table: self.schema.table().to_string(),
            values: self.values.clone(),
        };
        rmp_serde::to_vec(&record).map_err(|e| ModelError::Cache(format!("Failed to encode entity: {}", e)))
    }

    /// Decodes a cache payload. Payloads written for another table or another
    /// field layout are treated as absent.
    pub(crate) fn from_cache_bytes(schema: &Arc<EntitySchema>, bytes: &[u8]) -> Option<Self> {
        let record: CachedRecord = rmp_serde::from_slice(bytes).ok()?;
        if record.table != schema.table() || record.values.len() != schema.field_count() {
            return None;
        }
        Some(Self {
            schema: Arc::clone(schema),
            values: record.values,
            deleted: false,
        })
    }

    fn reject(&self, message: String) -> Result<()> {
        match self.schema.policy() {
            SchemaPolicy::Permissive => {
                debug!(table = self.schema.table(), "{}, write ignored", message);
                Ok(())
            }
            SchemaPolicy::Strict => Err(ModelError::SchemaViolation(message)),
        }
    }
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.schema.table() == other.schema.table() && self.values == other.values
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.attributes() {
            map.entry(&name, value);
        }
        map.finish()
    }
}
