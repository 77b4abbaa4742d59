use std::sync::Arc;
use chrono::{DateTime, FixedOffset};
use tracing::{debug, error, warn};
use super::{Entity, EntityState, Hydrator, ModelContext, TIMESTAMP_FORMAT};
use crate::cache::CacheKey;
use crate::connection::pool::ConnectionPool;
use crate::core::{EntitySchema, FieldKind, ModelError, Result, Value, PRIMARY_KEY};
use crate::result::{ExecOutcome, QueryResult};
use crate::statement::{Filter, FindOptions, Statement, StatementBuilder};

/// Set on the first successful insert, if declared.
pub const CREATED_AT: &str = "created_at";
/// Set on every save, if declared.
pub const UPDATED_AT: &str = "updated_at";
/// Soft-visibility flag honoured by [`Repository::find_all`], if declared.
pub const IS_HIDDEN: &str = "is_hidden";

/// Persistence operations for one entity type.
///
/// Only a missing connection pool is reported as an error (`NotConfigured`).
/// Statement failures are logged and come back as `false`, `None` or an empty
/// list, so callers decide how to degrade.
///
/// Only primary-key lookups use the cache. `save` and `delete` keep that entry
/// in sync after a successful write. There is no locking between concurrent
/// saves of the same row: the last write wins in the database, and the cache
/// holds whichever write refreshed it last.
#[derive(Clone)]
pub struct Repository {
    schema: Arc<EntitySchema>,
    ctx: Arc<ModelContext>,
    hydrator: Hydrator,
}

impl Repository {
    pub fn new(schema: Arc<EntitySchema>, ctx: Arc<ModelContext>) -> Self {
        let hydrator = Hydrator::new(Arc::clone(&schema));
        Self {
            schema,
            ctx,
            hydrator,
        }
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// A new, unsaved entity of this type.
    pub fn create(&self) -> Entity {
        Entity::new(Arc::clone(&self.schema))
    }

    /// INSERTs a new entity or UPDATEs a persisted one.
    ///
    /// Succeeds when exactly one row was affected. A new entity receives its
    /// generated primary key, and the cache entry for the key is overwritten
    /// with the saved values.
    pub async fn save(&self, entity: &mut Entity) -> Result<bool> {
        let pool = self.ctx.pool()?;
        if !self.owns(entity, "save") {
            return Ok(false);
        }

        let is_update = match entity.state() {
            EntityState::Deleted => {
                warn!(table = self.schema.table(), id = ?entity.id(), "save called on a deleted entity");
                return Ok(false);
            }
            EntityState::Persisted => true,
            EntityState::New => false,
        };

        let now = self.ctx.clock().now();
        self.stamp(entity, UPDATED_AT, now);
        if !is_update {
            self.stamp(entity, CREATED_AT, now);
        }

        let builder = StatementBuilder::new(&self.schema);
        let statement = if is_update {
            builder.update(entity.values())
        } else {
            builder.insert(entity.values())
        };
        let Some(outcome) = self.execute(pool, "save", statement).await else {
            return Ok(false);
        };

        if outcome.affected_rows != 1 {
            warn!(
                table = self.schema.table(),
                id = ?entity.id(),
                affected_rows = outcome.affected_rows,
                "save did not affect exactly one row"
            );
            return Ok(false);
        }

        if !is_update {
            match outcome.last_insert_id {
                Some(id) => entity.set_id(id),
                None => {
                    error!(table = self.schema.table(), "driver reported no generated key for insert");
                    return Ok(false);
                }
            }
        }

        self.cache_set(entity).await;
        Ok(true)
    }

    /// DELETEs the entity's row. Only when exactly one row went away is the
    /// cache entry evicted and the entity marked deleted.
    pub async fn delete(&self, entity: &mut Entity) -> Result<bool> {
        let pool = self.ctx.pool()?;
        if !self.owns(entity, "delete") {
            return Ok(false);
        }
        let Some(id) = entity.id() else {
            debug!(table = self.schema.table(), "delete called on an unsaved entity");
            return Ok(false);
        };

        let statement = StatementBuilder::new(&self.schema).delete(&Value::Integer(id));
        let Some(outcome) = self.execute(pool, "delete", statement).await else {
            return Ok(false);
        };

        if outcome.affected_rows != 1 {
            debug!(
                table = self.schema.table(),
                id,
                affected_rows = outcome.affected_rows,
                "delete did not affect exactly one row"
            );
            return Ok(false);
        }

        self.cache_delete(entity).await;
        entity.mark_deleted();
        Ok(true)
    }

    /// Looks up a row by primary key, reading through the cache.
    ///
    /// A miss falls back to the database; a row found there is written back to
    /// the cache so the next lookup is served without a query.
    pub async fn get_by_pk(&self, id: i64) -> Result<Option<Entity>> {
        self.ctx.pool()?;

        let key = CacheKey::for_id(self.schema.table(), id).digest();
        if let Some(bytes) = self.ctx.cache().get(&key).await
            && let Some(entity) = Entity::from_cache_bytes(&self.schema, &bytes)
        {
            if entity.id() != Some(id) {
                warn!(table = self.schema.table(), id, cached_id = ?entity.id(), "cache entry holds another row, evicting");
                self.ctx.cache().delete(&key).await;
                return self.load_by_pk(id).await;
            }
            debug!(table = self.schema.table(), id, "served from cache");
            return Ok(Some(entity));
        }

        self.load_by_pk(id).await
    }

    /// Database lookup by primary key; a row found replaces the cache entry.
    async fn load_by_pk(&self, id: i64) -> Result<Option<Entity>> {
        let entity = self.find_one(&Filter::new().eq(PRIMARY_KEY, id)).await?;
        if let Some(entity) = &entity {
            self.cache_set(entity).await;
        }
        Ok(entity)
    }

    /// First row matching every filter field. Never consults the cache.
    pub async fn find_one(&self, filter: &Filter) -> Result<Option<Entity>> {
        let mut entities = self.select("find_one", filter, &FindOptions::single()).await?;
        Ok(if entities.is_empty() {
            None
        } else {
            Some(entities.swap_remove(0))
        })
    }

    /// Every row matching the filter, paged and ordered by `options`.
    /// Never consults the cache.
    pub async fn find_many(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Entity>> {
        self.select("find_many", filter, options).await
    }

    /// Every row, restricted to the given `is_hidden` value when the type declares
    /// that field. `None` includes hidden and visible rows alike.
    pub async fn find_all(&self, is_hidden: Option<bool>, options: &FindOptions) -> Result<Vec<Entity>> {
        let mut filter = Filter::new();
        if let Some(hidden) = is_hidden
            && self.schema.has_field(IS_HIDDEN)
        {
            filter.insert(IS_HIDDEN, hidden);
        }
        self.select("find_all", &filter, options).await
    }

    /// An existing row matching `filter`, or a new unsaved entity holding the
    /// filter values. The caller still has to `save` a new entity.
    pub async fn find_or_create(&self, filter: &Filter) -> Result<Entity> {
        if let Some(entity) = self.find_one(filter).await? {
            return Ok(entity);
        }

        let mut entity = self.create();
        entity.set_attributes(filter.iter())?;
        Ok(entity)
    }

    /// Converts rows obtained elsewhere into entities of this type.
    pub fn hydrate(&self, result: &QueryResult) -> Vec<Entity> {
        self.hydrator.hydrate_all(result)
    }

    /// Overwrites the cache entry for the entity's primary key.
    pub async fn cache_set(&self, entity: &Entity) -> bool {
        let Some(id) = entity.id() else {
            return false;
        };
        let bytes = match entity.to_cache_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(table = self.schema.table(), id, error = %err, "entity not cached");
                return false;
            }
        };
        let key = CacheKey::for_id(self.schema.table(), id).digest();
        self.ctx.cache().set(&key, bytes).await
    }

    /// Evicts the cache entry for the entity's primary key.
    pub async fn cache_delete(&self, entity: &Entity) -> bool {
        match entity.id() {
            Some(id) => {
                let key = CacheKey::for_id(self.schema.table(), id).digest();
                self.ctx.cache().delete(&key).await
            }
            None => false,
        }
    }

    async fn select(&self, operation: &str, filter: &Filter, options: &FindOptions) -> Result<Vec<Entity>> {
        let pool = self.ctx.pool()?;
        let statement = StatementBuilder::new(&self.schema).select(filter, options);
        let statement = match statement {
            Ok(statement) => statement,
            Err(err) => {
                self.log_failure(operation, None, &err);
                return Ok(Vec::new());
            }
        };

        let result = match pool.get_connection().await {
            Ok(mut conn) => conn.query(&statement).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(result) => Ok(self.hydrator.hydrate_all(&result)),
            Err(err) => {
                self.log_failure(operation, Some(&statement), &err);
                Ok(Vec::new())
            }
        }
    }

    /// Runs a mutation on a pooled connection. Failures are logged and yield `None`.
    async fn execute(
        &self,
        pool: &ConnectionPool,
        operation: &str,
        statement: Result<Statement>,
    ) -> Option<ExecOutcome> {
        let statement = match statement {
            Ok(statement) => statement,
            Err(err) => {
                self.log_failure(operation, None, &err);
                return None;
            }
        };

        let result = match pool.get_connection().await {
            Ok(mut conn) => conn.execute(&statement).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                self.log_failure(operation, Some(&statement), &err);
                None
            }
        }
    }

    fn owns(&self, entity: &Entity, operation: &str) -> bool {
        let owned = entity.table() == self.schema.table();
        if !owned {
            warn!(
                operation,
                table = self.schema.table(),
                entity_table = entity.table(),
                "entity belongs to another table"
            );
        }
        owned
    }

    fn stamp(&self, entity: &mut Entity, field: &str, now: DateTime<FixedOffset>) {
        let Some(idx) = self.schema.index_of(field) else {
            return;
        };
        let value = match self.schema.fields()[idx].kind {
            FieldKind::Text => Value::Text(now.format(TIMESTAMP_FORMAT).to_string()),
            FieldKind::Integer => Value::Integer(now.timestamp()),
            FieldKind::Float | FieldKind::BooleanInt => {
                debug!(table = self.schema.table(), field, "timestamp field has no time-compatible kind");
                return;
            }
        };
        entity.assign(idx, value);
    }

    fn log_failure(&self, operation: &str, statement: Option<&Statement>, err: &ModelError) {
        error!(
            operation,
            table = self.schema.table(),
            sql = statement.map(Statement::sql).unwrap_or("<not built>"),
            error = %err,
            "statement failed"
        );
    }
}
