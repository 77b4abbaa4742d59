#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use recordkit::storage::{Column, DataType};
use recordkit::{
    CacheProvider, ConnectionConfig, ConnectionPool, EntitySchema, FieldKind, ManualClock, MemoryCache,
    MemoryDatabase, ModelContext, Repository, Writable,
};
use std::sync::Arc;

lazy_static! {
    pub static ref USERS: Arc<EntitySchema> = EntitySchema::builder("ats_users")
        .field("username", FieldKind::Text, Writable::ON_INSERT)
        .field("email", FieldKind::Text, Writable::BOTH)
        .field("is_hidden", FieldKind::BooleanInt, Writable::BOTH)
        .field("created_at", FieldKind::Text, Writable::ON_INSERT)
        .field("updated_at", FieldKind::Text, Writable::BOTH)
        .build()
        .unwrap();
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

pub struct Fixture {
    pub db: MemoryDatabase,
    pub cache: Arc<MemoryCache>,
    pub clock: Arc<ManualClock>,
    pub ctx: Arc<ModelContext>,
}

impl Fixture {
    pub fn users(&self) -> Repository {
        self.ctx.repository(Arc::clone(&USERS))
    }

    /// A second context over the same database with an empty cache.
    pub async fn cold_context(&self) -> Arc<ModelContext> {
        context(&self.db, Arc::new(MemoryCache::new()), Arc::clone(&self.clock)).await
    }
}

pub async fn create_users_table(db: &MemoryDatabase) {
    db.create_table(
        "ats_users",
        vec![
            Column::new("username", DataType::Text).not_null(),
            Column::new("email", DataType::Text),
            Column::new("is_hidden", DataType::Integer),
            Column::new("created_at", DataType::Text),
            Column::new("updated_at", DataType::Text),
        ],
    )
    .await
    .unwrap();
}

pub async fn context(db: &MemoryDatabase, cache: Arc<MemoryCache>, clock: Arc<ManualClock>) -> Arc<ModelContext> {
    let pool = ConnectionPool::new(ConnectionConfig::new(), Arc::new(db.clone()))
        .await
        .unwrap();
    ModelContext::builder()
        .pool(pool)
        .cache(CacheProvider::new(cache, Some(recordkit::cache::DEFAULT_TTL)))
        .clock(clock)
        .build()
}

pub async fn fixture() -> Fixture {
    let db = MemoryDatabase::new();
    create_users_table(&db).await;
    let cache = Arc::new(MemoryCache::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let ctx = context(&db, Arc::clone(&cache), Arc::clone(&clock)).await;
    Fixture { db, cache, clock, ctx }
}
