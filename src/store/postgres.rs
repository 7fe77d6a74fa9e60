use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    strip_id, with_id, Collection, DeleteResult, DocumentStore, Document, Filter, FindQuery,
    InsertOneResult, StoreError, UpdateResult,
};
use crate::config::DatabaseConfig;

/// Collections as `(id uuid, doc jsonb)` tables; see `migrations/`.
#[derive(Clone)]
pub struct PgDocumentStore {
    db: PgPool,
}

impl PgDocumentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Connects and applies `migrations/`. Failing migrations abort startup:
    /// `insert_unique` is only atomic with the unique email index in place.
    pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect_with(cfg.connect_options()?)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;
        info!("database migrations applied");
        Ok(Self::new(db))
    }
}

fn classify(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => StoreError::Unavailable(e.to_string()),
        other => StoreError::Backend(other),
    }
}

fn into_document(id: Uuid, doc: Value) -> Result<Document, StoreError> {
    match doc {
        Value::Object(map) => Ok(with_id(id, map)),
        other => Err(StoreError::Corrupt(format!("{id}: expected object, got {other}"))),
    }
}

fn push_where(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    qb.push(" WHERE TRUE");
    if let Some(id) = filter.id() {
        qb.push(" AND id = ").push_bind(id);
    }
    if !filter.fields().is_empty() {
        qb.push(" AND doc @> ")
            .push_bind(Value::Object(filter.fields().clone()))
            .push("::jsonb");
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(&self, coll: Collection, query: FindQuery) -> Result<Vec<Document>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id, doc FROM ");
        qb.push(coll.name());
        push_where(&mut qb, &query.filter);

        qb.push(" ORDER BY ");
        if let Some(sort) = &query.sort {
            qb.push("doc -> ")
                .push_bind(sort.field.clone())
                .push("::text DESC NULLS LAST, ");
        }
        qb.push("inserted_at ASC");

        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let rows: Vec<(Uuid, Value)> = qb
            .build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(classify)?;
        debug!(
            collection = coll.name(),
            filtered = !query.filter.is_empty(),
            rows = rows.len(),
            "find"
        );

        rows.into_iter().map(|(id, doc)| into_document(id, doc)).collect()
    }

    async fn find_one(
        &self,
        coll: Collection,
        filter: Filter,
    ) -> Result<Option<Document>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id, doc FROM ");
        qb.push(coll.name());
        push_where(&mut qb, &filter);
        qb.push(" ORDER BY inserted_at ASC LIMIT 1");

        let row: Option<(Uuid, Value)> = qb
            .build_query_as()
            .fetch_optional(&self.db)
            .await
            .map_err(classify)?;

        row.map(|(id, doc)| into_document(id, doc)).transpose()
    }

    async fn insert_one(
        &self,
        coll: Collection,
        doc: Document,
    ) -> Result<InsertOneResult, StoreError> {
        let id = Uuid::new_v4();
        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO ");
        qb.push(coll.name())
            .push(" (id, doc) VALUES (")
            .push_bind(id)
            .push(", ")
            .push_bind(Value::Object(strip_id(doc)))
            .push("::jsonb)");

        qb.build().execute(&self.db).await.map_err(classify)?;
        debug!(collection = coll.name(), %id, "inserted");
        Ok(InsertOneResult { acknowledged: true, inserted_id: id })
    }

    async fn insert_unique(
        &self,
        coll: Collection,
        doc: Document,
    ) -> Result<Option<InsertOneResult>, StoreError> {
        let id = Uuid::new_v4();
        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO ");
        qb.push(coll.name())
            .push(" (id, doc) VALUES (")
            .push_bind(id)
            .push(", ")
            .push_bind(Value::Object(strip_id(doc)))
            .push("::jsonb) ON CONFLICT DO NOTHING");

        let done = qb.build().execute(&self.db).await.map_err(classify)?;
        if done.rows_affected() == 0 {
            debug!(collection = coll.name(), "unique key already present");
            return Ok(None);
        }
        Ok(Some(InsertOneResult { acknowledged: true, inserted_id: id }))
    }

    async fn update_one(
        &self,
        coll: Collection,
        filter: Filter,
        set: Document,
    ) -> Result<UpdateResult, StoreError> {
        let table = coll.name();
        let set = Value::Object(strip_id(set));

        let mut qb = QueryBuilder::<Postgres>::new("WITH target AS (SELECT id, doc FROM ");
        qb.push(table);
        push_where(&mut qb, &filter);
        qb.push(" ORDER BY inserted_at ASC LIMIT 1), changed AS (UPDATE ");
        qb.push(table).push(" SET doc = ").push(table).push(".doc || ");
        qb.push_bind(set.clone()).push("::jsonb FROM target WHERE ");
        qb.push(table).push(".id = target.id AND target.doc IS DISTINCT FROM target.doc || ");
        qb.push_bind(set).push("::jsonb RETURNING ");
        qb.push(table).push(".id)");
        qb.push(" SELECT (SELECT count(*) FROM target), (SELECT count(*) FROM changed)");

        let (matched, modified): (i64, i64) = qb
            .build_query_as()
            .fetch_one(&self.db)
            .await
            .map_err(classify)?;

        Ok(UpdateResult::new(
            u64::try_from(matched).unwrap_or_default(),
            u64::try_from(modified).unwrap_or_default(),
        ))
    }

    async fn delete_one(
        &self,
        coll: Collection,
        filter: Filter,
    ) -> Result<DeleteResult, StoreError> {
        let table = coll.name();
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM ");
        qb.push(table).push(" WHERE id = (SELECT id FROM ").push(table);
        push_where(&mut qb, &filter);
        qb.push(" ORDER BY inserted_at ASC LIMIT 1)");

        let done = qb.build().execute(&self.db).await.map_err(classify)?;
        Ok(DeleteResult { acknowledged: true, deleted_count: done.rows_affected() })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.db)
            .await
            .map_err(classify)?;
        Ok(())
    }
}
