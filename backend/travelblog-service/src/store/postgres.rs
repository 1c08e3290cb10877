/// PostgreSQL-backed document store
///
/// Every collection shares one `documents` table; bodies are JSONB. Ordering
/// and filtering use JSONB operators so numbers compare numerically.
use super::{
    Direction, Document, DocumentSnapshot, DocumentStore, Mutation, Query, ServerClock,
    StoreError, StoreResult, CREATED_AT_FIELD,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

pub struct PgDocumentStore {
    pool: PgPool,
    clock: ServerClock,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clock: ServerClock::new(),
        }
    }

    /// Connect and apply the embedded migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(max_connections, "document store connected to PostgreSQL");

        Ok(Self::new(pool))
    }

    fn snapshot(id: String, data: Value) -> StoreResult<DocumentSnapshot> {
        match data {
            Value::Object(data) => Ok(DocumentSnapshot { id, data }),
            other => Err(StoreError::Backend(format!(
                "document {} is not an object: {}",
                id, other
            ))),
        }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn add(&self, collection: &str, mut data: Document) -> StoreResult<DocumentSnapshot> {
        let id = Uuid::new_v4().to_string();
        data.insert(
            CREATED_AT_FIELD.to_string(),
            Value::from(self.clock.now_micros()),
        );

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(&data))
        .execute(&self.pool)
        .await?;

        Ok(DocumentSnapshot { id, data })
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&data))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<DocumentSnapshot>> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let Json(data): Json<Value> = row.try_get("data")?;
            Self::snapshot(id.to_string(), data)
        })
        .transpose()
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET data = data || $3
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&fields))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        Ok(())
    }

    async fn modify(
        &self,
        collection: &str,
        id: &str,
        mutation: Mutation,
    ) -> StoreResult<DocumentSnapshot> {
        let mut tx = self.pool.begin().await?;

        // Row locks cannot cover a document that does not exist yet, so
        // concurrent modifies of one key queue on an advisory lock instead.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), hashtext($2))")
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let current = sqlx::query(
            r#"
            SELECT data FROM documents
            WHERE collection = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| row.try_get::<Json<Value>, _>("data"))
        .transpose()?
        .map(|Json(data)| match data {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Backend(format!(
                "document {} is not an object: {}",
                id, other
            ))),
        })
        .transpose()?;

        // Dropping `tx` on the error path rolls back and releases the row lock.
        let next = mutation(current)?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&next))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(DocumentSnapshot {
            id: id.to_string(),
            data: next,
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, collection: &str, query: Query) -> StoreResult<Vec<DocumentSnapshot>> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = $1");
        let mut next_param = 2;

        if query.filter.is_some() {
            sql.push_str(&format!(
                " AND data -> ${} = ${}",
                next_param,
                next_param + 1
            ));
            next_param += 2;
        }

        match &query.order_by {
            Some((_, direction)) => {
                let dir = match direction {
                    Direction::Ascending => "ASC NULLS FIRST",
                    Direction::Descending => "DESC NULLS LAST",
                };
                sql.push_str(&format!(" ORDER BY data -> ${} {}, seq ASC", next_param, dir));
            }
            None => sql.push_str(" ORDER BY seq ASC"),
        }

        let mut q = sqlx::query(&sql).bind(collection);
        if let Some((field, value)) = &query.filter {
            q = q.bind(field.as_str()).bind(Json(value.clone()));
        }
        if let Some((field, _)) = &query.order_by {
            q = q.bind(field.as_str());
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("id")?;
                let Json(data): Json<Value> = row.try_get("data")?;
                Self::snapshot(id, data)
            })
            .collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
