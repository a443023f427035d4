// src/store/postgres.rs

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, types::Json};

use super::{Collection, DocumentStore, StoreError, Versioned};

/// Postgres-backed store: one `documents` table, JSONB bodies.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Helper struct for reading one document row.
#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    version: i64,
    body: Json<Value>,
}

impl From<DocumentRow> for Versioned<Value> {
    fn from(row: DocumentRow) -> Self {
        Versioned {
            id: row.id,
            version: row.version,
            doc: row.body.0,
        }
    }
}

fn write_error(err: sqlx::Error, collection: Collection, id: &str) -> StoreError {
    match &err {
        // Postgres error code for unique violation is 23505
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate {
            collection,
            id: id.to_string(),
        },
        _ => {
            tracing::error!("Failed to write {} document {}: {:?}", collection, id, err);
            StoreError::from(err)
        }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Versioned<Value>>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, version, body
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Versioned::from))
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Value,
    ) -> Result<Vec<Versioned<Value>>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, version, body
            FROM documents
            WHERE collection = $1 AND body @> $2
            ORDER BY created_at, id
            "#,
        )
        .bind(collection.as_str())
        .bind(Json(filter))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Versioned::from).collect())
    }

    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        unique_key: Option<&str>,
        body: &Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, version, unique_key, body)
            VALUES ($1, $2, 1, $3, $4)
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(unique_key)
        .bind(Json(body))
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, collection, id))?;

        Ok(())
    }

    async fn replace(
        &self,
        collection: Collection,
        id: &str,
        expected_version: i64,
        unique_key: Option<&str>,
        body: &Value,
    ) -> Result<i64, StoreError> {
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE documents
            SET body = $5, unique_key = $4, version = version + 1, updated_at = NOW()
            WHERE collection = $1 AND id = $2 AND version = $3
            RETURNING version
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(expected_version)
        .bind(unique_key)
        .bind(Json(body))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, collection, id))?;

        if let Some(version) = updated {
            return Ok(version);
        }

        // Nothing matched: either someone else wrote first or the row is gone.
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = $1 AND id = $2)",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            Err(StoreError::VersionConflict {
                collection,
                id: id.to_string(),
            })
        } else {
            Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            })
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = $1")
            .bind(collection.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }
}
