use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::Timestamp;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{
    Document, DocumentId, DocumentQuery, EntityStore, Fields, Order,
};
use crate::infrastructure::id_generator::{IdGenerator, MonotonicClock};

static FIELD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("static regex"));

/// SQLite implementation of the entity store. Every collection shares one
/// `documents` table; schema-specific fields live in a JSON `data` column.
pub struct SqliteEntityStore {
    pool: SqlitePool,
    ids: IdGenerator,
    clock: MonotonicClock,
}

impl SqliteEntityStore {
    /// Connect to `url` (e.g. `sqlite:data/inkpost.db` or `sqlite::memory:`)
    /// and create the schema if needed.
    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid DATABASE_URL {}: {}", url, e)))?
            .create_if_missing(true);

        let in_memory = url.contains(":memory:");
        if !in_memory {
            // get_filename consumes the options
            let filename = options.clone().get_filename();
            if let Some(parent) = filename.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        // Every connection to `:memory:` is a separate database, so keep
        // exactly one and never recycle it.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to connect to {}: {}", url, e))
        })?;

        let store = Self {
            pool,
            ids: IdGenerator::new(0),
            clock: MonotonicClock::new(),
        };
        store.initialize().await?;
        info!("Entity store ready at {}", url);
        Ok(store)
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Create the documents table and indexes
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY,
                collection TEXT NOT NULL,
                time_created INTEGER NOT NULL,
                data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create documents table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection_time ON documents(collection, time_created DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create documents index: {}", e)))?;

        let latest: Option<i64> = sqlx::query_scalar("SELECT MAX(time_created) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to read latest creation time: {}", e)))?;
        if let Some(latest) = latest {
            self.clock.observe(Timestamp(latest));
        }

        Ok(())
    }

    fn row_to_document(row: SqliteRow) -> AppResult<Document> {
        let raw: String = row.get("data");
        let data = match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => map,
            other => {
                return Err(AppError::Internal(format!(
                    "Document data is not an object: {}",
                    other
                )))
            }
        };
        Ok(Document {
            id: row.get("id"),
            collection: row.get("collection"),
            creation_time: Timestamp(row.get("time_created")),
            data,
        })
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &DocumentQuery) -> AppResult<()> {
        qb.push(" WHERE collection = ");
        qb.push_bind(query.collection.clone());

        for (field, value) in &query.filters {
            if !FIELD_NAME.is_match(field) {
                return Err(AppError::Validation(format!("Invalid filter field: {}", field)));
            }
            qb.push(" AND json_extract(data, ");
            qb.push_bind(format!("$.{}", field));
            match value {
                Value::Null => {
                    qb.push(") IS NULL");
                }
                Value::String(s) => {
                    qb.push(") = ");
                    qb.push_bind(s.clone());
                }
                Value::Bool(b) => {
                    qb.push(") = ");
                    qb.push_bind(*b as i64);
                }
                Value::Number(n) => {
                    qb.push(") = ");
                    if let Some(i) = n.as_i64() {
                        qb.push_bind(i);
                    } else if let Some(f) = n.as_f64() {
                        qb.push_bind(f);
                    } else {
                        return Err(AppError::Validation(format!(
                            "Unsupported numeric filter on {}",
                            field
                        )));
                    }
                }
                Value::Array(_) | Value::Object(_) => {
                    return Err(AppError::Validation(format!(
                        "Filter on {} must be a scalar",
                        field
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn insert(&self, collection: &str, data: Fields) -> AppResult<Document> {
        let id = self.ids.next_id();
        let creation_time = self.clock.now();
        let raw = serde_json::to_string(&data)?;

        sqlx::query("INSERT INTO documents (id, collection, time_created, data) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(collection)
            .bind(creation_time.value())
            .bind(raw)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to insert into {}: {}", collection, e))
            })?;

        debug!(collection, id, "document inserted");
        Ok(Document {
            id,
            collection: collection.to_string(),
            creation_time,
            data,
        })
    }

    async fn get(&self, collection: &str, id: DocumentId) -> AppResult<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, collection, time_created, data FROM documents WHERE id = ? AND collection = ?",
        )
        .bind(id)
        .bind(collection)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to get {} {}: {}", collection, id, e)))?;

        row.map(Self::row_to_document).transpose()
    }

    async fn scan(&self, query: DocumentQuery) -> AppResult<Vec<Document>> {
        let mut qb =
            QueryBuilder::<Sqlite>::new("SELECT id, collection, time_created, data FROM documents");
        Self::push_filters(&mut qb, &query)?;

        match query.order {
            Order::Desc => qb.push(" ORDER BY time_created DESC, id DESC"),
            Order::Asc => qb.push(" ORDER BY time_created ASC, id ASC"),
        };

        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit as i64);
        }

        let rows = qb.build().fetch_all(&self.pool).await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to scan {}: {}", query.collection, e))
        })?;

        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn count(&self, query: DocumentQuery) -> AppResult<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS n FROM documents");
        Self::push_filters(&mut qb, &query)?;

        let row = qb.build().fetch_one(&self.pool).await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to count {}: {}", query.collection, e))
        })?;
        Ok(row.get::<i64, _>("n").max(0) as u64)
    }

    async fn patch(&self, collection: &str, id: DocumentId, fields: Fields) -> AppResult<bool> {
        let raw = serde_json::to_string(&fields)?;
        let result = sqlx::query(
            "UPDATE documents SET data = json_patch(data, ?) WHERE id = ? AND collection = ?",
        )
        .bind(raw)
        .bind(id)
        .bind(collection)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to patch {} {}: {}", collection, id, e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, collection: &str, id: DocumentId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ? AND collection = ?")
            .bind(id)
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to delete {} {}: {}", collection, id, e))
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Health check failed: {}", e)))?;
        Ok(())
    }
}
