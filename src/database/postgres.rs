use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use tokio::sync::RwLock;
use tracing::info;

use super::store::{document_id, Document, DocumentStore, StoreError};
use crate::config::DatabaseConfig;
use crate::filter::{Filter, FilterData};
use crate::filter::filter_where::validate_column;

/// Documents live in one table per collection: `(seq, id, doc JSONB)`.
pub struct PgDocumentStore {
    pool: PgPool,
    // unique index name -> indexed fields, for reporting duplicates
    indexes: RwLock<HashMap<String, Vec<String>>>,
}

impl PgDocumentStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let database_url = config.url.as_deref().ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;
        url::Url::parse(database_url).map_err(|_| StoreError::InvalidDatabaseUrl)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(database_url)
            .await?;

        info!("Connected document store pool (max {} connections)", config.max_connections);
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool, indexes: RwLock::new(HashMap::new()) }
    }

    fn table(collection: &str) -> Result<String, StoreError> {
        Filter::new(collection)?;
        Ok(format!("\"{}\"", collection))
    }

    async fn map_write_error(&self, collection: &str, err: sqlx::Error) -> StoreError {
        let violation = match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Some(db.constraint().map(str::to_string)),
            _ => None,
        };
        let Some(constraint) = violation else {
            return StoreError::Sqlx(err);
        };
        let fields = match constraint {
            Some(name) => self.indexes.read().await.get(&name).cloned().unwrap_or_else(|| vec![name]),
            None => vec!["_id".to_string()],
        };
        StoreError::Duplicate { collection: collection.to_string(), fields }
    }
}

fn into_document(collection: &str, value: Value) -> Result<Document, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::MissingId { collection: collection.to_string() }),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn ensure_collection(&self, collection: &str, unique_indexes: &[&[&str]]) -> Result<(), StoreError> {
        let table = Self::table(collection)?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (seq BIGSERIAL, id TEXT PRIMARY KEY, doc JSONB NOT NULL)",
            table
        ))
        .execute(&self.pool)
        .await?;

        for fields in unique_indexes {
            for field in fields.iter() {
                validate_column(field)?;
            }
            let name = format!("{}_{}_key", collection, fields.join("_"));
            let columns = fields.iter().map(|f| format!("(doc -> '{}')", f)).collect::<Vec<_>>().join(", ");
            sqlx::query(&format!("CREATE UNIQUE INDEX IF NOT EXISTS \"{}\" ON {} ({})", name, table, columns))
                .execute(&self.pool)
                .await?;
            self.indexes
                .write()
                .await
                .insert(name, fields.iter().map(|f| f.to_string()).collect());
        }

        info!("Collection ready: {}", collection);
        Ok(())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        let table = Self::table(collection)?;
        let id = document_id(collection, &doc)?;
        let result = sqlx::query(&format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", table))
            .bind(&id)
            .bind(Json(&doc))
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => Ok(doc),
            Err(e) => Err(self.map_write_error(collection, e).await),
        }
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let table = Self::table(collection)?;
        let row: Option<Json<Value>> = sqlx::query_scalar(&format!("SELECT doc FROM {} WHERE id = $1", table))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|Json(value)| into_document(collection, value)).transpose()
    }

    async fn find(&self, collection: &str, filter_data: FilterData) -> Result<Vec<Document>, StoreError> {
        let mut filter = Filter::new(collection)?;
        filter.assign(filter_data)?;
        let sql = filter.to_sql()?;

        let mut query = sqlx::query_scalar::<_, Json<Value>>(&sql.query);
        for param in sql.params {
            query = query.bind(Json(param));
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(|Json(value)| into_document(collection, value)).collect()
    }

    async fn replace(&self, collection: &str, doc: Document) -> Result<Option<Document>, StoreError> {
        let table = Self::table(collection)?;
        let id = document_id(collection, &doc)?;
        let result = sqlx::query(&format!("UPDATE {} SET doc = $2 WHERE id = $1", table))
            .bind(&id)
            .bind(Json(&doc))
            .execute(&self.pool)
            .await;
        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(None),
            Ok(_) => Ok(Some(doc)),
            Err(e) => Err(self.map_write_error(collection, e).await),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let table = Self::table(collection)?;
        let row: Option<Json<Value>> = sqlx::query_scalar(&format!("DELETE FROM {} WHERE id = $1 RETURNING doc", table))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|Json(value)| into_document(collection, value)).transpose()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
