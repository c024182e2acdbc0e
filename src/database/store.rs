use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::filter::{FilterData, FilterError, FilterWhereInfo};

/// A stored document: a JSON object keyed by field name, `_id` included
pub type Document = Map<String, Value>;

/// Errors from the document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Duplicate value for {fields:?} in {collection}")]
    Duplicate { collection: String, fields: Vec<String> },

    #[error("Document in {collection} is missing a string _id")]
    MissingId { collection: String },

    #[error("Malformed document in {collection}: {source}")]
    Malformed {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Query(#[from] FilterError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Storage seam for every collection the API serves.
///
/// Collections are declared up front with their unique indexes; inserts and
/// replacements violating one fail with `StoreError::Duplicate`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn ensure_collection(&self, collection: &str, unique_indexes: &[&[&str]]) -> Result<(), StoreError>;

    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError>;

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn find(&self, collection: &str, filter: FilterData) -> Result<Vec<Document>, StoreError>;

    /// Replaces the document with the same `_id`; `None` when it no longer exists
    async fn replace(&self, collection: &str, doc: Document) -> Result<Option<Document>, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_one(&self, collection: &str, conditions: Vec<FilterWhereInfo>) -> Result<Option<Document>, StoreError> {
        let filter = FilterData { where_clause: conditions, limit: Some(1), ..Default::default() };
        Ok(self.find(collection, filter).await?.into_iter().next())
    }
}

pub(crate) fn document_id(collection: &str, doc: &Document) -> Result<String, StoreError> {
    doc.get("_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::MissingId { collection: collection.to_string() })
}
