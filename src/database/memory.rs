use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{document_id, Document, DocumentStore, StoreError};
use crate::filter::{Filter, FilterData};

#[derive(Default)]
struct Collection {
    unique_indexes: Vec<Vec<String>>,
    // insertion order is the tiebreak for sorting, like `seq` in Postgres
    docs: Vec<Document>,
}

impl Collection {
    fn check_unique(&self, name: &str, candidate: &Document) -> Result<(), StoreError> {
        let candidate_id = candidate.get("_id");
        for index in &self.unique_indexes {
            // documents missing any indexed field are not constrained
            if index.iter().any(|field| candidate.get(field).map_or(true, |v| v.is_null())) {
                continue;
            }
            let clash = self.docs.iter().any(|existing| {
                existing.get("_id") != candidate_id
                    && index.iter().all(|field| existing.get(field) == candidate.get(field))
            });
            if clash {
                return Err(StoreError::Duplicate { collection: name.to_string(), fields: index.clone() });
            }
        }
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.docs.iter().position(|doc| doc.get("_id").and_then(|v| v.as_str()) == Some(id))
    }
}

/// In-process store used in development without a database and by the test suite
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ensure_collection(&self, collection: &str, unique_indexes: &[&[&str]]) -> Result<(), StoreError> {
        Filter::new(collection)?;
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        entry.unique_indexes = unique_indexes
            .iter()
            .map(|fields| fields.iter().map(|f| f.to_string()).collect())
            .collect();
        Ok(())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        document_id(collection, &doc)?;
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        entry.check_unique(collection, &doc)?;
        entry.docs.push(doc.clone());
        Ok(doc)
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.position(id).map(|i| c.docs[i].clone())))
    }

    async fn find(&self, collection: &str, filter_data: FilterData) -> Result<Vec<Document>, StoreError> {
        let mut filter = Filter::new(collection)?;
        filter.assign(filter_data)?;
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map(|c| filter.apply(&c.docs)).unwrap_or_default())
    }

    async fn replace(&self, collection: &str, doc: Document) -> Result<Option<Document>, StoreError> {
        let id = document_id(collection, &doc)?;
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(index) = entry.position(&id) else {
            return Ok(None);
        };
        entry.check_unique(collection, &doc)?;
        entry.docs[index] = doc.clone();
        Ok(Some(doc))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .and_then(|c| c.position(id).map(|i| c.docs.remove(i))))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
