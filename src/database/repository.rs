use std::marker::PhantomData;

use serde_json::Value;

use crate::database::models::Model;
use crate::database::store::{Document, DocumentStore, StoreError};
use crate::filter::FilterWhereInfo;

/// Typed access to one collection
pub struct Repository<'a, M> {
    store: &'a dyn DocumentStore,
    _phantom: PhantomData<M>,
}

impl<'a, M: Model> Repository<'a, M> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store, _phantom: PhantomData }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<M>, StoreError> {
        self.store.find_by_id(M::COLLECTION, id).await?.map(from_document::<M>).transpose()
    }

    pub async fn find_one(&self, conditions: Vec<FilterWhereInfo>) -> Result<Option<M>, StoreError> {
        self.store.find_one(M::COLLECTION, conditions).await?.map(from_document::<M>).transpose()
    }

    pub async fn insert(&self, model: &M) -> Result<Document, StoreError> {
        self.store.insert(M::COLLECTION, to_document(model)?).await
    }

    /// Writes the whole model back; `None` when it was deleted meanwhile
    pub async fn save(&self, model: &M) -> Result<Option<Document>, StoreError> {
        self.store.replace(M::COLLECTION, to_document(model)?).await
    }

    pub async fn delete(&self, id: &str) -> Result<Option<M>, StoreError> {
        self.store.delete(M::COLLECTION, id).await?.map(from_document::<M>).transpose()
    }
}

pub fn to_document<M: Model>(model: &M) -> Result<Document, StoreError> {
    match serde_json::to_value(model) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(_) => Err(StoreError::MissingId { collection: M::COLLECTION.to_string() }),
        Err(source) => Err(StoreError::Malformed { collection: M::COLLECTION.to_string(), source }),
    }
}

pub fn from_document<M: Model>(doc: Document) -> Result<M, StoreError> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|source| StoreError::Malformed { collection: M::COLLECTION.to_string(), source })
}
