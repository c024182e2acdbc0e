use std::collections::HashMap;

use serde_json::Value;

use super::models::{Fields, Populate};
use super::query_builder::Projection;
use super::store::{Document, DocumentStore, StoreError};

/// Swaps reference ids for the referenced documents.
///
/// Only paths the projection keeps are resolved. A dangling reference becomes `null`.
pub async fn populate(
    store: &dyn DocumentStore,
    docs: &mut [Document],
    specs: &[Populate],
    projection: Option<&Projection>,
) -> Result<(), StoreError> {
    for spec in specs {
        if projection.is_some_and(|p| !p.keeps(spec.path)) {
            continue;
        }

        let mut cache: HashMap<String, Value> = HashMap::new();
        for doc in docs.iter_mut() {
            let Some(id) = doc.get(spec.path).and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            if !cache.contains_key(&id) {
                let referenced = store
                    .find_by_id(spec.collection, &id)
                    .await?
                    .map(|found| Value::Object(select(found, spec.fields)))
                    .unwrap_or(Value::Null);
                cache.insert(id.clone(), referenced);
            }
            if let Some(value) = cache.get(&id) {
                doc.insert(spec.path.to_string(), value.clone());
            }
        }
    }
    Ok(())
}

fn select(mut doc: Document, fields: Fields) -> Document {
    match fields {
        Fields::Only(keep) => doc.retain(|key, _| key == "_id" || keep.contains(&key.as_str())),
        Fields::Except(drop) => doc.retain(|key, _| !drop.contains(&key.as_str())),
    }
    doc
}
