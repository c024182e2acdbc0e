//! Keeps `Restaurant.averageRating` in step with its reviews.

use serde_json::{json, Value};

use crate::database::models::{Model, Restaurant, Review};
use crate::database::{DocumentStore, StoreError};
use crate::filter::{FilterData, FilterWhereInfo};

/// Mean of the ratings, 0 when there are none
pub fn average_rating(ratings: &[f64]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    ratings.iter().sum::<f64>() / ratings.len() as f64
}

/// Recomputes the average from every review of the restaurant and stores it.
/// A deleted restaurant is left alone.
pub async fn refresh_average_rating(store: &dyn DocumentStore, restaurant_id: &str) -> Result<f64, StoreError> {
    let reviews = store
        .find(Review::COLLECTION, FilterData::matching(vec![FilterWhereInfo::eq("restaurant", restaurant_id)]))
        .await?;
    let ratings: Vec<f64> = reviews.iter().filter_map(|doc| doc.get("rating").and_then(Value::as_f64)).collect();
    let average = average_rating(&ratings);

    if let Some(mut restaurant) = store.find_by_id(Restaurant::COLLECTION, restaurant_id).await? {
        restaurant.insert("averageRating".into(), json!(average));
        store.replace(Restaurant::COLLECTION, restaurant).await?;
        tracing::debug!("Restaurant {} averageRating = {} over {} reviews", restaurant_id, average, ratings.len());
    }
    Ok(average)
}

/// Best effort: the review write already succeeded, so failures are only logged
pub async fn sync_average_rating(store: &dyn DocumentStore, restaurant_id: &str) {
    if let Err(e) = refresh_average_rating(store, restaurant_id).await {
        tracing::error!("Failed to refresh averageRating for restaurant {}: {}", restaurant_id, e);
    }
}
