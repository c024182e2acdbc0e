//! Reviews, both top-level and nested under a restaurant.
//!
//! Every write recomputes the restaurant's `averageRating` afterwards.

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::Value;

use crate::database::models::{Model, Restaurant, Review};
use crate::database::{Document, QueryBuilder, QueryParams};
use crate::error::{ApiError, JsonBody, PathParams};
use crate::handlers::factory::{self, public_document};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::sync_average_rating;
use crate::state::AppState;

/// Path of a nested route; only the restaurant part is used
#[derive(Debug, Deserialize)]
pub struct RestaurantPath {
    #[serde(rename = "restaurantId")]
    pub restaurant_id: String,
}

/// Path of a single review, nested or not; a `restaurantId` segment is ignored
#[derive(Debug, Deserialize)]
pub struct ReviewPath {
    pub id: String,
}

pub async fn list_reviews(State(state): State<AppState>, Query(params): Query<QueryParams>) -> ApiResult<Vec<Document>> {
    let builder = QueryBuilder::new(Review::COLLECTION).params(params);
    Ok(ApiResponse::list(factory::find_all::<Review>(&state, builder).await?))
}

pub async fn list_restaurant_reviews(
    State(state): State<AppState>,
    PathParams(path): PathParams<RestaurantPath>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Document>> {
    let builder = QueryBuilder::new(Review::COLLECTION)
        .scope("restaurant", path.restaurant_id)
        .params(params);
    Ok(ApiResponse::list(factory::find_all::<Review>(&state, builder).await?))
}

pub async fn get_review(State(state): State<AppState>, PathParams(path): PathParams<ReviewPath>) -> ApiResult<Document> {
    Ok(ApiResponse::success(factory::find_one::<Review>(&state, &path.id).await?))
}

/// `POST /api/reviews`; the restaurant comes from the body
pub async fn create_review(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(body): JsonBody<Document>,
) -> ApiResult<Document> {
    let restaurant_id = match body.get("restaurant") {
        Some(Value::String(id)) => id.clone(),
        _ => {
            let message = "Review must belong to a restaurant";
            let fields = [("restaurant".to_string(), message.to_string())].into();
            return Err(ApiError::validation_error(message, Some(fields)));
        }
    };
    write_review(&state, &current, restaurant_id, body).await
}

/// `POST /api/restaurants/:restaurantId/reviews`; the path wins over the body
pub async fn create_restaurant_review(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParams(path): PathParams<RestaurantPath>,
    JsonBody(body): JsonBody<Document>,
) -> ApiResult<Document> {
    write_review(&state, &current, path.restaurant_id, body).await
}

async fn write_review(state: &AppState, current: &CurrentUser, restaurant_id: String, mut body: Document) -> ApiResult<Document> {
    if state.store().find_by_id(Restaurant::COLLECTION, &restaurant_id).await?.is_none() {
        return Err(factory::not_found::<Restaurant>());
    }

    body.insert("restaurant".into(), Value::String(restaurant_id.clone()));
    body.insert("reviewer".into(), Value::String(current.id()));
    let review = factory::create::<Review>(state, body).await?;
    sync_average_rating(state.store(), &restaurant_id).await;

    tracing::info!("User {} reviewed restaurant {}", current.id(), restaurant_id);
    Ok(ApiResponse::created(public_document(&review)?))
}

pub async fn update_review(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParams(path): PathParams<ReviewPath>,
    JsonBody(body): JsonBody<Document>,
) -> ApiResult<Document> {
    factory::authorize_creator::<Review>(&state, &path.id, &current).await?;
    let review = factory::update::<Review>(&state, &path.id, body).await?;
    sync_average_rating(state.store(), &review.restaurant.to_string()).await;
    Ok(ApiResponse::success(public_document(&review)?))
}

pub async fn delete_review(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParams(path): PathParams<ReviewPath>,
) -> ApiResult<()> {
    factory::authorize_creator::<Review>(&state, &path.id, &current).await?;
    let review = factory::delete::<Review>(&state, &path.id).await?;
    sync_average_rating(state.store(), &review.restaurant.to_string()).await;
    Ok(ApiResponse::<()>::no_content())
}
