//! Restaurant writes. Reads mount the generic handlers.

use axum::extract::State;
use serde_json::Value;

use crate::database::models::Restaurant;
use crate::database::Document;
use crate::error::{JsonBody, PathParams};
use crate::handlers::factory::{self, public_document};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

/// The caller becomes the owner regardless of what the body says
pub async fn create_restaurant(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(mut body): JsonBody<Document>,
) -> ApiResult<Document> {
    body.insert("owner".into(), Value::String(current.id()));
    let restaurant = factory::create::<Restaurant>(&state, body).await?;
    tracing::info!("User {} created restaurant {}", current.id(), restaurant.slug);
    Ok(ApiResponse::created(public_document(&restaurant)?))
}

pub async fn update_restaurant(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParams(id): PathParams<String>,
    JsonBody(body): JsonBody<Document>,
) -> ApiResult<Document> {
    factory::authorize_creator::<Restaurant>(&state, &id, &current).await?;
    let restaurant = factory::update::<Restaurant>(&state, &id, body).await?;
    Ok(ApiResponse::success(public_document(&restaurant)?))
}

pub async fn delete_restaurant(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParams(id): PathParams<String>,
) -> ApiResult<()> {
    factory::authorize_creator::<Restaurant>(&state, &id, &current).await?;
    let restaurant = factory::delete::<Restaurant>(&state, &id).await?;
    tracing::info!("User {} deleted restaurant {}", current.id(), restaurant.slug);
    Ok(ApiResponse::<()>::no_content())
}
