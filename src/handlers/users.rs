//! Self-service profile endpoints under `/api/users/me`.
//!
//! Admin user management mounts the generic handlers from
//! [`factory`](super::factory) directly.

use axum::extract::State;
use serde_json::{json, Value};

use crate::database::models::User;
use crate::database::Document;
use crate::error::{ApiError, JsonBody};
use crate::handlers::factory::{self, public_document};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

/// Profile fields a user may change on themselves
pub const SELF_EDITABLE_FIELDS: &[&str] = &["username", "email", "bio", "profilePicture"];

pub async fn get_me(State(state): State<AppState>, current: CurrentUser) -> ApiResult<Document> {
    Ok(ApiResponse::success(factory::find_one::<User>(&state, &current.id()).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(body): JsonBody<Document>,
) -> ApiResult<Value> {
    if body.contains_key("password") {
        return Err(ApiError::bad_request(
            "This route is not for password updates. Please use /api/users/me/password",
        ));
    }

    let changes = self_editable(body);
    let user = factory::update::<User>(&state, &current.id(), changes).await?;
    tracing::info!("User {} updated their profile", user.meta.id);
    Ok(ApiResponse::success(json!({ "user": public_document(&user)? })))
}

pub async fn delete_me(State(state): State<AppState>, current: CurrentUser) -> ApiResult<()> {
    factory::delete::<User>(&state, &current.id()).await?;
    tracing::info!("User {} deleted their account", current.id());
    Ok(ApiResponse::<()>::no_content())
}

fn self_editable(mut body: Document) -> Document {
    body.retain(|key, _| SELF_EDITABLE_FIELDS.contains(&key.as_str()));
    body
}
