//! Generic CRUD operations shared by every resource.
//!
//! The `find_*`/`create`/`update`/`delete` functions hold the logic and are
//! reused by controllers that add their own hooks around them. The axum
//! handlers below them (`get_all::<M>` and friends) mount a model directly.

use axum::extract::{Query, State};
use serde::Serialize;
use serde_json::Value;

use crate::database::models::{DocumentMeta, FieldErrors, Model, SYSTEM_FIELDS};
use crate::database::populate::populate;
use crate::database::repository::to_document;
use crate::database::{Document, Projection, QueryBuilder, QueryParams, Repository};
use crate::error::{ApiError, JsonBody, PathParams};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

pub fn not_found<M: Model>() -> ApiError {
    ApiError::not_found(format!("{} not found", M::NAME))
}

pub async fn find_all<M: Model>(state: &AppState, builder: QueryBuilder) -> Result<Vec<Document>, ApiError> {
    let query = builder.build()?;
    let mut docs = query.execute(state.store()).await?;
    populate(state.store(), &mut docs, M::LIST_POPULATE, Some(&query.projection)).await?;
    Ok(docs.into_iter().map(strip_hidden::<M>).collect())
}

pub async fn find_one<M: Model>(state: &AppState, id: &str) -> Result<Document, ApiError> {
    let doc = state
        .store()
        .find_by_id(M::COLLECTION, id)
        .await?
        .ok_or_else(not_found::<M>)?;
    let mut docs = [Projection::default().apply(strip_hidden::<M>(doc))];
    populate(state.store(), &mut docs, M::ONE_POPULATE, None).await?;
    let [doc] = docs;
    Ok(doc)
}

pub async fn create<M: Model>(state: &AppState, mut body: Document) -> Result<M, ApiError> {
    for field in SYSTEM_FIELDS.iter().chain(M::DERIVED_FIELDS) {
        body.remove(*field);
    }
    body.extend(to_map(&DocumentMeta::new())?);

    let mut model: M = from_body(body)?;
    model.normalize();
    model.before_create();
    check(model.validate())?;

    Repository::<M>::new(state.store()).insert(&model).await?;
    tracing::debug!("Created {} {}", M::NAME, model.id());
    Ok(model)
}

pub async fn update<M: Model>(state: &AppState, id: &str, mut changes: Document) -> Result<M, ApiError> {
    let existing = state
        .store()
        .find_by_id(M::COLLECTION, id)
        .await?
        .ok_or_else(not_found::<M>)?;

    for field in SYSTEM_FIELDS.iter().chain(M::DERIVED_FIELDS).chain(M::IMMUTABLE_FIELDS) {
        changes.remove(*field);
    }
    M::before_update(&mut changes);

    let mut merged = existing;
    merged.extend(changes);
    let mut model: M = from_body(merged)?;
    model.normalize();
    check(model.validate())?;
    model.meta_mut().touch();

    Repository::<M>::new(state.store())
        .save(&model)
        .await?
        .ok_or_else(not_found::<M>)?;
    Ok(model)
}

pub async fn delete<M: Model>(state: &AppState, id: &str) -> Result<M, ApiError> {
    Repository::<M>::new(state.store())
        .delete(id)
        .await?
        .ok_or_else(not_found::<M>)
}

/// Only the creator of a document, or an admin, may change it.
/// A missing document passes so the handler can answer 404.
pub async fn authorize_creator<M: Model>(state: &AppState, id: &str, user: &CurrentUser) -> Result<(), ApiError> {
    let Some(field) = M::CREATOR_FIELD else {
        return Ok(());
    };
    if user.0.is_admin() {
        return Ok(());
    }
    let Some(doc) = state.store().find_by_id(M::COLLECTION, id).await? else {
        return Ok(());
    };
    if doc.get(field).and_then(Value::as_str) == Some(user.id().as_str()) {
        Ok(())
    } else {
        tracing::warn!("User {} denied changing {} {}", user.id(), M::NAME, id);
        Err(ApiError::forbidden(format!(
            "Not allowed to update or delete other's {}.",
            M::NAME.to_lowercase()
        )))
    }
}

/// The model as clients see it
pub fn public_document<M: Model>(model: &M) -> Result<Document, ApiError> {
    Ok(strip_hidden::<M>(to_document(model)?))
}

pub fn strip_hidden<M: Model>(mut doc: Document) -> Document {
    for field in M::HIDDEN_FIELDS {
        doc.remove(*field);
    }
    doc
}

pub fn check(errors: FieldErrors) -> Result<(), ApiError> {
    if errors.is_empty() {
        return Ok(());
    }
    let mut fields: Vec<_> = errors.values().cloned().collect();
    fields.sort();
    Err(ApiError::validation_error(format!("Invalid input data. {}", fields.join(". ")), Some(errors)))
}

fn from_body<M: Model>(doc: Document) -> Result<M, ApiError> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| ApiError::bad_request(format!("Invalid {} data: {}", M::NAME.to_lowercase(), e)))
}

fn to_map<T: Serialize>(value: &T) -> Result<Document, ApiError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ApiError::internal_server_error("Failed to prepare document")),
    }
}

// Axum handlers mounting a model directly

pub async fn get_all<M: Model>(State(state): State<AppState>, Query(params): Query<QueryParams>) -> ApiResult<Vec<Document>> {
    let docs = find_all::<M>(&state, QueryBuilder::new(M::COLLECTION).params(params)).await?;
    Ok(ApiResponse::list(docs))
}

pub async fn get_one<M: Model>(State(state): State<AppState>, PathParams(id): PathParams<String>) -> ApiResult<Document> {
    Ok(ApiResponse::success(find_one::<M>(&state, &id).await?))
}

pub async fn create_one<M: Model>(State(state): State<AppState>, JsonBody(body): JsonBody<Document>) -> ApiResult<Document> {
    let model = create::<M>(&state, body).await?;
    Ok(ApiResponse::created(public_document(&model)?))
}

pub async fn update_one<M: Model>(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    JsonBody(body): JsonBody<Document>,
) -> ApiResult<Document> {
    let model = update::<M>(&state, &id, body).await?;
    Ok(ApiResponse::success(public_document(&model)?))
}

pub async fn delete_one<M: Model>(State(state): State<AppState>, PathParams(id): PathParams<String>) -> ApiResult<()> {
    delete::<M>(&state, &id).await?;
    Ok(ApiResponse::<()>::no_content())
}
