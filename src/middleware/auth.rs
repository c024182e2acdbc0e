use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::TokenKind;
use crate::database::models::{Role, User};
use crate::database::Repository;
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, attached by [`protect`]
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> String {
        self.0.meta.id.to_string()
    }

    pub fn role(&self) -> Role {
        self.0.role
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("You are not logged in"))
    }
}

/// Bearer access token authentication; loads the caller into request extensions
pub async fn protect(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers()).map_err(|msg| {
        tracing::warn!("Rejected request to {}: {}", request.uri().path(), msg);
        ApiError::unauthorized("You are not logged in")
    })?;

    let claims = state.tokens.verify(&token, TokenKind::Access).map_err(|e| {
        tracing::warn!("Access token rejected: {}", e);
        ApiError::from(e)
    })?;

    let user = Repository::<User>::new(state.store())
        .find_by_id(&claims.user_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Access token for missing user {}", claims.user_id);
            ApiError::unauthorized("The user belonging to this accessToken does no longer exist")
        })?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Role gate; layer it inside [`protect`]
pub async fn require_roles(allowed: &'static [Role], request: Request, next: Next) -> Result<Response, ApiError> {
    let role = request.extensions().get::<CurrentUser>().map(CurrentUser::role);
    match role {
        Some(role) if allowed.contains(&role) => Ok(next.run(request).await),
        Some(role) => {
            tracing::warn!("Role {} denied for {}", role.as_str(), request.uri().path());
            Err(ApiError::forbidden("You are not authorized to access this route"))
        }
        None => Err(ApiError::unauthorized("You are not logged in")),
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn extract_bearer(headers: &HeaderMap) -> Result<String, &'static str> {
    let auth_header = headers.get(header::AUTHORIZATION).ok_or("Missing Authorization header")?;

    let auth_str = auth_header.to_str().map_err(|_| "Invalid Authorization header format")?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Empty bearer token"),
        None => Err("Authorization header must use Bearer token format"),
    }
}
