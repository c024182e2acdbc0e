//! Account and session endpoints under `/api/users`.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::cookie::{clear_refresh_cookie, read_cookie, refresh_cookie, REFRESH_COOKIE};
use crate::auth::{
    end_session, generate_reset_token, hash_password, hash_reset_token, rotate_session, start_session,
    verify_password, SessionError,
};
use crate::database::models::user::validate_password;
use crate::database::models::{Model, Role, User};
use crate::database::{Repository, StoreError};
use crate::error::{ApiError, JsonBody, PathParams};
use crate::filter::FilterWhereInfo;
use crate::handlers::factory::{check, public_document};
use crate::mail::password_reset_mail;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Starts a session for `user` and answers `{status, accessToken, data}` with the refresh cookie set
pub async fn send_tokens(state: &AppState, user: &mut User, status: StatusCode) -> Result<Response, ApiError> {
    let session = start_session(state.store(), &state.tokens, user).await?;
    let cookie = refresh_cookie(
        &session.refresh.token,
        state.tokens.refresh_ttl().num_seconds(),
        state.config.security.require_https,
    )
    .ok_or_else(|| ApiError::internal_server_error("Could not set refresh cookie"))?;

    let body = json!({
        "status": "success",
        "accessToken": session.access_token,
        "data": public_document(user)?,
    });
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

pub async fn register(State(state): State<AppState>, JsonBody(req): JsonBody<RegisterRequest>) -> Result<Response, ApiError> {
    // admin can only be granted by another admin
    let role = match req.role {
        Some(Role::Admin) | None => Role::User,
        Some(role) => role,
    };

    let mut user = User::new(req.username, req.email, String::new(), role);
    user.normalize();
    let mut errors = user.validate();
    if let Some(problem) = validate_password(&req.password) {
        errors.insert("password".into(), problem);
    }
    check(errors)?;

    user.password = hash_password(&req.password, state.config.auth.bcrypt_cost).await?;
    Repository::<User>::new(state.store()).insert(&user).await?;
    info!("Registered user {} as {}", user.id(), user.role.as_str());

    send_tokens(&state, &mut user, StatusCode::CREATED).await
}

pub async fn login(State(state): State<AppState>, JsonBody(req): JsonBody<LoginRequest>) -> Result<Response, ApiError> {
    let (Some(email), Some(password)) = (req.email.filter(|e| !e.is_empty()), req.password.filter(|p| !p.is_empty())) else {
        return Err(ApiError::unauthorized("Please provide an email and password"));
    };

    let user = find_by_email(&state, &email).await?;
    let verified = match &user {
        Some(user) => verify_password(&password, &user.password).await?,
        None => false,
    };
    let mut user = match user {
        Some(user) if verified => user,
        _ => {
            warn!("Failed login attempt");
            return Err(ApiError::unauthorized("Incorrect email or password"));
        }
    };

    send_tokens(&state, &mut user, StatusCode::OK).await
}

pub async fn refresh_token(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let presented = read_cookie(&headers, REFRESH_COOKIE);
    let secure = state.config.security.require_https;

    let session = match rotate_session(state.store(), &state.tokens, presented.as_deref()).await {
        Ok(session) => session,
        Err(SessionError::NotActive) => {
            let err = ApiError::unauthorized("Invalid refresh token");
            return Ok(([(header::SET_COOKIE, clear_refresh_cookie(secure))], err).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let cookie = refresh_cookie(&session.refresh.token, state.tokens.refresh_ttl().num_seconds(), secure)
        .ok_or_else(|| ApiError::internal_server_error("Could not set refresh cookie"))?;
    let body = json!({ "status": "success", "accessToken": session.access_token });
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let presented = read_cookie(&headers, REFRESH_COOKIE);
    end_session(state.store(), &state.tokens, presented.as_deref()).await?;

    let body = json!({ "status": "success", "message": "Logged out successfully" });
    let cookie = clear_refresh_cookie(state.config.security.require_https);
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> Result<Response, ApiError> {
    let email = req
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Please provide an email"))?;
    let mut user = find_by_email(&state, &email)
        .await?
        .ok_or_else(|| ApiError::not_found("Email not found"))?;

    let (raw, digest) = generate_reset_token();
    let ttl_minutes = state.config.auth.reset_token_ttl_minutes;
    user.set_reset_token(digest, Utc::now() + Duration::minutes(ttl_minutes));
    save(&state, &user).await?;

    let reset_url = format!("{}/api/users/reset-password/{}", base_url(&state, &headers), raw);
    if let Err(e) = state.mailer.send(password_reset_mail(&user.email, &reset_url, ttl_minutes)).await {
        user.clear_reset_token();
        if let Err(cleanup) = save(&state, &user).await {
            tracing::error!("Could not clear reset token after failed mail: {}", cleanup);
        }
        return Err(e.into());
    }

    info!("Password reset requested for user {}", user.id());
    Ok(Json(json!({ "status": "success", "message": "Password reset email sent" })).into_response())
}

pub async fn reset_password(
    State(state): State<AppState>,
    PathParams(token): PathParams<String>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    let digest = hash_reset_token(&token);
    let user = Repository::<User>::new(state.store())
        .find_one(vec![FilterWhereInfo::eq("resetPasswordToken", digest)])
        .await?;
    let now = Utc::now();
    let mut user = match user {
        Some(user) if user.reset_password_expires.is_some_and(|expires| expires > now) => user,
        _ => return Err(ApiError::unauthorized("Invalid or expired reset token")),
    };

    if let Some(problem) = validate_password(&req.password) {
        return Err(ApiError::validation_error(problem.clone(), Some([("password".to_string(), problem)].into())));
    }

    user.password = hash_password(&req.password, state.config.auth.bcrypt_cost).await?;
    user.clear_reset_token();
    user.clear_sessions();
    user.meta.touch();
    info!("Password reset completed for user {}", user.id());

    send_tokens(&state, &mut user, StatusCode::OK).await
}

pub async fn update_password(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(req): JsonBody<UpdatePasswordRequest>,
) -> Result<Response, ApiError> {
    let mut user = current.0;
    if req.current_password.is_empty() || !verify_password(&req.current_password, &user.password).await? {
        return Err(ApiError::unauthorized("Invalid current password"));
    }
    if let Some(problem) = validate_password(&req.new_password) {
        return Err(ApiError::validation_error(problem.clone(), Some([("newPassword".to_string(), problem)].into())));
    }

    user.password = hash_password(&req.new_password, state.config.auth.bcrypt_cost).await?;
    user.clear_sessions();
    user.meta.touch();
    info!("Password changed for user {}", user.id());

    send_tokens(&state, &mut user, StatusCode::OK).await
}

async fn find_by_email(state: &AppState, email: &str) -> Result<Option<User>, StoreError> {
    Repository::<User>::new(state.store())
        .find_one(vec![FilterWhereInfo::eq("email", email.trim().to_lowercase())])
        .await
}

async fn save(state: &AppState, user: &User) -> Result<(), ApiError> {
    Repository::<User>::new(state.store())
        .save(user)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(())
}

/// Where emailed links point: the configured public URL, else the request's host
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.config.server.public_url {
        return url.clone();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let scheme = if state.config.security.require_https { "https" } else { "http" };
    format!("{}://{}", scheme, host)
}
