//! Refresh-token sessions stored on the user document.
//!
//! Each login appends a `{token, expiresAt}` record; refresh swaps exactly the
//! presented record for a new one; logout removes it; password changes clear
//! them all. The read-modify-write on the user document is not guarded, so two
//! concurrent refreshes of different sessions can lose one update.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::tokens::{IssuedToken, TokenError, TokenKind, TokenService};
use crate::database::models::{RefreshTokenRecord, User};
use crate::database::{DocumentStore, Repository, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Refresh token missing")]
    MissingToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("User not found")]
    UserGone,

    /// A validly signed token that is no longer an active session
    #[error("Invalid refresh token")]
    NotActive,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tokens handed to the client after login, refresh or a password change
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub access_token: String,
    pub refresh: IssuedToken,
}

/// Issues an access/refresh pair and records the refresh token on `user`.
/// Expired records are dropped on the way.
pub async fn start_session(store: &dyn DocumentStore, tokens: &TokenService, user: &mut User) -> Result<IssuedSession, SessionError> {
    let user_id = user.meta.id.to_string();
    let access = tokens.issue_access_token(&user_id)?;
    let refresh = tokens.issue_refresh_token(&user_id)?;

    user.prune_expired_sessions(Utc::now());
    user.push_session(RefreshTokenRecord { token: refresh.token.clone(), expires_at: refresh.expires_at });
    save(store, user).await?;

    info!("Session started for user {} ({} active)", user_id, user.refresh_tokens.len());
    Ok(IssuedSession { access_token: access.token, refresh })
}

/// Trades a refresh token for a new pair, replacing its record in place
pub async fn rotate_session(store: &dyn DocumentStore, tokens: &TokenService, presented: Option<&str>) -> Result<IssuedSession, SessionError> {
    let presented = presented.ok_or(SessionError::MissingToken)?;
    let claims = tokens.verify(presented, TokenKind::Refresh)?;

    let repo = Repository::<User>::new(store);
    let mut user = repo.find_by_id(&claims.user_id).await?.ok_or(SessionError::UserGone)?;

    let access = tokens.issue_access_token(&claims.user_id)?;
    let refresh = tokens.issue_refresh_token(&claims.user_id)?;
    let record = RefreshTokenRecord { token: refresh.token.clone(), expires_at: refresh.expires_at };

    if !user.rotate_session(presented, record) {
        warn!("Refresh token reuse for user {}", claims.user_id);
        return Err(SessionError::NotActive);
    }
    save(store, &user).await?;

    debug!("Session rotated for user {}", claims.user_id);
    Ok(IssuedSession { access_token: access.token, refresh })
}

/// Removes the session behind `presented`, if any. Unverifiable or unknown
/// tokens are treated as no session.
pub async fn end_session(store: &dyn DocumentStore, tokens: &TokenService, presented: Option<&str>) -> Result<(), SessionError> {
    let Some(presented) = presented else {
        return Ok(());
    };
    let claims = match tokens.verify(presented, TokenKind::Refresh) {
        Ok(claims) => claims,
        Err(e) => {
            debug!("Logout with unusable refresh token: {}", e);
            return Ok(());
        }
    };

    let repo = Repository::<User>::new(store);
    if let Some(mut user) = repo.find_by_id(&claims.user_id).await? {
        if user.revoke_session(presented) {
            save(store, &user).await?;
            info!("Session ended for user {}", claims.user_id);
        }
    }
    Ok(())
}

async fn save(store: &dyn DocumentStore, user: &User) -> Result<(), SessionError> {
    Repository::<User>::new(store)
        .save(user)
        .await?
        .ok_or(SessionError::UserGone)?;
    Ok(())
}
