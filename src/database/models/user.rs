use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::{require, timestamp, trimmed_opt, DocumentMeta, FieldErrors, Fields, Model};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

/// One active session: a refresh token and when it stops being accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRecord {
    pub token: String,
    #[serde(with = "timestamp")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub username: String,
    pub email: String,
    /// bcrypt hash
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub refresh_tokens: Vec<RefreshTokenRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_password_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    pub reset_password_expires: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Fields a referenced user never exposes when populated into another document
pub const USER_POPULATE_EXCLUDED: &[&str] = &[
    "__v",
    "password",
    "refreshTokens",
    "resetPasswordToken",
    "resetPasswordExpires",
    "createdAt",
    "updatedAt",
];

pub const BIO_MAX_CHARS: usize = 200;
pub const PASSWORD_MIN_CHARS: usize = 6;

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>, password_hash: impl Into<String>, role: Role) -> Self {
        Self {
            meta: DocumentMeta::new(),
            username: username.into(),
            email: email.into(),
            password: password_hash.into(),
            role,
            refresh_tokens: Vec::new(),
            reset_password_token: None,
            reset_password_expires: None,
            bio: None,
            profile_picture: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn push_session(&mut self, record: RefreshTokenRecord) {
        self.refresh_tokens.push(record);
    }

    /// Swaps the record holding exactly `old` for `new`, keeping its position.
    /// Returns false when `old` is not an active session.
    pub fn rotate_session(&mut self, old: &str, new: RefreshTokenRecord) -> bool {
        match self.refresh_tokens.iter_mut().find(|r| r.token == old) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        }
    }

    pub fn revoke_session(&mut self, token: &str) -> bool {
        let before = self.refresh_tokens.len();
        self.refresh_tokens.retain(|r| r.token != token);
        self.refresh_tokens.len() != before
    }

    pub fn clear_sessions(&mut self) {
        self.refresh_tokens.clear();
    }

    pub fn prune_expired_sessions(&mut self, now: DateTime<Utc>) {
        self.refresh_tokens.retain(|r| r.expires_at > now);
    }

    pub fn set_reset_token(&mut self, token_hash: String, expires: DateTime<Utc>) {
        self.reset_password_token = Some(token_hash);
        self.reset_password_expires = Some(expires);
    }

    pub fn clear_reset_token(&mut self) {
        self.reset_password_token = None;
        self.reset_password_expires = None;
    }
}

impl Model for User {
    const NAME: &'static str = "User";
    const COLLECTION: &'static str = "users";
    const HIDDEN_FIELDS: &'static [&'static str] = &["password", "refreshTokens", "resetPasswordToken", "resetPasswordExpires"];
    const DERIVED_FIELDS: &'static [&'static str] = &["password", "refreshTokens", "resetPasswordToken", "resetPasswordExpires"];
    const UNIQUE_INDEXES: &'static [&'static [&'static str]] = &[&["username"], &["email"]];

    fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocumentMeta {
        &mut self.meta
    }

    fn normalize(&mut self) {
        self.username = self.username.trim().to_lowercase();
        self.email = self.email.trim().to_lowercase();
        trimmed_opt(&mut self.bio);
        trimmed_opt(&mut self.profile_picture);
    }

    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require(&mut errors, "username", &self.username, "Please provide a username");
        if self.email.trim().is_empty() {
            errors.insert("email".into(), "Please provide an email".into());
        } else if !is_valid_email(&self.email) {
            errors.insert("email".into(), "Please provide a valid email".into());
        }
        if let Some(bio) = &self.bio {
            if bio.chars().count() > BIO_MAX_CHARS {
                errors.insert("bio".into(), format!("Bio cannot be longer than {} characters", BIO_MAX_CHARS));
            }
        }
        errors
    }
}

/// Population spec for a user reference exposing only the username
pub const REFERENCED_USERNAME: Fields = Fields::Only(&["username"]);

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        // local@domain.tld with a 2 to 6 letter top-level domain
        let pattern = r"^[a-zA-Z0-9._-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,6}$";
        Regex::new(pattern).unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Checks a raw password before it is hashed
pub fn validate_password(password: &str) -> Option<String> {
    if password.is_empty() {
        Some("Please provide a password".into())
    } else if password.chars().count() < PASSWORD_MIN_CHARS {
        Some(format!("Password must be at least {} characters", PASSWORD_MIN_CHARS))
    } else {
        None
    }
}
