use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Base used in emailed links; the request's Host header when unset
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub access_token_secret: String,
    #[serde(skip_serializing)]
    pub refresh_token_secret: String,
    pub access_token_expiration_minutes: i64,
    pub refresh_token_expiration_minutes: i64,
    pub reset_token_ttl_minutes: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    /// Adds `Secure` to the refresh cookie
    pub require_https: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set outside development")]
    MissingSecret(&'static str),

    #[error("DATABASE_URL must be set outside development")]
    MissingDatabaseUrl,
}

impl AppConfig {
    /// Environment preset chosen by `APP_ENV`, then overridden by individual variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides();

        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("PUBLIC_URL") {
            self.server.public_url = Some(v.trim_end_matches('/').to_string());
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Auth overrides
        if let Ok(v) = env::var("ACCESS_TOKEN_SECRET") {
            self.auth.access_token_secret = v;
        }
        if let Ok(v) = env::var("REFRESH_TOKEN_SECRET") {
            self.auth.refresh_token_secret = v;
        }
        if let Ok(v) = env::var("ACCESS_TOKEN_EXPIRATION") {
            self.auth.access_token_expiration_minutes = v.parse().unwrap_or(self.auth.access_token_expiration_minutes);
        }
        if let Ok(v) = env::var("REFRESH_TOKEN_EXPIRATION") {
            self.auth.refresh_token_expiration_minutes = v.parse().unwrap_or(self.auth.refresh_token_expiration_minutes);
        }
        if let Ok(v) = env::var("BCRYPT_COST") {
            self.auth.bcrypt_cost = v.parse().unwrap_or(self.auth.bcrypt_cost);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = env::var("SECURITY_REQUIRE_HTTPS") {
            self.security.require_https = v.parse().unwrap_or(self.security.require_https);
        }

        // Email overrides
        if let Ok(v) = env::var("EMAIL_HOST") {
            self.email.host = Some(v);
        }
        if let Ok(v) = env::var("EMAIL_PORT") {
            self.email.port = v.parse().unwrap_or(self.email.port);
        }
        if let Ok(v) = env::var("EMAIL_USERNAME") {
            self.email.username = Some(v);
        }
        if let Ok(v) = env::var("EMAIL_PASSWORD") {
            self.email.password = Some(v);
        }
        if let Ok(v) = env::var("EMAIL_FROM") {
            self.email.from = v;
        }

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment == Environment::Development {
            return Ok(());
        }
        if self.auth.access_token_secret.is_empty() {
            return Err(ConfigError::MissingSecret("ACCESS_TOKEN_SECRET"));
        }
        if self.auth.refresh_token_secret.is_empty() {
            return Err(ConfigError::MissingSecret("REFRESH_TOKEN_SECRET"));
        }
        if self.database.url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000, public_url: None },
            database: DatabaseConfig { url: None, max_connections: 10, connection_timeout: 30 },
            auth: AuthConfig {
                access_token_secret: "dev-access-secret".to_string(),
                refresh_token_secret: "dev-refresh-secret".to_string(),
                access_token_expiration_minutes: 15,
                refresh_token_expiration_minutes: 60 * 24 * 7,
                reset_token_ttl_minutes: 10,
                bcrypt_cost: 10,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                require_https: false,
            },
            email: EmailConfig {
                host: None,
                port: 587,
                username: None,
                password: None,
                from: "Restaurant Reviews <noreply@localhost>".to_string(),
            },
        }
    }

    pub fn staging() -> Self {
        let mut config = Self::production();
        config.environment = Environment::Staging;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 3000, public_url: None },
            database: DatabaseConfig { url: None, max_connections: 50, connection_timeout: 5 },
            auth: AuthConfig {
                access_token_secret: String::new(),
                refresh_token_secret: String::new(),
                access_token_expiration_minutes: 15,
                refresh_token_expiration_minutes: 60 * 24 * 7,
                reset_token_ttl_minutes: 10,
                bcrypt_cost: bcrypt::DEFAULT_COST,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                require_https: true,
            },
            email: EmailConfig {
                host: None,
                port: 587,
                username: None,
                password: None,
                from: "Restaurant Reviews <noreply@example.com>".to_string(),
            },
        }
    }
}
