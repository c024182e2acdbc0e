#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use restaurant_reviews_api::config::AppConfig;
use restaurant_reviews_api::database::models::{ensure_collections, Role, User};
use restaurant_reviews_api::database::{DocumentStore, MemoryStore, Repository};
use restaurant_reviews_api::mail::MemoryMailer;
use restaurant_reviews_api::server::app;
use restaurant_reviews_api::state::AppState;

/// The real router over an in-memory store and mailer
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: Arc<MemoryMailer>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Value of the `refreshToken` cookie set by this response, if any
    pub fn refresh_cookie(&self) -> Option<String> {
        self.set_cookie()?
            .split(';')
            .next()?
            .strip_prefix("refreshToken=")
            .map(str::to_string)
    }

    pub fn set_cookie(&self) -> Option<&str> {
        self.headers.get(header::SET_COOKIE)?.to_str().ok()
    }

    pub fn clears_cookie(&self) -> bool {
        self.set_cookie().is_some_and(|c| c.starts_with("refreshToken=;") && c.contains("Max-Age=0"))
    }

    pub fn access_token(&self) -> Option<String> {
        self.body["accessToken"].as_str().map(str::to_string)
    }
}

/// A signed-in user
pub struct Session {
    pub id: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with_mailer(MemoryMailer::new()).await
    }

    pub async fn spawn_with_mailer(mailer: MemoryMailer) -> Result<Self> {
        let mut config = AppConfig::development();
        config.auth.bcrypt_cost = 4;
        config.server.public_url = Some("http://reviews.test".to_string());

        let store = Arc::new(MemoryStore::new());
        ensure_collections(store.as_ref()).await?;
        let mailer = Arc::new(mailer);
        let state = AppState::new(config, store, mailer.clone())?;
        Ok(Self { router: app(state.clone()), state, mailer })
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.state.store()
    }

    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
        Ok(TestResponse { status, headers, body })
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// POST with the refresh cookie attached, as a browser would
    pub async fn post_with_cookie(&self, uri: &str, token: Option<&str>, refresh_token: Option<&str>) -> Result<TestResponse> {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(refresh) = refresh_token {
            builder = builder.header(header::COOKIE, format!("theme=dark; refreshToken={}", refresh));
        }
        self.send(builder.body(Body::empty())?).await
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<Session> {
        self.register_as(username, password, "user").await
    }

    pub async fn register_as(&self, username: &str, password: &str, role: &str) -> Result<Session> {
        let res = self
            .post(
                "/api/users/register",
                None,
                json!({ "username": username, "email": format!("{}@example.com", username), "password": password, "role": role }),
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "register failed: {} {}", res.status, res.body);
        session_from(&res)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let res = self.post("/api/users/login", None, json!({ "email": email, "password": password })).await?;
        anyhow::ensure!(res.status == StatusCode::OK, "login failed: {} {}", res.status, res.body);
        session_from(&res)
    }

    /// Registration never grants admin, so tests promote through the store
    pub async fn admin(&self, username: &str) -> Result<Session> {
        let session = self.register(username, "adminpass").await?;
        let repo = Repository::<User>::new(self.store());
        let mut user = repo.find_by_id(&session.id).await?.context("admin user missing")?;
        user.role = Role::Admin;
        repo.save(&user).await?;
        Ok(session)
    }

    /// Raw reset token from the link in the most recent mail
    pub fn last_reset_token(&self) -> Result<String> {
        let mail = self.mailer.last().context("no mail sent")?;
        let prefix = "http://reviews.test/api/users/reset-password/";
        let start = mail.html.find(prefix).context("no reset link")? + prefix.len();
        Ok(mail.html[start..].chars().take_while(|c| c.is_ascii_hexdigit()).collect())
    }

    pub async fn user(&self, id: &str) -> Result<User> {
        Repository::<User>::new(self.store()).find_by_id(id).await?.context("user missing")
    }

    pub async fn create_restaurant(&self, token: &str, name: &str) -> Result<Value> {
        let res = self.post("/api/restaurants", Some(token), restaurant_body(name)).await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "create restaurant failed: {} {}", res.status, res.body);
        Ok(res.body["data"].clone())
    }
}

pub fn restaurant_body(name: &str) -> Value {
    json!({
        "name": name,
        "address": "1 Main St",
        "location": uuid::Uuid::new_v4().to_string(),
        "cuisine": uuid::Uuid::new_v4().to_string(),
        "priceRange": "$$",
    })
}

fn session_from(res: &TestResponse) -> Result<Session> {
    Ok(Session {
        id: res.body["data"]["_id"].as_str().context("missing user id")?.to_string(),
        access_token: res.access_token().context("missing access token")?,
        refresh_token: res.refresh_cookie().context("missing refresh cookie")?,
    })
}
