mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use restaurant_reviews_api::database::models::User;
use restaurant_reviews_api::database::Repository;
use restaurant_reviews_api::mail::MemoryMailer;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn health_and_root_respond() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app.get("/health", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["database"], "ok");

    let res = app.get("/", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "success");
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_404_with_path() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app.get("/api/nowhere", None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["status"], "fail");
    assert_eq!(res.body["message"], "Can't find /api/nowhere on this server!");
    Ok(())
}

#[tokio::test]
async fn register_issues_tokens_and_hides_secrets() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app
        .post(
            "/api/users/register",
            None,
            json!({ "username": "Alice", "email": " Alice@Example.com ", "password": "secret1", "role": "admin" }),
        )
        .await?;

    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert!(res.access_token().is_some());
    let cookie = res.set_cookie().context("no cookie")?;
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    let max_age = app.state.config.auth.refresh_token_expiration_minutes * 60;
    assert!(cookie.contains(&format!("Max-Age={}", max_age)));

    let data = &res.body["data"];
    assert_eq!(data["username"], "alice");
    assert_eq!(data["email"], "alice@example.com");
    assert_eq!(data["role"], "user", "admin cannot be self-assigned");
    assert!(data.get("password").is_none());
    assert!(data.get("refreshTokens").is_none());
    Ok(())
}

#[tokio::test]
async fn register_rejects_bad_input() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.register("bob", "secret1").await?;

    let res = app
        .post("/api/users/register", None, json!({ "username": "bob2", "email": "bob@example.com", "password": "secret1" }))
        .await?;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .post("/api/users/register", None, json!({ "username": "carol", "email": "carol@example.com", "password": "abc" }))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["fieldErrors"]["password"].is_string());

    let res = app
        .post("/api/users/register", None, json!({ "username": "dave", "email": "not-an-email", "password": "secret1" }))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["fieldErrors"]["email"].is_string());
    Ok(())
}

#[tokio::test]
async fn login_appends_a_session() -> Result<()> {
    let app = TestApp::spawn().await?;
    let registered = app.register("erin", "secret1").await?;
    assert_eq!(app.user(&registered.id).await?.refresh_tokens.len(), 1);

    let session = app.login("ERIN@example.com", "secret1").await?;
    assert_eq!(session.id, registered.id);
    let user = app.user(&registered.id).await?;
    assert_eq!(user.refresh_tokens.len(), 2);
    assert!(user.refresh_tokens.iter().any(|r| r.token == session.refresh_token));
    Ok(())
}

#[tokio::test]
async fn login_failures_are_401() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.register("frank", "secret1").await?;

    let res = app.post("/api/users/login", None, json!({ "email": "frank@example.com" })).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Please provide an email and password");

    let res = app
        .post("/api/users/login", None, json!({ "email": "frank@example.com", "password": "wrong-one" }))
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Incorrect email or password");

    let res = app
        .post("/api/users/login", None, json!({ "email": "nobody@example.com", "password": "secret1" }))
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Incorrect email or password");
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_only_the_presented_session() -> Result<()> {
    let app = TestApp::spawn().await?;
    let first = app.register("gina", "secret1").await?;
    let second = app.login("gina@example.com", "secret1").await?;

    let res = app.post_with_cookie("/api/users/refresh-token", None, Some(&first.refresh_token)).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert!(res.access_token().is_some());
    let rotated = res.refresh_cookie().context("no rotated cookie")?;
    assert_ne!(rotated, first.refresh_token);

    let tokens: Vec<String> = app.user(&first.id).await?.refresh_tokens.into_iter().map(|r| r.token).collect();
    assert_eq!(tokens, vec![rotated.clone(), second.refresh_token.clone()]);

    // the rotated-out token is dead and the cookie is cleared
    let res = app.post_with_cookie("/api/users/refresh-token", None, Some(&first.refresh_token)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Invalid refresh token");
    assert!(res.clears_cookie());

    // the other session is untouched
    let res = app.post_with_cookie("/api/users/refresh-token", None, Some(&second.refresh_token)).await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn refresh_without_or_with_garbage_cookie_is_401() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app.post_with_cookie("/api/users/refresh-token", None, None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Refresh token missing");

    let res = app.post_with_cookie("/api/users/refresh-token", None, Some("not.a.token")).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_is_idempotent_and_clears_cookie() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.register("hank", "secret1").await?;

    for _ in 0..2 {
        let res = app
            .post_with_cookie("/api/users/logout", Some(&session.access_token), Some(&session.refresh_token))
            .await?;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["message"], "Logged out successfully");
        assert!(res.clears_cookie());
    }
    assert!(app.user(&session.id).await?.refresh_tokens.is_empty());

    let res = app.post_with_cookie("/api/users/refresh-token", None, Some(&session.refresh_token)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // no cookie at all still succeeds
    let res = app.post_with_cookie("/api/users/logout", Some(&session.access_token), None).await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_live_user() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app.get("/api/users/me", None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "You are not logged in");

    let res = app.get("/api/users/me", Some("garbage")).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let session = app.register("ivy", "secret1").await?;
    let res = app.get("/api/users/me", Some(&session.access_token)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["username"], "ivy");
    assert!(res.body["data"].get("password").is_none());

    // a refresh token is not an access token
    let res = app.get("/api/users/me", Some(&session.refresh_token)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.delete("/api/users/me", Some(&session.access_token)).await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    let res = app.get("/api/users/me", Some(&session.access_token)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "The user belonging to this accessToken does no longer exist");
    Ok(())
}

#[tokio::test]
async fn update_me_only_touches_profile_fields() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.register("jack", "secret1").await?;

    let res = app
        .patch("/api/users/me", Some(&session.access_token), json!({ "password": "another1" }))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .patch("/api/users/me", Some(&session.access_token), json!({ "bio": "Loves noodles", "role": "admin" }))
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["user"]["bio"], "Loves noodles");
    assert_eq!(res.body["data"]["user"]["role"], "user");

    let res = app
        .patch("/api/users/me", Some(&session.access_token), json!({ "bio": "x".repeat(201) }))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn password_change_revokes_every_session() -> Result<()> {
    let app = TestApp::spawn().await?;
    let first = app.register("kate", "secret1").await?;
    let second = app.login("kate@example.com", "secret1").await?;

    let res = app
        .patch(
            "/api/users/me/password",
            Some(&first.access_token),
            json!({ "currentPassword": "wrong", "newPassword": "secret2" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Invalid current password");

    let res = app
        .patch(
            "/api/users/me/password",
            Some(&first.access_token),
            json!({ "currentPassword": "secret1", "newPassword": "secret2" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let fresh = res.refresh_cookie().context("no new cookie")?;

    let tokens: Vec<String> = app.user(&first.id).await?.refresh_tokens.into_iter().map(|r| r.token).collect();
    assert_eq!(tokens, vec![fresh]);

    for old in [&first.refresh_token, &second.refresh_token] {
        let res = app.post_with_cookie("/api/users/refresh-token", None, Some(old)).await?;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }
    app.login("kate@example.com", "secret2").await?;
    Ok(())
}

#[tokio::test]
async fn forgot_and_reset_password() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.register("liam", "secret1").await?;

    let res = app.post("/api/users/forgot-password", None, json!({ "email": "nobody@example.com" })).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "Email not found");

    let res = app.post("/api/users/forgot-password", None, json!({ "email": "liam@example.com" })).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["message"], "Password reset email sent");

    let mail = app.mailer.last().context("no mail sent")?;
    assert_eq!(mail.to, "liam@example.com");
    let ttl = app.state.config.auth.reset_token_ttl_minutes;
    assert!(mail.html.contains(&format!("within {} minutes", ttl)));
    let raw = app.last_reset_token()?;
    assert_eq!(raw.len(), 64);

    // only the digest is stored
    let stored = app.user(&session.id).await?;
    assert_ne!(stored.reset_password_token.as_deref(), Some(raw.as_str()));
    assert!(stored.reset_password_expires.is_some());

    let uri = format!("/api/users/reset-password/{}", raw);
    let res = app.patch(&uri, None, json!({ "password": "brandnew" })).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert!(res.access_token().is_some());

    let user = app.user(&session.id).await?;
    assert!(user.reset_password_token.is_none());
    assert_eq!(user.refresh_tokens.len(), 1);

    let res = app.post_with_cookie("/api/users/refresh-token", None, Some(&session.refresh_token)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // single use
    let res = app.patch(&uri, None, json!({ "password": "brandnew2" })).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Invalid or expired reset token");

    app.login("liam@example.com", "brandnew").await?;
    Ok(())
}

#[tokio::test]
async fn expired_reset_token_is_rejected() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.register("nora", "secret1").await?;

    let res = app.post("/api/users/forgot-password", None, json!({ "email": "nora@example.com" })).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let raw = app.last_reset_token()?;

    let mut user = app.user(&session.id).await?;
    user.reset_password_expires = Some(Utc::now() - Duration::minutes(1));
    Repository::<User>::new(app.store()).save(&user).await?;

    let uri = format!("/api/users/reset-password/{}", raw);
    let res = app.patch(&uri, None, json!({ "password": "brandnew" })).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Invalid or expired reset token");

    let after = app.user(&session.id).await?;
    assert_eq!(after.password, user.password);
    app.login("nora@example.com", "secret1").await?;
    Ok(())
}

#[tokio::test]
async fn failed_reset_mail_clears_token() -> Result<()> {
    let app = TestApp::spawn_with_mailer(MemoryMailer::failing()).await?;
    let session = app.register("mona", "secret1").await?;

    let res = app.post("/api/users/forgot-password", None, json!({ "email": "mona@example.com" })).await?;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["status"], "error");

    let user = app.user(&session.id).await?;
    assert!(user.reset_password_token.is_none());
    assert!(user.reset_password_expires.is_none());
    Ok(())
}

#[tokio::test]
async fn user_admin_routes_require_admin() -> Result<()> {
    let app = TestApp::spawn().await?;
    let user = app.register("nick", "secret1").await?;
    let admin = app.admin("root").await?;

    let res = app.get("/api/users", Some(&user.access_token)).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["message"], "You are not authorized to access this route");

    let res = app.get("/api/users", Some(&admin.access_token)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 2);
    for user in res.body["data"].as_array().context("no list")? {
        assert!(user.get("password").is_none());
        assert!(user.get("refreshTokens").is_none());
    }

    let uri = format!("/api/users/{}", user.id);
    let res = app
        .patch(&uri, Some(&admin.access_token), json!({ "role": "owner", "password": "hijacked", "refreshTokens": [] }))
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["role"], "owner");
    let stored = app.user(&user.id).await?;
    assert_eq!(stored.refresh_tokens.len(), 1);
    app.login("nick@example.com", "secret1").await?;

    let res = app.delete(&uri, Some(&admin.access_token)).await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    let res = app.get(&uri, Some(&admin.access_token)).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "User not found");
    Ok(())
}
