mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::TestApp;

// Query-string filtering, sorting, projection and paging over the public list routes.

async fn seed_locations(app: &TestApp, count: usize) -> Result<()> {
    let admin = app.admin("root").await?;
    for i in 0..count {
        let res = app
            .post(
                "/api/locations",
                Some(&admin.access_token),
                json!({ "city": format!("City {:02}", i), "country": if i % 2 == 0 { "France" } else { "Japan" } }),
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "seed failed: {}", res.body);
    }
    Ok(())
}

fn items(body: &Value) -> Result<Vec<Value>> {
    Ok(body["data"].as_array().context("data is not a list")?.clone())
}

#[tokio::test]
async fn limit_is_capped_at_ten() -> Result<()> {
    let app = TestApp::spawn().await?;
    seed_locations(&app, 12).await?;

    let res = app.get("/api/locations?limit=50", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 10);

    let res = app.get("/api/locations", None).await?;
    assert_eq!(res.body["results"], 10);

    let res = app.get("/api/locations?limit=5&page=3", None).await?;
    assert_eq!(res.body["results"], 2);

    let res = app.get("/api/locations?limit=oops&page=-1", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 10);
    Ok(())
}

#[tokio::test]
async fn pages_beyond_range_are_empty() -> Result<()> {
    let app = TestApp::spawn().await?;
    seed_locations(&app, 3).await?;

    let res = app.get("/api/locations?page=99999999999999999999", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 0);

    let res = app.get("/api/locations?page=9223372036854775807&limit=10", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 0);
    Ok(())
}

#[tokio::test]
async fn default_sort_is_newest_first() -> Result<()> {
    let app = TestApp::spawn().await?;
    seed_locations(&app, 6).await?;

    let res = app.get("/api/locations", None).await?;
    let created: Vec<String> = items(&res.body)?
        .iter()
        .map(|l| l["createdAt"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(created.len(), 6);
    assert!(created.windows(2).all(|w| w[0] >= w[1]), "not newest first: {:?}", created);
    Ok(())
}

#[tokio::test]
async fn sort_by_field_ascending_and_descending() -> Result<()> {
    let app = TestApp::spawn().await?;
    seed_locations(&app, 4).await?;

    let res = app.get("/api/locations?sort=city", None).await?;
    let cities: Vec<Value> = items(&res.body)?.iter().map(|l| l["city"].clone()).collect();
    assert_eq!(cities, vec![json!("City 00"), json!("City 01"), json!("City 02"), json!("City 03")]);

    let res = app.get("/api/locations?sort=country,-city", None).await?;
    let cities: Vec<Value> = items(&res.body)?.iter().map(|l| l["city"].clone()).collect();
    assert_eq!(cities, vec![json!("City 02"), json!("City 00"), json!("City 03"), json!("City 01")]);
    Ok(())
}

#[tokio::test]
async fn equality_filters_and_reserved_params() -> Result<()> {
    let app = TestApp::spawn().await?;
    seed_locations(&app, 5).await?;

    let res = app.get("/api/locations?country=Japan&sort=city", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    let cities: Vec<Value> = items(&res.body)?.iter().map(|l| l["city"].clone()).collect();
    assert_eq!(cities, vec![json!("City 01"), json!("City 03")]);

    let res = app.get("/api/locations?country=Narnia", None).await?;
    assert_eq!(res.body["results"], 0);
    Ok(())
}

#[tokio::test]
async fn fields_select_or_exclude() -> Result<()> {
    let app = TestApp::spawn().await?;
    seed_locations(&app, 2).await?;

    let res = app.get("/api/locations?fields=city", None).await?;
    for location in items(&res.body)? {
        let mut keys: Vec<String> = location.as_object().context("not an object")?.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["_id", "city"]);
    }

    let res = app.get("/api/locations?fields=-country", None).await?;
    for location in items(&res.body)? {
        assert!(location.get("country").is_none());
        assert!(location.get("city").is_some());
        assert!(location.get("__v").is_some(), "explicit exclusion replaces the default");
    }

    let res = app.get("/api/locations", None).await?;
    for location in items(&res.body)? {
        assert!(location.get("__v").is_none());
    }

    let res = app.get("/api/locations?fields=city,-country", None).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn range_filters_compare_numbers() -> Result<()> {
    let app = TestApp::spawn().await?;
    let owner = app.register_as("rhea", "secret1", "owner").await?;
    let restaurant = app.create_restaurant(&owner.access_token, "Range Diner").await?;
    let id = restaurant["_id"].as_str().context("no id")?.to_string();

    for (i, rating) in [1, 2, 3, 4, 5].into_iter().enumerate() {
        let reviewer = app.register(&format!("critic{}", i), "secret1").await?;
        let res = app
            .post(
                &format!("/api/restaurants/{}/reviews", id),
                Some(&reviewer.access_token),
                json!({ "rating": rating }),
            )
            .await?;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    }

    let res = app.get("/api/reviews?rating%5Bgte%5D=4", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 2);

    let res = app.get("/api/reviews?rating%5Bgt%5D=1&rating%5Blt%5D=4&sort=rating", None).await?;
    let ratings: Vec<Value> = items(&res.body)?.iter().map(|r| r["rating"].clone()).collect();
    assert_eq!(ratings, vec![json!(2), json!(3)]);

    let res = app.get("/api/reviews?rating%5Blte%5D=1", None).await?;
    assert_eq!(res.body["results"], 1);

    let res = app.get("/api/reviews?rating=3", None).await?;
    assert_eq!(res.body["results"], 1);

    let res = app.get("/api/reviews?rating%5Bbetween%5D=3", None).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}
