use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Json},
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::database::models::{Cuisine, Location, Restaurant, Role, User};
use crate::error::ApiError;
use crate::handlers::{auth, factory, restaurants, reviews, users};
use crate::middleware::{protect, require_roles};
use crate::state::AppState;

const ADMIN: &[Role] = &[Role::Admin];
const RESTAURANT_MANAGERS: &[Role] = &[Role::Owner, Role::Admin];

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(user_routes(&state))
        .merge(restaurant_routes(&state))
        .merge(review_routes(&state))
        .merge(catalog_routes(&state))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn user_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/users/register", post(auth::register))
        .route("/api/users/login", post(auth::login))
        .route("/api/users/refresh-token", post(auth::refresh_token))
        .route("/api/users/forgot-password", post(auth::forgot_password))
        .route("/api/users/reset-password/:token", patch(auth::reset_password));

    let signed_in = Router::new()
        .route("/api/users/logout", post(auth::logout))
        .route("/api/users/me", get(users::get_me).patch(users::update_me).delete(users::delete_me))
        .route("/api/users/me/password", patch(auth::update_password))
        .route_layer(from_fn_with_state(state.clone(), protect));

    let admin = Router::new()
        .route("/api/users", get(factory::get_all::<User>))
        .route(
            "/api/users/:id",
            get(factory::get_one::<User>)
                .patch(factory::update_one::<User>)
                .delete(factory::delete_one::<User>),
        )
        .route_layer(from_fn(|req: Request, next: Next| require_roles(ADMIN, req, next)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    public.merge(signed_in).merge(admin)
}

fn restaurant_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/restaurants", get(factory::get_all::<Restaurant>))
        .route("/api/restaurants/:restaurantId", get(factory::get_one::<Restaurant>));

    let managed = Router::new()
        .route("/api/restaurants", post(restaurants::create_restaurant))
        .route(
            "/api/restaurants/:restaurantId",
            patch(restaurants::update_restaurant).delete(restaurants::delete_restaurant),
        )
        .route_layer(from_fn(|req: Request, next: Next| require_roles(RESTAURANT_MANAGERS, req, next)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    public.merge(managed)
}

fn review_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/reviews", get(reviews::list_reviews))
        .route("/api/reviews/:id", get(reviews::get_review))
        .route("/api/restaurants/:restaurantId/reviews", get(reviews::list_restaurant_reviews))
        .route("/api/restaurants/:restaurantId/reviews/:id", get(reviews::get_review));

    let signed_in = Router::new()
        .route("/api/reviews", post(reviews::create_review))
        .route("/api/reviews/:id", patch(reviews::update_review).delete(reviews::delete_review))
        .route("/api/restaurants/:restaurantId/reviews", post(reviews::create_restaurant_review))
        .route(
            "/api/restaurants/:restaurantId/reviews/:id",
            patch(reviews::update_review).delete(reviews::delete_review),
        )
        .route_layer(from_fn_with_state(state.clone(), protect));

    public.merge(signed_in)
}

/// Locations and cuisines: anyone reads, admins write
fn catalog_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/locations", get(factory::get_all::<Location>))
        .route("/api/locations/:id", get(factory::get_one::<Location>))
        .route("/api/cuisines", get(factory::get_all::<Cuisine>))
        .route("/api/cuisines/:id", get(factory::get_one::<Cuisine>));

    let admin = Router::new()
        .route("/api/locations", post(factory::create_one::<Location>))
        .route(
            "/api/locations/:id",
            patch(factory::update_one::<Location>).delete(factory::delete_one::<Location>),
        )
        .route("/api/cuisines", post(factory::create_one::<Cuisine>))
        .route(
            "/api/cuisines/:id",
            patch(factory::update_one::<Cuisine>).delete(factory::delete_one::<Cuisine>),
        )
        .route_layer(from_fn(|req: Request, next: Next| require_roles(ADMIN, req, next)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    public.merge(admin)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    let methods = [Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS];
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(methods).allow_headers(Any)
    } else {
        // credentialed requests carry the refresh cookie; that needs explicit origins
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([axum::http::header::AUTHORIZATION, axum::http::header::CONTENT_TYPE])
            .allow_credentials(true)
    }
}

async fn root() -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": {
            "name": "Restaurant Reviews API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "users": "/api/users",
                "restaurants": "/api/restaurants[/:restaurantId[/reviews[/:id]]]",
                "reviews": "/api/reviews[/:id]",
                "locations": "/api/locations[/:id]",
                "cuisines": "/api/cuisines[/:id]",
                "health": "/health",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "data": { "status": "degraded", "timestamp": now, "database": "unavailable" }
                })),
            )
        }
    }
}

async fn not_found(request: Request) -> ApiError {
    ApiError::not_found(format!("Can't find {} on this server!", request.uri().path()))
}
