//! HTTP routes

pub mod subscriptions;

use axum::{
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{auth::require_auth, state::AppState};

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/v1/subscription",
            post(subscriptions::subscribe)
                .get(subscriptions::get_details)
                .delete(subscriptions::unsubscribe),
        )
        .route("/v1/subscription/plan", put(subscriptions::change_plan))
        .route("/v1/subscription/status", get(subscriptions::check_status))
        .route(
            "/v1/subscription/balance/extract",
            post(subscriptions::extract_from_balance),
        )
        .route(
            "/v1/subscription/balance/add",
            post(subscriptions::add_to_balance),
        )
        .route("/v1/plans", get(subscriptions::list_plans))
        .layer(middleware::from_fn_with_state(
            state.auth_state(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
