pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::home::handlers as home;
use crate::search::handlers as search;
use crate::state::AppState;
use crate::workers::handlers as workers;
use crate::zones::handlers as zones;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Home feed
        .route("/api/home-config", get(home::handle_home_config))
        .route("/api/home-config/zones", get(zones::handle_list_zones))
        .route("/api/home-config/debug", post(zones::handle_debug_classify))
        // Search
        .route("/api/search", get(search::handle_search))
        // Hire-a-worker vertical
        .route("/api/worker-orders", get(workers::handle_list_orders))
        .route(
            "/api/worker-orders/recommended",
            get(workers::handle_recommended_orders),
        )
        .route(
            "/api/worker-orders/:id/matching-workers",
            get(workers::handle_matching_workers),
        )
        .route("/api/workers", get(workers::handle_list_workers))
        .route("/api/workers/top", get(workers::handle_top_workers))
        .route(
            "/api/workers/:id/ranking",
            post(workers::handle_update_ranking),
        )
        .with_state(state)
}
