// Routes module - wires every HTTP endpoint to its handler

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::SharedState;
use crate::handlers::*;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // ===== MARKET ENDPOINTS =====
        .route("/markets", get(list_markets).post(create_market))
        .route("/markets/:id", get(get_market))
        .route("/markets/:id/stakes", get(list_stakes).post(place_stake))
        .route("/markets/:id/odds", get(get_odds))
        .route("/markets/:id/payout", get(get_potential_payout))
        .route("/stakes/:staker", get(stakes_by_staker))

        // ===== ADMIN ENDPOINTS =====
        .route("/markets/:id/bounty", post(verify_bounty_claim))
        .route("/markets/:id/resolve", post(resolve_market))
        .route("/admin", get(get_admin).post(set_admin))
        .route("/events", get(get_events))

        // ===== BALANCE ENDPOINTS =====
        .route("/balance/:address", get(get_balance))
        .route("/faucet", post(faucet))

        // ===== HEALTH CHECK =====
        .route("/", get(health_check))
        .route("/health", get(health_check))

        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
