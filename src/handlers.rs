// HTTP request handlers for the bounty market API
//
// The caller's identity is whatever the wallet layer put in the
// `x-wallet-address` header; signatures are checked upstream.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

use crate::app_state::SharedState;
use crate::display::{format_amount, format_time_remaining, to_decimal};
use crate::market_resolve::{calculate_odds, calculate_total_pool, lifecycle, MarketError};
use crate::models::*;

pub const WALLET_HEADER: &str = "x-wallet-address";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        let status = match &err {
            MarketError::MarketNotFound(_) => StatusCode::NOT_FOUND,
            MarketError::Unauthorized(_) => StatusCode::FORBIDDEN,
            MarketError::AlreadyResolved(_)
            | MarketError::MarketNotActive(_)
            | MarketError::DeadlinePassed { .. } => StatusCode::CONFLICT,
            MarketError::InvalidTiming(_)
            | MarketError::InvalidAmount(_)
            | MarketError::InvalidTimestampGuess { .. } => StatusCode::BAD_REQUEST,
            MarketError::TransferFailed(_) => StatusCode::BAD_GATEWAY,
            MarketError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "error": self.message }));
        (self.status, body).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn caller(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(WALLET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, format!("Missing {} header", WALLET_HEADER)))
}

fn market_view(market: Market, now: Timestamp) -> MarketView {
    let odds = calculate_odds(&market);
    let total_pool = calculate_total_pool(&market);
    MarketView {
        phase: lifecycle::phase(&market, now),
        total_pool,
        total_pool_display: format_amount(total_pool),
        yes_odds: odds.yes,
        no_odds: odds.no,
        time_remaining: format_time_remaining(market.deadline, now),
        market,
    }
}

// ============================================================================
// MARKET ENDPOINTS
// ============================================================================

pub async fn health_check() -> &'static str {
    "Bounty Prediction Market - Online"
}

pub async fn list_markets(State(state): State<SharedState>) -> Json<Vec<MarketView>> {
    let now = state.manager.now();
    let views = state
        .manager
        .list_markets()
        .into_iter()
        .map(|m| market_view(m, now))
        .collect();
    Json(views)
}

pub async fn create_market(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<CreateMarketRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let creator = caller(&headers)?;
    let market_id = state.manager.create_market(
        &creator,
        &request.question,
        &request.description,
        request.deadline,
        request.resolution_date,
    )?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "market_id": market_id }))))
}

pub async fn get_market(
    State(state): State<SharedState>,
    Path(market_id): Path<MarketId>,
) -> Result<Json<MarketView>, ApiError> {
    let market = state.cache.get_market(market_id)?;
    Ok(Json(market_view(market, state.manager.now())))
}

pub async fn list_stakes(
    State(state): State<SharedState>,
    Path(market_id): Path<MarketId>,
) -> Result<Json<Vec<Stake>>, ApiError> {
    Ok(Json(state.cache.list_stakes(market_id)?))
}

pub async fn place_stake(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(market_id): Path<MarketId>,
    Json(request): Json<PlaceStakeRequest>,
) -> ApiResult {
    let staker = caller(&headers)?;
    let stake_id = state.cache.place_stake(
        &staker,
        market_id,
        request.side,
        request.amount,
        request.timestamp_guess,
    )?;

    Ok(Json(json!({
        "success": true,
        "market_id": market_id,
        "stake_id": stake_id,
        "side": request.side,
        "amount": request.amount,
        "new_balance": state.vault.balance_of(&staker),
    })))
}

pub async fn get_odds(
    State(state): State<SharedState>,
    Path(market_id): Path<MarketId>,
) -> ApiResult {
    let market = state.cache.get_market(market_id)?;
    let odds = calculate_odds(&market);
    Ok(Json(json!({ "market_id": market_id, "yes": odds.yes, "no": odds.no })))
}

pub async fn get_potential_payout(
    State(state): State<SharedState>,
    Path(market_id): Path<MarketId>,
    Query(query): Query<PayoutQuery>,
) -> ApiResult {
    let payout = state
        .manager
        .calculate_potential_payout(market_id, query.side, query.amount)?;
    Ok(Json(json!({
        "market_id": market_id,
        "side": query.side,
        "amount": query.amount,
        "potential_payout": payout,
        "potential_payout_tokens": to_decimal(payout),
    })))
}

pub async fn stakes_by_staker(
    State(state): State<SharedState>,
    Path(staker): Path<String>,
) -> Json<Vec<Stake>> {
    Json(state.manager.stakes_by_staker(&staker))
}

// ============================================================================
// ADMIN ENDPOINTS
// ============================================================================

pub async fn verify_bounty_claim(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(market_id): Path<MarketId>,
    Json(request): Json<VerifyBountyRequest>,
) -> ApiResult {
    let admin = caller(&headers)?;
    state
        .cache
        .verify_bounty_claim(&admin, market_id, &request.claimant, request.actual_timestamp)?;

    Ok(Json(json!({
        "success": true,
        "market_id": market_id,
        "claimant": request.claimant,
        "actual_timestamp": request.actual_timestamp,
    })))
}

pub async fn resolve_market(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(market_id): Path<MarketId>,
    Json(request): Json<ResolveMarketRequest>,
) -> ApiResult {
    let admin = caller(&headers)?;
    let summary = state.cache.resolve_market(
        &admin,
        market_id,
        request.correct_answer,
        request.actual_timestamp,
    )?;

    Ok(Json(json!({
        "success": true,
        "market_id": market_id,
        "correct_answer": request.correct_answer,
        "settlement": summary,
    })))
}

pub async fn get_admin(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({ "admin": state.manager.admin() }))
}

pub async fn set_admin(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<SetAdminRequest>,
) -> ApiResult {
    let admin = caller(&headers)?;
    state.manager.set_admin(&admin, &request.new_admin)?;
    Ok(Json(json!({ "success": true, "admin": request.new_admin })))
}

pub async fn get_events(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({ "events": state.manager.events().recent(100) }))
}

// ============================================================================
// BALANCE ENDPOINTS
// ============================================================================

pub async fn get_balance(
    State(state): State<SharedState>,
    Path(address): Path<String>,
) -> Json<Value> {
    let balance = state.vault.balance_of(&address);
    Json(json!({
        "address": address,
        "balance": balance,
        "display": format_amount(balance),
    }))
}

pub async fn faucet(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<FaucetRequest>,
) -> ApiResult {
    if !state.config.faucet_enabled {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "Faucet disabled"));
    }
    let admin = caller(&headers)?;
    state.manager.ensure_admin(&admin)?;

    let balance = state
        .vault
        .mint(&request.address, request.amount)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(Json(json!({ "success": true, "address": request.address, "balance": balance })))
}
