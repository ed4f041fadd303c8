// HTTP request handlers for the market host

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::MutexGuard;
use tower_http::cors::{Any, CorsLayer};

use crate::address::Address;
use crate::app_state::{AppState, SharedState};
use crate::auth::SignedInstruction;
use crate::error::{ErrorKind, MarketError};
use crate::events::MarketEvent;
use crate::market::{Context, InstructionOutcome, MarketSummary};
use crate::oracle::{feed_key_from_hex, PriceObservation};
use crate::state::{Bet, Market};
use crate::token::TokenLedger;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl ToString) -> ApiError {
    (status, Json(ErrorResponse { success: false, code: code.to_string(), error: error.to_string() }))
}

fn market_error(e: MarketError) -> ApiError {
    let status = match (&e, e.kind()) {
        (MarketError::AccountNotFound(_), _) => StatusCode::NOT_FOUND,
        (_, ErrorKind::Validation) => StatusCode::BAD_REQUEST,
        (_, ErrorKind::Authorization) => StatusCode::FORBIDDEN,
        (_, ErrorKind::Phase) | (_, ErrorKind::Resource) | (_, ErrorKind::Freshness) => StatusCode::CONFLICT,
    };
    api_error(status, e.code(), &e)
}

fn lock(state: &SharedState) -> Result<MutexGuard<'_, AppState>, ApiError> {
    state
        .lock()
        .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "StatePoisoned", "state lock poisoned"))
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    raw.parse::<Address>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "InvalidAddress", e))
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Build the HTTP router over shared host state
pub fn router(state: SharedState) -> Router {
    Router::new()
        // ===== SUBMISSION =====
        .route("/rpc/submit", post(submit_instruction))

        // ===== QUERIES =====
        .route("/markets", get(get_markets))
        .route("/markets/:address", get(get_market))
        .route("/markets/:address/bets", get(get_market_bets))
        .route("/events", get(get_events))

        // ===== DEV TOOLING =====
        .route("/dev/mints", post(dev_create_mint))
        .route("/dev/faucet", post(dev_faucet))
        .route("/dev/prices", post(dev_publish_price))

        // ===== HEALTH CHECK =====
        .route("/health", get(health_check))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn health_check(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let app_state = lock(&state)?;
    Ok(Json(json!({
        "status": "ok",
        "program_id": app_state.program.program_id(),
        "markets": app_state.program.markets().len(),
        "dev_mode": app_state.dev_mode,
    })))
}

// ===== SIGNED INSTRUCTION ENDPOINT =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub instruction: String,
    pub outcome: InstructionOutcome,
}

pub async fn submit_instruction(
    State(state): State<SharedState>,
    Json(envelope): Json<SignedInstruction>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let now = now_secs();
    envelope
        .validate(now)
        .map_err(|e| api_error(StatusCode::UNAUTHORIZED, "InvalidSignature", e))?;

    let mut guard = lock(&state)?;
    let app_state = &mut *guard;
    app_state
        .check_nonce(&envelope)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "InvalidNonce", e))?;
    // Burn the nonce even if the instruction fails, so it cannot be replayed later
    app_state.record_nonce(&envelope);

    let name = envelope.instruction.name();
    let ctx = Context::new(envelope.signer, now);
    let outcome = app_state
        .program
        .process(&ctx, &mut app_state.ledger, &app_state.oracle, envelope.instruction)
        .map_err(market_error)?;

    if let Err(e) = app_state.save_to_disk() {
        tracing::error!(error = %e, "failed to persist state");
    }

    tracing::info!(instruction = name, signer = %envelope.signer, nonce = envelope.nonce, "instruction applied");
    Ok(Json(SubmitResponse { success: true, instruction: name.to_string(), outcome }))
}

// ===== QUERY ENDPOINTS =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketView {
    pub address: Address,
    pub market: Market,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetView {
    pub address: Address,
    pub bet: Bet,
}

pub async fn get_markets(State(state): State<SharedState>) -> Result<Json<Vec<MarketView>>, ApiError> {
    let app_state = lock(&state)?;
    let markets = app_state
        .program
        .markets()
        .into_iter()
        .map(|(address, market)| MarketView { address, market })
        .collect();
    Ok(Json(markets))
}

pub async fn get_market(
    State(state): State<SharedState>,
    Path(address): Path<String>,
) -> Result<Json<MarketSummary>, ApiError> {
    let address = parse_address(&address)?;
    let app_state = lock(&state)?;
    app_state
        .program
        .market_summary(&address)
        .map(Json)
        .map_err(market_error)
}

/// Bets remain listed after the market is cancelled or finalized
pub async fn get_market_bets(
    State(state): State<SharedState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<BetView>>, ApiError> {
    let address = parse_address(&address)?;
    let app_state = lock(&state)?;
    let bets = app_state
        .program
        .bets_for_market(&address)
        .into_iter()
        .map(|(address, bet)| BetView { address, bet })
        .collect();
    Ok(Json(bets))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub market: Option<String>,
}

pub async fn get_events(
    State(state): State<SharedState>,
    Query(filter): Query<EventFilter>,
) -> Result<Json<Vec<MarketEvent>>, ApiError> {
    let market = filter.market.as_deref().map(parse_address).transpose()?;
    let app_state = lock(&state)?;
    let events = app_state
        .program
        .events()
        .iter()
        .filter(|event| market.map_or(true, |m| *event.market() == m))
        .cloned()
        .collect();
    Ok(Json(events))
}

// ===== DEV ENDPOINTS (HOST_DEV_MODE only) =====

fn require_dev_mode(app_state: &AppState) -> Result<(), ApiError> {
    if !app_state.dev_mode {
        return Err(api_error(StatusCode::NOT_FOUND, "DevModeDisabled", "dev endpoints are disabled"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMintRequest {
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    6
}

pub async fn dev_create_mint(
    State(state): State<SharedState>,
    Json(request): Json<CreateMintRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut app_state = lock(&state)?;
    require_dev_mode(&app_state)?;

    let mint = app_state.ledger.create_mint(request.decimals);
    tracing::info!(%mint, decimals = request.decimals, "dev mint created");
    Ok(Json(json!({ "success": true, "mint": mint })))
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaucetRequest {
    pub owner: Address,
    pub mint: Address,
    pub amount: u64,
}

/// Open the owner's holding if needed and issue `amount` into it
pub async fn dev_faucet(
    State(state): State<SharedState>,
    Json(request): Json<FaucetRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut app_state = lock(&state)?;
    require_dev_mode(&app_state)?;

    let ledger_error = |e: crate::token::LedgerError| api_error(StatusCode::BAD_REQUEST, e.code(), &e);
    let holding = match app_state.ledger.find_holding(&request.owner, &request.mint) {
        Some(holding) => holding,
        None => app_state
            .ledger
            .create_holding(&request.owner, &request.mint)
            .map_err(ledger_error)?,
    };
    app_state.ledger.mint_to(&holding, request.amount).map_err(ledger_error)?;
    let balance = app_state.ledger.balance(&holding).map_err(ledger_error)?;

    tracing::info!(owner = %request.owner, mint = %request.mint, amount = request.amount, "dev faucet");
    Ok(Json(json!({ "success": true, "holding": holding, "balance": balance })))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishPriceRequest {
    pub feed_id: String,
    pub price: i64,
    pub exponent: i32,
    /// Defaults to the current time
    pub publish_time: Option<u64>,
}

pub async fn dev_publish_price(
    State(state): State<SharedState>,
    Json(request): Json<PublishPriceRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut app_state = lock(&state)?;
    require_dev_mode(&app_state)?;

    let feed = feed_key_from_hex(&request.feed_id).map_err(market_error)?;
    let observation = PriceObservation {
        price: request.price,
        exponent: request.exponent,
        publish_time: request.publish_time.unwrap_or_else(now_secs),
    };
    app_state.oracle.publish(feed, observation);
    Ok(Json(json!({ "success": true, "feed_id": request.feed_id, "publish_time": observation.publish_time })))
}
