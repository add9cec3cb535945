//! REST API endpoints for the ApiGateway
//!
//! Public reads (quotes, plans, tournaments, leaderboards) need no token;
//! everything scoped to a user takes the caller from the bearer token.

use account_service::{
    AccountService, ClosePositionRequest, CreateFundedAccountRequest, OpenPositionRequest,
    PerformanceSample,
};
use market_feed::QuoteBroadcaster;
use serde::Serialize;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

use crate::auth::{with_auth, AuthenticatedUser, TokenValidator};
use crate::error::{handle_rejection, reject};
use crate::websocket_handler::handle_socket;

/// Shared handles every route needs
#[derive(Clone)]
pub struct ApiContext {
    pub accounts: AccountService,
    pub broadcaster: Arc<QuoteBroadcaster>,
    pub validator: Arc<TokenValidator>,
    pub max_body_bytes: u64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub instruments: usize,
    pub subscribers: usize,
    pub timestamp: String,
}

async fn get_currency_pairs(ctx: ApiContext) -> Result<impl Reply, Rejection> {
    let pairs = ctx.accounts.prices().snapshot().await;
    Ok(warp::reply::json(&pairs))
}

async fn get_trading_plans(ctx: ApiContext) -> Result<impl Reply, Rejection> {
    let plans = ctx.accounts.trading_plans().await.map_err(reject)?;
    Ok(warp::reply::json(&plans))
}

async fn get_tournaments(ctx: ApiContext) -> Result<impl Reply, Rejection> {
    let tournaments = ctx.accounts.tournaments().await.map_err(reject)?;
    Ok(warp::reply::json(&tournaments))
}

async fn get_tournament_leaderboard(tournament_id: i32, ctx: ApiContext) -> Result<impl Reply, Rejection> {
    let leaderboard = ctx.accounts.tournament_leaderboard(tournament_id).await.map_err(reject)?;
    Ok(warp::reply::json(&leaderboard))
}

async fn join_tournament(
    tournament_id: i32,
    user: AuthenticatedUser,
    ctx: ApiContext,
) -> Result<impl Reply, Rejection> {
    let participant =
        ctx.accounts.join_tournament(&user.user_id, tournament_id).await.map_err(reject)?;
    Ok(warp::reply::json(&participant))
}

async fn get_dashboard(user: AuthenticatedUser, ctx: ApiContext) -> Result<impl Reply, Rejection> {
    let dashboard = ctx.accounts.dashboard(&user.user_id).await.map_err(reject)?;
    Ok(warp::reply::json(&dashboard))
}

async fn get_positions(user: AuthenticatedUser, ctx: ApiContext) -> Result<impl Reply, Rejection> {
    let positions = ctx.accounts.positions(&user.user_id).await.map_err(reject)?;
    Ok(warp::reply::json(&positions))
}

async fn open_position(
    user: AuthenticatedUser,
    request: OpenPositionRequest,
    ctx: ApiContext,
) -> Result<impl Reply, Rejection> {
    let position = ctx.accounts.open_position(&user.user_id, request).await.map_err(reject)?;
    Ok(warp::reply::json(&position))
}

async fn close_position(
    position_id: i32,
    user: AuthenticatedUser,
    request: ClosePositionRequest,
    ctx: ApiContext,
) -> Result<impl Reply, Rejection> {
    let position =
        ctx.accounts.close_position(&user.user_id, position_id, request).await.map_err(reject)?;
    Ok(warp::reply::json(&position))
}

async fn get_funded_accounts(user: AuthenticatedUser, ctx: ApiContext) -> Result<impl Reply, Rejection> {
    let accounts = ctx.accounts.funded_accounts(&user.user_id).await.map_err(reject)?;
    Ok(warp::reply::json(&accounts))
}

async fn create_funded_account(
    user: AuthenticatedUser,
    request: CreateFundedAccountRequest,
    ctx: ApiContext,
) -> Result<impl Reply, Rejection> {
    let account =
        ctx.accounts.create_funded_account(&user.user_id, request).await.map_err(reject)?;
    Ok(warp::reply::json(&account))
}

async fn get_funded_account_performance(
    account_id: i32,
    user: AuthenticatedUser,
    ctx: ApiContext,
) -> Result<impl Reply, Rejection> {
    let history = ctx
        .accounts
        .funded_account_performance(&user.user_id, account_id)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&history))
}

async fn record_funded_account_performance(
    account_id: i32,
    user: AuthenticatedUser,
    sample: PerformanceSample,
    ctx: ApiContext,
) -> Result<impl Reply, Rejection> {
    let record = ctx
        .accounts
        .record_performance(&user.user_id, account_id, sample)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&record))
}

async fn get_funded_trader_leaderboard(ctx: ApiContext) -> Result<impl Reply, Rejection> {
    let leaderboard = ctx.accounts.funded_trader_leaderboard().await.map_err(reject)?;
    Ok(warp::reply::json(&leaderboard))
}

async fn login(user: AuthenticatedUser, ctx: ApiContext) -> Result<impl Reply, Rejection> {
    let record = ctx.accounts.login(user.profile()).await.map_err(reject)?;
    Ok(warp::reply::json(&record))
}

async fn get_current_user(user: AuthenticatedUser, ctx: ApiContext) -> Result<impl Reply, Rejection> {
    let record = ctx.accounts.current_user(&user.user_id).await.map_err(reject)?;
    Ok(warp::reply::json(&record))
}

/// Degraded while no instruments are tracked, since quotes and positions need them
async fn health(ctx: ApiContext) -> Result<impl Reply, Rejection> {
    let instruments = ctx.accounts.prices().len().await;
    Ok(warp::reply::json(&HealthResponse {
        status: if instruments == 0 { "degraded" } else { "healthy" },
        instruments,
        subscribers: ctx.broadcaster.subscriber_count().await,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// Build every REST and WebSocket route with error recovery and CORS applied
pub fn create_routes(ctx: ApiContext) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let body_limit = ctx.max_body_bytes;
    let auth = with_auth(ctx.validator.clone());
    let context_filter = warp::any().map(move || ctx.clone());

    let currency_pairs = warp::path!("api" / "currency-pairs")
        .and(warp::get())
        .and(context_filter.clone())
        .and_then(get_currency_pairs);

    let trading_plans = warp::path!("api" / "trading-plans")
        .and(warp::get())
        .and(context_filter.clone())
        .and_then(get_trading_plans);

    let tournaments = warp::path!("api" / "tournaments")
        .and(warp::get())
        .and(context_filter.clone())
        .and_then(get_tournaments);

    let tournament_leaderboard = warp::path!("api" / "tournament" / i32 / "leaderboard")
        .and(warp::get())
        .and(context_filter.clone())
        .and_then(get_tournament_leaderboard);

    let tournament_join = warp::path!("api" / "tournament" / i32 / "join")
        .and(warp::post())
        .and(auth.clone())
        .and(context_filter.clone())
        .and_then(join_tournament);

    let dashboard = warp::path!("api" / "dashboard")
        .and(warp::get())
        .and(auth.clone())
        .and(context_filter.clone())
        .and_then(get_dashboard);

    let list_positions = warp::path!("api" / "positions")
        .and(warp::get())
        .and(auth.clone())
        .and(context_filter.clone())
        .and_then(get_positions);

    let create_position = warp::path!("api" / "positions")
        .and(warp::post())
        .and(auth.clone())
        .and(warp::body::content_length_limit(body_limit))
        .and(warp::body::json())
        .and(context_filter.clone())
        .and_then(open_position);

    let close = warp::path!("api" / "positions" / i32 / "close")
        .and(warp::put())
        .and(auth.clone())
        .and(warp::body::content_length_limit(body_limit))
        .and(warp::body::json())
        .and(context_filter.clone())
        .and_then(close_position);

    let list_funded = warp::path!("api" / "funded-accounts")
        .and(warp::get())
        .and(auth.clone())
        .and(context_filter.clone())
        .and_then(get_funded_accounts);

    let create_funded = warp::path!("api" / "funded-accounts")
        .and(warp::post())
        .and(auth.clone())
        .and(warp::body::content_length_limit(body_limit))
        .and(warp::body::json())
        .and(context_filter.clone())
        .and_then(create_funded_account);

    let funded_performance = warp::path!("api" / "funded-accounts" / i32 / "performance")
        .and(warp::get())
        .and(auth.clone())
        .and(context_filter.clone())
        .and_then(get_funded_account_performance);

    let record_performance = warp::path!("api" / "funded-accounts" / i32 / "performance")
        .and(warp::post())
        .and(auth.clone())
        .and(warp::body::content_length_limit(body_limit))
        .and(warp::body::json())
        .and(context_filter.clone())
        .and_then(record_funded_account_performance);

    let funded_traders = warp::path!("api" / "leaderboard" / "funded-traders")
        .and(warp::get())
        .and(context_filter.clone())
        .and_then(get_funded_trader_leaderboard);

    let auth_login = warp::path!("api" / "auth" / "login")
        .and(warp::post())
        .and(auth.clone())
        .and(context_filter.clone())
        .and_then(login);

    let auth_user = warp::path!("api" / "auth" / "user")
        .and(warp::get())
        .and(auth)
        .and(context_filter.clone())
        .and_then(get_current_user);

    // Health check endpoint
    let health_check = warp::path!("health")
        .and(warp::get())
        .and(context_filter.clone())
        .and_then(health);

    let websocket = warp::path!("ws")
        .and(warp::ws())
        .and(context_filter)
        .map(|ws: warp::ws::Ws, ctx: ApiContext| {
            let broadcaster = ctx.broadcaster.clone();
            let prices = ctx.accounts.prices().clone();
            ws.on_upgrade(move |socket| handle_socket(socket, broadcaster, prices))
        });

    // Combine all routes
    currency_pairs
        .or(trading_plans)
        .or(tournaments)
        .or(tournament_leaderboard)
        .or(tournament_join)
        .or(dashboard)
        .or(list_positions)
        .or(create_position)
        .or(close)
        .or(list_funded)
        .or(create_funded)
        .or(funded_performance)
        .or(record_performance)
        .or(funded_traders)
        .or(auth_login)
        .or(auth_user)
        .or(health_check)
        .or(websocket)
        .recover(handle_rejection)
        .with(
            warp::cors()
                .allow_any_origin()
                .allow_headers(vec!["content-type", "authorization"])
                .allow_methods(vec!["GET", "POST", "PUT", "OPTIONS"]),
        )
}
