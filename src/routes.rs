// HTTP surface: shared state, router and handlers
use axum::{
    extract::State,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AuthUser, JwtVerifier};
use crate::basketball::{
    self, Game, GameFilter, Page, Pagination, Player, PlayerFilter, StatType, Team,
    DEFAULT_DAYS_AHEAD,
};
use crate::cart::{CartPick, CartSnapshot};
use crate::cart_store::CartStore;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::odds::{self, Quote};
use crate::parlay_api::{self, CreateParlay, Parlay, ParlayStats, ParlayStatus};
use crate::profiles::{self, UserProfile};

/// Everything a handler needs, shared behind an `Arc`
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub jwt: JwtVerifier,
    pub carts: CartStore,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self {
            jwt: JwtVerifier::new(&config.auth),
            carts: CartStore::new(&config.cart),
            pool,
            config,
        }
    }
}

type Shared = State<Arc<AppState>>;

pub fn router(state: Arc<AppState>) -> Router {
    let cart = Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/picks", post(add_pick))
        .route("/picks/:pick_id", delete(remove_pick))
        .route("/stake", put(set_stake))
        .route("/open", post(open_cart))
        .route("/close", post(close_cart))
        .route("/place", post(place_cart));

    let parlays = Router::new()
        .route("/", post(create_parlay).get(list_parlays))
        .route("/stats", get(parlay_stats))
        .route("/:id", get(get_parlay).delete(delete_parlay))
        .route("/:id/settle", post(settle_parlay));

    let account = Router::new()
        .route("/profile", get(get_profile))
        .route("/balance", get(get_balance))
        .route("/credits", post(add_credits))
        .route("/favorite-teams", put(set_favorite_teams))
        .route(
            "/favorite-teams/:team_id",
            post(add_favorite_team).delete(remove_favorite_team),
        )
        .route("/favorite-sports", put(set_favorite_sports));

    let basketball = Router::new()
        .route("/teams", get(list_teams))
        .route("/teams/:id", get(get_team))
        .route("/teams/:id/players", get(team_players))
        .route("/abbr/:abbr", get(team_by_abbr))
        .route("/provinces", get(list_provinces))
        .route("/seasons", get(list_seasons))
        .route("/games", get(list_games))
        .route("/games/:id", get(get_game))
        .route("/games/:id/stats", get(game_stats))
        .route("/games/:id/props", get(game_props))
        .route("/games/:id/popular-picks", get(popular_picks))
        .route("/upcoming-games", get(upcoming_games))
        .route("/players", get(list_players))
        .route("/players/:id/last-games", get(player_last_games))
        .route("/players/:id/season-averages", get(season_averages))
        .route("/player-search", get(search_players))
        .route("/top-performers", get(top_performers))
        .route("/favorites/teams", get(favorite_teams))
        .route("/favorites/games", get(favorite_team_games));

    let cors = cors_layer(&state.config.server.allowed_origin);

    Router::new()
        .route("/", get(hello))
        .route("/health", get(health_check))
        .route("/odds/quote", post(quote))
        .nest("/cart", cart)
        .nest("/api/parlays", parlays)
        .nest("/account", account)
        .nest("/basketball", basketball)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    if allowed_origin == "*" {
        return layer.allow_origin(Any);
    }
    match allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!("Invalid CORS origin {:?}, allowing any", allowed_origin);
            layer.allow_origin(Any)
        }
    }
}

// ---------------------------------------------------------------------------
// Liveness and quotes
// ---------------------------------------------------------------------------

async fn hello() -> Json<Value> {
    Json(json!({
        "message": "The Bench parlay service",
        "status": "running"
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "the-bench"
    }))
}

#[derive(Debug, Deserialize)]
struct QuoteRequest {
    odds: Vec<i32>,
    stake: f64,
}

async fn quote(AppJson(req): AppJson<QuoteRequest>) -> AppResult<Json<Quote>> {
    Ok(Json(odds::quote(&req.odds, req.stake)?))
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

async fn get_cart(State(state): Shared, user: AuthUser) -> Json<CartSnapshot> {
    Json(state.carts.with_cart(user.id, |cart| cart.snapshot()).await)
}

async fn add_pick(
    State(state): Shared,
    user: AuthUser,
    AppJson(pick): AppJson<CartPick>,
) -> AppResult<Json<CartSnapshot>> {
    let snapshot = state
        .carts
        .with_cart(user.id, |cart| cart.add_pick(pick).map(|_| cart.snapshot()))
        .await?;
    Ok(Json(snapshot))
}

async fn remove_pick(
    State(state): Shared,
    user: AuthUser,
    AppPath(pick_id): AppPath<String>,
) -> AppResult<Json<CartSnapshot>> {
    state
        .carts
        .with_cart(user.id, |cart| {
            if cart.remove_pick(&pick_id) {
                Some(cart.snapshot())
            } else {
                None
            }
        })
        .await
        .map(Json)
        .ok_or(AppError::NotFound("Pick"))
}

#[derive(Debug, Deserialize)]
struct StakeRequest {
    amount: f64,
}

async fn set_stake(
    State(state): Shared,
    user: AuthUser,
    AppJson(req): AppJson<StakeRequest>,
) -> Json<CartSnapshot> {
    Json(
        state
            .carts
            .with_cart(user.id, |cart| {
                cart.set_stake(req.amount);
                cart.snapshot()
            })
            .await,
    )
}

async fn open_cart(State(state): Shared, user: AuthUser) -> Json<CartSnapshot> {
    Json(
        state
            .carts
            .with_cart(user.id, |cart| {
                cart.open();
                cart.snapshot()
            })
            .await,
    )
}

async fn close_cart(State(state): Shared, user: AuthUser) -> Json<CartSnapshot> {
    Json(
        state
            .carts
            .with_cart(user.id, |cart| {
                cart.close();
                cart.snapshot()
            })
            .await,
    )
}

async fn clear_cart(State(state): Shared, user: AuthUser) -> Json<CartSnapshot> {
    Json(
        state
            .carts
            .with_cart(user.id, |cart| {
                cart.clear();
                cart.snapshot()
            })
            .await,
    )
}

#[derive(Debug, Deserialize)]
struct SportQuery {
    sport: Option<String>,
}

async fn place_cart(
    State(state): Shared,
    user: AuthUser,
    AppQuery(query): AppQuery<SportQuery>,
) -> AppResult<(StatusCode, Json<Parlay>)> {
    let cart = state.carts.cart_for(user.id).await;
    let mut cart = cart.lock().await;
    cart.ensure_placeable()?;

    profiles::get_or_create_profile(&state.pool, user.id, state.config.account.starting_balance).await?;
    let parlay = parlay_api::place_cart(&state.pool, user.id, &mut cart, query.sport).await?;
    Ok((StatusCode::CREATED, Json(parlay)))
}

// ---------------------------------------------------------------------------
// Parlays
// ---------------------------------------------------------------------------

async fn create_parlay(
    State(state): Shared,
    user: AuthUser,
    AppJson(request): AppJson<CreateParlay>,
) -> AppResult<(StatusCode, Json<Parlay>)> {
    parlay_api::validate_request(&request.picks, request.bet_amount)?;
    profiles::get_or_create_profile(&state.pool, user.id, state.config.account.starting_balance).await?;
    let parlay = parlay_api::create_parlay(&state.pool, user.id, request).await?;
    Ok((StatusCode::CREATED, Json(parlay)))
}

#[derive(Debug, Deserialize)]
struct ListParlaysQuery {
    sport: Option<String>,
    status: Option<ParlayStatus>,
}

async fn list_parlays(
    State(state): Shared,
    user: AuthUser,
    AppQuery(query): AppQuery<ListParlaysQuery>,
) -> AppResult<Json<Vec<Parlay>>> {
    let parlays =
        parlay_api::list_user_parlays(&state.pool, user.id, query.sport.as_deref(), query.status).await?;
    Ok(Json(parlays))
}

async fn parlay_stats(State(state): Shared, user: AuthUser) -> AppResult<Json<ParlayStats>> {
    Ok(Json(parlay_api::parlay_stats(&state.pool, user.id).await?))
}

async fn get_parlay(
    State(state): Shared,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Parlay>> {
    let parlay = parlay_api::get_parlay(&state.pool, id, user.id, user.is_service()).await?;
    Ok(Json(parlay))
}

async fn delete_parlay(
    State(state): Shared,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    parlay_api::delete_parlay(&state.pool, id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct SettleRequest {
    status: ParlayStatus,
}

async fn settle_parlay(
    State(state): Shared,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<SettleRequest>,
) -> AppResult<Json<Parlay>> {
    user.require_service()?;
    let parlay = parlay_api::settle_parlay(&state.pool, id, req.status).await?;
    info!("Parlay {} settled as {} by {}", id, parlay.status, user.id);
    Ok(Json(parlay))
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

async fn get_profile(State(state): Shared, user: AuthUser) -> AppResult<Json<UserProfile>> {
    let profile =
        profiles::get_or_create_profile(&state.pool, user.id, state.config.account.starting_balance).await?;
    Ok(Json(profile))
}

async fn get_balance(State(state): Shared, user: AuthUser) -> AppResult<Json<Value>> {
    let balance = profiles::get_balance(&state.pool, user.id).await?;
    Ok(Json(json!({ "balance": balance })))
}

async fn add_credits(State(state): Shared, user: AuthUser) -> AppResult<Json<Value>> {
    let account = &state.config.account;
    if !account.enable_test_credits {
        return Err(AppError::Forbidden);
    }
    profiles::get_or_create_profile(&state.pool, user.id, account.starting_balance).await?;
    let balance = profiles::add_credits(&state.pool, user.id, account.test_credit_amount).await?;
    Ok(Json(json!({
        "added": account.test_credit_amount,
        "balance": balance
    })))
}

#[derive(Debug, Deserialize)]
struct TeamsRequest {
    teams: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SportsRequest {
    sports: Vec<String>,
}

async fn set_favorite_teams(
    State(state): Shared,
    user: AuthUser,
    AppJson(req): AppJson<TeamsRequest>,
) -> AppResult<Json<UserProfile>> {
    profiles::get_or_create_profile(&state.pool, user.id, state.config.account.starting_balance).await?;
    Ok(Json(profiles::set_favorite_teams(&state.pool, user.id, req.teams).await?))
}

async fn set_favorite_sports(
    State(state): Shared,
    user: AuthUser,
    AppJson(req): AppJson<SportsRequest>,
) -> AppResult<Json<UserProfile>> {
    profiles::get_or_create_profile(&state.pool, user.id, state.config.account.starting_balance).await?;
    Ok(Json(profiles::set_favorite_sports(&state.pool, user.id, req.sports).await?))
}

async fn add_favorite_team(
    State(state): Shared,
    user: AuthUser,
    AppPath(team_id): AppPath<i32>,
) -> AppResult<Json<UserProfile>> {
    basketball::get_team(&state.pool, team_id)
        .await?
        .ok_or(AppError::NotFound("Team"))?;
    let profile = profiles::add_favorite_team(
        &state.pool,
        user.id,
        team_id,
        state.config.account.starting_balance,
    )
    .await?;
    Ok(Json(profile))
}

async fn remove_favorite_team(
    State(state): Shared,
    user: AuthUser,
    AppPath(team_id): AppPath<i32>,
) -> AppResult<Json<UserProfile>> {
    Ok(Json(profiles::remove_favorite_team(&state.pool, user.id, team_id).await?))
}

// ---------------------------------------------------------------------------
// Basketball
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<i64>,
    page_size: Option<i64>,
}

impl PageQuery {
    fn paging(&self) -> Pagination {
        Pagination::new(self.page, self.page_size)
    }
}

#[derive(Debug, Deserialize)]
struct ProvinceQuery {
    province: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DaysQuery {
    days_ahead: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LastGamesQuery {
    stat: Option<StatType>,
    games: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SeasonQuery {
    season: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopPerformersQuery {
    stat: Option<StatType>,
    season: Option<String>,
    limit: Option<i64>,
}

async fn list_teams(State(state): Shared, AppQuery(q): AppQuery<ProvinceQuery>) -> AppResult<Json<Vec<Team>>> {
    Ok(Json(basketball::list_teams(&state.pool, q.province.as_deref()).await?))
}

async fn get_team(State(state): Shared, AppPath(id): AppPath<i32>) -> AppResult<Json<Team>> {
    basketball::get_team(&state.pool, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Team"))
}

async fn team_by_abbr(State(state): Shared, AppPath(abbr): AppPath<String>) -> AppResult<Json<Team>> {
    basketball::get_team_by_abbr(&state.pool, &abbr)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Team"))
}

async fn team_players(State(state): Shared, AppPath(id): AppPath<i32>) -> AppResult<Json<Vec<Player>>> {
    Ok(Json(basketball::players_by_team(&state.pool, id).await?))
}

async fn list_provinces(State(state): Shared) -> AppResult<Json<Vec<String>>> {
    Ok(Json(basketball::list_provinces(&state.pool).await?))
}

async fn list_seasons(State(state): Shared) -> AppResult<Json<Vec<basketball::Season>>> {
    Ok(Json(basketball::list_seasons(&state.pool).await?))
}

async fn list_games(
    State(state): Shared,
    AppQuery(filter): AppQuery<GameFilter>,
    AppQuery(page): AppQuery<PageQuery>,
) -> AppResult<Json<Page<Game>>> {
    Ok(Json(basketball::list_games(&state.pool, &filter, page.paging()).await?))
}

async fn get_game(State(state): Shared, AppPath(id): AppPath<i32>) -> AppResult<Json<Game>> {
    basketball::get_game(&state.pool, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Game"))
}

async fn game_stats(
    State(state): Shared,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<Vec<basketball::PlayerGameStats>>> {
    Ok(Json(basketball::game_stats(&state.pool, id).await?))
}

async fn game_props(
    State(state): Shared,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<Vec<basketball::PlayerProp>>> {
    Ok(Json(basketball::game_props(&state.pool, id).await?))
}

async fn popular_picks(
    State(state): Shared,
    AppPath(id): AppPath<i32>,
    AppQuery(q): AppQuery<LimitQuery>,
) -> AppResult<Json<Vec<basketball::PopularPick>>> {
    let limit = q.limit.unwrap_or(10);
    Ok(Json(basketball::popular_picks(&state.pool, id, limit).await?))
}

async fn upcoming_games(State(state): Shared, AppQuery(q): AppQuery<DaysQuery>) -> AppResult<Json<Vec<Game>>> {
    let days = q.days_ahead.unwrap_or(DEFAULT_DAYS_AHEAD);
    Ok(Json(basketball::upcoming_games(&state.pool, days).await?))
}

async fn list_players(
    State(state): Shared,
    AppQuery(filter): AppQuery<PlayerFilter>,
    AppQuery(page): AppQuery<PageQuery>,
) -> AppResult<Json<Page<Player>>> {
    Ok(Json(basketball::list_players(&state.pool, &filter, page.paging()).await?))
}

async fn search_players(State(state): Shared, AppQuery(q): AppQuery<SearchQuery>) -> AppResult<Json<Vec<Player>>> {
    let limit = q.limit.unwrap_or(20);
    Ok(Json(basketball::search_players(&state.pool, &q.q, limit).await?))
}

async fn player_last_games(
    State(state): Shared,
    AppPath(id): AppPath<i32>,
    AppQuery(q): AppQuery<LastGamesQuery>,
) -> AppResult<Json<Vec<basketball::RecentGameStat>>> {
    let stat = q.stat.unwrap_or(StatType::Points);
    let games = q.games.unwrap_or(5);
    Ok(Json(basketball::player_last_n_games(&state.pool, id, stat, games).await?))
}

async fn season_averages(
    State(state): Shared,
    AppPath(id): AppPath<i32>,
    AppQuery(q): AppQuery<SeasonQuery>,
) -> AppResult<Json<Vec<basketball::SeasonAverages>>> {
    Ok(Json(
        basketball::season_averages(&state.pool, id, q.season.as_deref()).await?,
    ))
}

async fn top_performers(
    State(state): Shared,
    AppQuery(q): AppQuery<TopPerformersQuery>,
) -> AppResult<Json<Vec<basketball::TopPerformer>>> {
    let stat = q.stat.unwrap_or(StatType::Points);
    let limit = q.limit.unwrap_or(10);
    Ok(Json(
        basketball::top_performers(&state.pool, stat, q.season.as_deref(), limit).await?,
    ))
}

async fn favorite_teams(State(state): Shared, user: AuthUser) -> AppResult<Json<Vec<Team>>> {
    Ok(Json(basketball::favorite_teams(&state.pool, user.id).await?))
}

async fn favorite_team_games(
    State(state): Shared,
    user: AuthUser,
    AppQuery(q): AppQuery<DaysQuery>,
) -> AppResult<Json<Vec<basketball::FavoriteTeamGame>>> {
    let days = q.days_ahead.unwrap_or(DEFAULT_DAYS_AHEAD);
    Ok(Json(basketball::favorite_team_games(&state.pool, user.id, days).await?))
}
