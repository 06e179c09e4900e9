//! Parlay placement, settlement and history.
//!
//! Anything that moves credits runs inside a SERIALIZABLE transaction so a
//! failed insert can never leave a debited balance behind.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, PgPool, Row};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::cart::{CartError, CartPick, ParlayCart, PickType, MAX_PICKS, MAX_STAKE, MIN_PICKS, MIN_STAKE};
use crate::db_adapter::DbAdapter;
use crate::error::{AppError, AppResult};
use crate::odds;

// Configuration constants for concurrency control
const MAX_RETRY_ATTEMPTS: u32 = 5;
const BASE_RETRY_DELAY_MS: u64 = 10;

pub const DEFAULT_SPORT: &str = "basketball";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ParlayStatus {
    Pending,
    Won,
    Lost,
}

impl ParlayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParlayStatus::Pending => "pending",
            ParlayStatus::Won => "won",
            ParlayStatus::Lost => "lost",
        }
    }
}

impl FromStr for ParlayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ParlayStatus::Pending),
            "won" => Ok(ParlayStatus::Won),
            "lost" => Ok(ParlayStatus::Lost),
            _ => Err(format!("Invalid parlay status: '{}'", s)),
        }
    }
}

impl fmt::Display for ParlayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body for direct placement
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateParlay {
    pub picks: Vec<CartPick>,
    pub bet_amount: f64,
    #[serde(default = "default_sport")]
    pub sport: String,
}

fn default_sport() -> String {
    DEFAULT_SPORT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StoredPick {
    pub id: Uuid,
    pub parlay_id: Uuid,
    pub player_name: String,
    pub team_name: String,
    pub prop_type: String,
    pub predicted_value: f64,
    pub pick_type: PickType,
    pub odds: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Parlay {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sport: String,
    pub total_odds: i64,
    pub bet_amount: f64,
    pub potential_payout: f64,
    pub status: ParlayStatus,
    pub placed_at: DateTime<Utc>,
    pub picks: Vec<StoredPick>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ParlayStats {
    pub total_parlays: i64,
    pub pending_parlays: i64,
    pub won_parlays: i64,
    pub lost_parlays: i64,
    pub total_wagered: f64,
    pub total_won: f64,
}

/// Macro for executing transactions with SERIALIZABLE isolation and retry logic
macro_rules! with_serializable_tx {
    ($pool:expr, $tx_var:ident, $body:block) => {{
        let mut attempt = 1;
        loop {
            let mut $tx_var = $pool.begin().await?;

            // Set SERIALIZABLE isolation level
            $tx_var
                .execute(sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"))
                .await?;

            let result: AppResult<_> = async { $body }.await;

            // A conflict can also surface at COMMIT, so it shares the retry path
            let result = match result {
                Ok(value) => $tx_var.commit().await.map(|_| value).map_err(AppError::from),
                Err(e) => {
                    $tx_var.rollback().await.ok();
                    Err(e)
                }
            };

            match result {
                Ok(value) => break Ok(value),
                Err(e) if e.is_retryable() && attempt < MAX_RETRY_ATTEMPTS => {
                    // Exponential backoff with jitter
                    let jitter = rand::thread_rng().gen_range(0..10);
                    let delay_ms = BASE_RETRY_DELAY_MS * (1 << (attempt - 1)) + jitter;
                    warn!("Serialization conflict, retrying (attempt {})", attempt);
                    sleep(StdDuration::from_millis(delay_ms)).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => break Err(e),
            }
        }
    }};
}

/// Validation that needs no database access
pub fn validate_request(picks: &[CartPick], bet_amount: f64) -> AppResult<()> {
    if !bet_amount.is_finite() || !(MIN_STAKE..=MAX_STAKE).contains(&bet_amount) {
        return Err(AppError::Validation(
            "Bet amount must be between $10 and $1000".to_string(),
        ));
    }
    if !(MIN_PICKS..=MAX_PICKS).contains(&picks.len()) {
        return Err(AppError::Validation(format!(
            "Parlay must have between {} and {} picks",
            MIN_PICKS, MAX_PICKS
        )));
    }
    let mut seen = HashSet::with_capacity(picks.len());
    for pick in picks {
        pick.validate()?;
        if !seen.insert(pick.id.as_str()) {
            return Err(CartError::DuplicatePick.into());
        }
    }
    Ok(())
}

/// Debit the stake and record the parlay with its picks
pub async fn create_parlay(pool: &PgPool, user_id: Uuid, request: CreateParlay) -> AppResult<Parlay> {
    validate_request(&request.picks, request.bet_amount)?;

    let odds_list: Vec<i32> = request.picks.iter().map(|p| p.odds).collect();
    let total_odds = odds::combined_american_odds(&odds_list).round() as i64;
    let potential_payout = odds::potential_payout(&odds_list, request.bet_amount);
    let sport = if request.sport.trim().is_empty() {
        default_sport()
    } else {
        request.sport.trim().to_lowercase()
    };

    let parlay_id = Uuid::new_v4();
    with_serializable_tx!(pool, tx, {
        let balance = DbAdapter::lock_balance(&mut tx, user_id)
            .await?
            .ok_or(AppError::NotFound("Profile"))?;
        if balance < request.bet_amount {
            return Err(AppError::InsufficientBalance);
        }

        if !DbAdapter::debit_balance(&mut tx, user_id, request.bet_amount).await? {
            return Err(AppError::InsufficientBalance);
        }
        DbAdapter::insert_parlay(
            &mut tx,
            parlay_id,
            user_id,
            &sport,
            total_odds,
            request.bet_amount,
            potential_payout,
        )
        .await?;
        DbAdapter::insert_picks(&mut tx, parlay_id, &request.picks).await?;
        Ok(())
    })?;

    info!(
        "Parlay {} placed by {}: {} picks, stake {}, odds {:+}, payout {}",
        parlay_id,
        user_id,
        request.picks.len(),
        request.bet_amount,
        total_odds,
        potential_payout
    );

    fetch_parlay(pool, parlay_id)
        .await?
        .ok_or(AppError::NotFound("Parlay"))
}

/// Place whatever is in the cart, then empty it
pub async fn place_cart(
    pool: &PgPool,
    user_id: Uuid,
    cart: &mut ParlayCart,
    sport: Option<String>,
) -> AppResult<Parlay> {
    cart.ensure_placeable()?;

    let parlay = create_parlay(
        pool,
        user_id,
        CreateParlay {
            picks: cart.picks().to_vec(),
            bet_amount: cart.stake(),
            sport: sport.unwrap_or_else(default_sport),
        },
    )
    .await?;

    cart.clear();
    Ok(parlay)
}

fn parlay_from_row(row: &sqlx::postgres::PgRow) -> AppResult<Parlay> {
    let status: String = row.get("status");
    Ok(Parlay {
        id: row.get("id"),
        user_id: row.get("user_id"),
        sport: row.get("sport"),
        total_odds: row.get("total_odds"),
        bet_amount: DbAdapter::decimal_to_f64(row.get("bet_amount"))?,
        potential_payout: DbAdapter::decimal_to_f64(row.get("potential_payout"))?,
        status: status.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        placed_at: row.get("placed_at"),
        picks: Vec::new(),
    })
}

fn pick_from_row(row: &sqlx::postgres::PgRow) -> AppResult<StoredPick> {
    let pick_type: String = row.get("pick_type");
    Ok(StoredPick {
        id: row.get("id"),
        parlay_id: row.get("parlay_id"),
        player_name: row.get("player_name"),
        team_name: row.get("team_name"),
        prop_type: row.get("prop_type"),
        predicted_value: row.get("predicted_value"),
        pick_type: pick_type.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        odds: row.get("odds"),
        created_at: row.get("created_at"),
    })
}

const PARLAY_COLUMNS: &str =
    "id, user_id, sport, total_odds, bet_amount, potential_payout, status, placed_at";
const PICK_COLUMNS: &str =
    "id, parlay_id, player_name, team_name, prop_type, predicted_value, pick_type, odds, created_at";

/// Attach picks to each parlay with a single query
async fn attach_picks(pool: &PgPool, parlays: &mut [Parlay]) -> AppResult<()> {
    if parlays.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = parlays.iter().map(|p| p.id).collect();
    let rows = sqlx::query(&format!(
        "SELECT {} FROM parlay_picks WHERE parlay_id = ANY($1) ORDER BY created_at, id",
        PICK_COLUMNS
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    let mut by_parlay: HashMap<Uuid, Vec<StoredPick>> = HashMap::new();
    for row in &rows {
        let pick = pick_from_row(row)?;
        by_parlay.entry(pick.parlay_id).or_default().push(pick);
    }
    for parlay in parlays.iter_mut() {
        parlay.picks = by_parlay.remove(&parlay.id).unwrap_or_default();
    }
    Ok(())
}

async fn fetch_parlay(pool: &PgPool, parlay_id: Uuid) -> AppResult<Option<Parlay>> {
    let row = sqlx::query(&format!("SELECT {} FROM parlays WHERE id = $1", PARLAY_COLUMNS))
        .bind(parlay_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let mut parlays = vec![parlay_from_row(&row)?];
            attach_picks(pool, &mut parlays).await?;
            Ok(parlays.pop())
        }
        None => Ok(None),
    }
}

/// A single parlay, visible to its owner or the service role
pub async fn get_parlay(pool: &PgPool, parlay_id: Uuid, requester: Uuid, is_service: bool) -> AppResult<Parlay> {
    let parlay = fetch_parlay(pool, parlay_id)
        .await?
        .ok_or(AppError::NotFound("Parlay"))?;
    if parlay.user_id != requester && !is_service {
        return Err(AppError::Forbidden);
    }
    Ok(parlay)
}

/// A user's parlays, newest first, optionally filtered by sport and status
pub async fn list_user_parlays(
    pool: &PgPool,
    user_id: Uuid,
    sport: Option<&str>,
    status: Option<ParlayStatus>,
) -> AppResult<Vec<Parlay>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM parlays
         WHERE user_id = $1
           AND ($2::TEXT IS NULL OR sport = $2)
           AND ($3::TEXT IS NULL OR status = $3)
         ORDER BY placed_at DESC",
        PARLAY_COLUMNS
    ))
    .bind(user_id)
    .bind(sport)
    .bind(status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await?;

    let mut parlays = rows.iter().map(parlay_from_row).collect::<AppResult<Vec<_>>>()?;
    attach_picks(pool, &mut parlays).await?;
    Ok(parlays)
}

/// Settle a pending parlay; a transition to `won` pays out the potential payout
pub async fn settle_parlay(pool: &PgPool, parlay_id: Uuid, status: ParlayStatus) -> AppResult<Parlay> {
    with_serializable_tx!(pool, tx, {
        let row = sqlx::query("SELECT user_id, status, potential_payout FROM parlays WHERE id = $1 FOR UPDATE")
            .bind(parlay_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Parlay"))?;

        let user_id: Uuid = row.get("user_id");
        let previous: String = row.get("status");
        let payout = DbAdapter::decimal_to_f64(row.get("potential_payout"))?;

        if previous == status.as_str() {
            debug!("Parlay {} already {}", parlay_id, status);
            return Ok(());
        }
        if previous != ParlayStatus::Pending.as_str() {
            return Err(AppError::Validation(format!("Parlay is already {}", previous)));
        }

        sqlx::query("UPDATE parlays SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(parlay_id)
            .execute(&mut *tx)
            .await?;

        if status == ParlayStatus::Won && !DbAdapter::credit_balance(&mut tx, user_id, payout).await? {
            return Err(AppError::NotFound("Profile"));
        }
        Ok(())
    })?;

    info!("Parlay {} settled as {}", parlay_id, status);
    fetch_parlay(pool, parlay_id)
        .await?
        .ok_or(AppError::NotFound("Parlay"))
}

/// Delete a parlay; pending parlays refund their stake
pub async fn delete_parlay(pool: &PgPool, parlay_id: Uuid, requester: Uuid) -> AppResult<()> {
    let refunded = with_serializable_tx!(pool, tx, {
        let row = sqlx::query("SELECT user_id, status, bet_amount FROM parlays WHERE id = $1 FOR UPDATE")
            .bind(parlay_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Parlay"))?;

        let owner: Uuid = row.get("user_id");
        if owner != requester {
            return Err(AppError::Forbidden);
        }
        let status: String = row.get("status");
        let bet_amount = DbAdapter::decimal_to_f64(row.get("bet_amount"))?;

        sqlx::query("DELETE FROM parlays WHERE id = $1")
            .bind(parlay_id)
            .execute(&mut *tx)
            .await?;

        if status == ParlayStatus::Pending.as_str() {
            DbAdapter::credit_balance(&mut tx, owner, bet_amount).await?;
            Ok(Some(bet_amount))
        } else {
            Ok(None)
        }
    })?;

    match refunded {
        Some(amount) => info!("Parlay {} deleted, refunded {}", parlay_id, amount),
        None => info!("Parlay {} deleted", parlay_id),
    }
    Ok(())
}

/// Win/loss counts and totals for a user
pub async fn parlay_stats(pool: &PgPool, user_id: Uuid) -> AppResult<ParlayStats> {
    let row = sqlx::query(
        "SELECT
            COUNT(*) AS total_parlays,
            COUNT(*) FILTER (WHERE status = 'pending') AS pending_parlays,
            COUNT(*) FILTER (WHERE status = 'won') AS won_parlays,
            COUNT(*) FILTER (WHERE status = 'lost') AS lost_parlays,
            COALESCE(SUM(bet_amount), 0) AS total_wagered,
            COALESCE(SUM(potential_payout) FILTER (WHERE status = 'won'), 0) AS total_won
         FROM parlays
         WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(ParlayStats {
        total_parlays: row.get("total_parlays"),
        pending_parlays: row.get("pending_parlays"),
        won_parlays: row.get("won_parlays"),
        lost_parlays: row.get("lost_parlays"),
        total_wagered: DbAdapter::decimal_to_f64(row.get("total_wagered"))?,
        total_won: DbAdapter::decimal_to_f64(row.get("total_won"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::sample_pick;

    #[test]
    fn stake_bounds_are_enforced() {
        let picks = vec![sample_pick("a", 150), sample_pick("b", -110)];
        assert!(validate_request(&picks, 10.0).is_ok());
        assert!(validate_request(&picks, 1000.0).is_ok());
        let err = validate_request(&picks, 9.99).unwrap_err();
        assert_eq!(err.to_string(), "Bet amount must be between $10 and $1000");
        assert!(validate_request(&picks, 1000.01).is_err());
        assert!(validate_request(&picks, f64::INFINITY).is_err());
    }

    #[test]
    fn pick_count_bounds_are_enforced() {
        let one = vec![sample_pick("a", 150)];
        assert_eq!(
            validate_request(&one, 50.0).unwrap_err().to_string(),
            "Parlay must have between 2 and 5 picks"
        );
        let six: Vec<_> = (0..6).map(|i| sample_pick(&i.to_string(), 150)).collect();
        assert!(validate_request(&six, 50.0).is_err());
    }

    #[test]
    fn malformed_picks_are_rejected() {
        let mut bad = sample_pick("b", -110);
        bad.team_name.clear();
        let picks = vec![sample_pick("a", 150), bad];
        assert_eq!(
            validate_request(&picks, 50.0).unwrap_err().to_string(),
            "Invalid pick data structure"
        );
    }

    #[test]
    fn repeated_pick_ids_are_rejected() {
        let picks = vec![
            sample_pick("a", 150),
            sample_pick("b", -110),
            sample_pick("a", 150),
        ];
        let err = validate_request(&picks, 50.0).unwrap_err();
        assert!(matches!(err, AppError::Cart(CartError::DuplicatePick)));
        assert_eq!(err.to_string(), "This pick is already in your parlay");

        let distinct = vec![sample_pick("a", 150), sample_pick("c", 150)];
        assert!(validate_request(&distinct, 50.0).is_ok());
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [ParlayStatus::Pending, ParlayStatus::Won, ParlayStatus::Lost] {
            assert_eq!(status.as_str().parse::<ParlayStatus>(), Ok(status));
        }
        assert!("void".parse::<ParlayStatus>().is_err());
    }

    #[test]
    fn create_request_defaults_sport() {
        let body = serde_json::json!({
            "picks": [],
            "betAmount": 25.0
        });
        let request: CreateParlay = serde_json::from_value(body).unwrap();
        assert_eq!(request.sport, "basketball");
    }
}
