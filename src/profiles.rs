// User profiles: favorites and credit balance
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use crate::db_adapter::DbAdapter;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub favorite_teams: Vec<String>,
    pub favorite_sports: Vec<String>,
    pub balance: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn profile_from_row(row: &sqlx::postgres::PgRow) -> AppResult<UserProfile> {
    Ok(UserProfile {
        id: row.get("id"),
        favorite_teams: row.get("favorite_teams"),
        favorite_sports: row.get("favorite_sports"),
        balance: DbAdapter::decimal_to_f64(row.get("balance"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const PROFILE_COLUMNS: &str = "id, favorite_teams, favorite_sports, balance, created_at, updated_at";

pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> AppResult<Option<UserProfile>> {
    let row = sqlx::query(&format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(profile_from_row).transpose()
}

/// Insert an empty profile with the starting balance; concurrent creators share one row
pub async fn create_profile(pool: &PgPool, user_id: Uuid, starting_balance: f64) -> AppResult<UserProfile> {
    sqlx::query(
        "INSERT INTO profiles (id, favorite_teams, favorite_sports, balance)
         VALUES ($1, '{}', '{}', $2)
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(user_id)
    .bind(DbAdapter::f64_to_money(starting_balance)?)
    .execute(pool)
    .await?;

    info!("Created profile for {} with balance {}", user_id, starting_balance);
    get_profile(pool, user_id)
        .await?
        .ok_or(AppError::NotFound("Profile"))
}

pub async fn get_or_create_profile(pool: &PgPool, user_id: Uuid, starting_balance: f64) -> AppResult<UserProfile> {
    match get_profile(pool, user_id).await? {
        Some(profile) => Ok(profile),
        None => create_profile(pool, user_id, starting_balance).await,
    }
}

/// Drop blanks and duplicates while keeping the caller's order
fn normalize_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

async fn update_list(pool: &PgPool, user_id: Uuid, column: ListColumn, items: Vec<String>) -> AppResult<UserProfile> {
    let items = normalize_list(items);
    let sql = format!(
        "UPDATE profiles SET {} = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
        column.as_str(),
        PROFILE_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(&items)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Profile"))?;

    profile_from_row(&row)
}

#[derive(Clone, Copy)]
enum ListColumn {
    FavoriteTeams,
    FavoriteSports,
}

impl ListColumn {
    fn as_str(&self) -> &'static str {
        match self {
            ListColumn::FavoriteTeams => "favorite_teams",
            ListColumn::FavoriteSports => "favorite_sports",
        }
    }
}

pub async fn set_favorite_teams(pool: &PgPool, user_id: Uuid, teams: Vec<String>) -> AppResult<UserProfile> {
    update_list(pool, user_id, ListColumn::FavoriteTeams, teams).await
}

pub async fn set_favorite_sports(pool: &PgPool, user_id: Uuid, sports: Vec<String>) -> AppResult<UserProfile> {
    update_list(pool, user_id, ListColumn::FavoriteSports, sports).await
}

/// Add one team; adding a team already in the list changes nothing.
/// The append happens in a single statement so concurrent adds all land.
pub async fn add_favorite_team(pool: &PgPool, user_id: Uuid, team_id: i32, starting_balance: f64) -> AppResult<UserProfile> {
    get_or_create_profile(pool, user_id, starting_balance).await?;

    let sql = format!(
        "UPDATE profiles
         SET favorite_teams = array_append(favorite_teams, $1::text), updated_at = NOW()
         WHERE id = $2 AND NOT ($1::text = ANY(favorite_teams))
         RETURNING {}",
        PROFILE_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(team_id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => profile_from_row(&row),
        // Already a favorite
        None => get_profile(pool, user_id)
            .await?
            .ok_or(AppError::NotFound("Profile")),
    }
}

pub async fn remove_favorite_team(pool: &PgPool, user_id: Uuid, team_id: i32) -> AppResult<UserProfile> {
    let sql = format!(
        "UPDATE profiles
         SET favorite_teams = array_remove(favorite_teams, $1::text), updated_at = NOW()
         WHERE id = $2
         RETURNING {}",
        PROFILE_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(team_id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Profile"))?;

    profile_from_row(&row)
}

/// Balance, or 0 when the user has no profile yet
pub async fn get_balance(pool: &PgPool, user_id: Uuid) -> AppResult<f64> {
    let balance: Option<rust_decimal::Decimal> =
        sqlx::query_scalar("SELECT balance FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    match balance {
        Some(balance) => Ok(DbAdapter::decimal_to_f64(balance)?),
        None => Ok(0.0),
    }
}

/// Test-mode top-up; returns the new balance
pub async fn add_credits(pool: &PgPool, user_id: Uuid, amount: f64) -> AppResult<f64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::Validation("Credit amount must be positive".to_string()));
    }
    let mut tx = pool.begin().await?;
    if !DbAdapter::credit_balance(&mut tx, user_id, amount).await? {
        return Err(AppError::NotFound("Profile"));
    }
    tx.commit().await?;

    info!("Added {} test credits to {}", amount, user_id);
    get_balance(pool, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_dedups() {
        let out = normalize_list(vec![
            " 3".to_string(),
            "1".to_string(),
            "3".to_string(),
            "".to_string(),
            "  ".to_string(),
        ]);
        assert_eq!(out, vec!["3".to_string(), "1".to_string()]);
    }

    #[test]
    fn list_columns_are_fixed_identifiers() {
        assert_eq!(ListColumn::FavoriteTeams.as_str(), "favorite_teams");
        assert_eq!(ListColumn::FavoriteSports.as_str(), "favorite_sports");
    }
}
