//! Database adapter layer for clean numeric conversions
//! Money columns are NUMERIC (Decimal); odds and payout math runs on f64.

use anyhow::{anyhow, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::cart::CartPick;

/// Conversions between database Decimal and core f64 math
pub struct DbAdapter;

impl DbAdapter {
    /// Convert database Decimal to f64 for odds math
    #[inline]
    pub fn decimal_to_f64(decimal: Decimal) -> Result<f64> {
        decimal
            .to_f64()
            .ok_or_else(|| anyhow!("Failed to convert Decimal to f64: {}", decimal))
    }

    /// Convert an f64 amount to a Decimal rounded to cents for storage
    #[inline]
    pub fn f64_to_money(value: f64) -> Result<Decimal> {
        if !value.is_finite() {
            return Err(anyhow!("Cannot convert non-finite f64 to Decimal: {}", value));
        }
        Decimal::from_f64_retain(value)
            .map(|d| d.round_dp(2))
            .ok_or_else(|| anyhow!("Failed to convert f64 to Decimal: {}", value))
    }
}

/// Balance and parlay writes used inside placement/settlement transactions
impl DbAdapter {
    /// Current balance with the profile row locked for the rest of the transaction
    pub async fn lock_balance(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
    ) -> Result<Option<f64>> {
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM profiles WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await?;

        balance.map(Self::decimal_to_f64).transpose()
    }

    /// Deduct an amount with a sufficient funds check; false when funds are short
    pub async fn debit_balance(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
        amount: f64,
    ) -> Result<bool> {
        let rows_affected = sqlx::query(
            "UPDATE profiles SET
                balance = balance - $1,
                updated_at = NOW()
             WHERE id = $2 AND balance >= $1",
        )
        .bind(Self::f64_to_money(amount)?)
        .bind(user_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    /// Add credits (winnings, refunds, test grants); false when the profile is missing
    pub async fn credit_balance(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
        amount: f64,
    ) -> Result<bool> {
        let rows_affected = sqlx::query(
            "UPDATE profiles SET
                balance = balance + $1,
                updated_at = NOW()
             WHERE id = $2",
        )
        .bind(Self::f64_to_money(amount)?)
        .bind(user_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    /// Insert the parlay header row
    pub async fn insert_parlay(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        parlay_id: Uuid,
        user_id: Uuid,
        sport: &str,
        total_odds: i64,
        bet_amount: f64,
        potential_payout: f64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO parlays
             (id, user_id, sport, total_odds, bet_amount, potential_payout, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'pending')",
        )
        .bind(parlay_id)
        .bind(user_id)
        .bind(sport)
        .bind(total_odds)
        .bind(Self::f64_to_money(bet_amount)?)
        .bind(Self::f64_to_money(potential_payout)?)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Insert every pick of a parlay
    pub async fn insert_picks(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        parlay_id: Uuid,
        picks: &[CartPick],
    ) -> Result<()> {
        for pick in picks {
            sqlx::query(
                "INSERT INTO parlay_picks
                 (id, parlay_id, player_name, team_name, prop_type, predicted_value, pick_type, odds)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(Uuid::new_v4())
            .bind(parlay_id)
            .bind(&pick.player_name)
            .bind(&pick.team_name)
            .bind(&pick.prop_type)
            .bind(pick.predicted_value)
            .bind(pick.pick_type.as_str())
            .bind(pick.odds)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}
