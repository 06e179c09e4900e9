//! src/odds.rs
//! American/decimal odds conversion and parlay payout math.
//!
//! Pure f64 functions; callers validate odds with [`validate_american`]
//! before combining them.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

/// Smallest magnitude an American price can have (+100 / -100 is even money).
pub const MIN_AMERICAN_MAGNITUDE: i32 = 100;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OddsError {
    #[error("Invalid American odds: {0} (must be <= -100 or >= +100)")]
    InvalidAmerican(i32),
    #[error("Stake must be a finite, non-negative amount")]
    InvalidStake,
}

/// Reject prices inside the (-100, +100) dead zone.
pub fn validate_american(odds: i32) -> Result<(), OddsError> {
    if odds.unsigned_abs() < MIN_AMERICAN_MAGNITUDE as u32 {
        return Err(OddsError::InvalidAmerican(odds));
    }
    Ok(())
}

#[inline]
pub fn american_to_decimal(odds: i32) -> f64 {
    let o = odds as f64;
    if odds > 0 {
        o / 100.0 + 1.0
    } else {
        100.0 / o.abs() + 1.0
    }
}

#[inline]
pub fn decimal_to_american(decimal: f64) -> f64 {
    if decimal > 2.0 {
        (decimal - 1.0) * 100.0
    } else {
        -100.0 / (decimal - 1.0)
    }
}

/// Product of the per-pick decimal multipliers. Empty input yields 0.
pub fn combined_decimal_odds(odds: &[i32]) -> f64 {
    if odds.is_empty() {
        return 0.0;
    }
    odds.iter().map(|&o| american_to_decimal(o)).product()
}

/// Combined odds in American notation, unrounded. Empty input yields 0.
pub fn combined_american_odds(odds: &[i32]) -> f64 {
    if odds.is_empty() {
        return 0.0;
    }
    decimal_to_american(combined_decimal_odds(odds))
}

/// stake × combined decimal odds, rounded to the nearest whole credit.
pub fn potential_payout(odds: &[i32], stake: f64) -> f64 {
    if odds.is_empty() {
        return 0.0;
    }
    (stake * combined_decimal_odds(odds)).round()
}

/// Full price breakdown for a set of picks and a stake.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quote {
    pub decimal_odds: f64,
    pub american_odds: i64,
    pub potential_payout: f64,
}

/// Validated quote used by the stateless `/odds/quote` endpoint.
pub fn quote(odds: &[i32], stake: f64) -> Result<Quote, OddsError> {
    if !stake.is_finite() || stake < 0.0 {
        return Err(OddsError::InvalidStake);
    }
    for &o in odds {
        validate_american(o)?;
    }
    Ok(Quote {
        decimal_odds: combined_decimal_odds(odds),
        american_odds: combined_american_odds(odds).round() as i64,
        potential_payout: potential_payout(odds, stake),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn valid_odds() -> impl Strategy<Value = i32> {
        prop_oneof![(-2000i32..=-100), (100i32..=2000)]
    }

    proptest! {
        #[test]
        fn combined_odds_ignore_pick_order(
            mut picks in prop::collection::vec(valid_odds(), 1..=5),
        ) {
            let forward = combined_decimal_odds(&picks);
            picks.reverse();
            let backward = combined_decimal_odds(&picks);
            picks.rotate_left(1);
            let rotated = combined_decimal_odds(&picks);

            prop_assert!((forward - backward).abs() < 1e-9 * forward);
            prop_assert!((forward - rotated).abs() < 1e-9 * forward);
        }

        #[test]
        fn every_valid_price_pays_more_than_stake(o in valid_odds()) {
            prop_assert!(american_to_decimal(o) > 1.0);
            prop_assert!(american_to_decimal(o) <= 21.0);
        }
    }

    #[test]
    fn single_plus_150_is_two_and_a_half() {
        assert!((combined_decimal_odds(&[150]) - 2.5).abs() < 1e-12);
        assert_eq!(potential_payout(&[150], 10.0), 25.0);
        assert!((combined_american_odds(&[150]) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn two_minus_110_legs() {
        let decimal = combined_decimal_odds(&[-110, -110]);
        let leg = 100.0 / 110.0 + 1.0;
        assert!((decimal - leg * leg).abs() < 1e-12);
        assert!((decimal - 3.6446).abs() < 1e-3);
        assert_eq!(combined_american_odds(&[-110, -110]).round(), 264.0);
    }

    #[test]
    fn short_price_converts_back_negative() {
        // -200 alone is 1.5 decimal, which stays below even money
        assert!((combined_decimal_odds(&[-200]) - 1.5).abs() < 1e-12);
        assert!((combined_american_odds(&[-200]) + 200.0).abs() < 1e-9);
    }

    #[test]
    fn even_money_boundary_uses_negative_branch() {
        assert!((decimal_to_american(2.0) + 100.0).abs() < 1e-12);
    }

    #[test]
    fn empty_list_is_zero() {
        assert_eq!(combined_decimal_odds(&[]), 0.0);
        assert_eq!(combined_american_odds(&[]), 0.0);
        assert_eq!(potential_payout(&[], 100.0), 0.0);
    }

    #[test]
    fn dead_zone_prices_are_rejected() {
        assert!(validate_american(100).is_ok());
        assert!(validate_american(-100).is_ok());
        assert_eq!(validate_american(99), Err(OddsError::InvalidAmerican(99)));
        assert_eq!(validate_american(0), Err(OddsError::InvalidAmerican(0)));
        assert!(quote(&[150, -50], 10.0).is_err());
    }

    #[test]
    fn quote_rounds_american_odds() {
        let q = quote(&[-110, -110], 100.0).unwrap();
        assert_eq!(q.american_odds, 264);
        assert_eq!(q.potential_payout, 364.0);
        assert!(quote(&[150], f64::NAN).is_err());
    }
}
