//! Parlay cart: the ordered, de-duplicated list of picks a user is building,
//! plus the stake they intend to wager.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use ts_rs::TS;

use crate::odds;

pub const MAX_PICKS: usize = 5;
pub const MIN_PICKS: usize = 2;
pub const MIN_STAKE: f64 = 10.0;
pub const MAX_STAKE: f64 = 1000.0;
pub const DEFAULT_STAKE: f64 = MIN_STAKE;

/// Over/under direction of a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PickType {
    Over,
    Under,
}

impl PickType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickType::Over => "over",
            PickType::Under => "under",
        }
    }
}

impl std::str::FromStr for PickType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "over" => Ok(PickType::Over),
            "under" => Ok(PickType::Under),
            _ => Err(format!("Invalid pick type: '{}', expected 'over' or 'under'", s)),
        }
    }
}

impl fmt::Display for PickType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single over/under wager on a player stat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartPick {
    pub id: String,
    pub player_name: String,
    pub team_name: String,
    pub prop_type: String,
    pub predicted_value: f64,
    pub pick_type: PickType,
    pub odds: i32,
}

impl CartPick {
    /// Structural check shared by the cart and direct placement.
    pub fn validate(&self) -> Result<(), CartError> {
        if self.player_name.trim().is_empty()
            || self.team_name.trim().is_empty()
            || self.prop_type.trim().is_empty()
            || !self.predicted_value.is_finite()
        {
            return Err(CartError::InvalidPick);
        }
        odds::validate_american(self.odds).map_err(|_| CartError::InvalidOdds(self.odds))
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CartError {
    #[error("This pick is already in your parlay")]
    DuplicatePick,
    #[error("Maximum 5 picks allowed per parlay")]
    CartFull,
    #[error("Invalid pick data structure")]
    InvalidPick,
    #[error("Invalid American odds: {0}")]
    InvalidOdds(i32),
    #[error("{0}")]
    NotPlaceable(String),
}

#[derive(Debug, Clone)]
pub struct ParlayCart {
    picks: Vec<CartPick>,
    stake: f64,
    is_open: bool,
}

impl Default for ParlayCart {
    fn default() -> Self {
        Self {
            picks: Vec::new(),
            stake: DEFAULT_STAKE,
            is_open: false,
        }
    }
}

impl ParlayCart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn picks(&self) -> &[CartPick] {
        &self.picks
    }

    pub fn stake(&self) -> f64 {
        self.stake
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Append a pick. The first pick opens the cart.
    pub fn add_pick(&mut self, pick: CartPick) -> Result<(), CartError> {
        if self.contains(&pick.id) {
            return Err(CartError::DuplicatePick);
        }
        if self.picks.len() >= MAX_PICKS {
            return Err(CartError::CartFull);
        }
        pick.validate()?;

        let was_empty = self.picks.is_empty();
        self.picks.push(pick);
        if was_empty {
            self.is_open = true;
        }
        Ok(())
    }

    /// Remove a pick by id; returns whether anything was removed.
    pub fn remove_pick(&mut self, pick_id: &str) -> bool {
        let before = self.picks.len();
        self.picks.retain(|p| p.id != pick_id);
        let removed = self.picks.len() != before;
        if removed && self.picks.is_empty() {
            self.is_open = false;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.picks.clear();
        self.stake = DEFAULT_STAKE;
        self.is_open = false;
    }

    /// Store the stake clamped to [MIN_STAKE, MAX_STAKE]; returns the stored value.
    pub fn set_stake(&mut self, amount: f64) -> f64 {
        self.stake = if amount.is_nan() {
            MIN_STAKE
        } else {
            amount.clamp(MIN_STAKE, MAX_STAKE)
        };
        self.stake
    }

    pub fn open(&mut self) {
        self.is_open = true;
    }

    pub fn close(&mut self) {
        self.is_open = false;
    }

    pub fn odds(&self) -> Vec<i32> {
        self.picks.iter().map(|p| p.odds).collect()
    }

    /// Combined American odds, rounded; 0 for an empty cart.
    pub fn total_odds(&self) -> i64 {
        odds::combined_american_odds(&self.odds()).round() as i64
    }

    pub fn decimal_odds(&self) -> f64 {
        odds::combined_decimal_odds(&self.odds())
    }

    pub fn potential_payout(&self) -> f64 {
        odds::potential_payout(&self.odds(), self.stake)
    }

    pub fn pick_count(&self) -> usize {
        self.picks.len()
    }

    pub fn contains(&self, pick_id: &str) -> bool {
        self.picks.iter().any(|p| p.id == pick_id)
    }

    pub fn can_place(&self) -> bool {
        (MIN_PICKS..=MAX_PICKS).contains(&self.picks.len())
    }

    pub fn validation_message(&self) -> &'static str {
        match self.picks.len() {
            0 => "Add picks to start building your parlay",
            1 => "Add at least 2 picks to create a parlay",
            n if n > MAX_PICKS => "Maximum 5 picks allowed per parlay",
            _ => "",
        }
    }

    /// Guard used right before placement.
    pub fn ensure_placeable(&self) -> Result<(), CartError> {
        if self.can_place() {
            Ok(())
        } else {
            Err(CartError::NotPlaceable(self.validation_message().to_string()))
        }
    }

    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            picks: self.picks.clone(),
            bet_amount: self.stake,
            is_open: self.is_open,
            pick_count: self.picks.len(),
            total_odds: self.total_odds(),
            decimal_odds: self.decimal_odds(),
            potential_payout: self.potential_payout(),
            can_place: self.can_place(),
            validation_message: self.validation_message().to_string(),
        }
    }
}

/// Serializable view of a cart returned by every cart endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartSnapshot {
    pub picks: Vec<CartPick>,
    pub bet_amount: f64,
    pub is_open: bool,
    pub pick_count: usize,
    pub total_odds: i64,
    pub decimal_odds: f64,
    pub potential_payout: f64,
    pub can_place: bool,
    pub validation_message: String,
}

#[cfg(test)]
pub(crate) fn sample_pick(id: &str, odds: i32) -> CartPick {
    CartPick {
        id: id.to_string(),
        player_name: format!("Player {}", id),
        team_name: "UBC Thunderbirds".to_string(),
        prop_type: "points".to_string(),
        predicted_value: 18.5,
        pick_type: PickType::Over,
        odds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pick_opens_cart() {
        let mut cart = ParlayCart::new();
        assert!(!cart.is_open());
        cart.add_pick(sample_pick("a", -110)).unwrap();
        assert!(cart.is_open());
        assert_eq!(cart.pick_count(), 1);
        assert!(cart.contains("a"));
    }

    #[test]
    fn duplicate_pick_is_rejected() {
        let mut cart = ParlayCart::new();
        cart.add_pick(sample_pick("a", -110)).unwrap();
        let err = cart.add_pick(sample_pick("a", 120)).unwrap_err();
        assert_eq!(err.to_string(), "This pick is already in your parlay");
        assert_eq!(cart.pick_count(), 1);
    }

    #[test]
    fn sixth_pick_is_rejected() {
        let mut cart = ParlayCart::new();
        for i in 0..5 {
            cart.add_pick(sample_pick(&i.to_string(), -110)).unwrap();
        }
        let err = cart.add_pick(sample_pick("6", -110)).unwrap_err();
        assert_eq!(err, CartError::CartFull);
        assert!(err.to_string().starts_with("Maximum 5 picks allowed"));
        assert_eq!(cart.pick_count(), 5);
        assert!(cart.can_place());
    }

    #[test]
    fn single_pick_is_not_placeable() {
        let mut cart = ParlayCart::new();
        assert_eq!(cart.validation_message(), "Add picks to start building your parlay");
        cart.add_pick(sample_pick("a", 150)).unwrap();
        assert!(!cart.can_place());
        assert_eq!(cart.validation_message(), "Add at least 2 picks to create a parlay");
        assert_eq!(
            cart.ensure_placeable(),
            Err(CartError::NotPlaceable("Add at least 2 picks to create a parlay".into()))
        );
        cart.add_pick(sample_pick("b", 150)).unwrap();
        assert!(cart.can_place());
        assert_eq!(cart.validation_message(), "");
    }

    #[test]
    fn clear_resets_stake_and_picks() {
        let mut cart = ParlayCart::new();
        cart.add_pick(sample_pick("a", 150)).unwrap();
        cart.set_stake(500.0);
        cart.clear();
        assert_eq!(cart.pick_count(), 0);
        assert_eq!(cart.stake(), 10.0);
        assert!(!cart.is_open());
    }

    #[test]
    fn stake_is_clamped() {
        let mut cart = ParlayCart::new();
        assert_eq!(cart.set_stake(5.0), 10.0);
        assert_eq!(cart.set_stake(5000.0), 1000.0);
        assert_eq!(cart.set_stake(250.0), 250.0);
        assert_eq!(cart.set_stake(f64::NAN), 10.0);
    }

    #[test]
    fn removing_last_pick_closes_cart() {
        let mut cart = ParlayCart::new();
        cart.add_pick(sample_pick("a", 150)).unwrap();
        cart.add_pick(sample_pick("b", 150)).unwrap();
        assert!(cart.remove_pick("a"));
        assert!(cart.is_open());
        assert!(!cart.remove_pick("missing"));
        assert!(cart.remove_pick("b"));
        assert!(!cart.is_open());
    }

    #[test]
    fn totals_follow_odds_math() {
        let mut cart = ParlayCart::new();
        assert_eq!(cart.total_odds(), 0);
        assert_eq!(cart.potential_payout(), 0.0);

        cart.add_pick(sample_pick("a", 150)).unwrap();
        assert_eq!(cart.total_odds(), 150);
        assert_eq!(cart.potential_payout(), 25.0);

        cart.add_pick(sample_pick("b", -110)).unwrap();
        // 2.5 * 1.90909 = 4.7727
        assert_eq!(cart.total_odds(), 377);
        assert_eq!(cart.potential_payout(), 48.0);
    }

    #[test]
    fn bad_picks_never_enter_the_cart() {
        let mut cart = ParlayCart::new();
        let mut pick = sample_pick("a", 50);
        assert_eq!(cart.add_pick(pick.clone()), Err(CartError::InvalidOdds(50)));
        pick.odds = 120;
        pick.player_name = "  ".into();
        assert_eq!(cart.add_pick(pick), Err(CartError::InvalidPick));
        assert_eq!(cart.pick_count(), 0);
    }

    #[test]
    fn pick_type_parses_case_insensitively() {
        assert_eq!("OVER".parse::<PickType>(), Ok(PickType::Over));
        assert_eq!("under".parse::<PickType>(), Ok(PickType::Under));
        assert!("sideways".parse::<PickType>().is_err());
    }
}
