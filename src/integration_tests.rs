//! Integration tests for the parlay, profile and basketball database layer
//!
//! These run against a real PostgreSQL database named by `TEST_DATABASE_URL`
//! and are skipped when it is not set. Every test works with fresh user ids
//! so they can share one database and run in parallel:
//! - placement debits the stake and stores the picks
//! - insufficient balance leaves no trace
//! - deletion refunds pending parlays, settlement pays winners
//! - basketball queries over the demo season

use crate::basketball::{self, GameFilter, Pagination, PlayerFilter, PlayerSort, SortOrder, StatType};
use crate::cart::{sample_pick, ParlayCart};
use crate::database;
use crate::error::AppError;
use crate::parlay_api::{self, CreateParlay, ParlayStatus};
use crate::profiles;
use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::env;
use uuid::Uuid;

const STARTING_BALANCE: f64 = 1000.0;

/// Connect, create the schema and load the demo season; None when no test database is configured
async fn test_pool() -> Result<Option<PgPool>> {
    let Ok(url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping database test");
        return Ok(None);
    };
    let pool = PgPoolOptions::new().max_connections(5).connect(&url).await?;
    database::setup_schema(&pool).await?;
    database::seed_demo_data(&pool).await?;
    Ok(Some(pool))
}

async fn new_user(pool: &PgPool, balance: f64) -> Result<Uuid> {
    let user = Uuid::new_v4();
    profiles::create_profile(pool, user, balance).await?;
    Ok(user)
}

fn request(odds: &[i32], bet_amount: f64) -> CreateParlay {
    CreateParlay {
        picks: odds
            .iter()
            .enumerate()
            .map(|(i, o)| sample_pick(&format!("pick-{}", i), *o))
            .collect(),
        bet_amount,
        sport: parlay_api::DEFAULT_SPORT.to_string(),
    }
}

fn assert_money(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 0.005,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placement_debits_balance_and_stores_picks() -> Result<()> {
        let Some(pool) = test_pool().await? else { return Ok(()) };
        let user = new_user(&pool, STARTING_BALANCE).await?;

        let parlay = parlay_api::create_parlay(&pool, user, request(&[-110, -110], 100.0)).await?;
        assert_eq!(parlay.status, ParlayStatus::Pending);
        assert_eq!(parlay.total_odds, 264);
        assert_money(parlay.potential_payout, 364.0);
        assert_eq!(parlay.picks.len(), 2);
        assert_eq!(parlay.sport, "basketball");

        assert_money(profiles::get_balance(&pool, user).await?, 900.0);

        let listed = parlay_api::list_user_parlays(&pool, user, None, None).await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, parlay.id);
        assert_eq!(listed[0].picks.len(), 2);

        let won = parlay_api::list_user_parlays(&pool, user, None, Some(ParlayStatus::Won)).await?;
        assert!(won.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_no_parlay() -> Result<()> {
        let Some(pool) = test_pool().await? else { return Ok(()) };
        let user = new_user(&pool, 20.0).await?;

        let result = parlay_api::create_parlay(&pool, user, request(&[150, 150], 50.0)).await;
        assert!(matches!(result, Err(AppError::InsufficientBalance)));

        assert_money(profiles::get_balance(&pool, user).await?, 20.0);
        assert!(parlay_api::list_user_parlays(&pool, user, None, None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_profile_is_not_found() -> Result<()> {
        let Some(pool) = test_pool().await? else { return Ok(()) };

        let result = parlay_api::create_parlay(&pool, Uuid::new_v4(), request(&[150, 150], 50.0)).await;
        assert!(matches!(result, Err(AppError::NotFound("Profile"))));
        Ok(())
    }

    #[tokio::test]
    async fn test_cart_placement_clears_the_cart() -> Result<()> {
        let Some(pool) = test_pool().await? else { return Ok(()) };
        let user = new_user(&pool, STARTING_BALANCE).await?;

        let mut cart = ParlayCart::new();
        cart.add_pick(sample_pick("a", 150))?;
        cart.add_pick(sample_pick("b", -200))?;
        assert_eq!(cart.set_stake(5000.0), 1000.0);

        let parlay = parlay_api::place_cart(&pool, user, &mut cart, None).await?;
        assert_money(parlay.bet_amount, 1000.0);
        // 2.5 * 1.5 = 3.75
        assert_money(parlay.potential_payout, 3750.0);
        assert_eq!(cart.pick_count(), 0);
        assert_eq!(cart.stake(), 10.0);

        assert_money(profiles::get_balance(&pool, user).await?, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_refunds_pending_parlay() -> Result<()> {
        let Some(pool) = test_pool().await? else { return Ok(()) };
        let user = new_user(&pool, STARTING_BALANCE).await?;
        let stranger = Uuid::new_v4();

        let parlay = parlay_api::create_parlay(&pool, user, request(&[120, 130, -150], 50.0)).await?;
        assert_money(profiles::get_balance(&pool, user).await?, 950.0);

        assert!(matches!(
            parlay_api::delete_parlay(&pool, parlay.id, stranger).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            parlay_api::get_parlay(&pool, parlay.id, stranger, false).await,
            Err(AppError::Forbidden)
        ));
        assert!(parlay_api::get_parlay(&pool, parlay.id, stranger, true).await.is_ok());

        parlay_api::delete_parlay(&pool, parlay.id, user).await?;
        assert_money(profiles::get_balance(&pool, user).await?, STARTING_BALANCE);
        assert!(matches!(
            parlay_api::get_parlay(&pool, parlay.id, user, false).await,
            Err(AppError::NotFound("Parlay"))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_settlement_pays_winners_once() -> Result<()> {
        let Some(pool) = test_pool().await? else { return Ok(()) };
        let user = new_user(&pool, STARTING_BALANCE).await?;

        let winner = parlay_api::create_parlay(&pool, user, request(&[150, 150], 100.0)).await?;
        let loser = parlay_api::create_parlay(&pool, user, request(&[-110, -110], 100.0)).await?;
        assert_money(winner.potential_payout, 625.0);
        assert_money(profiles::get_balance(&pool, user).await?, 800.0);

        let settled = parlay_api::settle_parlay(&pool, winner.id, ParlayStatus::Won).await?;
        assert_eq!(settled.status, ParlayStatus::Won);
        assert_money(profiles::get_balance(&pool, user).await?, 1425.0);

        // Same status again changes nothing
        parlay_api::settle_parlay(&pool, winner.id, ParlayStatus::Won).await?;
        assert_money(profiles::get_balance(&pool, user).await?, 1425.0);

        assert!(matches!(
            parlay_api::settle_parlay(&pool, winner.id, ParlayStatus::Lost).await,
            Err(AppError::Validation(_))
        ));

        parlay_api::settle_parlay(&pool, loser.id, ParlayStatus::Lost).await?;
        assert_money(profiles::get_balance(&pool, user).await?, 1425.0);

        let stats = parlay_api::parlay_stats(&pool, user).await?;
        assert_eq!(stats.total_parlays, 2);
        assert_eq!(stats.pending_parlays, 0);
        assert_eq!(stats.won_parlays, 1);
        assert_eq!(stats.lost_parlays, 1);
        assert_money(stats.total_wagered, 200.0);
        assert_money(stats.total_won, 625.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_placements_never_overdraw() -> Result<()> {
        let Some(pool) = test_pool().await? else { return Ok(()) };
        let user = new_user(&pool, 100.0).await?;

        let mut handles = Vec::new();
        for _ in 0..5 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                parlay_api::create_parlay(&pool, user, request(&[150, 150], 40.0)).await
            }));
        }

        let mut placed = 0;
        for handle in handles {
            match handle.await? {
                Ok(_) => placed += 1,
                Err(AppError::InsufficientBalance) => {}
                Err(other) => return Err(anyhow::anyhow!("unexpected error: {}", other)),
            }
        }

        // Conflicts are retried, so exactly the two affordable bets go through
        assert_eq!(placed, 2);
        let balance = profiles::get_balance(&pool, user).await?;
        assert_money(balance, 100.0 - 40.0 * placed as f64);
        Ok(())
    }

    #[tokio::test]
    async fn test_profile_favorites_and_credits() -> Result<()> {
        let Some(pool) = test_pool().await? else { return Ok(()) };
        let user = Uuid::new_v4();

        let profile = profiles::get_or_create_profile(&pool, user, STARTING_BALANCE).await?;
        assert!(profile.favorite_teams.is_empty());
        assert_money(profile.balance, STARTING_BALANCE);

        profiles::add_favorite_team(&pool, user, 3, STARTING_BALANCE).await?;
        let profile = profiles::add_favorite_team(&pool, user, 3, STARTING_BALANCE).await?;
        assert_eq!(profile.favorite_teams, vec!["3".to_string()]);

        let profile = profiles::remove_favorite_team(&pool, user, 3).await?;
        assert!(profile.favorite_teams.is_empty());

        let profile = profiles::set_favorite_sports(
            &pool,
            user,
            vec!["basketball".into(), "basketball".into(), "hockey".into()],
        )
        .await?;
        assert_eq!(profile.favorite_sports, vec!["basketball", "hockey"]);

        let balance = profiles::add_credits(&pool, user, 10.0).await?;
        assert_money(balance, STARTING_BALANCE + 10.0);
        assert!(profiles::add_credits(&pool, user, -5.0).await.is_err());

        assert_money(profiles::get_balance(&pool, Uuid::new_v4()).await?, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_favorite_adds_all_persist() -> Result<()> {
        let Some(pool) = test_pool().await? else { return Ok(()) };
        let user = Uuid::new_v4();
        profiles::get_or_create_profile(&pool, user, STARTING_BALANCE).await?;

        let mut handles = Vec::new();
        for team_id in 1..=8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                profiles::add_favorite_team(&pool, user, team_id, STARTING_BALANCE).await
            }));
        }
        for handle in handles {
            handle.await??;
        }

        let profile = profiles::get_profile(&pool, user).await?.expect("profile exists");
        let mut teams = profile.favorite_teams.clone();
        teams.sort();
        let mut expected: Vec<String> = (1..=8).map(|id: i32| id.to_string()).collect();
        expected.sort();
        assert_eq!(teams, expected);

        // Removing a team that is not a favorite leaves the list alone
        let profile = profiles::remove_favorite_team(&pool, user, 99).await?;
        assert_eq!(profile.favorite_teams.len(), 8);
        assert!(matches!(
            profiles::remove_favorite_team(&pool, Uuid::new_v4(), 1).await,
            Err(AppError::NotFound("Profile"))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_basketball_teams_and_players() -> Result<()> {
        let Some(pool) = test_pool().await? else { return Ok(()) };

        let teams = basketball::list_teams(&pool, None).await?;
        assert!(teams.len() >= 8);
        assert!(teams.windows(2).all(|w| w[0].team_name <= w[1].team_name));

        let bc = basketball::list_teams(&pool, Some("BC")).await?;
        assert!(!bc.is_empty());
        assert!(bc.iter().all(|t| t.province == "BC"));

        let ubc = basketball::get_team_by_abbr(&pool, "ubc")
            .await?
            .expect("UBC is part of the demo data");
        assert_eq!(ubc.team_name, "UBC Thunderbirds");
        assert_eq!(basketball::get_team(&pool, ubc.id).await?.map(|t| t.abbr), Some("UBC".to_string()));

        let provinces = basketball::list_provinces(&pool).await?;
        assert!(provinces.contains(&"ON".to_string()));

        let roster = basketball::players_by_team(&pool, ubc.id).await?;
        assert!(!roster.is_empty());
        assert!(roster.iter().all(|p| p.team.id == ubc.id));

        let filter = PlayerFilter {
            team_id: None,
            search: Some("player".into()),
            sort_by: PlayerSort::JerseyNumber,
            sort_order: SortOrder::Desc,
        };
        let page = basketball::list_players(&pool, &filter, Pagination::new(Some(1), Some(5))).await?;
        assert!(page.data.len() <= 5);
        assert_eq!(page.total_pages, (page.total_count + 4) / 5);

        let found = basketball::search_players(&pool, "UBC Player", 10).await?;
        assert!(found.iter().all(|p| p.name.starts_with("UBC")));
        Ok(())
    }

    #[tokio::test]
    async fn test_basketball_games_and_aggregates() -> Result<()> {
        let Some(pool) = test_pool().await? else { return Ok(()) };

        let seasons = basketball::list_seasons(&pool).await?;
        assert!(seasons.iter().any(|s| s.name == "2024-25"));

        let completed = GameFilter {
            completed: Some(true),
            ..GameFilter::default()
        };
        let page = basketball::list_games(&pool, &completed, Pagination::new(Some(1), Some(5))).await?;
        assert!(page.total_count > 0);
        assert!(page.data.iter().all(|g| g.is_completed));
        assert!(page.data.windows(2).all(|w| w[0].game_date >= w[1].game_date));

        let nobody = GameFilter {
            search: Some("no such team".into()),
            ..GameFilter::default()
        };
        let empty = basketball::list_games(&pool, &nobody, Pagination::default()).await?;
        assert_eq!(empty.total_count, 0);
        assert!(empty.data.is_empty());
        assert_eq!(empty.total_pages, 0);

        let upcoming = basketball::upcoming_games(&pool, 7).await?;
        assert!(upcoming.iter().all(|g| !g.is_completed));

        let game = &page.data[0];
        let stats = basketball::game_stats(&pool, game.id).await?;
        assert!(!stats.is_empty());
        assert!(stats.windows(2).all(|w| w[0].points >= w[1].points));

        let player_id = stats[0].player_id;
        let last = basketball::player_last_n_games(&pool, player_id, StatType::Points, 1).await?;
        assert_eq!(last.len(), 1);

        let averages = basketball::season_averages(&pool, player_id, Some("2024-25")).await?;
        assert_eq!(averages.len(), 1);
        assert!(averages[0].games_played >= 1);
        assert!((0.0..=100.0).contains(&averages[0].fg_percentage));

        let leaders = basketball::top_performers(&pool, StatType::Rebounds, None, 3).await?;
        assert!(leaders.len() <= 3);
        assert!(leaders.windows(2).all(|w| w[0].avg_stat >= w[1].avg_stat));
        Ok(())
    }

    #[tokio::test]
    async fn test_favorite_team_views() -> Result<()> {
        let Some(pool) = test_pool().await? else { return Ok(()) };
        let user = Uuid::new_v4();

        let teams = basketball::list_teams(&pool, None).await?;
        let ids: Vec<String> = teams.iter().take(2).map(|t| t.id.to_string()).collect();
        profiles::get_or_create_profile(&pool, user, STARTING_BALANCE).await?;
        profiles::set_favorite_teams(&pool, user, ids.clone()).await?;

        let favorites = basketball::favorite_teams(&pool, user).await?;
        assert_eq!(favorites.len(), 2);

        let games = basketball::favorite_team_games(&pool, user, 30).await?;
        assert!(games.iter().all(|g| g.is_favorite_home || g.is_favorite_away));

        let stranger = basketball::favorite_team_games(&pool, Uuid::new_v4(), 30).await?;
        assert!(stranger.is_empty());
        Ok(())
    }
}
