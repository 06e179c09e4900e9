// Database connection, development schema and demo data
use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::info;

use crate::config::DatabaseConfig;

// Create a connection pool to PostgreSQL
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    info!("🔌 Connecting to PostgreSQL...");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    info!("✅ Connected to database!");
    Ok(pool)
}

// Tables the service reads and writes. In production these live in the
// hosted database; this copy exists for local runs and integration tests.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id UUID PRIMARY KEY,
        favorite_teams TEXT[] NOT NULL DEFAULT '{}',
        favorite_sports TEXT[] NOT NULL DEFAULT '{}',
        balance NUMERIC(12, 2) NOT NULL DEFAULT 0,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        CONSTRAINT balance_non_negative CHECK (balance >= 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS basketballteams (
        id SERIAL PRIMARY KEY,
        team_name VARCHAR(100) NOT NULL,
        abbr VARCHAR(10) NOT NULL UNIQUE,
        city VARCHAR(100) NOT NULL,
        province VARCHAR(50) NOT NULL,
        conference VARCHAR(50),
        division VARCHAR(50),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS seasons (
        id SERIAL PRIMARY KEY,
        sport_id INTEGER NOT NULL DEFAULT 1,
        name VARCHAR(20) NOT NULL UNIQUE,
        start_date DATE,
        end_date DATE,
        is_active BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS games (
        id SERIAL PRIMARY KEY,
        season_id INTEGER NOT NULL REFERENCES seasons(id),
        game_date DATE NOT NULL,
        home_team_id INTEGER NOT NULL REFERENCES basketballteams(id),
        away_team_id INTEGER NOT NULL REFERENCES basketballteams(id),
        location VARCHAR(150),
        is_completed BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS players (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        jersey_number INTEGER,
        team_id INTEGER NOT NULL REFERENCES basketballteams(id),
        sport_id INTEGER NOT NULL DEFAULT 1,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS player_game_stats (
        id SERIAL PRIMARY KEY,
        player_id INTEGER NOT NULL REFERENCES players(id),
        game_id INTEGER NOT NULL REFERENCES games(id),
        team_id INTEGER NOT NULL REFERENCES basketballteams(id),
        is_starter BOOLEAN NOT NULL DEFAULT FALSE,
        minutes_played INTEGER NOT NULL DEFAULT 0,
        points INTEGER NOT NULL DEFAULT 0,
        field_goals_made INTEGER NOT NULL DEFAULT 0,
        field_goals_attempted INTEGER NOT NULL DEFAULT 0,
        three_point_made INTEGER NOT NULL DEFAULT 0,
        three_point_attempted INTEGER NOT NULL DEFAULT 0,
        free_throws_made INTEGER NOT NULL DEFAULT 0,
        free_throws_attempted INTEGER NOT NULL DEFAULT 0,
        offensive_rebounds INTEGER NOT NULL DEFAULT 0,
        defensive_rebounds INTEGER NOT NULL DEFAULT 0,
        total_rebounds INTEGER NOT NULL DEFAULT 0,
        assists INTEGER NOT NULL DEFAULT 0,
        turnovers INTEGER NOT NULL DEFAULT 0,
        steals INTEGER NOT NULL DEFAULT 0,
        blocks INTEGER NOT NULL DEFAULT 0,
        personal_fouls INTEGER NOT NULL DEFAULT 0,
        UNIQUE (player_id, game_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS player_props (
        id SERIAL PRIMARY KEY,
        player_id INTEGER NOT NULL REFERENCES players(id),
        game_id INTEGER NOT NULL REFERENCES games(id),
        prop_type VARCHAR(20) NOT NULL CHECK (prop_type IN ('points', 'rebounds', 'assists', 'minutes')),
        over_line DOUBLE PRECISION NOT NULL,
        under_line DOUBLE PRECISION NOT NULL,
        over_odds INTEGER NOT NULL,
        under_odds INTEGER NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pick_popularity (
        id SERIAL PRIMARY KEY,
        player_prop_id INTEGER NOT NULL REFERENCES player_props(id),
        pick_type VARCHAR(10) NOT NULL CHECK (pick_type IN ('over', 'under')),
        pick_count INTEGER NOT NULL DEFAULT 0,
        last_updated TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        UNIQUE (player_prop_id, pick_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS parlays (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES profiles(id),
        sport VARCHAR(30) NOT NULL DEFAULT 'basketball',
        total_odds BIGINT NOT NULL,
        bet_amount NUMERIC(12, 2) NOT NULL,
        potential_payout NUMERIC(12, 2) NOT NULL,
        status VARCHAR(10) NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'won', 'lost')),
        placed_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS parlay_picks (
        id UUID PRIMARY KEY,
        parlay_id UUID NOT NULL REFERENCES parlays(id) ON DELETE CASCADE,
        player_name VARCHAR(100) NOT NULL,
        team_name VARCHAR(100) NOT NULL,
        prop_type VARCHAR(20) NOT NULL,
        predicted_value DOUBLE PRECISION NOT NULL,
        pick_type VARCHAR(10) NOT NULL CHECK (pick_type IN ('over', 'under')),
        odds INTEGER NOT NULL,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_games_date ON games(game_date)",
    "CREATE INDEX IF NOT EXISTS idx_stats_player ON player_game_stats(player_id)",
    "CREATE INDEX IF NOT EXISTS idx_stats_game ON player_game_stats(game_id)",
    "CREATE INDEX IF NOT EXISTS idx_parlays_user ON parlays(user_id, placed_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_parlay_picks_parlay ON parlay_picks(parlay_id)",
];

const SETUP_LOCK_KEY: i64 = 0x6265_6e63_68;

/// Create every table the service needs (idempotent)
pub async fn setup_schema(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await?;
    // Concurrent CREATE ... IF NOT EXISTS can still collide in the catalog
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SETUP_LOCK_KEY)
        .execute(&mut *tx)
        .await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    info!("✅ Database schema ready ({} statements)", SCHEMA.len());
    Ok(())
}

/// Canadian university teams used for local development
const DEMO_TEAMS: &[(&str, &str, &str, &str, &str)] = &[
    ("UBC Thunderbirds", "UBC", "Vancouver", "BC", "Canada West"),
    ("Victoria Vikes", "UVIC", "Victoria", "BC", "Canada West"),
    ("Alberta Golden Bears", "UA", "Edmonton", "AB", "Canada West"),
    ("Calgary Dinos", "UC", "Calgary", "AB", "Canada West"),
    ("Carleton Ravens", "CAR", "Ottawa", "ON", "OUA"),
    ("Toronto Varsity Blues", "UT", "Toronto", "ON", "OUA"),
    ("McGill Redbirds", "MCG", "Montreal", "QC", "RSEQ"),
    ("Dalhousie Tigers", "DAL", "Halifax", "NS", "AUS"),
];

const DEMO_PLAYERS_PER_TEAM: i32 = 3;

/// Insert a small season of teams, players, games, box scores and props.
/// Returns the number of games created; does nothing if teams already exist.
pub async fn seed_demo_data(pool: &PgPool) -> Result<usize> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SETUP_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM basketballteams")
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        info!("Demo data already present ({} teams), skipping seed", existing);
        return Ok(0);
    }

    let mut team_ids = Vec::with_capacity(DEMO_TEAMS.len());
    for (name, abbr, city, province, conference) in DEMO_TEAMS {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO basketballteams (team_name, abbr, city, province, conference)
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(*name)
        .bind(*abbr)
        .bind(*city)
        .bind(*province)
        .bind(*conference)
        .fetch_one(&mut *tx)
        .await?;
        team_ids.push(id);
    }

    let season_start = NaiveDate::from_ymd_opt(2024, 11, 1)
        .ok_or_else(|| anyhow!("invalid season start date"))?;
    let season_id: i32 = sqlx::query_scalar(
        "INSERT INTO seasons (sport_id, name, start_date, end_date, is_active)
         VALUES (1, '2024-25', $1, $2, TRUE) RETURNING id",
    )
    .bind(season_start)
    .bind(season_start + Duration::days(150))
    .fetch_one(&mut *tx)
    .await?;

    let mut roster: Vec<(i32, i32)> = Vec::new(); // (player_id, team_id)
    for (team_idx, team_id) in team_ids.iter().enumerate() {
        for n in 0..DEMO_PLAYERS_PER_TEAM {
            let player_id: i32 = sqlx::query_scalar(
                "INSERT INTO players (name, jersey_number, team_id) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(format!("{} Player {}", DEMO_TEAMS[team_idx].1, n + 1))
            .bind(n * 7 + 3)
            .bind(*team_id)
            .fetch_one(&mut *tx)
            .await?;
            roster.push((player_id, *team_id));
        }
    }

    // Round of pairings: completed games in the past, open games this week
    let today = Utc::now().date_naive();
    let mut games = 0usize;
    for (i, home) in team_ids.iter().enumerate() {
        let away = team_ids[(i + 1) % team_ids.len()];
        for (offset, completed) in [(-14i64, true), (-7, true), (2, false)] {
            let game_id: i32 = sqlx::query_scalar(
                "INSERT INTO games (season_id, game_date, home_team_id, away_team_id, location, is_completed)
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
            )
            .bind(season_id)
            .bind(today + Duration::days(offset + i as i64 % 3))
            .bind(*home)
            .bind(away)
            .bind(format!("{} home court", DEMO_TEAMS[i].2))
            .bind(completed)
            .fetch_one(&mut *tx)
            .await?;
            games += 1;

            for (slot, (player_id, team_id)) in roster
                .iter()
                .filter(|(_, t)| t == home || *t == away)
                .enumerate()
            {
                if completed {
                    let seed = (game_id as usize * 31 + slot * 17) as i32;
                    sqlx::query(
                        "INSERT INTO player_game_stats
                         (player_id, game_id, team_id, is_starter, minutes_played, points,
                          field_goals_made, field_goals_attempted, total_rebounds, assists)
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                    )
                    .bind(*player_id)
                    .bind(game_id)
                    .bind(*team_id)
                    .bind(slot % 3 == 0)
                    .bind(18 + seed % 20)
                    .bind(6 + seed % 22)
                    .bind(3 + seed % 8)
                    .bind(9 + seed % 10)
                    .bind(2 + seed % 11)
                    .bind(1 + seed % 7)
                    .execute(&mut *tx)
                    .await?;
                } else {
                    let line = 12.5 + (slot % 4) as f64 * 2.0;
                    sqlx::query(
                        "INSERT INTO player_props
                         (player_id, game_id, prop_type, over_line, under_line, over_odds, under_odds)
                         VALUES ($1, $2, 'points', $3, $3, -110, -110)",
                    )
                    .bind(*player_id)
                    .bind(game_id)
                    .bind(line)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }
    }

    tx.commit().await?;
    info!(
        "✅ Seeded {} teams, {} players, {} games",
        team_ids.len(),
        roster.len(),
        games
    );
    Ok(games)
}
