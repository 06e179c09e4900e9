//! Read-only basketball data: teams, seasons, games, players, box scores,
//! props and the aggregate views the app builds its screens from.
//!
//! Everything here is a plain query against the tables created in
//! `database.rs`. Filters with optional parts go through `QueryBuilder`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::AppResult;

/// Sport id used for basketball rows in `seasons` and `players`
pub const BASKETBALL_SPORT_ID: i32 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE: i64 = 1_000_000;
pub const DEFAULT_DAYS_AHEAD: i32 = 7;

// ---------------------------------------------------------------------------
// Stat categories and paging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum StatType {
    Points,
    Rebounds,
    Assists,
    Minutes,
}

impl StatType {
    /// Box score column backing this stat
    pub fn column(&self) -> &'static str {
        match self {
            StatType::Points => "points",
            StatType::Rebounds => "total_rebounds",
            StatType::Assists => "assists",
            StatType::Minutes => "minutes_played",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatType::Points => "points",
            StatType::Rebounds => "rebounds",
            StatType::Assists => "assists",
            StatType::Minutes => "minutes",
        }
    }
}

impl fmt::Display for StatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "points" => Ok(StatType::Points),
            "rebounds" => Ok(StatType::Rebounds),
            "assists" => Ok(StatType::Assists),
            "minutes" => Ok(StatType::Minutes),
            other => Err(format!("Unknown stat type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Pagination {
    /// Page numbers are clamped to [1, 1_000_000]; page size to [1, 100]
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn total_pages(&self, total_count: i64) -> i64 {
        if total_count <= 0 {
            return 0;
        }
        total_count.saturating_add(self.page_size - 1) / self.page_size
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    fn new(data: Vec<T>, total_count: i64, paging: Pagination) -> Self {
        Self {
            data,
            total_count,
            page: paging.page,
            page_size: paging.page_size,
            total_pages: paging.total_pages(total_count),
        }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Team {
    pub id: i32,
    pub team_name: String,
    pub abbr: String,
    pub city: String,
    pub province: String,
    pub conference: Option<String>,
    pub division: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Season {
    pub id: i32,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TeamRef {
    pub id: i32,
    pub team_name: String,
    pub abbr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Game {
    pub id: i32,
    pub season_id: i32,
    pub game_date: NaiveDate,
    pub location: Option<String>,
    pub is_completed: bool,
    pub home_team: TeamRef,
    pub away_team: TeamRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Player {
    pub id: i32,
    pub name: String,
    pub jersey_number: Option<i32>,
    pub team: TeamRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerGameStats {
    pub player_id: i32,
    pub player_name: String,
    pub team_id: i32,
    pub team_name: String,
    pub is_starter: bool,
    pub minutes_played: i32,
    pub points: i32,
    pub field_goals_made: i32,
    pub field_goals_attempted: i32,
    pub three_point_made: i32,
    pub three_point_attempted: i32,
    pub free_throws_made: i32,
    pub free_throws_attempted: i32,
    pub total_rebounds: i32,
    pub assists: i32,
    pub turnovers: i32,
    pub steals: i32,
    pub blocks: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerProp {
    pub id: i32,
    pub player_id: i32,
    pub player_name: String,
    pub team_name: String,
    pub game_id: i32,
    pub prop_type: String,
    pub over_line: f64,
    pub under_line: f64,
    pub over_odds: i32,
    pub under_odds: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PopularPick {
    pub player_name: String,
    pub team_name: String,
    pub prop_type: String,
    pub over_line: f64,
    pub under_line: f64,
    pub over_picks: i64,
    pub under_picks: i64,
    pub total_picks: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecentGameStat {
    pub game_date: NaiveDate,
    pub stat_value: f64,
    pub opponent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SeasonAverages {
    pub season_name: String,
    pub games_played: i64,
    pub avg_points: f64,
    pub avg_rebounds: f64,
    pub avg_assists: f64,
    pub avg_minutes: f64,
    pub fg_percentage: f64,
    pub three_point_percentage: f64,
    pub ft_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TopPerformer {
    pub player_id: i32,
    pub player_name: String,
    pub team_name: String,
    pub games_played: i64,
    pub total_stat: i64,
    pub avg_stat: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FavoriteTeamGame {
    pub game_id: i32,
    pub game_date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub location: Option<String>,
    pub is_favorite_home: bool,
    pub is_favorite_away: bool,
}

const TEAM_COLUMNS: &str =
    "id, team_name, abbr, city, province, conference, division, is_active";

const GAME_FROM: &str = "FROM games g
     JOIN basketballteams hteam ON hteam.id = g.home_team_id
     JOIN basketballteams ateam ON ateam.id = g.away_team_id";

const GAME_COLUMNS: &str = "SELECT g.id, g.season_id, g.game_date, g.location, g.is_completed,
            hteam.id AS home_id, hteam.team_name AS home_name, hteam.abbr AS home_abbr,
            ateam.id AS away_id, ateam.team_name AS away_name, ateam.abbr AS away_abbr";

const PLAYER_FROM: &str = "FROM players p
     JOIN basketballteams t ON t.id = p.team_id";

const PLAYER_COLUMNS: &str = "SELECT p.id, p.name, p.jersey_number,
            t.id AS team_id, t.team_name, t.abbr AS team_abbr";

fn team_from_row(row: &PgRow) -> Team {
    Team {
        id: row.get("id"),
        team_name: row.get("team_name"),
        abbr: row.get("abbr"),
        city: row.get("city"),
        province: row.get("province"),
        conference: row.get("conference"),
        division: row.get("division"),
        is_active: row.get("is_active"),
    }
}

fn game_from_row(row: &PgRow) -> Game {
    Game {
        id: row.get("id"),
        season_id: row.get("season_id"),
        game_date: row.get("game_date"),
        location: row.get("location"),
        is_completed: row.get("is_completed"),
        home_team: TeamRef {
            id: row.get("home_id"),
            team_name: row.get("home_name"),
            abbr: row.get("home_abbr"),
        },
        away_team: TeamRef {
            id: row.get("away_id"),
            team_name: row.get("away_name"),
            abbr: row.get("away_abbr"),
        },
    }
}

fn player_from_row(row: &PgRow) -> Player {
    Player {
        id: row.get("id"),
        name: row.get("name"),
        jersey_number: row.get("jersey_number"),
        team: TeamRef {
            id: row.get("team_id"),
            team_name: row.get("team_name"),
            abbr: row.get("team_abbr"),
        },
    }
}

fn like_pattern(term: &str) -> String {
    format!("%{}%", term.trim())
}

// ---------------------------------------------------------------------------
// Teams and seasons
// ---------------------------------------------------------------------------

/// Active teams ordered by name, optionally limited to one province
pub async fn list_teams(pool: &PgPool, province: Option<&str>) -> AppResult<Vec<Team>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM basketballteams
         WHERE is_active AND ($1::text IS NULL OR province = $1)
         ORDER BY team_name",
        TEAM_COLUMNS
    ))
    .bind(province)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(team_from_row).collect())
}

pub async fn get_team(pool: &PgPool, team_id: i32) -> AppResult<Option<Team>> {
    let row = sqlx::query(&format!("SELECT {} FROM basketballteams WHERE id = $1", TEAM_COLUMNS))
        .bind(team_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(team_from_row))
}

/// Case-insensitive abbreviation lookup
pub async fn get_team_by_abbr(pool: &PgPool, abbr: &str) -> AppResult<Option<Team>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM basketballteams WHERE UPPER(abbr) = UPPER($1)",
        TEAM_COLUMNS
    ))
    .bind(abbr.trim())
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(team_from_row))
}

pub async fn list_provinces(pool: &PgPool) -> AppResult<Vec<String>> {
    let provinces = sqlx::query_scalar(
        "SELECT DISTINCT province FROM basketballteams WHERE is_active ORDER BY province",
    )
    .fetch_all(pool)
    .await?;

    Ok(provinces)
}

pub async fn list_seasons(pool: &PgPool) -> AppResult<Vec<Season>> {
    let rows = sqlx::query(
        "SELECT id, name, start_date, end_date, is_active
         FROM seasons WHERE sport_id = $1
         ORDER BY name DESC",
    )
    .bind(BASKETBALL_SPORT_ID)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Season {
            id: row.get("id"),
            name: row.get("name"),
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
            is_active: row.get("is_active"),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameFilter {
    pub season_id: Option<i32>,
    pub completed: Option<bool>,
    /// Matches either team's name
    pub search: Option<String>,
}

fn push_game_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &GameFilter) {
    qb.push(" WHERE TRUE");
    if let Some(season_id) = filter.season_id {
        qb.push(" AND g.season_id = ").push_bind(season_id);
    }
    if let Some(completed) = filter.completed {
        qb.push(" AND g.is_completed = ").push_bind(completed);
    }
    if let Some(term) = filter.search.as_deref().filter(|t| !t.trim().is_empty()) {
        let pattern = like_pattern(term);
        qb.push(" AND (hteam.team_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR ateam.team_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Newest games first
pub async fn list_games(pool: &PgPool, filter: &GameFilter, paging: Pagination) -> AppResult<Page<Game>> {
    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) ");
    count.push(GAME_FROM);
    push_game_filters(&mut count, filter);
    let total_count: i64 = count.build_query_scalar().fetch_one(pool).await?;

    if total_count == 0 {
        return Ok(Page::new(Vec::new(), 0, paging));
    }

    let mut select: QueryBuilder<Postgres> = QueryBuilder::new(GAME_COLUMNS);
    select.push(" ").push(GAME_FROM);
    push_game_filters(&mut select, filter);
    select
        .push(" ORDER BY g.game_date DESC, g.id DESC LIMIT ")
        .push_bind(paging.page_size)
        .push(" OFFSET ")
        .push_bind(paging.offset());

    let rows = select.build().fetch_all(pool).await?;
    Ok(Page::new(rows.iter().map(game_from_row).collect(), total_count, paging))
}

pub async fn get_game(pool: &PgPool, game_id: i32) -> AppResult<Option<Game>> {
    let row = sqlx::query(&format!("{} {} WHERE g.id = $1", GAME_COLUMNS, GAME_FROM))
        .bind(game_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(game_from_row))
}

/// Games not yet played between today and `days_ahead` days out, soonest first
pub async fn upcoming_games(pool: &PgPool, days_ahead: i32) -> AppResult<Vec<Game>> {
    let rows = sqlx::query(&format!(
        "{} {}
         WHERE g.game_date BETWEEN CURRENT_DATE AND CURRENT_DATE + $1::int
           AND NOT g.is_completed
         ORDER BY g.game_date ASC, g.id ASC",
        GAME_COLUMNS, GAME_FROM
    ))
    .bind(days_ahead.max(0))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(game_from_row).collect())
}

/// Box scores for one game, top scorers first
pub async fn game_stats(pool: &PgPool, game_id: i32) -> AppResult<Vec<PlayerGameStats>> {
    let rows = sqlx::query(
        "SELECT s.player_id, p.name AS player_name, s.team_id, t.team_name, s.is_starter,
                s.minutes_played, s.points, s.field_goals_made, s.field_goals_attempted,
                s.three_point_made, s.three_point_attempted, s.free_throws_made,
                s.free_throws_attempted, s.total_rebounds, s.assists, s.turnovers,
                s.steals, s.blocks
         FROM player_game_stats s
         JOIN players p ON p.id = s.player_id
         JOIN basketballteams t ON t.id = s.team_id
         WHERE s.game_id = $1
         ORDER BY s.points DESC, p.name",
    )
    .bind(game_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PlayerGameStats {
            player_id: row.get("player_id"),
            player_name: row.get("player_name"),
            team_id: row.get("team_id"),
            team_name: row.get("team_name"),
            is_starter: row.get("is_starter"),
            minutes_played: row.get("minutes_played"),
            points: row.get("points"),
            field_goals_made: row.get("field_goals_made"),
            field_goals_attempted: row.get("field_goals_attempted"),
            three_point_made: row.get("three_point_made"),
            three_point_attempted: row.get("three_point_attempted"),
            free_throws_made: row.get("free_throws_made"),
            free_throws_attempted: row.get("free_throws_attempted"),
            total_rebounds: row.get("total_rebounds"),
            assists: row.get("assists"),
            turnovers: row.get("turnovers"),
            steals: row.get("steals"),
            blocks: row.get("blocks"),
        })
        .collect())
}

/// Active props for one game
pub async fn game_props(pool: &PgPool, game_id: i32) -> AppResult<Vec<PlayerProp>> {
    let rows = sqlx::query(
        "SELECT pp.id, pp.player_id, p.name AS player_name, t.team_name, pp.game_id,
                pp.prop_type, pp.over_line, pp.under_line, pp.over_odds, pp.under_odds
         FROM player_props pp
         JOIN players p ON p.id = pp.player_id
         JOIN basketballteams t ON t.id = p.team_id
         WHERE pp.game_id = $1 AND pp.is_active
         ORDER BY p.name, pp.prop_type",
    )
    .bind(game_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PlayerProp {
            id: row.get("id"),
            player_id: row.get("player_id"),
            player_name: row.get("player_name"),
            team_name: row.get("team_name"),
            game_id: row.get("game_id"),
            prop_type: row.get("prop_type"),
            over_line: row.get("over_line"),
            under_line: row.get("under_line"),
            over_odds: row.get("over_odds"),
            under_odds: row.get("under_odds"),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerSort {
    #[default]
    Name,
    JerseyNumber,
    TeamName,
}

impl PlayerSort {
    fn order_expr(&self) -> &'static str {
        match self {
            PlayerSort::Name => "p.name",
            PlayerSort::JerseyNumber => "p.jersey_number",
            PlayerSort::TeamName => "t.team_name",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerFilter {
    pub team_id: Option<i32>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: PlayerSort,
    #[serde(default)]
    pub sort_order: SortOrder,
}

fn push_player_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &PlayerFilter) {
    qb.push(" WHERE p.is_active AND p.sport_id = ")
        .push_bind(BASKETBALL_SPORT_ID);
    if let Some(team_id) = filter.team_id {
        qb.push(" AND p.team_id = ").push_bind(team_id);
    }
    if let Some(term) = filter.search.as_deref().filter(|t| !t.trim().is_empty()) {
        qb.push(" AND p.name ILIKE ").push_bind(like_pattern(term));
    }
}

pub async fn list_players(pool: &PgPool, filter: &PlayerFilter, paging: Pagination) -> AppResult<Page<Player>> {
    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) ");
    count.push(PLAYER_FROM);
    push_player_filters(&mut count, filter);
    let total_count: i64 = count.build_query_scalar().fetch_one(pool).await?;

    if total_count == 0 {
        return Ok(Page::new(Vec::new(), 0, paging));
    }

    let mut select: QueryBuilder<Postgres> = QueryBuilder::new(PLAYER_COLUMNS);
    select.push(" ").push(PLAYER_FROM);
    push_player_filters(&mut select, filter);
    select
        .push(format!(
            " ORDER BY {} {} NULLS LAST, p.id",
            filter.sort_by.order_expr(),
            filter.sort_order.as_sql()
        ))
        .push(" LIMIT ")
        .push_bind(paging.page_size)
        .push(" OFFSET ")
        .push_bind(paging.offset());

    let rows = select.build().fetch_all(pool).await?;
    Ok(Page::new(rows.iter().map(player_from_row).collect(), total_count, paging))
}

pub async fn players_by_team(pool: &PgPool, team_id: i32) -> AppResult<Vec<Player>> {
    let rows = sqlx::query(&format!(
        "{} {} WHERE p.team_id = $1 AND p.is_active AND p.sport_id = $2 ORDER BY p.name",
        PLAYER_COLUMNS, PLAYER_FROM
    ))
    .bind(team_id)
    .bind(BASKETBALL_SPORT_ID)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(player_from_row).collect())
}

pub async fn search_players(pool: &PgPool, term: &str, limit: i64) -> AppResult<Vec<Player>> {
    if term.trim().is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query(&format!(
        "{} {} WHERE p.name ILIKE $1 AND p.is_active AND p.sport_id = $2
         ORDER BY p.name LIMIT $3",
        PLAYER_COLUMNS, PLAYER_FROM
    ))
    .bind(like_pattern(term))
    .bind(BASKETBALL_SPORT_ID)
    .bind(limit.clamp(1, MAX_PAGE_SIZE))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(player_from_row).collect())
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Props for a game ranked by how often users picked them
pub async fn popular_picks(pool: &PgPool, game_id: i32, limit: i64) -> AppResult<Vec<PopularPick>> {
    let rows = sqlx::query(
        "SELECT p.name AS player_name, t.team_name, pp.prop_type, pp.over_line, pp.under_line,
                COALESCE(SUM(pop.pick_count) FILTER (WHERE pop.pick_type = 'over'), 0)::bigint AS over_picks,
                COALESCE(SUM(pop.pick_count) FILTER (WHERE pop.pick_type = 'under'), 0)::bigint AS under_picks,
                COALESCE(SUM(pop.pick_count), 0)::bigint AS total_picks
         FROM player_props pp
         JOIN players p ON p.id = pp.player_id
         JOIN basketballteams t ON t.id = p.team_id
         LEFT JOIN pick_popularity pop ON pop.player_prop_id = pp.id
         WHERE pp.game_id = $1 AND pp.is_active
         GROUP BY pp.id, p.name, t.team_name
         ORDER BY total_picks DESC, p.name
         LIMIT $2",
    )
    .bind(game_id)
    .bind(limit.clamp(1, MAX_PAGE_SIZE))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PopularPick {
            player_name: row.get("player_name"),
            team_name: row.get("team_name"),
            prop_type: row.get("prop_type"),
            over_line: row.get("over_line"),
            under_line: row.get("under_line"),
            over_picks: row.get("over_picks"),
            under_picks: row.get("under_picks"),
            total_picks: row.get("total_picks"),
        })
        .collect())
}

/// A player's most recent completed games for one stat, newest first
pub async fn player_last_n_games(
    pool: &PgPool,
    player_id: i32,
    stat: StatType,
    games: i64,
) -> AppResult<Vec<RecentGameStat>> {
    let sql = format!(
        "SELECT g.game_date, s.{}::float8 AS stat_value,
                CASE WHEN g.home_team_id = s.team_id THEN ateam.team_name
                     ELSE hteam.team_name END AS opponent
         FROM player_game_stats s
         JOIN games g ON g.id = s.game_id
         JOIN basketballteams hteam ON hteam.id = g.home_team_id
         JOIN basketballteams ateam ON ateam.id = g.away_team_id
         WHERE s.player_id = $1 AND g.is_completed
         ORDER BY g.game_date DESC
         LIMIT $2",
        stat.column()
    );
    let rows = sqlx::query(&sql)
        .bind(player_id)
        .bind(games.clamp(1, MAX_PAGE_SIZE))
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| RecentGameStat {
            game_date: row.get("game_date"),
            stat_value: row.get("stat_value"),
            opponent: row.get("opponent"),
        })
        .collect())
}

/// Per-season averages and shooting percentages (0-100); one row per season
pub async fn season_averages(
    pool: &PgPool,
    player_id: i32,
    season_name: Option<&str>,
) -> AppResult<Vec<SeasonAverages>> {
    let rows = sqlx::query(
        "SELECT se.name AS season_name,
                COUNT(*)::bigint AS games_played,
                AVG(s.points)::float8 AS avg_points,
                AVG(s.total_rebounds)::float8 AS avg_rebounds,
                AVG(s.assists)::float8 AS avg_assists,
                AVG(s.minutes_played)::float8 AS avg_minutes,
                COALESCE(SUM(s.field_goals_made)::float8 * 100 / NULLIF(SUM(s.field_goals_attempted), 0), 0)::float8 AS fg_percentage,
                COALESCE(SUM(s.three_point_made)::float8 * 100 / NULLIF(SUM(s.three_point_attempted), 0), 0)::float8 AS three_point_percentage,
                COALESCE(SUM(s.free_throws_made)::float8 * 100 / NULLIF(SUM(s.free_throws_attempted), 0), 0)::float8 AS ft_percentage
         FROM player_game_stats s
         JOIN games g ON g.id = s.game_id
         JOIN seasons se ON se.id = g.season_id
         WHERE s.player_id = $1 AND ($2::text IS NULL OR se.name = $2)
         GROUP BY se.name
         ORDER BY se.name DESC",
    )
    .bind(player_id)
    .bind(season_name)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| SeasonAverages {
            season_name: row.get("season_name"),
            games_played: row.get("games_played"),
            avg_points: row.get("avg_points"),
            avg_rebounds: row.get("avg_rebounds"),
            avg_assists: row.get("avg_assists"),
            avg_minutes: row.get("avg_minutes"),
            fg_percentage: row.get("fg_percentage"),
            three_point_percentage: row.get("three_point_percentage"),
            ft_percentage: row.get("ft_percentage"),
        })
        .collect())
}

/// Leaders by per-game average of one stat
pub async fn top_performers(
    pool: &PgPool,
    stat: StatType,
    season_name: Option<&str>,
    limit: i64,
) -> AppResult<Vec<TopPerformer>> {
    let sql = format!(
        "SELECT p.id AS player_id, p.name AS player_name, t.team_name,
                COUNT(*)::bigint AS games_played,
                SUM(s.{col})::bigint AS total_stat,
                AVG(s.{col})::float8 AS avg_stat
         FROM player_game_stats s
         JOIN players p ON p.id = s.player_id
         JOIN basketballteams t ON t.id = p.team_id
         JOIN games g ON g.id = s.game_id
         JOIN seasons se ON se.id = g.season_id
         WHERE $1::text IS NULL OR se.name = $1
         GROUP BY p.id, p.name, t.team_name
         ORDER BY avg_stat DESC, p.name
         LIMIT $2",
        col = stat.column()
    );
    let rows = sqlx::query(&sql)
        .bind(season_name)
        .bind(limit.clamp(1, MAX_PAGE_SIZE))
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| TopPerformer {
            player_id: row.get("player_id"),
            player_name: row.get("player_name"),
            team_name: row.get("team_name"),
            games_played: row.get("games_played"),
            total_stat: row.get("total_stat"),
            avg_stat: row.get("avg_stat"),
        })
        .collect())
}

/// Upcoming games involving any of the user's favorite teams
pub async fn favorite_team_games(
    pool: &PgPool,
    user_id: Uuid,
    days_ahead: i32,
) -> AppResult<Vec<FavoriteTeamGame>> {
    let rows = sqlx::query(
        "SELECT g.id AS game_id, g.game_date, hteam.team_name AS home_team,
                ateam.team_name AS away_team, g.location,
                (g.home_team_id::text = ANY(pr.favorite_teams)) AS is_favorite_home,
                (g.away_team_id::text = ANY(pr.favorite_teams)) AS is_favorite_away
         FROM games g
         JOIN basketballteams hteam ON hteam.id = g.home_team_id
         JOIN basketballteams ateam ON ateam.id = g.away_team_id
         JOIN profiles pr ON pr.id = $1
         WHERE g.game_date BETWEEN CURRENT_DATE AND CURRENT_DATE + $2::int
           AND (g.home_team_id::text = ANY(pr.favorite_teams)
                OR g.away_team_id::text = ANY(pr.favorite_teams))
         ORDER BY g.game_date ASC, g.id ASC",
    )
    .bind(user_id)
    .bind(days_ahead.max(0))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| FavoriteTeamGame {
            game_id: row.get("game_id"),
            game_date: row.get("game_date"),
            home_team: row.get("home_team"),
            away_team: row.get("away_team"),
            location: row.get("location"),
            is_favorite_home: row.get("is_favorite_home"),
            is_favorite_away: row.get("is_favorite_away"),
        })
        .collect())
}

pub async fn favorite_teams(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<Team>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM basketballteams
         WHERE id::text IN (SELECT unnest(favorite_teams) FROM profiles WHERE id = $1)
         ORDER BY team_name",
        TEAM_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(team_from_row).collect())
}
