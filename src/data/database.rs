//! SQLite store for teams, players, games and box scores

use crate::{
    GameId, GameRecord, HoopsError, Player, PlayerGameStats, PlayerId, Result, Team,
    TeamGameStats, TeamId, UpcomingGame,
};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Raw connection for the feature queries
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Start a transaction; dropped without commit it rolls back
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS teams (
                team_id INTEGER PRIMARY KEY,
                full_name TEXT NOT NULL,
                abbreviation TEXT NOT NULL,
                nickname TEXT NOT NULL,
                city TEXT,
                state TEXT,
                year_founded INTEGER
            );

            CREATE TABLE IF NOT EXISTS players (
                player_id INTEGER PRIMARY KEY,
                full_name TEXT NOT NULL,
                first_name TEXT,
                last_name TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                team_id INTEGER REFERENCES teams(team_id)
            );

            CREATE TABLE IF NOT EXISTS games (
                game_id TEXT PRIMARY KEY,
                game_date TEXT NOT NULL,
                home_team_id INTEGER NOT NULL REFERENCES teams(team_id),
                away_team_id INTEGER NOT NULL REFERENCES teams(team_id),
                home_team_score INTEGER,
                away_team_score INTEGER,
                season TEXT
            );

            CREATE TABLE IF NOT EXISTS team_game_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id TEXT NOT NULL REFERENCES games(game_id),
                team_id INTEGER NOT NULL REFERENCES teams(team_id),
                points INTEGER NOT NULL,
                field_goals_made INTEGER NOT NULL,
                field_goals_attempted INTEGER NOT NULL,
                three_points_made INTEGER NOT NULL,
                three_points_attempted INTEGER NOT NULL,
                free_throws_made INTEGER NOT NULL,
                free_throws_attempted INTEGER NOT NULL,
                offensive_rebounds INTEGER NOT NULL,
                defensive_rebounds INTEGER NOT NULL,
                total_rebounds INTEGER NOT NULL,
                assists INTEGER NOT NULL,
                steals INTEGER NOT NULL,
                blocks INTEGER NOT NULL,
                turnovers INTEGER NOT NULL,
                personal_fouls INTEGER NOT NULL,
                plus_minus INTEGER NOT NULL,
                UNIQUE(game_id, team_id)
            );

            CREATE TABLE IF NOT EXISTS player_game_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id TEXT NOT NULL REFERENCES games(game_id),
                player_id INTEGER NOT NULL REFERENCES players(player_id),
                team_id INTEGER NOT NULL REFERENCES teams(team_id),
                minutes INTEGER,
                points INTEGER,
                assists INTEGER,
                rebounds INTEGER,
                steals INTEGER,
                blocks INTEGER,
                turnovers INTEGER,
                field_goals_made INTEGER,
                field_goals_attempted INTEGER,
                three_points_made INTEGER,
                three_points_attempted INTEGER,
                free_throws_made INTEGER,
                free_throws_attempted INTEGER,
                plus_minus INTEGER,
                UNIQUE(game_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS upcoming_games (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id TEXT NOT NULL UNIQUE,
                game_date TEXT NOT NULL,
                game_time TEXT,
                home_team_id INTEGER NOT NULL REFERENCES teams(team_id),
                away_team_id INTEGER NOT NULL REFERENCES teams(team_id),
                arena TEXT,
                tv_channel TEXT,
                game_status TEXT NOT NULL DEFAULT 'Scheduled'
            );

            CREATE TABLE IF NOT EXISTS team_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                team_id INTEGER NOT NULL REFERENCES teams(team_id),
                date TEXT NOT NULL,
                last_5_wins INTEGER,
                last_10_wins INTEGER,
                home_win_pct REAL,
                away_win_pct REAL,
                points_scored_avg REAL,
                points_allowed_avg REAL,
                offensive_rating REAL,
                defensive_rating REAL,
                rest_days INTEGER,
                UNIQUE(team_id, date)
            );

            CREATE TABLE IF NOT EXISTS game_features (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id TEXT NOT NULL UNIQUE REFERENCES games(game_id),
                game_date TEXT NOT NULL,
                home_team_id INTEGER NOT NULL REFERENCES teams(team_id),
                away_team_id INTEGER NOT NULL REFERENCES teams(team_id),
                home_last_5_wins INTEGER,
                home_last_10_wins INTEGER,
                home_points_avg REAL,
                home_win_pct REAL,
                away_last_5_wins INTEGER,
                away_last_10_wins INTEGER,
                away_points_avg REAL,
                away_win_pct REAL
            );

            CREATE TABLE IF NOT EXISTS game_predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id TEXT NOT NULL UNIQUE,
                game_date TEXT NOT NULL,
                prediction_date TEXT NOT NULL DEFAULT (datetime('now')),
                home_team_id INTEGER NOT NULL REFERENCES teams(team_id),
                away_team_id INTEGER NOT NULL REFERENCES teams(team_id),
                predicted_winner_id INTEGER REFERENCES teams(team_id),
                win_probability REAL,
                predicted_total_points REAL,
                actual_winner_id INTEGER REFERENCES teams(team_id),
                prediction_correct INTEGER,
                points_difference REAL
            );

            CREATE INDEX IF NOT EXISTS idx_games_date ON games(game_date);
            CREATE INDEX IF NOT EXISTS idx_games_teams ON games(home_team_id, away_team_id);
            CREATE INDEX IF NOT EXISTS idx_team_game_stats_team ON team_game_stats(team_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== Team Operations ====================

    /// Insert or refresh a team
    pub fn upsert_team(&self, team: &Team) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO teams (team_id, full_name, abbreviation, nickname, city, state, year_founded)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(team_id) DO UPDATE SET
                full_name = excluded.full_name,
                abbreviation = excluded.abbreviation,
                nickname = excluded.nickname,
                city = excluded.city,
                state = excluded.state,
                year_founded = excluded.year_founded
            "#,
            params![
                team.id.0,
                team.full_name,
                team.abbreviation,
                team.nickname,
                team.city,
                team.state,
                team.year_founded,
            ],
        )?;
        Ok(())
    }

    /// Get team by ID
    pub fn get_team(&self, id: TeamId) -> Result<Team> {
        self.conn
            .query_row(
                "SELECT team_id, full_name, abbreviation, nickname, COALESCE(city, ''),
                        COALESCE(state, ''), COALESCE(year_founded, 0)
                 FROM teams WHERE team_id = ?1",
                params![id.0],
                Self::row_to_team,
            )
            .optional()?
            .ok_or(HoopsError::TeamNotFound(id))
    }

    /// Get all teams
    pub fn get_all_teams(&self) -> Result<Vec<Team>> {
        let mut stmt = self.conn.prepare(
            "SELECT team_id, full_name, abbreviation, nickname, COALESCE(city, ''),
                    COALESCE(state, ''), COALESCE(year_founded, 0)
             FROM teams ORDER BY full_name",
        )?;
        let teams = stmt
            .query_map([], Self::row_to_team)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(teams)
    }

    /// Find a team by full name, abbreviation or nickname
    pub fn find_team_by_name(&self, name: &str) -> Result<Option<Team>> {
        Ok(self
            .get_all_teams()?
            .into_iter()
            .find(|team| team.matches_name(name)))
    }

    /// Ids of every stored team
    pub fn team_ids(&self) -> Result<Vec<TeamId>> {
        let mut stmt = self.conn.prepare("SELECT team_id FROM teams ORDER BY team_id")?;
        let ids = stmt
            .query_map([], |row| Ok(TeamId(row.get(0)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn row_to_team(row: &rusqlite::Row) -> rusqlite::Result<Team> {
        Ok(Team {
            id: TeamId(row.get(0)?),
            full_name: row.get(1)?,
            abbreviation: row.get(2)?,
            nickname: row.get(3)?,
            city: row.get(4)?,
            state: row.get(5)?,
            year_founded: row.get(6)?,
        })
    }

    // ==================== Player Operations ====================

    /// Insert or refresh a player's identity (team assignment is left alone)
    pub fn upsert_player(&self, player: &Player) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO players (player_id, full_name, first_name, last_name, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(player_id) DO UPDATE SET
                full_name = excluded.full_name,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                is_active = excluded.is_active
            "#,
            params![
                player.id.0,
                player.full_name,
                player.first_name,
                player.last_name,
                player.is_active,
            ],
        )?;
        Ok(())
    }

    /// Insert a player seen only in a box score, if not already stored
    pub fn ensure_player(&self, id: PlayerId, full_name: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO players (player_id, full_name, is_active) VALUES (?1, ?2, 1)",
            params![id.0, full_name],
        )?;
        Ok(inserted > 0)
    }

    /// Assign a team to a player that has none yet. Returns rows changed.
    pub fn set_player_team_if_missing(&self, player: PlayerId, team: TeamId) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE players SET team_id = ?1 WHERE player_id = ?2 AND team_id IS NULL",
            params![team.0, player.0],
        )?;
        Ok(changed)
    }

    /// Get player by ID
    pub fn get_player(&self, id: PlayerId) -> Result<Option<Player>> {
        let player = self
            .conn
            .query_row(
                "SELECT player_id, full_name, first_name, last_name, is_active, team_id
                 FROM players WHERE player_id = ?1",
                params![id.0],
                |row| {
                    Ok(Player {
                        id: PlayerId(row.get(0)?),
                        full_name: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                        is_active: row.get(4)?,
                        team_id: row.get::<_, Option<i64>>(5)?.map(TeamId),
                    })
                },
            )
            .optional()?;
        Ok(player)
    }

    /// Active players with their team name, ordered by team
    pub fn active_rosters(&self) -> Result<Vec<(String, Option<String>)>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.full_name, t.full_name
             FROM players p
             LEFT JOIN teams t ON p.team_id = t.team_id
             WHERE p.is_active = 1
             ORDER BY t.full_name, p.full_name",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ==================== Game Operations ====================

    /// Insert a game or refresh its scores and season
    pub fn upsert_game(&self, game: &GameRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO games (game_id, game_date, home_team_id, away_team_id,
                               home_team_score, away_team_score, season)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(game_id) DO UPDATE SET
                home_team_score = excluded.home_team_score,
                away_team_score = excluded.away_team_score,
                season = excluded.season
            "#,
            params![
                game.game_id.0,
                game.date.format(DATE_FORMAT).to_string(),
                game.home_team.0,
                game.away_team.0,
                game.home_score,
                game.away_score,
                game.season,
            ],
        )?;
        Ok(())
    }

    /// Get a game by id
    pub fn get_game(&self, id: &GameId) -> Result<Option<GameRecord>> {
        let game = self
            .conn
            .query_row(
                "SELECT game_id, game_date, home_team_id, away_team_id,
                        home_team_score, away_team_score, COALESCE(season, '')
                 FROM games WHERE game_id = ?1",
                params![id.0],
                Self::row_to_game,
            )
            .optional()?;
        Ok(game)
    }

    /// Ids of every stored game, oldest first
    pub fn game_ids(&self) -> Result<Vec<GameId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT game_id FROM games ORDER BY game_date, game_id")?;
        let ids = stmt
            .query_map([], |row| Ok(GameId(row.get(0)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Ids of stored games that have no player box score lines yet
    pub fn game_ids_without_box_scores(&self) -> Result<Vec<GameId>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.game_id FROM games g
             WHERE NOT EXISTS (SELECT 1 FROM player_game_stats p WHERE p.game_id = g.game_id)
             ORDER BY g.game_date, g.game_id",
        )?;
        let ids = stmt
            .query_map([], |row| Ok(GameId(row.get(0)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Get all games
    pub fn get_all_games(&self) -> Result<Vec<GameRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT game_id, game_date, home_team_id, away_team_id,
                    home_team_score, away_team_score, COALESCE(season, '')
             FROM games ORDER BY game_date, game_id",
        )?;
        let games = stmt
            .query_map([], Self::row_to_game)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(games)
    }

    /// Get completed games in date range (inclusive)
    pub fn get_completed_games_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<GameRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT game_id, game_date, home_team_id, away_team_id,
                    home_team_score, away_team_score, COALESCE(season, '')
             FROM games
             WHERE game_date >= ?1 AND game_date <= ?2
               AND home_team_score IS NOT NULL AND away_team_score IS NOT NULL
             ORDER BY game_date, game_id",
        )?;
        let games = stmt
            .query_map(
                params![
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string()
                ],
                Self::row_to_game,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(games)
    }

    fn row_to_game(row: &rusqlite::Row) -> rusqlite::Result<GameRecord> {
        Ok(GameRecord {
            game_id: GameId(row.get(0)?),
            date: parse_date_column(row, 1)?,
            home_team: TeamId(row.get(2)?),
            away_team: TeamId(row.get(3)?),
            home_score: row.get(4)?,
            away_score: row.get(5)?,
            season: row.get(6)?,
        })
    }

    // ==================== Box Scores ====================

    /// Insert or refresh a team box score line
    pub fn upsert_team_game_stats(&self, stats: &TeamGameStats) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO team_game_stats (game_id, team_id, points, field_goals_made,
                field_goals_attempted, three_points_made, three_points_attempted,
                free_throws_made, free_throws_attempted, offensive_rebounds,
                defensive_rebounds, total_rebounds, assists, steals, blocks, turnovers,
                personal_fouls, plus_minus)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT(game_id, team_id) DO UPDATE SET
                points = excluded.points,
                field_goals_made = excluded.field_goals_made,
                field_goals_attempted = excluded.field_goals_attempted,
                three_points_made = excluded.three_points_made,
                three_points_attempted = excluded.three_points_attempted,
                free_throws_made = excluded.free_throws_made,
                free_throws_attempted = excluded.free_throws_attempted,
                offensive_rebounds = excluded.offensive_rebounds,
                defensive_rebounds = excluded.defensive_rebounds,
                total_rebounds = excluded.total_rebounds,
                assists = excluded.assists,
                steals = excluded.steals,
                blocks = excluded.blocks,
                turnovers = excluded.turnovers,
                personal_fouls = excluded.personal_fouls,
                plus_minus = excluded.plus_minus
            "#,
            params![
                stats.game_id.0,
                stats.team_id.0,
                stats.points,
                stats.field_goals_made,
                stats.field_goals_attempted,
                stats.three_points_made,
                stats.three_points_attempted,
                stats.free_throws_made,
                stats.free_throws_attempted,
                stats.offensive_rebounds,
                stats.defensive_rebounds,
                stats.total_rebounds,
                stats.assists,
                stats.steals,
                stats.blocks,
                stats.turnovers,
                stats.personal_fouls,
                stats.plus_minus,
            ],
        )?;
        Ok(())
    }

    /// Insert or refresh a player box score line
    pub fn upsert_player_game_stats(&self, stats: &PlayerGameStats) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO player_game_stats (game_id, player_id, team_id, minutes, points,
                assists, rebounds, steals, blocks, turnovers, field_goals_made,
                field_goals_attempted, three_points_made, three_points_attempted,
                free_throws_made, free_throws_attempted, plus_minus)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT(game_id, player_id) DO UPDATE SET
                minutes = excluded.minutes,
                points = excluded.points,
                assists = excluded.assists,
                rebounds = excluded.rebounds,
                steals = excluded.steals,
                blocks = excluded.blocks,
                turnovers = excluded.turnovers,
                field_goals_made = excluded.field_goals_made,
                field_goals_attempted = excluded.field_goals_attempted,
                three_points_made = excluded.three_points_made,
                three_points_attempted = excluded.three_points_attempted,
                free_throws_made = excluded.free_throws_made,
                free_throws_attempted = excluded.free_throws_attempted,
                plus_minus = excluded.plus_minus
            "#,
            params![
                stats.game_id.0,
                stats.player_id.0,
                stats.team_id.0,
                stats.minutes,
                stats.points,
                stats.assists,
                stats.rebounds,
                stats.steals,
                stats.blocks,
                stats.turnovers,
                stats.field_goals_made,
                stats.field_goals_attempted,
                stats.three_points_made,
                stats.three_points_attempted,
                stats.free_throws_made,
                stats.free_throws_attempted,
                stats.plus_minus,
            ],
        )?;
        Ok(())
    }

    /// Points scored by a player in a game
    #[cfg(test)]
    pub fn player_points(&self, game: &GameId, player: PlayerId) -> Result<Option<i64>> {
        let points = self
            .conn
            .query_row(
                "SELECT points FROM player_game_stats WHERE game_id = ?1 AND player_id = ?2",
                params![game.0, player.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(points)
    }

    // ==================== Upcoming Games ====================

    /// Insert a scheduled game or refresh its date, time and status
    pub fn upsert_upcoming_game(&self, game: &UpcomingGame) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO upcoming_games (game_id, game_date, game_time, home_team_id,
                                        away_team_id, arena, tv_channel, game_status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(game_id) DO UPDATE SET
                game_date = excluded.game_date,
                game_time = excluded.game_time,
                game_status = excluded.game_status
            "#,
            params![
                game.game_id.0,
                game.date.format(DATE_FORMAT).to_string(),
                game.time.map(|t| t.format(TIME_FORMAT).to_string()),
                game.home_team.0,
                game.away_team.0,
                game.arena,
                game.tv_channel,
                game.status,
            ],
        )?;
        Ok(())
    }

    /// Remove a game from the upcoming list once it has been played
    pub fn delete_upcoming_game(&self, id: &GameId) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM upcoming_games WHERE game_id = ?1", params![id.0])?;
        Ok(deleted > 0)
    }

    /// Scheduled games in date range (inclusive)
    pub fn get_upcoming_games(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<UpcomingGame>> {
        let mut stmt = self.conn.prepare(
            "SELECT game_id, game_date, game_time, home_team_id, away_team_id,
                    arena, tv_channel, game_status
             FROM upcoming_games
             WHERE game_date >= ?1 AND game_date <= ?2
             ORDER BY game_date, game_time, game_id",
        )?;
        let games = stmt
            .query_map(
                params![
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    let time: Option<String> = row.get(2)?;
                    Ok(UpcomingGame {
                        game_id: GameId(row.get(0)?),
                        date: parse_date_column(row, 1)?,
                        time: time.and_then(|t| NaiveTime::parse_from_str(&t, TIME_FORMAT).ok()),
                        home_team: TeamId(row.get(3)?),
                        away_team: TeamId(row.get(4)?),
                        arena: row.get(5)?,
                        tv_channel: row.get(6)?,
                        status: row.get(7)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(games)
    }

    // ==================== Metrics, Features, Predictions ====================

    /// Insert or refresh a team's metrics for a date
    pub fn upsert_team_metrics(&self, metrics: &TeamMetricsRow) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO team_metrics (team_id, date, last_5_wins, last_10_wins, home_win_pct,
                away_win_pct, points_scored_avg, points_allowed_avg, offensive_rating,
                defensive_rating, rest_days)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(team_id, date) DO UPDATE SET
                last_5_wins = excluded.last_5_wins,
                last_10_wins = excluded.last_10_wins,
                home_win_pct = excluded.home_win_pct,
                away_win_pct = excluded.away_win_pct,
                points_scored_avg = excluded.points_scored_avg,
                points_allowed_avg = excluded.points_allowed_avg,
                offensive_rating = excluded.offensive_rating,
                defensive_rating = excluded.defensive_rating,
                rest_days = excluded.rest_days
            "#,
            params![
                metrics.team_id.0,
                metrics.date.format(DATE_FORMAT).to_string(),
                metrics.last_5_wins,
                metrics.last_10_wins,
                metrics.home_win_pct,
                metrics.away_win_pct,
                metrics.points_scored_avg,
                metrics.points_allowed_avg,
                metrics.offensive_rating,
                metrics.defensive_rating,
                metrics.rest_days,
            ],
        )?;
        Ok(())
    }

    /// Latest stored metrics for a team
    pub fn latest_team_metrics(&self, team: TeamId) -> Result<Option<TeamMetricsRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT team_id, date, last_5_wins, last_10_wins, home_win_pct, away_win_pct,
                        points_scored_avg, points_allowed_avg, offensive_rating,
                        defensive_rating, rest_days
                 FROM team_metrics WHERE team_id = ?1
                 ORDER BY date DESC LIMIT 1",
                params![team.0],
                |row| {
                    Ok(TeamMetricsRow {
                        team_id: TeamId(row.get(0)?),
                        date: parse_date_column(row, 1)?,
                        last_5_wins: row.get(2)?,
                        last_10_wins: row.get(3)?,
                        home_win_pct: row.get(4)?,
                        away_win_pct: row.get(5)?,
                        points_scored_avg: row.get(6)?,
                        points_allowed_avg: row.get(7)?,
                        offensive_rating: row.get(8)?,
                        defensive_rating: row.get(9)?,
                        rest_days: row.get(10)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Insert or refresh the stored feature summary of a game
    pub fn upsert_game_features(&self, row: &GameFeaturesRow) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO game_features (game_id, game_date, home_team_id, away_team_id,
                home_last_5_wins, home_last_10_wins, home_points_avg, home_win_pct,
                away_last_5_wins, away_last_10_wins, away_points_avg, away_win_pct)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(game_id) DO UPDATE SET
                home_last_5_wins = excluded.home_last_5_wins,
                home_last_10_wins = excluded.home_last_10_wins,
                home_points_avg = excluded.home_points_avg,
                home_win_pct = excluded.home_win_pct,
                away_last_5_wins = excluded.away_last_5_wins,
                away_last_10_wins = excluded.away_last_10_wins,
                away_points_avg = excluded.away_points_avg,
                away_win_pct = excluded.away_win_pct
            "#,
            params![
                row.game_id.0,
                row.date.format(DATE_FORMAT).to_string(),
                row.home_team.0,
                row.away_team.0,
                row.home_last_5_wins,
                row.home_last_10_wins,
                row.home_points_avg,
                row.home_win_pct,
                row.away_last_5_wins,
                row.away_last_10_wins,
                row.away_points_avg,
                row.away_win_pct,
            ],
        )?;
        Ok(())
    }

    /// Store a prediction for a game, replacing any earlier one
    pub fn upsert_prediction(&self, game_id: &GameId, prediction: &crate::Prediction) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO game_predictions (game_id, game_date, home_team_id, away_team_id,
                predicted_winner_id, win_probability, predicted_total_points)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(game_id) DO UPDATE SET
                prediction_date = datetime('now'),
                predicted_winner_id = excluded.predicted_winner_id,
                win_probability = excluded.win_probability,
                predicted_total_points = excluded.predicted_total_points
            "#,
            params![
                game_id.0,
                prediction.date.format(DATE_FORMAT).to_string(),
                prediction.home_team.0,
                prediction.away_team.0,
                prediction.predicted_winner().0,
                prediction.win_probability_pct() / 100.0,
                prediction.predicted_total,
            ],
        )?;
        Ok(())
    }

    /// Stored predictions whose game has a final score but no recorded outcome
    pub fn unreconciled_predictions(&self) -> Result<Vec<StoredPrediction>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.game_id, p.predicted_winner_id, p.predicted_total_points
             FROM game_predictions p
             JOIN games g ON g.game_id = p.game_id
             WHERE p.actual_winner_id IS NULL
               AND g.home_team_score IS NOT NULL AND g.away_team_score IS NOT NULL
             ORDER BY g.game_date",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredPrediction {
                    game_id: GameId(row.get(0)?),
                    predicted_winner: row.get::<_, Option<i64>>(1)?.map(TeamId),
                    predicted_total: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Record the actual outcome against a stored prediction
    pub fn record_prediction_outcome(
        &self,
        game_id: &GameId,
        actual_winner: TeamId,
        correct: bool,
        points_difference: f64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE game_predictions
             SET actual_winner_id = ?1, prediction_correct = ?2, points_difference = ?3
             WHERE game_id = ?4",
            params![actual_winner.0, correct, points_difference, game_id.0],
        )?;
        Ok(())
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let completed: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM games WHERE home_team_score IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        let (min_date, max_date): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(game_date), MAX(game_date) FROM games",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(DatabaseStats {
            team_count: count("teams")?,
            player_count: count("players")?,
            game_count: count("games")?,
            completed_game_count: completed as usize,
            player_line_count: count("player_game_stats")?,
            upcoming_count: count("upcoming_games")?,
            prediction_count: count("game_predictions")?,
            earliest_game: min_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
            latest_game: max_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
        })
    }
}

/// Parse a `YYYY-MM-DD` text column
pub(crate) fn parse_date_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// A team's form metrics as of a date
#[derive(Debug, Clone, PartialEq)]
pub struct TeamMetricsRow {
    pub team_id: TeamId,
    pub date: NaiveDate,
    pub last_5_wins: i64,
    pub last_10_wins: i64,
    pub home_win_pct: f64,
    pub away_win_pct: f64,
    pub points_scored_avg: f64,
    pub points_allowed_avg: f64,
    pub offensive_rating: f64,
    pub defensive_rating: f64,
    pub rest_days: Option<i64>,
}

/// Summary feature columns persisted per game
#[derive(Debug, Clone, PartialEq)]
pub struct GameFeaturesRow {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub home_last_5_wins: i64,
    pub home_last_10_wins: i64,
    pub home_points_avg: f64,
    pub home_win_pct: f64,
    pub away_last_5_wins: i64,
    pub away_last_10_wins: i64,
    pub away_points_avg: f64,
    pub away_win_pct: f64,
}

/// A stored prediction awaiting its outcome
#[derive(Debug, Clone)]
pub struct StoredPrediction {
    pub game_id: GameId,
    pub predicted_winner: Option<TeamId>,
    pub predicted_total: Option<f64>,
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub team_count: usize,
    pub player_count: usize,
    pub game_count: usize,
    pub completed_game_count: usize,
    pub player_line_count: usize,
    pub upcoming_count: usize,
    pub prediction_count: usize,
    pub earliest_game: Option<NaiveDate>,
    pub latest_game: Option<NaiveDate>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn team(id: i64, name: &str, abbreviation: &str) -> Team {
        Team {
            id: TeamId(id),
            full_name: name.to_string(),
            abbreviation: abbreviation.to_string(),
            nickname: name.rsplit(' ').next().unwrap_or(name).to_string(),
            city: String::new(),
            state: String::new(),
            year_founded: 1946,
        }
    }

    pub(crate) fn game(id: &str, date: &str, home: i64, away: i64, hs: u16, aws: u16) -> GameRecord {
        GameRecord {
            game_id: GameId::from(id),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            home_team: TeamId(home),
            away_team: TeamId(away),
            home_score: Some(hs),
            away_score: Some(aws),
            season: "2024-25".to_string(),
        }
    }

    fn seeded() -> Database {
        let db = Database::in_memory().unwrap();
        db.upsert_team(&team(1, "Boston Celtics", "BOS")).unwrap();
        db.upsert_team(&team(2, "New York Knicks", "NYK")).unwrap();
        db
    }

    #[test]
    fn test_create_database() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.team_count, 0);
        assert_eq!(stats.game_count, 0);
        assert!(stats.earliest_game.is_none());
    }

    #[test]
    fn test_team_upsert_and_lookup() {
        let db = seeded();
        let mut celtics = db.get_team(TeamId(1)).unwrap();
        assert_eq!(celtics.abbreviation, "BOS");

        celtics.city = "Boston".to_string();
        db.upsert_team(&celtics).unwrap();
        assert_eq!(db.get_all_teams().unwrap().len(), 2);
        assert_eq!(db.get_team(TeamId(1)).unwrap().city, "Boston");

        assert_eq!(db.find_team_by_name("nyk").unwrap().unwrap().id, TeamId(2));
        assert_eq!(db.find_team_by_name("Celtics").unwrap().unwrap().id, TeamId(1));
        assert!(db.find_team_by_name("Lakers").unwrap().is_none());
        assert!(matches!(db.get_team(TeamId(9)), Err(HoopsError::TeamNotFound(_))));
    }

    #[test]
    fn test_game_upsert_refreshes_scores_and_season() {
        let db = seeded();
        let mut g = game("0022400001", "2024-10-22", 1, 2, 132, 109);
        g.home_score = None;
        g.away_score = None;
        db.upsert_game(&g).unwrap();
        assert_eq!(db.get_stats().unwrap().completed_game_count, 0);

        let mut finished = game("0022400001", "2024-10-23", 2, 1, 132, 109);
        finished.season = "2025-26".to_string();
        db.upsert_game(&finished).unwrap();

        // Date and sides come from the first insert
        let stored = db.get_game(&GameId::from("0022400001")).unwrap().unwrap();
        assert_eq!(stored.home_score, Some(132));
        assert_eq!(stored.season, "2025-26");
        assert_eq!(stored.home_team, TeamId(1));
        assert_eq!(stored.date, NaiveDate::from_ymd_opt(2024, 10, 22).unwrap());
        assert_eq!(db.get_stats().unwrap().completed_game_count, 1);

        db.upsert_game(&game("0022400002", "2024-10-24", 2, 1, 101, 99))
            .unwrap();
        assert_eq!(db.get_all_games().unwrap().len(), 2);
        let day = NaiveDate::from_ymd_opt(2024, 10, 24).unwrap();
        let in_range = db.get_completed_games_in_range(day, day).unwrap();
        assert_eq!(in_range.len(), 1);
        assert_eq!(in_range[0].winner(), Some(TeamId(2)));
    }

    #[test]
    fn test_player_team_only_set_when_missing() {
        let db = seeded();
        let player = Player {
            id: PlayerId(1628369),
            full_name: "Jayson Tatum".to_string(),
            first_name: Some("Jayson".to_string()),
            last_name: Some("Tatum".to_string()),
            is_active: true,
            team_id: None,
        };
        db.upsert_player(&player).unwrap();
        assert_eq!(db.set_player_team_if_missing(player.id, TeamId(1)).unwrap(), 1);
        assert_eq!(db.set_player_team_if_missing(player.id, TeamId(2)).unwrap(), 0);
        assert_eq!(db.get_player(player.id).unwrap().unwrap().team_id, Some(TeamId(1)));

        assert!(!db.ensure_player(player.id, "J. Tatum").unwrap());
        assert!(db.ensure_player(PlayerId(1), "Unknown Rookie").unwrap());

        let rosters = db.active_rosters().unwrap();
        assert_eq!(rosters.len(), 2);
    }

    #[test]
    fn test_transaction_rollback_on_drop() {
        let db = seeded();
        {
            let _tx = db.transaction().unwrap();
            db.upsert_game(&game("0022400002", "2024-10-23", 2, 1, 100, 99))
                .unwrap();
        }
        assert!(db.get_game(&GameId::from("0022400002")).unwrap().is_none());

        let tx = db.transaction().unwrap();
        db.upsert_game(&game("0022400002", "2024-10-23", 2, 1, 100, 99))
            .unwrap();
        tx.commit().unwrap();
        assert!(db.get_game(&GameId::from("0022400002")).unwrap().is_some());
    }

    #[test]
    fn test_upcoming_games_lifecycle() {
        let db = seeded();
        let upcoming = UpcomingGame {
            game_id: GameId::from("0022400100"),
            date: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            time: NaiveTime::from_hms_opt(19, 30, 0),
            home_team: TeamId(1),
            away_team: TeamId(2),
            arena: Some("TD Garden".to_string()),
            tv_channel: None,
            status: "7:30 pm ET".to_string(),
        };
        db.upsert_upcoming_game(&upcoming).unwrap();

        let start = NaiveDate::from_ymd_opt(2024, 10, 31).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 11, 2).unwrap();
        let games = db.get_upcoming_games(start, end).unwrap();
        assert_eq!(games, vec![upcoming.clone()]);

        assert!(db.delete_upcoming_game(&upcoming.game_id).unwrap());
        assert!(db.get_upcoming_games(start, end).unwrap().is_empty());
    }

    #[test]
    fn test_prediction_reconciliation_rows() {
        let db = seeded();
        let g = game("0022400003", "2024-10-24", 1, 2, 120, 110);
        db.upsert_game(&g).unwrap();
        let prediction = crate::Prediction {
            game_id: Some(g.game_id.clone()),
            date: g.date,
            home_team: TeamId(1),
            away_team: TeamId(2),
            home_win_prob: 0.64,
            predicted_total: 221.5,
        };
        db.upsert_prediction(&g.game_id, &prediction).unwrap();

        let pending = db.unreconciled_predictions().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].predicted_winner, Some(TeamId(1)));

        db.record_prediction_outcome(&g.game_id, TeamId(1), true, 8.5)
            .unwrap();
        assert!(db.unreconciled_predictions().unwrap().is_empty());
    }
}
