//! NBA game prediction
//!
//! Ingests games and box scores from the NBA stats API into SQLite, builds
//! point-in-time team and matchup features, and trains boosted regression
//! models for the home win probability and the combined final score.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;
pub mod web;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// NBA team identifier as issued by the stats API (e.g. 1610612747)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

/// Player identifier as issued by the stats API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub i64);

/// Game identifier, a zero-padded string such as "0022400061"
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameId(pub String);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(id: &str) -> Self {
        GameId(id.to_string())
    }
}

/// An NBA franchise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub full_name: String,
    pub abbreviation: String,
    pub nickname: String,
    pub city: String,
    pub state: String,
    pub year_founded: i32,
}

impl Team {
    /// Matches full name, abbreviation or nickname, ignoring case
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.trim();
        self.full_name.eq_ignore_ascii_case(name)
            || self.abbreviation.eq_ignore_ascii_case(name)
            || self.nickname.eq_ignore_ascii_case(name)
    }
}

/// A player known to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub team_id: Option<TeamId>,
}

/// A game with its final score (scores are absent until the game is played)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub home_score: Option<u16>,
    pub away_score: Option<u16>,
    pub season: String,
}

impl GameRecord {
    /// Whether both scores are known
    pub fn is_complete(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }

    /// Returns the winning team, or None if the game is unplayed.
    /// NBA games cannot end level, so an equal score is treated as unplayed.
    pub fn winner(&self) -> Option<TeamId> {
        let (home, away) = (self.home_score?, self.away_score?);
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => Some(self.home_team),
            std::cmp::Ordering::Less => Some(self.away_team),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Whether the home side won
    pub fn home_won(&self) -> Option<bool> {
        self.winner().map(|w| w == self.home_team)
    }

    /// Combined points of both teams
    pub fn total_points(&self) -> Option<u32> {
        Some(u32::from(self.home_score?) + u32::from(self.away_score?))
    }
}

/// One team's traditional box score line for a game
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamGameStats {
    pub game_id: GameId,
    pub team_id: TeamId,
    pub points: i64,
    pub field_goals_made: i64,
    pub field_goals_attempted: i64,
    pub three_points_made: i64,
    pub three_points_attempted: i64,
    pub free_throws_made: i64,
    pub free_throws_attempted: i64,
    pub offensive_rebounds: i64,
    pub defensive_rebounds: i64,
    pub total_rebounds: i64,
    pub assists: i64,
    pub steals: i64,
    pub blocks: i64,
    pub turnovers: i64,
    pub personal_fouls: i64,
    pub plus_minus: i64,
}

/// One player's traditional box score line for a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameStats {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub team_id: TeamId,
    pub minutes: i64,
    pub points: i64,
    pub assists: i64,
    pub rebounds: i64,
    pub steals: i64,
    pub blocks: i64,
    pub turnovers: i64,
    pub field_goals_made: i64,
    pub field_goals_attempted: i64,
    pub three_points_made: i64,
    pub three_points_attempted: i64,
    pub free_throws_made: i64,
    pub free_throws_attempted: i64,
    pub plus_minus: i64,
}

/// A scheduled game that has not been played yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingGame {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub arena: Option<String>,
    pub tv_channel: Option<String>,
    pub status: String,
}

/// Model prediction output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub game_id: Option<GameId>,
    pub date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    /// Home win probability, clamped to [0, 1]
    pub home_win_prob: f64,
    pub predicted_total: f64,
}

impl Prediction {
    /// Home team when the win probability exceeds one half
    pub fn predicted_winner(&self) -> TeamId {
        if self.home_win_prob > 0.5 {
            self.home_team
        } else {
            self.away_team
        }
    }

    /// Probability of the predicted winner as a percentage, capped at 99.9
    pub fn win_probability_pct(&self) -> f64 {
        let p = if self.predicted_winner() == self.home_team {
            self.home_win_prob
        } else {
            1.0 - self.home_win_prob
        };
        (p * 100.0).min(99.9)
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum HoopsError {
    #[error("Stats API request to {endpoint} failed: {message}")]
    Api {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Team not found with ID: {0}")]
    TeamNotFound(TeamId),

    #[error("Game not found: {0}")]
    GameNotFound(GameId),

    #[error("Model not trained - run `hoops train` first")]
    NoModel,

    #[error("Insufficient training data: have {samples} samples, need {required}")]
    InsufficientData { samples: usize, required: usize },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, HoopsError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries
    pub backoff_secs: f64,
    /// Pause between consecutive requests
    pub request_delay_ms: u64,
    pub season: String,
    pub cache_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub database_path: String,
    pub model_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Games in the rolling form window
    pub form_window: usize,
    /// Games in the short win-count window
    pub short_window: usize,
    /// Prior games each team needs before a game becomes a training sample
    pub min_history: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub reg_lambda: f64,
    pub random_state: u64,
    pub test_size: f64,
    pub min_samples: usize,
    /// Model input columns, by feature name
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub bind: String,
    pub upcoming_days: i64,
    pub history_days: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: "https://stats.nba.com/stats".to_string(),
            timeout_secs: 60,
            max_retries: 3,
            backoff_secs: 1.0,
            request_delay_ms: 600,
            season: "2024-25".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            database_path: "data/nba_stats.db".to_string(),
            model_path: "models/nba_prediction_models.json".to_string(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            form_window: 10,
            short_window: 5,
            min_history: 3,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            n_estimators: 1000,
            learning_rate: 0.01,
            max_depth: 3,
            subsample: 0.8,
            colsample_bytree: 0.8,
            reg_lambda: 1.0,
            random_state: 42,
            test_size: 0.2,
            min_samples: 20,
            features: features::FeatureColumn::PRIMARY
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            bind: "127.0.0.1:5000".to_string(),
            upcoming_days: 3,
            history_days: 7,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HoopsError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| HoopsError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HoopsError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(home_score: Option<u16>, away_score: Option<u16>) -> GameRecord {
        GameRecord {
            game_id: GameId::from("0022400001"),
            date: NaiveDate::from_ymd_opt(2024, 10, 22).unwrap(),
            home_team: TeamId(1610612738),
            away_team: TeamId(1610612752),
            home_score,
            away_score,
            season: "2024-25".to_string(),
        }
    }

    #[test]
    fn test_game_winner() {
        let g = game(Some(132), Some(109));
        assert_eq!(g.winner(), Some(TeamId(1610612738)));
        assert_eq!(g.home_won(), Some(true));
        assert_eq!(g.total_points(), Some(241));

        let unplayed = game(None, None);
        assert!(!unplayed.is_complete());
        assert_eq!(unplayed.winner(), None);
        assert_eq!(unplayed.total_points(), None);

        let high = game(Some(u16::MAX), Some(1));
        assert_eq!(high.total_points(), Some(65536));
    }

    #[test]
    fn test_prediction_winner_side() {
        let mut p = Prediction {
            game_id: None,
            date: NaiveDate::from_ymd_opt(2024, 10, 22).unwrap(),
            home_team: TeamId(1),
            away_team: TeamId(2),
            home_win_prob: 0.72,
            predicted_total: 221.4,
        };
        assert_eq!(p.predicted_winner(), TeamId(1));
        assert!((p.win_probability_pct() - 72.0).abs() < 1e-9);

        // Exactly one half goes to the away side
        p.home_win_prob = 0.5;
        assert_eq!(p.predicted_winner(), TeamId(2));

        p.home_win_prob = 0.0;
        assert!((p.win_probability_pct() - 99.9).abs() < 1e-9);
    }

    #[test]
    fn test_team_name_matching() {
        let team = Team {
            id: TeamId(1610612747),
            full_name: "Los Angeles Lakers".to_string(),
            abbreviation: "LAL".to_string(),
            nickname: "Lakers".to_string(),
            city: "Los Angeles".to_string(),
            state: "California".to_string(),
            year_founded: 1948,
        };
        assert!(team.matches_name("los angeles lakers"));
        assert!(team.matches_name("lal"));
        assert!(team.matches_name(" Lakers "));
        assert!(!team.matches_name("Clippers"));
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [training]
            n_estimators = 50

            [data]
            database_path = "tmp/test.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.training.n_estimators, 50);
        assert_eq!(config.training.max_depth, 3);
        assert_eq!(config.data.database_path, "tmp/test.db");
        assert_eq!(config.data.model_path, "models/nba_prediction_models.json");
        assert_eq!(config.api.max_retries, 3);
        assert_eq!(config.training.features.len(), 6);
    }
}
