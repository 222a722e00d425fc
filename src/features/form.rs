//! Point-in-time team form and matchup features
//!
//! Advanced box score stats are derived in SQL and rolled up per team with
//! window functions whose frames stop before the game being described, so a
//! game's features never include its own result.

use super::FeatureColumn;
use crate::data::database::{parse_date_column, GameFeaturesRow};
use crate::data::Database;
use crate::{FeatureConfig, GameId, Result, TeamId};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Offensive rating assumed for a team without history
pub const DEFAULT_OFF_RTG: f64 = 110.0;
/// Possessions per game assumed for a team without history
pub const DEFAULT_PACE: f64 = 100.0;
/// True shooting assumed for a team without history
pub const DEFAULT_TS_PCT: f64 = 0.55;
/// Points per game assumed when the store holds no box scores
pub const DEFAULT_POINTS: f64 = 110.0;

/// Advanced stats for every completed team-game with a box score line
const ADVANCED_CTE: &str = r#"
team_games AS (
    SELECT
        g.game_id,
        g.game_date,
        COALESCE(g.season, '') AS season,
        s.team_id,
        CASE WHEN s.team_id = g.home_team_id THEN 1 ELSE 0 END AS is_home,
        s.points AS pts,
        CASE WHEN s.team_id = g.home_team_id
             THEN g.away_team_score ELSE g.home_team_score END AS opp_pts,
        CASE WHEN s.team_id = g.home_team_id
             THEN g.home_team_score > g.away_team_score
             ELSE g.away_team_score > g.home_team_score END AS won,
        s.field_goals_attempted AS fga,
        s.free_throws_attempted AS fta,
        s.total_rebounds AS reb,
        s.turnovers AS tov
    FROM team_game_stats s
    JOIN games g ON g.game_id = s.game_id
    WHERE g.home_team_score IS NOT NULL
      AND g.away_team_score IS NOT NULL
),
advanced AS (
    SELECT
        tg.*,
        fga + 0.44 * fta - 0.3 * reb + tov AS poss,
        100.0 * pts / NULLIF(fga + 0.44 * fta - 0.3 * reb + tov, 0) AS off_rtg,
        100.0 * opp_pts / NULLIF(fga + 0.44 * fta - 0.3 * reb + tov, 0) AS def_rtg,
        pts / NULLIF(2.0 * (fga + 0.44 * fta), 0) AS ts_pct
    FROM team_games tg
)"#;

/// Columns produced by the form CTE, in `TeamForm::from_row` order
const FORM_COLUMNS: [&str; 12] = [
    "games_played",
    "short_wins",
    "form_wins",
    "points_avg",
    "points_allowed_avg",
    "off_rtg",
    "def_rtg",
    "pace",
    "ts_pct",
    "home_win_pct",
    "away_win_pct",
    "rest_days",
];

/// Where a team's rolling window ends relative to the row's game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormFrame {
    /// Games strictly before the row's game (training rows)
    BeforeGame,
    /// Games up to and including the row's game (form "as of" a later date)
    ThroughGame,
}

/// Rolling form CTE. SQLite frame bounds must be literals, so the window
/// sizes are formatted into the query text.
fn form_cte(config: &FeatureConfig, frame: FormFrame) -> String {
    let form = config.form_window.max(1);
    let short = config.short_window.max(1);
    let (shift, end) = match frame {
        FormFrame::BeforeGame => (0, "1 PRECEDING"),
        FormFrame::ThroughGame => (1, "CURRENT ROW"),
    };

    format!(
        r#"
form AS (
    SELECT
        game_id,
        game_date,
        team_id,
        COUNT(*) OVER history AS games_played,
        COALESCE(SUM(won) OVER short_form, 0) AS short_wins,
        COALESCE(SUM(won) OVER long_form, 0) AS form_wins,
        AVG(pts) OVER long_form AS points_avg,
        AVG(opp_pts) OVER long_form AS points_allowed_avg,
        AVG(off_rtg) OVER long_form AS off_rtg,
        AVG(def_rtg) OVER long_form AS def_rtg,
        AVG(poss) OVER long_form AS pace,
        AVG(ts_pct) OVER long_form AS ts_pct,
        1.0 * SUM(won * is_home) OVER season_form
            / NULLIF(SUM(is_home) OVER season_form, 0) AS home_win_pct,
        1.0 * SUM(won * (1 - is_home)) OVER season_form
            / NULLIF(SUM(1 - is_home) OVER season_form, 0) AS away_win_pct,
        julianday(game_date) - julianday(LAG(game_date) OVER team_order) AS rest_days
    FROM advanced
    WINDOW
        team_order AS (PARTITION BY team_id ORDER BY game_date, game_id),
        history AS (team_order ROWS BETWEEN UNBOUNDED PRECEDING AND {end}),
        short_form AS (team_order ROWS BETWEEN {short} PRECEDING AND {end}),
        long_form AS (team_order ROWS BETWEEN {form} PRECEDING AND {end}),
        season_form AS (PARTITION BY team_id, season ORDER BY game_date, game_id
                        ROWS BETWEEN UNBOUNDED PRECEDING AND {end})
)"#,
        end = end,
        short = short - shift,
        form = form - shift,
    )
}

fn prefixed_form_columns(alias: &str) -> String {
    FORM_COLUMNS
        .iter()
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One row per completed game where both sides have enough history
fn training_sql(config: &FeatureConfig) -> String {
    format!(
        r#"
WITH {advanced},
{form},
league AS (
    SELECT AVG(pts) AS avg_points, AVG(poss) AS avg_pace, AVG(ts_pct) AS avg_ts
    FROM advanced
)
SELECT
    g.game_id, g.game_date, g.home_team_id, g.away_team_id,
    g.home_team_score, g.away_team_score,
    {home},
    {away},
    lg.avg_points, lg.avg_pace, lg.avg_ts,
    (SELECT COUNT(*) FROM games p
      WHERE p.home_team_id = g.home_team_id AND p.away_team_id = g.away_team_id
        AND p.home_team_score IS NOT NULL AND p.away_team_score IS NOT NULL
        AND (p.game_date < g.game_date
             OR (p.game_date = g.game_date AND p.game_id < g.game_id))) AS h2h_games,
    (SELECT COUNT(*) FROM games p
      WHERE p.home_team_id = g.home_team_id AND p.away_team_id = g.away_team_id
        AND p.home_team_score > p.away_team_score
        AND (p.game_date < g.game_date
             OR (p.game_date = g.game_date AND p.game_id < g.game_id))) AS h2h_home_wins
FROM games g
JOIN form h ON h.game_id = g.game_id AND h.team_id = g.home_team_id
JOIN form a ON a.game_id = g.game_id AND a.team_id = g.away_team_id
CROSS JOIN league lg
WHERE h.games_played >= ?1 AND a.games_played >= ?1
ORDER BY g.game_date, g.game_id
"#,
        advanced = ADVANCED_CTE,
        form = form_cte(config, FormFrame::BeforeGame),
        home = prefixed_form_columns("h"),
        away = prefixed_form_columns("a"),
    )
}

/// A team's recent form
#[derive(Debug, Clone, PartialEq)]
pub struct TeamForm {
    /// Completed games with a box score before the reference point
    pub games_played: i64,
    /// Wins over the short window (`features.short_window`, default 5)
    pub short_wins: i64,
    /// Wins over the form window (`features.form_window`, default 10)
    pub form_wins: i64,
    pub points_avg: f64,
    pub points_allowed_avg: f64,
    pub off_rtg: f64,
    pub def_rtg: f64,
    /// Average possessions per game
    pub pace: f64,
    pub ts_pct: f64,
    /// Season-to-date win rate at home
    pub home_win_pct: f64,
    /// Season-to-date win rate on the road
    pub away_win_pct: f64,
    pub rest_days: Option<f64>,
    pub last_game: Option<NaiveDate>,
}

impl TeamForm {
    /// Form assumed for a team the store knows nothing about
    pub fn fallback(league: &LeagueAverages) -> Self {
        TeamForm {
            games_played: 0,
            short_wins: 0,
            form_wins: 0,
            points_avg: league.avg_points,
            points_allowed_avg: league.avg_points,
            off_rtg: DEFAULT_OFF_RTG,
            def_rtg: DEFAULT_OFF_RTG,
            pace: DEFAULT_PACE,
            ts_pct: DEFAULT_TS_PCT,
            home_win_pct: 0.5,
            away_win_pct: 0.5,
            rest_days: None,
            last_game: None,
        }
    }

    fn from_row(row: &rusqlite::Row, start: usize) -> rusqlite::Result<Self> {
        let real = |offset: usize, default: f64| -> rusqlite::Result<f64> {
            Ok(row.get::<_, Option<f64>>(start + offset)?.unwrap_or(default))
        };
        Ok(TeamForm {
            games_played: row.get(start)?,
            short_wins: row.get(start + 1)?,
            form_wins: row.get(start + 2)?,
            points_avg: real(3, 0.0)?,
            points_allowed_avg: real(4, 0.0)?,
            off_rtg: real(5, DEFAULT_OFF_RTG)?,
            def_rtg: real(6, DEFAULT_OFF_RTG)?,
            pace: real(7, DEFAULT_PACE)?,
            ts_pct: real(8, DEFAULT_TS_PCT)?,
            home_win_pct: real(9, 0.5)?,
            away_win_pct: real(10, 0.5)?,
            rest_days: row.get(start + 11)?,
            last_game: None,
        })
    }
}

/// League-wide per team-game averages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeagueAverages {
    pub avg_points: f64,
    pub avg_pace: f64,
    pub avg_ts: f64,
}

impl Default for LeagueAverages {
    fn default() -> Self {
        LeagueAverages {
            avg_points: DEFAULT_POINTS,
            avg_pace: DEFAULT_PACE,
            avg_ts: DEFAULT_TS_PCT,
        }
    }
}

/// Earlier meetings with the same home/away pairing
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadToHead {
    pub games: i64,
    pub home_wins: i64,
}

impl HeadToHead {
    /// Home win rate of the pairing; even odds without history
    pub fn home_win_pct(&self) -> f64 {
        if self.games == 0 {
            0.5
        } else {
            self.home_wins as f64 / self.games as f64
        }
    }
}

/// Everything the models can see about a game before tip-off
#[derive(Debug, Clone, PartialEq)]
pub struct GameFeatures {
    pub game_id: Option<GameId>,
    pub date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub home_score: Option<u16>,
    pub away_score: Option<u16>,
    pub home: TeamForm,
    pub away: TeamForm,
    pub league: LeagueAverages,
    pub h2h: HeadToHead,
}

impl GameFeatures {
    /// 1.0 for a home win, 0.0 for an away win
    pub fn home_win(&self) -> Option<f64> {
        let (home, away) = (self.home_score?, self.away_score?);
        Some(if home > away { 1.0 } else { 0.0 })
    }

    pub fn total_points(&self) -> Option<f64> {
        Some(self.home_score? as f64 + self.away_score? as f64)
    }

    pub fn pace_diff(&self) -> f64 {
        self.home.pace - self.away.pace
    }

    pub fn off_rtg_diff(&self) -> f64 {
        self.home.off_rtg - self.away.off_rtg
    }

    pub fn ts_pct_diff(&self) -> f64 {
        self.home.ts_pct - self.away.ts_pct
    }

    pub fn home_pace_vs_avg(&self) -> f64 {
        pace_ratio(self.home.pace, self.league.avg_pace)
    }

    pub fn away_pace_vs_avg(&self) -> f64 {
        pace_ratio(self.away.pace, self.league.avg_pace)
    }

    /// Values of the given columns, in order
    pub fn vector(&self, columns: &[FeatureColumn]) -> Vec<f64> {
        columns.iter().map(|c| c.value(self)).collect()
    }

    /// Summary columns stored in `game_features`
    pub fn summary_row(&self) -> Option<GameFeaturesRow> {
        Some(GameFeaturesRow {
            game_id: self.game_id.clone()?,
            date: self.date,
            home_team: self.home_team,
            away_team: self.away_team,
            home_last_5_wins: self.home.short_wins,
            home_last_10_wins: self.home.form_wins,
            home_points_avg: self.home.points_avg,
            home_win_pct: self.home.home_win_pct,
            away_last_5_wins: self.away.short_wins,
            away_last_10_wins: self.away.form_wins,
            away_points_avg: self.away.points_avg,
            away_win_pct: self.away.away_win_pct,
        })
    }
}

fn pace_ratio(pace: f64, league_pace: f64) -> f64 {
    if league_pace.abs() < f64::EPSILON {
        1.0
    } else {
        pace / league_pace
    }
}

/// Features for every completed game where both teams have at least
/// `config.min_history` earlier games, oldest first
pub fn build_game_features(db: &Database, config: &FeatureConfig) -> Result<Vec<GameFeatures>> {
    let sql = training_sql(config);
    let mut stmt = db.connection().prepare(&sql)?;
    let home_start = 6;
    let away_start = home_start + FORM_COLUMNS.len();
    let league_start = away_start + FORM_COLUMNS.len();

    let rows = stmt
        .query_map(params![config.min_history as i64], |row| {
            Ok(GameFeatures {
                game_id: Some(GameId(row.get(0)?)),
                date: parse_date_column(row, 1)?,
                home_team: TeamId(row.get(2)?),
                away_team: TeamId(row.get(3)?),
                home_score: row.get(4)?,
                away_score: row.get(5)?,
                home: TeamForm::from_row(row, home_start)?,
                away: TeamForm::from_row(row, away_start)?,
                league: LeagueAverages {
                    avg_points: row.get(league_start)?,
                    avg_pace: row.get(league_start + 1)?,
                    avg_ts: row
                        .get::<_, Option<f64>>(league_start + 2)?
                        .unwrap_or(DEFAULT_TS_PCT),
                },
                h2h: HeadToHead {
                    games: row.get(league_start + 3)?,
                    home_wins: row.get(league_start + 4)?,
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    log::debug!("Built features for {} games", rows.len());
    Ok(rows)
}

/// A team's form over its games strictly before `date`, or None if it has
/// not played yet
pub fn team_form_as_of(
    db: &Database,
    team: TeamId,
    date: NaiveDate,
    config: &FeatureConfig,
) -> Result<Option<TeamForm>> {
    let sql = format!(
        "WITH {},{}\nSELECT {}, game_date FROM form
         WHERE team_id = ?1 AND game_date < ?2
         ORDER BY game_date DESC, game_id DESC LIMIT 1",
        ADVANCED_CTE,
        form_cte(config, FormFrame::ThroughGame),
        FORM_COLUMNS.join(", "),
    );

    let form = db
        .connection()
        .query_row(
            &sql,
            params![team.0, date.format(DATE_FORMAT).to_string()],
            |row| {
                let mut form = TeamForm::from_row(row, 0)?;
                form.last_game = Some(parse_date_column(row, FORM_COLUMNS.len())?);
                Ok(form)
            },
        )
        .optional()?;

    Ok(form.map(|mut f| {
        f.rest_days = f.last_game.map(|last| (date - last).num_days() as f64);
        f
    }))
}

/// League averages over every completed team-game
pub fn league_averages(db: &Database) -> Result<LeagueAverages> {
    let sql = format!(
        "WITH {}\nSELECT AVG(pts), AVG(poss), AVG(ts_pct) FROM advanced",
        ADVANCED_CTE
    );
    let (points, pace, ts): (Option<f64>, Option<f64>, Option<f64>) = db
        .connection()
        .query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;

    let defaults = LeagueAverages::default();
    Ok(LeagueAverages {
        avg_points: points.unwrap_or(defaults.avg_points),
        avg_pace: pace.unwrap_or(defaults.avg_pace),
        avg_ts: ts.unwrap_or(defaults.avg_ts),
    })
}

/// Completed meetings of this home/away pairing before `date`
pub fn head_to_head(
    db: &Database,
    home: TeamId,
    away: TeamId,
    date: NaiveDate,
) -> Result<HeadToHead> {
    let h2h = db.connection().query_row(
        "SELECT COUNT(*), COALESCE(SUM(home_team_score > away_team_score), 0)
         FROM games
         WHERE home_team_id = ?1 AND away_team_id = ?2
           AND home_team_score IS NOT NULL AND away_team_score IS NOT NULL
           AND game_date < ?3",
        params![home.0, away.0, date.format(DATE_FORMAT).to_string()],
        |row| {
            Ok(HeadToHead {
                games: row.get(0)?,
                home_wins: row.get(1)?,
            })
        },
    )?;
    Ok(h2h)
}

/// Features for a matchup played on `date`, using only earlier games.
/// Teams without history get league-level defaults.
pub fn matchup_features(
    db: &Database,
    home: TeamId,
    away: TeamId,
    date: NaiveDate,
    config: &FeatureConfig,
) -> Result<GameFeatures> {
    let league = league_averages(db)?;
    let form_or_default = |team: TeamId| -> Result<TeamForm> {
        Ok(match team_form_as_of(db, team, date, config)? {
            Some(form) => form,
            None => {
                log::warn!("No history for {} before {}, using defaults", team, date);
                TeamForm::fallback(&league)
            }
        })
    };

    Ok(GameFeatures {
        game_id: None,
        date,
        home_team: home,
        away_team: away,
        home_score: None,
        away_score: None,
        home: form_or_default(home)?,
        away: form_or_default(away)?,
        league,
        h2h: head_to_head(db, home, away, date)?,
    })
}
