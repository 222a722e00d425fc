//! Typed wrappers over the stats endpoints used for ingestion

use super::{Row, StatsSource};
use crate::{GameId, HoopsError, PlayerGameStats, PlayerId, Result, TeamGameStats, TeamId};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

const LEAGUE_ID: &str = "00";

/// One team's line from `leaguegamefinder` (two rows per game)
#[derive(Debug, Clone)]
pub struct GameFinderRow {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub team_id: TeamId,
    pub matchup: String,
    pub won: Option<bool>,
    pub stats: TeamGameStats,
}

impl GameFinderRow {
    /// Home rows read "BOS vs. NYK", away rows "NYK @ BOS"
    pub fn is_home(&self) -> bool {
        !self.matchup.contains('@')
    }
}

/// A game from the scoreboard `GameHeader` table
#[derive(Debug, Clone)]
pub struct ScoreboardGame {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub status_id: i64,
    pub status_text: String,
    pub home_team: TeamId,
    pub visitor_team: TeamId,
    pub season: String,
    pub arena: Option<String>,
    pub national_tv: Option<String>,
}

impl ScoreboardGame {
    /// Status 3, or text such as "Final" / "Final/OT"
    pub fn is_final(&self) -> bool {
        self.status_id == 3 || self.status_text.trim().starts_with("Final")
    }

    /// Tip-off time parsed from a status such as "7:30 pm ET"
    pub fn tip_off(&self) -> Option<NaiveTime> {
        let text = self.status_text.trim().trim_end_matches("ET").trim();
        NaiveTime::parse_from_str(&text.to_uppercase(), "%I:%M %p").ok()
    }
}

/// Points per team from the scoreboard `LineScore` table
#[derive(Debug, Clone)]
pub struct LineScore {
    pub game_id: GameId,
    pub team_id: TeamId,
    pub points: Option<i64>,
}

/// Scoreboard for one date
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    pub games: Vec<ScoreboardGame>,
    pub line_scores: Vec<LineScore>,
}

impl Scoreboard {
    /// Points scored by a team in a game, if the line score has them
    pub fn points(&self, game_id: &GameId, team: TeamId) -> Option<i64> {
        self.line_scores
            .iter()
            .find(|l| &l.game_id == game_id && l.team_id == team)
            .and_then(|l| l.points)
    }
}

/// Traditional box score for one game
#[derive(Debug, Clone, Default)]
pub struct BoxScore {
    pub players: Vec<PlayerGameStats>,
    pub teams: Vec<TeamGameStats>,
}

/// A player from `commonallplayers`
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub player_id: PlayerId,
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roster_status: i64,
    pub team_id: TeamId,
}

impl RosterEntry {
    pub fn is_rostered(&self) -> bool {
        self.roster_status == 1
    }

    /// Team 0 marks a free agent
    pub fn team(&self) -> Option<TeamId> {
        (self.team_id.0 != 0).then_some(self.team_id)
    }
}

/// All team game lines for a season
pub fn league_game_finder(source: &dyn StatsSource, season: &str) -> Result<Vec<GameFinderRow>> {
    let response = source.fetch(
        "leaguegamefinder",
        &[
            ("PlayerOrTeam", "T".to_string()),
            ("LeagueIDNullable", LEAGUE_ID.to_string()),
            ("SeasonNullable", season.to_string()),
        ],
    )?;

    let set = response.first()?;
    if set.is_empty() {
        log::warn!("No game lines returned for season {}", season);
    } else {
        log::debug!("{} game lines for season {}", set.len(), season);
    }

    let mut rows = Vec::new();
    for row in set.rows() {
        let Some(game_id) = row.text("GAME_ID") else {
            continue;
        };
        let Some(date) = row.text("GAME_DATE").as_deref().and_then(parse_api_date) else {
            log::warn!("Skipping game {} - unreadable date", game_id);
            continue;
        };
        let game_id = GameId(game_id);
        let team_id = TeamId(row.int("TEAM_ID"));
        rows.push(GameFinderRow {
            stats: team_stats_from_row(&row, &game_id, team_id),
            game_id,
            date,
            team_id,
            matchup: row.text("MATCHUP").unwrap_or_default(),
            won: row.text("WL").map(|wl| wl == "W"),
        });
    }
    Ok(rows)
}

/// Scoreboard for a date
pub fn scoreboard(source: &dyn StatsSource, date: NaiveDate) -> Result<Scoreboard> {
    let response = source.fetch(
        "scoreboardv2",
        &[
            ("GameDate", date.format("%Y-%m-%d").to_string()),
            ("LeagueID", LEAGUE_ID.to_string()),
            ("DayOffset", "0".to_string()),
        ],
    )?;

    let mut board = Scoreboard::default();
    for row in response.set("GameHeader")?.rows() {
        let Some(game_id) = row.text("GAME_ID") else {
            continue;
        };
        let game_date = row
            .text("GAME_DATE_EST")
            .as_deref()
            .and_then(parse_api_date)
            .unwrap_or(date);
        board.games.push(ScoreboardGame {
            game_id: GameId(game_id),
            date: game_date,
            status_id: row.int("GAME_STATUS_ID"),
            status_text: row.text("GAME_STATUS_TEXT").unwrap_or_default(),
            home_team: TeamId(row.int("HOME_TEAM_ID")),
            visitor_team: TeamId(row.int("VISITOR_TEAM_ID")),
            season: row.text("SEASON").unwrap_or_default(),
            arena: row.text("ARENA_NAME").filter(|s| !s.is_empty()),
            national_tv: row
                .text("NATL_TV_BROADCASTER_ABBREVIATION")
                .filter(|s| !s.is_empty()),
        });
    }

    if let Ok(lines) = response.set("LineScore") {
        for row in lines.rows() {
            let Some(game_id) = row.text("GAME_ID") else {
                continue;
            };
            board.line_scores.push(LineScore {
                game_id: GameId(game_id),
                team_id: TeamId(row.int("TEAM_ID")),
                points: row.opt_int("PTS"),
            });
        }
    }

    Ok(board)
}

/// Traditional box score for a game
pub fn box_score(source: &dyn StatsSource, game_id: &GameId) -> Result<BoxScore> {
    let response = source.fetch(
        "boxscoretraditionalv2",
        &[
            ("GameID", game_id.0.clone()),
            ("StartPeriod", "0".to_string()),
            ("EndPeriod", "10".to_string()),
            ("StartRange", "0".to_string()),
            ("EndRange", "28800".to_string()),
            ("RangeType", "0".to_string()),
        ],
    )?;

    let players = response
        .set("PlayerStats")?
        .rows()
        .filter_map(|row| {
            let player_id = row.opt_int("PLAYER_ID")?;
            Some(PlayerGameStats {
                game_id: game_id.clone(),
                player_id: PlayerId(player_id),
                player_name: row.text("PLAYER_NAME").unwrap_or_default(),
                team_id: TeamId(row.int("TEAM_ID")),
                minutes: row.minutes("MIN"),
                points: row.int("PTS"),
                assists: row.int("AST"),
                rebounds: row.int("REB"),
                steals: row.int("STL"),
                blocks: row.int("BLK"),
                turnovers: row.int("TO"),
                field_goals_made: row.int("FGM"),
                field_goals_attempted: row.int("FGA"),
                three_points_made: row.int("FG3M"),
                three_points_attempted: row.int("FG3A"),
                free_throws_made: row.int("FTM"),
                free_throws_attempted: row.int("FTA"),
                plus_minus: row.int("PLUS_MINUS"),
            })
        })
        .collect();

    let teams = match response.set("TeamStats") {
        Ok(set) => set
            .rows()
            .map(|row| team_stats_from_row(&row, game_id, TeamId(row.int("TEAM_ID"))))
            .collect(),
        Err(_) => Vec::new(),
    };

    Ok(BoxScore { players, teams })
}

/// Every player the league knows for a season
pub fn common_all_players(source: &dyn StatsSource, season: &str) -> Result<Vec<RosterEntry>> {
    let response = source.fetch(
        "commonallplayers",
        &[
            ("LeagueID", LEAGUE_ID.to_string()),
            ("Season", season.to_string()),
            ("IsOnlyCurrentSeason", "1".to_string()),
        ],
    )?;

    let set = response.first()?;
    if set.column("PERSON_ID").is_none() {
        return Err(HoopsError::Parse(
            "commonallplayers response lacks PERSON_ID".to_string(),
        ));
    }

    Ok(set
        .rows()
        .filter_map(|row| {
            let player_id = row.opt_int("PERSON_ID")?;
            let full_name = row.text("DISPLAY_FIRST_LAST").unwrap_or_default();
            let (first_name, last_name) = split_name(
                &full_name,
                row.text("DISPLAY_LAST_COMMA_FIRST").as_deref(),
            );
            Some(RosterEntry {
                player_id: PlayerId(player_id),
                full_name,
                first_name,
                last_name,
                roster_status: row.int("ROSTERSTATUS"),
                team_id: TeamId(row.int("TEAM_ID")),
            })
        })
        .collect())
}

/// First and last name, preferring the "Last, First" display form
fn split_name(full_name: &str, last_comma_first: Option<&str>) -> (Option<String>, Option<String>) {
    if let Some((last, first)) = last_comma_first.and_then(|s| s.split_once(',')) {
        return (
            Some(first.trim().to_string()).filter(|s| !s.is_empty()),
            Some(last.trim().to_string()).filter(|s| !s.is_empty()),
        );
    }
    match full_name.split_once(' ') {
        Some((first, last)) => (Some(first.to_string()), Some(last.to_string())),
        None if !full_name.is_empty() => (Some(full_name.to_string()), None),
        None => (None, None),
    }
}

/// Team box score columns shared by the game finder and box score tables.
/// The finder spells turnovers `TOV`, the box score `TO`.
fn team_stats_from_row(row: &Row<'_>, game_id: &GameId, team_id: TeamId) -> TeamGameStats {
    TeamGameStats {
        game_id: game_id.clone(),
        team_id,
        points: row.int("PTS"),
        field_goals_made: row.int("FGM"),
        field_goals_attempted: row.int("FGA"),
        three_points_made: row.int("FG3M"),
        three_points_attempted: row.int("FG3A"),
        free_throws_made: row.int("FTM"),
        free_throws_attempted: row.int("FTA"),
        offensive_rebounds: row.int("OREB"),
        defensive_rebounds: row.int("DREB"),
        total_rebounds: row.int("REB"),
        assists: row.int("AST"),
        steals: row.int("STL"),
        blocks: row.int("BLK"),
        turnovers: row.opt_int("TOV").unwrap_or_else(|| row.int("TO")),
        personal_fouls: row.int("PF"),
        plus_minus: row.int("PLUS_MINUS"),
    }
}

/// Dates arrive as `2024-10-22`, `2024-10-22T00:00:00` or `OCT 22, 2024`
pub fn parse_api_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| NaiveDate::parse_from_str(s, "%b %d, %Y").ok())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::api::tests::CannedSource;

    pub(crate) const SCOREBOARD: &str = r#"{
        "resource": "scoreboard",
        "resultSets": [
            {
                "name": "GameHeader",
                "headers": ["GAME_DATE_EST", "GAME_SEQUENCE", "GAME_ID", "GAME_STATUS_ID",
                            "GAME_STATUS_TEXT", "GAMECODE", "HOME_TEAM_ID", "VISITOR_TEAM_ID",
                            "SEASON", "NATL_TV_BROADCASTER_ABBREVIATION", "ARENA_NAME"],
                "rowSet": [
                    ["2024-10-22T00:00:00", 1, "0022400061", 3, "Final", "20241022/NYKBOS",
                     1610612738, 1610612752, "2024", "TNT", "TD Garden"],
                    ["2024-10-22T00:00:00", 2, "0022400062", 1, "10:00 pm ET", "20241022/MINLAL",
                     1610612747, 1610612750, "2024", null, "Crypto.com Arena"]
                ]
            },
            {
                "name": "LineScore",
                "headers": ["GAME_DATE_EST", "GAME_SEQUENCE", "GAME_ID", "TEAM_ID", "PTS"],
                "rowSet": [
                    ["2024-10-22T00:00:00", 1, "0022400061", 1610612738, 132],
                    ["2024-10-22T00:00:00", 1, "0022400061", 1610612752, 109],
                    ["2024-10-22T00:00:00", 2, "0022400062", 1610612747, null],
                    ["2024-10-22T00:00:00", 2, "0022400062", 1610612750, null]
                ]
            }
        ]
    }"#;

    pub(crate) const BOX_SCORE: &str = r#"{
        "resultSets": [
            {
                "name": "PlayerStats",
                "headers": ["GAME_ID", "TEAM_ID", "PLAYER_ID", "PLAYER_NAME", "MIN", "FGM", "FGA",
                            "FG3M", "FG3A", "FTM", "FTA", "REB", "AST", "STL", "BLK", "TO", "PTS",
                            "PLUS_MINUS"],
                "rowSet": [
                    ["0022400061", 1610612738, 1628369, "Jayson Tatum", "30:12", 10, 18, 8, 12,
                     9, 9, 10, 4, 1, 0, 2, 37, 21.0],
                    ["0022400061", 1610612752, 1626157, "Karl-Anthony Towns", "PT33M05.00S", 4, 12,
                     1, 4, 3, 4, 12, 3, 0, 1, 3, 12, -25.0],
                    ["0022400061", 1610612752, 1630193, "Tyler Kolek", null, null, null, null,
                     null, null, null, null, null, null, null, null, null, null]
                ]
            },
            {
                "name": "TeamStats",
                "headers": ["GAME_ID", "TEAM_ID", "MIN", "FGM", "FGA", "FG3M", "FG3A", "FTM", "FTA",
                            "OREB", "DREB", "REB", "AST", "STL", "BLK", "TO", "PF", "PTS",
                            "PLUS_MINUS"],
                "rowSet": [
                    ["0022400061", 1610612738, "240:00", 48, 95, 29, 61, 7, 8, 10, 35, 45, 33, 6,
                     3, 10, 11, 132, 23],
                    ["0022400061", 1610612752, "240:00", 40, 91, 9, 30, 20, 25, 12, 28, 40, 23,
                     5, 5, 12, 13, 109, -23]
                ]
            }
        ]
    }"#;

    #[test]
    fn test_scoreboard() {
        let source = CannedSource::default().with("scoreboardv2", SCOREBOARD);
        let date = NaiveDate::from_ymd_opt(2024, 10, 22).unwrap();
        let board = scoreboard(&source, date).unwrap();

        assert_eq!(board.games.len(), 2);
        let opener = &board.games[0];
        assert!(opener.is_final());
        assert_eq!(opener.home_team, TeamId(1610612738));
        assert_eq!(opener.national_tv.as_deref(), Some("TNT"));
        assert_eq!(board.points(&opener.game_id, TeamId(1610612752)), Some(109));

        let late = &board.games[1];
        assert!(!late.is_final());
        assert_eq!(late.tip_off(), NaiveTime::from_hms_opt(22, 0, 0));
        assert_eq!(board.points(&late.game_id, TeamId(1610612747)), None);
    }

    #[test]
    fn test_box_score() {
        let source = CannedSource::default().with("boxscoretraditionalv2", BOX_SCORE);
        let bs = box_score(&source, &GameId::from("0022400061")).unwrap();

        assert_eq!(bs.players.len(), 3);
        assert_eq!(bs.players[0].minutes, 30);
        assert_eq!(bs.players[0].points, 37);
        assert_eq!(bs.players[0].plus_minus, 21);
        assert_eq!(bs.players[1].minutes, 33);
        assert_eq!(bs.players[2].minutes, 0);
        assert_eq!(bs.players[2].points, 0);

        assert_eq!(bs.teams.len(), 2);
        assert_eq!(bs.teams[0].turnovers, 10);
        assert_eq!(bs.teams[1].free_throws_attempted, 25);
    }

    #[test]
    fn test_game_finder() {
        let body = r#"{"resultSets": [{
            "name": "LeagueGameFinderResults",
            "headers": ["SEASON_ID", "TEAM_ID", "TEAM_ABBREVIATION", "GAME_ID", "GAME_DATE",
                        "MATCHUP", "WL", "PTS", "FGA", "FTA", "REB", "TOV"],
            "rowSet": [
                ["22024", 1610612738, "BOS", "0022400061", "2024-10-22", "BOS vs. NYK", "W", 132, 95, 8, 45, 10],
                ["22024", 1610612752, "NYK", "0022400061", "2024-10-22", "NYK @ BOS", "L", 109, 91, 25, 40, 12]
            ]
        }]}"#;
        let source = CannedSource::default().with("leaguegamefinder", body);
        let rows = league_game_finder(&source, "2024-25").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_home());
        assert!(!rows[1].is_home());
        assert_eq!(rows[0].won, Some(true));
        assert_eq!(rows[1].stats.turnovers, 12);
    }

    #[test]
    fn test_roster_names() {
        let body = r#"{"resultSets": [{
            "name": "CommonAllPlayers",
            "headers": ["PERSON_ID", "DISPLAY_LAST_COMMA_FIRST", "DISPLAY_FIRST_LAST", "ROSTERSTATUS", "TEAM_ID"],
            "rowSet": [
                [1628369, "Tatum, Jayson", "Jayson Tatum", 1, 1610612738],
                [201566, "Westbrook, Russell", "Russell Westbrook", 0, 0],
                [1630578, "Nance", "Nance", 1, 0]
            ]
        }]}"#;
        let source = CannedSource::default().with("commonallplayers", body);
        let players = common_all_players(&source, "2024-25").unwrap();
        assert_eq!(players.len(), 3);
        assert_eq!(players[0].first_name.as_deref(), Some("Jayson"));
        assert_eq!(players[0].last_name.as_deref(), Some("Tatum"));
        assert_eq!(players[0].team(), Some(TeamId(1610612738)));
        assert!(!players[1].is_rostered());
        assert_eq!(players[2].team(), None);
        assert_eq!(players[2].first_name.as_deref(), Some("Nance"));
    }

    #[test]
    fn test_parse_api_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 10, 22);
        assert_eq!(parse_api_date("2024-10-22"), expected);
        assert_eq!(parse_api_date("2024-10-22T00:00:00"), expected);
        assert_eq!(parse_api_date("OCT 22, 2024"), expected);
        assert_eq!(parse_api_date("tomorrow"), None);
    }
}
