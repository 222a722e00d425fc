//! Ingestion jobs: pull from the stats API and upsert into the store
//!
//! Each job is idempotent. Game-level work runs in its own transaction; a
//! failing game is logged and rolled back without stopping the run.

use crate::data::api::endpoints::{self, BoxScore, GameFinderRow, ScoreboardGame};
use crate::data::api::teams::nba_teams;
use crate::data::api::StatsSource;
use crate::data::database::TeamMetricsRow;
use crate::data::Database;
use crate::features::team_form_as_of;
use crate::{
    FeatureConfig, GameId, GameRecord, Player, Result, TeamId, UpcomingGame,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Outcome counts of an ingestion job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} skipped, {} failed",
            self.processed, self.skipped, self.failed
        )
    }
}

/// Runs ingestion jobs against a stats source and a database
pub struct Ingestor<'a> {
    source: &'a dyn StatsSource,
    db: &'a Database,
}

impl<'a> Ingestor<'a> {
    pub fn new(source: &'a dyn StatsSource, db: &'a Database) -> Self {
        Ingestor { source, db }
    }

    /// Upsert the static franchise table
    pub fn sync_teams(&self) -> Result<usize> {
        let teams = nba_teams();
        let tx = self.db.transaction()?;
        for team in &teams {
            self.db.upsert_team(team)?;
        }
        tx.commit()?;
        log::info!("Stored {} teams", teams.len());
        Ok(teams.len())
    }

    /// Upsert every player on a current roster
    pub fn sync_players(&self, season: &str) -> Result<usize> {
        let roster = endpoints::common_all_players(self.source, season)?;
        let tx = self.db.transaction()?;
        for entry in &roster {
            self.db.upsert_player(&Player {
                id: entry.player_id,
                full_name: entry.full_name.clone(),
                first_name: entry.first_name.clone(),
                last_name: entry.last_name.clone(),
                is_active: true,
                team_id: None,
            })?;
        }
        tx.commit()?;
        log::info!("Stored {} players for {}", roster.len(), season);
        Ok(roster.len())
    }

    /// Games and team box scores for a season from the game finder
    pub fn sync_games(&self, season: &str) -> Result<IngestReport> {
        let known: HashSet<TeamId> = self.db.team_ids()?.into_iter().collect();
        let mut by_game: BTreeMap<GameId, Vec<GameFinderRow>> = BTreeMap::new();
        for row in endpoints::league_game_finder(self.source, season)? {
            by_game.entry(row.game_id.clone()).or_default().push(row);
        }
        log::info!("Game finder returned {} games for {}", by_game.len(), season);

        let mut report = IngestReport::default();
        for (game_id, rows) in by_game {
            if !rows.iter().all(|r| known.contains(&r.team_id)) {
                log::debug!("Skipping {} - team not in store", game_id);
                report.skipped += 1;
                continue;
            }
            let (Some(home), Some(away)) = (
                rows.iter().find(|r| r.is_home()),
                rows.iter().find(|r| !r.is_home()),
            ) else {
                log::debug!("Skipping {} - could not tell home from away", game_id);
                report.skipped += 1;
                continue;
            };

            let game = GameRecord {
                game_id: game_id.clone(),
                date: home.date,
                home_team: home.team_id,
                away_team: away.team_id,
                home_score: u16::try_from(home.stats.points).ok(),
                away_score: u16::try_from(away.stats.points).ok(),
                season: season.to_string(),
            };
            if home.won.is_some() && home.won != game.home_won() {
                log::warn!(
                    "Game {} result column disagrees with its score, trusting the score",
                    game_id
                );
            }

            let stored = self.in_transaction(|| {
                self.db.upsert_game(&game)?;
                self.db.upsert_team_game_stats(&home.stats)?;
                self.db.upsert_team_game_stats(&away.stats)?;
                Ok(())
            });
            match stored {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    log::warn!("Failed to store game {}: {}", game_id, e);
                    report.failed += 1;
                }
            }
        }

        log::info!("Games: {}", report);
        Ok(report)
    }

    /// Traditional box scores for stored games. Without `refresh`, games
    /// that already have player lines are left alone.
    pub fn sync_box_scores(&self, refresh: bool) -> Result<IngestReport> {
        let game_ids = if refresh {
            self.db.game_ids()?
        } else {
            self.db.game_ids_without_box_scores()?
        };
        log::info!("Fetching box scores for {} games", game_ids.len());

        let mut report = IngestReport::default();
        for game_id in game_ids {
            let result = endpoints::box_score(self.source, &game_id)
                .and_then(|bs| self.in_transaction(|| self.store_box_score(&bs)));
            match result {
                Ok(0) => report.skipped += 1,
                Ok(lines) => {
                    log::debug!("Stored {} player lines for {}", lines, game_id);
                    report.processed += 1;
                }
                Err(e) => {
                    log::warn!("Failed to load box score for {}: {}", game_id, e);
                    report.failed += 1;
                }
            }
        }

        log::info!("Box scores: {}", report);
        Ok(report)
    }

    /// Record the final scores and box scores of games finished on `date`,
    /// removing them from the upcoming list
    pub fn update_completed(&self, date: NaiveDate) -> Result<IngestReport> {
        let board = endpoints::scoreboard(self.source, date)?;
        let known: HashSet<TeamId> = self.db.team_ids()?.into_iter().collect();

        let mut report = IngestReport::default();
        for header in board.games.iter().filter(|g| g.is_final()) {
            if !known.contains(&header.home_team) || !known.contains(&header.visitor_team) {
                report.skipped += 1;
                continue;
            }
            let scores = (
                board.points(&header.game_id, header.home_team),
                board.points(&header.game_id, header.visitor_team),
            );
            let (Some(home_score), Some(away_score)) = scores else {
                log::warn!("No line score for final game {}", header.game_id);
                report.skipped += 1;
                continue;
            };

            let game = GameRecord {
                game_id: header.game_id.clone(),
                date: header.date,
                home_team: header.home_team,
                away_team: header.visitor_team,
                home_score: u16::try_from(home_score).ok(),
                away_score: u16::try_from(away_score).ok(),
                season: season_label(&header.season),
            };

            let result = endpoints::box_score(self.source, &game.game_id).and_then(|bs| {
                self.in_transaction(|| {
                    self.db.upsert_game(&game)?;
                    self.store_box_score(&bs)?;
                    self.db.delete_upcoming_game(&game.game_id)?;
                    Ok(())
                })
            });
            match result {
                Ok(()) => {
                    log::info!(
                        "Final {}: {} {} - {} {}",
                        game.game_id,
                        game.home_team,
                        home_score,
                        away_score,
                        game.away_team
                    );
                    report.processed += 1;
                }
                Err(e) => {
                    log::warn!("Failed to update completed game {}: {}", game.game_id, e);
                    report.failed += 1;
                }
            }
        }

        if report.processed == 0 && report.failed == 0 {
            log::info!("No completed games found for {}", date);
        }
        Ok(report)
    }

    /// Store the not-yet-final games on `date` as upcoming games
    pub fn sync_upcoming(&self, date: NaiveDate) -> Result<IngestReport> {
        let board = endpoints::scoreboard(self.source, date)?;
        let known: HashSet<TeamId> = self.db.team_ids()?.into_iter().collect();

        let mut report = IngestReport::default();
        for header in &board.games {
            if header.is_final()
                || !known.contains(&header.home_team)
                || !known.contains(&header.visitor_team)
            {
                report.skipped += 1;
                continue;
            }
            match self.db.upsert_upcoming_game(&upcoming_from_header(header)) {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    log::warn!("Failed to store upcoming game {}: {}", header.game_id, e);
                    report.failed += 1;
                }
            }
        }

        log::info!("Upcoming games on {}: {}", date, report);
        Ok(report)
    }

    /// Give rostered players without a team their current team.
    /// Returns the number of players updated.
    pub fn update_player_teams(&self, season: &str) -> Result<usize> {
        let roster = endpoints::common_all_players(self.source, season)?;
        let tx = self.db.transaction()?;
        let mut updated = 0;
        for entry in roster.iter().filter(|e| e.is_rostered()) {
            let Some(team) = entry.team() else {
                continue;
            };
            if self.db.get_player(entry.player_id)?.is_none() {
                continue;
            }
            updated += self.db.set_player_team_if_missing(entry.player_id, team)?;
        }
        tx.commit()?;
        log::info!("Assigned teams to {} players", updated);
        Ok(updated)
    }

    /// Each team's form as of `date`, from stored games
    pub fn update_team_metrics(&self, date: NaiveDate, config: &FeatureConfig) -> Result<usize> {
        let tx = self.db.transaction()?;
        let mut stored = 0;
        for team in self.db.team_ids()? {
            let Some(form) = team_form_as_of(self.db, team, date, config)? else {
                log::debug!("No games for {} before {}", team, date);
                continue;
            };
            self.db.upsert_team_metrics(&TeamMetricsRow {
                team_id: team,
                date,
                last_5_wins: form.short_wins,
                last_10_wins: form.form_wins,
                home_win_pct: form.home_win_pct,
                away_win_pct: form.away_win_pct,
                points_scored_avg: form.points_avg,
                points_allowed_avg: form.points_allowed_avg,
                offensive_rating: form.off_rtg,
                defensive_rating: form.def_rtg,
                rest_days: form.rest_days.map(|d| d as i64),
            })?;
            stored += 1;
        }
        tx.commit()?;
        log::info!("Updated metrics for {} teams as of {}", stored, date);
        Ok(stored)
    }

    /// Upsert player and team lines; returns the number of player lines
    fn store_box_score(&self, box_score: &BoxScore) -> Result<usize> {
        for line in &box_score.players {
            if self.db.ensure_player(line.player_id, &line.player_name)? {
                log::debug!("Added player {} from box score", line.player_name);
            }
            self.db.upsert_player_game_stats(line)?;
        }
        for line in &box_score.teams {
            self.db.upsert_team_game_stats(line)?;
        }
        Ok(box_score.players.len())
    }

    /// Run `work` in a transaction that rolls back on error
    fn in_transaction<T>(&self, work: impl FnOnce() -> Result<T>) -> Result<T> {
        let tx = self.db.transaction()?;
        let value = work()?;
        tx.commit()?;
        Ok(value)
    }
}

fn upcoming_from_header(header: &ScoreboardGame) -> UpcomingGame {
    UpcomingGame {
        game_id: header.game_id.clone(),
        date: header.date,
        time: header.tip_off(),
        home_team: header.home_team,
        away_team: header.visitor_team,
        arena: header.arena.clone(),
        tv_channel: header.national_tv.clone(),
        status: header.status_text.trim().to_string(),
    }
}

/// Scoreboards report the starting year ("2024"); games are stored by
/// season label ("2024-25")
fn season_label(season: &str) -> String {
    match season.trim().parse::<i32>() {
        Ok(year) => format!("{}-{:02}", year, (year + 1) % 100),
        Err(_) => season.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::api::endpoints::tests::{BOX_SCORE, SCOREBOARD};
    use crate::data::api::tests::CannedSource;
    use crate::features::form::tests::alternating_season;
    use crate::PlayerId;
    use chrono::NaiveTime;

    const CELTICS: TeamId = TeamId(1610612738);
    const KNICKS: TeamId = TeamId(1610612752);

    fn opening_night() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 22).unwrap()
    }

    fn store_with_teams(source: &CannedSource) -> Database {
        let db = Database::in_memory().unwrap();
        Ingestor::new(source, &db).sync_teams().unwrap();
        db
    }

    #[test]
    fn test_sync_teams_is_idempotent() {
        let source = CannedSource::default();
        let db = store_with_teams(&source);
        assert_eq!(Ingestor::new(&source, &db).sync_teams().unwrap(), 30);
        assert_eq!(db.get_stats().unwrap().team_count, 30);
    }

    #[test]
    fn test_sync_games() {
        let body = r#"{"resultSets": [{
            "name": "LeagueGameFinderResults",
            "headers": ["TEAM_ID", "GAME_ID", "GAME_DATE", "MATCHUP", "WL", "PTS", "FGA", "FTA", "REB", "TOV"],
            "rowSet": [
                [1610612752, "0022400061", "2024-10-22", "NYK @ BOS", "L", 109, 91, 25, 40, 12],
                [1610612738, "0022400061", "2024-10-22", "BOS vs. NYK", "W", 132, 95, 8, 45, 10],
                [1610612747, "0012400001", "2024-10-05", "LAL vs. MAC", "W", 120, 90, 20, 50, 9],
                [15019, "0012400001", "2024-10-05", "MAC @ LAL", "L", 90, 85, 10, 40, 20]
            ]
        }]}"#;
        let source = CannedSource::default().with("leaguegamefinder", body);
        let db = store_with_teams(&source);

        let report = Ingestor::new(&source, &db).sync_games("2024-25").unwrap();
        assert_eq!(report, IngestReport { processed: 1, skipped: 1, failed: 0 });

        let game = db.get_game(&GameId::from("0022400061")).unwrap().unwrap();
        assert_eq!(game.home_team, CELTICS);
        assert_eq!(game.away_team, KNICKS);
        assert_eq!(game.home_score, Some(132));
        assert_eq!(game.season, "2024-25");
        assert!(db.get_game(&GameId::from("0012400001")).unwrap().is_none());
    }

    #[test]
    fn test_update_completed() {
        let source = CannedSource::default()
            .with("scoreboardv2", SCOREBOARD)
            .with("boxscoretraditionalv2", BOX_SCORE);
        let db = store_with_teams(&source);
        let ingestor = Ingestor::new(&source, &db);

        ingestor.sync_upcoming(opening_night()).unwrap();
        db.upsert_upcoming_game(&UpcomingGame {
            game_id: GameId::from("0022400061"),
            date: opening_night(),
            time: None,
            home_team: CELTICS,
            away_team: KNICKS,
            arena: None,
            tv_channel: None,
            status: "7:30 pm ET".to_string(),
        })
        .unwrap();

        let report = ingestor.update_completed(opening_night()).unwrap();
        assert_eq!(report.processed, 1);

        let game = db.get_game(&GameId::from("0022400061")).unwrap().unwrap();
        assert_eq!(game.winner(), Some(CELTICS));
        assert_eq!(game.total_points(), Some(241));
        assert_eq!(game.season, "2024-25");

        let game_id = GameId::from("0022400061");
        assert_eq!(db.player_points(&game_id, PlayerId(1628369)).unwrap(), Some(37));
        assert_eq!(db.player_points(&game_id, PlayerId(1630193)).unwrap(), Some(0));
        assert!(db.get_player(PlayerId(1626157)).unwrap().is_some());

        // The finished game left the upcoming list, the late game stayed
        let upcoming = db
            .get_upcoming_games(opening_night(), opening_night())
            .unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].game_id, GameId::from("0022400062"));
    }

    #[test]
    fn test_sync_upcoming() {
        let source = CannedSource::default().with("scoreboardv2", SCOREBOARD);
        let db = store_with_teams(&source);

        let report = Ingestor::new(&source, &db)
            .sync_upcoming(opening_night())
            .unwrap();
        assert_eq!(report, IngestReport { processed: 1, skipped: 1, failed: 0 });

        // The final Knicks at Celtics header is skipped
        let upcoming = db
            .get_upcoming_games(opening_night(), opening_night())
            .unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].game_id, GameId::from("0022400062"));
        assert!(db.get_game(&GameId::from("0022400061")).unwrap().is_none());
        assert_eq!(upcoming[0].time, NaiveTime::from_hms_opt(22, 0, 0));
        assert_eq!(upcoming[0].arena.as_deref(), Some("Crypto.com Arena"));
        assert_eq!(upcoming[0].tv_channel, None);
    }

    #[test]
    fn test_box_score_failures_do_not_stop_the_run() {
        let source = CannedSource::default();
        let db = store_with_teams(&source);
        db.upsert_game(&GameRecord {
            game_id: GameId::from("0022400061"),
            date: opening_night(),
            home_team: CELTICS,
            away_team: KNICKS,
            home_score: Some(132),
            away_score: Some(109),
            season: "2024-25".to_string(),
        })
        .unwrap();

        let report = Ingestor::new(&source, &db).sync_box_scores(false).unwrap();
        assert_eq!(report.failed, 1);

        let source = source.with("boxscoretraditionalv2", BOX_SCORE);
        let ingestor = Ingestor::new(&source, &db);
        assert_eq!(ingestor.sync_box_scores(false).unwrap().processed, 1);
        // Nothing left without a box score
        assert_eq!(ingestor.sync_box_scores(false).unwrap(), IngestReport::default());
        assert_eq!(ingestor.sync_box_scores(true).unwrap().processed, 1);
    }

    #[test]
    fn test_player_sync_and_team_assignment() {
        let body = r#"{"resultSets": [{
            "name": "CommonAllPlayers",
            "headers": ["PERSON_ID", "DISPLAY_LAST_COMMA_FIRST", "DISPLAY_FIRST_LAST", "ROSTERSTATUS", "TEAM_ID"],
            "rowSet": [
                [1628369, "Tatum, Jayson", "Jayson Tatum", 1, 1610612738],
                [1626157, "Towns, Karl-Anthony", "Karl-Anthony Towns", 1, 1610612752],
                [201566, "Westbrook, Russell", "Russell Westbrook", 1, 0]
            ]
        }]}"#;
        let source = CannedSource::default().with("commonallplayers", body);
        let db = store_with_teams(&source);
        let ingestor = Ingestor::new(&source, &db);

        assert_eq!(ingestor.sync_players("2024-25").unwrap(), 3);
        assert_eq!(ingestor.update_player_teams("2024-25").unwrap(), 2);
        // Already assigned
        assert_eq!(ingestor.update_player_teams("2024-25").unwrap(), 0);

        let tatum = db.get_player(PlayerId(1628369)).unwrap().unwrap();
        assert_eq!(tatum.team_id, Some(CELTICS));
        assert_eq!(tatum.last_name.as_deref(), Some("Tatum"));
        assert_eq!(db.get_player(PlayerId(201566)).unwrap().unwrap().team_id, None);
    }

    #[test]
    fn test_update_team_metrics() {
        let db = alternating_season();
        let source = CannedSource::default();
        let date = NaiveDate::from_ymd_opt(2024, 11, 10).unwrap();

        let stored = Ingestor::new(&source, &db)
            .update_team_metrics(date, &FeatureConfig::default())
            .unwrap();
        // Team 3 has not played
        assert_eq!(stored, 2);

        let metrics = db.latest_team_metrics(TeamId(1)).unwrap().unwrap();
        assert_eq!(metrics.date, date);
        assert_eq!(metrics.last_10_wins, 3);
        assert_eq!(metrics.rest_days, Some(4));
        assert!((metrics.points_scored_avg - 96.0).abs() < 1e-9);
        assert!(db.latest_team_metrics(TeamId(3)).unwrap().is_none());
    }

    #[test]
    fn test_season_label() {
        assert_eq!(season_label("2024"), "2024-25");
        assert_eq!(season_label("1999"), "1999-00");
        assert_eq!(season_label("2024-25"), "2024-25");
    }
}
