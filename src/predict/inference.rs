//! Model inference for predictions

use crate::data::Database;
use crate::features::matchup_features;
use crate::training::ModelBundle;
use crate::{
    Config, FeatureConfig, GameId, GameRecord, HoopsError, Prediction, Result, Team, TeamId,
};
use chrono::{Days, NaiveDate, NaiveTime};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Widest date window a schedule or history query may cover
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Predictor for making game predictions from a trained bundle
pub struct Predictor {
    bundle: ModelBundle,
    db: Database,
    features: FeatureConfig,
}

/// A scheduled game with its prediction, ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingPrediction {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub home_team: String,
    pub away_team: String,
    pub predicted_winner: String,
    /// Percentage for the predicted winner
    pub win_probability: f64,
    pub predicted_total: f64,
}

/// A completed game scored against what the model would have said
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u16,
    pub away_score: u16,
    pub predicted_winner: String,
    pub actual_winner: String,
    pub prediction_correct: bool,
    pub win_probability: f64,
    pub predicted_total: f64,
    pub actual_total: u32,
    pub total_difference: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySummary {
    pub total_games: usize,
    pub correct_predictions: usize,
    pub incorrect_predictions: usize,
    pub accuracy_percentage: f64,
    pub avg_points_diff: f64,
}

impl HistorySummary {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        let total_games = entries.len();
        if total_games == 0 {
            return HistorySummary::default();
        }
        let correct = entries.iter().filter(|e| e.prediction_correct).count();
        let diff: f64 = entries.iter().map(|e| e.total_difference).sum();
        HistorySummary {
            total_games,
            correct_predictions: correct,
            incorrect_predictions: total_games - correct,
            accuracy_percentage: correct as f64 / total_games as f64 * 100.0,
            avg_points_diff: diff / total_games as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub games: Vec<HistoryEntry>,
    pub summary: HistorySummary,
}

impl Predictor {
    pub fn new(bundle: ModelBundle, db: Database, features: FeatureConfig) -> Self {
        Predictor {
            bundle,
            db,
            features,
        }
    }

    /// Load the model bundle and open the database named in the config
    pub fn from_config(config: &Config) -> Result<Self> {
        let bundle = ModelBundle::load(Path::new(&config.data.model_path))?;
        let db = Database::open(&config.data.database_path)?;
        Ok(Predictor::new(bundle, db, config.features.clone()))
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Predict a matchup played on `date` from games before that date
    pub fn predict(&self, home: TeamId, away: TeamId, date: NaiveDate) -> Result<Prediction> {
        let features = matchup_features(&self.db, home, away, date, &self.features)?;
        let output = self.bundle.predict(&features)?;
        Ok(Prediction {
            game_id: None,
            date,
            home_team: home,
            away_team: away,
            home_win_prob: output.home_win_probability,
            predicted_total: output.total_points,
        })
    }

    /// Resolve both teams by name, abbreviation or nickname, then predict
    pub fn predict_by_name(
        &self,
        home: &str,
        away: &str,
        date: NaiveDate,
    ) -> Result<(Team, Team, Prediction)> {
        let home_team = self.resolve_team(home)?;
        let away_team = self.resolve_team(away)?;
        let prediction = self.predict(home_team.id, away_team.id, date)?;
        Ok((home_team, away_team, prediction))
    }

    fn resolve_team(&self, name: &str) -> Result<Team> {
        self.db
            .find_team_by_name(name)?
            .ok_or_else(|| HoopsError::UnknownTeam(name.to_string()))
    }

    /// Predict every scheduled game from `today` over the next `days` days
    /// and store the predictions
    pub fn predict_upcoming(&self, today: NaiveDate, days: i64) -> Result<Vec<UpcomingPrediction>> {
        let end = offset_date(today, days.max(1) - 1)?;
        let names = self.team_names()?;
        let mut predictions = Vec::new();

        for game in self.db.get_upcoming_games(today, end)? {
            let mut prediction = match self.predict(game.home_team, game.away_team, game.date) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("Skipping {}: {}", game.game_id, e);
                    continue;
                }
            };
            prediction.game_id = Some(game.game_id.clone());
            self.db.upsert_prediction(&game.game_id, &prediction)?;

            predictions.push(UpcomingPrediction {
                game_id: game.game_id,
                date: game.date,
                time: game.time,
                home_team: team_name(&names, game.home_team),
                away_team: team_name(&names, game.away_team),
                predicted_winner: team_name(&names, prediction.predicted_winner()),
                win_probability: prediction.win_probability_pct(),
                predicted_total: prediction.predicted_total,
            });
        }

        log::info!("Predicted {} upcoming games", predictions.len());
        Ok(predictions)
    }

    /// Score the model against games completed in the `days` days up to `today`
    pub fn evaluate_history(&self, today: NaiveDate, days: i64) -> Result<HistoryReport> {
        let start = offset_date(today, -days.max(0))?;
        let names = self.team_names()?;
        let mut games = Vec::new();

        for game in self.db.get_completed_games_in_range(start, today)? {
            match self.history_entry(&game, &names) {
                Ok(Some(entry)) => games.push(entry),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping {}: {}", game.game_id, e),
            }
        }

        let summary = HistorySummary::from_entries(&games);
        Ok(HistoryReport {
            start,
            end: today,
            games,
            summary,
        })
    }

    fn history_entry(
        &self,
        game: &GameRecord,
        names: &HashMap<TeamId, String>,
    ) -> Result<Option<HistoryEntry>> {
        let (Some(home_score), Some(away_score), Some(actual_winner)) =
            (game.home_score, game.away_score, game.winner())
        else {
            return Ok(None);
        };
        let prediction = self.predict(game.home_team, game.away_team, game.date)?;
        let actual_total = u32::from(home_score) + u32::from(away_score);

        Ok(Some(HistoryEntry {
            game_id: game.game_id.clone(),
            date: game.date,
            home_team: team_name(names, game.home_team),
            away_team: team_name(names, game.away_team),
            home_score,
            away_score,
            predicted_winner: team_name(names, prediction.predicted_winner()),
            actual_winner: team_name(names, actual_winner),
            prediction_correct: prediction.predicted_winner() == actual_winner,
            win_probability: prediction.win_probability_pct(),
            predicted_total: prediction.predicted_total,
            actual_total,
            total_difference: (prediction.predicted_total - f64::from(actual_total)).abs(),
        }))
    }

    /// Fill in outcomes for stored predictions whose game has finished
    pub fn reconcile(&self) -> Result<usize> {
        let mut reconciled = 0;
        for stored in self.db.unreconciled_predictions()? {
            let Some(game) = self.db.get_game(&stored.game_id)? else {
                continue;
            };
            let (Some(winner), Some(total)) = (game.winner(), game.total_points()) else {
                continue;
            };
            let correct = stored.predicted_winner == Some(winner);
            let difference = stored
                .predicted_total
                .map(|p| (p - f64::from(total)).abs())
                .unwrap_or(0.0);
            self.db
                .record_prediction_outcome(&stored.game_id, winner, correct, difference)?;
            reconciled += 1;
        }
        log::info!("Reconciled {} predictions", reconciled);
        Ok(reconciled)
    }

    fn team_names(&self) -> Result<HashMap<TeamId, String>> {
        Ok(self
            .db
            .get_all_teams()?
            .into_iter()
            .map(|t| (t.id, t.full_name))
            .collect())
    }
}

/// Terminal block for a single matchup prediction
pub fn format_prediction(prediction: &Prediction, home: &Team, away: &Team) -> String {
    let winner = if prediction.predicted_winner() == home.id {
        home
    } else {
        away
    };
    let mut out = String::new();
    out.push_str(&format!(
        "{} @ {} ({})\n",
        away.full_name, home.full_name, prediction.date
    ));
    out.push_str("───────────────────────────────\n");
    out.push_str(&format!(
        "  Home win probability: {:.1}%\n",
        prediction.home_win_prob * 100.0
    ));
    out.push_str(&format!(
        "  Predicted winner:     {} ({:.1}%)\n",
        winner.full_name,
        prediction.win_probability_pct()
    ));
    out.push_str(&format!(
        "  Predicted total:      {:.1}\n",
        prediction.predicted_total
    ));
    out
}

/// Shift `date` by a signed day count, failing outside the calendar range
fn offset_date(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    let step = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(step)
    } else {
        date.checked_sub_days(step)
    };
    shifted.ok_or_else(|| HoopsError::Config(format!("date window of {} days is out of range", days)))
}

fn team_name(names: &HashMap<TeamId, String>, id: TeamId) -> String {
    names.get(&id).cloned().unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::form::tests::alternating_season;
    use crate::training::trainer::tests::{quick_config, synthetic_dataset};
    use crate::training::Trainer;
    use crate::UpcomingGame;

    fn predictor() -> Predictor {
        let bundle = Trainer::new(&quick_config())
            .train(&synthetic_dataset(60))
            .unwrap();
        Predictor::new(bundle, alternating_season(), FeatureConfig::default())
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_predict_matchup() {
        let predictor = predictor();
        let p = predictor
            .predict(TeamId(1), TeamId(2), date("2024-11-10"))
            .unwrap();
        assert!((0.0..=1.0).contains(&p.home_win_prob));
        assert!(p.predicted_total > 0.0);
        assert!(p.win_probability_pct() >= 50.0 && p.win_probability_pct() <= 99.9);
    }

    #[test]
    fn test_predict_by_name() {
        let predictor = predictor();
        let (home, away, _) = predictor
            .predict_by_name("bos", "Knicks", date("2024-11-10"))
            .unwrap();
        assert_eq!(home.id, TeamId(1));
        assert_eq!(away.id, TeamId(2));

        let err = predictor
            .predict_by_name("Sonics", "Knicks", date("2024-11-10"))
            .unwrap_err();
        assert!(matches!(err, HoopsError::UnknownTeam(_)));
    }

    #[test]
    fn test_predict_upcoming_persists() {
        let predictor = predictor();
        predictor
            .database()
            .upsert_upcoming_game(&UpcomingGame {
                game_id: GameId::from("0022400100"),
                date: date("2024-11-11"),
                time: None,
                home_team: TeamId(2),
                away_team: TeamId(3),
                arena: None,
                tv_channel: None,
                status: "7:30 pm ET".to_string(),
            })
            .unwrap();

        let upcoming = predictor.predict_upcoming(date("2024-11-10"), 3).unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].home_team, "New York Knicks");
        // Miami has no history and falls back to league defaults
        assert_eq!(upcoming[0].away_team, "Miami Heat");
        assert_eq!(predictor.database().get_stats().unwrap().prediction_count, 1);

        assert!(predictor.predict_upcoming(date("2024-11-12"), 3).unwrap().is_empty());
    }

    #[test]
    fn test_evaluate_history() {
        let predictor = predictor();
        let report = predictor.evaluate_history(date("2024-11-07"), 7).unwrap();
        assert_eq!(report.start, date("2024-10-31"));
        assert_eq!(report.games.len(), 6);

        let s = &report.summary;
        assert_eq!(s.total_games, 6);
        assert_eq!(s.correct_predictions + s.incorrect_predictions, 6);
        let first = &report.games[0];
        assert_eq!(first.actual_winner, "Boston Celtics");
        assert_eq!(first.actual_total, 190);
        assert!((first.total_difference - (first.predicted_total - 190.0).abs()).abs() < 1e-9);

        let empty = predictor.evaluate_history(date("2025-06-01"), 7).unwrap();
        assert_eq!(empty.summary, HistorySummary::default());
    }

    #[test]
    fn test_window_out_of_range() {
        let predictor = predictor();
        let err = predictor
            .evaluate_history(date("2024-11-07"), i64::MAX / 2)
            .unwrap_err();
        assert!(matches!(err, HoopsError::Config(_)));
        let err = predictor
            .predict_upcoming(date("2024-11-07"), i64::MAX)
            .unwrap_err();
        assert!(matches!(err, HoopsError::Config(_)));

        assert_eq!(
            offset_date(date("2024-11-07"), -7).unwrap(),
            date("2024-10-31")
        );
        assert_eq!(
            offset_date(date("2024-11-07"), 2).unwrap(),
            date("2024-11-09")
        );
    }

    #[test]
    fn test_reconcile() {
        let predictor = predictor();
        let game_id = GameId::from("0022400004");
        let mut p = predictor
            .predict(TeamId(1), TeamId(2), date("2024-11-05"))
            .unwrap();
        p.game_id = Some(game_id.clone());
        predictor.database().upsert_prediction(&game_id, &p).unwrap();

        assert_eq!(predictor.reconcile().unwrap(), 1);
        assert_eq!(predictor.reconcile().unwrap(), 0);
    }

    #[test]
    fn test_format_prediction() {
        use crate::data::database::tests::team;
        let prediction = Prediction {
            game_id: None,
            date: date("2024-11-10"),
            home_team: TeamId(1),
            away_team: TeamId(2),
            home_win_prob: 0.25,
            predicted_total: 214.56,
        };
        let text = format_prediction(
            &prediction,
            &team(1, "Boston Celtics", "BOS"),
            &team(2, "New York Knicks", "NYK"),
        );
        assert!(text.starts_with("New York Knicks @ Boston Celtics (2024-11-10)"));
        assert!(text.contains("Home win probability: 25.0%"));
        assert!(text.contains("Predicted winner:     New York Knicks (75.0%)"));
        assert!(text.contains("Predicted total:      214.6"));
    }

    #[test]
    fn test_summary_counts() {
        let entry = |correct: bool, diff: f64| HistoryEntry {
            game_id: GameId::from("1"),
            date: date("2024-11-01"),
            home_team: "A".into(),
            away_team: "B".into(),
            home_score: 100,
            away_score: 90,
            predicted_winner: "A".into(),
            actual_winner: "A".into(),
            prediction_correct: correct,
            win_probability: 60.0,
            predicted_total: 190.0,
            actual_total: 190,
            total_difference: diff,
        };
        let s = HistorySummary::from_entries(&[entry(true, 4.0), entry(false, 8.0)]);
        assert_eq!(s.total_games, 2);
        assert_eq!(s.correct_predictions, 1);
        assert_eq!(s.incorrect_predictions, 1);
        assert!((s.accuracy_percentage - 50.0).abs() < 1e-9);
        assert!((s.avg_points_diff - 6.0).abs() < 1e-9);
    }
}
