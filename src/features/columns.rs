//! Named model input columns

use super::GameFeatures;
use crate::{HoopsError, Result};
use std::fmt;
use std::str::FromStr;

/// A single numeric column of the game feature table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    HomeShortWins,
    HomeFormWins,
    HomePointsAvg,
    HomeWinPct,
    AwayShortWins,
    AwayFormWins,
    AwayPointsAvg,
    AwayWinPct,
    HomeOffRtg,
    HomePace,
    HomeTsPct,
    AwayOffRtg,
    AwayPace,
    AwayTsPct,
    HomeRestDays,
    AwayRestDays,
    LeagueAvgPace,
    LeagueAvgPoints,
    LeagueAvgTs,
    H2hGames,
    H2hHomeWins,
    H2hHomeWinPct,
    PaceDiff,
    OffRtgDiff,
    TsPctDiff,
    HomePaceVsAvg,
    AwayPaceVsAvg,
}

impl FeatureColumn {
    /// Every column, in table order
    pub const ALL: [FeatureColumn; 27] = [
        FeatureColumn::HomeShortWins,
        FeatureColumn::HomeFormWins,
        FeatureColumn::HomePointsAvg,
        FeatureColumn::HomeWinPct,
        FeatureColumn::AwayShortWins,
        FeatureColumn::AwayFormWins,
        FeatureColumn::AwayPointsAvg,
        FeatureColumn::AwayWinPct,
        FeatureColumn::HomeOffRtg,
        FeatureColumn::HomePace,
        FeatureColumn::HomeTsPct,
        FeatureColumn::AwayOffRtg,
        FeatureColumn::AwayPace,
        FeatureColumn::AwayTsPct,
        FeatureColumn::HomeRestDays,
        FeatureColumn::AwayRestDays,
        FeatureColumn::LeagueAvgPace,
        FeatureColumn::LeagueAvgPoints,
        FeatureColumn::LeagueAvgTs,
        FeatureColumn::H2hGames,
        FeatureColumn::H2hHomeWins,
        FeatureColumn::H2hHomeWinPct,
        FeatureColumn::PaceDiff,
        FeatureColumn::OffRtgDiff,
        FeatureColumn::TsPctDiff,
        FeatureColumn::HomePaceVsAvg,
        FeatureColumn::AwayPaceVsAvg,
    ];

    /// Default model inputs
    pub const PRIMARY: [FeatureColumn; 6] = [
        FeatureColumn::OffRtgDiff,
        FeatureColumn::TsPctDiff,
        FeatureColumn::H2hHomeWinPct,
        FeatureColumn::PaceDiff,
        FeatureColumn::AwayOffRtg,
        FeatureColumn::HomeOffRtg,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::HomeShortWins => "home_l5_wins",
            FeatureColumn::HomeFormWins => "home_l10_wins",
            FeatureColumn::HomePointsAvg => "home_pts_avg",
            FeatureColumn::HomeWinPct => "home_win_pct",
            FeatureColumn::AwayShortWins => "away_l5_wins",
            FeatureColumn::AwayFormWins => "away_l10_wins",
            FeatureColumn::AwayPointsAvg => "away_pts_avg",
            FeatureColumn::AwayWinPct => "away_win_pct",
            FeatureColumn::HomeOffRtg => "home_off_rtg",
            FeatureColumn::HomePace => "home_pace",
            FeatureColumn::HomeTsPct => "home_ts_pct",
            FeatureColumn::AwayOffRtg => "away_off_rtg",
            FeatureColumn::AwayPace => "away_pace",
            FeatureColumn::AwayTsPct => "away_ts_pct",
            FeatureColumn::HomeRestDays => "home_rest_days",
            FeatureColumn::AwayRestDays => "away_rest_days",
            FeatureColumn::LeagueAvgPace => "league_avg_pace",
            FeatureColumn::LeagueAvgPoints => "league_avg_points",
            FeatureColumn::LeagueAvgTs => "league_avg_ts",
            FeatureColumn::H2hGames => "h2h_games",
            FeatureColumn::H2hHomeWins => "h2h_home_wins",
            FeatureColumn::H2hHomeWinPct => "h2h_home_win_pct",
            FeatureColumn::PaceDiff => "pace_diff",
            FeatureColumn::OffRtgDiff => "off_rtg_diff",
            FeatureColumn::TsPctDiff => "ts_pct_diff",
            FeatureColumn::HomePaceVsAvg => "home_pace_vs_avg",
            FeatureColumn::AwayPaceVsAvg => "away_pace_vs_avg",
        }
    }

    /// Read this column from a game's features
    pub fn value(&self, f: &GameFeatures) -> f64 {
        match self {
            FeatureColumn::HomeShortWins => f.home.short_wins as f64,
            FeatureColumn::HomeFormWins => f.home.form_wins as f64,
            FeatureColumn::HomePointsAvg => f.home.points_avg,
            // Home side at home, away side on the road
            FeatureColumn::HomeWinPct => f.home.home_win_pct,
            FeatureColumn::AwayShortWins => f.away.short_wins as f64,
            FeatureColumn::AwayFormWins => f.away.form_wins as f64,
            FeatureColumn::AwayPointsAvg => f.away.points_avg,
            FeatureColumn::AwayWinPct => f.away.away_win_pct,
            FeatureColumn::HomeOffRtg => f.home.off_rtg,
            FeatureColumn::HomePace => f.home.pace,
            FeatureColumn::HomeTsPct => f.home.ts_pct,
            FeatureColumn::AwayOffRtg => f.away.off_rtg,
            FeatureColumn::AwayPace => f.away.pace,
            FeatureColumn::AwayTsPct => f.away.ts_pct,
            FeatureColumn::HomeRestDays => f.home.rest_days.unwrap_or(0.0),
            FeatureColumn::AwayRestDays => f.away.rest_days.unwrap_or(0.0),
            FeatureColumn::LeagueAvgPace => f.league.avg_pace,
            FeatureColumn::LeagueAvgPoints => f.league.avg_points,
            FeatureColumn::LeagueAvgTs => f.league.avg_ts,
            FeatureColumn::H2hGames => f.h2h.games as f64,
            FeatureColumn::H2hHomeWins => f.h2h.home_wins as f64,
            FeatureColumn::H2hHomeWinPct => f.h2h.home_win_pct(),
            FeatureColumn::PaceDiff => f.pace_diff(),
            FeatureColumn::OffRtgDiff => f.off_rtg_diff(),
            FeatureColumn::TsPctDiff => f.ts_pct_diff(),
            FeatureColumn::HomePaceVsAvg => f.home_pace_vs_avg(),
            FeatureColumn::AwayPaceVsAvg => f.away_pace_vs_avg(),
        }
    }

    /// Parse a list of column names
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<FeatureColumn>> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureColumn {
    type Err = HoopsError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        FeatureColumn::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| HoopsError::Config(format!("unknown feature column: {}", s)))
    }
}
