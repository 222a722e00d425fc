//! Training dataset of per-game feature rows

use crate::data::Database;
use crate::features::{build_game_features, FeatureColumn, GameFeatures};
use crate::{FeatureConfig, Result};
use chrono::NaiveDate;

/// Completed games with their point-in-time features, oldest first
#[derive(Debug, Clone, Default)]
pub struct GameDataset {
    pub samples: Vec<GameFeatures>,
}

/// Headline numbers for `features analyze`
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub samples: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub home_win_rate: f64,
    pub avg_total_points: f64,
}

impl GameDataset {
    /// Build from the store using the feature query
    pub fn from_database(db: &Database, config: &FeatureConfig) -> Result<Self> {
        let samples = build_game_features(db, config)?
            .into_iter()
            .filter(|s| s.home_win().is_some())
            .collect();
        Ok(GameDataset { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Row-major feature matrix for the given columns
    pub fn matrix(&self, columns: &[FeatureColumn]) -> Vec<Vec<f64>> {
        self.samples.iter().map(|s| s.vector(columns)).collect()
    }

    /// 1.0 for a home win, 0.0 otherwise
    pub fn home_win_targets(&self) -> Vec<f64> {
        self.samples
            .iter()
            .map(|s| s.home_win().unwrap_or(0.0))
            .collect()
    }

    /// Combined final score
    pub fn total_points_targets(&self) -> Vec<f64> {
        self.samples
            .iter()
            .map(|s| s.total_points().unwrap_or(0.0))
            .collect()
    }

    pub fn summary(&self) -> DatasetSummary {
        let n = self.samples.len();
        let mean = |values: Vec<f64>| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        DatasetSummary {
            samples: n,
            first_date: self.samples.iter().map(|s| s.date).min(),
            last_date: self.samples.iter().map(|s| s.date).max(),
            home_win_rate: mean(self.home_win_targets()),
            avg_total_points: mean(self.total_points_targets()),
        }
    }

    /// Persist the summary columns of every sample into `game_features`
    pub fn store_summaries(&self, db: &Database) -> Result<usize> {
        let tx = db.transaction()?;
        let mut stored = 0;
        for row in self.samples.iter().filter_map(GameFeatures::summary_row) {
            db.upsert_game_features(&row)?;
            stored += 1;
        }
        tx.commit()?;
        Ok(stored)
    }
}
