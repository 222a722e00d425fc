//! Fits the winner and total points models and persists them as one bundle

use crate::data::GameDataset;
use crate::features::{FeatureColumn, GameFeatures};
use crate::model::{BoostingParams, GradientBoostedRegressor, StandardScaler};
use crate::training::metrics::{TotalMetrics, WinnerMetrics};
use crate::training::split::TrainTestSplit;
use crate::{HoopsError, Result, TrainingConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything prediction needs: both models, the scaler fitted on the
/// training rows and the feature columns in input order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub winner_model: GradientBoostedRegressor,
    pub total_model: GradientBoostedRegressor,
    pub scaler: StandardScaler,
    pub features: Vec<String>,
    pub winner_metrics: WinnerMetrics,
    pub total_metrics: TotalMetrics,
    pub params: BoostingParams,
    pub train_samples: usize,
    pub test_samples: usize,
    pub trained_at: DateTime<Utc>,
}

/// Raw model outputs for one matchup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOutput {
    /// Clamped to [0, 1]
    pub home_win_probability: f64,
    pub total_points: f64,
}

impl ModelBundle {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        log::info!("Saved models to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HoopsError::NoModel);
        }
        let json = std::fs::read_to_string(path)?;
        let bundle: ModelBundle = serde_json::from_str(&json)?;
        if bundle.scaler.n_features() != bundle.features.len() {
            return Err(HoopsError::Model(format!(
                "bundle has {} features but the scaler expects {}",
                bundle.features.len(),
                bundle.scaler.n_features()
            )));
        }
        Ok(bundle)
    }

    pub fn feature_columns(&self) -> Result<Vec<FeatureColumn>> {
        FeatureColumn::parse_list(&self.features)
    }

    pub fn predict(&self, features: &GameFeatures) -> Result<ModelOutput> {
        let columns = self.feature_columns()?;
        let row = self.scaler.transform_row(&features.vector(&columns));
        Ok(ModelOutput {
            home_win_probability: self.winner_model.predict_row(&row).clamp(0.0, 1.0),
            total_points: self.total_model.predict_row(&row),
        })
    }

    /// Feature names paired with importance, highest first
    pub fn winner_importance(&self) -> Vec<(String, f64)> {
        ranked_importance(&self.features, self.winner_model.feature_importance())
    }

    pub fn total_importance(&self) -> Vec<(String, f64)> {
        ranked_importance(&self.features, self.total_model.feature_importance())
    }
}

fn ranked_importance(names: &[String], importance: &[f64]) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = names
        .iter()
        .cloned()
        .zip(importance.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Trains both models on a shared train/test split
pub struct Trainer<'a> {
    config: &'a TrainingConfig,
}

impl<'a> Trainer<'a> {
    pub fn new(config: &'a TrainingConfig) -> Self {
        Trainer { config }
    }

    pub fn train(&self, dataset: &GameDataset) -> Result<ModelBundle> {
        if dataset.len() < self.config.min_samples {
            return Err(HoopsError::InsufficientData {
                samples: dataset.len(),
                required: self.config.min_samples,
            });
        }

        let columns = FeatureColumn::parse_list(&self.config.features)?;
        if columns.is_empty() {
            return Err(HoopsError::Config("no training features configured".to_string()));
        }
        let params = BoostingParams::from(self.config);

        let x = dataset.matrix(&columns);
        let winners = dataset.home_win_targets();
        let totals = dataset.total_points_targets();

        let split = TrainTestSplit::new(dataset.len(), self.config.test_size, params.random_state)?;
        let x_train = TrainTestSplit::select(&x, &split.train);
        let x_test = TrainTestSplit::select(&x, &split.test);

        let scaler = StandardScaler::fit(&x_train)?;
        let x_train = scaler.transform(&x_train);
        let x_test = scaler.transform(&x_test);

        log::info!(
            "Training on {} games, testing on {} ({} features)",
            split.train.len(),
            split.test.len(),
            columns.len()
        );

        let winner_model = GradientBoostedRegressor::fit(
            &x_train,
            &TrainTestSplit::select(&winners, &split.train),
            &params,
        )?;
        let winner_metrics = WinnerMetrics::evaluate(
            &winner_model.predict(&x_test),
            &TrainTestSplit::select(&winners, &split.test),
        );
        log::info!("Winner model: {}", winner_metrics);

        let total_model = GradientBoostedRegressor::fit(
            &x_train,
            &TrainTestSplit::select(&totals, &split.train),
            &params,
        )?;
        let total_metrics = TotalMetrics::evaluate(
            &total_model.predict(&x_test),
            &TrainTestSplit::select(&totals, &split.test),
        );
        log::info!("Total points model: {}", total_metrics);

        Ok(ModelBundle {
            winner_model,
            total_model,
            scaler,
            features: columns.iter().map(|c| c.name().to_string()).collect(),
            winner_metrics,
            total_metrics,
            params,
            train_samples: split.train.len(),
            test_samples: split.test.len(),
            trained_at: Utc::now(),
        })
    }
}
