//! Gradient boosted trees for squared-error regression

use super::tree::{RegressionTree, TreeParams};
use crate::{HoopsError, Result, TrainingConfig};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Boosting hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Fraction of rows sampled for each tree
    pub subsample: f64,
    /// Fraction of columns sampled for each tree
    pub colsample_bytree: f64,
    pub reg_lambda: f64,
    pub random_state: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        BoostingParams::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for BoostingParams {
    fn from(config: &TrainingConfig) -> Self {
        BoostingParams {
            n_estimators: config.n_estimators,
            learning_rate: config.learning_rate,
            max_depth: config.max_depth,
            subsample: config.subsample,
            colsample_bytree: config.colsample_bytree,
            reg_lambda: config.reg_lambda,
            random_state: config.random_state,
        }
    }
}

impl BoostingParams {
    fn validate(&self) -> Result<()> {
        let fraction = |name: &str, v: f64| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(HoopsError::Model(format!("{} must be in (0, 1], got {}", name, v)))
            }
        };
        fraction("subsample", self.subsample)?;
        fraction("colsample_bytree", self.colsample_bytree)?;
        if self.learning_rate <= 0.0 {
            return Err(HoopsError::Model("learning_rate must be positive".to_string()));
        }
        if self.reg_lambda < 0.0 {
            return Err(HoopsError::Model("reg_lambda must not be negative".to_string()));
        }
        Ok(())
    }
}

/// Additive ensemble of regression trees starting from the target mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    pub params: BoostingParams,
    pub base_score: f64,
    pub n_features: usize,
    trees: Vec<RegressionTree>,
    /// Split gain per feature, normalised to sum to 1
    feature_importance: Vec<f64>,
}

impl GradientBoostedRegressor {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &BoostingParams) -> Result<Self> {
        params.validate()?;
        if x.is_empty() {
            return Err(HoopsError::Model("cannot fit on an empty dataset".to_string()));
        }
        if x.len() != y.len() {
            return Err(HoopsError::Model(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(HoopsError::Model("feature rows must share a non-zero width".to_string()));
        }

        let n = x.len();
        let base_score = y.iter().sum::<f64>() / n as f64;
        let row_count = ((params.subsample * n as f64).round() as usize).clamp(1, n);
        let col_count =
            ((params.colsample_bytree * n_features as f64).round() as usize).clamp(1, n_features);
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            reg_lambda: params.reg_lambda,
            ..TreeParams::default()
        };

        let mut rng = StdRng::seed_from_u64(params.random_state);
        let mut predictions = vec![base_score; n];
        let mut grad = vec![0.0; n];
        let hess = vec![1.0; n];
        let mut gains = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut all_rows: Vec<usize> = (0..n).collect();
        let mut all_cols: Vec<usize> = (0..n_features).collect();

        for round in 0..params.n_estimators {
            for i in 0..n {
                grad[i] = predictions[i] - y[i];
            }

            all_rows.shuffle(&mut rng);
            all_cols.shuffle(&mut rng);
            let rows = &all_rows[..row_count];
            let cols = &all_cols[..col_count];

            let tree = RegressionTree::fit(x, &grad, &hess, rows, cols, &tree_params, &mut gains);
            for (p, row) in predictions.iter_mut().zip(x) {
                *p += params.learning_rate * tree.predict_row(row);
            }

            if (round + 1) % 250 == 0 {
                log::debug!(
                    "Round {}: train RMSE {:.4}, last tree depth {}",
                    round + 1,
                    rmse(&predictions, y),
                    tree.depth()
                );
            }
            trees.push(tree);
        }

        let total_gain: f64 = gains.iter().sum();
        let feature_importance = if total_gain > 0.0 {
            gains.iter().map(|g| g / total_gain).collect()
        } else {
            gains
        };

        Ok(GradientBoostedRegressor {
            params: params.clone(),
            base_score,
            n_features,
            trees,
            feature_importance,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.base_score
            + self.params.learning_rate
                * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_importance(&self) -> &[f64] {
        &self.feature_importance
    }
}

fn rmse(predictions: &[f64], y: &[f64]) -> f64 {
    let sse: f64 = predictions.iter().zip(y).map(|(p, t)| (p - t).powi(2)).sum();
    (sse / y.len().max(1) as f64).sqrt()
}
