//! Evaluation metrics for the winner and total models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Held-out evaluation of the home-win model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WinnerMetrics {
    pub samples: usize,
    pub r2: f64,
    /// Share of games where the rounded prediction matches the outcome
    pub accuracy: f64,
}

impl WinnerMetrics {
    pub fn evaluate(predictions: &[f64], targets: &[f64]) -> Self {
        WinnerMetrics {
            samples: targets.len(),
            r2: r2_score(predictions, targets),
            accuracy: rounded_accuracy(predictions, targets),
        }
    }
}

impl fmt::Display for WinnerMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R²: {:.4} | Acc: {:.2}% | n={}",
            self.r2,
            self.accuracy * 100.0,
            self.samples
        )
    }
}

/// Held-out evaluation of the total points model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalMetrics {
    pub samples: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl TotalMetrics {
    pub fn evaluate(predictions: &[f64], targets: &[f64]) -> Self {
        TotalMetrics {
            samples: targets.len(),
            rmse: rmse(predictions, targets),
            mae: mae(predictions, targets),
            r2: r2_score(predictions, targets),
        }
    }
}

impl fmt::Display for TotalMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RMSE: {:.2} | MAE: {:.2} | R²: {:.4} | n={}",
            self.rmse, self.mae, self.r2, self.samples
        )
    }
}

/// Coefficient of determination; 0 when the targets are constant
pub fn r2_score(predictions: &[f64], targets: &[f64]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    let ss_tot: f64 = targets.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (t - p).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}

pub fn rmse(predictions: &[f64], targets: &[f64]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let mse = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / targets.len() as f64;
    mse.sqrt()
}

pub fn mae(predictions: &[f64], targets: &[f64]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).abs())
        .sum::<f64>()
        / targets.len() as f64
}

/// Accuracy of predictions clamped to [0, 1] and rounded to a class
pub fn rounded_accuracy(predictions: &[f64], targets: &[f64]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let correct = predictions
        .iter()
        .zip(targets)
        .filter(|(p, t)| (p.clamp(0.0, 1.0).round() - **t).abs() < 0.5)
        .count();
    correct as f64 / targets.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regression_metrics() {
        let targets = [200.0, 210.0, 220.0, 230.0];
        let predictions = [202.0, 208.0, 224.0, 230.0];
        assert!((mae(&predictions, &targets) - 2.0).abs() < 1e-12);
        assert!((rmse(&predictions, &targets) - 6.0f64.sqrt()).abs() < 1e-12);
        // ss_res = 24, ss_tot = 500
        assert!((r2_score(&predictions, &targets) - (1.0 - 24.0 / 500.0)).abs() < 1e-12);
        assert_eq!(r2_score(&predictions, &targets), TotalMetrics::evaluate(&predictions, &targets).r2);
    }

    #[test]
    fn test_rounded_accuracy() {
        let targets = [1.0, 0.0, 1.0, 0.0];
        let predictions = [0.7, 0.2, 1.4, 0.55];
        assert!((rounded_accuracy(&predictions, &targets) - 0.75).abs() < 1e-12);
        let m = WinnerMetrics::evaluate(&predictions, &targets);
        assert_eq!(m.samples, 4);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(r2_score(&[], &[]), 0.0);
        assert_eq!(r2_score(&[1.0, 2.0], &[1.0, 1.0]), 0.0);
        assert_eq!(rounded_accuracy(&[], &[]), 0.0);
        assert_eq!(rmse(&[], &[]), 0.0);
    }
}
