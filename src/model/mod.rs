//! Regression models
//!
//! - StandardScaler: per-column standardisation fitted on training rows
//! - RegressionTree: depth-limited second-order tree
//! - GradientBoostedRegressor: squared-error boosting over trees

pub mod boosting;
pub mod scaler;
pub mod tree;

pub use boosting::{BoostingParams, GradientBoostedRegressor};
pub use scaler::StandardScaler;
pub use tree::{RegressionTree, TreeParams};
