//! Model training
//!
//! Train/test splitting, fitting of both boosted models and held-out metrics.

pub mod metrics;
pub mod split;
pub mod trainer;

pub use metrics::{TotalMetrics, WinnerMetrics};
pub use split::TrainTestSplit;
pub use trainer::{ModelBundle, ModelOutput, Trainer};
