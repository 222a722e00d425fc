//! Prediction and inference
//!
//! Load the trained bundle, predict matchups and score past predictions.

pub mod inference;

pub use inference::{
    format_prediction, HistoryEntry, HistoryReport, HistorySummary, Predictor, UpcomingPrediction,
    MAX_WINDOW_DAYS,
};
