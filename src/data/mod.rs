//! Data ingestion and storage
//!
//! Stats API access, the SQLite store, ingestion jobs and the training dataset.

pub mod api;
pub mod database;
pub mod dataset;
pub mod ingest;

pub use database::Database;
pub use dataset::GameDataset;
pub use ingest::Ingestor;
