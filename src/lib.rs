//! Churn prediction: feature contract, validation, training and serving.
/// Feature columns, range table and the wire record.
pub mod features;
/// Field-range validation of feature records.
pub mod validation;
/// Model training and evaluation building blocks.
pub mod ml;
/// On-disk model artifact.
pub mod artifact;
/// Validated prediction over a loaded artifact.
pub mod inference;
/// Raw training data loading and preprocessing.
pub mod dataset;
/// End-to-end training pipeline.
pub mod training;
/// TOML configuration for the server.
pub mod config;
/// Application directory resolution.
pub mod app_dirs;
/// Tracing subscriber setup.
pub mod logging;
/// Blocking HTTP client helpers.
pub mod http_client;
/// HTTP prediction API.
pub mod server;
