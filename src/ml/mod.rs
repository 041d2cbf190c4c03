//! Machine learning helpers for training and inference.
//!
//! These are the building blocks of the churn training pipeline: a CART
//! classifier with JSON export, SMOTE oversampling, stratified splitting and
//! evaluation metrics.

pub mod decision_tree;
pub mod metrics;
pub mod smote;
pub mod split;
