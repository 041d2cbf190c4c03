#![allow(dead_code)]

pub mod churn_env;
pub mod fixtures;
pub mod model;
