//! Request routing and JSON payloads for the prediction API.
//!
//! [`handle`] is transport-free: it maps a method, URL and body to a status
//! code and JSON body so every route can be exercised without a socket.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tiny_http::Method;

use crate::features::FeatureRecord;
use crate::inference::{InferenceService, PredictionError, PredictionResult};

/// Request limits enforced after the body has been read.
#[derive(Debug, Clone, Copy)]
pub struct RouteLimits {
    pub max_batch_len: usize,
}

/// Status and JSON body ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status: 200, body },
            Err(err) => Self::error(500, format!("Prediction failed: {err}")),
        }
    }

    /// `{"detail": "<message>"}` with the given status.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "detail": message.into() }),
        }
    }

    /// `{"detail": [messages...]}` with the given status.
    pub fn error_list(status: u16, messages: Vec<String>) -> Self {
        Self {
            status,
            body: json!({ "detail": messages }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub batch: Vec<FeatureRecord>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub churn_prediction: i64,
    pub churn_probability: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BatchItem {
    pub prediction: i64,
    pub probability: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
}

impl From<PredictionResult> for BatchItem {
    fn from(result: PredictionResult) -> Self {
        Self {
            prediction: result.label,
            probability: result.probability,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Health,
    Predict,
    PredictBatch,
}

impl Route {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "/health" => Some(Self::Health),
            "/predict" => Some(Self::Predict),
            "/predict_batch" => Some(Self::PredictBatch),
            _ => None,
        }
    }

    fn method(self) -> Method {
        match self {
            Self::Health => Method::Get,
            Self::Predict | Self::PredictBatch => Method::Post,
        }
    }
}

/// Route one request. The query string is ignored.
pub fn handle(
    service: &InferenceService,
    limits: &RouteLimits,
    method: &Method,
    url: &str,
    body: &[u8],
) -> ApiResponse {
    let path = url.split('?').next().unwrap_or(url);
    let Some(route) = Route::from_path(path) else {
        return ApiResponse::error(404, "Not Found");
    };
    if *method != route.method() {
        return ApiResponse::error(405, "Method Not Allowed");
    }
    match route {
        Route::Health => ApiResponse::ok(HealthResponse {
            status: "ok".to_string(),
            model_loaded: true,
        }),
        Route::Predict => predict(service, body),
        Route::PredictBatch => predict_batch(service, limits, body),
    }
}

fn predict(service: &InferenceService, body: &[u8]) -> ApiResponse {
    let record: FeatureRecord = match serde_json::from_slice(body) {
        Ok(record) => record,
        Err(err) => return ApiResponse::error_list(422, vec![err.to_string()]),
    };
    match service.predict_one(&record) {
        Ok(result) => ApiResponse::ok(PredictResponse {
            churn_prediction: result.label,
            churn_probability: result.probability,
        }),
        Err(err) => prediction_error(err),
    }
}

fn predict_batch(service: &InferenceService, limits: &RouteLimits, body: &[u8]) -> ApiResponse {
    let request: BatchRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(err) => return ApiResponse::error_list(422, vec![err.to_string()]),
    };
    if request.batch.len() > limits.max_batch_len {
        return ApiResponse::error_list(
            422,
            vec![format!(
                "batch has {} records; at most {} are accepted",
                request.batch.len(),
                limits.max_batch_len
            )],
        );
    }
    match service.predict_many(&request.batch) {
        Ok(results) => ApiResponse::ok(BatchResponse {
            results: results.into_iter().map(BatchItem::from).collect(),
        }),
        Err(err) => prediction_error(err),
    }
}

fn prediction_error(err: PredictionError) -> ApiResponse {
    match err {
        PredictionError::Validation(messages) => ApiResponse::error_list(400, messages),
        PredictionError::Inference(message) => {
            tracing::error!(error = %message, "Prediction failed");
            ApiResponse::error(500, format!("Prediction failed: {message}"))
        }
    }
}
