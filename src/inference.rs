//! Churn inference over the feature contract.
//!
//! An [`InferenceService`] owns one immutable classifier for the lifetime of
//! the process. It is `Send + Sync` and holds no mutable state, so a single
//! instance can be shared behind an `Arc` by every request thread.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::artifact::{ArtifactLoadError, ModelArtifact};
use crate::features::{FeatureRecord, feature_columns};
use crate::ml::decision_tree::{DecisionTreeModel, argmax};
use crate::validation::{BoundsPolicy, validate_with};

/// Positive (churn) class label.
pub const CHURN_LABEL: i64 = 1;

/// Probability tolerance before a model output counts as out of range.
const PROBABILITY_EPSILON: f64 = 1e-9;

/// Classifier seam used by the service.
pub trait Classifier: Send + Sync {
    /// Class labels in probability-column order.
    fn classes(&self) -> &[i64];

    /// Per-class probabilities for one feature vector.
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, String>;
}

impl Classifier for DecisionTreeModel {
    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, String> {
        let proba = DecisionTreeModel::predict_proba(self, features);
        if proba.is_empty() {
            return Err(format!(
                "decision tree did not reach a leaf for a {}-value vector",
                features.len()
            ));
        }
        Ok(proba)
    }
}

/// Outcome for one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Predicted class label (0 or 1).
    pub label: i64,
    /// Probability of churn, in `[0, 1]`.
    pub probability: f64,
}

/// Why a prediction call failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    /// One or more fields were outside their bounds. The model was not called.
    #[error("Invalid feature record: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// Unexpected failure while building the vector or calling the model.
    #[error("{0}")]
    Inference(String),
}

/// Loaded churn model plus the validation policy applied to every call.
pub struct InferenceService {
    classifier: Box<dyn Classifier>,
    columns: Vec<String>,
    policy: BoundsPolicy,
    positive_index: usize,
}

impl std::fmt::Debug for InferenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceService")
            .field("classes", &self.classifier.classes())
            .field("columns", &self.columns)
            .field("policy", &self.policy)
            .finish()
    }
}

impl InferenceService {
    /// Load the artifact at `path`. Any failure is fatal for serving.
    pub fn load(path: &Path, policy: BoundsPolicy) -> Result<Self, ArtifactLoadError> {
        let artifact = ModelArtifact::load_json(path)?;
        tracing::info!(
            path = %path.display(),
            nodes = artifact.model.nodes.len(),
            depth = artifact.model.depth(),
            "Loaded churn model artifact"
        );
        // `load_json` has already validated the artifact.
        let ModelArtifact { columns, model, .. } = artifact;
        Self::build(Box::new(model), columns, policy)
    }

    /// Build a service from an in-memory artifact.
    pub fn from_artifact(
        artifact: ModelArtifact,
        policy: BoundsPolicy,
    ) -> Result<Self, ArtifactLoadError> {
        artifact.validate()?;
        let ModelArtifact { columns, model, .. } = artifact;
        Self::build(Box::new(model), columns, policy)
    }

    /// Build a service around any classifier trained on the canonical columns.
    pub fn with_classifier(
        classifier: impl Classifier + 'static,
        policy: BoundsPolicy,
    ) -> Result<Self, ArtifactLoadError> {
        Self::build(Box::new(classifier), feature_columns(), policy)
    }

    fn build(
        classifier: Box<dyn Classifier>,
        columns: Vec<String>,
        policy: BoundsPolicy,
    ) -> Result<Self, ArtifactLoadError> {
        let classes = classifier.classes();
        if classes.len() != 2 {
            return Err(ArtifactLoadError::InvalidModel(format!(
                "expected a binary classifier, found classes {classes:?}"
            )));
        }
        let positive_index = classes
            .iter()
            .position(|&label| label == CHURN_LABEL)
            .ok_or_else(|| {
                ArtifactLoadError::InvalidModel(format!(
                    "classifier has no churn class {CHURN_LABEL} in {classes:?}"
                ))
            })?;
        Ok(Self {
            classifier,
            columns,
            policy,
            positive_index,
        })
    }

    /// Column names the model was trained on, in vector order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Violation messages for a record under this service's policy.
    pub fn validate(&self, record: &FeatureRecord) -> Vec<String> {
        validate_with(record, self.policy)
    }

    /// Validate and score one record.
    pub fn predict_one(&self, record: &FeatureRecord) -> Result<PredictionResult, PredictionError> {
        let violations = self.validate(record);
        if !violations.is_empty() {
            return Err(PredictionError::Validation(violations));
        }
        self.score(record)
    }

    /// Score a batch, all or nothing.
    ///
    /// Every record is validated before the model runs; the first invalid
    /// record fails the whole call with its violations prefixed by its index.
    pub fn predict_many(
        &self,
        records: &[FeatureRecord],
    ) -> Result<Vec<PredictionResult>, PredictionError> {
        for (idx, record) in records.iter().enumerate() {
            let violations = self.validate(record);
            if !violations.is_empty() {
                return Err(PredictionError::Validation(
                    violations
                        .into_iter()
                        .map(|msg| format!("record {idx}: {msg}"))
                        .collect(),
                ));
            }
        }
        records.iter().map(|record| self.score(record)).collect()
    }

    fn score(&self, record: &FeatureRecord) -> Result<PredictionResult, PredictionError> {
        let vector = record.to_vector();
        let proba = self
            .classifier
            .predict_proba(&vector)
            .map_err(PredictionError::Inference)?;
        let classes = self.classifier.classes();
        if proba.len() != classes.len() {
            return Err(PredictionError::Inference(format!(
                "model returned {} probabilities for {} classes",
                proba.len(),
                classes.len()
            )));
        }
        if proba
            .iter()
            .any(|p| !p.is_finite() || *p < -PROBABILITY_EPSILON || *p > 1.0 + PROBABILITY_EPSILON)
        {
            return Err(PredictionError::Inference(format!(
                "model returned probabilities outside [0, 1]: {proba:?}"
            )));
        }
        let best = argmax(&proba);
        Ok(PredictionResult {
            label: classes[best],
            probability: proba[self.positive_index].clamp(0.0, 1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COUNT;
    use crate::ml::decision_tree::TreeNode;
    use std::sync::Arc;

    /// Churn probability rises with customer-service calls.
    struct CallsClassifier;

    impl Classifier for CallsClassifier {
        fn classes(&self) -> &[i64] {
            &[0, 1]
        }

        fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, String> {
            let p = (features[5] / 20.0).clamp(0.0, 1.0);
            Ok(vec![1.0 - p, p])
        }
    }

    struct BrokenClassifier(Vec<f64>);

    impl Classifier for BrokenClassifier {
        fn classes(&self) -> &[i64] {
            &[0, 1]
        }

        fn predict_proba(&self, _features: &[f64]) -> Result<Vec<f64>, String> {
            Ok(self.0.clone())
        }
    }

    fn record(calls: i64) -> FeatureRecord {
        FeatureRecord {
            account_length: 120,
            area_code: 415,
            intl_plan: 0,
            vmail_plan: 1,
            vmail_message: 30,
            cust_serv_calls: calls,
            total_calls: 500.0,
            total_mins: 1000.0,
            total_charge: 200.0,
            high_usage: 0,
            many_cust_serv_calls: i64::from(calls > 5),
        }
    }

    fn service() -> InferenceService {
        InferenceService::with_classifier(CallsClassifier, BoundsPolicy::Advisory).unwrap()
    }

    #[test]
    fn valid_record_gets_label_and_probability() {
        let result = service().predict_one(&record(3)).unwrap();
        assert_eq!(result.label, 0);
        assert!((result.probability - 0.15).abs() < 1e-12);

        let result = service().predict_one(&record(16)).unwrap();
        assert_eq!(result.label, 1);
        assert!((0.0..=1.0).contains(&result.probability));
    }

    #[test]
    fn invalid_record_never_reaches_the_model() {
        let svc = InferenceService::with_classifier(
            BrokenClassifier(vec![f64::NAN]),
            BoundsPolicy::Advisory,
        )
        .unwrap();
        let mut bad = record(3);
        bad.area_code = 50;
        match svc.predict_one(&bad) {
            Err(PredictionError::Validation(messages)) => {
                assert_eq!(messages.len(), 1);
                assert!(messages[0].contains("Area_Code"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn batch_preserves_input_order() {
        let records: Vec<_> = [0, 10, 2, 20].into_iter().map(record).collect();
        let results = service().predict_many(&records).unwrap();
        let probabilities: Vec<f64> = results.iter().map(|r| r.probability).collect();
        assert_eq!(probabilities, vec![0.0, 0.5, 0.1, 1.0]);
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let mut records: Vec<_> = (0..4).map(record).collect();
        records[2].intl_plan = 3;
        match service().predict_many(&records) {
            Err(PredictionError::Validation(messages)) => {
                assert_eq!(messages, vec!["record 2: Intl_Plan must be 0 or 1"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_batch_is_empty() {
        assert!(service().predict_many(&[]).unwrap().is_empty());
    }

    #[test]
    fn malformed_model_output_is_an_inference_error() {
        for output in [vec![0.5], vec![0.2, 1.4], vec![f64::NAN, 0.5]] {
            let svc = InferenceService::with_classifier(
                BrokenClassifier(output.clone()),
                BoundsPolicy::Advisory,
            )
            .unwrap();
            assert!(
                matches!(svc.predict_one(&record(1)), Err(PredictionError::Inference(_))),
                "{output:?}"
            );
        }
    }

    #[test]
    fn policy_changes_accepted_range() {
        let strict =
            InferenceService::with_classifier(CallsClassifier, BoundsPolicy::Strict).unwrap();
        let mut long_account = record(1);
        long_account.account_length = 400;
        assert!(service().predict_one(&long_account).is_ok());
        assert!(strict.predict_one(&long_account).is_err());
    }

    fn calls_tree() -> DecisionTreeModel {
        DecisionTreeModel {
            model_version: 1,
            n_features: FEATURE_COUNT,
            classes: vec![0, 1],
            nodes: vec![
                TreeNode::Split {
                    feature_index: 5,
                    threshold: 3.5,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf {
                    class_counts: vec![90, 10],
                },
                TreeNode::Leaf {
                    class_counts: vec![25, 75],
                },
            ],
        }
    }

    #[test]
    fn tree_artifact_serves_through_the_trait() {
        let svc = InferenceService::from_artifact(
            ModelArtifact::new(calls_tree(), None),
            BoundsPolicy::Advisory,
        )
        .unwrap();
        let shared = Arc::new(svc);
        let handles: Vec<_> = [1, 8]
            .into_iter()
            .map(|calls| {
                let svc = Arc::clone(&shared);
                std::thread::spawn(move || svc.predict_one(&record(calls)).unwrap())
            })
            .collect();
        let results: Vec<PredictionResult> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(
            results,
            vec![
                PredictionResult {
                    label: 0,
                    probability: 0.1
                },
                PredictionResult {
                    label: 1,
                    probability: 0.75
                },
            ]
        );
    }

    #[test]
    fn in_memory_artifacts_are_validated() {
        let mut artifact = ModelArtifact::new(calls_tree(), None);
        artifact.columns.swap(0, 1);
        assert!(matches!(
            InferenceService::from_artifact(artifact, BoundsPolicy::Advisory),
            Err(ArtifactLoadError::ColumnMismatch { .. })
        ));
    }

    #[test]
    fn loading_from_disk_validates_once_and_serves() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("model.json");
        ModelArtifact::new(calls_tree(), None).save_json(&good).unwrap();
        let svc = InferenceService::load(&good, BoundsPolicy::Advisory).unwrap();
        assert_eq!(svc.predict_one(&record(8)).unwrap().label, 1);

        let bad = dir.path().join("reordered.json");
        let mut artifact = ModelArtifact::new(calls_tree(), None);
        artifact.columns.reverse();
        artifact.save_json(&bad).unwrap();
        assert!(matches!(
            InferenceService::load(&bad, BoundsPolicy::Advisory),
            Err(ArtifactLoadError::ColumnMismatch { .. })
        ));
    }

    #[test]
    fn non_binary_classifiers_are_rejected() {
        struct ThreeWay;
        impl Classifier for ThreeWay {
            fn classes(&self) -> &[i64] {
                &[0, 1, 2]
            }
            fn predict_proba(&self, _features: &[f64]) -> Result<Vec<f64>, String> {
                Ok(vec![0.2, 0.3, 0.5])
            }
        }
        assert!(InferenceService::with_classifier(ThreeWay, BoundsPolicy::Advisory).is_err());
    }
}
