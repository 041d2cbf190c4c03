//! On-disk model artifact: a trained classifier plus its column list.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::{FEATURE_COLUMNS, FEATURE_COUNT, feature_columns};
use crate::ml::decision_tree::DecisionTreeModel;

/// Artifact layout version written by this build.
pub const ARTIFACT_FORMAT_VERSION: i64 = 1;

/// Errors that make an artifact unusable for serving.
#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("Failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Unsupported artifact format_version {found} (expected {expected})")]
    UnsupportedVersion { found: i64, expected: i64 },
    #[error("Artifact columns {found:?} do not match the feature contract {expected:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("Invalid model: {0}")]
    InvalidModel(String),
}

/// Errors while writing an artifact.
#[derive(Debug, Error)]
pub enum ArtifactSaveError {
    #[error("Unable to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize model artifact: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Operator-facing facts about the training run that produced an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// RFC 3339 timestamp.
    pub trained_at: String,
    pub train_rows: usize,
    /// Training rows after oversampling.
    pub resampled_rows: usize,
    pub test_rows: usize,
    pub test_accuracy: f64,
}

/// Trained classifier paired with the ordered columns it expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: i64,
    pub columns: Vec<String>,
    pub model: DecisionTreeModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training: Option<TrainingSummary>,
}

impl ModelArtifact {
    /// Wrap a model trained on the canonical feature vector.
    pub fn new(model: DecisionTreeModel, training: Option<TrainingSummary>) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            columns: feature_columns(),
            model,
            training,
        }
    }

    /// Check version, column contract and tree structure.
    pub fn validate(&self) -> Result<(), ArtifactLoadError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactLoadError::UnsupportedVersion {
                found: self.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }
        if self.columns.iter().map(String::as_str).ne(FEATURE_COLUMNS) {
            return Err(ArtifactLoadError::ColumnMismatch {
                expected: feature_columns(),
                found: self.columns.clone(),
            });
        }
        if self.model.n_features != FEATURE_COUNT {
            return Err(ArtifactLoadError::InvalidModel(format!(
                "model expects {} features but the contract has {FEATURE_COUNT}",
                self.model.n_features
            )));
        }
        self.model
            .validate()
            .map_err(ArtifactLoadError::InvalidModel)
    }

    /// Load and validate an artifact from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, ArtifactLoadError> {
        let bytes = std::fs::read(path).map_err(|source| ArtifactLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: Self =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Write the artifact as pretty JSON, creating parent directories.
    pub fn save_json(&self, path: &Path) -> Result<(), ArtifactSaveError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ArtifactSaveError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes).map_err(|source| ArtifactSaveError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::decision_tree::TreeNode;
    use tempfile::tempdir;

    fn stub_model() -> DecisionTreeModel {
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
                    class_counts: vec![80, 20],
                },
                TreeNode::Leaf {
                    class_counts: vec![10, 30],
                },
            ],
        }
    }

    #[test]
    fn saved_artifact_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models").join("churn_model.json");
        let artifact = ModelArtifact::new(stub_model(), None);
        artifact.save_json(&path).unwrap();
        let loaded = ModelArtifact::load_json(&path).unwrap();
        assert_eq!(loaded, artifact);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        let err = ModelArtifact::load_json(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Read { .. }));
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{\"format_version\": 1, \"columns\": [").unwrap();
        let err = ModelArtifact::load_json(&path).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Parse { .. }));
    }

    #[test]
    fn reordered_columns_are_rejected() {
        let mut artifact = ModelArtifact::new(stub_model(), None);
        artifact.columns.swap(0, 1);
        assert!(matches!(
            artifact.validate(),
            Err(ArtifactLoadError::ColumnMismatch { .. })
        ));
    }

    #[test]
    fn future_format_is_rejected() {
        let mut artifact = ModelArtifact::new(stub_model(), None);
        artifact.format_version = 2;
        assert!(matches!(
            artifact.validate(),
            Err(ArtifactLoadError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn feature_count_must_match_contract() {
        let mut model = stub_model();
        model.n_features = 6;
        let artifact = ModelArtifact::new(model, None);
        assert!(matches!(
            artifact.validate(),
            Err(ArtifactLoadError::InvalidModel(_))
        ));
    }
}
