//! Offline training pipeline producing the serving artifact.
//!
//! Load, preprocess, stratified split, SMOTE + decision tree on the training
//! portion, evaluation on the held-out rows, optional stratified k-fold cross
//! validation that refits the whole pipeline per fold, then save.

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::artifact::{ArtifactSaveError, ModelArtifact, TrainingSummary};
use crate::dataset::{self, ChurnDataset, DatasetError};
use crate::features::FEATURE_COUNT;
use crate::ml::decision_tree::{DecisionTreeModel, TrainDataset, TrainOptions, train_decision_tree};
use crate::ml::metrics::{BinaryScores, ClassificationReport, ConfusionMatrix};
use crate::ml::smote::{SmoteOptions, smote_resample};
use crate::ml::split::{stratified_k_fold, stratified_train_test_split};

/// Model labels, indexed by class index.
pub const CLASS_LABELS: [i64; 2] = [0, 1];
const CLASS_NAMES: [&str; 2] = ["No churn", "Churn"];

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("Split failed: {0}")]
    Split(String),
    #[error("Training failed: {0}")]
    Fit(String),
    #[error("Evaluation failed: {0}")]
    Evaluate(String),
    #[error(transparent)]
    Save(#[from] ArtifactSaveError),
    #[error("Failed to format training timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Knobs for one training run.
#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub tree: TrainOptions,
    pub smote: SmoteOptions,
    /// Held-out fraction for evaluation.
    pub test_size: f64,
    /// Seed for the split and the fold assignment.
    pub seed: u64,
    /// Number of cross-validation folds; `None` skips cross validation.
    pub cv_folds: Option<usize>,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            tree: TrainOptions::default(),
            smote: SmoteOptions::default(),
            test_size: 0.3,
            seed: 42,
            cv_folds: Some(5),
        }
    }
}

/// Cross-validation scores of the churn class.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    pub folds: Vec<BinaryScores>,
    pub mean: BinaryScores,
}

/// Everything a training run reports besides the artifact itself.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub rows: usize,
    pub dropped: usize,
    /// Row counts per class before splitting.
    pub class_counts: [usize; 2],
    pub summary: TrainingSummary,
    pub confusion: ConfusionMatrix,
    pub test_report: ClassificationReport,
    pub cross_validation: Option<CrossValidation>,
}

/// Artifact plus report from [`train_from_dataset`].
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub artifact: ModelArtifact,
    pub report: TrainingReport,
}

/// Train from a raw churn export (workbook, CSV or JSON Lines) and write the
/// artifact to `out`.
pub fn run_training(
    data: &Path,
    out: &Path,
    options: &TrainingOptions,
) -> Result<TrainingReport, TrainError> {
    let rows = dataset::load_rows(data)?;
    tracing::info!(path = %data.display(), rows = rows.len(), "Loaded raw churn rows");
    let dataset = dataset::preprocess(&rows)?;
    let TrainedModel { artifact, report } = train_from_dataset(&dataset, options)?;
    artifact.save_json(out)?;
    tracing::info!(path = %out.display(), "Saved model artifact");
    Ok(report)
}

/// Run split, fit, evaluation and cross validation on preprocessed rows.
pub fn train_from_dataset(
    dataset: &ChurnDataset,
    options: &TrainingOptions,
) -> Result<TrainedModel, TrainError> {
    let class_counts = dataset.class_counts();
    tracing::info!(
        rows = dataset.records.len(),
        dropped = dataset.dropped,
        stayed = class_counts[0],
        churned = class_counts[1],
        "Churn class distribution"
    );
    if class_counts.iter().any(|&count| count < 2) {
        return Err(TrainError::Fit(format!(
            "need at least 2 rows of each class, found {class_counts:?}"
        )));
    }

    let x = dataset.matrix();
    let y = &dataset.labels;
    let split = stratified_train_test_split(y, CLASS_LABELS.len(), options.test_size, options.seed)
        .map_err(TrainError::Split)?;
    let (train_x, train_y) = select(&x, y, &split.train);
    let (test_x, test_y) = select(&x, y, &split.test);

    let fitted = fit_pipeline(&train_x, &train_y, options)?;
    tracing::info!(
        train_rows = train_x.len(),
        resampled_rows = fitted.resampled_rows,
        depth = fitted.model.depth(),
        leaves = fitted.model.leaf_count(),
        "Fitted decision tree"
    );

    let confusion = evaluate(&fitted.model, &test_x, &test_y)?;
    let test_report = ClassificationReport::from_confusion(
        &confusion,
        CLASS_NAMES.iter().map(|name| name.to_string()).collect(),
    );
    tracing::info!(accuracy = test_report.accuracy, "Held-out evaluation");

    let cross_validation = match options.cv_folds {
        Some(k) => Some(cross_validate(&train_x, &train_y, k, options)?),
        None => None,
    };

    let summary = TrainingSummary {
        trained_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
        train_rows: train_x.len(),
        resampled_rows: fitted.resampled_rows,
        test_rows: test_x.len(),
        test_accuracy: test_report.accuracy,
    };
    let artifact = ModelArtifact::new(fitted.model, Some(summary.clone()));
    Ok(TrainedModel {
        artifact,
        report: TrainingReport {
            rows: dataset.records.len(),
            dropped: dataset.dropped,
            class_counts,
            summary,
            confusion,
            test_report,
            cross_validation,
        },
    })
}

/// Tree fitted on an oversampled training set.
#[derive(Debug, Clone)]
pub struct FittedPipeline {
    pub model: DecisionTreeModel,
    pub resampled_rows: usize,
}

/// SMOTE on the given rows, then grow a tree on the balanced set.
pub fn fit_pipeline(
    x: &[Vec<f64>],
    y: &[usize],
    options: &TrainingOptions,
) -> Result<FittedPipeline, TrainError> {
    let resampled =
        smote_resample(x, y, CLASS_LABELS.len(), &options.smote).map_err(TrainError::Fit)?;
    let resampled_rows = resampled.x.len();
    let dataset = TrainDataset {
        feature_len: FEATURE_COUNT,
        classes: CLASS_LABELS.to_vec(),
        x: resampled.x,
        y: resampled.y,
    };
    let model = train_decision_tree(&dataset, &options.tree).map_err(TrainError::Fit)?;
    Ok(FittedPipeline {
        model,
        resampled_rows,
    })
}

/// Stratified k-fold scores of the churn class, refitting per fold.
pub fn cross_validate(
    x: &[Vec<f64>],
    y: &[usize],
    k: usize,
    options: &TrainingOptions,
) -> Result<CrossValidation, TrainError> {
    let folds = stratified_k_fold(y, CLASS_LABELS.len(), k, options.seed)
        .map_err(TrainError::Split)?;
    let mut scores = Vec::with_capacity(folds.len());
    for (idx, fold) in folds.iter().enumerate() {
        let (fold_x, fold_y) = select(x, y, &fold.train);
        let (held_x, held_y) = select(x, y, &fold.test);
        let fitted = fit_pipeline(&fold_x, &fold_y, options)?;
        let fold_scores = BinaryScores::from_confusion(&evaluate(&fitted.model, &held_x, &held_y)?);
        tracing::debug!(
            fold = idx,
            accuracy = fold_scores.accuracy,
            f1 = fold_scores.f1,
            "Cross-validation fold"
        );
        scores.push(fold_scores);
    }
    let mean = BinaryScores::mean(&scores);
    tracing::info!(
        folds = k,
        accuracy = mean.accuracy,
        precision = mean.precision,
        recall = mean.recall,
        f1 = mean.f1,
        "Cross-validation"
    );
    Ok(CrossValidation {
        folds: scores,
        mean,
    })
}

fn evaluate(
    model: &DecisionTreeModel,
    x: &[Vec<f64>],
    y: &[usize],
) -> Result<ConfusionMatrix, TrainError> {
    let predicted = x
        .iter()
        .map(|row| {
            model
                .predict_class_index(row)
                .ok_or_else(|| TrainError::Evaluate("tree did not reach a leaf".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ConfusionMatrix::from_pairs(CLASS_LABELS.len(), y, &predicted))
}

fn select(x: &[Vec<f64>], y: &[usize], rows: &[usize]) -> (Vec<Vec<f64>>, Vec<usize>) {
    rows.iter().map(|&row| (x[row].clone(), y[row])).unzip()
}

/// Default artifact location, matching the server's default `model.path`.
pub fn default_artifact_path() -> PathBuf {
    PathBuf::from("models/churn_model.json")
}
