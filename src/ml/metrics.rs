//! Evaluation metrics for classification models.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Build a matrix from aligned truth and prediction indices.
    pub fn from_pairs(n_classes: usize, truth: &[usize], predicted: &[usize]) -> Self {
        let mut cm = Self::new(n_classes);
        for (&t, &p) in truth.iter().zip(predicted) {
            cm.add(t, p);
        }
        cm
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    /// Render rows=true, cols=pred.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for truth in 0..self.n_classes {
            for pred in 0..self.n_classes {
                out.push_str(&format!("{:8}", self.get(truth, pred)));
            }
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Precision/recall statistics for a single class.
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f64,
    /// `TP / (TP + FN)`.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Compute per-class precision, recall and F1 from a confusion matrix.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = cm.get(class_idx, class_idx) as f64;
        let mut fp = 0f64;
        let mut fn_ = 0f64;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += v as f64;
            }
        }
        for i in 0..k {
            if i != class_idx {
                fp += cm.get(i, class_idx) as f64;
            }
        }
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        stats.push(PerClassStats {
            precision,
            recall,
            f1: f1_score(precision, recall),
            support,
        });
    }
    stats
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    let total = cm.total();
    if total == 0 {
        return 0.0;
    }
    let correct: u64 = (0..cm.n_classes).map(|i| cm.get(i, i) as u64).sum();
    correct as f64 / total as f64
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Per-class table plus accuracy and averaged rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub class_names: Vec<String>,
    pub per_class: Vec<PerClassStats>,
    pub accuracy: f64,
    pub macro_avg: PerClassStats,
    pub weighted_avg: PerClassStats,
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix, class_names: Vec<String>) -> Self {
        let per_class = precision_recall_by_class(cm);
        let total_support: u32 = per_class.iter().map(|s| s.support).sum();
        let k = per_class.len().max(1) as f64;
        let macro_avg = PerClassStats {
            precision: per_class.iter().map(|s| s.precision).sum::<f64>() / k,
            recall: per_class.iter().map(|s| s.recall).sum::<f64>() / k,
            f1: per_class.iter().map(|s| s.f1).sum::<f64>() / k,
            support: total_support,
        };
        let weight = |s: &PerClassStats| {
            if total_support == 0 {
                0.0
            } else {
                s.support as f64 / total_support as f64
            }
        };
        let weighted_avg = PerClassStats {
            precision: per_class.iter().map(|s| s.precision * weight(s)).sum(),
            recall: per_class.iter().map(|s| s.recall * weight(s)).sum(),
            f1: per_class.iter().map(|s| s.f1 * weight(s)).sum(),
            support: total_support,
        };
        Self {
            class_names,
            per_class,
            accuracy: accuracy(cm),
            macro_avg,
            weighted_avg,
        }
    }

    /// Plain-text table in the familiar precision/recall/f1/support layout.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{:>14}{:>11}{:>10}{:>10}{:>10}\n\n",
            "", "precision", "recall", "f1-score", "support"
        );
        for (idx, stats) in self.per_class.iter().enumerate() {
            let name = self
                .class_names
                .get(idx)
                .cloned()
                .unwrap_or_else(|| idx.to_string());
            out.push_str(&row(&name, stats));
        }
        out.push('\n');
        out.push_str(&format!(
            "{:>14}{:>11}{:>10}{:>10.2}{:>10}\n",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        ));
        out.push_str(&row("macro avg", &self.macro_avg));
        out.push_str(&row("weighted avg", &self.weighted_avg));
        out
    }
}

fn row(name: &str, stats: &PerClassStats) -> String {
    format!(
        "{:>14}{:>11.2}{:>10.2}{:>10.2}{:>10}\n",
        name, stats.precision, stats.recall, stats.f1, stats.support
    )
}

/// Scores of the positive class (index 1) of a binary classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BinaryScores {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl BinaryScores {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let per_class = precision_recall_by_class(cm);
        let positive = per_class.get(1).cloned().unwrap_or(PerClassStats {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
            support: 0,
        });
        Self {
            accuracy: accuracy(cm),
            precision: positive.precision,
            recall: positive.recall,
            f1: positive.f1,
        }
    }

    /// Element-wise mean of a set of scores.
    pub fn mean(scores: &[BinaryScores]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let n = scores.len() as f64;
        Self {
            accuracy: scores.iter().map(|s| s.accuracy).sum::<f64>() / n,
            precision: scores.iter().map(|s| s.precision).sum::<f64>() / n,
            recall: scores.iter().map(|s| s.recall).sum::<f64>() / n,
            f1: scores.iter().map(|s| s.f1).sum::<f64>() / n,
        }
    }
}
