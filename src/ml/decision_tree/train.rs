use super::model::{DecisionTreeModel, TreeNode};

/// Growth limits for tree training.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Maximum depth in edges; `None` grows until other limits stop it.
    pub max_depth: Option<usize>,
    /// Minimum number of rows in each child of a split.
    pub min_samples_leaf: usize,
    /// Minimum number of rows a node needs before it may split.
    pub min_samples_split: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            max_depth: Some(5),
            min_samples_leaf: 10,
            min_samples_split: 20,
        }
    }
}

/// In-memory dataset used for training and evaluation.
#[derive(Debug, Clone)]
pub struct TrainDataset {
    /// Number of values in each feature vector.
    pub feature_len: usize,
    /// Class labels; `y` holds indices into this list.
    pub classes: Vec<i64>,
    /// Feature matrix, row-major.
    pub x: Vec<Vec<f64>>,
    /// Class indices aligned with `x`.
    pub y: Vec<usize>,
}

/// Grow a CART classification tree with Gini impurity.
pub fn train_decision_tree(
    dataset: &TrainDataset,
    options: &TrainOptions,
) -> Result<DecisionTreeModel, String> {
    if dataset.x.len() != dataset.y.len() {
        return Err("Mismatched X/Y lengths".to_string());
    }
    if dataset.x.is_empty() {
        return Err("Empty dataset".to_string());
    }
    let n_classes = dataset.classes.len();
    if n_classes < 2 {
        return Err("Need at least 2 classes".to_string());
    }
    if dataset.feature_len == 0 || dataset.feature_len > u16::MAX as usize {
        return Err(format!("Unsupported feature length {}", dataset.feature_len));
    }
    for (row_idx, row) in dataset.x.iter().enumerate() {
        if row.len() != dataset.feature_len {
            return Err(format!(
                "Row {row_idx} has {} values but expected {}",
                row.len(),
                dataset.feature_len
            ));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(format!("Row {row_idx} contains a non-finite value"));
        }
    }
    if let Some(&label) = dataset.y.iter().find(|&&label| label >= n_classes) {
        return Err(format!("Label index {label} out of range"));
    }

    let mut builder = TreeBuilder {
        dataset,
        options,
        n_classes,
        nodes: Vec::new(),
    };
    let rows: Vec<usize> = (0..dataset.x.len()).collect();
    builder.grow(rows, 0);

    let model = DecisionTreeModel {
        model_version: 1,
        n_features: dataset.feature_len,
        classes: dataset.classes.clone(),
        nodes: builder.nodes,
    };
    model.validate()?;
    Ok(model)
}

struct TreeBuilder<'a> {
    dataset: &'a TrainDataset,
    options: &'a TrainOptions,
    n_classes: usize,
    nodes: Vec<TreeNode>,
}

impl TreeBuilder<'_> {
    /// Append the subtree for `rows` and return its root index.
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> u32 {
        let counts = self.class_counts(&rows);
        let node_idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            class_counts: counts.clone(),
        });

        if !self.may_split(rows.len(), depth, &counts) {
            return node_idx as u32;
        }
        let Some(split) = self.best_split(&rows, &counts) else {
            return node_idx as u32;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&row| self.dataset.x[row][split.feature_index] <= split.threshold);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[node_idx] = TreeNode::Split {
            feature_index: split.feature_index as u16,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx as u32
    }

    fn may_split(&self, n_rows: usize, depth: usize, counts: &[u32]) -> bool {
        if self.options.max_depth.is_some_and(|max| depth >= max) {
            return false;
        }
        let min_leaf = self.options.min_samples_leaf.max(1);
        if n_rows < self.options.min_samples_split.max(2) || n_rows < 2 * min_leaf {
            return false;
        }
        counts.iter().filter(|&&c| c > 0).count() > 1
    }

    fn class_counts(&self, rows: &[usize]) -> Vec<u32> {
        let mut counts = vec![0u32; self.n_classes];
        for &row in rows {
            counts[self.dataset.y[row]] += 1;
        }
        counts
    }

    fn best_split(&self, rows: &[usize], counts: &[u32]) -> Option<Split> {
        let n = rows.len();
        let parent = gini(counts, n);
        let min_leaf = self.options.min_samples_leaf.max(1);
        let mut best: Option<Split> = None;

        let mut sorted = rows.to_vec();
        for feature_index in 0..self.dataset.feature_len {
            let x = &self.dataset.x;
            sorted.sort_by(|&a, &b| x[a][feature_index].total_cmp(&x[b][feature_index]));

            let mut left_counts = vec![0u32; self.n_classes];
            let mut right_counts = counts.to_vec();
            for pos in 0..n - 1 {
                let row = sorted[pos];
                let label = self.dataset.y[row];
                left_counts[label] += 1;
                right_counts[label] -= 1;

                let n_left = pos + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let current = x[row][feature_index];
                let next = x[sorted[pos + 1]][feature_index];
                if next <= current {
                    continue;
                }
                let impurity = (n_left as f64 * gini(&left_counts, n_left)
                    + n_right as f64 * gini(&right_counts, n_right))
                    / n as f64;
                if impurity >= parent - 1e-12 {
                    continue;
                }
                if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                    let mut threshold = current + (next - current) / 2.0;
                    // Guard against the midpoint rounding up onto `next`.
                    if threshold >= next {
                        threshold = current;
                    }
                    best = Some(Split {
                        feature_index,
                        threshold,
                        impurity,
                    });
                }
            }
        }
        best
    }
}

#[derive(Debug, Clone)]
struct Split {
    feature_index: usize,
    threshold: f64,
    impurity: f64,
}

fn gini(counts: &[u32], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold_dataset(n: usize) -> TrainDataset {
        let x: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y = (0..n).map(|i| usize::from(i >= n / 2)).collect();
        TrainDataset {
            feature_len: 2,
            classes: vec![0, 1],
            x,
            y,
        }
    }

    #[test]
    fn separates_a_single_threshold() {
        let dataset = threshold_dataset(100);
        let model = train_decision_tree(&dataset, &TrainOptions::default()).unwrap();
        assert_eq!(model.depth(), 1);
        match &model.nodes[0] {
            TreeNode::Split {
                feature_index,
                threshold,
                ..
            } => {
                assert_eq!(*feature_index, 0);
                assert_eq!(*threshold, 49.5);
            }
            other => panic!("expected split root, got {other:?}"),
        }
        for (row, &label) in dataset.x.iter().zip(&dataset.y) {
            assert_eq!(model.predict(row), Some(label as i64));
        }
    }

    #[test]
    fn respects_max_depth() {
        // Alternating labels along one axis force many splits.
        let x: Vec<Vec<f64>> = (0..200).map(|i| vec![i as f64]).collect();
        let y = (0..200).map(|i| (i / 20) % 2).collect();
        let dataset = TrainDataset {
            feature_len: 1,
            classes: vec![0, 1],
            x,
            y,
        };
        let options = TrainOptions {
            max_depth: Some(2),
            min_samples_leaf: 1,
            min_samples_split: 2,
        };
        let model = train_decision_tree(&dataset, &options).unwrap();
        assert!(model.depth() <= 2);
    }

    #[test]
    fn leaves_hold_at_least_min_samples() {
        let dataset = threshold_dataset(60);
        let options = TrainOptions {
            max_depth: None,
            min_samples_leaf: 25,
            min_samples_split: 2,
        };
        let model = train_decision_tree(&dataset, &options).unwrap();
        for node in &model.nodes {
            if let TreeNode::Leaf { class_counts } = node {
                assert!(class_counts.iter().sum::<u32>() >= 25);
            }
        }
    }

    #[test]
    fn small_nodes_stay_leaves() {
        let dataset = threshold_dataset(30);
        let options = TrainOptions {
            max_depth: Some(5),
            min_samples_leaf: 1,
            min_samples_split: 40,
        };
        let model = train_decision_tree(&dataset, &options).unwrap();
        assert_eq!(model.nodes.len(), 1);
        assert_eq!(model.predict_proba(&[0.0, 0.0]), vec![0.5, 0.5]);
    }

    #[test]
    fn rejects_ragged_rows() {
        let mut dataset = threshold_dataset(10);
        dataset.x[3].pop();
        let err = train_decision_tree(&dataset, &TrainOptions::default()).unwrap_err();
        assert!(err.contains("Row 3"));
    }

    #[test]
    fn gini_of_pure_and_even_nodes() {
        assert_eq!(gini(&[10, 0], 10), 0.0);
        assert!((gini(&[5, 5], 10) - 0.5).abs() < 1e-12);
    }
}
