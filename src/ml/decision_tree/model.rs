use serde::{Deserialize, Serialize};

/// Node of a flattened decision tree. The root is always at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Internal node routing `feature <= threshold` to `left`, otherwise `right`.
    Split {
        feature_index: u16,
        threshold: f64,
        left: u32,
        right: u32,
    },
    /// Terminal node holding the training class counts that reached it.
    Leaf { class_counts: Vec<u32> },
}

/// Binary or multi-class decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeModel {
    /// Model format version.
    pub model_version: i64,
    /// Number of values expected per feature vector.
    pub n_features: usize,
    /// Class labels; leaf counts and probabilities follow this order.
    pub classes: Vec<i64>,
    /// Flattened nodes, children always stored after their parent.
    pub nodes: Vec<TreeNode>,
}

impl DecisionTreeModel {
    /// Validate structural invariants of the model.
    pub fn validate(&self) -> Result<(), String> {
        if self.classes.len() < 2 {
            return Err("Model must contain at least 2 classes".to_string());
        }
        if self.n_features == 0 {
            return Err("Model must expect at least 1 feature".to_string());
        }
        if self.nodes.is_empty() {
            return Err("Model has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature_index as usize >= self.n_features {
                        return Err(format!(
                            "Node {idx} splits on feature {feature_index} but model has {} features",
                            self.n_features
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("Node {idx} has a non-finite threshold"));
                    }
                    for child in [*left, *right] {
                        let child = child as usize;
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("Node {idx} has invalid child index {child}"));
                        }
                    }
                }
                TreeNode::Leaf { class_counts } => {
                    if class_counts.len() != self.classes.len() {
                        return Err(format!(
                            "Leaf {idx} has {} class counts but expected {}",
                            class_counts.len(),
                            self.classes.len()
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk the tree and return the class counts of the leaf reached.
    ///
    /// Returns `None` for a malformed tree (dangling child index).
    pub fn leaf_counts(&self, features: &[f64]) -> Option<&[u32]> {
        let mut idx = 0usize;
        // Children always sit after their parent, so the walk ends in at most
        // `nodes.len()` steps even on an unvalidated tree.
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx)? {
                TreeNode::Leaf { class_counts } => return Some(class_counts),
                TreeNode::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(*feature_index as usize).copied()?;
                    let next = (if value <= *threshold { *left } else { *right }) as usize;
                    if next <= idx {
                        return None;
                    }
                    idx = next;
                }
            }
        }
        None
    }

    /// Predict class probabilities (class fractions of the reached leaf).
    ///
    /// Empty when the feature vector does not reach a leaf.
    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let Some(counts) = self.leaf_counts(features) else {
            return Vec::new();
        };
        let total: u64 = counts.iter().map(|&c| c as u64).sum();
        if total == 0 {
            return vec![1.0 / counts.len() as f64; counts.len()];
        }
        counts
            .iter()
            .map(|&c| c as f64 / total as f64)
            .collect()
    }

    /// Predict the best class index for a feature vector.
    pub fn predict_class_index(&self, features: &[f64]) -> Option<usize> {
        let proba = self.predict_proba(features);
        if proba.is_empty() {
            return None;
        }
        Some(argmax(&proba))
    }

    /// Predict the class label for a feature vector.
    pub fn predict(&self, features: &[f64]) -> Option<i64> {
        self.predict_class_index(features)
            .and_then(|idx| self.classes.get(idx).copied())
    }

    /// Longest root-to-leaf path, counted in edges.
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut max_depth = 0usize;
        for (idx, node) in self.nodes.iter().enumerate() {
            let depth = depths[idx];
            max_depth = max_depth.max(depth);
            if let TreeNode::Split { left, right, .. } = node {
                for child in [*left as usize, *right as usize] {
                    if let Some(slot) = depths.get_mut(child) {
                        *slot = depth + 1;
                    }
                }
            }
        }
        max_depth
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, TreeNode::Leaf { .. }))
            .count()
    }
}

/// Index of the largest value; ties resolve to the lowest index.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best_idx = 0usize;
    let mut best_val = f64::NEG_INFINITY;
    for (idx, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = idx;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level_tree() -> DecisionTreeModel {
        DecisionTreeModel {
            model_version: 1,
            n_features: 2,
            classes: vec![0, 1],
            nodes: vec![
                TreeNode::Split {
                    feature_index: 0,
                    threshold: 0.5,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf {
                    class_counts: vec![9, 1],
                },
                TreeNode::Split {
                    feature_index: 1,
                    threshold: 10.0,
                    left: 3,
                    right: 4,
                },
                TreeNode::Leaf {
                    class_counts: vec![3, 3],
                },
                TreeNode::Leaf {
                    class_counts: vec![1, 3],
                },
            ],
        }
    }

    #[test]
    fn walks_to_expected_leaves() {
        let model = two_level_tree();
        model.validate().unwrap();
        assert_eq!(model.predict_proba(&[0.5, 0.0]), vec![0.9, 0.1]);
        assert_eq!(model.predict_proba(&[1.0, 20.0]), vec![0.25, 0.75]);
        assert_eq!(model.predict(&[1.0, 20.0]), Some(1));
        assert_eq!(model.predict(&[0.0, 20.0]), Some(0));
    }

    #[test]
    fn ties_resolve_to_first_class() {
        let model = two_level_tree();
        assert_eq!(model.predict_class_index(&[1.0, 5.0]), Some(0));
    }

    #[test]
    fn short_vectors_do_not_reach_a_leaf() {
        let model = two_level_tree();
        assert!(model.predict_proba(&[1.0]).is_empty());
        assert_eq!(model.predict(&[1.0]), None);
    }

    #[test]
    fn reports_shape() {
        let model = two_level_tree();
        assert_eq!(model.depth(), 2);
        assert_eq!(model.leaf_count(), 3);
    }

    #[test]
    fn rejects_backward_child_links() {
        let mut model = two_level_tree();
        model.nodes[2] = TreeNode::Split {
            feature_index: 1,
            threshold: 10.0,
            left: 0,
            right: 4,
        };
        assert!(model.validate().is_err());
        assert!(model.predict_proba(&[1.0, 5.0]).is_empty());
    }

    #[test]
    fn rejects_leaf_count_mismatch() {
        let mut model = two_level_tree();
        model.nodes[1] = TreeNode::Leaf {
            class_counts: vec![1],
        };
        let err = model.validate().unwrap_err();
        assert!(err.contains("Leaf 1"));
    }

    #[test]
    fn serializes_nodes_with_kind_tag() {
        let json = serde_json::to_value(&two_level_tree()).unwrap();
        assert_eq!(json["nodes"][0]["kind"], "split");
        assert_eq!(json["nodes"][1]["kind"], "leaf");
        assert_eq!(json["nodes"][1]["class_counts"][0], 9);
    }
}
