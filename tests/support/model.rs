use std::path::Path;

use churnpredict::artifact::ModelArtifact;
use churnpredict::features::FEATURE_COUNT;
use churnpredict::ml::decision_tree::{DecisionTreeModel, TreeNode};

/// One split on `CustServ_Calls <= 3.5`: 10% churn on the left, 80% on the right.
pub fn calls_tree_artifact() -> ModelArtifact {
    let model = DecisionTreeModel {
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
                class_counts: vec![20, 80],
            },
        ],
    };
    ModelArtifact::new(model, None)
}

pub fn write_calls_tree_artifact(path: &Path) {
    calls_tree_artifact().save_json(path).unwrap();
}
