//! Deterministic CART decision-tree classifier.
//!
//! The tree is stored as a flat node array so it serializes to compact JSON
//! and can be walked without recursion:
//! - Gini impurity splits with midpoint thresholds.
//! - Depth, leaf-size and split-size limits.
//! - Leaves keep per-class sample counts, so probabilities are class fractions.

mod model;
mod train;

pub(crate) use model::argmax;
pub use model::{DecisionTreeModel, TreeNode};
pub use train::{TrainDataset, TrainOptions, train_decision_tree};
