//! Decision-tree candidate, grown greedily on gini impurity.
//!
//! Splits scan every feature in declaration order and every midpoint
//! between distinct sorted values, so growth is fully deterministic.
//! Leaves store the positive-class fraction of the rows that reached
//! them, which is what `predict_proba` reports.

use serde::{Deserialize, Serialize};

use super::{Classifier, FeatureVector, FEATURE_COUNT};

const MIN_IMPURITY_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    root: Option<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        probability: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl DecisionTree {
    pub fn new(max_depth: usize, min_samples_leaf: usize) -> Self {
        DecisionTree {
            max_depth,
            min_samples_leaf: min_samples_leaf.max(1),
            root: None,
        }
    }

    /// Number of node levels from the root down to the deepest leaf.
    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map(walk).unwrap_or(0)
    }

    fn build(
        &self,
        features: &[FeatureVector],
        labels: &[f64],
        indices: &[usize],
        depth: usize,
    ) -> TreeNode {
        let n = indices.len();
        let positives: f64 = indices.iter().map(|&i| labels[i]).sum();
        let probability = positives / n as f64;

        if depth >= self.max_depth
            || n < 2 * self.min_samples_leaf
            || probability == 0.0
            || probability == 1.0
        {
            return TreeNode::Leaf { probability };
        }

        let parent_impurity = gini(positives, n as f64);
        let mut best: Option<(usize, f64, f64)> = None;

        for feature in 0..FEATURE_COUNT {
            let mut ordered: Vec<(f64, f64)> = indices
                .iter()
                .map(|&i| (features[i][feature], labels[i]))
                .collect();
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_n = 0.0;
            let mut left_pos = 0.0;
            for k in 1..n {
                left_n += 1.0;
                left_pos += ordered[k - 1].1;
                if ordered[k - 1].0 == ordered[k].0 {
                    continue;
                }
                if k < self.min_samples_leaf || n - k < self.min_samples_leaf {
                    continue;
                }
                let right_n = n as f64 - left_n;
                let right_pos = positives - left_pos;
                let weighted = (left_n * gini(left_pos, left_n)
                    + right_n * gini(right_pos, right_n))
                    / n as f64;
                if parent_impurity - weighted > MIN_IMPURITY_GAIN
                    && best.map_or(true, |(_, _, w)| weighted < w)
                {
                    let threshold = (ordered[k - 1].0 + ordered[k].0) / 2.0;
                    best = Some((feature, threshold, weighted));
                }
            }
        }

        let Some((feature, threshold, _)) = best else {
            return TreeNode::Leaf { probability };
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| features[i][feature] <= threshold);
        // The midpoint of two adjacent floats can round up onto the higher
        // one, sending every row to one side. Close the node instead.
        if left_idx.is_empty() || right_idx.is_empty() {
            return TreeNode::Leaf { probability };
        }
        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.build(features, labels, &left_idx, depth + 1)),
            right: Box::new(self.build(features, labels, &right_idx, depth + 1)),
        }
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, features: &[FeatureVector], labels: &[f64]) {
        if features.is_empty() {
            self.root = None;
            return;
        }
        let indices: Vec<usize> = (0..features.len()).collect();
        self.root = Some(self.build(features, labels, &indices, 0));
    }

    fn predict_proba(&self, features: &FeatureVector) -> f64 {
        let Some(mut node) = self.root.as_ref() else {
            return 0.5;
        };
        loop {
            match node {
                TreeNode::Leaf { probability } => return *probability,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

fn gini(positives: f64, total: f64) -> f64 {
    let p = positives / total;
    2.0 * p * (1.0 - p)
}
