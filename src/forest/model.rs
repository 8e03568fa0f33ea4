//! Decision tree and forest model types

use serde::{Deserialize, Serialize};

use super::train::ForestParams;

/// Model format version
pub const FOREST_FORMAT_VERSION: u32 = 1;

/// A node in a flattened decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Terminal node holding the class distribution of its training samples
    Leaf { distribution: Vec<f64> },
    /// Internal node: `x[feature] <= threshold` goes left, otherwise right
    Split {
        feature: u16,
        threshold: f64,
        left: u32,
        right: u32,
    },
}

/// A single CART tree; the root is node 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    /// Class distribution of the leaf that `features` falls into
    pub fn leaf_distribution(&self, features: &[f64]) -> &[f64] {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(*feature as usize).copied().unwrap_or(0.0);
                    idx = if value <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
    }

    /// Longest root-to-leaf path, counted in edges
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(depth),
                Node::Split { left, right, .. } => {
                    stack.push((*left as usize, depth + 1));
                    stack.push((*right as usize, depth + 1));
                }
            }
        }
        max_depth
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Validate structural invariants.
    ///
    /// Children always come after their parent, so a valid tree cannot loop.
    pub fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { distribution } => {
                    if distribution.len() != n_classes {
                        return Err(format!(
                            "Leaf {idx} has {} classes but expected {n_classes}",
                            distribution.len()
                        ));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature as usize >= n_features {
                        return Err(format!("Node {idx} splits on unknown feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("Node {idx} has a non-finite threshold"));
                    }
                    for child in [*left as usize, *right as usize] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("Node {idx} has invalid child {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Trained random-forest classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    /// Model format version
    pub format_version: u32,
    /// Number of features each input vector must have
    pub n_features: usize,
    /// Number of output classes
    pub n_classes: usize,
    /// Hyper-parameters the forest was grown with
    pub params: ForestParams,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Validate structural invariants of the model
    pub fn validate(&self) -> Result<(), String> {
        if self.format_version != FOREST_FORMAT_VERSION {
            return Err(format!(
                "Unsupported forest format version {} (expected {FOREST_FORMAT_VERSION})",
                self.format_version
            ));
        }
        if self.n_classes < 2 {
            return Err("Model must contain at least 2 classes".to_string());
        }
        if self.trees.is_empty() {
            return Err("Model contains no trees".to_string());
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.n_classes)
                .map_err(|e| format!("Tree {tree_idx}: {e}"))?;
        }
        Ok(())
    }

    /// Mean class probabilities over all trees
    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.leaf_distribution(features)) {
                *acc += p;
            }
        }
        let n_trees = self.trees.len().max(1) as f64;
        for p in &mut proba {
            *p /= n_trees;
        }
        proba
    }

    /// Most probable class; ties go to the lower class index
    pub fn predict(&self, features: &[f64]) -> usize {
        argmax(&self.predict_proba(features))
    }
}

fn argmax(values: &[f64]) -> usize {
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

    fn stump(threshold: f64) -> DecisionTree {
        DecisionTree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold,
                    left: 1,
                    right: 2,
                },
                Node::Leaf {
                    distribution: vec![1.0, 0.0],
                },
                Node::Leaf {
                    distribution: vec![0.0, 1.0],
                },
            ],
        }
    }

    fn forest(trees: Vec<DecisionTree>) -> RandomForest {
        RandomForest {
            format_version: FOREST_FORMAT_VERSION,
            n_features: 1,
            n_classes: 2,
            params: ForestParams::default(),
            trees,
        }
    }

    #[test]
    fn test_tree_routes_on_threshold() {
        let tree = stump(0.5);
        assert_eq!(tree.leaf_distribution(&[0.5]), &[1.0, 0.0]);
        assert_eq!(tree.leaf_distribution(&[0.6]), &[0.0, 1.0]);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.leaf_count(), 2);
    }

    #[test]
    fn test_forest_averages_trees() {
        let model = forest(vec![stump(0.0), stump(1.0)]);
        assert_eq!(model.predict_proba(&[0.5]), vec![0.5, 0.5]);
        // Tie resolves to the lower class
        assert_eq!(model.predict(&[0.5]), 0);
        assert_eq!(model.predict(&[2.0]), 1);
    }

    #[test]
    fn test_validate_rejects_backward_child() {
        let mut tree = stump(0.5);
        tree.nodes[0] = Node::Split {
            feature: 0,
            threshold: 0.5,
            left: 0,
            right: 2,
        };
        assert!(forest(vec![tree]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_feature() {
        let mut tree = stump(0.5);
        tree.nodes[0] = Node::Split {
            feature: 3,
            threshold: 0.5,
            left: 1,
            right: 2,
        };
        assert!(forest(vec![tree]).validate().is_err());
        assert!(forest(vec![stump(0.5)]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_forest() {
        assert!(forest(Vec::new()).validate().is_err());
    }
}
