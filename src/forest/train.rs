//! Random forest training

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::{DecisionTree, Node, RandomForest, FOREST_FORMAT_VERSION};
use crate::error::DetoxError;

/// Number of features examined at each split.
///
/// Serialized as `"sqrt"`, `"all"` or a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MaxFeaturesRepr", into = "MaxFeaturesRepr")]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`, at least 1
    Sqrt,
    /// Every feature at every split
    All,
    /// A fixed count, capped at the feature count
    Count(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MaxFeaturesRepr {
    Count(usize),
    Name(String),
}

impl TryFrom<MaxFeaturesRepr> for MaxFeatures {
    type Error = String;

    fn try_from(repr: MaxFeaturesRepr) -> Result<Self, Self::Error> {
        match repr {
            MaxFeaturesRepr::Count(k) => Ok(MaxFeatures::Count(k)),
            MaxFeaturesRepr::Name(name) => match name.as_str() {
                "sqrt" => Ok(MaxFeatures::Sqrt),
                "all" => Ok(MaxFeatures::All),
                other => Err(format!(
                    "unknown max_features {other:?} (expected \"sqrt\", \"all\" or a count)"
                )),
            },
        }
    }
}

impl From<MaxFeatures> for MaxFeaturesRepr {
    fn from(value: MaxFeatures) -> Self {
        match value {
            MaxFeatures::Sqrt => MaxFeaturesRepr::Name("sqrt".to_string()),
            MaxFeatures::All => MaxFeaturesRepr::Name("all".to_string()),
            MaxFeatures::Count(k) => MaxFeaturesRepr::Count(k),
        }
    }
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Forest training hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees in the ensemble
    pub n_trees: usize,
    /// Maximum tree depth; `None` grows until leaves are pure
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample per tree
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 500,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.n_trees == 0 {
            return Err("n_trees must be at least 1".to_string());
        }
        if self.min_samples_split < 2 {
            return Err("min_samples_split must be at least 2".to_string());
        }
        if self.min_samples_leaf == 0 {
            return Err("min_samples_leaf must be at least 1".to_string());
        }
        if let MaxFeatures::Count(0) = self.max_features {
            return Err("max_features count must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Train a random forest on row-major features `x` and class indices `y`
pub fn train_random_forest<R: AsRef<[f64]>>(
    x: &[R],
    y: &[usize],
    n_classes: usize,
    params: &ForestParams,
) -> Result<RandomForest, DetoxError> {
    params.validate().map_err(DetoxError::Training)?;
    if x.len() != y.len() {
        return Err(DetoxError::Training(format!(
            "Mismatched X/Y lengths: {} rows, {} labels",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(DetoxError::Training("Empty training set".to_string()));
    }
    if n_classes < 2 {
        return Err(DetoxError::Training("Need at least 2 classes".to_string()));
    }
    if let Some(label) = y.iter().find(|&&label| label >= n_classes) {
        return Err(DetoxError::Training(format!(
            "Label {label} out of range for {n_classes} classes"
        )));
    }

    let n_features = x[0].as_ref().len();
    if n_features == 0 || n_features > u16::MAX as usize {
        return Err(DetoxError::Training(format!(
            "Unsupported feature count {n_features}"
        )));
    }
    if let Some(pos) = x.iter().position(|row| row.as_ref().len() != n_features) {
        return Err(DetoxError::Training(format!(
            "Row {pos} has {} features, expected {n_features}",
            x[pos].as_ref().len()
        )));
    }

    let max_features = params.max_features.resolve(n_features);
    let mut master = StdRng::seed_from_u64(params.seed);
    let mut trees = Vec::with_capacity(params.n_trees);

    for tree_idx in 0..params.n_trees {
        let mut rng = StdRng::seed_from_u64(master.gen::<u64>());
        let samples: Vec<usize> = if params.bootstrap {
            (0..x.len()).map(|_| rng.gen_range(0..x.len())).collect()
        } else {
            (0..x.len()).collect()
        };

        let builder = TreeBuilder {
            x,
            y,
            n_classes,
            n_features,
            max_features,
            params,
            rng,
            nodes: Vec::new(),
        };
        let tree = builder.build(samples);
        debug!(
            tree = tree_idx,
            nodes = tree.nodes.len(),
            depth = tree.depth(),
            "grew tree"
        );
        trees.push(tree);
    }

    Ok(RandomForest {
        format_version: FOREST_FORMAT_VERSION,
        n_features,
        n_classes,
        params: params.clone(),
        trees,
    })
}

struct TreeBuilder<'a, R> {
    x: &'a [R],
    y: &'a [usize],
    n_classes: usize,
    n_features: usize,
    max_features: usize,
    params: &'a ForestParams,
    rng: StdRng,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl<'a, R: AsRef<[f64]>> TreeBuilder<'a, R> {
    fn build(mut self, samples: Vec<usize>) -> DecisionTree {
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let mut stack = vec![(0usize, samples, 0usize)];

        while let Some((idx, samples, depth)) = stack.pop() {
            let counts = self.class_counts(&samples);
            let occupied = counts.iter().filter(|&&c| c > 0).count();
            let depth_allows = self.params.max_depth.map_or(true, |max| depth < max);

            let split = if occupied > 1
                && depth_allows
                && samples.len() >= self.params.min_samples_split
            {
                self.best_split(&samples, &counts)
            } else {
                None
            };

            let Some(split) = split else {
                self.nodes[idx] = leaf(&counts, samples.len());
                continue;
            };

            let (left, right): (Vec<usize>, Vec<usize>) = samples
                .iter()
                .partition(|&&s| self.value(s, split.feature) <= split.threshold);

            let left_idx = self.nodes.len();
            let right_idx = left_idx + 1;
            self.nodes.push(Node::Leaf {
                distribution: Vec::new(),
            });
            self.nodes.push(Node::Leaf {
                distribution: Vec::new(),
            });
            self.nodes[idx] = Node::Split {
                feature: split.feature as u16,
                threshold: split.threshold,
                left: left_idx as u32,
                right: right_idx as u32,
            };

            stack.push((right_idx, right, depth + 1));
            stack.push((left_idx, left, depth + 1));
        }

        DecisionTree { nodes: self.nodes }
    }

    fn value(&self, sample: usize, feature: usize) -> f64 {
        self.x[sample].as_ref()[feature]
    }

    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &s in samples {
            counts[self.y[s]] += 1;
        }
        counts
    }

    /// Lowest weighted Gini impurity over a random feature subset
    fn best_split(&mut self, samples: &[usize], counts: &[usize]) -> Option<SplitCandidate> {
        let features =
            rand::seq::index::sample(&mut self.rng, self.n_features, self.max_features);
        let parent = gini(counts, samples.len());
        let min_leaf = self.params.min_samples_leaf;
        let n = samples.len();

        let mut best: Option<SplitCandidate> = None;
        let mut ordered: Vec<(f64, usize)> = Vec::with_capacity(n);

        for feature in features.into_iter() {
            ordered.clear();
            ordered.extend(samples.iter().map(|&s| (self.value(s, feature), self.y[s])));
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_counts = vec![0usize; self.n_classes];
            let mut right_counts = counts.to_vec();

            for i in 0..n - 1 {
                let (value, label) = ordered[i];
                left_counts[label] += 1;
                right_counts[label] -= 1;

                let next_value = ordered[i + 1].0;
                if value == next_value {
                    continue;
                }
                let left_n = i + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let impurity = (left_n as f64 * gini(&left_counts, left_n)
                    + right_n as f64 * gini(&right_counts, right_n))
                    / n as f64;
                if impurity > parent {
                    continue;
                }
                if best.map_or(true, |b| impurity < b.impurity) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: midpoint(value, next_value),
                        impurity,
                    });
                }
            }
        }

        best
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

/// Threshold between two sorted distinct values that keeps `low` on the left
fn midpoint(low: f64, high: f64) -> f64 {
    let mid = low + (high - low) / 2.0;
    if mid >= high {
        low
    } else {
        mid
    }
}

fn leaf(counts: &[usize], total: usize) -> Node {
    let total = total.max(1) as f64;
    Node::Leaf {
        distribution: counts.iter().map(|&c| c as f64 / total).collect(),
    }
}
