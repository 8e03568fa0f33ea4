//! Random-forest classifier.
//!
//! An ensemble of CART decision trees grown on bootstrap samples with a random feature
//! subset per split. Training is fully determined by the seed:
//! - Each tree draws its own seed from a master `StdRng`, in tree order.
//! - Prediction averages per-tree leaf class distributions (soft voting).
//! - Models serialize to JSON and are validated structurally on load.

mod model;
mod train;

pub use model::{DecisionTree, Node, RandomForest, FOREST_FORMAT_VERSION};
pub use train::{train_random_forest, ForestParams, MaxFeatures};
