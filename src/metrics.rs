//! Evaluation metrics for the tier classifier.

use serde::{Deserialize, Serialize};

use crate::types::RiskTier;

/// Confusion matrix for a `K`-class classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`)
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Build from aligned truth/prediction class indices
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

    /// Fraction of predictions on the diagonal; 0 for an empty matrix
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: u64 = (0..self.n_classes).map(|k| self.get(k, k) as u64).sum();
        correct as f64 / total as f64
    }
}

/// Precision/recall statistics for a single tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub tier: RiskTier,
    /// `TP / (TP + FP)`
    pub precision: f64,
    /// `TP / (TP + FN)`
    pub recall: f64,
    pub f1: f64,
    /// Number of true examples of the tier
    pub support: u32,
}

/// Per-tier precision, recall and F1 from a confusion matrix
pub fn per_class_metrics(cm: &ConfusionMatrix) -> Vec<ClassMetrics> {
    let k = cm.n_classes;
    RiskTier::ALL
        .iter()
        .take(k)
        .map(|&tier| {
            let c = tier.index();
            let tp = cm.get(c, c) as f64;
            let support: u32 = (0..k).map(|j| cm.get(c, j)).sum();
            let predicted: u32 = (0..k).map(|i| cm.get(i, c)).sum();
            let precision = if predicted == 0 { 0.0 } else { tp / predicted as f64 };
            let recall = if support == 0 { 0.0 } else { tp / support as f64 };
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            ClassMetrics {
                tier,
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect()
}

/// Held-out evaluation of a trained classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Fraction of held-out rows classified correctly
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    pub per_class: Vec<ClassMetrics>,
    pub n_train: usize,
    pub n_test: usize,
    /// Rows dropped during cleaning
    pub dropped_rows: usize,
}

impl EvaluationReport {
    pub fn from_predictions(
        truth: &[usize],
        predicted: &[usize],
        n_train: usize,
        dropped_rows: usize,
    ) -> Self {
        let confusion = ConfusionMatrix::from_pairs(RiskTier::COUNT, truth, predicted);
        Self {
            accuracy: confusion.accuracy(),
            per_class: per_class_metrics(&confusion),
            confusion,
            n_train,
            n_test: truth.len(),
            dropped_rows,
        }
    }

    /// Accuracy as a percentage, the way training reports it
    pub fn accuracy_percent(&self) -> f64 {
        self.accuracy * 100.0
    }
}
