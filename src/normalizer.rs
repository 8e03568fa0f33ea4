//! Feature standardization
//!
//! This module fits per-feature mean and standard deviation on the training partition
//! and applies `(x - mean) / scale` to every vector, at training and inference alike.
//! - Population standard deviation (divide by `n`)
//! - Zero-variance features get a scale of 1.0, so they map to 0 instead of dividing by zero

use crate::error::DetoxError;
use crate::features::{FeatureVector, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// Variance below this is treated as zero
const VARIANCE_EPSILON: f64 = 1e-12;

/// Fitted scaler state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
    /// Number of rows the scaler was fitted on
    samples_seen: usize,
}

impl StandardScaler {
    /// Fit on a set of training rows
    pub fn fit(rows: &[FeatureVector]) -> Result<Self, DetoxError> {
        if rows.is_empty() {
            return Err(DetoxError::Training(
                "Cannot fit scaler on zero rows".to_string(),
            ));
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (acc, &v) in mean.iter_mut().zip(row.iter()) {
                *acc += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (j, &v) in row.iter().enumerate() {
                let d = v - mean[j];
                variance[j] += d * d;
            }
        }

        let scale = variance
            .into_iter()
            .map(|var| {
                let var = var / n;
                if var < VARIANCE_EPSILON {
                    1.0
                } else {
                    var.sqrt()
                }
            })
            .collect();

        Ok(Self {
            mean,
            scale,
            samples_seen: rows.len(),
        })
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn samples_seen(&self) -> usize {
        self.samples_seen
    }

    /// Standardize one vector
    pub fn transform(&self, x: &FeatureVector) -> FeatureVector {
        let mut out = *x;
        for (j, v) in out.iter_mut().enumerate() {
            *v = (*v - self.mean[j]) / self.scale[j];
        }
        out
    }

    /// Undo standardization
    pub fn inverse_transform(&self, z: &FeatureVector) -> FeatureVector {
        let mut out = *z;
        for (j, v) in out.iter_mut().enumerate() {
            *v = *v * self.scale[j] + self.mean[j];
        }
        out
    }

    /// Structural check used when loading a persisted scaler
    pub fn validate(&self) -> Result<(), String> {
        if self.mean.len() != FEATURE_COUNT || self.scale.len() != FEATURE_COUNT {
            return Err(format!(
                "Scaler has {} means and {} scales but the model uses {} features",
                self.mean.len(),
                self.scale.len(),
                FEATURE_COUNT
            ));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err("Scaler contains a non-positive or non-finite scale".to_string());
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err("Scaler contains a non-finite mean".to_string());
        }
        Ok(())
    }
}
