//! Detox Detach - Phone-addiction risk tiers from behavioral records and screenshots
//!
//! Training turns a tabular subject dataset into a persisted classifier through a
//! deterministic pipeline: load → clean → categorize → encode → split → scale →
//! fit → evaluate → persist. Inference extracts three usage metrics from
//! screen-time screenshots, fills the remaining features from a placeholder
//! profile and predicts a Low/Medium/High risk tier.
//!
//! ## Modules
//!
//! - **Training**: [`dataset`], [`labels`], [`encoder`], [`features`], [`normalizer`],
//!   [`forest`], [`metrics`], [`pipeline`], [`artifacts`]
//! - **Inference**: [`vision`], [`inference`], [`status`]

pub mod artifacts;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod features;
pub mod forest;
pub mod inference;
pub mod labels;
pub mod logging;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod status;
pub mod types;
pub mod vision;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

#[cfg(test)]
mod test_support;

pub use artifacts::ArtifactBundle;
pub use config::DetoxConfig;
pub use error::DetoxError;
pub use features::{FeatureEncoder, FEATURE_COUNT, FEATURE_NAMES};
pub use inference::InferenceAdapter;
pub use labels::categorize;
pub use pipeline::{run_training, TrainingPipeline};
pub use types::{ExtractedObservation, Prediction, RiskTier, SubjectProfile};

// Screenshot exports
pub use vision::{GeminiAnalyzer, ScreenshotAnalyzer, StagedUploads};

/// Library version recorded in every artifact manifest
pub const DETOX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name recorded in every artifact manifest
pub const PRODUCER_NAME: &str = "detox-detach";
