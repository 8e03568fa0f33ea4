//! TOML configuration
//!
//! All sections are optional; anything left out falls back to the defaults below.
//!
//! ```toml
//! [data]
//! csv_path = "data/teen_phone_addiction_dataset.csv"
//!
//! [output]
//! model_dir = "models"
//!
//! [training]
//! seed = 42
//! test_ratio = 0.2
//! n_trees = 500
//! max_features = "sqrt"
//!
//! [placeholders]
//! age = 16.0
//! gender = "Male"
//!
//! [vision]
//! model = "gemini-2.0-flash"
//! api_key_env = "GEMINI_API_KEY"
//! ```

use crate::error::DetoxError;
use crate::forest::{ForestParams, MaxFeatures};
use crate::types::SubjectProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "detox.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetoxConfig {
    pub data: DataConfig,
    pub output: OutputConfig,
    pub training: TrainingConfig,
    /// Values used for the feature slots a screenshot cannot observe
    pub placeholders: SubjectProfile,
    pub vision: VisionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub csv_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/teen_phone_addiction_dataset.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub model_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Seed for the split shuffle and the forest
    pub seed: u64,
    /// Fraction of cleaned rows held out for evaluation
    pub test_ratio: f64,
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Grow each tree on a bootstrap sample of the training rows
    pub bootstrap: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let forest = ForestParams::default();
        Self {
            seed: 42,
            test_ratio: 0.2,
            n_trees: forest.n_trees,
            max_depth: forest.max_depth,
            min_samples_split: forest.min_samples_split,
            min_samples_leaf: forest.min_samples_leaf,
            max_features: forest.max_features,
            bootstrap: forest.bootstrap,
        }
    }
}

impl TrainingConfig {
    /// Forest hyper-parameters for this training run
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            bootstrap: self.bootstrap,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Multimodal model name
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Base URL of the generate-content API
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Screenshots wider than this are downscaled before upload
    pub max_width: u32,
    pub jpeg_quality: u8,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
            max_width: 800,
            jpeg_quality: 70,
        }
    }
}

impl DetoxConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, DetoxError> {
        let config: DetoxConfig =
            toml::from_str(text).map_err(|e| DetoxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path; the file must exist
    pub fn load(path: &Path) -> Result<Self, DetoxError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DetoxError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Load `path`, or `detox.toml` if present, or fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, DetoxError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), DetoxError> {
        let training = &self.training;
        if !(training.test_ratio > 0.0 && training.test_ratio < 1.0) {
            return Err(DetoxError::Config(format!(
                "training.test_ratio must be between 0 and 1, got {}",
                training.test_ratio
            )));
        }
        training
            .forest_params()
            .validate()
            .map_err(|e| DetoxError::Config(format!("training: {e}")))?;

        if self.vision.max_width == 0 {
            return Err(DetoxError::Config(
                "vision.max_width must be positive".to_string(),
            ));
        }
        if !(1..=100).contains(&self.vision.jpeg_quality) {
            return Err(DetoxError::Config(format!(
                "vision.jpeg_quality must be 1-100, got {}",
                self.vision.jpeg_quality
            )));
        }
        Ok(())
    }
}
