//! Training pipeline orchestration
//!
//! This module runs the linear training state machine from the subject CSV to a
//! persisted artifact bundle:
//! `Load → Clean → Categorize → Encode → Select → Scale → Split → Fit → Evaluate → Persist`.
//!
//! The train/test partition is planned before scaling so the scaler only ever sees
//! training rows; `Split` then materializes both partitions from that plan.

use crate::artifacts::ArtifactBundle;
use crate::config::{DetoxConfig, TrainingConfig};
use crate::dataset::{self, SplitPlan};
use crate::encoder::CategoricalEncoders;
use crate::error::DetoxError;
use crate::features::{FeatureEncoder, FeatureVector, FEATURE_COUNT};
use crate::forest::{train_random_forest, ForestParams};
use crate::labels::categorize;
use crate::metrics::EvaluationReport;
use crate::normalizer::StandardScaler;
use crate::types::RiskTier;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// States of the training pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Load,
    Clean,
    Categorize,
    Encode,
    Select,
    Scale,
    Split,
    Fit,
    Evaluate,
    Persist,
}

impl PipelineStage {
    pub const ORDER: [PipelineStage; 10] = [
        PipelineStage::Load,
        PipelineStage::Clean,
        PipelineStage::Categorize,
        PipelineStage::Encode,
        PipelineStage::Select,
        PipelineStage::Scale,
        PipelineStage::Split,
        PipelineStage::Fit,
        PipelineStage::Evaluate,
        PipelineStage::Persist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Load => "load",
            PipelineStage::Clean => "clean",
            PipelineStage::Categorize => "categorize",
            PipelineStage::Encode => "encode",
            PipelineStage::Select => "select",
            PipelineStage::Scale => "scale",
            PipelineStage::Split => "split",
            PipelineStage::Fit => "fit",
            PipelineStage::Evaluate => "evaluate",
            PipelineStage::Persist => "persist",
        }
    }

    /// The stage that must follow this one
    pub fn next(self) -> Option<PipelineStage> {
        let idx = Self::ORDER.iter().position(|&s| s == self)?;
        Self::ORDER.get(idx + 1).copied()
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enforces that stages are entered one after another, in order
#[derive(Debug, Default)]
struct StageTracker {
    current: Option<PipelineStage>,
}

impl StageTracker {
    fn enter(&mut self, stage: PipelineStage) -> Result<(), DetoxError> {
        let expected = match self.current {
            None => Some(PipelineStage::Load),
            Some(current) => current.next(),
        };
        if expected != Some(stage) {
            return Err(DetoxError::Training(format!(
                "Stage {stage} entered out of order (after {:?})",
                self.current
            )));
        }
        self.current = Some(stage);
        debug!(stage = %stage, "entering pipeline stage");
        Ok(())
    }
}

/// Result of a completed training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub bundle: ArtifactBundle,
    /// Directory the bundle was written to
    pub model_dir: PathBuf,
}

impl TrainingOutcome {
    pub fn evaluation(&self) -> &EvaluationReport {
        &self.bundle.manifest.evaluation
    }
}

/// Training pipeline from a subject CSV to a persisted artifact bundle
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    csv_path: PathBuf,
    model_dir: PathBuf,
    test_ratio: f64,
    forest: ForestParams,
}

impl TrainingPipeline {
    pub fn new(
        csv_path: impl Into<PathBuf>,
        model_dir: impl Into<PathBuf>,
        training: &TrainingConfig,
    ) -> Self {
        Self {
            csv_path: csv_path.into(),
            model_dir: model_dir.into(),
            test_ratio: training.test_ratio,
            forest: training.forest_params(),
        }
    }

    pub fn from_config(config: &DetoxConfig) -> Self {
        Self::new(
            &config.data.csv_path,
            &config.output.model_dir,
            &config.training,
        )
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Run every stage; nothing is written unless all earlier stages succeed
    pub fn run(&self) -> Result<TrainingOutcome, DetoxError> {
        let mut stages = StageTracker::default();

        // Stage 1: Load the CSV, discarding identifying columns
        stages.enter(PipelineStage::Load)?;
        let loaded = dataset::load_csv(&self.csv_path)?;
        if !loaded.discarded_columns.is_empty() {
            debug!(columns = ?loaded.discarded_columns, "discarded identifying columns");
        }

        // Stage 2: Drop incomplete rows
        stages.enter(PipelineStage::Clean)?;
        let cleaned = dataset::clean(loaded.records)?;
        let records = cleaned.records;
        info!(
            usable_rows = records.len(),
            dropped_rows = cleaned.dropped_rows,
            "cleaned training data"
        );

        // Stage 3: Derive risk tiers from the raw score
        stages.enter(PipelineStage::Categorize)?;
        let labels: Vec<usize> = records
            .iter()
            .map(|r| categorize(r.addiction_level).index())
            .collect();
        let mut tier_counts = [0usize; RiskTier::COUNT];
        for &label in &labels {
            tier_counts[label] += 1;
        }
        info!(
            low = tier_counts[0],
            medium = tier_counts[1],
            high = tier_counts[2],
            "categorized addiction scores"
        );

        // Stage 4: Fit the categorical encoders
        stages.enter(PipelineStage::Encode)?;
        let encoders = CategoricalEncoders::fit(&records)?;
        debug!(
            genders = encoders.gender.classes().len(),
            purposes = encoders.purpose.classes().len(),
            grades = encoders.grade.classes().len(),
            "fitted categorical encoders"
        );

        // Stage 5: Build the fixed-order feature vectors
        stages.enter(PipelineStage::Select)?;
        let feature_encoder = FeatureEncoder::new(&encoders);
        let vectors: Vec<FeatureVector> = records
            .iter()
            .map(|r| feature_encoder.encode(&r.profile))
            .collect::<Result<_, _>>()?;
        debug!(rows = vectors.len(), features = FEATURE_COUNT, "selected features");

        // Stage 6: Plan the split, fit the scaler on training rows only
        stages.enter(PipelineStage::Scale)?;
        let plan = SplitPlan::new(vectors.len(), self.test_ratio, self.forest.seed)?;
        let train_rows: Vec<FeatureVector> = plan.train.iter().map(|&i| vectors[i]).collect();
        let scaler = StandardScaler::fit(&train_rows)?;
        let scaled: Vec<FeatureVector> = vectors.iter().map(|v| scaler.transform(v)).collect();

        // Stage 7: Materialize both partitions
        stages.enter(PipelineStage::Split)?;
        let (x_train, y_train) = gather(&scaled, &labels, &plan.train);
        let (x_test, y_test) = gather(&scaled, &labels, &plan.test);
        info!(train = x_train.len(), test = x_test.len(), "split dataset");

        // Stage 8: Grow the forest
        stages.enter(PipelineStage::Fit)?;
        let model = train_random_forest(&x_train, &y_train, RiskTier::COUNT, &self.forest)?;
        info!(trees = model.trees.len(), "trained random forest");

        // Stage 9: Score the held-out partition
        stages.enter(PipelineStage::Evaluate)?;
        let predicted: Vec<usize> = x_test.iter().map(|x| model.predict(x)).collect();
        let evaluation = EvaluationReport::from_predictions(
            &y_test,
            &predicted,
            x_train.len(),
            cleaned.dropped_rows,
        );
        info!(
            "Model Training Accuracy: {:.2}%",
            evaluation.accuracy_percent()
        );

        // Stage 10: Persist the matched artifact set
        stages.enter(PipelineStage::Persist)?;
        let bundle = ArtifactBundle::new(model, scaler, encoders, evaluation);
        bundle.save(&self.model_dir)?;

        Ok(TrainingOutcome {
            bundle,
            model_dir: self.model_dir.clone(),
        })
    }
}

fn gather(
    rows: &[FeatureVector],
    labels: &[usize],
    indices: &[usize],
) -> (Vec<FeatureVector>, Vec<usize>) {
    indices.iter().map(|&i| (rows[i], labels[i])).unzip()
}

/// Run the training pipeline described by `config`
pub fn run_training(config: &DetoxConfig) -> Result<TrainingOutcome, DetoxError> {
    TrainingPipeline::from_config(config).run()
}
