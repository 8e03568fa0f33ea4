//! Persisted model artifacts
//!
//! A trained model is a matched set of five JSON files plus a manifest:
//!
//! | File | Contents |
//! |---|---|
//! | `addiction_model.json` | Random forest |
//! | `scaler.json` | Standard scaler |
//! | `gender_encoder.json` | `Gender` label encoder |
//! | `purpose_encoder.json` | `Phone_Usage_Purpose` label encoder |
//! | `grade_encoder.json` | `School_Grade` label encoder |
//! | `manifest.json` | Bundle id, provenance and evaluation |
//!
//! Every artifact file carries the bundle id of the training run that wrote it. The
//! manifest is removed first and written last, so an interrupted save never leaves a
//! loadable set behind. Loading fails with `ArtifactMismatch` on any missing file,
//! corrupt file, foreign bundle id or feature-count mismatch.

use crate::encoder::{CategoricalEncoders, CategoricalField, LabelEncoder};
use crate::error::DetoxError;
use crate::features::{FeatureEncoder, FEATURE_COUNT, FEATURE_NAMES};
use crate::forest::RandomForest;
use crate::metrics::EvaluationReport;
use crate::normalizer::StandardScaler;
use crate::types::{Classification, RiskTier, SubjectProfile};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Artifact bundle format version
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

pub const MODEL_FILE: &str = "addiction_model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const GENDER_ENCODER_FILE: &str = "gender_encoder.json";
pub const PURPOSE_ENCODER_FILE: &str = "purpose_encoder.json";
pub const GRADE_ENCODER_FILE: &str = "grade_encoder.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// The five artifact files, in write order
pub const ARTIFACT_FILES: [&str; 5] = [
    MODEL_FILE,
    SCALER_FILE,
    GENDER_ENCODER_FILE,
    PURPOSE_ENCODER_FILE,
    GRADE_ENCODER_FILE,
];

/// Producer information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
}

/// Provenance and evaluation of a trained bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub bundle_id: Uuid,
    pub producer: Producer,
    pub trained_at: DateTime<Utc>,
    /// Feature order the model was trained on
    pub feature_names: Vec<String>,
    pub seed: u64,
    pub evaluation: EvaluationReport,
    pub files: Vec<String>,
}

/// Artifact file envelope
#[derive(Serialize, Deserialize)]
struct Stamped<T> {
    bundle_id: Uuid,
    artifact: T,
}

/// Classifier, scaler and encoders from one training run.
///
/// Read-only once built; share it behind an `Arc` for concurrent predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub manifest: Manifest,
    pub model: RandomForest,
    pub scaler: StandardScaler,
    pub encoders: CategoricalEncoders,
}

impl ArtifactBundle {
    /// Assemble a bundle under a fresh bundle id
    pub fn new(
        model: RandomForest,
        scaler: StandardScaler,
        encoders: CategoricalEncoders,
        evaluation: EvaluationReport,
    ) -> Self {
        let manifest = Manifest {
            format_version: BUNDLE_FORMAT_VERSION,
            bundle_id: Uuid::new_v4(),
            producer: Producer {
                name: crate::PRODUCER_NAME.to_string(),
                version: crate::DETOX_VERSION.to_string(),
            },
            trained_at: Utc::now(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            seed: model.params.seed,
            evaluation,
            files: ARTIFACT_FILES.iter().map(|s| s.to_string()).collect(),
        };
        Self {
            manifest,
            model,
            scaler,
            encoders,
        }
    }

    pub fn bundle_id(&self) -> Uuid {
        self.manifest.bundle_id
    }

    /// Encode, scale and classify one subject profile
    pub fn classify(&self, profile: &SubjectProfile) -> Result<Classification, DetoxError> {
        let features = FeatureEncoder::new(&self.encoders).encode(profile)?;
        let scaled = self.scaler.transform(&features);

        let proba = self.model.predict_proba(&scaled);
        let mut probabilities = [0.0; RiskTier::COUNT];
        for (slot, p) in probabilities.iter_mut().zip(&proba) {
            *slot = *p;
        }
        let tier = RiskTier::from_index(self.model.predict(&scaled)).ok_or_else(|| {
            DetoxError::ArtifactMismatch("Model predicted a class outside the tier range".into())
        })?;

        Ok(Classification {
            tier,
            probabilities,
        })
    }

    /// Write the bundle to `dir`
    pub fn save(&self, dir: &Path) -> Result<(), DetoxError> {
        std::fs::create_dir_all(dir)?;

        let manifest_path = dir.join(MANIFEST_FILE);
        if manifest_path.exists() {
            std::fs::remove_file(&manifest_path)?;
        }

        let id = self.bundle_id();
        write_stamped(dir, MODEL_FILE, id, &self.model)?;
        write_stamped(dir, SCALER_FILE, id, &self.scaler)?;
        write_stamped(dir, GENDER_ENCODER_FILE, id, &self.encoders.gender)?;
        write_stamped(dir, PURPOSE_ENCODER_FILE, id, &self.encoders.purpose)?;
        write_stamped(dir, GRADE_ENCODER_FILE, id, &self.encoders.grade)?;
        write_atomic(dir, MANIFEST_FILE, &self.manifest)?;

        info!(dir = %dir.display(), bundle_id = %id, "saved model artifacts");
        Ok(())
    }

    /// Load and cross-check a bundle from `dir`
    pub fn load(dir: &Path) -> Result<Self, DetoxError> {
        let manifest: Manifest = read_json(dir, MANIFEST_FILE)?;
        if manifest.format_version != BUNDLE_FORMAT_VERSION {
            return Err(DetoxError::ArtifactMismatch(format!(
                "Unsupported bundle format version {} (expected {BUNDLE_FORMAT_VERSION})",
                manifest.format_version
            )));
        }
        if manifest.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(DetoxError::ArtifactMismatch(format!(
                "Manifest lists {} features that do not match the expected {FEATURE_COUNT}-feature order",
                manifest.feature_names.len()
            )));
        }

        let id = manifest.bundle_id;
        let model: RandomForest = read_stamped(dir, MODEL_FILE, id)?;
        let scaler: StandardScaler = read_stamped(dir, SCALER_FILE, id)?;
        let encoders = CategoricalEncoders {
            gender: read_encoder(dir, GENDER_ENCODER_FILE, id, CategoricalField::Gender)?,
            purpose: read_encoder(
                dir,
                PURPOSE_ENCODER_FILE,
                id,
                CategoricalField::PhoneUsagePurpose,
            )?,
            grade: read_encoder(dir, GRADE_ENCODER_FILE, id, CategoricalField::SchoolGrade)?,
        };

        model
            .validate()
            .map_err(|e| DetoxError::ArtifactMismatch(format!("{MODEL_FILE}: {e}")))?;
        if model.n_features != FEATURE_COUNT {
            return Err(DetoxError::ArtifactMismatch(format!(
                "Model expects {} features but vectors have {FEATURE_COUNT}",
                model.n_features
            )));
        }
        if model.n_classes != RiskTier::COUNT {
            return Err(DetoxError::ArtifactMismatch(format!(
                "Model has {} classes but there are {} risk tiers",
                model.n_classes,
                RiskTier::COUNT
            )));
        }
        scaler
            .validate()
            .map_err(|e| DetoxError::ArtifactMismatch(format!("{SCALER_FILE}: {e}")))?;

        debug!(dir = %dir.display(), bundle_id = %id, trees = model.trees.len(), "loaded model artifacts");

        Ok(Self {
            manifest,
            model,
            scaler,
            encoders,
        })
    }
}

fn write_stamped<T: Serialize>(
    dir: &Path,
    name: &str,
    bundle_id: Uuid,
    artifact: &T,
) -> Result<(), DetoxError> {
    write_atomic(
        dir,
        name,
        &Stamped {
            bundle_id,
            artifact,
        },
    )
}

/// Write to a temp file in `dir`, then rename over the target
fn write_atomic<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<(), DetoxError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut tmp, value)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|e| DetoxError::Io(e.error))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T, DetoxError> {
    let path = dir.join(name);
    let text = std::fs::read_to_string(&path).map_err(|e| {
        DetoxError::ArtifactMismatch(format!("Cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| DetoxError::ArtifactMismatch(format!("Corrupt {name}: {e}")))
}

fn read_stamped<T: DeserializeOwned>(
    dir: &Path,
    name: &str,
    bundle_id: Uuid,
) -> Result<T, DetoxError> {
    let stamped: Stamped<T> = read_json(dir, name)?;
    if stamped.bundle_id != bundle_id {
        return Err(DetoxError::ArtifactMismatch(format!(
            "{name} belongs to bundle {} but the manifest is for {bundle_id}",
            stamped.bundle_id
        )));
    }
    Ok(stamped.artifact)
}

fn read_encoder(
    dir: &Path,
    name: &str,
    bundle_id: Uuid,
    expected: CategoricalField,
) -> Result<LabelEncoder, DetoxError> {
    let encoder: LabelEncoder = read_stamped(dir, name, bundle_id)?;
    if encoder.field() != expected {
        return Err(DetoxError::ArtifactMismatch(format!(
            "{name} encodes {} instead of {}",
            encoder.field().as_str(),
            expected.as_str()
        )));
    }
    encoder
        .validate()
        .map_err(|e| DetoxError::ArtifactMismatch(format!("{name}: {e}")))?;
    Ok(encoder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fitted_bundle;
    use pretty_assertions::assert_eq;

    fn assert_mismatch(result: Result<ArtifactBundle, DetoxError>) {
        match result {
            Err(DetoxError::ArtifactMismatch(_)) => {}
            Err(other) => panic!("expected ArtifactMismatch, got {other:?}"),
            Ok(_) => panic!("expected ArtifactMismatch, got a bundle"),
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = fitted_bundle();
        bundle.save(dir.path()).unwrap();

        for name in ARTIFACT_FILES.iter().chain(std::iter::once(&MANIFEST_FILE)) {
            assert!(dir.path().join(name).exists(), "{name} missing");
        }

        let loaded = ArtifactBundle::load(dir.path()).unwrap();
        assert_eq!(loaded.bundle_id(), bundle.bundle_id());
        assert_eq!(loaded.encoders, bundle.encoders);
        assert_eq!(loaded.scaler, bundle.scaler);
        assert_eq!(loaded.model, bundle.model);

        let profile = crate::types::SubjectProfile::default();
        assert_eq!(
            loaded.classify(&profile).unwrap().tier,
            bundle.classify(&profile).unwrap().tier
        );
    }

    #[test]
    fn test_missing_scaler_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        fitted_bundle().save(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(SCALER_FILE)).unwrap();

        assert_mismatch(ArtifactBundle::load(dir.path()));
    }

    #[test]
    fn test_missing_manifest_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        fitted_bundle().save(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(MANIFEST_FILE)).unwrap();

        assert_mismatch(ArtifactBundle::load(dir.path()));
    }

    #[test]
    fn test_empty_directory_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        assert_mismatch(ArtifactBundle::load(dir.path()));
    }

    #[test]
    fn test_artifact_from_another_run_is_mismatch() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fitted_bundle().save(first.path()).unwrap();
        fitted_bundle().save(second.path()).unwrap();

        std::fs::copy(
            second.path().join(GRADE_ENCODER_FILE),
            first.path().join(GRADE_ENCODER_FILE),
        )
        .unwrap();

        assert_mismatch(ArtifactBundle::load(first.path()));
    }

    #[test]
    fn test_corrupt_model_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        fitted_bundle().save(dir.path()).unwrap();
        std::fs::write(dir.path().join(MODEL_FILE), "{ not json").unwrap();

        assert_mismatch(ArtifactBundle::load(dir.path()));
    }

    #[test]
    fn test_swapped_encoders_are_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        fitted_bundle().save(dir.path()).unwrap();
        let gender = dir.path().join(GENDER_ENCODER_FILE);
        let grade = dir.path().join(GRADE_ENCODER_FILE);
        let gender_text = std::fs::read_to_string(&gender).unwrap();
        std::fs::copy(&grade, &gender).unwrap();
        std::fs::write(&grade, gender_text).unwrap();

        assert_mismatch(ArtifactBundle::load(dir.path()));
    }

    #[test]
    fn test_resave_replaces_previous_bundle() {
        let dir = tempfile::tempdir().unwrap();
        fitted_bundle().save(dir.path()).unwrap();
        let second = fitted_bundle();
        second.save(dir.path()).unwrap();

        let loaded = ArtifactBundle::load(dir.path()).unwrap();
        assert_eq!(loaded.bundle_id(), second.bundle_id());
    }

    #[test]
    fn test_reload_is_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = fitted_bundle();
        bundle.save(dir.path()).unwrap();

        let loaded = ArtifactBundle::load(dir.path()).unwrap();
        for (saved, restored) in bundle.scaler.scale().iter().zip(loaded.scaler.scale()) {
            assert_eq!(saved.to_bits(), restored.to_bits());
        }
        for (saved, restored) in bundle.scaler.mean().iter().zip(loaded.scaler.mean()) {
            assert_eq!(saved.to_bits(), restored.to_bits());
        }
        assert!(loaded.model == bundle.model && loaded.scaler == bundle.scaler);
    }
}
