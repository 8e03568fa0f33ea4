//! Inference adapter
//!
//! Bridges the screenshot collaborator and the trained bundle: screenshots go to the
//! analyzer, the extracted observation is merged into the placeholder profile, the
//! resulting vector is encoded, scaled and classified. A collaborator error ends the
//! request; the classifier is never consulted on a failed extraction.

use crate::artifacts::ArtifactBundle;
use crate::error::DetoxError;
use crate::types::{ExtractedObservation, Prediction, SubjectProfile};
use crate::vision::{parse_response, ScreenshotAnalyzer, ScreenshotImage, StagedUploads};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Analyzer for adapters that only predict from ready observations
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnalyzer;

impl ScreenshotAnalyzer for NoAnalyzer {
    fn analyze(&self, _images: &[ScreenshotImage]) -> Result<Value, DetoxError> {
        Err(DetoxError::ExternalExtraction(
            "Extraction failed: no screenshot analyzer configured".to_string(),
        ))
    }
}

#[derive(Debug, Default)]
struct InferenceStats {
    extraction_attempts: AtomicU64,
    extraction_failures: AtomicU64,
    classifications: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of the adapter counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Requests sent to the screenshot analyzer
    pub extraction_attempts: u64,
    /// Analyzer errors and unusable responses
    pub extraction_failures: u64,
    /// Times the classifier was invoked
    pub classifications: u64,
    /// Observations rejected before classification (e.g. unseen category)
    pub rejected: u64,
}

/// Screenshot-to-tier adapter over a shared, read-only artifact bundle
pub struct InferenceAdapter<A = NoAnalyzer> {
    bundle: Arc<ArtifactBundle>,
    placeholders: SubjectProfile,
    analyzer: A,
    stats: InferenceStats,
}

impl InferenceAdapter<NoAnalyzer> {
    /// Adapter that predicts from observations but cannot analyze screenshots
    pub fn without_analyzer(bundle: Arc<ArtifactBundle>, placeholders: SubjectProfile) -> Self {
        Self::new(bundle, placeholders, NoAnalyzer)
    }
}

impl<A: ScreenshotAnalyzer> InferenceAdapter<A> {
    pub fn new(bundle: Arc<ArtifactBundle>, placeholders: SubjectProfile, analyzer: A) -> Self {
        Self {
            bundle,
            placeholders,
            analyzer,
            stats: InferenceStats::default(),
        }
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    pub fn placeholders(&self) -> &SubjectProfile {
        &self.placeholders
    }

    /// Replace the values used for unobserved features
    pub fn set_placeholders(&mut self, placeholders: SubjectProfile) {
        self.placeholders = placeholders;
    }

    /// Extract metrics from screenshots and predict the tier
    pub fn analyze(&self, images: &[ScreenshotImage]) -> Result<Prediction, DetoxError> {
        if images.is_empty() {
            return Err(DetoxError::ExternalExtraction(
                "Extraction failed: no screenshots provided".to_string(),
            ));
        }

        self.stats.extraction_attempts.fetch_add(1, Ordering::Relaxed);
        let observation = self
            .analyzer
            .analyze(images)
            .and_then(parse_response)
            .map_err(|e| {
                self.stats.extraction_failures.fetch_add(1, Ordering::Relaxed);
                warn!(images = images.len(), error = %e, "screenshot extraction failed");
                e
            })?;

        self.predict_observation(observation)
    }

    /// Analyze staged uploads; the staging directory is removed before returning
    pub fn analyze_staged(&self, staged: StagedUploads) -> Result<Prediction, DetoxError> {
        let images = staged.load_images();
        drop(staged);
        self.analyze(&images?)
    }

    /// Predict from a collaborator-shaped JSON response
    pub fn predict_response(&self, response: Value) -> Result<Prediction, DetoxError> {
        let observation = parse_response(response).map_err(|e| {
            self.stats.extraction_failures.fetch_add(1, Ordering::Relaxed);
            e
        })?;
        self.predict_observation(observation)
    }

    /// Predict from an already extracted observation
    pub fn predict_observation(
        &self,
        observation: ExtractedObservation,
    ) -> Result<Prediction, DetoxError> {
        let profile = self.placeholders.with_observation(&observation);
        let classification = self.bundle.classify(&profile).map_err(|e| {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            e
        })?;
        self.stats.classifications.fetch_add(1, Ordering::Relaxed);

        info!(
            tier = classification.tier.index(),
            daily_usage_hours = observation.daily_usage_hours,
            phone_checks_per_day = observation.phone_checks_per_day,
            time_on_social_media = observation.time_on_social_media,
            "predicted risk tier"
        );

        Ok(Prediction {
            tier: classification.tier,
            probabilities: classification.probabilities,
            observation,
        })
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            extraction_attempts: self.stats.extraction_attempts.load(Ordering::Relaxed),
            extraction_failures: self.stats.extraction_failures.load(Ordering::Relaxed),
            classifications: self.stats.classifications.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fitted_bundle;
    use crate::types::RiskTier;
    use crate::vision::RATE_LIMIT_MESSAGE;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// Analyzer returning a canned response and counting calls
    struct CannedAnalyzer {
        response: Value,
        calls: AtomicUsize,
    }

    impl CannedAnalyzer {
        fn new(response: Value) -> Self {
            Self {
                response,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ScreenshotAnalyzer for CannedAnalyzer {
        fn analyze(&self, _images: &[ScreenshotImage]) -> Result<Value, DetoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn screenshot() -> Vec<ScreenshotImage> {
        vec![ScreenshotImage::new("shot.png", vec![1, 2, 3])]
    }

    fn light_use() -> Value {
        json!({
            "Daily_Usage_Hours": 2.0,
            "Phone_Checks_Per_Day": 15,
            "Time_on_Social_Media": 0.5,
            "Device_Type": "iOS"
        })
    }

    #[test]
    fn test_rate_limit_error_never_reaches_classifier() {
        let analyzer = CannedAnalyzer::new(json!({ "error": RATE_LIMIT_MESSAGE }));
        let adapter = InferenceAdapter::new(
            Arc::new(fitted_bundle()),
            SubjectProfile::default(),
            analyzer,
        );

        match adapter.analyze(&screenshot()) {
            Err(DetoxError::ExternalExtraction(message)) => {
                assert_eq!(message, RATE_LIMIT_MESSAGE)
            }
            other => panic!("expected ExternalExtraction, got {other:?}"),
        }

        let stats = adapter.stats();
        assert_eq!(stats.extraction_attempts, 1);
        assert_eq!(stats.extraction_failures, 1);
        assert_eq!(stats.classifications, 0);
    }

    #[test]
    fn test_observation_is_echoed_with_prediction() {
        let adapter = InferenceAdapter::new(
            Arc::new(fitted_bundle()),
            SubjectProfile::default(),
            CannedAnalyzer::new(light_use()),
        );

        let prediction = adapter.analyze(&screenshot()).unwrap();
        assert_eq!(prediction.observation.daily_usage_hours, 2.0);
        assert_eq!(prediction.observation.phone_checks_per_day, 15);
        assert_eq!(prediction.observation.time_on_social_media, 0.5);
        assert!((prediction.probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(adapter.stats().classifications, 1);
    }

    #[test]
    fn test_heavy_and_light_use_rank_in_order() {
        let adapter =
            InferenceAdapter::without_analyzer(Arc::new(fitted_bundle()), SubjectProfile::default());

        let light = adapter.predict_response(light_use()).unwrap();
        let heavy = adapter
            .predict_response(json!({
                "Daily_Usage_Hours": 8.5,
                "Phone_Checks_Per_Day": 145,
                "Time_on_Social_Media": 5.0
            }))
            .unwrap();

        assert_eq!(light.tier, RiskTier::Low);
        assert!(heavy.tier > light.tier);
    }

    #[test]
    fn test_empty_upload_is_rejected_without_calling_analyzer() {
        let adapter = InferenceAdapter::new(
            Arc::new(fitted_bundle()),
            SubjectProfile::default(),
            CannedAnalyzer::new(light_use()),
        );

        assert!(matches!(
            adapter.analyze(&[]),
            Err(DetoxError::ExternalExtraction(_))
        ));
        assert_eq!(adapter.analyzer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unseen_placeholder_category_is_rejected() {
        let placeholders = SubjectProfile {
            gender: "Unspecified".to_string(),
            ..SubjectProfile::default()
        };
        let adapter = InferenceAdapter::without_analyzer(Arc::new(fitted_bundle()), placeholders);

        let result = adapter.predict_response(light_use());
        assert!(matches!(result, Err(DetoxError::UnseenCategory { .. })));
        assert_eq!(adapter.stats().rejected, 1);
        assert_eq!(adapter.stats().classifications, 0);
    }

    #[test]
    fn test_staged_uploads_are_cleaned_up() {
        let adapter = InferenceAdapter::new(
            Arc::new(fitted_bundle()),
            SubjectProfile::default(),
            CannedAnalyzer::new(light_use()),
        );
        let mut staged = StagedUploads::new().unwrap();
        staged.add_bytes("shot.png", &[1, 2, 3]).unwrap();
        let staged_dir = staged.dir().to_path_buf();

        adapter.analyze_staged(staged).unwrap();
        assert!(!staged_dir.exists());
    }

    #[test]
    fn test_concurrent_predictions_share_one_bundle() {
        let adapter =
            InferenceAdapter::without_analyzer(Arc::new(fitted_bundle()), SubjectProfile::default());
        let expected = adapter.predict_response(light_use()).unwrap().tier;

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let tier = adapter.predict_response(light_use()).unwrap().tier;
                    assert_eq!(tier, expected);
                });
            }
        });
        assert_eq!(adapter.stats().classifications, 5);
    }
}
