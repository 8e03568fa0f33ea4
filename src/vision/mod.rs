//! Screenshot analysis collaborator
//!
//! Screen-time screenshots are turned into an [`ExtractedObservation`] by an external
//! multimodal service. This module holds the collaborator contract and everything
//! around it:
//! - Response parsing (an observation object or `{"error": "..."}`)
//! - Screenshot compression before upload
//! - Temporary staging of uploads with guaranteed cleanup
//! - The HTTP client for the Gemini generate-content API

mod compress;
mod gemini;
mod staging;

pub use compress::{compress_screenshot, CompressionSettings};
pub use gemini::{GeminiAnalyzer, EXTRACTION_PROMPT, RATE_LIMIT_MESSAGE};
pub use staging::{is_supported_image, StagedUploads, SUPPORTED_EXTENSIONS};

use crate::error::DetoxError;
use crate::types::ExtractedObservation;
use serde_json::Value;

/// Upper bound on any hours-per-day metric
const HOURS_PER_DAY: f64 = 24.0;

/// One screenshot as uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ScreenshotImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// External service extracting screen-time metrics from screenshots.
///
/// Implementations return the collaborator's JSON response as-is: either an
/// observation object or an error object. Transport failures are returned as
/// `DetoxError::ExternalExtraction`.
pub trait ScreenshotAnalyzer {
    fn analyze(&self, images: &[ScreenshotImage]) -> Result<Value, DetoxError>;
}

impl<T: ScreenshotAnalyzer + ?Sized> ScreenshotAnalyzer for Box<T> {
    fn analyze(&self, images: &[ScreenshotImage]) -> Result<Value, DetoxError> {
        (**self).analyze(images)
    }
}

/// Interpret a collaborator response.
///
/// An `error` key is surfaced verbatim; any other shape that is not a complete
/// observation is an extraction failure too.
pub fn parse_response(response: Value) -> Result<ExtractedObservation, DetoxError> {
    if let Some(error) = response.get("error") {
        let message = match error {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        };
        return Err(DetoxError::ExternalExtraction(message));
    }

    if !response.is_object() {
        return Err(DetoxError::ExternalExtraction(format!(
            "Extraction failed: expected a JSON object, got {response}"
        )));
    }

    let observation: ExtractedObservation = serde_json::from_value(response).map_err(|e| {
        DetoxError::ExternalExtraction(format!("Extraction failed: unexpected response shape: {e}"))
    })?;

    for (name, hours) in [
        ("Daily_Usage_Hours", observation.daily_usage_hours),
        ("Time_on_Social_Media", observation.time_on_social_media),
    ] {
        if !hours.is_finite() || !(0.0..=HOURS_PER_DAY).contains(&hours) {
            return Err(DetoxError::ExternalExtraction(format!(
                "Extraction failed: {name} out of range ({hours})"
            )));
        }
    }

    Ok(observation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceType;
    use serde_json::json;

    #[test]
    fn test_parse_observation() {
        let observation = parse_response(json!({
            "Daily_Usage_Hours": 2.0,
            "Phone_Checks_Per_Day": 15,
            "Time_on_Social_Media": 0.5,
            "Device_Type": "Android"
        }))
        .unwrap();

        assert_eq!(observation.daily_usage_hours, 2.0);
        assert_eq!(observation.phone_checks_per_day, 15);
        assert_eq!(observation.device_type, Some(DeviceType::Android));
    }

    #[test]
    fn test_device_type_is_optional() {
        let observation = parse_response(json!({
            "Daily_Usage_Hours": 5.25,
            "Phone_Checks_Per_Day": 80,
            "Time_on_Social_Media": 2.0
        }))
        .unwrap();
        assert_eq!(observation.device_type, None);
    }

    #[test]
    fn test_error_object_is_surfaced_verbatim() {
        let result = parse_response(json!({ "error": RATE_LIMIT_MESSAGE }));
        match result {
            Err(DetoxError::ExternalExtraction(message)) => {
                assert_eq!(message, RATE_LIMIT_MESSAGE)
            }
            other => panic!("expected ExternalExtraction, got {other:?}"),
        }
    }

    #[test]
    fn test_unexpected_shapes_are_extraction_errors() {
        for response in [
            json!({ "Daily_Usage_Hours": 2.0, "Time_on_Social_Media": 0.5 }),
            json!({ "Daily_Usage_Hours": "two", "Phone_Checks_Per_Day": 15, "Time_on_Social_Media": 0.5 }),
            json!({ "Daily_Usage_Hours": 2.0, "Phone_Checks_Per_Day": -3, "Time_on_Social_Media": 0.5 }),
            json!({ "Daily_Usage_Hours": 30.0, "Phone_Checks_Per_Day": 15, "Time_on_Social_Media": 0.5 }),
            json!([1, 2, 3]),
            json!([2.0, 15, 0.5]),
            json!("2.0, 15, 0.5"),
            json!(null),
        ] {
            let result = parse_response(response.clone());
            assert!(
                matches!(result, Err(DetoxError::ExternalExtraction(_))),
                "{response} should be rejected"
            );
        }
    }

    #[test]
    fn test_positional_array_is_not_an_observation() {
        match parse_response(json!([2.0, 15, 0.5])) {
            Err(DetoxError::ExternalExtraction(message)) => {
                assert!(message.starts_with("Extraction failed"), "{message}")
            }
            other => panic!("expected ExternalExtraction, got {other:?}"),
        }
    }
}
