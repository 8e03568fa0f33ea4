//! Gemini multimodal screenshot analyzer

use super::compress::{compress_screenshot, CompressionSettings};
use super::{ScreenshotAnalyzer, ScreenshotImage};
use crate::config::VisionConfig;
use crate::error::DetoxError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Returned when the API rejects the request for quota reasons
pub const RATE_LIMIT_MESSAGE: &str =
    "API Limit Reached. Even with compression, try only 2-3 images.";

/// Instruction sent along with the screenshots
pub const EXTRACTION_PROMPT: &str = r#"Analyze these screen-time screenshots and merge the data into one JSON object.
Return ONLY this JSON structure:
{
    "Daily_Usage_Hours": float,
    "Phone_Checks_Per_Day": int,
    "Time_on_Social_Media": float,
    "Device_Type": "iOS" or "Android"
}
Rules: Convert time to decimal hours. If data spans multiple images, sum it up or average it logically."#;

/// Characters of an upstream error message kept in the surfaced message
const MAX_ERROR_CHARS: usize = 100;

/// Screenshot analyzer backed by the Gemini generate-content API.
///
/// Each screenshot is compressed before upload; unreadable ones are skipped. No retry
/// is attempted on failure.
pub struct GeminiAnalyzer {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
    compression: CompressionSettings,
}

impl GeminiAnalyzer {
    pub fn new(config: &VisionConfig, api_key: impl Into<String>) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build();
        Self {
            agent,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            compression: CompressionSettings::from(config),
        }
    }

    /// Build from config, reading the API key from the configured environment variable
    pub fn from_config(config: &VisionConfig) -> Result<Self, DetoxError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                extraction_failed(&format!("{} is not set", config.api_key_env))
            })?;
        Ok(Self::new(config, api_key))
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn request_body(&self, images: &[ScreenshotImage]) -> Result<Value, DetoxError> {
        let mut parts = vec![json!({ "text": EXTRACTION_PROMPT })];
        for image in images {
            match compress_screenshot(&image.bytes, &self.compression) {
                Ok(jpeg) => parts.push(json!({
                    "inline_data": {
                        "mime_type": "image/jpeg",
                        "data": STANDARD.encode(jpeg),
                    }
                })),
                Err(e) => warn!(image = %image.name, error = %e, "skipping unreadable screenshot"),
            }
        }

        if parts.len() == 1 {
            return Err(extraction_failed("no readable screenshots"));
        }
        debug!(images = parts.len() - 1, "built extraction request");

        Ok(json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "responseMimeType": "application/json" }
        }))
    }
}

impl ScreenshotAnalyzer for GeminiAnalyzer {
    fn analyze(&self, images: &[ScreenshotImage]) -> Result<Value, DetoxError> {
        let body = self.request_body(images)?;

        let response = self
            .agent
            .post(&self.url())
            .set("x-goog-api-key", &self.api_key)
            .send_json(body);

        match response {
            Ok(response) => {
                let payload: Value = response
                    .into_json()
                    .map_err(|e| extraction_failed(&e.to_string()))?;
                candidate_json(&payload)
            }
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(status_error(code, &body))
            }
            Err(e) => Err(extraction_failed(&e.to_string())),
        }
    }
}

fn extraction_failed(message: &str) -> DetoxError {
    let truncated: String = message.chars().take(MAX_ERROR_CHARS).collect();
    DetoxError::ExternalExtraction(format!("Extraction failed: {truncated}"))
}

fn status_error(code: u16, body: &str) -> DetoxError {
    if code == 429 {
        return DetoxError::ExternalExtraction(RATE_LIMIT_MESSAGE.to_string());
    }
    extraction_failed(&format!("{code} {body}"))
}

/// Parse the JSON document the model wrote into its first candidate
fn candidate_json(payload: &Value) -> Result<Value, DetoxError> {
    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| extraction_failed("response has no candidates"))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced.trim()).map_err(|e| extraction_failed(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn analyzer() -> GeminiAnalyzer {
        GeminiAnalyzer::new(&VisionConfig::default(), "test-key")
    }

    fn png() -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(1200, 600, Rgb([250, 250, 250])))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn message(err: DetoxError) -> String {
        match err {
            DetoxError::ExternalExtraction(message) => message,
            other => panic!("expected ExternalExtraction, got {other:?}"),
        }
    }

    #[test]
    fn test_url_uses_model_name() {
        assert_eq!(
            analyzer().url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_request_body_skips_unreadable_images() {
        let images = vec![
            ScreenshotImage::new("good.png", png()),
            ScreenshotImage::new("bad.png", b"broken".to_vec()),
        ];
        let body = analyzer().request_body(&images).unwrap();

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], EXTRACTION_PROMPT);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_no_readable_images_fails_before_sending() {
        let images = vec![ScreenshotImage::new("bad.png", b"broken".to_vec())];
        let err = analyzer().request_body(&images).unwrap_err();
        assert!(message(err).starts_with("Extraction failed: "));
    }

    #[test]
    fn test_rate_limit_message() {
        assert_eq!(message(status_error(429, "RESOURCE_EXHAUSTED")), RATE_LIMIT_MESSAGE);
    }

    #[test]
    fn test_other_failures_are_truncated() {
        let long = "x".repeat(500);
        let msg = message(status_error(500, &long));
        assert!(msg.starts_with("Extraction failed: 500 "));
        assert_eq!(msg.chars().count(), "Extraction failed: ".len() + MAX_ERROR_CHARS);
    }

    #[test]
    fn test_candidate_json_handles_fences() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "```json\n{\"Daily_Usage_Hours\": 3.5}\n```" }] }
            }]
        });
        let value = candidate_json(&payload).unwrap();
        assert_eq!(value["Daily_Usage_Hours"], 3.5);
    }

    #[test]
    fn test_candidate_json_without_candidates_fails() {
        assert!(candidate_json(&json!({ "promptFeedback": {} })).is_err());
    }

    #[test]
    fn test_missing_api_key() {
        let config = VisionConfig {
            api_key_env: "DETOX_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..VisionConfig::default()
        };
        let err = GeminiAnalyzer::from_config(&config).err().unwrap();
        assert!(message(err).contains("DETOX_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
