//! Screenshot downscaling and JPEG re-encoding

use crate::config::VisionConfig;
use crate::error::DetoxError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

/// How screenshots are shrunk before upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    /// Wider images are downscaled to this width
    pub max_width: u32,
    pub jpeg_quality: u8,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_width: 800,
            jpeg_quality: 70,
        }
    }
}

impl From<&VisionConfig> for CompressionSettings {
    fn from(config: &VisionConfig) -> Self {
        Self {
            max_width: config.max_width,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// Decode a screenshot, cap its width (aspect ratio kept) and re-encode as JPEG
pub fn compress_screenshot(
    bytes: &[u8],
    settings: &CompressionSettings,
) -> Result<Vec<u8>, DetoxError> {
    let img = image::load_from_memory(bytes).map_err(|e| DetoxError::Image(e.to_string()))?;

    let img = if img.width() > settings.max_width {
        let height = (img.height() as u64 * settings.max_width as u64 / img.width() as u64).max(1);
        img.resize_exact(settings.max_width, height as u32, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, settings.jpeg_quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| DetoxError::Image(e.to_string()))?;
    Ok(out)
}
