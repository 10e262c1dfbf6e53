use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::fmt;
use std::path::PathBuf;

use crate::utils::{is_supported_source, optimized_output_path};
use crate::TargetFormat;

/// One file's conversion parameters, snapshotted at submission time.
/// Immutable once constructed; later parameter changes never reach it.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source_path: PathBuf,
    pub max_dimension: u32,
    pub target_format: TargetFormat,
    pub quality: u8,
}

/// Result of one conversion, produced exactly once per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub source_path: PathBuf,
    pub status: OutcomeStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// A new encoded file was written beside the source
    Converted {
        output_path: PathBuf,
        output_bytes: u64,
    },
    /// The source extension is not in the supported set; nothing was read
    Unsupported,
    /// Decode, encode or write failed; nothing was written
    Failed { message: String },
}

/// Per-request failure taxonomy
#[derive(Debug)]
pub enum TransformError {
    Decode(String),
    Encode(String),
    Io(std::io::Error),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::Decode(message) => write!(f, "decode failed: {message}"),
            TransformError::Encode(message) => write!(f, "encode failed: {message}"),
            TransformError::Io(error) => write!(f, "write failed: {error}"),
        }
    }
}

impl std::error::Error for TransformError {}

/// A per-file conversion step executed on pool workers.
///
/// Implementations must be infallible at the call boundary: every error is
/// absorbed into the returned outcome so a worker thread never unwinds.
pub trait Transform: Send + Sync {
    fn transform(&self, request: &ConversionRequest) -> ConversionOutcome;
}

/// The production transform: decode, bound-preserving resize, re-encode
#[derive(Debug, Default)]
pub struct ImageTransform;

impl ImageTransform {
    pub fn new() -> Self {
        Self
    }

    fn convert(&self, request: &ConversionRequest) -> Result<(PathBuf, u64), TransformError> {
        let img = image::open(&request.source_path)
            .map_err(|e| TransformError::Decode(e.to_string()))?;

        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(TransformError::Decode(format!(
                "invalid image dimensions: {width}x{height}"
            )));
        }

        let (target_width, target_height) = bounded_dimensions(width, height, request.max_dimension);
        let img = if (target_width, target_height) != (width, height) {
            log::debug!(
                "Resizing {} from {}x{} to {}x{}",
                request.source_path.display(),
                width,
                height,
                target_width,
                target_height
            );
            img.resize_exact(target_width, target_height, FilterType::Lanczos3)
        } else {
            img
        };

        let img = normalize_color(img, request.target_format);
        let encoded = encode(&img, request.target_format, request.quality)?;

        // Encoding happens fully in memory, so a failed request never leaves
        // a partial file behind.
        let output_path = optimized_output_path(&request.source_path, request.target_format);
        std::fs::write(&output_path, &encoded).map_err(TransformError::Io)?;

        Ok((output_path, encoded.len() as u64))
    }
}

impl Transform for ImageTransform {
    fn transform(&self, request: &ConversionRequest) -> ConversionOutcome {
        if !is_supported_source(&request.source_path) {
            return ConversionOutcome {
                source_path: request.source_path.clone(),
                status: OutcomeStatus::Unsupported,
            };
        }

        let status = match self.convert(request) {
            Ok((output_path, output_bytes)) => OutcomeStatus::Converted {
                output_path,
                output_bytes,
            },
            Err(error) => OutcomeStatus::Failed {
                message: error.to_string(),
            },
        };

        ConversionOutcome {
            source_path: request.source_path.clone(),
            status,
        }
    }
}

/// Compute target dimensions preserving aspect ratio. Never upscales: inputs
/// already within the bound come back unchanged.
fn bounded_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width.max(height) <= max_dimension {
        return (width, height);
    }

    let aspect = width as f64 / height as f64;
    if aspect > 1.0 {
        let target_width = max_dimension;
        let target_height = ((target_width as f64 / aspect).round() as u32).max(1);
        (target_width, target_height)
    } else {
        let target_height = max_dimension;
        let target_width = ((target_height as f64 * aspect).round() as u32).max(1);
        (target_width, target_height)
    }
}

/// Normalize color mode for the target format. Formats without alpha support
/// get a flattened RGB8 image (alpha dropped, not composited); alpha-capable
/// formats keep RGBA8 only when the source actually has an alpha channel.
fn normalize_color(img: DynamicImage, format: TargetFormat) -> DynamicImage {
    if format.supports_alpha() {
        match img {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
            _ if img.color().has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
            _ => DynamicImage::ImageRgb8(img.to_rgb8()),
        }
    } else {
        match img {
            DynamicImage::ImageRgb8(_) => img,
            _ => DynamicImage::ImageRgb8(img.to_rgb8()),
        }
    }
}

/// Encode the normalized image into an in-memory buffer
fn encode(
    img: &DynamicImage,
    format: TargetFormat,
    quality: u8,
) -> Result<Vec<u8>, TransformError> {
    match format {
        TargetFormat::Webp => {
            let encoder = webp::Encoder::from_image(img)
                .map_err(|e| TransformError::Encode(e.to_string()))?;
            Ok(encoder.encode(quality as f32).to_vec())
        }
        TargetFormat::Jpeg => {
            let mut buffer = Vec::new();
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
            img.write_with_encoder(encoder)
                .map_err(|e| TransformError::Encode(e.to_string()))?;
            Ok(buffer)
        }
    }
}
