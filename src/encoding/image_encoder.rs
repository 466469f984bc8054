//! Size-Bounded JPEG Encoding
//!
//! Decodes a source image, drops any alpha channel, and re-encodes it as JPEG.
//! When the encoded payload is over the byte ceiling the image is scaled by
//! `step_factor^attempt` and tried again, up to `max_steps` attempts.

use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

/// 20 MiB, the largest inline image any supported provider accepts
pub const DEFAULT_SIZE_CEILING: usize = 20 * 1024 * 1024;

/// Encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoded payloads must be strictly below this many bytes
    pub size_ceiling_bytes: usize,
    /// Per-attempt dimension multiplier inside the resize loop
    pub step_factor: f64,
    /// Number of resize attempts before giving up (attempt 0 = original size)
    pub max_steps: u32,
    /// Both dimensions must exceed this to be worth sending
    pub min_dimension: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            size_ceiling_bytes: DEFAULT_SIZE_CEILING,
            step_factor: 0.9,
            max_steps: 5,
            min_dimension: 150,
            jpeg_quality: 75,
        }
    }
}

/// Wire format of an encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
}

impl ImageFormat {
    /// MIME type used in provider payloads
    pub fn media_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// An image ready to be attached to a request
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Encoded image data
    pub bytes: Vec<u8>,
    /// Encoding format
    pub format: ImageFormat,
    /// Image width in pixels (after scaling)
    pub width: u32,
    /// Image height in pixels (after scaling)
    pub height: u32,
}

impl EncodedImage {
    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard base64 of the payload
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// `data:` URL form used by OpenAI-style APIs
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.media_type(), self.to_base64())
    }

    pub fn media_type(&self) -> &'static str {
        self.format.media_type()
    }
}

/// Size-bounded image encoder
#[derive(Debug, Clone, Default)]
pub struct ImageEncoder {
    pub config: EncoderConfig,
}

impl ImageEncoder {
    /// Create with default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    pub fn with_config(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Whether an image of this size carries enough detail to send
    pub fn is_eligible(&self, width: u32, height: u32) -> bool {
        width > self.config.min_dimension && height > self.config.min_dimension
    }

    /// Encode with the configured ceiling and step factor.
    pub fn encode(&self, image: &DynamicImage) -> crate::Result<EncodedImage> {
        encode(
            image,
            self.config.size_ceiling_bytes,
            self.config.step_factor,
            self.config.max_steps,
            self.config.jpeg_quality,
        )
    }

    /// Load a file and encode it, or `Ok(None)` if it is below the minimum dimension.
    pub fn encode_path(&self, path: &Path) -> crate::Result<Option<EncodedImage>> {
        let (width, height) = image::image_dimensions(path)
            .map_err(|e| crate::Error::Image(format!("{}: {}", path.display(), e)))?;

        if !self.is_eligible(width, height) {
            debug!(path = %path.display(), width, height, "Image too small, excluded from request");
            return Ok(None);
        }

        let image = image::open(path)
            .map_err(|e| crate::Error::Image(format!("{}: {}", path.display(), e)))?;
        self.encode(&image).map(Some)
    }

    /// Shrink an already-encoded image by `scale` and run it through the
    /// resize loop again from attempt 0.
    pub fn reencode(&self, encoded: &EncodedImage, scale: f64) -> crate::Result<EncodedImage> {
        let image = image::load_from_memory(&encoded.bytes)
            .map_err(|e| crate::Error::Image(e.to_string()))?;
        let (width, height) = scaled_dimensions(image.width(), image.height(), scale, 1);
        let shrunk = image.resize_exact(width, height, FilterType::Lanczos3);
        self.encode(&shrunk)
    }
}

/// Encode `image` as JPEG with a payload strictly below `size_ceiling` bytes.
///
/// Attempt `i` scales both dimensions by `scale_factor^i`. Fails with
/// [`crate::Error::SizeLimitExceeded`] when no attempt fits.
pub fn encode(
    image: &DynamicImage,
    size_ceiling: usize,
    scale_factor: f64,
    max_steps: u32,
    quality: u8,
) -> crate::Result<EncodedImage> {
    let rgb: RgbImage = image.to_rgb8();
    let (orig_w, orig_h) = rgb.dimensions();
    let mut last_size = 0;

    for attempt in 0..max_steps {
        let (width, height) = scaled_dimensions(orig_w, orig_h, scale_factor, attempt as i32);
        let bytes = if attempt == 0 {
            jpeg_bytes(&rgb, quality)?
        } else {
            let resized = image::imageops::resize(&rgb, width, height, FilterType::Lanczos3);
            jpeg_bytes(&resized, quality)?
        };

        if bytes.len() < size_ceiling {
            return Ok(EncodedImage {
                bytes,
                format: ImageFormat::Jpeg,
                width,
                height,
            });
        }

        debug!(
            attempt = attempt + 1,
            size = bytes.len(),
            ceiling = size_ceiling,
            "Encoded image too large, resizing"
        );
        last_size = bytes.len();
    }

    warn!(
        attempts = max_steps,
        last_size,
        ceiling = size_ceiling,
        "Unable to bring image under size ceiling"
    );
    Err(crate::Error::SizeLimitExceeded {
        ceiling: size_ceiling,
        attempts: max_steps,
        last_size,
    })
}

/// Dimensions after scaling by `factor^exponent`, never below 1 px.
fn scaled_dimensions(width: u32, height: u32, factor: f64, exponent: i32) -> (u32, u32) {
    let scale = factor.powi(exponent);
    let w = ((width as f64) * scale) as u32;
    let h = ((height as f64) * scale) as u32;
    (w.max(1), h.max(1))
}

fn jpeg_bytes(rgb: &RgbImage, quality: u8) -> crate::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| crate::Error::Image(e.to_string()))?;
    Ok(buf.into_inner())
}
