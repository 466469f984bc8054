//! Image Encoding
//!
//! Normalises case images and encodes them as JPEG within a provider's
//! byte budget, shrinking progressively until the payload fits.

pub mod image_encoder;

pub use image_encoder::{EncodedImage, EncoderConfig, ImageEncoder, ImageFormat};
