//! qrscan - QR code reading from greyscale rasters.
//!
//! The pipeline: a [`LuminanceSource`] is binarized into a [`BitMatrix`],
//! the detector locates the three finder patterns and samples the module
//! grid through a perspective transform, and the decoder recovers format,
//! version, codewords (Reed-Solomon corrected) and finally the payload
//! text. Rotated, skewed and mirrored symbols are handled; damaged symbols
//! decode as long as the error correction budget holds.
//!
//! ```no_run
//! let pixels = vec![255u8; 100 * 100];
//! let image = qrscan::GreyImage::new(pixels, 100, 100).unwrap();
//! match qrscan::decode_luminance(&image) {
//!     Ok(decoded) => println!("{}", decoded.text),
//!     Err(qrscan::DecodeError::NotFound) => println!("nothing there"),
//!     Err(e) => eprintln!("unreadable: {e}"),
//! }
//! ```

pub mod decoder;
pub mod detector;
mod error;
pub mod models;
pub mod tools;
pub mod utils;

pub use error::{DecodeError, Result};
pub use models::{BitMatrix, Decoded, Detection, EcLevel, StructuredAppend, Version};
pub use utils::luminance::{Cropped, GreyImage, LuminanceSource};

use detector::Detector;
use log::debug;
use utils::binarize::binarize;

/// Decode the single QR symbol in a luminance source.
pub fn decode_luminance<S: LuminanceSource>(source: &S) -> Result<Decoded> {
    let matrix = binarize(source)?;
    debug!("binarized {}x{} image", matrix.width(), matrix.height());
    let detection = Detector::new(&matrix).detect()?;
    decoder::decode(&detection.bits)
}

/// Decode from a greyscale buffer, one byte per pixel, row-major.
pub fn decode_grayscale(pixels: &[u8], width: usize, height: usize) -> Result<Decoded> {
    if pixels.len() < width * height {
        return Err(DecodeError::InvalidArgument("pixel buffer too short"));
    }
    let image = GreyImage::new(pixels[..width * height].to_vec(), width, height)?;
    decode_luminance(&image)
}

/// Decode from interleaved RGB bytes.
pub fn decode_rgb(rgb: &[u8], width: usize, height: usize) -> Result<Decoded> {
    let image = GreyImage::from_rgb(rgb, width, height)?;
    decode_luminance(&image)
}

/// Reader with room for configuration; the plain functions cover the
/// common cases.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrReader;

impl QrReader {
    pub fn new() -> Self {
        Self
    }

    pub fn decode<S: LuminanceSource>(&self, source: &S) -> Result<Decoded> {
        decode_luminance(source)
    }

    /// Locate the symbol without decoding it; exposes the anchor points.
    pub fn detect<S: LuminanceSource>(&self, source: &S) -> Result<Detection> {
        let matrix = binarize(source)?;
        Detector::new(&matrix).detect()
    }
}
