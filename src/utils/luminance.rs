use std::borrow::Cow;

use crate::error::{DecodeError, Result};

/// Read-only view of a greyscale raster. 0 = black, 255 = white.
///
/// The decoder only ever reads rows and the flattened matrix; `crop`
/// produces a borrowed sub-view without copying pixels.
pub trait LuminanceSource {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Copy row `y` into `buf` (resized as needed) and return it.
    fn row<'a>(&self, y: usize, buf: &'a mut Vec<u8>) -> &'a [u8];

    /// The whole view as a row-major buffer without stride gaps.
    fn matrix(&self) -> Cow<'_, [u8]>;

    /// Borrowed sub-rectangle view.
    fn crop(&self, left: usize, top: usize, width: usize, height: usize) -> Result<Cropped<'_, Self>>
    where
        Self: Sized,
    {
        if width == 0 || height == 0 || left + width > self.width() || top + height > self.height()
        {
            return Err(DecodeError::InvalidArgument("crop outside source"));
        }
        Ok(Cropped {
            source: self,
            left,
            top,
            width,
            height,
        })
    }
}

/// Owned greyscale raster with an optional row stride.
#[derive(Debug, Clone)]
pub struct GreyImage {
    pixels: Vec<u8>,
    width: usize,
    height: usize,
    stride: usize,
}

impl GreyImage {
    /// Wrap a row-major greyscale buffer. `stride` is the distance between
    /// row starts and must be at least `width`.
    pub fn from_raw(pixels: Vec<u8>, width: usize, height: usize, stride: usize) -> Result<Self> {
        if stride < width {
            return Err(DecodeError::InvalidArgument("stride smaller than width"));
        }
        if pixels.len() < stride * height {
            return Err(DecodeError::InvalidArgument("pixel buffer too short"));
        }
        Ok(Self {
            pixels,
            width,
            height,
            stride,
        })
    }

    /// Tightly packed greyscale buffer.
    pub fn new(pixels: Vec<u8>, width: usize, height: usize) -> Result<Self> {
        Self::from_raw(pixels, width, height, width)
    }

    /// Convert interleaved RGB. Grey pixels pass through; colored ones use
    /// the green-weighted average `(R + 2G + B) / 4`.
    pub fn from_rgb(rgb: &[u8], width: usize, height: usize) -> Result<Self> {
        Self::from_channels(rgb, width, height, 3)
    }

    /// Convert interleaved RGBA; the alpha channel is ignored.
    pub fn from_rgba(rgba: &[u8], width: usize, height: usize) -> Result<Self> {
        Self::from_channels(rgba, width, height, 4)
    }

    fn from_channels(data: &[u8], width: usize, height: usize, channels: usize) -> Result<Self> {
        if data.len() < width * height * channels {
            return Err(DecodeError::InvalidArgument("pixel buffer too short"));
        }
        let mut pixels = Vec::with_capacity(width * height);
        for chunk in data.chunks_exact(channels).take(width * height) {
            let (r, g, b) = (chunk[0], chunk[1], chunk[2]);
            let luma = if r == g && g == b {
                r
            } else {
                ((r as u16 + 2 * g as u16 + b as u16) / 4) as u8
            };
            pixels.push(luma);
        }
        Self::new(pixels, width, height)
    }
}

impl LuminanceSource for GreyImage {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn row<'a>(&self, y: usize, buf: &'a mut Vec<u8>) -> &'a [u8] {
        assert!(y < self.height, "row out of range");
        let start = y * self.stride;
        buf.clear();
        buf.extend_from_slice(&self.pixels[start..start + self.width]);
        buf
    }

    fn matrix(&self) -> Cow<'_, [u8]> {
        if self.stride == self.width {
            Cow::Borrowed(&self.pixels[..self.width * self.height])
        } else {
            let mut out = Vec::with_capacity(self.width * self.height);
            for y in 0..self.height {
                let start = y * self.stride;
                out.extend_from_slice(&self.pixels[start..start + self.width]);
            }
            Cow::Owned(out)
        }
    }
}

/// Borrowed rectangular sub-view of another source.
#[derive(Debug)]
pub struct Cropped<'a, S: LuminanceSource> {
    source: &'a S,
    left: usize,
    top: usize,
    width: usize,
    height: usize,
}

impl<S: LuminanceSource> LuminanceSource for Cropped<'_, S> {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn row<'a>(&self, y: usize, buf: &'a mut Vec<u8>) -> &'a [u8] {
        assert!(y < self.height, "row out of range");
        let mut full = Vec::new();
        self.source.row(self.top + y, &mut full);
        buf.clear();
        buf.extend_from_slice(&full[self.left..self.left + self.width]);
        buf
    }

    fn matrix(&self) -> Cow<'_, [u8]> {
        let full = self.source.matrix();
        let source_width = self.source.width();
        let mut out = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            let start = (self.top + y) * source_width + self.left;
            out.extend_from_slice(&full[start..start + self.width]);
        }
        Cow::Owned(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_match_matrix() {
        let pixels: Vec<u8> = (0..=24).collect();
        let img = GreyImage::new(pixels, 5, 5).unwrap();
        let matrix = img.matrix();
        let mut buf = Vec::new();
        for y in 0..5 {
            assert_eq!(img.row(y, &mut buf), &matrix[y * 5..(y + 1) * 5]);
        }
    }

    #[test]
    fn stride_is_skipped() {
        // 3x2 image inside rows of 5 bytes.
        let pixels = vec![1, 2, 3, 99, 99, 4, 5, 6, 99, 99];
        let img = GreyImage::from_raw(pixels, 3, 2, 5).unwrap();
        assert_eq!(img.matrix().as_ref(), &[1, 2, 3, 4, 5, 6]);
        let mut buf = Vec::new();
        assert_eq!(img.row(1, &mut buf), &[4, 5, 6]);
    }

    #[test]
    fn crop_views_subrectangle() {
        let pixels: Vec<u8> = (0..=24).collect();
        let img = GreyImage::new(pixels, 5, 5).unwrap();
        let cropped = img.crop(1, 2, 3, 2).unwrap();
        assert_eq!(cropped.width(), 3);
        assert_eq!(cropped.height(), 2);
        assert_eq!(cropped.matrix().as_ref(), &[11, 12, 13, 16, 17, 18]);
        let mut buf = Vec::new();
        assert_eq!(cropped.row(0, &mut buf), &[11, 12, 13]);
        assert!(img.crop(3, 3, 3, 3).is_err());
    }

    #[test]
    fn rgb_conversion() {
        // Grey passes through, color is green-weighted.
        let rgb = vec![10, 10, 10, 100, 200, 100];
        let img = GreyImage::from_rgb(&rgb, 2, 1).unwrap();
        assert_eq!(img.matrix().as_ref(), &[10, ((100u32 + 400 + 100) / 4) as u8]);
    }

    #[test]
    fn rgba_ignores_alpha() {
        let rgba = vec![50, 50, 50, 0, 0, 255, 0, 128];
        let img = GreyImage::from_rgba(&rgba, 2, 1).unwrap();
        assert_eq!(img.matrix().as_ref(), &[50, ((0u32 + 510 + 0) / 4) as u8]);
    }
}
