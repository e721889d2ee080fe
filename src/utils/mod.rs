//! Image-side utilities: luminance sources and binarization.

pub mod binarize;
pub mod luminance;
