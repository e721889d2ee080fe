use super::{EcLevel, Point, Version};

/// Structured Append header: this symbol's position in a multi-symbol
/// sequence plus the parity byte over the full message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuredAppend {
    pub sequence: u8,
    pub parity: u8,
}

/// The fully decoded payload of one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Decoded payload text (UTF-8; may be empty).
    pub text: String,
    /// Data codewords after error correction, before mode parsing.
    pub raw_bytes: Vec<u8>,
    /// Raw bytes of every byte-mode segment, in order of appearance.
    pub byte_segments: Vec<Vec<u8>>,
    pub version: Version,
    pub ec_level: EcLevel,
    pub structured_append: Option<StructuredAppend>,
    /// True when the symbol was read through the mirrored second pass.
    pub mirrored: bool,
}

/// Output of the detector: the sampled module grid plus the image-space
/// points it was anchored on (bottom-left, top-left, top-right, and the
/// alignment pattern when one was found).
#[derive(Debug)]
pub struct Detection {
    pub bits: super::BitMatrix,
    pub points: Vec<Point>,
}
