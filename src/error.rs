/// Failure kinds surfaced by the decoding pipeline.
///
/// `NotFound` and `Format` drive the normal control flow (no symbol in the
/// frame, or a symbol whose structure could not be parsed); `ReedSolomon`
/// means the codewords were recovered but could not be corrected.
/// `InvalidArgument` indicates a caller-side programming error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no QR code found")]
    NotFound,
    #[error("QR code structure could not be parsed")]
    Format,
    #[error("error correction failed: {0}")]
    ReedSolomon(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
