//! Decoding of a sampled module grid: structure parsing, error correction
//! and bitstream interpretation.
//!
//! The outer [`decode`] makes a straight attempt first and, on any failure,
//! retries with the matrix mirrored (a symbol read through the back of a
//! transparent medium, or a transposed sampling). If the mirrored attempt
//! also fails, the error from the straight attempt is surfaced.

pub mod bits;
pub mod bitstream;
pub mod blocks;
pub mod charset;
pub mod format;
pub mod gf256;
pub mod parser;
pub mod reed_solomon;

use log::debug;

use crate::error::Result;
use crate::models::{BitMatrix, Decoded};
use parser::BitMatrixParser;

/// Decode a sampled module grid into its payload.
pub fn decode(bits: &BitMatrix) -> Result<Decoded> {
    let mut parser = BitMatrixParser::new(bits)?;

    match decode_parser(&mut parser) {
        Ok(decoded) => Ok(decoded),
        Err(first_error) => {
            debug!("straight decode failed ({first_error}), trying mirrored");

            // Undo any partial unmasking from the first pass and switch the
            // format/version reads to mirrored coordinates. Both are read
            // and cached against the untransposed matrix; only then is the
            // matrix itself transposed for the codeword walk.
            parser.remask();
            parser.set_mirror(true);
            if parser.read_version().is_err() || parser.read_format_information().is_err() {
                return Err(first_error);
            }
            parser.mirror();

            match decode_parser(&mut parser) {
                Ok(mut decoded) => {
                    decoded.mirrored = true;
                    Ok(decoded)
                }
                // Report the straight failure, not the mirrored one.
                Err(_) => Err(first_error),
            }
        }
    }
}

fn decode_parser(parser: &mut BitMatrixParser) -> Result<Decoded> {
    let version = parser.read_version()?;
    let format_info = parser.read_format_information()?;
    let ec_level = format_info.ec_level;

    let codewords = parser.read_codewords()?;
    let data_blocks = blocks::build_data_blocks(&codewords, version, ec_level)?;

    let total_data: usize = data_blocks.iter().map(|b| b.num_data_codewords).sum();
    let mut result_bytes = Vec::with_capacity(total_data);
    for mut block in data_blocks {
        let ec_codewords = block.codewords.len() - block.num_data_codewords;
        reed_solomon::correct_errors(&mut block.codewords, ec_codewords)?;
        result_bytes.extend_from_slice(&block.codewords[..block.num_data_codewords]);
    }

    bitstream::decode(&result_bytes, version, ec_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    #[test]
    fn empty_matrix_fails() {
        // Valid dimensions but no symbol. The all-clear format region reads
        // as the (M, mask 0) pattern, so the failure comes from the data
        // path rather than the format read; either way it must not decode.
        let bits = BitMatrix::square(21);
        assert!(decode(&bits).is_err());
    }

    #[test]
    fn wrong_dimension_fails_before_any_parsing() {
        let bits = BitMatrix::square(24);
        assert_eq!(decode(&bits).unwrap_err(), DecodeError::Format);
    }
}
