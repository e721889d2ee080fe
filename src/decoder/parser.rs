use crate::decoder::format::FormatInformation;
use crate::error::{DecodeError, Result};
use crate::models::{BitMatrix, Version};

/// Reads structure out of a sampled module grid: format information,
/// version information, and the zig-zag codeword stream.
///
/// Holds its own copy of the matrix because reading codewords removes the
/// data mask in place; `remask`/`set_mirror`/`mirror` support the mirrored
/// second decode pass.
pub struct BitMatrixParser {
    bit_matrix: BitMatrix,
    parsed_version: Option<Version>,
    parsed_format_info: Option<FormatInformation>,
    mirrored: bool,
}

impl BitMatrixParser {
    pub fn new(bit_matrix: &BitMatrix) -> Result<Self> {
        let dimension = bit_matrix.height();
        if bit_matrix.width() != dimension || dimension < 21 || dimension & 0x03 != 1 {
            return Err(DecodeError::Format);
        }
        Ok(Self {
            bit_matrix: bit_matrix.clone(),
            parsed_version: None,
            parsed_format_info: None,
            mirrored: false,
        })
    }

    fn copy_bit(&self, i: usize, j: usize, version_bits: u32) -> u32 {
        let bit = if self.mirrored {
            self.bit_matrix.get(j, i)
        } else {
            self.bit_matrix.get(i, j)
        };
        if bit {
            (version_bits << 1) | 0x1
        } else {
            version_bits << 1
        }
    }

    /// Read format information from one of its two locations.
    pub fn read_format_information(&mut self) -> Result<FormatInformation> {
        if let Some(info) = self.parsed_format_info {
            return Ok(info);
        }

        // Around the top-left finder pattern.
        let mut format_info_bits_1 = 0;
        for i in 0..6 {
            format_info_bits_1 = self.copy_bit(i, 8, format_info_bits_1);
        }
        format_info_bits_1 = self.copy_bit(7, 8, format_info_bits_1);
        format_info_bits_1 = self.copy_bit(8, 8, format_info_bits_1);
        format_info_bits_1 = self.copy_bit(8, 7, format_info_bits_1);
        for j in (0..6).rev() {
            format_info_bits_1 = self.copy_bit(8, j, format_info_bits_1);
        }

        // Split across the top-right and bottom-left finder patterns.
        let dimension = self.bit_matrix.height();
        let mut format_info_bits_2 = 0;
        let j_min = dimension - 7;
        for j in (j_min..dimension).rev() {
            format_info_bits_2 = self.copy_bit(8, j, format_info_bits_2);
        }
        for i in (dimension - 8)..dimension {
            format_info_bits_2 = self.copy_bit(i, 8, format_info_bits_2);
        }

        match FormatInformation::decode(format_info_bits_1, format_info_bits_2) {
            Some(info) => {
                self.parsed_format_info = Some(info);
                Ok(info)
            }
            None => Err(DecodeError::Format),
        }
    }

    /// Read the version: directly from the dimension up to version 6, from
    /// the version information blocks beyond that.
    pub fn read_version(&mut self) -> Result<Version> {
        if let Some(version) = self.parsed_version {
            return Ok(version);
        }

        let dimension = self.bit_matrix.height();
        let provisional_version = (dimension - 17) / 4;
        if provisional_version <= 6 {
            return Version::new(provisional_version as u8);
        }

        // Top-right 3x6 block.
        let ij_min = dimension - 11;
        let mut version_bits = 0;
        for j in (0..6).rev() {
            for i in (ij_min..=dimension - 9).rev() {
                version_bits = self.copy_bit(i, j, version_bits);
            }
        }
        if let Some(version) = Version::decode_version_information(version_bits) {
            if version.dimension() == dimension {
                self.parsed_version = Some(version);
                return Ok(version);
            }
        }

        // Bottom-left 6x3 block.
        let mut version_bits = 0;
        for i in (0..6).rev() {
            for j in (ij_min..=dimension - 9).rev() {
                version_bits = self.copy_bit(i, j, version_bits);
            }
        }
        if let Some(version) = Version::decode_version_information(version_bits) {
            if version.dimension() == dimension {
                self.parsed_version = Some(version);
                return Ok(version);
            }
        }
        Err(DecodeError::Format)
    }

    /// Remove the data mask and stream every data-region bit into bytes,
    /// walking right-to-left column pairs alternating up and down.
    pub fn read_codewords(&mut self) -> Result<Vec<u8>> {
        let format_info = self.read_format_information()?;
        let version = self.read_version()?;

        let dimension = self.bit_matrix.height();
        format_info.data_mask.unmask(&mut self.bit_matrix, dimension);
        let function_pattern = version.build_function_pattern();

        let mut result = Vec::with_capacity(version.total_codewords());
        let mut reading_up = true;
        let mut current_byte = 0u32;
        let mut bits_read = 0;

        let mut j = dimension as isize - 1;
        while j > 0 {
            if j == 6 {
                // Skip the vertical timing column.
                j -= 1;
            }
            for count in 0..dimension {
                let i = if reading_up { dimension - 1 - count } else { count };
                for col in 0..2 {
                    let x = (j as usize) - col;
                    if !function_pattern.get(x, i) {
                        bits_read += 1;
                        current_byte <<= 1;
                        if self.bit_matrix.get(x, i) {
                            current_byte |= 1;
                        }
                        if bits_read == 8 {
                            result.push(current_byte as u8);
                            bits_read = 0;
                            current_byte = 0;
                        }
                    }
                }
            }
            reading_up = !reading_up;
            j -= 2;
        }

        if result.len() != version.total_codewords() {
            return Err(DecodeError::Format);
        }
        Ok(result)
    }

    /// Re-apply the data mask after `read_codewords` removed it.
    pub fn remask(&mut self) {
        if let Some(info) = self.parsed_format_info {
            let dimension = self.bit_matrix.height();
            info.data_mask.unmask(&mut self.bit_matrix, dimension);
        }
    }

    /// Switch format/version reads to mirrored coordinates; forgets cached
    /// reads.
    pub fn set_mirror(&mut self, mirrored: bool) {
        self.parsed_version = None;
        self.parsed_format_info = None;
        self.mirrored = mirrored;
    }

    /// Transpose the matrix for the mirrored pass.
    pub fn mirror(&mut self) {
        self.bit_matrix.mirror();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EcLevel;

    /// Module positions of the first format-info copy, MSB first.
    const FORMAT_COPY_1: [(usize, usize); 15] = [
        (0, 8),
        (1, 8),
        (2, 8),
        (3, 8),
        (4, 8),
        (5, 8),
        (7, 8),
        (8, 8),
        (8, 7),
        (8, 5),
        (8, 4),
        (8, 3),
        (8, 2),
        (8, 1),
        (8, 0),
    ];

    fn write_format_info(matrix: &mut BitMatrix, pattern: u32) {
        let dimension = matrix.height();
        for (bit, &(x, y)) in FORMAT_COPY_1.iter().enumerate() {
            if (pattern >> (14 - bit)) & 1 != 0 {
                matrix.set(x, y);
            }
        }
        // Second copy: 7 bits down the left of the bottom-left finder,
        // 8 bits across the bottom of the top-right finder.
        for bit in 0..7 {
            if (pattern >> (14 - bit)) & 1 != 0 {
                matrix.set(8, dimension - 1 - bit);
            }
        }
        for bit in 7..15 {
            if (pattern >> (14 - bit)) & 1 != 0 {
                matrix.set(dimension - 8 + (bit - 7), 8);
            }
        }
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert!(BitMatrixParser::new(&BitMatrix::square(20)).is_err());
        assert!(BitMatrixParser::new(&BitMatrix::square(19)).is_err());
        assert!(BitMatrixParser::new(&BitMatrix::new(21, 25)).is_err());
        assert!(BitMatrixParser::new(&BitMatrix::square(21)).is_ok());
    }

    #[test]
    fn reads_planted_format_information() {
        let mut matrix = BitMatrix::square(21);
        // (M, mask 0) encodes as 0x5412.
        write_format_info(&mut matrix, 0x5412);
        let mut parser = BitMatrixParser::new(&matrix).unwrap();
        let info = parser.read_format_information().unwrap();
        assert_eq!(info.ec_level, EcLevel::M);
        assert_eq!(info.data_mask.bits(), 0);
    }

    #[test]
    fn mirrored_format_read_swaps_coordinates() {
        let mut matrix = BitMatrix::square(21);
        write_format_info(&mut matrix, 0x4AA0);
        matrix.mirror();
        let mut parser = BitMatrixParser::new(&matrix).unwrap();
        parser.set_mirror(true);
        let info = parser.read_format_information().unwrap();
        assert_eq!(info.ec_level, EcLevel::M);
        assert_eq!(info.data_mask.bits(), 7);
    }

    #[test]
    fn version_below_seven_comes_from_dimension() {
        let matrix = BitMatrix::square(25);
        let mut parser = BitMatrixParser::new(&matrix).unwrap();
        assert_eq!(parser.read_version().unwrap().number(), 2);
    }

    #[test]
    fn reads_planted_version_information() {
        // Version 7 pattern 0x07C94 planted in the top-right block.
        let dimension = 45;
        let mut matrix = BitMatrix::square(dimension);
        let pattern: u32 = 0x07C94;
        let mut bit: i32 = 17;
        for j in (0..6).rev() {
            for i in ((dimension - 11)..=(dimension - 9)).rev() {
                // The first module read lands in the most significant bit.
                if (pattern >> bit) & 1 != 0 {
                    matrix.set(i, j);
                }
                bit -= 1;
            }
        }
        let mut parser = BitMatrixParser::new(&matrix).unwrap();
        assert_eq!(parser.read_version().unwrap().number(), 7);
    }

    #[test]
    fn codeword_count_matches_version() {
        let mut matrix = BitMatrix::square(21);
        write_format_info(&mut matrix, 0x5412);
        let mut parser = BitMatrixParser::new(&matrix).unwrap();
        let codewords = parser.read_codewords().unwrap();
        assert_eq!(codewords.len(), 26);
    }

    #[test]
    fn remask_restores_matrix() {
        let mut matrix = BitMatrix::square(21);
        write_format_info(&mut matrix, 0x5412);
        let mut parser = BitMatrixParser::new(&matrix).unwrap();
        let before = parser.bit_matrix.clone();
        parser.read_codewords().unwrap();
        assert_ne!(parser.bit_matrix, before);
        parser.remask();
        assert_eq!(parser.bit_matrix, before);
    }
}
