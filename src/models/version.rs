use crate::error::{DecodeError, Result};
use crate::models::BitMatrix;

/// Error correction level. The two wire bits use the swapped encoding
/// M=00, L=01, H=10, Q=11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcLevel {
    L = 0,
    M = 1,
    Q = 2,
    H = 3,
}

impl EcLevel {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => EcLevel::M,
            1 => EcLevel::L,
            2 => EcLevel::H,
            _ => EcLevel::Q,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            EcLevel::M => 0,
            EcLevel::L => 1,
            EcLevel::H => 2,
            EcLevel::Q => 3,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Error correction block structure for one (version, level) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcBlocks {
    pub ec_codewords_per_block: usize,
    pub num_blocks: usize,
}

// Tables from ISO/IEC 18004:2006 (Model 2), indexed [level][version];
// index 0 is unused padding.
const TOTAL_CODEWORDS: [u16; 41] = [
    0, 26, 44, 70, 100, 134, 172, 196, 242, 292, 346, 404, 466, 532, 581, 655, 733, 815, 901, 991,
    1085, 1156, 1258, 1364, 1474, 1588, 1706, 1828, 1921, 2051, 2185, 2323, 2465, 2611, 2761, 2876,
    3034, 3196, 3362, 3532, 3706,
];

const EC_CODEWORDS_PER_BLOCK: [[u8; 41]; 4] = [
    [
        0, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28,
        30, 30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // L
    [
        0, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ], // M
    [
        0, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30,
        30, 30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // Q
    [
        0, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // H
];

const NUM_EC_BLOCKS: [[u8; 41]; 4] = [
    [
        0, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12,
        13, 14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ], // L
    [
        0, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ], // M
    [
        0, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27,
        29, 34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ], // Q
    [
        0, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32,
        35, 37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ], // H
];

// Alignment pattern center coordinates per version (ISO 18004 Annex E).
const ALIGNMENT_PATTERN_CENTERS: [&[usize]; 41] = [
    &[],
    &[],
    &[6, 18],
    &[6, 22],
    &[6, 26],
    &[6, 30],
    &[6, 34],
    &[6, 22, 38],
    &[6, 24, 42],
    &[6, 26, 46],
    &[6, 28, 50],
    &[6, 30, 54],
    &[6, 32, 58],
    &[6, 34, 62],
    &[6, 26, 46, 66],
    &[6, 26, 48, 70],
    &[6, 26, 50, 74],
    &[6, 30, 54, 78],
    &[6, 30, 56, 82],
    &[6, 30, 58, 86],
    &[6, 34, 62, 90],
    &[6, 28, 50, 72, 94],
    &[6, 26, 50, 74, 98],
    &[6, 30, 54, 78, 102],
    &[6, 28, 54, 80, 106],
    &[6, 32, 58, 84, 110],
    &[6, 30, 58, 86, 114],
    &[6, 34, 62, 90, 118],
    &[6, 26, 50, 74, 98, 122],
    &[6, 30, 54, 78, 102, 126],
    &[6, 26, 52, 78, 104, 130],
    &[6, 30, 56, 82, 108, 134],
    &[6, 34, 60, 86, 112, 138],
    &[6, 30, 58, 86, 114, 142],
    &[6, 34, 62, 90, 118, 146],
    &[6, 30, 54, 78, 102, 126, 150],
    &[6, 24, 50, 76, 102, 128, 154],
    &[6, 28, 54, 80, 106, 132, 158],
    &[6, 32, 58, 84, 110, 136, 162],
    &[6, 26, 54, 82, 110, 138, 166],
    &[6, 30, 58, 86, 114, 142, 170],
];

// BCH(18,6) version information patterns for versions 7..40.
const VERSION_DECODE_LOOKUP: [u32; 34] = [
    0x07C94, 0x085BC, 0x09A99, 0x0A4D3, 0x0BBF6, 0x0C762, 0x0D847, 0x0E60D, 0x0F928, 0x10B78,
    0x1145D, 0x12A17, 0x13532, 0x149A6, 0x15683, 0x168C9, 0x177EC, 0x18EC4, 0x191E1, 0x1AFAB,
    0x1B08E, 0x1CC1A, 0x1D33F, 0x1ED75, 0x1F250, 0x209D5, 0x216F0, 0x228BA, 0x2379F, 0x24B0B,
    0x2542E, 0x26A64, 0x27541, 0x28C69,
];

/// Symbol version, 1..40.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version(u8);

impl Version {
    pub fn new(number: u8) -> Result<Self> {
        if (1..=40).contains(&number) {
            Ok(Self(number))
        } else {
            Err(DecodeError::InvalidArgument("version out of range"))
        }
    }

    /// Version implied by a measured dimension; the dimension must be
    /// `17 + 4·version`.
    pub fn provisional_for_dimension(dimension: usize) -> Result<Self> {
        if dimension % 4 != 1 {
            return Err(DecodeError::Format);
        }
        let number = (dimension - 17) / 4;
        if (1..=40).contains(&number) {
            Ok(Self(number as u8))
        } else {
            Err(DecodeError::Format)
        }
    }

    /// Decode an 18-bit version information word, tolerating up to 3 bit
    /// errors.
    pub fn decode_version_information(version_bits: u32) -> Option<Self> {
        let mut best_version = 0;
        let mut best_difference = u32::MAX;
        for (i, &target) in VERSION_DECODE_LOOKUP.iter().enumerate() {
            if target == version_bits {
                return Some(Self(i as u8 + 7));
            }
            let difference = (version_bits ^ target).count_ones();
            if difference < best_difference {
                best_version = i as u8 + 7;
                best_difference = difference;
            }
        }
        // Hamming distance of the BCH(18,6) code is 8, so up to 3 errors
        // are decodable.
        if best_difference <= 3 {
            return Some(Self(best_version));
        }
        None
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn dimension(self) -> usize {
        17 + 4 * self.0 as usize
    }

    pub fn total_codewords(self) -> usize {
        TOTAL_CODEWORDS[self.0 as usize] as usize
    }

    pub fn alignment_pattern_centers(self) -> &'static [usize] {
        ALIGNMENT_PATTERN_CENTERS[self.0 as usize]
    }

    pub fn ec_blocks(self, level: EcLevel) -> EcBlocks {
        EcBlocks {
            ec_codewords_per_block: EC_CODEWORDS_PER_BLOCK[level.index()][self.0 as usize] as usize,
            num_blocks: NUM_EC_BLOCKS[level.index()][self.0 as usize] as usize,
        }
    }

    /// The exact 18-bit information pattern for versions 7+.
    pub fn info_bits(self) -> Option<u32> {
        if self.0 >= 7 {
            Some(VERSION_DECODE_LOOKUP[self.0 as usize - 7])
        } else {
            None
        }
    }

    /// Mask of modules reserved for function patterns: finders with
    /// separators and format areas, alignment boxes, timing lines, and the
    /// version blocks for versions over 6.
    pub fn build_function_pattern(self) -> BitMatrix {
        fn mark(bits: &mut BitMatrix, left: usize, top: usize, width: usize, height: usize) {
            bits.set_region(left, top, width, height)
                .expect("function pattern region is inside the matrix");
        }

        let dimension = self.dimension();
        let mut bits = BitMatrix::square(dimension);

        // Finder patterns, separators and format information.
        mark(&mut bits, 0, 0, 9, 9);
        mark(&mut bits, dimension - 8, 0, 8, 9);
        mark(&mut bits, 0, dimension - 8, 9, 8);

        // Alignment patterns, skipping the three finder corners.
        let centers = self.alignment_pattern_centers();
        let max = centers.len();
        for (xi, &cx) in centers.iter().enumerate() {
            for (yi, &cy) in centers.iter().enumerate() {
                let in_corner =
                    (xi == 0 && (yi == 0 || yi == max - 1)) || (xi == max - 1 && yi == 0);
                if in_corner {
                    continue;
                }
                mark(&mut bits, cx - 2, cy - 2, 5, 5);
            }
        }

        // Timing lines.
        mark(&mut bits, 6, 9, 1, dimension - 17);
        mark(&mut bits, 9, 6, dimension - 17, 1);

        if self.0 > 6 {
            mark(&mut bits, dimension - 11, 0, 3, 6);
            mark(&mut bits, 0, dimension - 11, 6, 3);
        }

        bits
    }
}
