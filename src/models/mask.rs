use super::BitMatrix;

/// The eight data mask patterns.
///
/// `is_masked(i, j)` reports whether the module at row `i`, column `j` was
/// XORed by the encoder and must be flipped back before reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMask {
    /// (i + j) % 2 == 0
    Pattern0 = 0,
    /// i % 2 == 0
    Pattern1 = 1,
    /// j % 3 == 0
    Pattern2 = 2,
    /// (i + j) % 3 == 0
    Pattern3 = 3,
    /// (i/2 + j/3) % 2 == 0
    Pattern4 = 4,
    /// (i*j) % 2 + (i*j) % 3 == 0
    Pattern5 = 5,
    /// ((i*j) % 2 + (i*j) % 3) % 2 == 0
    Pattern6 = 6,
    /// ((i+j) % 2 + (i*j) % 3) % 2 == 0
    Pattern7 = 7,
}

impl DataMask {
    /// Decode the three mask bits from format information.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => DataMask::Pattern0,
            1 => DataMask::Pattern1,
            2 => DataMask::Pattern2,
            3 => DataMask::Pattern3,
            4 => DataMask::Pattern4,
            5 => DataMask::Pattern5,
            6 => DataMask::Pattern6,
            _ => DataMask::Pattern7,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn is_masked(self, i: usize, j: usize) -> bool {
        match self {
            DataMask::Pattern0 => (i + j) % 2 == 0,
            DataMask::Pattern1 => i % 2 == 0,
            DataMask::Pattern2 => j % 3 == 0,
            DataMask::Pattern3 => (i + j) % 3 == 0,
            DataMask::Pattern4 => (i / 2 + j / 3) % 2 == 0,
            DataMask::Pattern5 => (i * j) % 2 + (i * j) % 3 == 0,
            DataMask::Pattern6 => ((i * j) % 2 + (i * j) % 3) % 2 == 0,
            DataMask::Pattern7 => ((i + j) % 2 + (i * j) % 3) % 2 == 0,
        }
    }

    /// Flip every masked module in the top-left `dimension` square.
    ///
    /// Applied once to remove the mask before reading codewords and a second
    /// time to restore the matrix for the mirrored pass.
    pub fn unmask(self, matrix: &mut BitMatrix, dimension: usize) {
        for i in 0..dimension {
            for j in 0..dimension {
                if self.is_masked(i, j) {
                    matrix.flip(j, i);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(pattern: u8, i: usize, j: usize) -> bool {
        match pattern {
            0 => (i + j) % 2 == 0,
            1 => i % 2 == 0,
            2 => j % 3 == 0,
            3 => (i + j) % 3 == 0,
            4 => (i / 2 + j / 3) % 2 == 0,
            5 => (i * j) % 2 + (i * j) % 3 == 0,
            6 => ((i * j) % 2 + (i * j) % 3) % 2 == 0,
            7 => ((i + j) % 2 + (i * j) % 3) % 2 == 0,
            _ => unreachable!(),
        }
    }

    #[test]
    fn truth_table_matches_reference() {
        for pattern in 0..8u8 {
            let mask = DataMask::from_bits(pattern);
            assert_eq!(mask.bits(), pattern);
            for i in 0..40 {
                for j in 0..40 {
                    assert_eq!(
                        mask.is_masked(i, j),
                        reference(pattern, i, j),
                        "pattern {} at ({}, {})",
                        pattern,
                        i,
                        j
                    );
                }
            }
        }
    }

    #[test]
    fn unmask_twice_restores() {
        let mut m = BitMatrix::square(21);
        m.set(9, 10);
        m.set(12, 17);
        let original = m.clone();
        DataMask::Pattern5.unmask(&mut m, 21);
        assert_ne!(m, original);
        DataMask::Pattern5.unmask(&mut m, 21);
        assert_eq!(m, original);
    }

    #[test]
    fn pattern0_corners() {
        let mask = DataMask::Pattern0;
        assert!(mask.is_masked(0, 0));
        assert!(!mask.is_masked(0, 1));
        assert!(mask.is_masked(1, 1));
    }
}
