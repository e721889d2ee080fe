use crate::error::{DecodeError, Result};
use crate::models::{EcLevel, Version};

/// One error-correction block: interleaved codewords gathered back into
/// sequence, plus how many of them are data.
#[derive(Debug)]
pub struct DataBlock {
    pub num_data_codewords: usize,
    pub codewords: Vec<u8>,
}

/// De-interleave the raw codeword stream into per-block codewords.
///
/// Blocks all share the ECC codeword count; the data portion splits into
/// `num_blocks` blocks where the final `data_total % num_blocks` blocks are
/// one codeword longer.
pub fn build_data_blocks(
    raw_codewords: &[u8],
    version: Version,
    ec_level: EcLevel,
) -> Result<Vec<DataBlock>> {
    if raw_codewords.len() != version.total_codewords() {
        return Err(DecodeError::InvalidArgument(
            "codeword count does not match version",
        ));
    }

    let ec_blocks = version.ec_blocks(ec_level);
    let num_blocks = ec_blocks.num_blocks;
    let ec_total = num_blocks * ec_blocks.ec_codewords_per_block;
    let data_total = raw_codewords.len() - ec_total;

    let short_data_len = data_total / num_blocks;
    let num_long_blocks = data_total % num_blocks;
    let num_short_blocks = num_blocks - num_long_blocks;

    let mut blocks: Vec<DataBlock> = (0..num_blocks)
        .map(|i| {
            let data_len = if i < num_short_blocks {
                short_data_len
            } else {
                short_data_len + 1
            };
            DataBlock {
                num_data_codewords: data_len,
                codewords: Vec::with_capacity(data_len + ec_blocks.ec_codewords_per_block),
            }
        })
        .collect();

    let mut offset = 0;
    // Data codewords cycle across blocks; long blocks take one extra round.
    for i in 0..=short_data_len {
        for block in &mut blocks {
            if i < block.num_data_codewords {
                block.codewords.push(raw_codewords[offset]);
                offset += 1;
            }
        }
    }
    // ECC codewords cycle across every block.
    for _ in 0..ec_blocks.ec_codewords_per_block {
        for block in &mut blocks {
            block.codewords.push(raw_codewords[offset]);
            offset += 1;
        }
    }
    debug_assert_eq!(offset, raw_codewords.len());

    Ok(blocks)
}
