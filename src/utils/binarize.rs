use log::debug;

use crate::error::{DecodeError, Result};
use crate::models::BitMatrix;
use crate::utils::luminance::LuminanceSource;

const BLOCK_SIZE_POWER: usize = 3;
const BLOCK_SIZE: usize = 1 << BLOCK_SIZE_POWER;
/// Below this size per side the block binarizer has too few blocks to
/// smooth over; fall back to the global histogram.
const MINIMUM_DIMENSION: usize = BLOCK_SIZE * 5;
const MIN_DYNAMIC_RANGE: i32 = 24;

const LUMINANCE_BITS: usize = 5;
const LUMINANCE_SHIFT: usize = 8 - LUMINANCE_BITS;
const LUMINANCE_BUCKETS: usize = 1 << LUMINANCE_BITS;

/// Convert a luminance source into a bit matrix (true = dark).
///
/// Images at least 40 px per side get block-local adaptive thresholds;
/// smaller images use a single global threshold from a luminance histogram.
pub fn binarize<S: LuminanceSource>(source: &S) -> Result<BitMatrix> {
    if source.width() >= MINIMUM_DIMENSION && source.height() >= MINIMUM_DIMENSION {
        block_binarize(source)
    } else {
        debug!(
            "image {}x{} below block threshold, using histogram binarizer",
            source.width(),
            source.height()
        );
        histogram_binarize(source)
    }
}

/// Global-histogram binarization: one threshold for the whole image,
/// estimated from a 32-bucket histogram over four interior rows.
pub fn histogram_binarize<S: LuminanceSource>(source: &S) -> Result<BitMatrix> {
    let width = source.width();
    let height = source.height();
    if width == 0 || height == 0 {
        return Err(DecodeError::NotFound);
    }

    let mut buckets = [0i32; LUMINANCE_BUCKETS];
    let mut row_buf = Vec::new();
    for k in 1..5 {
        let row = source.row(height * k / 5, &mut row_buf);
        let right = width * 4 / 5;
        for &pixel in &row[width / 5..right] {
            buckets[(pixel >> LUMINANCE_SHIFT) as usize] += 1;
        }
    }
    let black_point = estimate_black_point(&buckets)?;

    let luminances = source.matrix();
    let mut matrix = BitMatrix::new(width, height);
    for y in 0..height {
        let offset = y * width;
        for x in 0..width {
            if (luminances[offset + x] as i32) < black_point {
                matrix.set(x, y);
            }
        }
    }
    Ok(matrix)
}

/// Find the threshold between the two dominant histogram peaks.
fn estimate_black_point(buckets: &[i32; LUMINANCE_BUCKETS]) -> Result<i32> {
    let num_buckets = LUMINANCE_BUCKETS as i32;

    let mut max_bucket_count = 0;
    let mut first_peak = 0i32;
    let mut first_peak_size = 0;
    for (x, &count) in buckets.iter().enumerate() {
        if count > first_peak_size {
            first_peak = x as i32;
            first_peak_size = count;
        }
        if count > max_bucket_count {
            max_bucket_count = count;
        }
    }

    // Second peak: tall and far from the first.
    let mut second_peak = 0i32;
    let mut second_peak_score = 0;
    for (x, &count) in buckets.iter().enumerate() {
        let distance = x as i32 - first_peak;
        let score = count * distance * distance;
        if score > second_peak_score {
            second_peak = x as i32;
            second_peak_score = score;
        }
    }

    let (first_peak, second_peak) = if first_peak > second_peak {
        (second_peak, first_peak)
    } else {
        (first_peak, second_peak)
    };

    // Peaks too close together means there is no real black/white split.
    if second_peak - first_peak <= num_buckets / 16 {
        return Err(DecodeError::NotFound);
    }

    // Valley: low count, close to neither peak but biased toward black.
    let mut best_valley = second_peak - 1;
    let mut best_valley_score = -1;
    let mut x = second_peak - 1;
    while x > first_peak {
        let from_first = x - first_peak;
        let score = from_first * from_first * (second_peak - x) * (max_bucket_count - buckets[x as usize]);
        if score > best_valley_score {
            best_valley = x;
            best_valley_score = score;
        }
        x -= 1;
    }

    Ok(best_valley << LUMINANCE_SHIFT)
}

/// Block-local binarization: 8x8 tiles thresholded by a 5x5 smoothed grid of
/// per-block averages.
fn block_binarize<S: LuminanceSource>(source: &S) -> Result<BitMatrix> {
    let width = source.width();
    let height = source.height();
    let luminances = source.matrix();

    let mut sub_width = width >> BLOCK_SIZE_POWER;
    if width & (BLOCK_SIZE - 1) != 0 {
        sub_width += 1;
    }
    let mut sub_height = height >> BLOCK_SIZE_POWER;
    if height & (BLOCK_SIZE - 1) != 0 {
        sub_height += 1;
    }

    let black_points = calculate_black_points(&luminances, sub_width, sub_height, width, height);

    let mut matrix = BitMatrix::new(width, height);
    for y in 0..sub_height {
        let yoffset = (y << BLOCK_SIZE_POWER).min(height - BLOCK_SIZE);
        let top = cap(y, sub_height - 3);
        for x in 0..sub_width {
            let xoffset = (x << BLOCK_SIZE_POWER).min(width - BLOCK_SIZE);
            let left = cap(x, sub_width - 3);

            let mut sum = 0i32;
            for z in -2i32..=2 {
                let row = &black_points[(top as i32 + z) as usize * sub_width..];
                sum += row[left - 2] + row[left - 1] + row[left] + row[left + 1] + row[left + 2];
            }
            let average = sum / 25;
            threshold_block(&luminances, xoffset, yoffset, average, width, &mut matrix);
        }
    }
    Ok(matrix)
}

/// Clamp a block index so the 5x5 smoothing window stays inside the grid.
fn cap(value: usize, max: usize) -> usize {
    if value < 2 {
        2
    } else {
        value.min(max)
    }
}

fn threshold_block(
    luminances: &[u8],
    xoffset: usize,
    yoffset: usize,
    threshold: i32,
    width: usize,
    matrix: &mut BitMatrix,
) {
    for yy in 0..BLOCK_SIZE {
        let offset = (yoffset + yy) * width + xoffset;
        for xx in 0..BLOCK_SIZE {
            // <= so that a 0 luminance is black even against a 0 threshold.
            if (luminances[offset + xx] as i32) <= threshold {
                matrix.set(xoffset + xx, yoffset + yy);
            }
        }
    }
}

/// Per-block average luminance, with low-contrast blocks inheriting from
/// their already-computed neighbours.
fn calculate_black_points(
    luminances: &[u8],
    sub_width: usize,
    sub_height: usize,
    width: usize,
    height: usize,
) -> Vec<i32> {
    let mut black_points = vec![0i32; sub_width * sub_height];
    for y in 0..sub_height {
        let yoffset = (y << BLOCK_SIZE_POWER).min(height - BLOCK_SIZE);
        for x in 0..sub_width {
            let xoffset = (x << BLOCK_SIZE_POWER).min(width - BLOCK_SIZE);

            let mut sum = 0i32;
            let mut min = 0xFFi32;
            let mut max = 0i32;
            for yy in 0..BLOCK_SIZE {
                let offset = (yoffset + yy) * width + xoffset;
                for xx in 0..BLOCK_SIZE {
                    let pixel = luminances[offset + xx] as i32;
                    sum += pixel;
                    min = min.min(pixel);
                    max = max.max(pixel);
                }
            }

            let mut average = sum >> (BLOCK_SIZE_POWER * 2);
            if max - min <= MIN_DYNAMIC_RANGE {
                // Flat block: assume white, threshold below the darkest
                // pixel, unless neighbours say this area is inside black.
                average = min / 2;
                if y > 0 && x > 0 {
                    let neighbour_average = (black_points[(y - 1) * sub_width + x]
                        + 2 * black_points[y * sub_width + x - 1]
                        + black_points[(y - 1) * sub_width + x - 1])
                        / 4;
                    if min < neighbour_average {
                        average = neighbour_average;
                    }
                }
            }
            black_points[y * sub_width + x] = average;
        }
    }
    black_points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::luminance::GreyImage;

    fn checkered(width: usize, height: usize, cell: usize) -> GreyImage {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let dark = (x / cell + y / cell) % 2 == 0;
                pixels.push(if dark { 10 } else { 240 });
            }
        }
        GreyImage::new(pixels, width, height).unwrap()
    }

    #[test]
    fn block_binarizer_separates_checkerboard() {
        let img = checkered(64, 64, 8);
        let matrix = binarize(&img).unwrap();
        assert!(matrix.get(0, 0));
        assert!(!matrix.get(8, 0));
        assert!(matrix.get(8, 8));
        assert!(!matrix.get(63, 0));
    }

    #[test]
    fn histogram_binarizer_separates_small_image() {
        let img = checkered(32, 32, 4);
        let matrix = binarize(&img).unwrap();
        assert!(matrix.get(0, 0));
        assert!(!matrix.get(4, 0));
    }

    #[test]
    fn histogram_rejects_close_peaks() {
        // Two luminance populations one bucket apart: no usable contrast.
        let mut pixels = vec![100u8; 16 * 16];
        for (i, p) in pixels.iter_mut().enumerate() {
            if i % 2 == 0 {
                *p = 104;
            }
        }
        let img = GreyImage::new(pixels, 16, 16).unwrap();
        assert_eq!(binarize(&img).unwrap_err(), DecodeError::NotFound);
    }

    #[test]
    fn zero_luminance_is_black_under_zero_threshold() {
        // All-black block: min/2 == 0, and the <= comparison must still
        // classify 0-luminance pixels as dark.
        let img = GreyImage::new(vec![0u8; 64 * 64], 64, 64).unwrap();
        let matrix = binarize(&img).unwrap();
        assert!(matrix.get(32, 32));
    }

    #[test]
    fn row_and_matrix_sources_agree() {
        // The same pixels through the strided row accessor and the packed
        // matrix accessor must binarize identically.
        let img = checkered(48, 48, 6);
        let mut padded = Vec::new();
        let mut buf = Vec::new();
        for y in 0..48 {
            padded.extend_from_slice(img.row(y, &mut buf));
            padded.extend_from_slice(&[7, 7, 7]);
        }
        let strided = GreyImage::from_raw(padded, 48, 48, 51).unwrap();
        assert_eq!(binarize(&img).unwrap(), binarize(&strided).unwrap());
    }
}
