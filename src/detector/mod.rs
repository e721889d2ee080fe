//! Locating a symbol in a binarized image and sampling its module grid.

pub mod alignment;
pub mod finder;
pub mod sampler;
pub mod transform;

use log::debug;

use crate::error::{DecodeError, Result};
use crate::models::{AlignmentPattern, BitMatrix, Detection, Point, Version};
use alignment::AlignmentPatternFinder;
use finder::{FinderPatternFinder, FinderPatternInfo};
use transform::PerspectiveTransform;

/// Widening search areas for the alignment pattern, in module sizes.
const ALIGNMENT_ALLOWANCES: [usize; 3] = [4, 8, 16];

/// Finds one QR symbol in a binarized image and samples its module grid.
pub struct Detector<'a> {
    image: &'a BitMatrix,
}

impl<'a> Detector<'a> {
    pub fn new(image: &'a BitMatrix) -> Self {
        Self { image }
    }

    pub fn detect(&self) -> Result<Detection> {
        let info = FinderPatternFinder::new(self.image).find()?;
        self.process_finder_pattern_info(info)
    }

    fn process_finder_pattern_info(&self, info: FinderPatternInfo) -> Result<Detection> {
        let top_left = info.top_left.center;
        let top_right = info.top_right.center;
        let bottom_left = info.bottom_left.center;

        let module_size = self.calculate_module_size(&top_left, &top_right, &bottom_left);
        if module_size < 1.0 {
            return Err(DecodeError::NotFound);
        }
        let dimension = Self::compute_dimension(&top_left, &top_right, &bottom_left, module_size)?;
        let provisional_version = Version::provisional_for_dimension(dimension)?;
        let modules_between_fp_centers = provisional_version.dimension() - 7;
        debug!(
            "module size {:.2}, dimension {}, provisional version {}",
            module_size,
            dimension,
            provisional_version.number()
        );

        let mut alignment_pattern = None;
        if !provisional_version.alignment_pattern_centers().is_empty() {
            // Guess the bottom-right alignment center from the parallelogram
            // spanned by the three finder centers; it sits 3 modules in.
            let bottom_right_x = top_right.x - top_left.x + bottom_left.x;
            let bottom_right_y = top_right.y - top_left.y + bottom_left.y;
            let correction = 1.0 - 3.0 / modules_between_fp_centers as f32;
            let est_x = top_left.x + correction * (bottom_right_x - top_left.x);
            let est_y = top_left.y + correction * (bottom_right_y - top_left.y);

            for &allowance in &ALIGNMENT_ALLOWANCES {
                match self.find_alignment_in_region(module_size, est_x, est_y, allowance as f32) {
                    Ok(pattern) => {
                        alignment_pattern = Some(pattern);
                        break;
                    }
                    // Keep trying wider areas; decoding can proceed without
                    // the alignment pattern at all.
                    Err(_) => continue,
                }
            }
        }

        let transform = Self::create_transform(
            &top_left,
            &top_right,
            &bottom_left,
            alignment_pattern.as_ref(),
            dimension,
        );
        let bits = sampler::sample_grid(self.image, &transform, dimension, dimension)?;

        let mut points = vec![bottom_left, top_left, top_right];
        if let Some(pattern) = &alignment_pattern {
            points.push(pattern.center);
        }
        Ok(Detection { bits, points })
    }

    /// Map the ideal finder/alignment centers in module space onto the
    /// measured image points.
    fn create_transform(
        top_left: &Point,
        top_right: &Point,
        bottom_left: &Point,
        alignment_pattern: Option<&AlignmentPattern>,
        dimension: usize,
    ) -> PerspectiveTransform {
        let dim_minus_three = dimension as f32 - 3.5;
        let (bottom_right_x, bottom_right_y, source_bottom_right_x, source_bottom_right_y) =
            match alignment_pattern {
                Some(pattern) => (
                    pattern.center.x,
                    pattern.center.y,
                    dim_minus_three - 3.0,
                    dim_minus_three - 3.0,
                ),
                None => (
                    top_right.x - top_left.x + bottom_left.x,
                    top_right.y - top_left.y + bottom_left.y,
                    dim_minus_three,
                    dim_minus_three,
                ),
            };

        PerspectiveTransform::quadrilateral_to_quadrilateral(
            3.5,
            3.5,
            dim_minus_three,
            3.5,
            source_bottom_right_x,
            source_bottom_right_y,
            3.5,
            dim_minus_three,
            top_left.x,
            top_left.y,
            top_right.x,
            top_right.y,
            bottom_right_x,
            bottom_right_y,
            bottom_left.x,
            bottom_left.y,
        )
    }

    /// Side length in modules from the distances between finder centers.
    fn compute_dimension(
        top_left: &Point,
        top_right: &Point,
        bottom_left: &Point,
        module_size: f32,
    ) -> Result<usize> {
        let tltr = (top_left.distance(top_right) / module_size).round() as usize;
        let tlbl = (top_left.distance(bottom_left) / module_size).round() as usize;
        let mut dimension = (tltr + tlbl) / 2 + 7;
        match dimension & 0x03 {
            0 => dimension += 1,
            2 => dimension -= 1,
            3 => return Err(DecodeError::NotFound),
            _ => {}
        }
        Ok(dimension)
    }

    /// Average module size estimated along both finder-to-finder axes.
    fn calculate_module_size(
        &self,
        top_left: &Point,
        top_right: &Point,
        bottom_left: &Point,
    ) -> f32 {
        (self.calculate_module_size_one_way(top_left, top_right)
            + self.calculate_module_size_one_way(top_left, bottom_left))
            / 2.0
    }

    fn calculate_module_size_one_way(&self, pattern: &Point, other_pattern: &Point) -> f32 {
        let estimate_1 = self.size_of_black_white_black_run_both_ways(
            pattern.x as i32,
            pattern.y as i32,
            other_pattern.x as i32,
            other_pattern.y as i32,
        );
        let estimate_2 = self.size_of_black_white_black_run_both_ways(
            other_pattern.x as i32,
            other_pattern.y as i32,
            pattern.x as i32,
            pattern.y as i32,
        );
        if estimate_1.is_nan() {
            return estimate_2 / 7.0;
        }
        if estimate_2.is_nan() {
            return estimate_1 / 7.0;
        }
        // Each estimate covers both 3.5-module sweeps of one axis.
        (estimate_1 + estimate_2) / 14.0
    }

    /// Measure a black-white-black run from a finder center toward another,
    /// continuing the same distance out the back of the pattern.
    fn size_of_black_white_black_run_both_ways(
        &self,
        from_x: i32,
        from_y: i32,
        to_x: i32,
        to_y: i32,
    ) -> f32 {
        let mut result = self.size_of_black_white_black_run(from_x, from_y, to_x, to_y);

        // Mirror the target through the start point, clipping to the image.
        let width = self.image.width() as i32;
        let height = self.image.height() as i32;
        let mut scale = 1.0f32;
        let mut other_to_x = from_x - (to_x - from_x);
        if other_to_x < 0 {
            scale = from_x as f32 / (from_x - other_to_x) as f32;
            other_to_x = 0;
        } else if other_to_x >= width {
            scale = (width - 1 - from_x) as f32 / (other_to_x - from_x) as f32;
            other_to_x = width - 1;
        }
        let mut other_to_y = (from_y as f32 - (to_y - from_y) as f32 * scale) as i32;

        scale = 1.0;
        if other_to_y < 0 {
            scale = from_y as f32 / (from_y - other_to_y) as f32;
            other_to_y = 0;
        } else if other_to_y >= height {
            scale = (height - 1 - from_y) as f32 / (other_to_y - from_y) as f32;
            other_to_y = height - 1;
        }
        let other_to_x = (from_x as f32 + (other_to_x - from_x) as f32 * scale) as i32;

        result += self.size_of_black_white_black_run(from_x, from_y, other_to_x, other_to_y);

        // The start pixel is counted in both directions.
        result - 1.0
    }

    /// Bresenham walk counting pixels until the third color transition.
    fn size_of_black_white_black_run(
        &self,
        mut from_x: i32,
        mut from_y: i32,
        mut to_x: i32,
        mut to_y: i32,
    ) -> f32 {
        let steep = (to_y - from_y).abs() > (to_x - from_x).abs();
        if steep {
            std::mem::swap(&mut from_x, &mut from_y);
            std::mem::swap(&mut to_x, &mut to_y);
        }

        let dx = (to_x - from_x).abs();
        let dy = (to_y - from_y).abs();
        let mut error = -dx / 2;
        let x_step = if from_x < to_x { 1 } else { -1 };
        let y_step = if from_y < to_y { 1 } else { -1 };

        // 0 = in black, 1 = in white, 2 = in second black.
        let mut state = 0;
        let x_limit = to_x + x_step;
        let mut x = from_x;
        let mut y = from_y;
        while x != x_limit {
            let real_x = if steep { y } else { x };
            let real_y = if steep { x } else { y };
            if real_x < 0
                || real_y < 0
                || real_x >= self.image.width() as i32
                || real_y >= self.image.height() as i32
            {
                break;
            }

            // White while in a black state, or black while in white, is a
            // transition.
            if (state == 1) == self.image.get(real_x as usize, real_y as usize) {
                if state == 2 {
                    return distance(x, y, from_x, from_y);
                }
                state += 1;
            }

            error += dy;
            if error > 0 {
                if y == to_y {
                    break;
                }
                y += y_step;
                error -= dx;
            }
            x += x_step;
        }
        if state == 2 {
            return distance(to_x + x_step, to_y, from_x, from_y);
        }
        f32::NAN
    }

    /// Search for the alignment pattern within `allowance` module sizes of
    /// the estimated position.
    fn find_alignment_in_region(
        &self,
        overall_est_module_size: f32,
        est_alignment_x: f32,
        est_alignment_y: f32,
        allowance_factor: f32,
    ) -> Result<AlignmentPattern> {
        let allowance = (allowance_factor * overall_est_module_size) as i32;
        let est_x = est_alignment_x as i32;
        let est_y = est_alignment_y as i32;
        let width = self.image.width() as i32;
        let height = self.image.height() as i32;

        let alignment_area_left_x = (est_x - allowance).max(0);
        let alignment_area_right_x = (est_x + allowance).min(width - 1);
        if ((alignment_area_right_x - alignment_area_left_x) as f32) < overall_est_module_size * 3.0 {
            return Err(DecodeError::NotFound);
        }
        let alignment_area_top_y = (est_y - allowance).max(0);
        let alignment_area_bottom_y = (est_y + allowance).min(height - 1);
        if ((alignment_area_bottom_y - alignment_area_top_y) as f32) < overall_est_module_size * 3.0 {
            return Err(DecodeError::NotFound);
        }

        AlignmentPatternFinder::new(
            self.image,
            alignment_area_left_x as usize,
            alignment_area_top_y as usize,
            (alignment_area_right_x - alignment_area_left_x) as usize,
            (alignment_area_bottom_y - alignment_area_top_y) as usize,
            overall_est_module_size,
        )
        .find()
    }
}

fn distance(a_x: i32, a_y: i32, b_x: i32, b_y: i32) -> f32 {
    let dx = (a_x - b_x) as f32;
    let dy = (a_y - b_y) as f32;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Point;

    fn p(x: f32, y: f32) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn dimension_rounds_to_valid_sizes() {
        // 14 modules between centers on both axes: version 1.
        let dim =
            Detector::compute_dimension(&p(24.0, 24.0), &p(80.0, 24.0), &p(24.0, 80.0), 4.0)
                .unwrap();
        assert_eq!(dim, 21);

        // One axis off by a module still snaps to 21 (mod-4 adjustment).
        let dim =
            Detector::compute_dimension(&p(24.0, 24.0), &p(84.0, 24.0), &p(24.0, 80.0), 4.0)
                .unwrap();
        assert_eq!(dim, 21);

        // A mod-4 remainder of 3 is unrecoverable.
        assert_eq!(
            Detector::compute_dimension(&p(24.0, 24.0), &p(88.0, 24.0), &p(24.0, 88.0), 4.0)
                .unwrap_err(),
            DecodeError::NotFound
        );
    }

    #[test]
    fn measures_module_size_on_synthetic_pattern() {
        // Two finder patterns 56 px apart at 4 px per module.
        let mut image = BitMatrix::square(120);
        super::finder::tests::paint_finder(&mut image, 10, 10, 4);
        super::finder::tests::paint_finder(&mut image, 66, 10, 4);
        let detector = Detector::new(&image);
        let size = detector.calculate_module_size_one_way(&p(24.0, 24.0), &p(80.0, 24.0));
        assert!((size - 4.0).abs() < 0.6, "module size {}", size);
    }

    #[test]
    fn black_white_black_run_measures_half_pattern() {
        let mut image = BitMatrix::square(60);
        super::finder::tests::paint_finder(&mut image, 10, 10, 4);
        let detector = Detector::new(&image);
        // From the center (24, 24) walking right: core black to x=29, white
        // ring to x=33, outer ring to x=37; the run ends entering the quiet
        // zone at x=38.
        let run = detector.size_of_black_white_black_run(24, 24, 50, 24);
        assert!((run - 14.0).abs() <= 1.5, "run {}", run);
    }
}
