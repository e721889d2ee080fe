use log::debug;

use crate::error::{DecodeError, Result};
use crate::models::{cross_product_z, BitMatrix, FinderPattern};

/// Sightings needed before a candidate counts as confirmed.
const CENTER_QUORUM: usize = 2;
/// Smallest row step while hunting for the first pattern.
const MIN_SKIP: usize = 3;
/// Largest symbol accounted for when picking the initial row step.
const MAX_MODULES: usize = 97;

/// The three finder patterns of one symbol, in canonical order.
#[derive(Debug, Clone, Copy)]
pub struct FinderPatternInfo {
    pub bottom_left: FinderPattern,
    pub top_left: FinderPattern,
    pub top_right: FinderPattern,
}

/// Scans the binarized image for the three 1:1:3:1:1 finder patterns.
pub struct FinderPatternFinder<'a> {
    image: &'a BitMatrix,
    possible_centers: Vec<FinderPattern>,
    has_skipped: bool,
}

impl<'a> FinderPatternFinder<'a> {
    pub fn new(image: &'a BitMatrix) -> Self {
        Self {
            image,
            possible_centers: Vec::new(),
            has_skipped: false,
        }
    }

    pub fn find(mut self) -> Result<FinderPatternInfo> {
        let max_i = self.image.height();
        let max_j = self.image.width();

        // Look for enough rows per pattern that a symbol a third of the
        // image high is still caught; never fewer than MIN_SKIP.
        let mut i_skip = (3 * max_i) / (4 * MAX_MODULES);
        if i_skip < MIN_SKIP {
            i_skip = MIN_SKIP;
        }

        let mut done = false;
        let mut i = i_skip - 1;
        while i < max_i && !done {
            let mut state_count = [0usize; 5];
            let mut current_state = 0usize;
            let mut j = 0usize;
            while j < max_j {
                if self.image.get(j, i) {
                    if current_state & 1 == 1 {
                        // Was counting white: advance.
                        current_state += 1;
                    }
                    state_count[current_state] += 1;
                } else if current_state & 1 == 0 {
                    // White while counting black.
                    if current_state == 4 {
                        // Five runs complete: candidate window.
                        if Self::found_pattern_cross(&state_count) {
                            if self.handle_possible_center(&state_count, i, j) {
                                i_skip = 2;
                                if self.has_skipped {
                                    done = self.have_multiply_confirmed_centers();
                                } else {
                                    let row_skip = self.find_row_skip();
                                    if row_skip > state_count[2] {
                                        // Jump ahead toward the expected next
                                        // pattern row and abandon this one.
                                        let advance = row_skip as isize
                                            - state_count[2] as isize
                                            - i_skip as isize;
                                        if advance > 0 {
                                            i += advance as usize;
                                        }
                                        j = max_j - 1;
                                    }
                                }
                                current_state = 0;
                                state_count = [0; 5];
                            } else {
                                Self::shift_counts_two(&mut state_count);
                                current_state = 3;
                                j += 1;
                                continue;
                            }
                        } else {
                            Self::shift_counts_two(&mut state_count);
                            current_state = 3;
                        }
                    } else {
                        current_state += 1;
                        state_count[current_state] += 1;
                    }
                } else {
                    // White while counting white.
                    state_count[current_state] += 1;
                }
                j += 1;
            }
            if Self::found_pattern_cross(&state_count) {
                if self.handle_possible_center(&state_count, i, max_j) {
                    i_skip = state_count[0];
                    if self.has_skipped {
                        done = self.have_multiply_confirmed_centers();
                    }
                }
            }
            i += i_skip;
        }

        debug!("finder scan: {} candidate center(s)", self.possible_centers.len());
        let [p0, p1, p2] = self.select_best_patterns()?;
        Ok(Self::order_best_patterns(p0, p1, p2))
    }

    /// Run lengths in 1:1:3:1:1 proportion, each within half a module.
    fn found_pattern_cross(state_count: &[usize; 5]) -> bool {
        let mut total = 0;
        for &count in state_count {
            if count == 0 {
                return false;
            }
            total += count;
        }
        if total < 7 {
            return false;
        }
        let module_size = total as f32 / 7.0;
        let max_variance = module_size / 2.0;
        (module_size - state_count[0] as f32).abs() < max_variance
            && (module_size - state_count[1] as f32).abs() < max_variance
            && (3.0 * module_size - state_count[2] as f32).abs() < 3.0 * max_variance
            && (module_size - state_count[3] as f32).abs() < max_variance
            && (module_size - state_count[4] as f32).abs() < max_variance
    }

    fn center_from_end(state_count: &[usize; 5], end: usize) -> f32 {
        (end - state_count[4] - state_count[3]) as f32 - state_count[2] as f32 / 2.0
    }

    fn shift_counts_two(state_count: &mut [usize; 5]) {
        state_count[0] = state_count[2];
        state_count[1] = state_count[3];
        state_count[2] = state_count[4];
        state_count[3] = 1;
        state_count[4] = 0;
    }

    /// Cross-check a horizontal hit vertically, horizontally again, and
    /// diagonally; merge into an existing candidate or record a new one.
    fn handle_possible_center(&mut self, state_count: &[usize; 5], i: usize, j: usize) -> bool {
        let state_count_total: usize = state_count.iter().sum();
        let mut center_j = Self::center_from_end(state_count, j);
        let center_i = match self.cross_check_vertical(
            i,
            center_j as usize,
            state_count[2],
            state_count_total,
        ) {
            Some(c) => c,
            None => return false,
        };
        center_j = match self.cross_check_horizontal(
            center_j as usize,
            center_i as usize,
            state_count[2],
            state_count_total,
        ) {
            Some(c) => c,
            None => return false,
        };
        if !self.cross_check_diagonal(center_i as usize, center_j as usize, state_count_total) {
            return false;
        }

        let estimated_module_size = state_count_total as f32 / 7.0;
        for center in self.possible_centers.iter_mut() {
            if center.about_equals(estimated_module_size, center_j, center_i) {
                *center = center.combine_estimate(center_j, center_i, estimated_module_size);
                return true;
            }
        }
        self.possible_centers
            .push(FinderPattern::new(center_j, center_i, estimated_module_size));
        true
    }

    fn cross_check_vertical(
        &self,
        start_i: usize,
        center_j: usize,
        max_count: usize,
        original_state_count_total: usize,
    ) -> Option<f32> {
        let image = self.image;
        if center_j >= image.width() {
            return None;
        }
        let max_i = image.height() as isize;
        let mut state_count = [0usize; 5];

        // Upward from the center.
        let mut i = start_i as isize;
        while i >= 0 && image.get(center_j, i as usize) {
            state_count[2] += 1;
            i -= 1;
        }
        if i < 0 {
            return None;
        }
        while i >= 0 && !image.get(center_j, i as usize) && state_count[1] <= max_count {
            state_count[1] += 1;
            i -= 1;
        }
        if i < 0 || state_count[1] > max_count {
            return None;
        }
        while i >= 0 && image.get(center_j, i as usize) && state_count[0] <= max_count {
            state_count[0] += 1;
            i -= 1;
        }
        if state_count[0] > max_count {
            return None;
        }

        // Downward from the center.
        let mut i = start_i as isize + 1;
        while i < max_i && image.get(center_j, i as usize) {
            state_count[2] += 1;
            i += 1;
        }
        if i == max_i {
            return None;
        }
        while i < max_i && !image.get(center_j, i as usize) && state_count[3] < max_count {
            state_count[3] += 1;
            i += 1;
        }
        if i == max_i || state_count[3] >= max_count {
            return None;
        }
        while i < max_i && image.get(center_j, i as usize) && state_count[4] < max_count {
            state_count[4] += 1;
            i += 1;
        }
        if state_count[4] >= max_count {
            return None;
        }

        // A vertical run wildly longer or shorter than the horizontal one
        // is noise, not the same pattern.
        let state_count_total: usize = state_count.iter().sum();
        if 5 * state_count_total.abs_diff(original_state_count_total)
            >= 2 * original_state_count_total
        {
            return None;
        }

        if Self::found_pattern_cross(&state_count) {
            Some(Self::center_from_end(&state_count, i as usize))
        } else {
            None
        }
    }

    fn cross_check_horizontal(
        &self,
        start_j: usize,
        center_i: usize,
        max_count: usize,
        original_state_count_total: usize,
    ) -> Option<f32> {
        let image = self.image;
        if center_i >= image.height() {
            return None;
        }
        let max_j = image.width() as isize;
        let mut state_count = [0usize; 5];

        let mut j = start_j as isize;
        while j >= 0 && image.get(j as usize, center_i) {
            state_count[2] += 1;
            j -= 1;
        }
        if j < 0 {
            return None;
        }
        while j >= 0 && !image.get(j as usize, center_i) && state_count[1] <= max_count {
            state_count[1] += 1;
            j -= 1;
        }
        if j < 0 || state_count[1] > max_count {
            return None;
        }
        while j >= 0 && image.get(j as usize, center_i) && state_count[0] <= max_count {
            state_count[0] += 1;
            j -= 1;
        }
        if state_count[0] > max_count {
            return None;
        }

        let mut j = start_j as isize + 1;
        while j < max_j && image.get(j as usize, center_i) {
            state_count[2] += 1;
            j += 1;
        }
        if j == max_j {
            return None;
        }
        while j < max_j && !image.get(j as usize, center_i) && state_count[3] < max_count {
            state_count[3] += 1;
            j += 1;
        }
        if j == max_j || state_count[3] >= max_count {
            return None;
        }
        while j < max_j && image.get(j as usize, center_i) && state_count[4] < max_count {
            state_count[4] += 1;
            j += 1;
        }
        if state_count[4] >= max_count {
            return None;
        }

        let state_count_total: usize = state_count.iter().sum();
        if 5 * state_count_total.abs_diff(original_state_count_total)
            >= original_state_count_total
        {
            return None;
        }

        if Self::found_pattern_cross(&state_count) {
            Some(Self::center_from_end(&state_count, j as usize))
        } else {
            None
        }
    }

    /// Walk the up-left and down-right diagonal through the candidate.
    fn cross_check_diagonal(
        &self,
        center_i: usize,
        center_j: usize,
        original_state_count_total: usize,
    ) -> bool {
        let image = self.image;
        let mut state_count = [0usize; 5];

        // Up and to the left.
        let mut i = 0usize;
        while center_i >= i && center_j >= i && image.get(center_j - i, center_i - i) {
            state_count[2] += 1;
            i += 1;
        }
        if state_count[2] == 0 {
            return false;
        }
        while center_i >= i && center_j >= i && !image.get(center_j - i, center_i - i) {
            state_count[1] += 1;
            i += 1;
        }
        if state_count[1] == 0 {
            return false;
        }
        while center_i >= i && center_j >= i && image.get(center_j - i, center_i - i) {
            state_count[0] += 1;
            i += 1;
        }
        if state_count[0] == 0 {
            return false;
        }

        // Down and to the right.
        let max_i = image.height();
        let max_j = image.width();
        let mut i = 1usize;
        while center_i + i < max_i && center_j + i < max_j && image.get(center_j + i, center_i + i)
        {
            state_count[2] += 1;
            i += 1;
        }
        while center_i + i < max_i && center_j + i < max_j && !image.get(center_j + i, center_i + i)
        {
            state_count[3] += 1;
            i += 1;
        }
        while center_i + i < max_i && center_j + i < max_j && image.get(center_j + i, center_i + i)
        {
            state_count[4] += 1;
            i += 1;
        }

        let state_count_total: usize = state_count.iter().sum();
        state_count_total.abs_diff(original_state_count_total) <= original_state_count_total
            && Self::found_pattern_cross(&state_count)
    }

    /// Once two centers are confirmed, guess how many rows can be skipped:
    /// half the x-distance minus the y-distance between them.
    fn find_row_skip(&mut self) -> usize {
        if self.possible_centers.len() <= 1 {
            return 0;
        }
        let mut first_confirmed: Option<FinderPattern> = None;
        for center in &self.possible_centers {
            if center.count >= CENTER_QUORUM {
                match first_confirmed {
                    None => first_confirmed = Some(*center),
                    Some(first) => {
                        self.has_skipped = true;
                        let skip = (first.center.x - center.center.x).abs()
                            - (first.center.y - center.center.y).abs();
                        return (skip / 2.0).max(0.0) as usize;
                    }
                }
            }
        }
        0
    }

    /// At least three confirmed centers whose module sizes deviate by no
    /// more than 5% in total.
    fn have_multiply_confirmed_centers(&self) -> bool {
        let mut confirmed_count = 0;
        let mut total_module_size = 0.0f32;
        for center in &self.possible_centers {
            if center.count >= CENTER_QUORUM {
                confirmed_count += 1;
                total_module_size += center.module_size;
            }
        }
        if confirmed_count < 3 {
            return false;
        }
        let average = total_module_size / self.possible_centers.len() as f32;
        let total_deviation: f32 = self
            .possible_centers
            .iter()
            .map(|center| (center.module_size - average).abs())
            .sum();
        total_deviation <= 0.05 * total_module_size
    }

    /// Pick the three candidates with similar module sizes forming the
    /// triangle closest to an isosceles right triangle.
    fn select_best_patterns(&mut self) -> Result<[FinderPattern; 3]> {
        if self.possible_centers.len() < 3 {
            return Err(DecodeError::NotFound);
        }
        self.possible_centers
            .sort_by(|a, b| a.module_size.total_cmp(&b.module_size));

        let centers = &self.possible_centers;
        let mut best_distortion = f32::MAX;
        let mut best: Option<[FinderPattern; 3]> = None;
        for i in 0..centers.len() - 2 {
            let fpi = centers[i];
            let min_module_size = fpi.module_size;
            for j in (i + 1)..centers.len() - 1 {
                let fpj = centers[j];
                let squares0 = fpi.center.distance_squared(&fpj.center);
                for k in (j + 1)..centers.len() {
                    let fpk = centers[k];
                    // Candidates are sorted, so fpk has the largest size.
                    if fpk.module_size > min_module_size * 1.4 {
                        continue;
                    }
                    let mut sides = [
                        squares0,
                        fpj.center.distance_squared(&fpk.center),
                        fpi.center.distance_squared(&fpk.center),
                    ];
                    sides.sort_by(f32::total_cmp);
                    let [a, b, c] = sides;
                    // For an isosceles right triangle the hypotenuse squared
                    // is twice each leg squared.
                    let distortion = (c - 2.0 * b).abs() + (c - 2.0 * a).abs();
                    if distortion < best_distortion {
                        best_distortion = distortion;
                        best = Some([fpi, fpj, fpk]);
                    }
                }
            }
        }

        best.ok_or(DecodeError::NotFound)
    }

    /// Order as (bottom-left, top-left, top-right): the top-left corner is
    /// off the longest side, and the cross product fixes the handedness.
    fn order_best_patterns(
        p0: FinderPattern,
        p1: FinderPattern,
        p2: FinderPattern,
    ) -> FinderPatternInfo {
        let zero_one = p0.center.distance(&p1.center);
        let one_two = p1.center.distance(&p2.center);
        let zero_two = p0.center.distance(&p2.center);

        let (mut point_a, point_b, mut point_c) =
            if one_two >= zero_one && one_two >= zero_two {
                (p1, p0, p2)
            } else if zero_two >= one_two && zero_two >= zero_one {
                (p0, p1, p2)
            } else {
                (p0, p2, p1)
            };

        // A (bottom-left) and C (top-right) must wind counter-clockwise
        // around B, otherwise the triple describes a mirror image.
        if cross_product_z(&point_a.center, &point_b.center, &point_c.center) < 0.0 {
            std::mem::swap(&mut point_a, &mut point_c);
        }

        FinderPatternInfo {
            bottom_left: point_a,
            top_left: point_b,
            top_right: point_c,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Paint a 7x7 finder pattern at the given top-left pixel corner.
    pub(crate) fn paint_finder(image: &mut BitMatrix, left: usize, top: usize, scale: usize) {
        for my in 0..7 {
            for mx in 0..7 {
                let ring = mx == 0 || mx == 6 || my == 0 || my == 6;
                let core = (2..=4).contains(&mx) && (2..=4).contains(&my);
                if ring || core {
                    for y in 0..scale {
                        for x in 0..scale {
                            image.set(left + mx * scale + x, top + my * scale + y);
                        }
                    }
                }
            }
        }
    }

    fn close(a: f32, b: f32, tolerance: f32) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn finds_and_orders_three_patterns() {
        let mut image = BitMatrix::square(120);
        paint_finder(&mut image, 10, 10, 4);
        paint_finder(&mut image, 82, 10, 4);
        paint_finder(&mut image, 10, 82, 4);

        let info = FinderPatternFinder::new(&image).find().unwrap();
        // Pattern centers are 14 px from each painted corner.
        assert!(close(info.top_left.center.x, 24.0, 2.0), "{:?}", info);
        assert!(close(info.top_left.center.y, 24.0, 2.0));
        assert!(close(info.top_right.center.x, 96.0, 2.0));
        assert!(close(info.top_right.center.y, 24.0, 2.0));
        assert!(close(info.bottom_left.center.x, 24.0, 2.0));
        assert!(close(info.bottom_left.center.y, 96.0, 2.0));
    }

    #[test]
    fn ordering_invariants_hold() {
        let mut image = BitMatrix::square(120);
        // Rotated 180 degrees: top-left pattern is missing, bottom-right
        // exists instead.
        paint_finder(&mut image, 82, 10, 4);
        paint_finder(&mut image, 10, 82, 4);
        paint_finder(&mut image, 82, 82, 4);

        let info = FinderPatternFinder::new(&image).find().unwrap();
        let bl = info.bottom_left.center;
        let tl = info.top_left.center;
        let tr = info.top_right.center;
        assert!(tl.distance(&bl) <= bl.distance(&tr));
        assert!(tl.distance(&tr) <= bl.distance(&tr));
        assert!(cross_product_z(&bl, &tl, &tr) >= 0.0);
    }

    #[test]
    fn two_patterns_are_not_enough() {
        let mut image = BitMatrix::square(120);
        paint_finder(&mut image, 10, 10, 4);
        paint_finder(&mut image, 82, 10, 4);
        assert_eq!(
            FinderPatternFinder::new(&image).find().unwrap_err(),
            DecodeError::NotFound
        );
    }

    #[test]
    fn blank_image_is_not_found() {
        let image = BitMatrix::square(60);
        assert_eq!(
            FinderPatternFinder::new(&image).find().unwrap_err(),
            DecodeError::NotFound
        );
    }

    #[test]
    fn pattern_cross_ratio_checks() {
        assert!(FinderPatternFinder::found_pattern_cross(&[4, 4, 12, 4, 4]));
        assert!(FinderPatternFinder::found_pattern_cross(&[1, 1, 3, 1, 1]));
        assert!(!FinderPatternFinder::found_pattern_cross(&[4, 4, 4, 4, 4]));
        assert!(!FinderPatternFinder::found_pattern_cross(&[4, 0, 12, 4, 4]));
        assert!(!FinderPatternFinder::found_pattern_cross(&[1, 1, 1, 1, 1]));
    }
}
