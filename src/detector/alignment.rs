use crate::error::{DecodeError, Result};
use crate::models::{AlignmentPattern, BitMatrix};

/// Scans a bounded region for the 1:1:1 white/black/white slice around an
/// alignment pattern's center module, working outward from the middle row.
///
/// A second sighting that agrees with an earlier candidate is returned
/// immediately; failing that, the first candidate found wins.
pub struct AlignmentPatternFinder<'a> {
    image: &'a BitMatrix,
    start_x: usize,
    start_y: usize,
    width: usize,
    height: usize,
    module_size: f32,
    possible_centers: Vec<AlignmentPattern>,
}

impl<'a> AlignmentPatternFinder<'a> {
    pub fn new(
        image: &'a BitMatrix,
        start_x: usize,
        start_y: usize,
        width: usize,
        height: usize,
        module_size: f32,
    ) -> Self {
        Self {
            image,
            start_x,
            start_y,
            width,
            height,
            module_size,
            possible_centers: Vec::with_capacity(5),
        }
    }

    pub fn find(mut self) -> Result<AlignmentPattern> {
        let max_j = self.start_x + self.width;
        let middle_i = self.start_y + self.height / 2;

        for i_gen in 0..self.height {
            // Search from the middle outwards.
            let offset = (i_gen + 1) / 2;
            let i = if i_gen & 0x01 == 0 {
                middle_i + offset
            } else {
                match middle_i.checked_sub(offset) {
                    Some(i) => i,
                    None => continue,
                }
            };
            if i >= self.image.height() {
                continue;
            }

            // state_count is [white, black, white]: the runs around one
            // candidate center module. States: 0 = leading white, 1 = the
            // black run, 2 = trailing white.
            let mut state_count = [0usize; 3];
            let mut j = self.start_x;
            while j < max_j && !self.image.get(j, i) {
                j += 1;
            }
            let mut current_state = 0;
            while j < max_j {
                if self.image.get(j, i) {
                    if current_state == 1 {
                        state_count[1] += 1;
                    } else if current_state == 2 {
                        // Black again after the trailing white: the previous
                        // white-black-white window is complete.
                        if self.found_pattern_cross(&state_count) {
                            if let Some(confirmed) = self.handle_possible_center(&state_count, i, j)
                            {
                                return Ok(confirmed);
                            }
                        }
                        // Slide the window: trailing white becomes leading.
                        state_count[0] = state_count[2];
                        state_count[1] = 1;
                        state_count[2] = 0;
                        current_state = 1;
                    } else {
                        current_state = 1;
                        state_count[1] += 1;
                    }
                } else {
                    if current_state == 1 {
                        current_state = 2;
                    }
                    state_count[current_state] += 1;
                }
                j += 1;
            }
            if self.found_pattern_cross(&state_count) {
                if let Some(confirmed) = self.handle_possible_center(&state_count, i, max_j) {
                    return Ok(confirmed);
                }
            }
        }

        // No double confirmation; any candidate at all beats nothing.
        self.possible_centers
            .first()
            .copied()
            .ok_or(DecodeError::NotFound)
    }

    /// All three runs within half a module of the expected size.
    fn found_pattern_cross(&self, state_count: &[usize; 3]) -> bool {
        let max_variance = self.module_size / 2.0;
        for &count in state_count {
            if (self.module_size - count as f32).abs() >= max_variance {
                return false;
            }
        }
        true
    }

    fn center_from_end(state_count: &[usize; 3], end: usize) -> f32 {
        (end - state_count[2]) as f32 - state_count[1] as f32 / 2.0
    }

    fn handle_possible_center(
        &mut self,
        state_count: &[usize; 3],
        i: usize,
        j: usize,
    ) -> Option<AlignmentPattern> {
        let state_count_total = state_count[0] + state_count[1] + state_count[2];
        let center_j = Self::center_from_end(state_count, j);
        let center_i =
            self.cross_check_vertical(i, center_j as usize, 2 * state_count[1], state_count_total)?;

        let estimated_module_size = state_count_total as f32 / 3.0;
        for center in &self.possible_centers {
            if center.about_equals(estimated_module_size, center_j, center_i) {
                return Some(center.combine_estimate(center_j, center_i, estimated_module_size));
            }
        }
        self.possible_centers.push(AlignmentPattern::new(
            center_j,
            center_i,
            estimated_module_size,
        ));
        None
    }

    /// Re-run the 1:1:1 check vertically through a horizontal candidate.
    fn cross_check_vertical(
        &self,
        start_i: usize,
        center_j: usize,
        max_count: usize,
        original_state_count_total: usize,
    ) -> Option<f32> {
        if center_j >= self.image.width() {
            return None;
        }
        let max_i = self.image.height() as isize;
        let mut state_count = [0usize; 3];

        let mut i = start_i as isize;
        while i >= 0 && self.image.get(center_j, i as usize) && state_count[1] <= max_count {
            state_count[1] += 1;
            i -= 1;
        }
        if i < 0 || state_count[1] > max_count {
            return None;
        }
        while i >= 0 && !self.image.get(center_j, i as usize) && state_count[0] <= max_count {
            state_count[0] += 1;
            i -= 1;
        }
        if state_count[0] > max_count {
            return None;
        }

        let mut i = start_i as isize + 1;
        while i < max_i && self.image.get(center_j, i as usize) && state_count[1] <= max_count {
            state_count[1] += 1;
            i += 1;
        }
        if i == max_i || state_count[1] > max_count {
            return None;
        }
        while i < max_i && !self.image.get(center_j, i as usize) && state_count[2] <= max_count {
            state_count[2] += 1;
            i += 1;
        }
        if state_count[2] > max_count {
            return None;
        }

        let state_count_total = state_count[0] + state_count[1] + state_count[2];
        if 5 * state_count_total.abs_diff(original_state_count_total)
            >= 2 * original_state_count_total
        {
            return None;
        }

        if self.found_pattern_cross(&state_count) {
            Some(Self::center_from_end(&state_count, i as usize))
        } else {
            None
        }
    }
}
