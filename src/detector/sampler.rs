use crate::detector::transform::PerspectiveTransform;
use crate::error::{DecodeError, Result};
use crate::models::BitMatrix;

/// Sample a `dimension_x` x `dimension_y` module grid out of `image` using
/// `transform` to map module centers into image space.
///
/// Points that land just outside the image (by at most one pixel) are
/// nudged back in; anything further out means the transform is bogus and
/// the symbol is treated as not found.
pub fn sample_grid(
    image: &BitMatrix,
    transform: &PerspectiveTransform,
    dimension_x: usize,
    dimension_y: usize,
) -> Result<BitMatrix> {
    if dimension_x == 0 || dimension_y == 0 {
        return Err(DecodeError::InvalidArgument("empty sampling grid"));
    }
    let mut bits = BitMatrix::new(dimension_x, dimension_y);
    let mut points = vec![0f32; 2 * dimension_x];

    for y in 0..dimension_y {
        let i_value = y as f32 + 0.5;
        for x in 0..dimension_x {
            points[2 * x] = x as f32 + 0.5;
            points[2 * x + 1] = i_value;
        }
        transform.transform_points(&mut points);
        check_and_nudge_points(image, &mut points)?;

        for x in 0..dimension_x {
            let px = points[2 * x] as isize;
            let py = points[2 * x + 1] as isize;
            // Truncation may still walk outside on twisted transforms.
            if px < 0
                || py < 0
                || px >= image.width() as isize
                || py >= image.height() as isize
            {
                return Err(DecodeError::NotFound);
            }
            if image.get(px as usize, py as usize) {
                bits.set(x, y);
            }
        }
    }
    Ok(bits)
}

/// Nudge endpoints sitting a hair outside the image back inside; fail when
/// any endpoint is more than a pixel out.
fn check_and_nudge_points(image: &BitMatrix, points: &mut [f32]) -> Result<()> {
    let width = image.width() as f32;
    let height = image.height() as f32;

    let mut nudged = true;
    let mut offset = 0;
    while offset < points.len() && nudged {
        nudged = nudge_point(points, offset, width, height)?;
        offset += 2;
    }

    nudged = true;
    let mut offset = points.len() as isize - 2;
    while offset >= 0 && nudged {
        nudged = nudge_point(points, offset as usize, width, height)?;
        offset -= 2;
    }
    Ok(())
}

fn nudge_point(points: &mut [f32], offset: usize, width: f32, height: f32) -> Result<bool> {
    let x = points[offset] as i64 as f32;
    let y = points[offset + 1] as i64 as f32;
    if x < -1.0 || x > width || y < -1.0 || y > height {
        return Err(DecodeError::NotFound);
    }
    let mut nudged = false;
    if x == -1.0 {
        points[offset] = 0.0;
        nudged = true;
    } else if x == width {
        points[offset] = width - 1.0;
        nudged = true;
    }
    if y == -1.0 {
        points[offset + 1] = 0.0;
        nudged = true;
    } else if y == height {
        points[offset + 1] = height - 1.0;
        nudged = true;
    }
    Ok(nudged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_for(dimension: usize, scale: f32) -> PerspectiveTransform {
        let d = dimension as f32 * scale;
        PerspectiveTransform::quadrilateral_to_quadrilateral(
            0.0, 0.0, dimension as f32, 0.0, dimension as f32, dimension as f32, 0.0,
            dimension as f32, 0.0, 0.0, d, 0.0, d, d, 0.0, d,
        )
    }

    #[test]
    fn samples_scaled_pattern() {
        // 4x4 module pattern rendered at 3 px per module.
        let mut image = BitMatrix::square(12);
        for my in 0..4 {
            for mx in 0..4 {
                if (mx + my) % 2 == 0 {
                    for y in 0..3 {
                        for x in 0..3 {
                            image.set(mx * 3 + x, my * 3 + y);
                        }
                    }
                }
            }
        }
        let transform = identity_for(4, 3.0);
        let bits = sample_grid(&image, &transform, 4, 4).unwrap();
        for my in 0..4 {
            for mx in 0..4 {
                assert_eq!(bits.get(mx, my), (mx + my) % 2 == 0);
            }
        }
    }

    #[test]
    fn edge_points_get_nudged() {
        // Transform mapping the grid exactly onto the image edges: last
        // column's centers land at x == width and must be pulled back.
        let image = BitMatrix::square(10);
        let transform = PerspectiveTransform::quadrilateral_to_quadrilateral(
            0.5, 0.5, 9.5, 0.5, 9.5, 9.5, 0.5, 9.5, //
            0.5, 0.5, 10.0, 0.5, 10.0, 9.5, 0.5, 9.5,
        );
        assert!(sample_grid(&image, &transform, 10, 10).is_ok());
    }

    #[test]
    fn far_out_transform_is_not_found() {
        let image = BitMatrix::square(10);
        let transform = PerspectiveTransform::quadrilateral_to_quadrilateral(
            0.0, 0.0, 4.0, 0.0, 4.0, 4.0, 0.0, 4.0, //
            50.0, 50.0, 90.0, 50.0, 90.0, 90.0, 50.0, 90.0,
        );
        assert_eq!(
            sample_grid(&image, &transform, 4, 4).unwrap_err(),
            DecodeError::NotFound
        );
    }
}
