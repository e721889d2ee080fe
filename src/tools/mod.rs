//! Boundary adaptors between image files and the decoder's luminance
//! input. Kept out of the core: nothing under `detector/` or `decoder/`
//! touches the `image` crate.

use std::path::Path;

use crate::error::{DecodeError, Result};
use crate::utils::luminance::GreyImage;

/// Load an image file and convert it to the decoder's greyscale input.
pub fn load_luminance<P: AsRef<Path>>(path: P) -> Result<GreyImage> {
    let dynamic = image::open(path.as_ref())
        .map_err(|_| DecodeError::InvalidArgument("image file could not be read"))?;
    let rgb = dynamic.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    GreyImage::from_rgb(rgb.as_raw(), width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_invalid_argument() {
        assert!(matches!(
            load_luminance("definitely/not/here.png"),
            Err(DecodeError::InvalidArgument(_))
        ));
    }
}
