//! Image and aperture-mask helpers shared by the analysis stages.

use ndarray::Array2;

use crate::error::{FringeError, FringeResult};

/// Real-valued 2D sample grid: a raw fringe pattern or a derived phase/amplitude map.
pub type Image = Array2<f64>;

/// Aperture mask; `true` marks a valid pixel.
pub type Mask = Array2<bool>;

/// Normalised radial distance from the image centre.
///
/// Each axis is scaled by half its extent, so the value is 1.0 at the middle
/// of every edge and about 1.41 in the corners of a square image.
///
/// # Examples
///
/// ```
/// use fringe_analysis_core::image::mk_rad_mask;
///
/// let rad = mk_rad_mask(64, 48);
/// assert_eq!(rad.dim(), (64, 48));
/// assert!(rad[[32, 24]] < 0.05);
/// ```
pub fn mk_rad_mask(height: usize, width: usize) -> Image {
    let cy = (height as f64 - 1.0) / 2.0;
    let cx = (width as f64 - 1.0) / 2.0;
    let ny = (height as f64 / 2.0).max(f64::MIN_POSITIVE);
    let nx = (width as f64 / 2.0).max(f64::MIN_POSITIVE);

    Array2::from_shape_fn((height, width), |(i, j)| {
        let dy = (i as f64 - cy) / ny;
        let dx = (j as f64 - cx) / nx;
        (dy * dy + dx * dx).sqrt()
    })
}

/// Circular (elliptical for non-square images) aperture of normalised radius `radius`.
pub fn aperture_mask(height: usize, width: usize, radius: f64) -> Mask {
    mk_rad_mask(height, width).mapv(|r| r < radius)
}

/// Fails with [`FringeError::EmptyInput`] when the image has no pixels.
pub fn ensure_non_empty(image: &Image, context: &str) -> FringeResult<()> {
    if image.is_empty() {
        return Err(FringeError::empty_input(context));
    }
    Ok(())
}

/// Fails with [`FringeError::ShapeMismatch`] when `got` differs from `expected`.
pub fn ensure_shape(
    expected: (usize, usize),
    got: (usize, usize),
    context: &str,
) -> FringeResult<()> {
    if expected != got {
        return Err(FringeError::shape_mismatch(expected, got, context));
    }
    Ok(())
}

/// Zero every pixel outside the mask.
pub fn apply_mask(image: &mut Image, mask: &Mask) {
    ndarray::Zip::from(image).and(mask).for_each(|value, &valid| {
        if !valid {
            *value = 0.0;
        }
    });
}

/// Mean over the masked pixels (all pixels when `mask` is `None`).
///
/// Returns 0.0 when no pixel is valid.
pub fn masked_mean(image: &Image, mask: Option<&Mask>) -> f64 {
    let (sum, count) = match mask {
        Some(mask) => image
            .iter()
            .zip(mask.iter())
            .filter(|(_, valid)| **valid)
            .fold((0.0, 0usize), |(s, n), (&v, _)| (s + v, n + 1)),
        None => (image.sum(), image.len()),
    };
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Replace NaN and infinite samples by zero, returning how many were replaced.
pub fn scrub_non_finite(image: &mut Image) -> usize {
    let mut replaced = 0;
    image.iter_mut().for_each(|value| {
        if !value.is_finite() {
            *value = 0.0;
            replaced += 1;
        }
    });
    replaced
}
