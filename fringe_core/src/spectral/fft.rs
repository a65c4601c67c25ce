//! Separable 2D FFT over `ndarray` images.
//!
//! Rows are transformed first, then the buffer is transposed so columns can be
//! transformed as contiguous rows, and transposed back. Both passes run in
//! parallel over rows with rayon. The inverse transform is normalised by
//! `1 / (rows · cols)` so that `ifft2(fft2(x)) == x`.

use std::sync::Arc;

use ndarray::Array2;
use rayon::prelude::*;
use rustfft::{num_complex::Complex64, Fft, FftPlanner};

use crate::error::FringeResult;
use crate::image::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Inverse,
}

/// Forward 2D FFT.
pub fn fft2(data: Array2<Complex64>) -> FringeResult<Array2<Complex64>> {
    let rows = data.nrows();
    transform(data, rows, Direction::Forward)
}

/// Inverse 2D FFT, normalised.
pub fn ifft2(data: Array2<Complex64>) -> FringeResult<Array2<Complex64>> {
    let rows = data.nrows();
    transform(data, rows, Direction::Inverse)
}

/// Forward FFT of a real image.
pub fn fft2_real(image: &Image) -> FringeResult<Array2<Complex64>> {
    fft2(image.mapv(|v| Complex64::new(v, 0.0)))
}

/// Forward FFT of `image` zero-padded into a canvas of `factor` times its size.
///
/// The image occupies the top-left corner of the canvas. Rows of the canvas
/// that hold only padding stay zero through the first pass and are skipped.
pub fn fft2_embedded(image: &Image, factor: usize) -> FringeResult<Array2<Complex64>> {
    let (h, w) = image.dim();
    let factor = factor.max(1);
    let mut canvas = Array2::<Complex64>::zeros((h * factor, w * factor));
    canvas
        .slice_mut(ndarray::s![..h, ..w])
        .zip_mut_with(image, |dst, &src| *dst = Complex64::new(src, 0.0));
    transform(canvas, h, Direction::Forward)
}

fn plan(n: usize, direction: Direction, planner: &mut FftPlanner<f64>) -> Arc<dyn Fft<f64>> {
    match direction {
        Direction::Forward => planner.plan_fft_forward(n),
        Direction::Inverse => planner.plan_fft_inverse(n),
    }
}

fn process_rows(buffer: &mut [Complex64], len: usize, fft: &Arc<dyn Fft<f64>>) {
    if len == 0 {
        return;
    }
    let scratch_len = fft.get_inplace_scratch_len();
    buffer.par_chunks_mut(len).for_each_init(
        || vec![Complex64::default(); scratch_len],
        |scratch, row| fft.process_with_scratch(row, scratch),
    );
}

fn transpose(src: &[Complex64], rows: usize, cols: usize) -> Vec<Complex64> {
    let mut dst = vec![Complex64::default(); rows * cols];
    if rows == 0 || cols == 0 {
        return dst;
    }
    dst.par_chunks_mut(rows).enumerate().for_each(|(j, column)| {
        for (i, value) in column.iter_mut().enumerate() {
            *value = src[i * cols + j];
        }
    });
    dst
}

/// Transform `data` in both axes. Only the first `active_rows` rows may be
/// non-zero; the remaining rows skip the first pass.
fn transform(
    data: Array2<Complex64>,
    active_rows: usize,
    direction: Direction,
) -> FringeResult<Array2<Complex64>> {
    let (rows, cols) = data.dim();
    if rows == 0 || cols == 0 {
        return Ok(data);
    }

    let mut buffer = if data.is_standard_layout() {
        data.into_raw_vec()
    } else {
        data.iter().copied().collect()
    };

    let mut planner = FftPlanner::<f64>::new();
    let row_fft = plan(cols, direction, &mut planner);
    let col_fft = plan(rows, direction, &mut planner);

    let active = active_rows.min(rows) * cols;
    process_rows(&mut buffer[..active], cols, &row_fft);

    let mut transposed = transpose(&buffer, rows, cols);
    process_rows(&mut transposed, rows, &col_fft);
    let mut result = transpose(&transposed, cols, rows);

    if direction == Direction::Inverse {
        let norm = 1.0 / (rows * cols) as f64;
        result.par_iter_mut().for_each(|value| *value *= norm);
    }

    Ok(Array2::from_shape_vec((rows, cols), result)?)
}

/// Signed frequency index of FFT bin `index` on an axis of length `n`.
///
/// Bins in the upper half map to negative frequencies, e.g. bin `n - 1` is `-1`.
pub fn signed_bin(index: usize, n: usize) -> f64 {
    if index < (n + 1) / 2 {
        index as f64
    } else {
        index as f64 - n as f64
    }
}

/// Move the zero-frequency bin to the centre of the array (and back for odd
/// sizes with [`ifftshift`]).
pub fn fftshift<T: Copy>(data: &Array2<T>) -> Array2<T> {
    let (rows, cols) = data.dim();
    let (sr, sc) = (rows / 2, cols / 2);
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        data[[(i + rows - sr) % rows, (j + cols - sc) % cols]]
    })
}

/// Inverse of [`fftshift`].
pub fn ifftshift<T: Copy>(data: &Array2<T>) -> Array2<T> {
    let (rows, cols) = data.dim();
    let (sr, sc) = (rows / 2, cols / 2);
    Array2::from_shape_fn((rows, cols), |(i, j)| data[[(i + sr) % rows, (j + sc) % cols]])
}
