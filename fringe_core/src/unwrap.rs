//! Two-dimensional phase unwrapping.
//!
//! Two strategies are provided:
//!
//! - [`unwrap_quality_guided`]: flood fill in decreasing quality order (the
//!   demodulated amplitude is a natural quality map). Honors an aperture
//!   mask, never crosses invalid pixels, and is exact wherever neighbouring
//!   valid pixels differ by less than π.
//! - [`unwrap_least_squares`]: unweighted least-squares solution through the
//!   FFT Laplacian, assuming periodic boundaries. Smooth, but not congruent
//!   with the wrapped input.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::{PI, TAU};
use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{FringeError, FringeResult};
use crate::image::{ensure_shape, Image, Mask};
use crate::spectral::fft::{fft2, ifft2, signed_bin};

/// Phase unwrapping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnwrapMethod {
    QualityGuided,
    LeastSquares,
}

impl Default for UnwrapMethod {
    fn default() -> Self {
        UnwrapMethod::QualityGuided
    }
}

impl FromStr for UnwrapMethod {
    type Err = FringeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quality_guided" | "quality" | "flood" => Ok(UnwrapMethod::QualityGuided),
            "least_squares" | "lsq" | "fourier" => Ok(UnwrapMethod::LeastSquares),
            other => Err(FringeError::unsupported_option("unwrap method", other)),
        }
    }
}

impl fmt::Display for UnwrapMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnwrapMethod::QualityGuided => f.write_str("quality_guided"),
            UnwrapMethod::LeastSquares => f.write_str("least_squares"),
        }
    }
}

/// Wrap an angle into `(-π, π]`.
pub fn wrap(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Unwrap `phase` with the chosen strategy; pixels outside `mask` are zero.
pub fn unwrap_phase(
    phase: &Image,
    quality: Option<&Image>,
    mask: Option<&Mask>,
    method: UnwrapMethod,
) -> FringeResult<Image> {
    match method {
        UnwrapMethod::QualityGuided => unwrap_quality_guided(phase, quality, mask),
        UnwrapMethod::LeastSquares => {
            if let Some(mask) = mask {
                ensure_shape(phase.dim(), mask.dim(), "unwrap mask")?;
            }
            let mut unwrapped = unwrap_least_squares(phase)?;
            if let Some(mask) = mask {
                crate::image::apply_mask(&mut unwrapped, mask);
            }
            Ok(unwrapped)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    quality: f64,
    index: usize,
    from: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Max-heap on quality; lower pixel index wins ties so the fill order is deterministic.
    fn cmp(&self, other: &Self) -> Ordering {
        self.quality
            .total_cmp(&other.quality)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Quality-guided flood-fill unwrapping.
///
/// Each connected region of valid pixels is seeded at its highest-quality
/// pixel, which keeps its wrapped value. Pixels are then added in decreasing
/// quality order, each unwrapped against the neighbour it was reached from.
/// Without a quality map all pixels are equal and the fill is breadth-first
/// by index. Invalid pixels are left at zero.
pub fn unwrap_quality_guided(
    phase: &Image,
    quality: Option<&Image>,
    mask: Option<&Mask>,
) -> FringeResult<Image> {
    let (rows, cols) = phase.dim();
    if let Some(quality) = quality {
        ensure_shape(phase.dim(), quality.dim(), "unwrap quality map")?;
    }
    if let Some(mask) = mask {
        ensure_shape(phase.dim(), mask.dim(), "unwrap mask")?;
    }

    let wrapped: Vec<f64> = phase
        .iter()
        .map(|&p| if p.is_finite() { p } else { 0.0 })
        .collect();
    let score: Vec<f64> = match quality {
        Some(q) => q
            .iter()
            .map(|&v| if v.is_finite() { v } else { f64::NEG_INFINITY })
            .collect(),
        None => vec![0.0; rows * cols],
    };
    let valid: Vec<bool> = match mask {
        Some(m) => m.iter().copied().collect(),
        None => vec![true; rows * cols],
    };

    let mut seeds: Vec<usize> = (0..rows * cols).filter(|&idx| valid[idx]).collect();
    seeds.sort_by(|&a, &b| score[b].total_cmp(&score[a]).then(a.cmp(&b)));

    let mut unwrapped = vec![0.0; rows * cols];
    let mut done = vec![false; rows * cols];
    let mut heap = BinaryHeap::new();

    let neighbours = |idx: usize| {
        let (i, j) = (idx / cols, idx % cols);
        let mut out = [None; 4];
        if i > 0 {
            out[0] = Some(idx - cols);
        }
        if i + 1 < rows {
            out[1] = Some(idx + cols);
        }
        if j > 0 {
            out[2] = Some(idx - 1);
        }
        if j + 1 < cols {
            out[3] = Some(idx + 1);
        }
        out
    };

    for seed in seeds {
        if done[seed] {
            continue;
        }
        unwrapped[seed] = wrapped[seed];
        done[seed] = true;
        for next in neighbours(seed).into_iter().flatten() {
            if valid[next] && !done[next] {
                heap.push(Candidate {
                    quality: score[next],
                    index: next,
                    from: seed,
                });
            }
        }

        while let Some(Candidate { index, from, .. }) = heap.pop() {
            if done[index] {
                continue;
            }
            unwrapped[index] = unwrapped[from] + wrap(wrapped[index] - wrapped[from]);
            done[index] = true;
            for next in neighbours(index).into_iter().flatten() {
                if valid[next] && !done[next] {
                    heap.push(Candidate {
                        quality: score[next],
                        index: next,
                        from: index,
                    });
                }
            }
        }
    }

    Ok(Array2::from_shape_vec((rows, cols), unwrapped)?)
}

/// Least-squares unwrapping through the FFT Laplacian.
///
/// Solves `∇²φ = Im(∇²ψ / ψ)` with `ψ = exp(iφ_wrapped)` under periodic
/// boundary conditions, then adds the constant that best aligns the result
/// with the wrapped input.
pub fn unwrap_least_squares(phase: &Image) -> FringeResult<Image> {
    let (rows, cols) = phase.dim();
    if rows == 0 || cols == 0 {
        return Ok(phase.clone());
    }

    let freq_sqr = Array2::from_shape_fn((rows, cols), |(i, j)| {
        let fi = signed_bin(i, rows) / rows as f64;
        let fj = signed_bin(j, cols) / cols as f64;
        fi * fi + fj * fj
    });
    let psi = phase.mapv(|p| {
        let p = if p.is_finite() { p } else { 0.0 };
        Complex64::new(0.0, p).exp()
    });

    let mut spectrum = fft2(psi.clone())?;
    spectrum.zip_mut_with(&freq_sqr, |v, &f| *v *= f);
    let laplacian = ifft2(spectrum)?;

    let source = ndarray::Zip::from(&laplacian)
        .and(&psi)
        .map_collect(|&lap, &e| Complex64::new((lap / e).im, 0.0));

    let mut spectrum = fft2(source)?;
    spectrum.zip_mut_with(&freq_sqr, |v, &f| {
        *v = if f > 0.0 { *v / f } else { Complex64::default() };
    });
    let mut unwrapped = ifft2(spectrum)?.mapv(|c| c.re);

    // Circular mean of the residual picks the constant offset.
    let (sin_sum, cos_sum) = unwrapped
        .iter()
        .zip(phase.iter())
        .fold((0.0, 0.0), |(s, c), (&u, &p)| {
            let d = if p.is_finite() { p - u } else { 0.0 };
            (s + d.sin(), c + d.cos())
        });
    let offset = if sin_sum == 0.0 && cos_sum == 0.0 {
        0.0
    } else {
        sin_sum.atan2(cos_sum)
    };
    unwrapped.mapv_inplace(|u| u + offset);
    Ok(unwrapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapped(image: &Image) -> Image {
        image.mapv(wrap)
    }

    fn max_deviation_up_to_constant(a: &Image, b: &Image) -> f64 {
        let offset = a[[0, 0]] - b[[0, 0]];
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y - offset).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn wrap_range() {
        assert!((wrap(2.5 * PI) - 0.5 * PI).abs() < 1e-12);
        assert!((wrap(-PI) - PI).abs() < 1e-12);
        assert!((wrap(0.5) - 0.5).abs() < 1e-12);
        assert!((wrap(-7.0) - (-7.0 + TAU)).abs() < 1e-12);
    }

    #[test]
    fn quality_guided_recovers_linear_ramp() {
        let truth = Array2::from_shape_fn((40, 30), |(i, j)| 0.3 * i as f64 + 0.2 * j as f64);
        let unwrapped = unwrap_quality_guided(&wrapped(&truth), None, None).unwrap();
        let dev = max_deviation_up_to_constant(&unwrapped, &truth);
        assert!(dev < 1e-9, "deviation {dev}");
        // Constant offset is a whole number of cycles.
        let k = (unwrapped[[0, 0]] - truth[[0, 0]]) / TAU;
        assert!((k - k.round()).abs() < 1e-9);
    }

    #[test]
    fn quality_guided_seeds_at_best_pixel() {
        let truth = Array2::from_shape_fn((20, 20), |(i, j)| 0.25 * (i + j) as f64 - 4.0);
        let mut quality = Array2::zeros((20, 20));
        quality[[10, 10]] = 1.0;
        let unwrapped = unwrap_quality_guided(&wrapped(&truth), Some(&quality), None).unwrap();
        assert!((unwrapped[[10, 10]] - wrap(truth[[10, 10]])).abs() < 1e-12);
    }

    #[test]
    fn quality_guided_respects_mask() {
        let truth = Array2::from_shape_fn((16, 16), |(i, j)| 0.4 * i as f64 + 0.1 * j as f64);
        let mask = Array2::from_shape_fn((16, 16), |(_, j)| j != 7 && j != 8);
        let unwrapped = unwrap_quality_guided(&wrapped(&truth), None, Some(&mask)).unwrap();

        for i in 0..16 {
            assert_eq!(unwrapped[[i, 7]], 0.0);
            assert_eq!(unwrapped[[i, 8]], 0.0);
        }
        // Each half is internally consistent.
        for (i, j) in [(15, 0), (15, 6), (0, 6)] {
            let d = (unwrapped[[i, j]] - unwrapped[[0, 0]]) - (truth[[i, j]] - truth[[0, 0]]);
            assert!(d.abs() < 1e-9);
        }
        for (i, j) in [(15, 9), (15, 15), (0, 15)] {
            let d = (unwrapped[[i, j]] - unwrapped[[0, 9]]) - (truth[[i, j]] - truth[[0, 9]]);
            assert!(d.abs() < 1e-9);
        }
    }

    #[test]
    fn quality_guided_rejects_mismatched_mask() {
        let phase = Array2::zeros((4, 4));
        let mask = Array2::from_elem((4, 5), true);
        assert!(unwrap_quality_guided(&phase, None, Some(&mask)).is_err());
    }

    #[test]
    fn least_squares_recovers_smooth_periodic_phase() {
        let (h, w) = (64, 48);
        let truth = Array2::from_shape_fn((h, w), |(i, j)| {
            6.0 * (TAU * i as f64 / h as f64).sin() + 4.0 * (TAU * j as f64 / w as f64).cos()
        });
        let unwrapped = unwrap_least_squares(&wrapped(&truth)).unwrap();
        let mean_diff = (&unwrapped - &truth).mean().unwrap_or(0.0);
        let dev = unwrapped
            .iter()
            .zip(truth.iter())
            .map(|(u, t)| (u - t - mean_diff).abs())
            .fold(0.0, f64::max);
        assert!(dev < 1e-3, "deviation {dev}");
    }

    #[test]
    fn least_squares_of_constant_is_congruent() {
        let phase = Array2::from_elem((8, 8), 1.25);
        let unwrapped = unwrap_least_squares(&phase).unwrap();
        assert!(unwrapped.iter().all(|&u| (u - 1.25).abs() < 1e-9));
    }

    #[test]
    fn unwrap_method_parses() {
        assert_eq!(
            "least_squares".parse::<UnwrapMethod>().unwrap(),
            UnwrapMethod::LeastSquares
        );
        assert!("goldstein".parse::<UnwrapMethod>().is_err());
    }
}
