//! Tapering windows for apodisation and sideband isolation.
//!
//! Every window here is a "tapered top": flat at 1.0 in its interior and
//! rolling off to the edge with one of the [`WindowKind`] profiles. The
//! width of the roll-off is a [`WindowSize`], either a fraction of the
//! half-extent or an absolute number of pixels (bins).

use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{FringeError, FringeResult};

/// Taper profile of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    /// Quarter cosine: cos(πx/2)
    Cosine,
    /// Hann: 0.5 + 0.5*cos(πx)
    Hann,
    /// Hamming: 0.54 + 0.46*cos(πx), does not reach zero at the edge
    Hamming,
    /// Lanczos: sinc(x)
    Lanczos,
}

impl WindowKind {
    /// Profile value at position `x` in the taper, `x = 0` inner edge, `x = 1` outer edge.
    ///
    /// Positions outside `[0, 1]` are clamped.
    pub fn taper(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        match self {
            WindowKind::Cosine => (FRAC_PI_2 * x).cos().max(0.0),
            WindowKind::Hann => 0.5 + 0.5 * (PI * x).cos(),
            WindowKind::Hamming => 0.54 + 0.46 * (PI * x).cos(),
            WindowKind::Lanczos => {
                if x == 0.0 {
                    1.0
                } else {
                    ((PI * x).sin() / (PI * x)).max(0.0)
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Cosine => "cosine",
            WindowKind::Hann => "hann",
            WindowKind::Hamming => "hamming",
            WindowKind::Lanczos => "lanczos",
        }
    }
}

impl Default for WindowKind {
    fn default() -> Self {
        WindowKind::Cosine
    }
}

impl FromStr for WindowKind {
    type Err = FringeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" | "cos" => Ok(WindowKind::Cosine),
            "hann" | "hanning" => Ok(WindowKind::Hann),
            "hamming" => Ok(WindowKind::Hamming),
            "lanczos" | "sinc" => Ok(WindowKind::Lanczos),
            other => Err(FringeError::unsupported_option("window function", other)),
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Width of the taper region of a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowSize {
    /// Fraction of the half-extent (or radius), clamped to [0, 1]
    Relative(f64),
    /// Taper width in pixels (or bins)
    Absolute(f64),
}

impl WindowSize {
    /// Decode the legacy signed convention: negative values are relative
    /// fractions, non-negative values are absolute sizes.
    ///
    /// ```
    /// use fringe_analysis_core::window::WindowSize;
    ///
    /// assert_eq!(WindowSize::from_signed(-0.5), WindowSize::Relative(0.5));
    /// assert_eq!(WindowSize::from_signed(12.0), WindowSize::Absolute(12.0));
    /// ```
    pub fn from_signed(value: f64) -> Self {
        if value < 0.0 {
            WindowSize::Relative(-value)
        } else {
            WindowSize::Absolute(value)
        }
    }

    /// Taper fraction of a half-extent of `half_extent` pixels.
    pub fn fraction_of(&self, half_extent: f64) -> f64 {
        let fraction = match *self {
            WindowSize::Relative(f) => f,
            WindowSize::Absolute(size) => {
                if half_extent > 0.0 {
                    size / half_extent
                } else {
                    1.0
                }
            }
        };
        if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    pub fn validate(&self, parameter: &str) -> FringeResult<()> {
        let value = match *self {
            WindowSize::Relative(v) | WindowSize::Absolute(v) => v,
        };
        if !value.is_finite() || value < 0.0 {
            return Err(FringeError::invalid_parameter(
                parameter,
                value,
                "a finite, non-negative window size",
            ));
        }
        Ok(())
    }

    /// Stable bit pattern used in cache keys.
    pub(crate) fn key_bits(&self) -> (u8, u64) {
        match *self {
            WindowSize::Relative(v) => (0, v.to_bits()),
            WindowSize::Absolute(v) => (1, v.to_bits()),
        }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        WindowSize::Relative(0.5)
    }
}

/// Value of a tapered-top window at normalised distance `r` from its centre.
///
/// `r = 1` is the outer edge. The window is flat for `r <= 1 - taper`.
fn tapered_top(kind: WindowKind, taper: f64, r: f64) -> f64 {
    if r >= 1.0 {
        return if taper == 0.0 { 1.0 } else { 0.0 };
    }
    let flat = 1.0 - taper;
    if r <= flat || taper <= 0.0 {
        1.0
    } else {
        kind.taper((r - flat) / taper)
    }
}

/// One-dimensional tapered-top window of length `n`.
pub fn window_1d(n: usize, kind: WindowKind, size: WindowSize) -> Vec<f64> {
    let half = n as f64 / 2.0;
    let centre = (n as f64 - 1.0) / 2.0;
    let taper = size.fraction_of(half);
    (0..n)
        .map(|i| {
            let r = if half > 0.0 {
                (i as f64 - centre).abs() / half
            } else {
                0.0
            };
            tapered_top(kind, taper, r)
        })
        .collect()
}

/// Rectangular apodisation window over an image of `shape`.
///
/// Separable product of two [`window_1d`] profiles. Values lie in `[0, 1]`,
/// the centre is 1.0 and the window is symmetric about the image centre.
///
/// # Examples
///
/// ```
/// use fringe_analysis_core::window::{make_window, WindowKind, WindowSize};
///
/// let w = make_window((64, 48), WindowKind::Cosine, WindowSize::Relative(0.5));
/// assert_eq!(w.dim(), (64, 48));
/// assert_eq!(w[[32, 24]], 1.0);
/// assert!(w[[0, 0]] < 0.1);
/// ```
pub fn make_window(shape: (usize, usize), kind: WindowKind, size: WindowSize) -> Array2<f64> {
    let rows = window_1d(shape.0, kind, size);
    let cols = window_1d(shape.1, kind, size);
    Array2::from_shape_fn(shape, |(i, j)| rows[i] * cols[j])
}

/// Signed distance from `centre` to `index` on a periodic axis of length `n`,
/// wrapped into `[-n/2, n/2)`.
pub(crate) fn periodic_offset(index: usize, centre: f64, n: usize) -> f64 {
    let n = n as f64;
    (index as f64 - centre + n / 2.0).rem_euclid(n) - n / 2.0
}

/// Circular tapered-top window on a periodic (frequency) grid.
///
/// `centre` is given in bins along (axis 0, axis 1) and may lie anywhere,
/// including outside the grid; distances wrap around so that aliased
/// centres remain valid. `radius` is in bins. The taper fraction of
/// `size` is taken relative to the radius.
pub fn make_circular_window(
    shape: (usize, usize),
    centre: (f64, f64),
    radius: f64,
    kind: WindowKind,
    size: WindowSize,
) -> Array2<f64> {
    let taper = size.fraction_of(radius);
    let radius = radius.max(f64::MIN_POSITIVE);
    Array2::from_shape_fn(shape, |(i, j)| {
        let di = periodic_offset(i, centre.0, shape.0);
        let dj = periodic_offset(j, centre.1, shape.1);
        let r = di.hypot(dj) / radius;
        if r >= 1.0 {
            0.0
        } else {
            tapered_top(kind, taper, r)
        }
    })
}
