//! Carrier frequency pair in cycles per image extent.

use std::f64::consts::TAU;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FringeError, FringeResult};

/// Carrier frequency of a fringe pattern.
///
/// `u` counts cycles along axis 0 (rows, the image height) and `v` along
/// axis 1 (columns, the image width). Values need not be integers and are not
/// limited to the Nyquist range. The conjugate sideband sits at `(-u, -v)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CarrierFreq {
    pub u: f64,
    pub v: f64,
}

impl CarrierFreq {
    pub const fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }

    /// Radial frequency `sqrt(u² + v²)`.
    pub fn norm(&self) -> f64 {
        self.u.hypot(self.v)
    }

    pub fn conjugate(&self) -> Self {
        Self::new(-self.u, -self.v)
    }

    pub fn sum(&self) -> f64 {
        self.u + self.v
    }

    pub fn is_finite(&self) -> bool {
        self.u.is_finite() && self.v.is_finite()
    }

    /// Per-mille deviation `1000 · (1 - reference / self)` for each component.
    ///
    /// Components where `self` is zero report 0.0 rather than dividing by it.
    pub fn permille_ratio(&self, reference: &CarrierFreq) -> [f64; 2] {
        let ratio = |rec: f64, truth: f64| {
            if rec == 0.0 {
                0.0
            } else {
                (1.0 - truth / rec) * 1e3
            }
        };
        [ratio(self.u, reference.u), ratio(self.v, reference.v)]
    }

    /// Carrier phase `2π(u·row/h + v·col/w)` at a pixel of an image of `shape`.
    pub fn phase_at(&self, row: usize, col: usize, shape: (usize, usize)) -> f64 {
        let (h, w) = shape;
        TAU * (self.u * row as f64 / h as f64 + self.v * col as f64 / w as f64)
    }

    pub(crate) fn ensure_finite(&self, context: &str) -> FringeResult<()> {
        if !self.is_finite() {
            return Err(FringeError::invalid_parameter(
                context,
                self,
                "finite carrier components",
            ));
        }
        Ok(())
    }
}

impl From<(f64, f64)> for CarrierFreq {
    fn from((u, v): (f64, f64)) -> Self {
        Self::new(u, v)
    }
}

impl From<[f64; 2]> for CarrierFreq {
    fn from([u, v]: [f64; 2]) -> Self {
        Self::new(u, v)
    }
}

impl fmt::Display for CarrierFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.u, self.v)
    }
}
