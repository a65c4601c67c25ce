//! Power spectra of fringe images.

use ndarray::{Array2, Zip};
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::fft::{fft2_embedded, fftshift, signed_bin};
use crate::carrier::CarrierFreq;
use crate::error::{FringeError, FringeResult};
use crate::image::{ensure_non_empty, Image};

/// Squared magnitude of a 2D Fourier transform.
///
/// Stored in FFT order: the DC bin is at `[0, 0]`. A spectrum computed with
/// embedding factor `k` has `k` times the source shape along both axes and a
/// bin spacing of `1/k` cycles per source extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSpectrum {
    pub data: Array2<f64>,
    pub embed_factor: usize,
    pub source_shape: (usize, usize),
}

impl PowerSpectrum {
    /// Power of an already-computed complex spectrum.
    pub fn from_spectrum(
        spectrum: &Array2<Complex64>,
        embed_factor: usize,
        source_shape: (usize, usize),
    ) -> Self {
        Self {
            data: spectrum.mapv(|c| c.norm_sqr()),
            embed_factor: embed_factor.max(1),
            source_shape,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Carrier frequency (cycles per source extent) of a fractional bin position.
    pub fn frequency_of(&self, bin: (f64, f64)) -> CarrierFreq {
        let k = self.embed_factor as f64;
        CarrierFreq::new(bin.0 / k, bin.1 / k)
    }

    /// Signed frequency of an integer bin.
    pub fn frequency_at(&self, index: (usize, usize)) -> CarrierFreq {
        let (rows, cols) = self.shape();
        self.frequency_of((signed_bin(index.0, rows), signed_bin(index.1, cols)))
    }

    /// Bin position of a carrier frequency, not wrapped onto the grid.
    pub fn bin_of(&self, cfreq: &CarrierFreq) -> (f64, f64) {
        let k = self.embed_factor as f64;
        (cfreq.u * k, cfreq.v * k)
    }

    /// Copy with the DC bin moved to the centre, for storage and inspection.
    pub fn centered(&self) -> Array2<f64> {
        fftshift(&self.data)
    }

    pub fn total_power(&self) -> f64 {
        self.data.sum()
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Element-wise sum of spectra that share shape and embedding.
    pub fn accumulate(spectra: &[PowerSpectrum]) -> FringeResult<PowerSpectrum> {
        let first = spectra
            .first()
            .ok_or_else(|| FringeError::empty_input("power spectra to accumulate"))?;
        let mut total = first.clone();
        for other in &spectra[1..] {
            if other.shape() != total.shape() || other.embed_factor != total.embed_factor {
                return Err(FringeError::shape_mismatch(
                    total.shape(),
                    other.shape(),
                    "power spectrum accumulation",
                ));
            }
            Zip::from(&mut total.data)
                .and(&other.data)
                .for_each(|acc, &p| *acc += p);
        }
        Ok(total)
    }
}

/// Power spectrum of `image`, zero-padded by `embed_factor` (1 = no padding).
///
/// # Examples
///
/// ```
/// use fringe_analysis_core::spectral::power_spectrum;
/// use ndarray::Array2;
///
/// let image = Array2::from_shape_fn((32, 16), |(i, _)| (i as f64).sin());
/// let pow = power_spectrum(&image, 2).unwrap();
/// assert_eq!(pow.shape(), (64, 32));
/// assert!(pow.is_finite());
/// ```
pub fn power_spectrum(image: &Image, embed_factor: usize) -> FringeResult<PowerSpectrum> {
    ensure_non_empty(image, "image for power spectrum")?;
    if embed_factor == 0 {
        return Err(FringeError::invalid_parameter(
            "embed_factor",
            embed_factor,
            "embed_factor >= 1",
        ));
    }
    let spectrum = fft2_embedded(image, embed_factor)?;
    Ok(PowerSpectrum::from_spectrum(
        &spectrum,
        embed_factor,
        image.dim(),
    ))
}
