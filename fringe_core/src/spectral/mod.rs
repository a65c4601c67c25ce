//! Spectral analysis of fringe images.
//!
//! Provides the 2D FFT used by calibration and demodulation, and power
//! spectra with optional zero-padding ("embedding") for finer frequency
//! resolution. All spectra keep the DC bin at `[0, 0]`.

pub mod fft;
pub mod power;

pub use fft::{fft2, fft2_embedded, fft2_real, fftshift, ifft2, ifftshift, signed_bin};
pub use power::{power_spectrum, PowerSpectrum};
