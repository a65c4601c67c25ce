//! # Fringe Analysis Core
//!
//! Fourier-domain analysis of two-dimensional fringe patterns
//! (interferograms). A fringe image carries a high-frequency carrier
//! modulated by a slowly varying phase; this crate finds the carrier and
//! demodulates one spectral sideband to recover phase and amplitude.
//!
//! ## Quick Start
//!
//! ```rust
//! use fringe_analysis_core::{
//!     filter_sideband, fringe_cal, sim_fringe, CalibrationOptions, SidebandOptions,
//! };
//! use ndarray::Array2;
//!
//! // Synthesise a fringe pattern with a known carrier
//! let fringes = sim_fringe(&Array2::zeros((96, 80)), (7.3, 4.6).into(), 0.1).unwrap();
//!
//! // Recover the carrier
//! let options = CalibrationOptions { store_pow: false, ..Default::default() };
//! let cfreq = fringe_cal(&[fringes.clone()], &options).unwrap().cfreqs[0];
//! assert!((cfreq.u - 7.3).abs() < 0.1 && (cfreq.v - 4.6).abs() < 0.1);
//!
//! // Demodulate
//! let out = filter_sideband(&fringes, cfreq, None, &SidebandOptions::default(), None).unwrap();
//! assert_eq!(out.phase.dim(), (96, 80));
//! ```
//!
//! ## Core Modules
//!
//! - [`calibrate`] - Carrier frequency calibration
//! - [`sideband`] - Sideband isolation and demodulation
//! - [`spectral`] - 2D FFT and power spectra
//! - [`window`] - Apodisation and sideband windows
//! - [`simulate`] - Synthetic fringe patterns
//! - [`unwrap`] - Phase unwrapping
//! - [`cache`] - Reusable window cache
//! - [`config`] - Analysis configuration via TOML
//! - [`store`] - Versioned power spectrum files
//! - [`logging`] - JSON line-delimited calibration log

pub mod cache;
pub mod calibrate;
pub mod carrier;
pub mod config;
pub mod error;
pub mod image;
pub mod logging;
pub mod sideband;
pub mod simulate;
pub mod spectral;
pub mod store;
pub mod unwrap;
pub mod window;

pub use cache::{WindowCache, WindowKey};
pub use calibrate::{
    find_peaks, fringe_cal, fringe_cal_aggregate, refine_peak, Calibration, CalibrationOptions,
    SpectralPeak,
};
pub use carrier::CarrierFreq;
pub use config::{ConfigError, FringeConfig};
pub use error::{FringeError, FringeResult};
pub use image::{aperture_mask, mk_rad_mask, Image, Mask};
pub use logging::{log_calibration, CalibrationLogEntry};
pub use sideband::{filter_sideband, Demodulated, SidebandMethod, SidebandOptions};
pub use simulate::{sim_fringe, sim_fringe_seeded, sim_fringe_with, SimOptions};
pub use spectral::{fft2, ifft2, power_spectrum, PowerSpectrum};
pub use store::{load_power, store_power, SpectrumRecord, StoreError};
pub use unwrap::{unwrap_phase, wrap, UnwrapMethod};
pub use window::{make_circular_window, make_window, WindowKind, WindowSize};
