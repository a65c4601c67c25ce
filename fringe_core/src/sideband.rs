//! Sideband isolation and demodulation.
//!
//! A real fringe pattern `a·cos(2πf·x + φ)` has two spectral sidebands at
//! `±f`. Keeping one of them and removing the carrier leaves the complex
//! baseband signal `(a/2)·exp(iφ)`, whose argument is the modulating phase
//! and whose magnitude is (half) the fringe amplitude.
//!
//! Two interchangeable strategies are offered:
//!
//! - [`SidebandMethod::Spectral`] windows the spectrum around the carrier,
//!   inverse-transforms, and removes the carrier in the spatial domain.
//! - [`SidebandMethod::Passband`] shifts the carrier to baseband first, then
//!   low-pass filters around DC.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::cache::{cached_window, WindowCache, WindowKey};
use crate::carrier::CarrierFreq;
use crate::error::{FringeError, FringeResult};
use crate::image::{
    apply_mask, ensure_non_empty, ensure_shape, masked_mean, scrub_non_finite, Image, Mask,
};
use crate::spectral::fft::{fft2, fft2_real, ifft2};
use crate::spectral::PowerSpectrum;
use crate::unwrap::{unwrap_phase, UnwrapMethod};
use crate::window::{make_circular_window, make_window, WindowKind, WindowSize};

/// Smallest sideband radius in cycles per extent.
///
/// Keeps at least the nearest bin inside the window for degenerate carriers
/// such as `(0, 0)` or very small `sbsize`.
pub const MIN_SIDEBAND_RADIUS: f64 = 1.5;

/// Demodulation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidebandMethod {
    /// Window the spectrum at the carrier, then demodulate in the spatial domain
    Spectral,
    /// Demodulate to baseband first, then low-pass around DC
    Passband,
}

impl SidebandMethod {
    pub const ALL: [SidebandMethod; 2] = [SidebandMethod::Spectral, SidebandMethod::Passband];

    pub fn as_str(&self) -> &'static str {
        match self {
            SidebandMethod::Spectral => "spectral",
            SidebandMethod::Passband => "passband",
        }
    }
}

impl Default for SidebandMethod {
    fn default() -> Self {
        SidebandMethod::Spectral
    }
}

impl FromStr for SidebandMethod {
    type Err = FringeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spectral" => Ok(SidebandMethod::Spectral),
            "passband" => Ok(SidebandMethod::Passband),
            other => Err(FringeError::unsupported_option("sideband method", other)),
        }
    }
}

impl fmt::Display for SidebandMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for [`filter_sideband`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SidebandOptions {
    /// Sideband radius as a fraction of the carrier's radial frequency
    pub sbsize: f64,
    pub method: SidebandMethod,
    /// Unwrap the recovered phase
    pub unwrap: bool,
    pub unwrap_method: UnwrapMethod,
    /// Taper width of the apodisation and sideband windows
    pub wsize: WindowSize,
    pub wfunc: WindowKind,
    /// Also return the power spectrum that was windowed
    pub ret_pow: bool,
    /// Also return the complex baseband signal
    pub get_complex: bool,
    /// Diagnostic verbosity; 0 is silent
    pub verbosity: u8,
}

impl Default for SidebandOptions {
    fn default() -> Self {
        Self {
            sbsize: 0.5,
            method: SidebandMethod::Spectral,
            unwrap: true,
            unwrap_method: UnwrapMethod::QualityGuided,
            wsize: WindowSize::Relative(0.5),
            wfunc: WindowKind::Cosine,
            ret_pow: false,
            get_complex: false,
            verbosity: 0,
        }
    }
}

impl SidebandOptions {
    pub fn with_method(mut self, method: SidebandMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_sbsize(mut self, sbsize: f64) -> Self {
        self.sbsize = sbsize;
        self
    }

    pub fn validate(&self) -> FringeResult<()> {
        if !self.sbsize.is_finite() || self.sbsize <= 0.0 {
            return Err(FringeError::invalid_parameter(
                "sbsize",
                self.sbsize,
                "sbsize > 0",
            ));
        }
        self.wsize.validate("wsize")
    }
}

/// Output of [`filter_sideband`].
#[derive(Debug, Clone, PartialEq)]
pub struct Demodulated {
    /// Recovered phase in radians, unwrapped when requested
    pub phase: Image,
    /// Magnitude of the baseband signal
    pub amp: Image,
    /// Power spectrum before sideband windowing, when requested
    pub ftpow: Option<PowerSpectrum>,
    /// Complex baseband signal, when requested
    pub complex: Option<Array2<Complex64>>,
}

/// Sideband radius in cycles per extent.
pub fn sideband_radius(cfreq: &CarrierFreq, sbsize: f64) -> f64 {
    let radius = sbsize * cfreq.norm();
    if radius.is_finite() {
        radius.max(MIN_SIDEBAND_RADIUS)
    } else {
        MIN_SIDEBAND_RADIUS
    }
}

/// Isolate the sideband at `cfreq` and recover phase and amplitude.
///
/// Pixels outside `apt_mask` are excluded: they are zeroed before the
/// transform, skipped by the unwrapper, and zero in both outputs. `phase`
/// and `amp` always have the shape of `img` and are always finite.
///
/// Passing the same `cache` to repeated calls with identical geometry reuses
/// the windows; results are identical with or without it.
///
/// # Errors
///
/// Validation errors for an empty image, a mask of another shape, a
/// non-finite carrier, `sbsize <= 0` or a negative window size.
///
/// # Examples
///
/// ```
/// use fringe_analysis_core::sideband::{filter_sideband, SidebandOptions};
/// use fringe_analysis_core::simulate::sim_fringe;
/// use ndarray::Array2;
///
/// let cf = (6.0, 4.0).into();
/// let fringes = sim_fringe(&Array2::zeros((64, 64)), cf, 0.0).unwrap();
/// let out = filter_sideband(&fringes, cf, None, &SidebandOptions::default(), None).unwrap();
/// assert_eq!(out.phase.dim(), (64, 64));
/// assert!(out.phase.iter().all(|p| p.is_finite()));
/// ```
pub fn filter_sideband(
    img: &Image,
    cfreq: CarrierFreq,
    apt_mask: Option<&Mask>,
    options: &SidebandOptions,
    mut cache: Option<&mut WindowCache>,
) -> FringeResult<Demodulated> {
    ensure_non_empty(img, "image for sideband filtering")?;
    if let Some(mask) = apt_mask {
        ensure_shape(img.dim(), mask.dim(), "aperture mask")?;
    }
    cfreq.ensure_finite("cfreq")?;
    options.validate()?;

    let shape = img.dim();
    let radius = sideband_radius(&cfreq, options.sbsize);

    let mut prepared = img.clone();
    scrub_non_finite(&mut prepared);
    let mean = masked_mean(&prepared, apt_mask);
    prepared.mapv_inplace(|v| v - mean);
    if let Some(mask) = apt_mask {
        apply_mask(&mut prepared, mask);
    }

    let apodization = cached_window(
        cache.as_deref_mut(),
        WindowKey::apodization(shape, options.wsize, options.wfunc),
        || make_window(shape, options.wfunc, options.wsize),
    );
    prepared *= &*apodization;

    let sideband_key = WindowKey::sideband(
        shape,
        cfreq,
        options.sbsize,
        options.wsize,
        options.wfunc,
        options.method,
    );
    let (baseband, ftpow) = match options.method {
        SidebandMethod::Spectral => {
            let window = cached_window(cache.as_deref_mut(), sideband_key, || {
                make_circular_window(
                    shape,
                    (cfreq.u, cfreq.v),
                    radius,
                    options.wfunc,
                    options.wsize,
                )
            });
            spectral_sideband(&prepared, &cfreq, &window, options.ret_pow)?
        }
        SidebandMethod::Passband => {
            let window = cached_window(cache.as_deref_mut(), sideband_key, || {
                make_circular_window(shape, (0.0, 0.0), radius, options.wfunc, options.wsize)
            });
            passband_sideband(&prepared, &cfreq, &window, options.ret_pow)?
        }
    };

    let mut phase = baseband.mapv(|z| z.arg());
    let mut amp = baseband.mapv(|z| z.norm());
    let scrubbed = scrub_non_finite(&mut phase) + scrub_non_finite(&mut amp);

    if options.unwrap {
        phase = unwrap_phase(&phase, Some(&amp), apt_mask, options.unwrap_method)?;
        scrub_non_finite(&mut phase);
    }
    if let Some(mask) = apt_mask {
        apply_mask(&mut phase, mask);
        apply_mask(&mut amp, mask);
    }

    if options.verbosity > 0 {
        tracing::debug!(
            method = %options.method,
            cfreq = %cfreq,
            radius,
            shape = ?shape,
            max_amp = amp.iter().cloned().fold(0.0, f64::max),
            scrubbed,
            "sideband filtered"
        );
    }
    if scrubbed > 0 {
        tracing::warn!(scrubbed, "non-finite demodulation samples replaced by zero");
    }

    Ok(Demodulated {
        phase,
        amp,
        ftpow,
        complex: options.get_complex.then_some(baseband),
    })
}

/// Window the spectrum at the carrier, inverse transform, remove the carrier.
fn spectral_sideband(
    image: &Image,
    cfreq: &CarrierFreq,
    window: &Array2<f64>,
    ret_pow: bool,
) -> FringeResult<(Array2<Complex64>, Option<PowerSpectrum>)> {
    let shape = image.dim();
    let mut spectrum = fft2_real(image)?;
    let ftpow = ret_pow.then(|| PowerSpectrum::from_spectrum(&spectrum, 1, shape));

    spectrum.zip_mut_with(window, |c, &w| *c *= w);
    let mut baseband = ifft2(spectrum)?;
    baseband
        .indexed_iter_mut()
        .for_each(|((i, j), z)| *z *= Complex64::cis(-cfreq.phase_at(i, j, shape)));
    Ok((baseband, ftpow))
}

/// Shift the carrier to DC, then low-pass with a window centred on DC.
fn passband_sideband(
    image: &Image,
    cfreq: &CarrierFreq,
    window: &Array2<f64>,
    ret_pow: bool,
) -> FringeResult<(Array2<Complex64>, Option<PowerSpectrum>)> {
    let shape = image.dim();
    let shifted = Array2::from_shape_fn(shape, |(i, j)| {
        Complex64::cis(-cfreq.phase_at(i, j, shape)) * image[[i, j]]
    });
    let mut spectrum = fft2(shifted)?;
    let ftpow = ret_pow.then(|| PowerSpectrum::from_spectrum(&spectrum, 1, shape));

    spectrum.zip_mut_with(window, |c, &w| *c *= w);
    Ok((ifft2(spectrum)?, ftpow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::aperture_mask;
    use crate::simulate::sim_fringe;
    use crate::unwrap::wrap;

    fn fringes(shape: (usize, usize), cf: CarrierFreq) -> Image {
        sim_fringe(&Array2::zeros(shape), cf, 0.0).unwrap()
    }

    #[test]
    fn method_parses_and_rejects_unknown() {
        assert_eq!("Passband".parse::<SidebandMethod>().unwrap(), SidebandMethod::Passband);
        let err = "hilbert".parse::<SidebandMethod>().unwrap_err();
        assert!(matches!(err, FringeError::UnsupportedOption { .. }));
    }

    #[test]
    fn radius_has_floor() {
        assert_eq!(sideband_radius(&CarrierFreq::new(0.0, 0.0), 0.5), MIN_SIDEBAND_RADIUS);
        assert!((sideband_radius(&CarrierFreq::new(30.0, 40.0), 0.5) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn integer_carrier_gives_flat_phase_and_half_amplitude() {
        let shape = (128, 96);
        let cf = CarrierFreq::new(16.0, 12.0);
        let img = fringes(shape, cf);
        for method in SidebandMethod::ALL {
            let opts = SidebandOptions::default()
                .with_method(method)
                .with_sbsize(0.9);
            let out = filter_sideband(&img, cf, None, &opts, None).unwrap();
            // Centre quarter is well inside the flat part of the apodisation.
            for i in 48..80 {
                for j in 36..60 {
                    assert!(out.phase[[i, j]].abs() < 1e-2, "{method} phase at {i},{j}");
                    assert!((out.amp[[i, j]] - 0.5).abs() < 2e-2, "{method} amp at {i},{j}");
                }
            }
        }
    }

    #[test]
    fn recovers_phase_piston() {
        let shape = (64, 64);
        let cf = CarrierFreq::new(10.0, 3.0);
        let img = sim_fringe(&Array2::from_elem(shape, 1.0), cf, 0.0).unwrap();
        let opts = SidebandOptions {
            unwrap: false,
            ..SidebandOptions::default()
        };
        let out = filter_sideband(&img, cf, None, &opts, None).unwrap();
        assert!(wrap(out.phase[[32, 32]] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn mask_zeroes_outside_pixels() {
        let shape = (48, 48);
        let cf = CarrierFreq::new(9.0, 5.0);
        let mask = aperture_mask(48, 48, 0.5);
        let out = filter_sideband(
            &fringes(shape, cf),
            cf,
            Some(&mask),
            &SidebandOptions::default(),
            None,
        )
        .unwrap();
        for ((idx, &valid), (&p, &a)) in mask
            .indexed_iter()
            .zip(out.phase.iter().zip(out.amp.iter()))
        {
            if !valid {
                assert_eq!((p, a), (0.0, 0.0), "pixel {idx:?}");
            }
        }
    }

    #[test]
    fn validation_happens_before_work() {
        let img = fringes((16, 16), CarrierFreq::new(3.0, 2.0));
        let cf = CarrierFreq::new(3.0, 2.0);
        let bad_mask = Array2::from_elem((16, 15), true);
        assert!(matches!(
            filter_sideband(&img, cf, Some(&bad_mask), &SidebandOptions::default(), None),
            Err(FringeError::ShapeMismatch { .. })
        ));
        let zero = SidebandOptions::default().with_sbsize(0.0);
        assert!(filter_sideband(&img, cf, None, &zero, None).is_err());
        let nan = CarrierFreq::new(f64::NAN, 0.0);
        assert!(filter_sideband(&img, nan, None, &SidebandOptions::default(), None).is_err());
    }

    #[test]
    fn ret_pow_and_complex_are_optional() {
        let img = fringes((16, 16), CarrierFreq::new(3.0, 2.0));
        let cf = CarrierFreq::new(3.0, 2.0);
        let plain = filter_sideband(&img, cf, None, &SidebandOptions::default(), None).unwrap();
        assert!(plain.ftpow.is_none() && plain.complex.is_none());

        let opts = SidebandOptions {
            ret_pow: true,
            get_complex: true,
            ..SidebandOptions::default()
        };
        let full = filter_sideband(&img, cf, None, &opts, None).unwrap();
        assert_eq!(full.ftpow.as_ref().map(|p| p.shape()), Some((16, 16)));
        assert_eq!(full.complex.as_ref().map(|c| c.dim()), Some((16, 16)));
    }
}
