//! Carrier frequency calibration.
//!
//! The carrier of a fringe pattern shows up as a pair of conjugate peaks in
//! its power spectrum. Calibration apodises each image, takes an (optionally
//! zero-padded) power spectrum, ranks the local maxima of one half plane and
//! refines the selected one to sub-bin precision.

use std::path::PathBuf;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::carrier::CarrierFreq;
use crate::error::{FringeError, FringeResult};
use crate::image::{ensure_non_empty, ensure_shape, scrub_non_finite, Image};
use crate::logging::{log_calibration, CalibrationLogEntry};
use crate::spectral::fft::signed_bin;
use crate::spectral::{power_spectrum, PowerSpectrum};
use crate::store::store_power;
use crate::window::{make_window, periodic_offset, WindowKind, WindowSize};

/// Parameters for [`fringe_cal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOptions {
    /// Apodisation taper width
    pub wsize: WindowSize,
    pub wfunc: WindowKind,
    /// Rank of the peak to select, 0 = strongest
    pub cpeak: usize,
    /// Zero-pad before the FFT for finer frequency bins
    pub do_embed: bool,
    /// Padding factor used when `do_embed` is set
    pub embed_factor: usize,
    /// Persist each power spectrum and a calibration log line to `outdir`
    pub store_pow: bool,
    /// Return the power spectra in [`Calibration::power`]
    pub ret_pow: bool,
    pub outdir: PathBuf,
    /// Peaks closer than this to DC (cycles per extent) are ignored
    pub dc_radius: f64,
    /// Minimum distance between ranked peaks (cycles per extent)
    pub peak_separation: f64,
    pub verbosity: u8,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            wsize: WindowSize::Relative(0.5),
            wfunc: WindowKind::Cosine,
            cpeak: 0,
            do_embed: true,
            embed_factor: 4,
            store_pow: true,
            ret_pow: false,
            outdir: PathBuf::from("./"),
            dc_radius: 1.5,
            peak_separation: 3.0,
            verbosity: 0,
        }
    }
}

impl CalibrationOptions {
    /// Effective zero-padding factor.
    pub fn embedding(&self) -> usize {
        if self.do_embed {
            self.embed_factor
        } else {
            1
        }
    }

    pub fn validate(&self) -> FringeResult<()> {
        self.wsize.validate("wsize")?;
        if self.do_embed && self.embed_factor == 0 {
            return Err(FringeError::invalid_parameter(
                "embed_factor",
                self.embed_factor,
                "embed_factor >= 1",
            ));
        }
        if !self.dc_radius.is_finite() || self.dc_radius < 0.0 {
            return Err(FringeError::invalid_parameter(
                "dc_radius",
                self.dc_radius,
                "a finite, non-negative radius",
            ));
        }
        if !self.peak_separation.is_finite() || self.peak_separation < 0.0 {
            return Err(FringeError::invalid_parameter(
                "peak_separation",
                self.peak_separation,
                "a finite, non-negative distance",
            ));
        }
        Ok(())
    }
}

/// Output of [`fringe_cal`].
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    /// One carrier per input image, in input order
    pub cfreqs: Vec<CarrierFreq>,
    /// Power spectra, when `ret_pow` was set
    pub power: Option<Vec<PowerSpectrum>>,
    /// Files written when `store_pow` was set
    pub stored: Vec<PathBuf>,
}

/// A local maximum of a power spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPeak {
    /// Integer bin in FFT order
    pub bin: (usize, usize),
    pub power: f64,
    /// Unrefined frequency of `bin`
    pub frequency: CarrierFreq,
}

/// Determine the carrier frequency of every image.
///
/// Images are processed in parallel and must share one shape. The returned
/// carriers lie in the half plane `u > 0 || (u == 0 && v > 0)`.
///
/// # Errors
///
/// Validation errors for an empty list, an empty image, differing shapes,
/// invalid options, or a `cpeak` rank beyond the peaks found. Persistence
/// errors when `store_pow` is set and writing fails.
pub fn fringe_cal(images: &[Image], options: &CalibrationOptions) -> FringeResult<Calibration> {
    let shape = validate_images(images)?;
    options.validate()?;

    let window = make_window(shape, options.wfunc, options.wsize);
    let embed = options.embedding();

    let results = images
        .par_iter()
        .enumerate()
        .map(|(index, image)| -> FringeResult<(CarrierFreq, f64, PowerSpectrum)> {
            let pow = apodized_power(image, &window, embed)?;
            let (cfreq, peak_power) = select_carrier(&pow, options)?;
            if options.verbosity > 0 {
                tracing::debug!(index, cfreq = %cfreq, peak_power, embed, "carrier calibrated");
            }
            Ok((cfreq, peak_power, pow))
        })
        .collect::<FringeResult<Vec<_>>>()?;

    let mut stored = Vec::new();
    if options.store_pow {
        for (index, (cfreq, peak_power, pow)) in results.iter().enumerate() {
            stored.push(persist(options, &format!("fringe_cal_pow_{index:03}"), pow)?);
            let entry = CalibrationLogEntry::new(index, cfreq, *peak_power, pow);
            log_calibration(&options.outdir, &entry).map_err(|err| {
                FringeError::persistence(options.outdir.display().to_string(), err)
            })?;
        }
    }

    let cfreqs = results.iter().map(|(cfreq, _, _)| *cfreq).collect();
    let power = options
        .ret_pow
        .then(|| results.into_iter().map(|(_, _, pow)| pow).collect());

    Ok(Calibration {
        cfreqs,
        power,
        stored,
    })
}

/// Determine one carrier shared by all images from their summed spectra.
///
/// Useful for stacks of short, noisy exposures of the same fringe pattern.
pub fn fringe_cal_aggregate(
    images: &[Image],
    options: &CalibrationOptions,
) -> FringeResult<CarrierFreq> {
    let shape = validate_images(images)?;
    options.validate()?;

    let window = make_window(shape, options.wfunc, options.wsize);
    let embed = options.embedding();
    let spectra = images
        .par_iter()
        .map(|image| apodized_power(image, &window, embed))
        .collect::<FringeResult<Vec<_>>>()?;
    let total = PowerSpectrum::accumulate(&spectra)?;

    let (cfreq, peak_power) = select_carrier(&total, options)?;
    if options.verbosity > 0 {
        tracing::debug!(images = images.len(), cfreq = %cfreq, peak_power, "aggregate carrier calibrated");
    }
    if options.store_pow {
        persist(options, "fringe_cal_pow_sum", &total)?;
    }
    Ok(cfreq)
}

/// Ranked local maxima of `pow` in the positive half plane.
///
/// Bins within `dc_radius` cycles of DC are skipped. A peak is kept only if
/// it lies at least `peak_separation` cycles from every stronger kept peak.
/// At most `limit` peaks are returned.
pub fn find_peaks(
    pow: &PowerSpectrum,
    dc_radius: f64,
    peak_separation: f64,
    limit: usize,
) -> Vec<SpectralPeak> {
    let (rows, cols) = pow.shape();
    let data = &pow.data;
    let k = pow.embed_factor as f64;

    let mut candidates: Vec<SpectralPeak> = data
        .indexed_iter()
        .filter(|&((i, j), &p)| {
            if p <= 0.0 {
                return false;
            }
            let (su, sv) = (signed_bin(i, rows), signed_bin(j, cols));
            let upper = su > 0.0 || (su == 0.0 && sv > 0.0);
            upper && (su / k).hypot(sv / k) > dc_radius && is_local_max(data, i, j, p)
        })
        .map(|(bin, &power)| SpectralPeak {
            bin,
            power,
            frequency: pow.frequency_at(bin),
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.power
            .total_cmp(&a.power)
            .then_with(|| a.bin.cmp(&b.bin))
    });

    let mut kept: Vec<SpectralPeak> = Vec::new();
    for candidate in candidates {
        if kept.len() >= limit {
            break;
        }
        let isolated = kept.iter().all(|peak| {
            periodic_distance(pow, candidate.bin, peak.bin) / k >= peak_separation
        });
        if isolated {
            kept.push(candidate);
        }
    }
    kept
}

/// Sub-bin position of the peak at `bin`, as a carrier frequency.
///
/// Fits a parabola to the log-power of the bin and its two neighbours along
/// each axis, which is exact for a Gaussian peak. The offset is clamped to
/// half a bin.
pub fn refine_peak(pow: &PowerSpectrum, bin: (usize, usize)) -> CarrierFreq {
    let (rows, cols) = pow.shape();
    let (i, j) = bin;
    let data = &pow.data;

    let along_rows = log_parabolic_offset(
        data[[(i + rows - 1) % rows, j]],
        data[[i, j]],
        data[[(i + 1) % rows, j]],
    );
    let along_cols = log_parabolic_offset(
        data[[i, (j + cols - 1) % cols]],
        data[[i, j]],
        data[[i, (j + 1) % cols]],
    );

    pow.frequency_of((
        signed_bin(i, rows) + along_rows,
        signed_bin(j, cols) + along_cols,
    ))
}

fn log_parabolic_offset(before: f64, centre: f64, after: f64) -> f64 {
    let ln = |p: f64| p.max(f64::MIN_POSITIVE).ln();
    let (l, c, r) = (ln(before), ln(centre), ln(after));
    let denom = l - 2.0 * c + r;
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    let offset = 0.5 * (l - r) / denom;
    if offset.is_finite() {
        offset.clamp(-0.5, 0.5)
    } else {
        0.0
    }
}

fn is_local_max(data: &Array2<f64>, i: usize, j: usize, p: f64) -> bool {
    let (rows, cols) = data.dim();
    for di in [rows - 1, 0, 1] {
        for dj in [cols - 1, 0, 1] {
            if di == 0 && dj == 0 {
                continue;
            }
            let (ni, nj) = ((i + di) % rows, (j + dj) % cols);
            if (ni, nj) != (i, j) && data[[ni, nj]] > p {
                return false;
            }
        }
    }
    true
}

fn periodic_distance(pow: &PowerSpectrum, a: (usize, usize), b: (usize, usize)) -> f64 {
    let (rows, cols) = pow.shape();
    let di = periodic_offset(a.0, b.0 as f64, rows);
    let dj = periodic_offset(a.1, b.1 as f64, cols);
    di.hypot(dj)
}

/// Pick the `cpeak`-th ranked peak and refine it. Returns the carrier and
/// the power of its bin.
fn select_carrier(pow: &PowerSpectrum, options: &CalibrationOptions) -> FringeResult<(CarrierFreq, f64)> {
    let peaks = find_peaks(
        pow,
        options.dc_radius,
        options.peak_separation,
        options.cpeak.saturating_add(1),
    );
    if peaks.is_empty() {
        tracing::warn!(
            shape = ?pow.source_shape,
            "no spectral peak outside the DC region; carrier set to (0, 0)"
        );
        return Ok((CarrierFreq::default(), 0.0));
    }
    let peak = peaks.get(options.cpeak).ok_or_else(|| {
        FringeError::invalid_parameter(
            "cpeak",
            options.cpeak,
            format!("cpeak < {} (number of peaks found)", peaks.len()),
        )
    })?;

    let cfreq = refine_peak(pow, peak.bin);
    if cfreq.is_finite() {
        Ok((cfreq, peak.power))
    } else {
        Ok((peak.frequency, peak.power))
    }
}

/// Mean-subtracted, apodised power spectrum of one image.
fn apodized_power(image: &Image, window: &Array2<f64>, embed: usize) -> FringeResult<PowerSpectrum> {
    let mut prepared = image.clone();
    let scrubbed = scrub_non_finite(&mut prepared);
    if scrubbed > 0 {
        tracing::warn!(scrubbed, "non-finite pixels replaced by zero before calibration");
    }
    let mean = prepared.mean().unwrap_or(0.0);
    prepared.zip_mut_with(window, |v, &w| *v = (*v - mean) * w);
    power_spectrum(&prepared, embed)
}

fn validate_images(images: &[Image]) -> FringeResult<(usize, usize)> {
    let first = images
        .first()
        .ok_or_else(|| FringeError::empty_input("images for calibration"))?;
    ensure_non_empty(first, "image for calibration")?;
    let shape = first.dim();
    for image in &images[1..] {
        ensure_shape(shape, image.dim(), "calibration image")?;
    }
    Ok(shape)
}

fn persist(options: &CalibrationOptions, name: &str, pow: &PowerSpectrum) -> FringeResult<PathBuf> {
    store_power(&options.outdir, name, pow).map_err(|err| {
        FringeError::persistence(options.outdir.join(name).display().to_string(), err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::sim_fringe;

    fn no_store() -> CalibrationOptions {
        CalibrationOptions {
            store_pow: false,
            ..CalibrationOptions::default()
        }
    }

    fn fringes(shape: (usize, usize), cf: CarrierFreq) -> Image {
        sim_fringe(&Array2::zeros(shape), cf, 0.0).unwrap()
    }

    #[test]
    fn finds_integer_carrier_exactly_without_embedding() {
        let cf = CarrierFreq::new(6.0, 5.0);
        let opts = CalibrationOptions {
            do_embed: false,
            ..no_store()
        };
        let cal = fringe_cal(&[fringes((64, 48), cf)], &opts).unwrap();
        let found = cal.cfreqs[0];
        assert!((found.u - 6.0).abs() < 0.05 && (found.v - 5.0).abs() < 0.05, "{found}");
    }

    #[test]
    fn embedding_refines_fractional_carrier() {
        let cf = CarrierFreq::new(7.3, 4.6);
        let cal = fringe_cal(&[fringes((96, 80), cf)], &no_store()).unwrap();
        let found = cal.cfreqs[0];
        assert!((found.u - cf.u).abs() < 0.05, "{found}");
        assert!((found.v - cf.v).abs() < 0.05, "{found}");
    }

    #[test]
    fn negative_carrier_reported_in_upper_half_plane() {
        let cf = CarrierFreq::new(-5.0, 3.0);
        let cal = fringe_cal(&[fringes((64, 64), cf)], &no_store()).unwrap();
        let found = cal.cfreqs[0];
        assert!((found.u - 5.0).abs() < 0.05 && (found.v + 3.0).abs() < 0.05, "{found}");
    }

    #[test]
    fn second_peak_is_the_weaker_carrier() {
        let shape = (64, 64);
        let strong = fringes(shape, CarrierFreq::new(10.0, 2.0));
        let weak = fringes(shape, CarrierFreq::new(3.0, 12.0));
        let image = &strong + &weak.mapv(|v| 0.4 * v);
        let opts = CalibrationOptions {
            cpeak: 1,
            ..no_store()
        };
        let found = fringe_cal(&[image], &opts).unwrap().cfreqs[0];
        assert!((found.u - 3.0).abs() < 0.1 && (found.v - 12.0).abs() < 0.1, "{found}");
    }

    #[test]
    fn cpeak_beyond_peaks_is_rejected() {
        let opts = CalibrationOptions {
            cpeak: 10_000,
            ..no_store()
        };
        let err = fringe_cal(&[fringes((16, 16), CarrierFreq::new(4.0, 3.0))], &opts).unwrap_err();
        assert!(matches!(err, FringeError::InvalidParameter { ref parameter, .. } if parameter == "cpeak"));
    }

    #[test]
    fn single_pixel_image_falls_back_to_zero() {
        let cal = fringe_cal(&[Array2::from_elem((1, 1), 3.0)], &no_store()).unwrap();
        assert_eq!(cal.cfreqs, vec![CarrierFreq::default()]);
    }

    #[test]
    fn validation_errors() {
        assert!(matches!(
            fringe_cal(&[], &no_store()),
            Err(FringeError::EmptyInput { .. })
        ));
        let mixed = [Array2::zeros((8, 8)), Array2::zeros((8, 9))];
        assert!(matches!(
            fringe_cal(&mixed, &no_store()),
            Err(FringeError::ShapeMismatch { .. })
        ));
        let bad = CalibrationOptions {
            embed_factor: 0,
            ..no_store()
        };
        assert!(fringe_cal(&[Array2::zeros((8, 8))], &bad).is_err());
    }

    #[test]
    fn ret_pow_returns_embedded_spectra() {
        let opts = CalibrationOptions {
            ret_pow: true,
            embed_factor: 2,
            ..no_store()
        };
        let images = vec![fringes((16, 12), CarrierFreq::new(3.0, 2.0)); 3];
        let cal = fringe_cal(&images, &opts).unwrap();
        let power = cal.power.unwrap();
        assert_eq!(power.len(), 3);
        assert!(power.iter().all(|p| p.shape() == (32, 24) && p.is_finite()));
        assert!(cal.stored.is_empty());
    }

    #[test]
    fn find_peaks_respects_separation_and_limit() {
        let pow = power_spectrum(&fringes((32, 32), CarrierFreq::new(5.0, 5.0)), 1).unwrap();
        let peaks = find_peaks(&pow, 1.5, 3.0, 1);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].bin, (5, 5));
        assert_eq!(peaks[0].frequency, CarrierFreq::new(5.0, 5.0));
    }

    #[test]
    fn log_parabola_recovers_gaussian_centre() {
        let g = |x: f64| (-(x - 0.3).powi(2) / 2.0).exp();
        let offset = log_parabolic_offset(g(-1.0), g(0.0), g(1.0));
        assert!((offset - 0.3).abs() < 1e-12);
        assert_eq!(log_parabolic_offset(1.0, 1.0, 1.0), 0.0);
    }
}
