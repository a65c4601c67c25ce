//! Versioned persistence of power spectra.
//!
//! Spectra are written with a fixed-width little-endian bincode codec. Each
//! file starts with a format version so that incompatible files are
//! rejected on load. The stored data is fftshifted (DC at the centre), which
//! is the layout expected by external viewers; it is converted back to FFT
//! order when loaded.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::spectral::fft::ifftshift;
use crate::spectral::PowerSpectrum;

/// Current on-disk format version.
pub const SPECTRUM_FORMAT_VERSION: u32 = 1;

/// File extension of stored spectra.
pub const SPECTRUM_EXTENSION: &str = "fpow";

/// Errors that can occur while storing or loading spectra.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying I/O failure while reading or writing the file.
    Io(std::io::Error),
    /// Serialization or deserialization error from the binary codec.
    Serialization(bincode::Error),
    /// The file was well formed but has an incompatible format version.
    VersionMismatch { expected: u32, found: u32 },
    /// The file did not match the expected structure.
    InvalidFormat(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "I/O error while accessing spectrum file: {err}"),
            StoreError::Serialization(err) => {
                write!(f, "Failed to (de)serialize spectrum payload: {err}")
            }
            StoreError::VersionMismatch { expected, found } => write!(
                f,
                "Spectrum format version mismatch: expected {expected}, found {found}",
            ),
            StoreError::InvalidFormat(msg) => {
                write!(f, "Spectrum file has invalid structure: {msg}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err)
    }
}

/// On-disk representation of a [`PowerSpectrum`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumRecord {
    pub version: u32,
    pub shape: (usize, usize),
    pub embed_factor: usize,
    pub source_shape: (usize, usize),
    /// Row-major fftshifted power
    pub data: Vec<f64>,
}

impl SpectrumRecord {
    pub fn from_spectrum(pow: &PowerSpectrum) -> Self {
        let centered = pow.centered();
        Self {
            version: SPECTRUM_FORMAT_VERSION,
            shape: centered.dim(),
            embed_factor: pow.embed_factor,
            source_shape: pow.source_shape,
            data: centered.iter().copied().collect(),
        }
    }

    pub fn into_spectrum(self) -> Result<PowerSpectrum, StoreError> {
        if self.version != SPECTRUM_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: SPECTRUM_FORMAT_VERSION,
                found: self.version,
            });
        }
        if self.embed_factor == 0 {
            return Err(StoreError::InvalidFormat("embed_factor is zero".into()));
        }
        let centered = Array2::from_shape_vec(self.shape, self.data)
            .map_err(|err| StoreError::InvalidFormat(err.to_string()))?;
        Ok(PowerSpectrum {
            data: ifftshift(&centered),
            embed_factor: self.embed_factor,
            source_shape: self.source_shape,
        })
    }
}

/// Deterministic binary codec options shared by all spectrum files.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_little_endian()
}

/// Path under `outdir` where a spectrum called `name` is stored.
pub fn spectrum_path<P: AsRef<Path>>(outdir: P, name: &str) -> PathBuf {
    outdir
        .as_ref()
        .join(name)
        .with_extension(SPECTRUM_EXTENSION)
}

/// Write `pow` to `<outdir>/<name>.fpow`, creating `outdir` if needed.
pub fn store_power<P: AsRef<Path>>(
    outdir: P,
    name: &str,
    pow: &PowerSpectrum,
) -> Result<PathBuf, StoreError> {
    let path = spectrum_path(&outdir, name);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    codec().serialize_into(&mut writer, &SpectrumRecord::from_spectrum(pow))?;
    writer.flush()?;
    Ok(path)
}

/// Read a spectrum written by [`store_power`].
pub fn load_power<P: AsRef<Path>>(path: P) -> Result<PowerSpectrum, StoreError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let record: SpectrumRecord = codec().deserialize_from(&mut reader)?;
    record.into_spectrum()
}
