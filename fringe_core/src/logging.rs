//! JSON-lines run log of calibration results.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::carrier::CarrierFreq;
use crate::spectral::PowerSpectrum;

/// File name of the calibration log inside the output directory.
pub const CALIBRATION_LOG: &str = "calibration.jsonl";

fn append_json_line<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    serde_json::to_writer(&mut file, value)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    file.write_all(b"\n")
}

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationLogEntry {
    pub image_index: usize,
    pub cfreq: [f64; 2],
    pub peak_power: f64,
    pub embed_factor: usize,
    pub shape: [usize; 2],
    pub timestamp_ms: u64,
}

impl CalibrationLogEntry {
    pub fn new(
        image_index: usize,
        cfreq: &CarrierFreq,
        peak_power: f64,
        pow: &PowerSpectrum,
    ) -> Self {
        Self {
            image_index,
            cfreq: [cfreq.u, cfreq.v],
            peak_power,
            embed_factor: pow.embed_factor,
            shape: [pow.source_shape.0, pow.source_shape.1],
            timestamp_ms: timestamp_ms(),
        }
    }
}

/// Append `entry` to `<outdir>/calibration.jsonl`.
pub fn log_calibration<P: AsRef<Path>>(outdir: P, entry: &CalibrationLogEntry) -> io::Result<PathBuf> {
    fs::create_dir_all(&outdir)?;
    let path = outdir.as_ref().join(CALIBRATION_LOG);
    append_json_line(&path, entry)?;
    Ok(path)
}

/// Read back every entry of a calibration log.
pub fn read_calibration_log<P: AsRef<Path>>(path: P) -> io::Result<Vec<CalibrationLogEntry>> {
    fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
        })
        .collect()
}
