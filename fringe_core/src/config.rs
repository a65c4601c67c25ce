//! Analysis configuration via TOML files.
//!
//! Both sections are optional; missing sections and keys take the library
//! defaults.
//!
//! ```toml
//! [calibration]
//! wsize = 0.5
//! wsize_unit = "relative"   # or "absolute" (pixels)
//! wfunc = "cosine"
//! cpeak = 0
//! do_embed = true
//! embed_factor = 4
//! store_pow = false
//! outdir = "out/"
//!
//! [sideband]
//! sbsize = 0.5
//! method = "spectral"       # or "passband"
//! unwrap = true
//! unwrap_method = "quality_guided"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::calibrate::CalibrationOptions;
use crate::sideband::{SidebandMethod, SidebandOptions};
use crate::unwrap::UnwrapMethod;
use crate::window::{WindowKind, WindowSize};

/// Options for both stages of fringe analysis.
///
/// # Examples
///
/// ```
/// use fringe_analysis_core::config::FringeConfig;
/// use fringe_analysis_core::sideband::SidebandMethod;
///
/// let config = FringeConfig::from_str("[sideband]\nmethod = \"passband\"").unwrap();
/// assert_eq!(config.sideband.method, SidebandMethod::Passband);
/// assert_eq!(config.calibration.embed_factor, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FringeConfig {
    pub calibration: CalibrationOptions,
    pub sideband: SidebandOptions,
}

impl FringeConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawFringeConfig =
            toml::from_str(toml_str).map_err(|err| ConfigError::Parse(err.to_string()))?;

        Ok(Self {
            calibration: calibration_from(&raw.calibration)?,
            sideband: sideband_from(&raw.sideband)?,
        })
    }
}

fn window_size(section: &str, value: f64, unit: &str) -> Result<WindowSize, ConfigError> {
    let size = match unit.trim().to_ascii_lowercase().as_str() {
        "relative" => WindowSize::Relative(value),
        "absolute" | "pixels" => WindowSize::Absolute(value),
        other => {
            return Err(ConfigError::Parse(format!(
                "{section}.wsize_unit must be \"relative\" or \"absolute\", got \"{other}\""
            )))
        }
    };
    size.validate(&format!("{section}.wsize"))
        .map_err(|err| ConfigError::Parse(err.to_string()))?;
    Ok(size)
}

fn calibration_from(raw: &RawCalibration) -> Result<CalibrationOptions, ConfigError> {
    let wfunc = raw
        .wfunc
        .parse::<WindowKind>()
        .map_err(|err| ConfigError::Parse(err.to_string()))?;
    let options = CalibrationOptions {
        wsize: window_size("calibration", raw.wsize, &raw.wsize_unit)?,
        wfunc,
        cpeak: raw.cpeak,
        do_embed: raw.do_embed,
        embed_factor: raw.embed_factor,
        store_pow: raw.store_pow,
        ret_pow: raw.ret_pow,
        outdir: PathBuf::from(&raw.outdir),
        dc_radius: raw.dc_radius,
        peak_separation: raw.peak_separation,
        verbosity: raw.verbosity,
    };
    options
        .validate()
        .map_err(|err| ConfigError::Parse(format!("calibration: {err}")))?;
    Ok(options)
}

fn sideband_from(raw: &RawSideband) -> Result<SidebandOptions, ConfigError> {
    let method = raw
        .method
        .parse::<SidebandMethod>()
        .map_err(|err| ConfigError::Parse(err.to_string()))?;
    let unwrap_method = raw
        .unwrap_method
        .parse::<UnwrapMethod>()
        .map_err(|err| ConfigError::Parse(err.to_string()))?;
    let wfunc = raw
        .wfunc
        .parse::<WindowKind>()
        .map_err(|err| ConfigError::Parse(err.to_string()))?;

    let options = SidebandOptions {
        sbsize: raw.sbsize,
        method,
        unwrap: raw.unwrap,
        unwrap_method,
        wsize: window_size("sideband", raw.wsize, &raw.wsize_unit)?,
        wfunc,
        ret_pow: raw.ret_pow,
        get_complex: raw.get_complex,
        verbosity: raw.verbosity,
    };
    options
        .validate()
        .map_err(|err| ConfigError::Parse(format!("sideband: {err}")))?;
    Ok(options)
}

#[derive(Debug, Deserialize, Default)]
struct RawFringeConfig {
    #[serde(default)]
    calibration: RawCalibration,
    #[serde(default)]
    sideband: RawSideband,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCalibration {
    #[serde(default = "default_wsize")]
    wsize: f64,
    #[serde(default = "default_wsize_unit")]
    wsize_unit: String,
    #[serde(default = "default_wfunc")]
    wfunc: String,
    #[serde(default)]
    cpeak: usize,
    #[serde(default = "default_true")]
    do_embed: bool,
    #[serde(default = "default_embed_factor")]
    embed_factor: usize,
    #[serde(default = "default_true")]
    store_pow: bool,
    #[serde(default)]
    ret_pow: bool,
    #[serde(default = "default_outdir")]
    outdir: String,
    #[serde(default = "default_dc_radius")]
    dc_radius: f64,
    #[serde(default = "default_peak_separation")]
    peak_separation: f64,
    #[serde(default)]
    verbosity: u8,
}

impl Default for RawCalibration {
    fn default() -> Self {
        Self {
            wsize: default_wsize(),
            wsize_unit: default_wsize_unit(),
            wfunc: default_wfunc(),
            cpeak: 0,
            do_embed: true,
            embed_factor: default_embed_factor(),
            store_pow: true,
            ret_pow: false,
            outdir: default_outdir(),
            dc_radius: default_dc_radius(),
            peak_separation: default_peak_separation(),
            verbosity: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSideband {
    #[serde(default = "default_sbsize")]
    sbsize: f64,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default = "default_true")]
    unwrap: bool,
    #[serde(default = "default_unwrap_method")]
    unwrap_method: String,
    #[serde(default = "default_wsize")]
    wsize: f64,
    #[serde(default = "default_wsize_unit")]
    wsize_unit: String,
    #[serde(default = "default_wfunc")]
    wfunc: String,
    #[serde(default)]
    ret_pow: bool,
    #[serde(default)]
    get_complex: bool,
    #[serde(default)]
    verbosity: u8,
}

impl Default for RawSideband {
    fn default() -> Self {
        Self {
            sbsize: default_sbsize(),
            method: default_method(),
            unwrap: true,
            unwrap_method: default_unwrap_method(),
            wsize: default_wsize(),
            wsize_unit: default_wsize_unit(),
            wfunc: default_wfunc(),
            ret_pow: false,
            get_complex: false,
            verbosity: 0,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_wsize() -> f64 {
    0.5
}

fn default_wsize_unit() -> String {
    "relative".to_string()
}

fn default_wfunc() -> String {
    WindowKind::default().to_string()
}

fn default_embed_factor() -> usize {
    4
}

fn default_outdir() -> String {
    "./".to_string()
}

fn default_dc_radius() -> f64 {
    1.5
}

fn default_peak_separation() -> f64 {
    3.0
}

fn default_sbsize() -> f64 {
    0.5
}

fn default_method() -> String {
    SidebandMethod::default().to_string()
}

fn default_unwrap_method() -> String {
    UnwrapMethod::default().to_string()
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {}", err),
            ConfigError::Parse(err) => write!(f, "Parse error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}
