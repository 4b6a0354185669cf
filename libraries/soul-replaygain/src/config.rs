//! Analysis configuration
//!
//! Defaults reproduce the reference ReplayGain 1.0 analysis. Values can be
//! layered from a config file and `REPLAYGAIN_*` environment variables.

use crate::error::{ReplayGainError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Length of one RMS window in seconds
pub const RMS_WINDOW_SECONDS: f64 = 0.050;

/// Histogram resolution (bins per dB)
pub const STEPS_PER_DB: usize = 100;

/// Histogram span in dB, covering `[0, MAX_DB)`
pub const MAX_DB: usize = 120;

/// Number of histogram bins
pub const HISTOGRAM_BINS: usize = STEPS_PER_DB * MAX_DB;

/// Calibration value: the loudness reported for the -14 dBFS pink noise
/// reference signal, in the 16-bit integer sample convention
pub const PINK_REFERENCE_DB: f64 = 64.82;

/// Share of windows that must be at least as loud as the reported level
pub const DEFAULT_PERCENTILE: f64 = 0.95;

/// Highest sample rate accepted by the coefficient lookup
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Full scale of the 16-bit integer sample convention
pub const INT16_FULL_SCALE: f64 = 32768.0;

/// Upper bound for `max_channels`
const CHANNEL_LIMIT: usize = 64;

/// Numeric range of the samples handed to the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleScale {
    /// Signed 16-bit integer range (±32768), the calibration convention
    #[default]
    Int16,
    /// Unit range (±1.0), scaled up to the 16-bit range before filtering
    Unit,
}

impl SampleScale {
    /// Multiplier that maps samples into the 16-bit integer range
    pub fn to_int16_factor(self) -> f64 {
        match self {
            Self::Int16 => 1.0,
            Self::Unit => INT16_FULL_SCALE,
        }
    }

    /// Magnitude of a full-scale sample in this convention
    pub fn full_scale(self) -> f64 {
        match self {
            Self::Int16 => INT16_FULL_SCALE,
            Self::Unit => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Percentile used when extracting loudness from the histogram
    #[serde(default = "default_percentile")]
    pub percentile: f64,

    /// Minimum number of complete RMS windows before a gain is reported
    #[serde(default = "default_min_windows")]
    pub min_windows: u64,

    #[serde(default)]
    pub sample_scale: SampleScale,

    /// Largest channel count a track may have
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,
}

fn default_percentile() -> f64 {
    DEFAULT_PERCENTILE
}

fn default_min_windows() -> u64 {
    1
}

fn default_max_channels() -> usize {
    8
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            percentile: default_percentile(),
            min_windows: default_min_windows(),
            sample_scale: SampleScale::default(),
            max_channels: default_max_channels(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Environment variables use the `REPLAYGAIN_` prefix, e.g.
    /// `REPLAYGAIN_PERCENTILE=0.9` or `REPLAYGAIN_SAMPLE_SCALE=unit`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if path.exists() {
                settings = settings.add_source(config::File::from(path));
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("REPLAYGAIN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.percentile > 0.0 && self.percentile < 1.0) {
            return Err(ReplayGainError::InvalidConfig(format!(
                "percentile must be between 0 and 1 (exclusive), got {}",
                self.percentile
            )));
        }
        if self.min_windows == 0 {
            return Err(ReplayGainError::InvalidConfig(
                "min_windows must be at least 1".to_string(),
            ));
        }
        if !(1..=CHANNEL_LIMIT).contains(&self.max_channels) {
            return Err(ReplayGainError::InvalidConfig(format!(
                "max_channels must be between 1 and {}, got {}",
                CHANNEL_LIMIT, self.max_channels
            )));
        }
        Ok(())
    }
}
