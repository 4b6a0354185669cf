//! ReplayGain results
//!
//! The analysis recommends a gain that brings a track (or album) to the
//! ReplayGain 1.0 reference level of 89 dB SPL. Peaks are reported relative
//! to full scale, so `1.0` is the largest representable sample.
//!
//! # Peak Values
//!
//! If `gain + peak` exceeds 0 dBFS, applying the gain clips. Players can use
//! [`GainRecommendation::safe_gain`] to cap the gain instead.

use crate::error::{ReplayGainError, Result};
use crate::REPLAYGAIN_REFERENCE_DB;
use serde::{Deserialize, Serialize};

/// Shared accessors for track and album results
pub trait GainRecommendation {
    /// Recommended gain in dB, `None` when too few windows were analyzed
    fn gain_db(&self) -> Option<f64>;

    /// Peak amplitude relative to full scale
    fn peak(&self) -> f64;

    /// Windows that contributed to the result
    fn windows(&self) -> u64;

    /// Windows needed for a gain value
    fn min_windows(&self) -> u64;

    /// Recommended gain, or why there is none
    fn gain(&self) -> Result<f64> {
        self.gain_db()
            .ok_or(ReplayGainError::InsufficientSamples {
                windows: self.windows(),
                required: self.min_windows().max(1),
            })
    }

    /// Peak in dBFS (`-inf` for digital silence)
    fn peak_dbfs(&self) -> f64 {
        if self.peak() > 0.0 {
            20.0 * self.peak().log10()
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Perceived loudness in dB SPL implied by the gain
    fn loudness_db(&self) -> Option<f64> {
        self.gain_db().map(|gain| REPLAYGAIN_REFERENCE_DB - gain)
    }

    /// Check if applying the gain would cause clipping
    fn would_clip(&self) -> bool {
        self.gain_db()
            .is_some_and(|gain| gain + self.peak_dbfs() > 0.0)
    }

    /// Gain limited so that the peak stays at or below full scale
    fn safe_gain(&self) -> Option<f64> {
        self.gain_db().map(|gain| gain.min(-self.peak_dbfs()))
    }

    /// Convert gain to linear multiplier
    fn linear_gain(&self) -> Option<f64> {
        self.gain_db().map(|gain| 10.0_f64.powf(gain / 20.0))
    }

    /// Convert safe gain to linear multiplier
    fn safe_linear_gain(&self) -> Option<f64> {
        self.safe_gain().map(|gain| 10.0_f64.powf(gain / 20.0))
    }
}

/// Track-level ReplayGain information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackGain {
    /// Gain to apply in dB (negative for loud tracks)
    pub gain_db: Option<f64>,
    /// Sample peak relative to full scale
    pub peak: f64,
    /// Complete RMS windows analyzed
    pub windows: u64,
    /// Frames (samples per channel) fed
    pub frames: u64,
    pub sample_rate: u32,
    pub channels: usize,
    /// Window threshold the gain was computed with
    #[serde(default = "default_min_windows")]
    pub min_windows: u64,
}

fn default_min_windows() -> u64 {
    1
}

impl TrackGain {
    /// Duration of the analyzed audio in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / f64::from(self.sample_rate)
    }
}

impl GainRecommendation for TrackGain {
    fn gain_db(&self) -> Option<f64> {
        self.gain_db
    }

    fn peak(&self) -> f64 {
        self.peak
    }

    fn windows(&self) -> u64 {
        self.windows
    }

    fn min_windows(&self) -> u64 {
        self.min_windows
    }
}

/// Album-level ReplayGain information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumGain {
    /// Gain to apply in dB for album normalization
    pub gain_db: Option<f64>,
    /// Maximum sample peak across all tracks
    pub peak: f64,
    /// Complete RMS windows across all tracks
    pub windows: u64,
    /// Number of tracks analyzed
    pub track_count: usize,
    #[serde(default = "default_min_windows")]
    pub min_windows: u64,
}

impl GainRecommendation for AlbumGain {
    fn gain_db(&self) -> Option<f64> {
        self.gain_db
    }

    fn peak(&self) -> f64 {
        self.peak
    }

    fn windows(&self) -> u64 {
        self.windows
    }

    fn min_windows(&self) -> u64 {
        self.min_windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_track(gain_db: Option<f64>, peak: f64) -> TrackGain {
        TrackGain {
            gain_db,
            peak,
            windows: 100,
            frames: 441_000,
            sample_rate: 44100,
            channels: 2,
            min_windows: 1,
        }
    }

    #[test]
    fn test_track_gain_no_clipping() {
        // Peak at -6 dBFS, +5 dB gain stays below full scale
        let track = make_track(Some(5.0), 0.5);
        assert!(!track.would_clip());
        assert!((track.safe_gain().unwrap() - 5.0).abs() < 0.001);
        assert!((track.duration_seconds() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_track_gain_clipping() {
        // Peak at about -6 dBFS, +10 dB gain would clip
        let track = make_track(Some(10.0), 0.5);
        assert!(track.would_clip());

        // Safe gain is limited to about +6 dB
        let safe = track.safe_gain().unwrap();
        assert!((safe - 6.0206).abs() < 0.001, "safe gain {}", safe);
        assert!((track.safe_linear_gain().unwrap() - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_linear_gain_conversion() {
        let track = make_track(Some(0.0), 0.1);
        assert!((track.linear_gain().unwrap() - 1.0).abs() < 1e-12);

        let track = make_track(Some(6.0), 0.1);
        assert!((track.linear_gain().unwrap() - 2.0).abs() < 0.01);

        let track = make_track(Some(-6.0), 0.1);
        assert!((track.linear_gain().unwrap() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_missing_gain_reports_insufficient_samples() {
        let track = make_track(None, 0.0);
        assert!(matches!(
            track.gain(),
            Err(ReplayGainError::InsufficientSamples { windows: 100, .. })
        ));
        assert!(!track.would_clip());
        assert_eq!(track.linear_gain(), None);
        assert_eq!(track.loudness_db(), None);
    }

    #[test]
    fn test_silent_peak_dbfs() {
        let album = AlbumGain {
            gain_db: Some(64.82),
            peak: 0.0,
            windows: 20,
            track_count: 1,
            min_windows: 1,
        };
        assert_eq!(album.peak_dbfs(), f64::NEG_INFINITY);
        assert_eq!(album.safe_gain(), Some(64.82));
    }

    #[test]
    fn test_loudness_relative_to_reference() {
        let track = make_track(Some(-3.0), 1.0);
        assert!((track.loudness_db().unwrap() - 92.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_samples_reports_threshold() {
        let mut track = make_track(None, 0.2);
        track.windows = 12;
        track.min_windows = 40;
        assert_eq!(
            track.gain(),
            Err(ReplayGainError::InsufficientSamples {
                windows: 12,
                required: 40
            })
        );
    }

    #[test]
    fn test_min_windows_defaults_when_missing() {
        let json = r#"{"gain_db":null,"peak":0.5,"windows":0,"track_count":0}"#;
        let album: AlbumGain = serde_json::from_str(json).unwrap();
        assert_eq!(album.min_windows, 1);
    }

    #[test]
    fn test_serializes_to_json() {
        let track = make_track(Some(-7.25), 0.98);
        let json = serde_json::to_string(&track).unwrap();
        let back: TrackGain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, track);
    }
}
