//! Streaming ReplayGain analysis for Soul Player
//!
//! This crate provides:
//! - Equal-loudness filtering (Yule-Walker + Butterworth cascade per channel)
//! - 50 ms RMS windowing with histogram-based loudness statistics
//! - Track and album gain recommendations (ReplayGain 1.0, 89 dB reference)
//! - Track and album sample peaks
//!
//! Decoding, tag writing and applying the gain are left to the caller.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Sample Block │ ─►│ Filter Cascade│ ─►│ RMS Windower│ ─►│  Histograms  │
//! └──────────────┘   │ (per channel) │   └─────────────┘   │ track / album│
//!        │           └───────────────┘                     └──────┬───────┘
//!        ▼                                                        ▼
//! ┌──────────────┐                                        ┌──────────────┐
//! │ Peak Tracker │ ─────────────────────────────────────► │ TrackGain /  │
//! └──────────────┘                                        │ AlbumGain    │
//!                                                         └──────────────┘
//! ```
//!
//! # Sample convention
//!
//! By default samples are `f64` values in the signed 16-bit range
//! (±32768), which is what the calibration constant assumes. Set
//! [`AnalysisConfig::sample_scale`] to [`SampleScale::Unit`] to feed ±1.0
//! samples instead.
//!
//! # Example
//!
//! ```ignore
//! use soul_replaygain::{GainRecommendation, ReplayGainAnalyzer};
//!
//! let mut analyzer = ReplayGainAnalyzer::new(44100)?;
//!
//! for track in album {
//!     for block in track.decoded_blocks() {
//!         analyzer.feed(&[&block.left, &block.right])?;
//!     }
//!     let gain = analyzer.finish_track()?;
//!     println!("Track gain: {:?} dB, peak {:.4}", gain.gain_db, gain.peak);
//! }
//!
//! let album = analyzer.finalize()?;
//! println!("Album gain: {:.2} dB", album.gain()?);
//! ```

mod analyzer;
pub mod coefficients;
mod config;
mod error;
pub mod filter;
pub mod histogram;
mod peak;
mod replaygain;
pub mod window;

pub use analyzer::{ReplayGainAnalyzer, SessionState};
pub use coefficients::{lookup, supported_rates, IirCoefficients, SampleRateProfile};
pub use config::{
    AnalysisConfig, SampleScale, DEFAULT_PERCENTILE, HISTOGRAM_BINS, MAX_DB, MAX_SAMPLE_RATE,
    PINK_REFERENCE_DB, RMS_WINDOW_SECONDS, STEPS_PER_DB,
};
pub use error::{ReplayGainError, Result};
pub use filter::ChannelState;
pub use histogram::LoudnessHistogram;
pub use peak::PeakState;
pub use replaygain::{AlbumGain, GainRecommendation, TrackGain};
pub use window::RmsWindower;

/// ReplayGain 1.0 reference playback level in dB SPL
pub const REPLAYGAIN_REFERENCE_DB: f64 = 89.0;
