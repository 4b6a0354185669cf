//! Error types for ReplayGain analysis

use thiserror::Error;

/// Result type for ReplayGain operations
pub type Result<T> = std::result::Result<T, ReplayGainError>;

/// Errors that can occur during ReplayGain analysis
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplayGainError {
    /// Sample rate is zero or above the supported maximum
    #[error("Unsupported sample rate: {0} Hz (must be between 1 and 192000)")]
    UnsupportedRate(u32),

    /// Channel count changed in the middle of a track
    #[error("Channel count changed from {expected} to {actual} mid-track")]
    ChannelCount { expected: usize, actual: usize },

    /// Channel count outside of the configured range
    #[error("Invalid channel count: {count} (must be 1-{max})")]
    InvalidChannelCount { count: usize, max: usize },

    /// Planar block whose channels do not share one length
    #[error("Channel {channel} has {actual} samples, expected {expected}")]
    UnequalChannelLengths {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    /// Malformed sample block
    #[error("Invalid sample block: {0}")]
    InvalidBlock(String),

    /// Too few RMS windows were recorded to produce a loudness value
    #[error("Not enough samples for analysis ({windows} windows, need at least {required})")]
    InsufficientSamples { windows: u64, required: u64 },

    /// Session was already finalized
    #[error("Analysis session is closed")]
    SessionClosed,

    /// No samples were fed since the last track was finished
    #[error("No samples fed for the current track")]
    EmptyTrack,

    /// Operation requires the current track to be finished first
    #[error("A track is still being analyzed")]
    TrackInProgress,

    /// Invalid analysis configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<config::ConfigError> for ReplayGainError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
