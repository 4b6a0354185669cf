//! ReplayGain analysis session
//!
//! [`ReplayGainAnalyzer`] drives the filter cascade, RMS windower,
//! histograms and peak tracker for one album's worth of tracks:
//!
//! ```text
//! new(rate) ─► Ready ──feed──► Accumulating ──finish_track──► Ready
//!                │                   │
//!                └─────finalize──────┴──────► Finalized
//! ```
//!
//! Track-scope state (filters, partial window, track histogram and peak) is
//! reset by [`ReplayGainAnalyzer::finish_track`]; album-scope state keeps
//! accumulating until [`ReplayGainAnalyzer::finalize`].

use crate::coefficients::{self, SampleRateProfile};
use crate::config::AnalysisConfig;
use crate::error::{ReplayGainError, Result};
use crate::filter::ChannelState;
use crate::histogram::LoudnessHistogram;
use crate::peak::PeakState;
use crate::replaygain::{AlbumGain, TrackGain};
use crate::window::RmsWindower;
use tracing::{debug, warn};

/// Lifecycle of an analysis session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Sample rate chosen, no samples in the current track yet
    Ready,
    /// Current track has received samples
    Accumulating,
    /// Results computed; no further input accepted
    Finalized,
}

/// Streaming ReplayGain analyzer
///
/// Feed decoded samples track by track, then read the track and album gain.
/// All mutation goes through `&mut self`, so a session has a single writer;
/// independent sessions can run on separate threads.
///
/// # Example
///
/// ```
/// use soul_replaygain::{GainRecommendation, ReplayGainAnalyzer};
///
/// let mut analyzer = ReplayGainAnalyzer::new(44100)?;
///
/// // One second of a 1 kHz tone at -20 dBFS, 16-bit sample range
/// let tone: Vec<f64> = (0..44100)
///     .map(|i| 3276.8 * (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / 44100.0).sin())
///     .collect();
/// analyzer.feed(&[&tone, &tone])?;
///
/// let track = analyzer.finish_track()?;
/// let album = analyzer.finalize()?;
/// assert_eq!(track.gain_db, album.gain_db);
/// assert!(track.gain()? > 0.0);
/// # Ok::<(), soul_replaygain::ReplayGainError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ReplayGainAnalyzer {
    config: AnalysisConfig,
    sample_rate: u32,
    profile: &'static SampleRateProfile,
    state: SessionState,
    /// Filter state per channel of the current track
    channels: Vec<ChannelState>,
    windower: RmsWindower,
    track_histogram: LoudnessHistogram,
    album_histogram: LoudnessHistogram,
    peaks: PeakState,
    /// Frames fed to the current track
    frames: u64,
    /// Reused per-channel buffers for filter output
    scratch: Vec<Vec<f64>>,
    tracks: Vec<TrackGain>,
    album: Option<AlbumGain>,
}

impl ReplayGainAnalyzer {
    /// Create a session with the default configuration
    ///
    /// # Errors
    /// [`ReplayGainError::UnsupportedRate`] if no filter profile covers `sample_rate`
    pub fn new(sample_rate: u32) -> Result<Self> {
        Self::with_config(sample_rate, AnalysisConfig::default())
    }

    /// Create a session with a custom configuration
    pub fn with_config(sample_rate: u32, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let profile = select_profile(sample_rate)?;

        debug!(
            sample_rate,
            profile_rate = profile.rate,
            percentile = config.percentile,
            "Created ReplayGain analysis session"
        );

        Ok(Self {
            config,
            sample_rate,
            profile,
            state: SessionState::Ready,
            channels: Vec::new(),
            windower: RmsWindower::new(sample_rate, 0),
            track_histogram: LoudnessHistogram::new(),
            album_histogram: LoudnessHistogram::new(),
            peaks: PeakState::new(),
            frames: 0,
            scratch: Vec::new(),
            tracks: Vec::new(),
            album: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Filter profile in use (may belong to a neighbouring rate)
    pub fn profile(&self) -> &'static SampleRateProfile {
        self.profile
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Channel count of the current track, once samples have been fed
    pub fn channels(&self) -> Option<usize> {
        match self.state {
            SessionState::Accumulating => Some(self.channels.len()),
            _ => None,
        }
    }

    /// Frames fed to the current track
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Results of finished tracks, in order
    pub fn tracks(&self) -> &[TrackGain] {
        &self.tracks
    }

    pub fn track_histogram(&self) -> &LoudnessHistogram {
        &self.track_histogram
    }

    pub fn album_histogram(&self) -> &LoudnessHistogram {
        &self.album_histogram
    }

    /// Feed one block of planar samples (one slice per channel)
    ///
    /// # Errors
    /// - [`ReplayGainError::SessionClosed`] after [`finalize`](Self::finalize)
    /// - [`ReplayGainError::InvalidChannelCount`] for 0 or too many channels
    /// - [`ReplayGainError::ChannelCount`] if the count differs from earlier
    ///   blocks of the same track
    /// - [`ReplayGainError::UnequalChannelLengths`] for ragged blocks
    pub fn feed<S: AsRef<[f64]>>(&mut self, block: &[S]) -> Result<()> {
        if self.state == SessionState::Finalized {
            return Err(ReplayGainError::SessionClosed);
        }

        let count = block.len();
        if count == 0 || count > self.config.max_channels {
            return Err(ReplayGainError::InvalidChannelCount {
                count,
                max: self.config.max_channels,
            });
        }
        if self.state == SessionState::Accumulating && count != self.channels.len() {
            return Err(ReplayGainError::ChannelCount {
                expected: self.channels.len(),
                actual: count,
            });
        }

        let frames = block[0].as_ref().len();
        for (channel, samples) in block.iter().enumerate().skip(1) {
            let actual = samples.as_ref().len();
            if actual != frames {
                return Err(ReplayGainError::UnequalChannelLengths {
                    channel,
                    expected: frames,
                    actual,
                });
            }
        }
        if frames == 0 {
            return Ok(());
        }

        if self.state == SessionState::Ready {
            self.begin_track(count);
        }

        let factor = self.config.sample_scale.to_int16_factor();
        for ((state, out), samples) in self.channels.iter_mut().zip(&mut self.scratch).zip(block) {
            let samples = samples.as_ref();
            self.peaks.observe(samples);
            out.clear();
            state.process_into(self.profile, samples.iter().map(|s| s * factor), out);
        }

        for energy in self.windower.accumulate(&self.scratch) {
            if self.track_histogram.record(energy) {
                self.album_histogram.record(energy);
            } else {
                warn!(energy, "Dropped RMS window with non-finite energy");
            }
        }

        self.frames += frames as u64;
        Ok(())
    }

    /// Feed interleaved samples (`L R L R ...` for stereo)
    pub fn feed_interleaved(&mut self, samples: &[f64], channels: usize) -> Result<()> {
        let planar = deinterleave(samples, channels, |s| s)?;
        self.feed(&planar)
    }

    /// Feed interleaved 16-bit integer samples
    ///
    /// Samples are converted into the configured
    /// [`SampleScale`](crate::SampleScale) first, so the result does not
    /// depend on the configuration.
    pub fn feed_interleaved_i16(&mut self, samples: &[i16], channels: usize) -> Result<()> {
        let factor = self.config.sample_scale.to_int16_factor();
        let planar = deinterleave(samples, channels, |s| f64::from(s) / factor)?;
        self.feed(&planar)
    }

    /// Recommended gain of the current track so far
    pub fn track_gain(&self) -> Result<f64> {
        self.track_histogram
            .loudness(self.config.percentile, self.config.min_windows)
    }

    /// Peak of the current track relative to full scale
    pub fn track_peak(&self) -> f64 {
        self.normalize_peak(self.peaks.track())
    }

    /// Recommended gain of every window analyzed in this session
    pub fn album_gain(&self) -> Result<f64> {
        self.album_histogram
            .loudness(self.config.percentile, self.config.min_windows)
    }

    /// Peak of every sample analyzed in this session relative to full scale
    pub fn album_peak(&self) -> f64 {
        self.normalize_peak(self.peaks.album())
    }

    /// Close the current track and return its result
    ///
    /// Filter history, the incomplete RMS window, the track histogram and the
    /// track peak are reset; album state is kept. A track that is too short
    /// yields `gain_db: None`.
    ///
    /// # Errors
    /// [`ReplayGainError::EmptyTrack`] if no samples were fed since the last
    /// track, [`ReplayGainError::SessionClosed`] after finalize.
    pub fn finish_track(&mut self) -> Result<TrackGain> {
        match self.state {
            SessionState::Finalized => return Err(ReplayGainError::SessionClosed),
            SessionState::Ready => return Err(ReplayGainError::EmptyTrack),
            SessionState::Accumulating => {}
        }

        let gain_db = match self.track_gain() {
            Ok(gain) => Some(gain),
            Err(ReplayGainError::InsufficientSamples { windows, required }) => {
                debug!(windows, required, "Track too short for a gain value");
                None
            }
            Err(e) => return Err(e),
        };

        let track = TrackGain {
            gain_db,
            peak: self.track_peak(),
            windows: self.track_histogram.total(),
            frames: self.frames,
            sample_rate: self.sample_rate,
            channels: self.channels.len(),
            min_windows: self.config.min_windows,
        };

        if self.windower.pending() > 0 {
            debug!(
                frames = self.windower.pending(),
                "Discarding incomplete RMS window at track end"
            );
        }

        debug!(
            track = self.tracks.len() + 1,
            gain_db = ?track.gain_db,
            peak = track.peak,
            windows = track.windows,
            "Finished track"
        );

        self.tracks.push(track.clone());
        self.reset_track();
        Ok(track)
    }

    /// Switch to another sample rate between tracks
    ///
    /// # Errors
    /// [`ReplayGainError::TrackInProgress`] while a track is accumulating,
    /// [`ReplayGainError::SessionClosed`] after finalize, and
    /// [`ReplayGainError::UnsupportedRate`] for rates without a profile.
    pub fn change_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        match self.state {
            SessionState::Finalized => return Err(ReplayGainError::SessionClosed),
            SessionState::Accumulating => return Err(ReplayGainError::TrackInProgress),
            SessionState::Ready => {}
        }

        self.profile = select_profile(sample_rate)?;
        self.sample_rate = sample_rate;
        self.windower = RmsWindower::new(sample_rate, 0);
        debug!(sample_rate, profile_rate = self.profile.rate, "Changed sample rate");
        Ok(())
    }

    /// Finish analysis and return the album result
    ///
    /// A track still accumulating is finished first. Later calls return the
    /// same result.
    pub fn finalize(&mut self) -> Result<AlbumGain> {
        if let Some(album) = &self.album {
            return Ok(album.clone());
        }

        if self.state == SessionState::Accumulating {
            self.finish_track()?;
        }

        let gain_db = match self.album_gain() {
            Ok(gain) => Some(gain),
            Err(ReplayGainError::InsufficientSamples { windows, required }) => {
                debug!(windows, required, "Album too short for a gain value");
                None
            }
            Err(e) => return Err(e),
        };
        let album = AlbumGain {
            gain_db,
            peak: self.album_peak(),
            windows: self.album_histogram.total(),
            track_count: self.tracks.len(),
            min_windows: self.config.min_windows,
        };

        debug!(
            gain_db = ?album.gain_db,
            peak = album.peak,
            tracks = album.track_count,
            "Finalized ReplayGain analysis"
        );

        self.state = SessionState::Finalized;
        self.album = Some(album.clone());
        Ok(album)
    }

    fn begin_track(&mut self, channels: usize) {
        self.channels.clear();
        self.channels.resize_with(channels, ChannelState::new);
        self.scratch.resize_with(channels, Vec::new);
        self.windower.reset(channels);
        self.state = SessionState::Accumulating;
    }

    fn reset_track(&mut self) {
        self.channels.iter_mut().for_each(ChannelState::reset);
        self.windower.reset(self.channels.len());
        self.track_histogram.clear();
        self.peaks.reset_track();
        self.frames = 0;
        self.state = SessionState::Ready;
    }

    fn normalize_peak(&self, peak: f64) -> f64 {
        peak / self.config.sample_scale.full_scale()
    }
}

fn select_profile(sample_rate: u32) -> Result<&'static SampleRateProfile> {
    let profile = coefficients::lookup(sample_rate)?;
    if profile.rate != sample_rate {
        warn!(
            sample_rate,
            profile_rate = profile.rate,
            "No filter profile for sample rate, using nearest"
        );
    }
    Ok(profile)
}

fn deinterleave<T: Copy>(
    samples: &[T],
    channels: usize,
    convert: impl Fn(T) -> f64,
) -> Result<Vec<Vec<f64>>> {
    if channels == 0 {
        return Err(ReplayGainError::InvalidBlock(
            "channel count must be at least 1".to_string(),
        ));
    }
    if samples.len() % channels != 0 {
        return Err(ReplayGainError::InvalidBlock(format!(
            "Sample count {} is not divisible by channel count {}",
            samples.len(),
            channels
        )));
    }

    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in planar.iter_mut().zip(frame) {
            channel.push(convert(sample));
        }
    }
    Ok(planar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SampleScale;
    use crate::replaygain::GainRecommendation;

    fn tone(sample_rate: u32, amplitude: f64, frames: usize) -> Vec<f64> {
        (0..frames)
            .map(|i| {
                let t = i as f64 / f64::from(sample_rate);
                amplitude * (2.0 * std::f64::consts::PI * 440.0 * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_analyzer_creation() {
        assert!(ReplayGainAnalyzer::new(44100).is_ok());
        assert!(ReplayGainAnalyzer::new(8000).is_ok());
        // Served by the nearest profile
        assert_eq!(ReplayGainAnalyzer::new(88200).unwrap().profile().rate, 96000);
        assert_eq!(ReplayGainAnalyzer::new(96000).unwrap().profile().rate, 96000);

        assert!(matches!(
            ReplayGainAnalyzer::new(0),
            Err(ReplayGainError::UnsupportedRate(0))
        ));
        assert!(matches!(
            ReplayGainAnalyzer::new(384_000),
            Err(ReplayGainError::UnsupportedRate(384_000))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalysisConfig {
            percentile: 0.0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            ReplayGainAnalyzer::with_config(44100, config),
            Err(ReplayGainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_state_transitions() {
        let mut analyzer = ReplayGainAnalyzer::new(44100).unwrap();
        assert_eq!(analyzer.state(), SessionState::Ready);
        assert_eq!(analyzer.channels(), None);

        let samples = tone(44100, 1000.0, 4410);
        analyzer.feed(&[&samples]).unwrap();
        assert_eq!(analyzer.state(), SessionState::Accumulating);
        assert_eq!(analyzer.channels(), Some(1));
        assert_eq!(analyzer.frames(), 4410);

        analyzer.finish_track().unwrap();
        assert_eq!(analyzer.state(), SessionState::Ready);
        assert_eq!(analyzer.frames(), 0);

        analyzer.finalize().unwrap();
        assert_eq!(analyzer.state(), SessionState::Finalized);
    }

    #[test]
    fn test_empty_block_keeps_ready_state() {
        let mut analyzer = ReplayGainAnalyzer::new(44100).unwrap();
        let empty: [&[f64]; 2] = [&[], &[]];
        analyzer.feed(&empty).unwrap();
        assert_eq!(analyzer.state(), SessionState::Ready);
    }

    #[test]
    fn test_channel_count_change_mid_track() {
        let mut analyzer = ReplayGainAnalyzer::new(44100).unwrap();
        let samples = tone(44100, 1000.0, 100);
        analyzer.feed(&[&samples, &samples]).unwrap();

        assert_eq!(
            analyzer.feed(&[&samples]),
            Err(ReplayGainError::ChannelCount {
                expected: 2,
                actual: 1
            })
        );

        // A new track may use a different layout
        analyzer.finish_track().unwrap();
        assert!(analyzer.feed(&[&samples]).is_ok());
    }

    #[test]
    fn test_invalid_channel_counts() {
        let mut analyzer = ReplayGainAnalyzer::new(44100).unwrap();
        let none: [&[f64]; 0] = [];
        assert!(matches!(
            analyzer.feed(&none),
            Err(ReplayGainError::InvalidChannelCount { count: 0, max: 8 })
        ));

        let samples = vec![0.0; 10];
        let too_many = vec![samples.as_slice(); 9];
        assert!(matches!(
            analyzer.feed(&too_many),
            Err(ReplayGainError::InvalidChannelCount { count: 9, max: 8 })
        ));
    }

    #[test]
    fn test_unequal_channel_lengths() {
        let mut analyzer = ReplayGainAnalyzer::new(44100).unwrap();
        let left = vec![0.0; 10];
        let right = vec![0.0; 9];
        assert_eq!(
            analyzer.feed(&[&left, &right]),
            Err(ReplayGainError::UnequalChannelLengths {
                channel: 1,
                expected: 10,
                actual: 9
            })
        );
        assert_eq!(analyzer.state(), SessionState::Ready);
    }

    #[test]
    fn test_feed_after_finalize_fails() {
        let mut analyzer = ReplayGainAnalyzer::new(44100).unwrap();
        analyzer.finalize().unwrap();

        let samples = vec![0.0; 10];
        assert_eq!(analyzer.feed(&[&samples]), Err(ReplayGainError::SessionClosed));
        assert_eq!(analyzer.finish_track(), Err(ReplayGainError::SessionClosed));
        assert_eq!(
            analyzer.change_sample_rate(48000),
            Err(ReplayGainError::SessionClosed)
        );
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut analyzer = ReplayGainAnalyzer::new(44100).unwrap();
        let samples = tone(44100, 8000.0, 44100);
        analyzer.feed(&[&samples]).unwrap();

        let first = analyzer.finalize().unwrap();
        let second = analyzer.finalize().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.track_count, 1);
        assert!(first.gain_db.is_some());
    }

    #[test]
    fn test_short_track_has_no_gain() {
        let mut analyzer = ReplayGainAnalyzer::new(44100).unwrap();
        // Less than one 2205-frame window
        let samples = tone(44100, 8000.0, 2000);
        analyzer.feed(&[&samples]).unwrap();

        assert!(matches!(
            analyzer.track_gain(),
            Err(ReplayGainError::InsufficientSamples { windows: 0, .. })
        ));
        let track = analyzer.finish_track().unwrap();
        assert_eq!(track.gain_db, None);
        assert!(track.peak > 0.0);
    }

    #[test]
    fn test_change_sample_rate_between_tracks() {
        let mut analyzer = ReplayGainAnalyzer::new(44100).unwrap();
        let samples = tone(44100, 1000.0, 4410);
        analyzer.feed(&[&samples]).unwrap();
        assert_eq!(
            analyzer.change_sample_rate(48000),
            Err(ReplayGainError::TrackInProgress)
        );

        analyzer.finish_track().unwrap();
        analyzer.change_sample_rate(48000).unwrap();
        assert_eq!(analyzer.sample_rate(), 48000);
        assert_eq!(analyzer.profile().rate, 48000);
    }

    #[test]
    fn test_interleaved_matches_planar() {
        let left = tone(44100, 3000.0, 10_000);
        let right: Vec<f64> = left.iter().map(|s| s * 0.5).collect();
        let interleaved: Vec<f64> = left
            .iter()
            .zip(&right)
            .flat_map(|(l, r)| [*l, *r])
            .collect();

        let mut planar = ReplayGainAnalyzer::new(44100).unwrap();
        planar.feed(&[&left, &right]).unwrap();

        let mut mixed = ReplayGainAnalyzer::new(44100).unwrap();
        mixed.feed_interleaved(&interleaved, 2).unwrap();

        assert_eq!(planar.track_histogram(), mixed.track_histogram());
        assert_eq!(planar.track_peak(), mixed.track_peak());
    }

    #[test]
    fn test_interleaved_rejects_ragged_input() {
        let mut analyzer = ReplayGainAnalyzer::new(44100).unwrap();
        assert!(matches!(
            analyzer.feed_interleaved(&[0.1; 5], 2),
            Err(ReplayGainError::InvalidBlock(_))
        ));
        assert!(matches!(
            analyzer.feed_interleaved_i16(&[1; 4], 0),
            Err(ReplayGainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_finish_track_without_samples() {
        let mut analyzer = ReplayGainAnalyzer::new(44100).unwrap();
        assert_eq!(analyzer.finish_track(), Err(ReplayGainError::EmptyTrack));

        let samples = tone(44100, 1000.0, 4410);
        analyzer.feed(&[&samples]).unwrap();
        analyzer.finish_track().unwrap();
        // A second call has nothing to close
        assert_eq!(analyzer.finish_track(), Err(ReplayGainError::EmptyTrack));

        assert_eq!(analyzer.tracks().len(), 1);
        assert_eq!(analyzer.finalize().unwrap().track_count, 1);
    }

    #[test]
    fn test_min_windows_reported_in_results() {
        let config = AnalysisConfig {
            min_windows: 50,
            ..AnalysisConfig::default()
        };
        let mut analyzer = ReplayGainAnalyzer::with_config(44100, config).unwrap();
        // One second holds only 20 windows
        let samples = tone(44100, 8000.0, 44100);
        analyzer.feed(&[&samples]).unwrap();

        let track = analyzer.finish_track().unwrap();
        assert_eq!(track.gain_db, None);
        assert_eq!(
            track.gain(),
            Err(ReplayGainError::InsufficientSamples {
                windows: 20,
                required: 50
            })
        );

        let album = analyzer.finalize().unwrap();
        assert_eq!(
            album.gain(),
            Err(ReplayGainError::InsufficientSamples {
                windows: 20,
                required: 50
            })
        );
    }

    #[test]
    fn test_i16_input_with_unit_scale() {
        let samples: Vec<i16> = (0..44100)
            .map(|i| {
                let t = f64::from(i) / 44100.0;
                (16384.0 * (2.0 * std::f64::consts::PI * 1000.0 * t).sin()).round() as i16
            })
            .collect();

        let mut int16 = ReplayGainAnalyzer::new(44100).unwrap();
        int16.feed_interleaved_i16(&samples, 1).unwrap();

        let config = AnalysisConfig {
            sample_scale: SampleScale::Unit,
            ..AnalysisConfig::default()
        };
        let mut unit = ReplayGainAnalyzer::with_config(44100, config).unwrap();
        unit.feed_interleaved_i16(&samples, 1).unwrap();

        assert!((unit.track_peak() - 0.5).abs() < 1e-3, "peak {}", unit.track_peak());
        assert_eq!(unit.track_peak(), int16.track_peak());
        let (a, b) = (int16.track_gain().unwrap(), unit.track_gain().unwrap());
        assert!((a - b).abs() < 0.015, "int16 {} unit {}", a, b);
    }

    #[test]
    fn test_unit_scale_peak_normalization() {
        let config = AnalysisConfig {
            sample_scale: SampleScale::Unit,
            ..AnalysisConfig::default()
        };
        let mut analyzer = ReplayGainAnalyzer::with_config(44100, config).unwrap();
        analyzer.feed(&[&[0.25, -0.5, 0.125]]).unwrap();
        assert_eq!(analyzer.track_peak(), 0.5);

        let mut int16 = ReplayGainAnalyzer::new(44100).unwrap();
        int16.feed_interleaved_i16(&[16384, -8192], 1).unwrap();
        assert_eq!(int16.track_peak(), 0.5);
    }
}
