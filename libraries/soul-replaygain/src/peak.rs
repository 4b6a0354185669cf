//! Sample peak tracking

/// Running maximum of `|sample|` for the current track and the album
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeakState {
    track: f64,
    album: f64,
}

impl PeakState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise both peaks to the largest magnitude in `samples`
    pub fn observe(&mut self, samples: &[f64]) {
        let block_peak = samples.iter().fold(0.0_f64, |peak, s| peak.max(s.abs()));
        self.track = self.track.max(block_peak);
        self.album = self.album.max(block_peak);
    }

    pub fn track(&self) -> f64 {
        self.track
    }

    pub fn album(&self) -> f64 {
        self.album
    }

    /// Start a new track; the album peak is kept
    pub fn reset_track(&mut self) {
        self.track = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_defaults_to_zero() {
        let peaks = PeakState::new();
        assert_eq!(peaks.track(), 0.0);
        assert_eq!(peaks.album(), 0.0);
    }

    #[test]
    fn test_observe_uses_magnitude() {
        let mut peaks = PeakState::new();
        peaks.observe(&[0.5, -0.9, 0.3]);
        assert_eq!(peaks.track(), 0.9);

        peaks.observe(&[0.1]);
        assert_eq!(peaks.track(), 0.9);
    }

    #[test]
    fn test_album_peak_survives_track_reset() {
        let mut peaks = PeakState::new();
        peaks.observe(&[-1200.0]);
        peaks.reset_track();
        peaks.observe(&[800.0]);

        assert_eq!(peaks.track(), 800.0);
        assert_eq!(peaks.album(), 1200.0);
    }

    #[test]
    fn test_nan_does_not_poison_peak() {
        let mut peaks = PeakState::new();
        peaks.observe(&[f64::NAN, 0.25]);
        assert_eq!(peaks.track(), 0.25);
    }
}
