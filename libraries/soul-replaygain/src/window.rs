//! RMS windowing of filtered samples
//!
//! Filtered samples are squared and summed per channel until a 50 ms window
//! is full; the window's mean energy is then emitted. A partially filled
//! window is carried over to the next call.

/// Number of frames in one RMS window: `ceil(rate * 0.050)`
pub fn window_length(sample_rate: u32) -> usize {
    // Integer form of ceil(rate * RMS_WINDOW_SECONDS), exact for every rate
    (sample_rate as usize).div_ceil(20)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RmsWindower {
    /// Running sum of squares per channel
    sums: Vec<f64>,
    /// Frames in the current window
    filled: usize,
    window_len: usize,
}

impl RmsWindower {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sums: vec![0.0; channels],
            filled: 0,
            window_len: window_length(sample_rate).max(1),
        }
    }

    /// Frames per window
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Frames waiting in the incomplete window
    pub fn pending(&self) -> usize {
        self.filled
    }

    pub fn channels(&self) -> usize {
        self.sums.len()
    }

    /// Add one block of filtered samples (one slice per channel, equal lengths)
    /// and return the energy of every window completed by it
    pub fn accumulate<S: AsRef<[f64]>>(&mut self, filtered: &[S]) -> Vec<f64> {
        debug_assert_eq!(filtered.len(), self.sums.len());
        let frames = filtered.first().map_or(0, |ch| ch.as_ref().len());

        let mut energies = Vec::with_capacity((self.filled + frames) / self.window_len);
        let mut pos = 0;
        while pos < frames {
            let take = (self.window_len - self.filled).min(frames - pos);
            for (sum, channel) in self.sums.iter_mut().zip(filtered) {
                for s in &channel.as_ref()[pos..pos + take] {
                    *sum += s * s;
                }
            }
            self.filled += take;
            pos += take;

            if self.filled == self.window_len {
                energies.push(self.take_energy());
            }
        }
        energies
    }

    /// Discard the incomplete window and switch channel count
    pub fn reset(&mut self, channels: usize) {
        self.sums.clear();
        self.sums.resize(channels, 0.0);
        self.filled = 0;
    }

    fn take_energy(&mut self) -> f64 {
        let total: f64 = self.sums.iter().sum();
        let energy = total / (self.window_len * self.sums.len()) as f64;
        self.sums.iter_mut().for_each(|sum| *sum = 0.0);
        self.filled = 0;
        energy
    }
}
