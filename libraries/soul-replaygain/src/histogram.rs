//! Loudness histogram and percentile extraction
//!
//! Window energies are stored as counts in 0.01 dB bins instead of keeping
//! the raw values, so memory stays constant regardless of track length.
//! Loudness is read back as the level exceeded by the loudest
//! `1 - percentile` share of windows, which keeps short transients from
//! dominating the result.

use crate::config::{HISTOGRAM_BINS, PINK_REFERENCE_DB, STEPS_PER_DB};
use crate::error::{ReplayGainError, Result};

/// Keeps `log10` finite for all-zero windows
const ENERGY_FLOOR: f64 = 1e-37;

/// Histogram bin for a window energy
///
/// Finite energies are clamped into `[0, HISTOGRAM_BINS)`; NaN, infinite
/// and negative energies have no bin.
pub fn bin_index(energy: f64) -> Option<usize> {
    if !energy.is_finite() || energy < 0.0 {
        return None;
    }
    let level = STEPS_PER_DB as f64 * 10.0 * (energy + ENERGY_FLOOR).log10();
    let index = level.round().clamp(0.0, (HISTOGRAM_BINS - 1) as f64);
    Some(index as usize)
}

/// Calibrated loudness value of a bin
pub fn bin_to_db(index: usize) -> f64 {
    PINK_REFERENCE_DB - index as f64 / STEPS_PER_DB as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoudnessHistogram {
    bins: Vec<u64>,
    total: u64,
}

impl Default for LoudnessHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LoudnessHistogram {
    pub fn new() -> Self {
        Self {
            bins: vec![0; HISTOGRAM_BINS],
            total: 0,
        }
    }

    /// Count one window energy; returns `false` if the energy has no bin
    pub fn record(&mut self, energy: f64) -> bool {
        match bin_index(energy) {
            Some(index) => {
                self.record_bin(index);
                true
            }
            None => false,
        }
    }

    /// Count one window directly in a bin (clamped to the last bin)
    pub fn record_bin(&mut self, index: usize) {
        let index = index.min(HISTOGRAM_BINS - 1);
        self.bins[index] += 1;
        self.total += 1;
    }

    /// Windows recorded so far
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self, index: usize) -> u64 {
        self.bins.get(index).copied().unwrap_or(0)
    }

    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// Add another histogram's counts to this one
    pub fn merge(&mut self, other: &Self) {
        for (bin, count) in self.bins.iter_mut().zip(&other.bins) {
            *bin += count;
        }
        self.total += other.total;
    }

    pub fn clear(&mut self) {
        self.bins.fill(0);
        self.total = 0;
    }

    /// Extract the recommended gain in dB
    ///
    /// Bins are walked from loudest to quietest until `1 - percentile` of all
    /// windows have been passed; that bin's calibrated value is returned.
    ///
    /// # Errors
    /// [`ReplayGainError::InsufficientSamples`] when fewer than
    /// `min_windows` (at least one) windows were recorded.
    pub fn loudness(&self, percentile: f64, min_windows: u64) -> Result<f64> {
        let required = min_windows.max(1);
        if self.total < required {
            return Err(ReplayGainError::InsufficientSamples {
                windows: self.total,
                required,
            });
        }

        let mut upper = (self.total as f64 * (1.0 - percentile)).ceil() as i64;
        let mut index = 0;
        for (i, &count) in self.bins.iter().enumerate().rev() {
            upper -= count as i64;
            if upper <= 0 {
                index = i;
                break;
            }
        }

        Ok(bin_to_db(index))
    }
}
