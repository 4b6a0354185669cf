//! Equal-loudness filter cascade
//!
//! Every channel runs its samples through the Yule-Walker stage and then the
//! Butterworth highpass. The filter histories live in fixed-size ring
//! buffers so that a stream can be fed in arbitrarily sized blocks.

use crate::coefficients::{SampleRateProfile, BUTTER_ORDER, YULE_ORDER};

/// Added to every stage-1 output to keep silent input out of the denormal range
const DENORMAL_GUARD: f64 = 1e-10;

/// Fixed-capacity history of the most recent `N` values
///
/// `back(1)` is the newest value, `back(N)` the oldest. Pushing overwrites
/// the oldest slot.
#[derive(Debug, Clone, PartialEq)]
pub struct History<const N: usize> {
    slots: [f64; N],
    /// Slot holding the newest value
    cursor: usize,
}

impl<const N: usize> Default for History<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> History<N> {
    /// Create a zero-filled history
    pub fn new() -> Self {
        Self {
            slots: [0.0; N],
            cursor: 0,
        }
    }

    /// Append a value, discarding the oldest one
    #[inline]
    pub fn push(&mut self, value: f64) {
        self.cursor = (self.cursor + 1) % N;
        self.slots[self.cursor] = value;
    }

    /// Value pushed `delay` steps ago (1 = newest)
    #[inline]
    pub fn back(&self, delay: usize) -> f64 {
        debug_assert!((1..=N).contains(&delay), "delay {delay} out of 1..={N}");
        self.slots[(self.cursor + N + 1 - delay) % N]
    }

    /// Values from newest to oldest
    pub fn recent(&self) -> impl Iterator<Item = f64> + '_ {
        (1..=N).map(|delay| self.back(delay))
    }

    /// Reset all values to zero
    pub fn clear(&mut self) {
        self.slots = [0.0; N];
        self.cursor = 0;
    }
}

/// Filter state of a single channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelState {
    /// Raw input samples
    input: History<YULE_ORDER>,
    /// Yule-Walker outputs (also the Butterworth inputs)
    stage1: History<YULE_ORDER>,
    /// Butterworth outputs
    stage2: History<BUTTER_ORDER>,
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter one sample through both stages
    #[inline]
    pub fn process_sample(&mut self, profile: &SampleRateProfile, x: f64) -> f64 {
        let yule = &profile.yule;
        let mut y1 = DENORMAL_GUARD + yule.b[0] * x;
        for k in 1..=YULE_ORDER {
            y1 += yule.b[k] * self.input.back(k) - yule.a[k] * self.stage1.back(k);
        }

        let butter = &profile.butter;
        let mut y2 = butter.b[0] * y1;
        for k in 1..=BUTTER_ORDER {
            y2 += butter.b[k] * self.stage1.back(k) - butter.a[k] * self.stage2.back(k);
        }

        self.input.push(x);
        self.stage1.push(y1);
        self.stage2.push(y2);
        y2
    }

    /// Filter a block and return the stage-2 output
    pub fn process(&mut self, profile: &SampleRateProfile, input: &[f64]) -> Vec<f64> {
        let mut output = Vec::with_capacity(input.len());
        self.process_into(profile, input.iter().copied(), &mut output);
        output
    }

    /// Filter samples, appending the stage-2 output to `output`
    pub fn process_into<I>(&mut self, profile: &SampleRateProfile, input: I, output: &mut Vec<f64>)
    where
        I: IntoIterator<Item = f64>,
    {
        output.extend(input.into_iter().map(|x| self.process_sample(profile, x)));
    }

    /// Forget all history (start of a new track)
    pub fn reset(&mut self) {
        self.input.clear();
        self.stage1.clear();
        self.stage2.clear();
    }

    /// Most recent raw inputs, newest first
    pub fn input_history(&self) -> impl Iterator<Item = f64> + '_ {
        self.input.recent()
    }
}
