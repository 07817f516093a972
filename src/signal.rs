//! # Filtered Sample Buffer
//!
//! Short sliding history of a scalar signal with a mean and a second-order
//! Butterworth low-pass / high-pass stage.
//!
//! Slot 0 always holds the newest value. The filters are direct-form I
//! biquads and only ever look at slots 0..=2, which is why the depth is
//! fixed at three.
//!
//! ```
//! use hoh_control::signal::SampleBuffer;
//!
//! let mut current = SampleBuffer::new();
//! current.update(30.0);
//! current.update(0.0);
//! current.update(0.0);
//! assert!((current.mean() - 10.0).abs() < 1e-6);
//! ```

use std::f32::consts::{PI, SQRT_2};

/// Number of history slots.
pub const DEPTH: usize = 3;

/// Biquad coefficients in the `y = b·x + a1·y1 + a2·y2` convention.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Biquad {
    fn apply(&self, input: &[f32; DEPTH], output: &[f32; DEPTH]) -> f32 {
        self.b0 * input[0]
            + self.b1 * input[1]
            + self.b2 * input[2]
            + self.a1 * output[1]
            + self.a2 * output[2]
    }
}

/// Fixed-depth scalar history with mean and IIR filtering.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    raw: [f32; DEPTH],
    lowpassed: [f32; DEPTH],
    highpassed: [f32; DEPTH],
    lowpass: Biquad,
    highpass: Biquad,
}

fn shift(history: &mut [f32; DEPTH]) {
    history.copy_within(0..DEPTH - 1, 1);
}

impl SampleBuffer {
    /// Create an all-zero buffer. Filters output zero until
    /// [`configure_butterworth`](Self::configure_butterworth) is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every history slot. Filter coefficients are kept.
    pub fn clear(&mut self) {
        self.raw = [0.0; DEPTH];
        self.lowpassed = [0.0; DEPTH];
        self.highpassed = [0.0; DEPTH];
    }

    /// Push a new sample into slot 0, dropping the oldest one.
    pub fn update(&mut self, value: f32) {
        shift(&mut self.raw);
        self.raw[0] = value;
    }

    /// Arithmetic mean of all slots.
    #[must_use]
    pub fn mean(&self) -> f32 {
        self.raw.iter().sum::<f32>() / DEPTH as f32
    }

    /// Newest raw sample.
    #[must_use]
    pub fn latest(&self) -> f32 {
        self.raw[0]
    }

    /// Raw history, newest first.
    #[must_use]
    pub fn history(&self) -> &[f32; DEPTH] {
        &self.raw
    }

    /// Design matching Butterworth low-pass and high-pass sections.
    ///
    /// * `cutoff_hz` - corner frequency
    /// * `sample_period_us` - time between successive [`update`](Self::update) calls
    pub fn configure_butterworth(&mut self, cutoff_hz: f32, sample_period_us: f32) {
        let ita = 1.0 / (PI / 1_000_000.0 * cutoff_hz * sample_period_us).tan();
        let ita_sq = ita * ita;

        let b0 = 1.0 / (1.0 + SQRT_2 * ita + ita_sq);
        self.lowpass = Biquad {
            b0,
            b1: 2.0 * b0,
            b2: b0,
            a1: 2.0 * (ita_sq - 1.0) * b0,
            a2: -(1.0 - SQRT_2 * ita + ita_sq) * b0,
        };
        self.highpass = Biquad {
            b0: self.lowpass.b0 * ita_sq,
            b1: -self.lowpass.b1 * ita_sq,
            b2: self.lowpass.b2 * ita_sq,
            a1: self.lowpass.a1,
            a2: self.lowpass.a2,
        };
    }

    /// Run the low-pass section on the current history and return its output.
    pub fn filter_lowpass(&mut self) -> f32 {
        shift(&mut self.lowpassed);
        self.lowpassed[0] = self.lowpass.apply(&self.raw, &self.lowpassed);
        self.lowpassed[0]
    }

    /// Run the high-pass section on the current history and return its output.
    pub fn filter_highpass(&mut self) -> f32 {
        shift(&mut self.highpassed);
        self.highpassed[0] = self.highpass.apply(&self.raw, &self.highpassed);
        self.highpassed[0]
    }

    /// First difference of the two newest samples.
    #[must_use]
    pub fn detrend(&self) -> f32 {
        self.raw[0] - self.raw[1]
    }
}
