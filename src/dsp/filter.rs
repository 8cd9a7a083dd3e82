//! # Two-Pole Lowpass Filter (RBJ Biquad)
//!
//! The delayed signal passes through this filter before it is mixed
//! back in, so the repeats come out darker than the dry signal, the way
//! they would from an analog delay.
//!
//! ## The Filter Equation
//!
//! A biquad is a second-order IIR filter (Direct Form I):
//!
//! ```text
//! y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
//! ```
//!
//! It remembers two inputs and two outputs, and rolls off at 12 dB per
//! octave above the cutoff.
//!
//! ## Coefficients
//!
//! The coefficients come from Robert Bristow-Johnson's Audio EQ Cookbook,
//! low-pass case, with Q fixed at 1/√2 (Butterworth: flattest passband,
//! no resonant bump):
//!
//! ```text
//! w0    = 2π * fc / fs
//! alpha = sin(w0) / (2Q)    with Q = 1/√2
//! b0 = (1 - cos w0) / 2     a0 = 1 + alpha
//! b1 =  1 - cos w0          a1 = -2 cos w0
//! b2 = (1 - cos w0) / 2     a2 = 1 - alpha
//! ```
//!
//! Everything is divided by `a0` once, when the cutoff changes, so the
//! per-sample path is five multiplies and four adds. The sin/cos calls
//! only run when the host actually moves the cutoff knob.
//!
//! ## Denormals
//!
//! When the input goes silent, a recursive filter's state decays toward
//! zero forever and eventually becomes *denormal*: numbers so small the
//! FPU falls back to a slow path. Three defences are applied every sample:
//!
//! 1. The input and all four history values are sanitized, collapsing
//!    anything that is not a normal float to exact zero.
//! 2. A tiny constant is added to the recurrence and removed again. Any
//!    residue smaller than the constant's rounding step vanishes, so the
//!    state never creeps through the denormal range.
//! 3. Rounding at that step can still leave a resonant filter circling
//!    around ~1e-25 forever. Once the input history is silent and the
//!    last two outputs are below [`SILENCE_FLOOR`] (-300 dB), the output
//!    history is zeroed, and silence in gives exact silence out from then
//!    on.

use std::f32::consts::{FRAC_1_SQRT_2, PI};

use super::sanitize_denormal;

/// Butterworth quality factor.
const Q: f32 = FRAC_1_SQRT_2;

/// Offset added to (and removed from) the recurrence each sample.
const ANTI_DENORMAL: f32 = 1e-20;

/// Output level (-300 dB) below which a filter with silent input is
/// considered drained.
pub const SILENCE_FLOOR: f32 = 1e-15;

/// A two-pole RBJ lowpass with cached, `a0`-normalized coefficients.
pub struct BiquadLowpass {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    /// Input history: x[n-1], x[n-2]
    x1: f32,
    x2: f32,

    /// Output history: y[n-1], y[n-2]
    y1: f32,
    y2: f32,
}

impl BiquadLowpass {
    /// Create a filter with passthrough coefficients (`y[n] = x[n]`).
    /// The engine sets the real cutoff on its first block.
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Recompute the coefficients for a new cutoff frequency.
    ///
    /// The cutoff is clamped to 20 Hz .. 49% of the sample rate. Near
    /// Nyquist `w0` approaches π and the design degenerates; near 0 Hz
    /// the poles crowd the unit circle. The upper bound wins, and a NaN
    /// cutoff lands on 20 Hz.
    pub fn set_cutoff(&mut self, cutoff_hz: f32, sample_rate: f32) {
        let safe_cutoff = cutoff_hz.max(20.0).min(sample_rate * 0.49);

        let w0 = 2.0 * PI * safe_cutoff / sample_rate;
        let (sw, cw) = w0.sin_cos();
        let alpha = sw / (2.0 * Q);

        let a0 = 1.0 + alpha;
        let a0_inv = 1.0 / a0;

        self.b0 = (1.0 - cw) * 0.5 * a0_inv;
        self.b1 = (1.0 - cw) * a0_inv;
        self.b2 = self.b0;
        self.a1 = -2.0 * cw * a0_inv;
        self.a2 = (1.0 - alpha) * a0_inv;
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let x0 = sanitize_denormal(input);
        let x1 = sanitize_denormal(self.x1);
        let x2 = sanitize_denormal(self.x2);
        let y1 = sanitize_denormal(self.y1);
        let y2 = sanitize_denormal(self.y2);

        let acc = self.b0 * x0 + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
        let mut out = (acc + ANTI_DENORMAL) - ANTI_DENORMAL;

        let input_silent = x0 == 0.0 && x1 == 0.0;
        if input_silent && out.abs() < SILENCE_FLOOR && y1.abs() < SILENCE_FLOOR {
            out = 0.0;
            self.x2 = 0.0;
            self.x1 = 0.0;
            self.y2 = 0.0;
            self.y1 = 0.0;
            return out;
        }

        self.x2 = x1;
        self.x1 = x0;
        self.y2 = y1;
        self.y1 = out;

        out
    }

    /// Zero the filter history. Coefficients are kept.
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl Default for BiquadLowpass {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
