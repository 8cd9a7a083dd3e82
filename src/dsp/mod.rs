//! # DSP (Digital Signal Processing) Primitives
//!
//! The real-time building blocks the delay engine is made of:
//!
//! - **`ring_buffer`**: a fixed-size circular store of past samples,
//!   read back at whole-sample offsets.
//!
//! - **`filter`**: a two-pole RBJ lowpass that darkens the delayed
//!   signal, with denormal protection on every sample.
//!
//! - **`tempo`**: tracks the host's tempo and time signature from the
//!   per-block event stream.
//!
//! - **`taps`**: the two-tap crossfade state machine that makes delay
//!   time changes click-free.
//!
//! None of these allocate after construction.

pub mod filter;
pub mod ring_buffer;
pub mod taps;
pub mod tempo;

/// Collapse anything that is not a normal float to exact zero.
///
/// Covers denormals (the slow FPU path), but also NaN and infinities, so
/// a bad value entering a recursive filter cannot poison it forever.
/// Zero itself is not "normal" either and maps to zero, which is fine.
#[inline]
pub fn sanitize_denormal(value: f32) -> f32 {
    if value.is_normal() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_denormal() {
        assert_eq!(sanitize_denormal(0.5), 0.5);
        assert_eq!(sanitize_denormal(-1e-20), -1e-20);
        assert_eq!(sanitize_denormal(f32::MIN_POSITIVE / 2.0), 0.0);
        assert_eq!(sanitize_denormal(-f32::MIN_POSITIVE / 8.0), 0.0);
        assert_eq!(sanitize_denormal(f32::NAN), 0.0);
        assert_eq!(sanitize_denormal(f32::NEG_INFINITY), 0.0);
        assert_eq!(sanitize_denormal(-0.0), 0.0);
    }
}
