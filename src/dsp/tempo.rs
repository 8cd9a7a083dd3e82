//! # Tempo Tracking
//!
//! To sync the delay to the song, the engine needs two numbers from the
//! host: the tempo in BPM and the beat unit (the time signature's
//! numerator, e.g. 4 for 4/4). The host delivers them as events with each
//! audio block; the tracker folds those events into a [`TempoSnapshot`]
//! that the engine reads once per block.
//!
//! The tracker never buffers events across blocks. Each block's events
//! are consumed in one pass and only the resulting snapshot survives.
//!
//! ## Tempo-synced delay time
//!
//! ```text
//! delay_ms = beat_unit * 60000 / (bpm * 2^(divisor - 1))
//! ```
//!
//! At 120 BPM in 4/4, divisor 1 gives one bar (2000 ms), divisor 2 half
//! a bar (1000 ms), and so on: each divisor step halves the time.

/// A time-signature numerator as the host encoded it.
///
/// Some hosts send it as a float, others as an integer. Both normalize
/// to the same `f32`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BeatUnit {
    Float(f32),
    Long(i64),
}

impl BeatUnit {
    pub fn as_f32(self) -> f32 {
        match self {
            BeatUnit::Float(value) => value,
            BeatUnit::Long(value) => value as f32,
        }
    }
}

/// One event from the host's per-block event sequence.
///
/// Only the time-position variants are inspected; everything else the
/// host sends through the same channel arrives as `Other` and is skipped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TempoEvent {
    /// The tempo changed (or was restated).
    Bpm(f32),
    /// The time signature changed (or was restated).
    BeatUnit(BeatUnit),
    /// Anything that is not a time-position notification.
    Other,
}

/// The latest known tempo, as seen by the engine at the start of a block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoSnapshot {
    pub bpm: f32,
    pub beat_unit: f32,
    /// `true` once any tempo or time-signature event has been seen.
    pub valid: bool,
}

impl TempoSnapshot {
    /// Derive a synced delay time in milliseconds, or `None` when the
    /// snapshot cannot be used for sync.
    ///
    /// A zero, negative or non-finite tempo or beat unit never reaches
    /// the division; the caller falls back to the literal time instead.
    pub fn synced_delay_ms(&self, divisor: i32) -> Option<f32> {
        if !self.valid {
            return None;
        }
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return None;
        }
        if !(self.beat_unit.is_finite() && self.beat_unit > 0.0) {
            return None;
        }

        let ms = self.beat_unit * 60_000.0 / (self.bpm * 2.0_f32.powi(divisor - 1));
        ms.is_finite().then_some(ms)
    }
}

impl Default for TempoSnapshot {
    /// 120 BPM in 4/4, but not yet valid: sync stays off until the host
    /// has actually told us its tempo.
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beat_unit: 4.0,
            valid: false,
        }
    }
}

/// Folds host tempo events into a [`TempoSnapshot`].
#[derive(Default)]
pub struct TempoTracker {
    snapshot: TempoSnapshot,
}

impl TempoTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TempoSnapshot {
        self.snapshot
    }

    /// Drain one block's worth of events.
    ///
    /// BPM and beat unit update independently: a tempo-only event keeps
    /// the last known beat unit and vice versa.
    pub fn ingest<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = TempoEvent>,
    {
        for event in events {
            match event {
                TempoEvent::Bpm(bpm) => {
                    self.snapshot.bpm = bpm;
                    self.snapshot.valid = true;
                }
                TempoEvent::BeatUnit(beat_unit) => {
                    self.snapshot.beat_unit = beat_unit.as_f32();
                    self.snapshot.valid = true;
                }
                TempoEvent::Other => {}
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// A fresh tracker has no usable tempo.
    #[test]
    fn test_starts_invalid() {
        let tracker = TempoTracker::new();
        assert!(!tracker.snapshot().valid);
        assert_eq!(tracker.snapshot().synced_delay_ms(1), None);
    }

    /// Non-tempo events are ignored and do not validate the snapshot.
    #[test]
    fn test_other_events_ignored() {
        let mut tracker = TempoTracker::new();
        tracker.ingest([TempoEvent::Other, TempoEvent::Other]);
        assert_eq!(tracker.snapshot(), TempoSnapshot::default());
    }

    /// 120 BPM, 4/4, divisor 1 → one bar = 2000 ms; each divisor step
    /// halves the result.
    #[test]
    fn test_synced_delay_formula() {
        let mut tracker = TempoTracker::new();
        tracker.ingest([
            TempoEvent::Bpm(120.0),
            TempoEvent::BeatUnit(BeatUnit::Float(4.0)),
        ]);
        let snapshot = tracker.snapshot();

        assert_eq!(snapshot.synced_delay_ms(1), Some(2000.0));
        assert_eq!(snapshot.synced_delay_ms(2), Some(1000.0));
        assert_eq!(snapshot.synced_delay_ms(3), Some(500.0));
        assert_eq!(snapshot.synced_delay_ms(4), Some(250.0));
        assert_eq!(snapshot.synced_delay_ms(5), Some(125.0));
    }

    /// Integer and float beat units normalize to the same value.
    #[test]
    fn test_beat_unit_encodings() {
        let mut float_tracker = TempoTracker::new();
        float_tracker.ingest([TempoEvent::BeatUnit(BeatUnit::Float(3.0))]);

        let mut long_tracker = TempoTracker::new();
        long_tracker.ingest([TempoEvent::BeatUnit(BeatUnit::Long(3))]);

        assert_eq!(float_tracker.snapshot().beat_unit, 3.0);
        assert_eq!(long_tracker.snapshot(), float_tracker.snapshot());
    }

    /// A tempo-only event must not erase a known beat unit, and a
    /// signature-only event must not erase a known tempo.
    #[test]
    fn test_fields_update_independently() {
        let mut tracker = TempoTracker::new();
        tracker.ingest([
            TempoEvent::Bpm(90.0),
            TempoEvent::BeatUnit(BeatUnit::Long(7)),
        ]);

        tracker.ingest([TempoEvent::Bpm(140.0)]);
        assert_eq!(tracker.snapshot().bpm, 140.0);
        assert_eq!(tracker.snapshot().beat_unit, 7.0);

        tracker.ingest([TempoEvent::BeatUnit(BeatUnit::Float(5.0))]);
        assert_eq!(tracker.snapshot().bpm, 140.0);
        assert_eq!(tracker.snapshot().beat_unit, 5.0);
    }

    /// The last event in a block wins.
    #[test]
    fn test_last_event_wins() {
        let mut tracker = TempoTracker::new();
        tracker.ingest([
            TempoEvent::Bpm(100.0),
            TempoEvent::Other,
            TempoEvent::Bpm(128.0),
        ]);
        assert_eq!(tracker.snapshot().bpm, 128.0);
    }

    /// A validity flag, once set, survives empty blocks.
    #[test]
    fn test_validity_persists_across_empty_blocks() {
        let mut tracker = TempoTracker::new();
        tracker.ingest([TempoEvent::Bpm(120.0)]);
        tracker.ingest(std::iter::empty());
        assert!(tracker.snapshot().valid);
        // Beat unit defaults to 4 when only the tempo is known.
        assert_eq!(tracker.snapshot().synced_delay_ms(1), Some(2000.0));
    }

    /// Zero, negative and non-finite values disable sync rather than
    /// producing NaN or infinity.
    #[test]
    fn test_unusable_tempo_yields_none() {
        for bpm in [0.0, -120.0, f32::NAN, f32::INFINITY] {
            let snapshot = TempoSnapshot {
                bpm,
                beat_unit: 4.0,
                valid: true,
            };
            assert_eq!(snapshot.synced_delay_ms(1), None, "bpm {bpm}");
        }
        for beat_unit in [0.0, -4.0, f32::NAN] {
            let snapshot = TempoSnapshot {
                bpm: 120.0,
                beat_unit,
                valid: true,
            };
            assert_eq!(snapshot.synced_delay_ms(1), None, "beat unit {beat_unit}");
        }
    }
}
