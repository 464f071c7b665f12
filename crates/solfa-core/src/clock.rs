//! AudioClock - sample position to musical time conversions
//!
//! The clock is a plain value type: a sample position plus the tempo and
//! time signature in effect. Everything musical (beats, measures, seconds)
//! is derived on demand, never stored. The sample position is the single
//! primary time source for the whole engine; no component reads wall-clock
//! time for sequencing decisions.
//!
//! The clock is never mutated in place. The playback loop, which owns the
//! authoritative position, advances it by `at_sample` copies.

use crate::types::TimeSignature;

/// Immutable mapping between sample positions and musical time
///
/// Preconditions (enforced by `SolfegeEngine::configure`): `tempo > 0`,
/// `sample_rate > 0`, `numerator > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioClock {
    /// Current absolute sample position (negative during countdown)
    pub sample_position: i64,
    /// Sample rate in Hz (44100/48000)
    pub sample_rate: u32,
    /// Tempo in beats per minute
    pub tempo: f64,
    /// Time signature
    pub time_signature: TimeSignature,
}

impl AudioClock {
    /// Create a clock at sample position 0
    pub fn new(sample_rate: u32, tempo: f64, time_signature: TimeSignature) -> Self {
        Self {
            sample_position: 0,
            sample_rate,
            tempo,
            time_signature,
        }
    }

    /// Copy of this clock at a new sample position
    pub fn at_sample(&self, sample_position: i64) -> Self {
        Self { sample_position, ..*self }
    }

    /// Seconds elapsed since the downbeat (negative during countdown)
    pub fn seconds(&self) -> f64 {
        self.sample_position as f64 / self.sample_rate as f64
    }

    /// Samples per beat: `sample_rate * 60 / tempo`
    pub fn samples_per_beat(&self) -> f64 {
        self.sample_rate as f64 * 60.0 / self.tempo
    }

    /// Samples per measure
    pub fn samples_per_measure(&self) -> f64 {
        self.samples_per_beat() * self.time_signature.numerator as f64
    }

    /// Fractional beat position since the downbeat
    pub fn beat_position(&self) -> f64 {
        self.sample_position as f64 / self.samples_per_beat()
    }

    /// Fractional measure position since the downbeat
    pub fn measure_position(&self) -> f64 {
        self.sample_position as f64 / self.samples_per_measure()
    }

    /// Beat within the current measure, 1-indexed
    pub fn beat_in_measure(&self) -> u32 {
        let beats = self.beat_position().floor() as i64;
        let n = self.time_signature.numerator as i64;
        (beats.rem_euclid(n) + 1) as u32
    }

    /// Nearest sample for a beat position
    pub fn beat_to_sample(&self, beat: f64) -> i64 {
        (beat * self.samples_per_beat()).round() as i64
    }

    /// Fractional beat position for a sample
    pub fn sample_to_beat(&self, sample: i64) -> f64 {
        sample as f64 / self.samples_per_beat()
    }
}
