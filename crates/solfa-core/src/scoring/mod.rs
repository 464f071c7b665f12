//! Scoring - judging a sung note against the expected note
//!
//! Pure functions over accumulated pitch frames and detected onset/offset
//! samples. Pitch and timing are judged independently: `pitch` answers
//! "was the right note sung, and how well in tune", `timing` answers
//! "did it start and last when it should".
//!
//! Tolerance constants here are representative defaults, tunable per
//! exercise; they are deliberately not hard-coded into the scorers.

pub mod pitch;
pub mod timing;

pub use pitch::{score_pitch, PitchScore};
pub use timing::{score_timing, TimingScore};

/// Pitch verdict for one note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PitchStatus {
    /// The expected note dominated the voiced frames
    Correct,
    /// A lower note dominated
    Flat,
    /// A higher note dominated
    Sharp,
    /// Too few voiced frames to judge
    #[default]
    NotEvaluated,
}

impl PitchStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PitchStatus::Correct => "correct",
            PitchStatus::Flat => "flat",
            PitchStatus::Sharp => "sharp",
            PitchStatus::NotEvaluated => "not evaluated",
        }
    }
}

/// Timing verdict for one note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimingStatus {
    OnTime,
    Early,
    Late,
    /// No onset was ever detected in the note window
    #[default]
    NotPlayed,
}

impl TimingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TimingStatus::OnTime => "on time",
            TimingStatus::Early => "early",
            TimingStatus::Late => "late",
            TimingStatus::NotPlayed => "not played",
        }
    }
}

/// Pitch-scoring tolerances
#[derive(Debug, Clone, Copy)]
pub struct PitchTolerance {
    /// Fewer voiced frames than this and the note is NotEvaluated
    pub min_frames: usize,
    /// Fraction of voiced frames that must match the expected note;
    /// below this the note is judged wrong outright
    pub min_correct_ratio: f32,
    /// Mean absolute cents up to which intonation is perfect
    pub excellent_cents: f32,
    /// Mean absolute cents at the edge of "still the right note"
    pub borderline_cents: f32,
    /// Cap on the penalty for non-matching (noise/vibrato) frames
    pub max_noise_penalty: f32,
}

impl Default for PitchTolerance {
    fn default() -> Self {
        Self {
            min_frames: 5,
            min_correct_ratio: 0.45,
            excellent_cents: 25.0,
            borderline_cents: 50.0,
            max_noise_penalty: 15.0,
        }
    }
}

/// Timing-scoring tolerances
///
/// The attack window is asymmetric: singers anticipate more than they lag,
/// so an early entry is forgiven further than a late one.
#[derive(Debug, Clone, Copy)]
pub struct TimingTolerance {
    /// Full attack credit up to this many ms early
    pub early_ms: f32,
    /// Full attack credit up to this many ms late
    pub late_ms: f32,
    /// Attack points lost per ms beyond the window
    pub attack_slope: f32,
    /// Attack credit never drops below this
    pub attack_floor: f32,
    /// Sung/expected duration ratio treated as a full hold
    /// (the shortfall is breathing room before the next note)
    pub ideal_duration_ratio: f32,
    /// Below this ratio the duration credit drops toward the floor
    pub mid_duration_ratio: f32,
    /// Duration credit never drops below this once an onset exists
    pub duration_floor: f32,
    /// Duration credit while the note is still sounding (no offset yet)
    pub sustain_credit: f32,
}

impl Default for TimingTolerance {
    fn default() -> Self {
        Self {
            early_ms: 120.0,
            late_ms: 80.0,
            attack_slope: 0.2,
            attack_floor: 5.0,
            ideal_duration_ratio: 0.85,
            mid_duration_ratio: 0.5,
            duration_floor: 5.0,
            sustain_credit: 35.0,
        }
    }
}
