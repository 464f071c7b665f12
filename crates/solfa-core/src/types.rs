//! Common types for the solfa engine
//!
//! Fundamental audio types shared across the engine: the sample alias,
//! buffer-period constants, and the exercise phase machine.

/// Frames advanced per playback-loop iteration (~11.6ms at 44.1kHz)
pub const BUFFER_FRAMES: usize = 512;

/// Analysis window size in frames (2048 gives ~100Hz update rate with
/// buffer-sized hops, enough low-frequency resolution for the voice)
pub const ANALYSIS_WINDOW: usize = 2048;

/// Audio sample type (32-bit float throughout)
pub type Sample = f32;

/// Phase of a solfège exercise
///
/// `Idle → Countdown → {Playing | Listening} → Completed`, back to `Idle`
/// on stop. Stored in an atomic (see `engine::EngineAtomics`) so any thread
/// can read it without locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolfegePhase {
    #[default]
    Idle,
    /// Counting in, one measure before the downbeat
    Countdown,
    /// Piano demo: the engine sounds the expected notes
    Playing,
    /// The user sings; microphone analysis is live
    Listening,
    /// Past the last expected note's end
    Completed,
}

impl SolfegePhase {
    /// Encode for atomic storage
    pub fn as_u8(self) -> u8 {
        match self {
            SolfegePhase::Idle => 0,
            SolfegePhase::Countdown => 1,
            SolfegePhase::Playing => 2,
            SolfegePhase::Listening => 3,
            SolfegePhase::Completed => 4,
        }
    }

    /// Decode from atomic storage (unknown values map to Idle)
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => SolfegePhase::Countdown,
            2 => SolfegePhase::Playing,
            3 => SolfegePhase::Listening,
            4 => SolfegePhase::Completed,
            _ => SolfegePhase::Idle,
        }
    }
}

/// Time signature of an exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeSignature {
    /// Beats per measure
    pub numerator: u32,
    /// Beat unit (4 = quarter note)
    pub denominator: u32,
}

impl TimeSignature {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self { numerator, denominator }
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self { numerator: 4, denominator: 4 }
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_roundtrip() {
        for phase in [
            SolfegePhase::Idle,
            SolfegePhase::Countdown,
            SolfegePhase::Playing,
            SolfegePhase::Listening,
            SolfegePhase::Completed,
        ] {
            assert_eq!(SolfegePhase::from_u8(phase.as_u8()), phase);
        }
    }

    #[test]
    fn test_unknown_phase_maps_to_idle() {
        assert_eq!(SolfegePhase::from_u8(200), SolfegePhase::Idle);
    }

    #[test]
    fn test_time_signature_display() {
        assert_eq!(TimeSignature::new(3, 4).to_string(), "3/4");
        assert_eq!(TimeSignature::default().to_string(), "4/4");
    }
}
