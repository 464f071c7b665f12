//! Timing scoring: attack placement and hold duration
//!
//! Attack and duration each contribute up to 50 points. The attack window
//! is asymmetric (singers anticipate the beat more than they drag behind
//! it) and a note whose offset has not arrived yet earns partial sustain
//! credit rather than a duration of zero, so live feedback does not
//! punish a note for still being sung.

use super::{TimingStatus, TimingTolerance};
use crate::schedule::ExpectedNote;

/// Result of judging one note's timing
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimingScore {
    /// 0-100, attack + duration
    pub score: f32,
    pub status: TimingStatus,
    /// 0-50
    pub attack_score: f32,
    /// 0-50
    pub duration_score: f32,
    /// Signed onset error in ms (negative means early)
    pub onset_deviation_ms: f32,
    /// Sung/expected duration ratio (0 until an offset exists)
    pub duration_ratio: f32,
}

/// Judge detected onset/offset samples against one expected note
///
/// `onset` and `offset` are absolute sample positions from the voice-edge
/// detector; `None` means the edge has not been observed.
pub fn score_timing(
    onset: Option<i64>,
    offset: Option<i64>,
    note: &ExpectedNote,
    sample_rate: u32,
    tol: &TimingTolerance,
) -> TimingScore {
    let onset = match onset {
        Some(onset) => onset,
        None => return TimingScore::default(),
    };

    let ms_per_sample = 1000.0 / sample_rate as f32;
    let deviation_ms = (onset - note.start_sample) as f32 * ms_per_sample;

    let (status, attack_score) = if deviation_ms < -tol.early_ms {
        let excess = -deviation_ms - tol.early_ms;
        (TimingStatus::Early, (50.0 - excess * tol.attack_slope).max(tol.attack_floor))
    } else if deviation_ms > tol.late_ms {
        let excess = deviation_ms - tol.late_ms;
        (TimingStatus::Late, (50.0 - excess * tol.attack_slope).max(tol.attack_floor))
    } else {
        (TimingStatus::OnTime, 50.0)
    };

    let (duration_score, duration_ratio) = match offset {
        None => (tol.sustain_credit, 0.0),
        Some(offset) => {
            let sung = (offset - onset).max(0) as f32;
            let ratio = sung / note.duration_samples.max(1) as f32;
            let score = if ratio >= tol.ideal_duration_ratio {
                50.0
            } else if ratio >= tol.mid_duration_ratio {
                // Half credit at the mid ratio up to full at the ideal
                let span = tol.ideal_duration_ratio - tol.mid_duration_ratio;
                25.0 + (ratio - tol.mid_duration_ratio) / span * 25.0
            } else {
                (ratio / tol.mid_duration_ratio * 25.0).max(tol.duration_floor)
            };
            (score, ratio)
        }
    };

    TimingScore {
        score: attack_score + duration_score,
        status,
        attack_score,
        duration_score,
        onset_deviation_ms: deviation_ms,
        duration_ratio,
    }
}
