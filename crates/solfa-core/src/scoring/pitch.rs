//! Pitch scoring: note-correctness gate, then intonation quality
//!
//! Two-phase by design. First decide whether the right note was sung at
//! all (fraction of voiced frames matching the expected MIDI note); only
//! then measure intonation in cents over the matching frames. A correct
//! note sung slightly out of tune must score very differently from a
//! wrong note sung in perfect tune, and wrong-note frames must never
//! pollute the cents statistics - they count as noise/vibrato excursions,
//! not as pitch errors.

use std::collections::HashMap;

use super::{PitchStatus, PitchTolerance};
use crate::pitch::PitchFrame;

/// Result of judging one note's pitch
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PitchScore {
    /// 0-100
    pub score: f32,
    pub status: PitchStatus,
    /// Mean cent deviation over matching frames (signed)
    pub avg_cent_deviation: f32,
    /// Standard deviation of cents over matching frames
    pub std_deviation: f32,
    /// Fraction of voiced frames on the expected note
    pub correct_ratio: f32,
}

impl PitchScore {
    fn not_evaluated() -> Self {
        Self::default()
    }
}

/// Judge accumulated frames against one expected note
///
/// `octave_offset` shifts the detected pitch down by whole octaves before
/// comparison, so a singer working an octave above the written line
/// (offset +1) is not judged sharp by 1200 cents.
pub fn score_pitch(
    frames: &[PitchFrame],
    expected_midi: i32,
    octave_offset: i32,
    tol: &PitchTolerance,
) -> PitchScore {
    let shifted: Vec<(i32, f32)> = frames
        .iter()
        .filter(|f| f.is_voiced)
        .map(|f| (f.midi_note - octave_offset * 12, f.cent_deviation))
        .collect();

    if shifted.len() < tol.min_frames {
        return PitchScore::not_evaluated();
    }

    let voiced_count = shifted.len();
    let matching: Vec<f32> = shifted
        .iter()
        .filter(|(midi, _)| *midi == expected_midi)
        .map(|(_, cents)| *cents)
        .collect();
    let correct_ratio = matching.len() as f32 / voiced_count as f32;

    // Phase 1: correctness gate
    if correct_ratio < tol.min_correct_ratio {
        return wrong_note_score(&shifted, expected_midi, correct_ratio);
    }

    // Phase 2: intonation over matching frames only
    let mean = matching.iter().sum::<f32>() / matching.len() as f32;
    let variance = matching
        .iter()
        .map(|c| (c - mean) * (c - mean))
        .sum::<f32>()
        / matching.len() as f32;
    let std_deviation = variance.sqrt();

    let abs_mean = mean.abs();
    let base = if abs_mean <= tol.excellent_cents {
        100.0
    } else if abs_mean <= tol.borderline_cents {
        // 100 at the excellent edge down to 60 at borderline
        let span = tol.borderline_cents - tol.excellent_cents;
        100.0 - (abs_mean - tol.excellent_cents) / span * 40.0
    } else {
        (60.0 - (abs_mean - tol.borderline_cents)).max(30.0)
    };

    let noise_fraction = 1.0 - correct_ratio;
    let penalty = (noise_fraction * 30.0).min(tol.max_noise_penalty);

    PitchScore {
        score: (base - penalty).clamp(0.0, 100.0),
        status: PitchStatus::Correct,
        avg_cent_deviation: mean,
        std_deviation,
        correct_ratio,
    }
}

/// Wrong-note verdict: status from the direction of the dominant sung
/// note, score from how many semitones off it was - cents are meaningless
/// when the note itself is wrong.
fn wrong_note_score(shifted: &[(i32, f32)], expected_midi: i32, correct_ratio: f32) -> PitchScore {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for (midi, _) in shifted {
        *counts.entry(*midi).or_insert(0) += 1;
    }
    // Tie-break toward the lower note so the verdict is deterministic
    let dominant = counts
        .iter()
        .max_by_key(|&(&midi, &count)| (count, -midi))
        .map(|(&midi, _)| midi)
        .unwrap_or(expected_midi);

    let diff = if dominant != expected_midi {
        dominant - expected_midi
    } else {
        // The expected note was the plurality but still under the ratio
        // gate; judge direction from the off-note frames instead
        let off_sum: i32 = shifted
            .iter()
            .filter(|(midi, _)| *midi != expected_midi)
            .map(|(midi, _)| midi - expected_midi)
            .sum();
        if off_sum >= 0 { 1 } else { -1 }
    };

    let status = if diff < 0 { PitchStatus::Flat } else { PitchStatus::Sharp };
    let distance = diff.unsigned_abs() as f32;
    let score = (35.0 - (distance - 1.0) * 10.0).clamp(5.0, 35.0);

    PitchScore {
        score,
        status,
        avg_cent_deviation: 0.0,
        std_deviation: 0.0,
        correct_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(midi: i32, cents: f32) -> PitchFrame {
        PitchFrame {
            frequency: 0.0,
            is_voiced: true,
            midi_note: midi,
            cent_deviation: cents,
            is_onset: false,
            is_offset: false,
            position: 0,
        }
    }

    fn frames(midi: i32, cents: f32, count: usize) -> Vec<PitchFrame> {
        vec![frame(midi, cents); count]
    }

    #[test]
    fn test_perfect_note_scores_100() {
        let result = score_pitch(&frames(60, 0.0, 20), 60, 0, &PitchTolerance::default());
        assert_eq!(result.score, 100.0);
        assert_eq!(result.status, PitchStatus::Correct);
        assert_eq!(result.correct_ratio, 1.0);
        assert_eq!(result.avg_cent_deviation, 0.0);
    }

    #[test]
    fn test_wrong_note_is_flat_and_low() {
        let result = score_pitch(&frames(58, 0.0, 20), 60, 0, &PitchTolerance::default());
        assert_eq!(result.status, PitchStatus::Flat);
        assert_eq!(result.correct_ratio, 0.0);
        assert!(result.score <= 35.0, "wrong note must score low, got {}", result.score);
    }

    #[test]
    fn test_wrong_note_sharp() {
        let result = score_pitch(&frames(63, 0.0, 20), 60, 0, &PitchTolerance::default());
        assert_eq!(result.status, PitchStatus::Sharp);
        assert!(result.score < 35.0);
    }

    #[test]
    fn test_further_wrong_scores_lower() {
        let near = score_pitch(&frames(59, 0.0, 20), 60, 0, &PitchTolerance::default());
        let far = score_pitch(&frames(55, 0.0, 20), 60, 0, &PitchTolerance::default());
        assert!(far.score < near.score);
    }

    #[test]
    fn test_too_few_frames_not_evaluated() {
        let result = score_pitch(&frames(60, 0.0, 3), 60, 0, &PitchTolerance::default());
        assert_eq!(result.status, PitchStatus::NotEvaluated);
        assert_eq!(result.score, 0.0);

        let silence: Vec<PitchFrame> = (0..50).map(PitchFrame::unvoiced).collect();
        let result = score_pitch(&silence, 60, 0, &PitchTolerance::default());
        assert_eq!(result.status, PitchStatus::NotEvaluated);
    }

    #[test]
    fn test_intonation_tiers() {
        let tol = PitchTolerance::default();
        let excellent = score_pitch(&frames(60, 20.0, 20), 60, 0, &tol);
        assert_eq!(excellent.score, 100.0);

        let middling = score_pitch(&frames(60, 40.0, 20), 60, 0, &tol);
        assert!(middling.score < 100.0 && middling.score >= 60.0);
        assert_eq!(middling.status, PitchStatus::Correct);
        assert!((middling.avg_cent_deviation - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_noise_frames_excluded_from_cents_but_penalized() {
        // 60% perfect frames on the note, 40% an octave-ish excursion:
        // still Correct, cents stay clean, score dips by the capped penalty
        let mut input = frames(60, 0.0, 12);
        input.extend(frames(65, 45.0, 8));
        let result = score_pitch(&input, 60, 0, &PitchTolerance::default());

        assert_eq!(result.status, PitchStatus::Correct);
        assert_eq!(result.avg_cent_deviation, 0.0);
        assert!(result.score >= 85.0, "penalty is capped at 15, got {}", result.score);
        assert!(result.score < 100.0);
        assert!((result.correct_ratio - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_octave_offset_shifts_comparison() {
        // Singing an octave up with offset +1 is correct
        let result = score_pitch(&frames(72, 0.0, 20), 60, 1, &PitchTolerance::default());
        assert_eq!(result.status, PitchStatus::Correct);
        assert_eq!(result.score, 100.0);

        // Same frames with no offset are a wrong (sharp) note
        let result = score_pitch(&frames(72, 0.0, 20), 60, 0, &PitchTolerance::default());
        assert_eq!(result.status, PitchStatus::Sharp);
    }

    #[test]
    fn test_unvoiced_frames_ignored() {
        let mut input = frames(60, 0.0, 10);
        input.extend((0..30).map(PitchFrame::unvoiced));
        let result = score_pitch(&input, 60, 0, &PitchTolerance::default());
        assert_eq!(result.status, PitchStatus::Correct);
        assert_eq!(result.correct_ratio, 1.0);
        assert_eq!(result.score, 100.0);
    }
}
