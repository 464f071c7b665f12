//! Terminal rendering of feedback snapshots

use std::io::Write;

use solfa_core::analysis::FeedbackState;
use solfa_core::music::{format_cents, note_name, solfege_syllable};
use solfa_core::scoring::PitchStatus;

/// One status line, rewritten in place while the exercise runs
pub fn print_live(state: &FeedbackState) {
    let note = state.notes.get(state.current_note);
    let label = note
        .map(|n| format!("{} ({})", solfege_syllable(n.midi_note), note_name(n.midi_note)))
        .unwrap_or_default();
    let voice = if state.voice_detected { "singing" } else { "  --   " };

    print!(
        "\r[{:?}] beat {:5.1}  note {}/{} {:12} {}  score {:5.1}  ",
        state.phase,
        state.beat_position,
        state.current_note + 1,
        state.notes.len(),
        label,
        voice,
        state.overall_score,
    );
    let _ = std::io::stdout().flush();
}

/// Per-note table plus totals, printed once at Completed
pub fn print_summary(state: &FeedbackState) {
    println!();
    println!();
    println!(
        "{:<4} {:<6} {:<5} {:>6} {:<13} {:>6} {:>7} {:<9}",
        "#", "note", "", "pitch", "", "cents", "timing", ""
    );
    for (i, note) in state.notes.iter().enumerate() {
        let cents = match note.pitch.status {
            PitchStatus::Correct => format_cents(note.pitch.avg_cent_deviation),
            _ => "-".to_string(),
        };
        println!(
            "{:<4} {:<6} {:<5} {:>6.1} {:<13} {:>6} {:>7.1} {:<9}",
            i + 1,
            solfege_syllable(note.midi_note),
            note_name(note.midi_note),
            note.pitch.score,
            note.pitch.status.label(),
            cents,
            note.timing.score,
            note.timing.status.label(),
        );
    }
    println!();
    println!(
        "overall: pitch {:.1}  timing {:.1}  combined {:.1}",
        state.overall_pitch, state.overall_timing, state.overall_score
    );
}
