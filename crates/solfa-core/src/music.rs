//! Music theory utilities for pitch display and conversion
//!
//! MIDI/frequency conversions plus note-name and fixed-do solfège syllable
//! lookup for feedback display.

/// Reference frequency for A4 (MIDI 69)
pub const A4_HZ: f32 = 440.0;

/// MIDI note number for A4
pub const A4_MIDI: i32 = 69;

/// Frequency in Hz for a MIDI note number
pub fn hz_from_midi(midi: i32) -> f32 {
    A4_HZ * 2f32.powf((midi - A4_MIDI) as f32 / 12.0)
}

/// Exact (fractional) MIDI value for a frequency
///
/// Returns `None` for non-positive or non-finite frequencies.
pub fn exact_midi_from_hz(freq: f32) -> Option<f32> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    Some(A4_MIDI as f32 + 12.0 * (freq / A4_HZ).log2())
}

/// Nearest MIDI note and its cent deviation for a frequency
///
/// Cents are the fractional remainder scaled by 100, in `[-50, 50)`.
pub fn midi_and_cents_from_hz(freq: f32) -> Option<(i32, f32)> {
    let exact = exact_midi_from_hz(freq)?;
    let midi = exact.round();
    Some((midi as i32, (exact - midi) * 100.0))
}

/// Note name with octave, like "C4" or "F#3" (C4 = MIDI 60)
pub fn note_name(midi: i32) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let pc = midi.rem_euclid(12) as usize;
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", NAMES[pc], octave)
}

/// Fixed-do solfège syllable for a MIDI note (chromatic steps use the
/// raised form of the lower syllable)
pub fn solfege_syllable(midi: i32) -> &'static str {
    const SYLLABLES: [&str; 12] = [
        "Do", "Di", "Re", "Ri", "Mi", "Fa", "Fi", "Sol", "Si", "La", "Li", "Ti",
    ];
    SYLLABLES[midi.rem_euclid(12) as usize]
}

/// Format a cent deviation for display, e.g. "+12c" / "-3c"
pub fn format_cents(cents: f32) -> String {
    format!("{:+.0}c", cents)
}
