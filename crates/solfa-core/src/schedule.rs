//! Exercise schedule - frozen note bounds and timed audio events
//!
//! At configure time the expected-note list and the full event timeline
//! (countdown beeps, metronome clicks, note triggers) are derived from the
//! clock in effect and then frozen. Nothing recomputes note bounds
//! mid-exercise; recomputing against a drifting clock would move the
//! goalposts under the singer.
//!
//! Countdown events legitimately carry negative positions: they fill the
//! measure before sample 0, the downbeat.

use crate::clock::AudioClock;

/// One note of an exercise as supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NoteSpec {
    /// MIDI note number
    pub midi_note: i32,
    /// Start position in beats from the downbeat
    pub start_beat: f64,
    /// Length in beats
    pub duration_beats: f64,
}

/// An expected note with sample bounds frozen at configure time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpectedNote {
    /// Index in the exercise (0-based)
    pub id: usize,
    pub midi_note: i32,
    pub start_beat: f64,
    pub duration_beats: f64,
    /// First sample of the note window
    pub start_sample: i64,
    pub duration_samples: i64,
    /// One past the last sample of the note window
    pub end_sample: i64,
}

impl ExpectedNote {
    /// Freeze a spec against the configured clock
    pub fn freeze(id: usize, spec: &NoteSpec, clock: &AudioClock) -> Self {
        let start_sample = clock.beat_to_sample(spec.start_beat);
        let end_sample = clock.beat_to_sample(spec.start_beat + spec.duration_beats);
        Self {
            id,
            midi_note: spec.midi_note,
            start_beat: spec.start_beat,
            duration_beats: spec.duration_beats,
            start_sample,
            duration_samples: end_sample - start_sample,
            end_sample,
        }
    }

    /// Whether a sample position falls inside this note's window
    pub fn contains(&self, sample: i64) -> bool {
        sample >= self.start_sample && sample < self.end_sample
    }
}

/// What a scheduled event does when it fires
///
/// Closed variant set, dispatched by exhaustive match in the playback loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledEvent {
    /// Count-in beep in the measure before the downbeat (1-based count)
    Countdown { count: u32 },
    /// Metronome click; accented on beat 1 of each measure
    MetronomeClick { accented: bool, beat: i64 },
    /// Expected-note trigger. Sounds the instrument only in piano-demo
    /// mode; in listening mode it just advances the current-note pointer.
    Note { midi_note: i32, note_index: usize },
}

/// An event pinned to an absolute sample position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    /// Absolute sample position (negative for countdown events)
    pub position: i64,
    pub duration_samples: i64,
    pub event: ScheduledEvent,
}

/// The full immutable event timeline for one exercise
///
/// Events are sorted by position and fire at most once; the `triggered`
/// bitmap tracks which already have.
pub struct Schedule {
    events: Vec<TimedEvent>,
    triggered: Vec<bool>,
    end_sample: i64,
}

impl Schedule {
    /// Build the timeline: one countdown beep per beat of the lead-in
    /// measure, one click per beat spanning the exercise, one note trigger
    /// per expected note.
    pub fn build(clock: &AudioClock, notes: &[ExpectedNote]) -> Self {
        let beats_per_measure = clock.time_signature.numerator as i64;
        let spb = clock.samples_per_beat();
        let click_len = (spb * 0.25) as i64;

        let mut events = Vec::new();

        // Count-in: one measure of beeps before sample 0
        for count in 1..=beats_per_measure {
            let beat = count as f64 - beats_per_measure as f64;
            events.push(TimedEvent {
                position: clock.beat_to_sample(beat),
                duration_samples: click_len,
                event: ScheduledEvent::Countdown { count: count as u32 },
            });
        }

        // Metronome clicks spanning the exercise
        let end_beat = notes
            .iter()
            .map(|n| n.start_beat + n.duration_beats)
            .fold(0.0f64, f64::max);
        let total_beats = end_beat.ceil() as i64;
        for beat in 0..total_beats {
            events.push(TimedEvent {
                position: clock.beat_to_sample(beat as f64),
                duration_samples: click_len,
                event: ScheduledEvent::MetronomeClick {
                    accented: beat % beats_per_measure == 0,
                    beat,
                },
            });
        }

        // Note triggers
        for note in notes {
            events.push(TimedEvent {
                position: note.start_sample,
                duration_samples: note.duration_samples,
                event: ScheduledEvent::Note {
                    midi_note: note.midi_note,
                    note_index: note.id,
                },
            });
        }

        events.sort_by_key(|e| e.position);
        let triggered = vec![false; events.len()];
        let end_sample = notes.iter().map(|n| n.end_sample).max().unwrap_or(0);

        Self { events, triggered, end_sample }
    }

    /// All events in timeline order
    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    /// Sample position at which the exercise is over
    pub fn end_sample(&self) -> i64 {
        self.end_sample
    }

    /// Fire every not-yet-triggered event at or before `current`
    ///
    /// Each event fires exactly once across the exercise's lifetime.
    pub fn due(&mut self, current: i64) -> Vec<TimedEvent> {
        let mut fired = Vec::new();
        for (i, event) in self.events.iter().enumerate() {
            if event.position > current {
                break;
            }
            if !self.triggered[i] {
                self.triggered[i] = true;
                fired.push(*event);
            }
        }
        fired
    }

    /// Forget trigger state (for replaying the same exercise)
    pub fn reset_triggers(&mut self) {
        self.triggered.fill(false);
    }
}

/// Freeze a caller-supplied note list against the configured clock
pub fn freeze_notes(specs: &[NoteSpec], clock: &AudioClock) -> Vec<ExpectedNote> {
    specs
        .iter()
        .enumerate()
        .map(|(id, spec)| ExpectedNote::freeze(id, spec, clock))
        .collect()
}
