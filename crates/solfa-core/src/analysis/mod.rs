//! Per-window analysis orchestration
//!
//! One `AnalysisEngine` per exercise attempt. Each analysis window flows
//! detector -> onset tagging -> per-note accumulation -> full rescore, and
//! the rescore covers every note, not just the current one, so consumers
//! always see the whole per-note history. Full recompute at ~100 Hz with a
//! handful of notes is cheap enough to keep real-time.

pub mod feedback;

pub use feedback::{feedback_queue, FeedbackPublisher, FeedbackReceiver, FeedbackState, NoteFeedback};

use log::debug;

use crate::clock::AudioClock;
use crate::pitch::{OnsetDetector, PitchDetector, PitchFrame};
use crate::schedule::ExpectedNote;
use crate::scoring::{score_pitch, score_timing, PitchStatus, PitchTolerance, TimingStatus, TimingTolerance};
use crate::types::{SolfegePhase, TimeSignature, ANALYSIS_WINDOW};

/// Accumulated evidence for one expected note
#[derive(Debug, Default)]
struct NoteProgress {
    frames: Vec<PitchFrame>,
    /// First detected voice onset inside this note's window
    onset_sample: Option<i64>,
    /// First detected voice offset after that onset
    offset_sample: Option<i64>,
}

impl NoteProgress {
    fn clear(&mut self) {
        self.frames.clear();
        self.onset_sample = None;
        self.offset_sample = None;
    }
}

/// Orchestrates pitch detection, onset tracking, and scoring
pub struct AnalysisEngine {
    detector: PitchDetector,
    onset: OnsetDetector,
    clock: AudioClock,
    notes: Vec<ExpectedNote>,
    progress: Vec<NoteProgress>,
    octave_offset: i32,
    pitch_tol: PitchTolerance,
    timing_tol: TimingTolerance,
    phase: SolfegePhase,
}

impl AnalysisEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            detector: PitchDetector::new(sample_rate, ANALYSIS_WINDOW),
            onset: OnsetDetector::new(),
            clock: AudioClock::new(sample_rate, 120.0, TimeSignature::new(4, 4)),
            notes: Vec::new(),
            progress: Vec::new(),
            octave_offset: 0,
            pitch_tol: PitchTolerance::default(),
            timing_tol: TimingTolerance::default(),
            phase: SolfegePhase::Idle,
        }
    }

    /// Freeze the expected notes and clock for one exercise attempt
    pub fn configure(&mut self, notes: Vec<ExpectedNote>, clock: AudioClock, octave_offset: i32) {
        debug!(
            "analysis configured: {} notes, tempo {}, octave offset {}",
            notes.len(),
            clock.tempo,
            octave_offset
        );
        self.progress = notes.iter().map(|_| NoteProgress::default()).collect();
        self.notes = notes;
        self.clock = clock;
        self.octave_offset = octave_offset;
        self.onset.reset();
    }

    /// Clear accumulators and detector state; configuration survives
    pub fn reset(&mut self) {
        for progress in &mut self.progress {
            progress.clear();
        }
        self.onset.reset();
    }

    /// The phase stamped into emitted snapshots
    pub fn set_phase(&mut self, phase: SolfegePhase) {
        self.phase = phase;
    }

    /// Analyze one window of captured audio starting at `position`
    pub fn process(&mut self, window: &[f32], position: i64) -> FeedbackState {
        let frame = self.detector.process(window, position);
        self.ingest(frame)
    }

    /// Index of the note whose window contains `position`, clamped past
    /// the end to the last note
    fn note_at(&self, position: i64) -> usize {
        self.notes
            .iter()
            .position(|note| position < note.end_sample)
            .unwrap_or(self.notes.len().saturating_sub(1))
    }

    fn ingest(&mut self, mut frame: PitchFrame) -> FeedbackState {
        let edge = self.onset.process(&frame);
        frame.is_onset = edge.is_onset;
        frame.is_offset = edge.is_offset;

        if !self.notes.is_empty() {
            let index = self.note_at(frame.position);
            self.progress[index].frames.push(frame);

            if edge.is_onset {
                let onset_note = self.note_at(edge.edge_position);
                let slot = &mut self.progress[onset_note].onset_sample;
                if slot.is_none() {
                    *slot = Some(edge.edge_position);
                }
            }
            if edge.is_offset {
                // The offset belongs to the note whose onset is still open
                if let Some(progress) = self
                    .progress
                    .iter_mut()
                    .rev()
                    .find(|p| p.onset_sample.is_some() && p.offset_sample.is_none())
                {
                    progress.offset_sample = Some(edge.edge_position);
                }
            }
        }

        self.snapshot(frame.position)
    }

    /// Score every note and assemble the full snapshot
    fn snapshot(&mut self, position: i64) -> FeedbackState {
        let current_note = self.note_at(position);
        let mut notes = Vec::with_capacity(self.notes.len());

        for (note, progress) in self.notes.iter().zip(&self.progress) {
            let pitch = score_pitch(&progress.frames, note.midi_note, self.octave_offset, &self.pitch_tol);
            let timing = score_timing(
                progress.onset_sample,
                progress.offset_sample,
                note,
                self.clock.sample_rate,
                &self.timing_tol,
            );
            notes.push(NoteFeedback {
                midi_note: note.midi_note,
                pitch,
                timing,
                completed: position >= note.end_sample,
                current: note.contains(position),
            });
        }

        let overall_pitch = mean(notes.iter().filter_map(|n| {
            (n.pitch.status != PitchStatus::NotEvaluated).then_some(n.pitch.score)
        }));
        // Untouched future notes are excluded; an elapsed note that was
        // never sung counts as zero
        let overall_timing = mean(notes.iter().filter_map(|n| {
            (n.timing.status != TimingStatus::NotPlayed || n.completed).then_some(n.timing.score)
        }));

        FeedbackState {
            sample_position: position,
            beat_position: self.clock.sample_to_beat(position),
            current_note,
            notes,
            overall_pitch,
            overall_timing,
            overall_score: (overall_pitch + overall_timing) / 2.0,
            voice_detected: self.onset.is_sounding(),
            phase: self.phase,
        }
    }
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let mut sum = 0.0;
    let mut count = 0u32;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 { 0.0 } else { sum / count as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{freeze_notes, NoteSpec};

    const HOP: i64 = 512;

    fn clock() -> AudioClock {
        AudioClock::new(44_100, 60.0, TimeSignature::new(4, 4))
    }

    fn one_note_engine() -> AnalysisEngine {
        let clock = clock();
        let specs = vec![NoteSpec { midi_note: 60, start_beat: 0.0, duration_beats: 1.0 }];
        let mut engine = AnalysisEngine::new(44_100);
        engine.configure(freeze_notes(&specs, &clock), clock, 0);
        engine
    }

    fn voiced(midi: i32, position: i64) -> PitchFrame {
        PitchFrame {
            frequency: 440.0,
            is_voiced: true,
            midi_note: midi,
            cent_deviation: 0.0,
            is_onset: false,
            is_offset: false,
            position,
        }
    }

    /// One note at 60 BPM spans samples 0..44100. Perfect frames across
    /// the whole window, silence after: both scores reach 100.
    #[test]
    fn test_perfect_take_scores_100() {
        let mut engine = one_note_engine();

        let mut state = FeedbackState::default();
        let mut position = 0i64;
        while position < 44_100 {
            state = engine.ingest(voiced(60, position));
            position += HOP;
        }
        for _ in 0..6 {
            state = engine.ingest(PitchFrame::unvoiced(position));
            position += HOP;
        }

        let note = &state.notes[0];
        assert_eq!(note.pitch.status, PitchStatus::Correct);
        assert_eq!(note.pitch.score, 100.0);
        assert_eq!(note.timing.status, TimingStatus::OnTime);
        assert_eq!(note.timing.score, 100.0);
        assert_eq!(state.overall_pitch, 100.0);
        assert_eq!(state.overall_timing, 100.0);
        assert_eq!(state.overall_score, 100.0);
        assert!(note.completed);
    }

    #[test]
    fn test_offset_attaches_to_open_note() {
        let mut engine = one_note_engine();
        let mut position = 0i64;
        while position < 44_100 {
            engine.ingest(voiced(60, position));
            position += HOP;
        }
        // Offset confirmed past the note's end still closes it
        for _ in 0..3 {
            engine.ingest(PitchFrame::unvoiced(position));
            position += HOP;
        }
        assert_eq!(engine.progress[0].onset_sample, Some(0));
        assert_eq!(engine.progress[0].offset_sample, Some(44_544));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let clock = clock();
        let specs = vec![
            NoteSpec { midi_note: 60, start_beat: 0.0, duration_beats: 1.0 },
            NoteSpec { midi_note: 62, start_beat: 1.0, duration_beats: 1.0 },
        ];
        let notes = freeze_notes(&specs, &clock);

        let mut fresh = AnalysisEngine::new(44_100);
        fresh.configure(notes.clone(), clock, 0);

        let mut reused = AnalysisEngine::new(44_100);
        reused.configure(notes, clock, 0);
        // Pollute with a different take, then reset
        for i in 0..40 {
            reused.ingest(voiced(58, i * HOP));
        }
        reused.reset();

        let mut last_fresh = FeedbackState::default();
        let mut last_reused = FeedbackState::default();
        for i in 0..40 {
            last_fresh = fresh.ingest(voiced(60, i * HOP));
            last_reused = reused.ingest(voiced(60, i * HOP));
        }
        assert_eq!(last_fresh, last_reused);
    }

    #[test]
    fn test_position_past_end_maps_to_last_note() {
        let mut engine = one_note_engine();
        let state = engine.ingest(PitchFrame::unvoiced(1_000_000));
        assert_eq!(state.current_note, 0);
        assert!(state.notes[0].completed);
        assert!(!state.notes[0].current);
    }

    #[test]
    fn test_unplayed_elapsed_note_drags_timing_down() {
        let clock = clock();
        let specs = vec![
            NoteSpec { midi_note: 60, start_beat: 0.0, duration_beats: 1.0 },
            NoteSpec { midi_note: 62, start_beat: 1.0, duration_beats: 1.0 },
        ];
        let mut engine = AnalysisEngine::new(44_100);
        engine.configure(freeze_notes(&specs, &clock), clock, 0);

        // Sing only the second note
        let mut state = FeedbackState::default();
        let mut position = 44_100i64;
        while position < 88_200 {
            state = engine.ingest(voiced(62, position));
            position += HOP;
        }

        assert_eq!(state.notes[0].timing.status, TimingStatus::NotPlayed);
        assert_eq!(state.notes[1].timing.status, TimingStatus::OnTime);
        // First note elapsed unplayed, so it averages in as zero
        assert!(state.overall_timing < state.notes[1].timing.score);
    }

    #[test]
    fn test_snapshot_carries_clock_and_phase() {
        let mut engine = one_note_engine();
        engine.set_phase(SolfegePhase::Listening);
        let state = engine.ingest(voiced(60, 22_050));
        assert_eq!(state.phase, SolfegePhase::Listening);
        assert_eq!(state.sample_position, 22_050);
        assert!((state.beat_position - 0.5).abs() < 1e-9);
        assert!(state.notes[0].current);
    }

    /// Real signal path: detector + onset + scoring from raw samples
    #[test]
    fn test_process_detects_sung_note_from_samples() {
        let mut engine = one_note_engine();
        // C4 fundamental
        let freq = 261.626f32;
        let window: Vec<f32> = (0..ANALYSIS_WINDOW)
            .map(|i| (i as f32 * freq * 2.0 * std::f32::consts::PI / 44_100.0).sin() * 0.5)
            .collect();

        let mut state = FeedbackState::default();
        for i in 0..20 {
            state = engine.process(&window, i * HOP);
        }
        assert!(state.voice_detected);
        assert_eq!(state.notes[0].pitch.status, PitchStatus::Correct);
        assert!(state.notes[0].pitch.score > 60.0);
    }
}
