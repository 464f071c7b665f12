//! SolfegeEngine - sample-accurate exercise orchestration
//!
//! Three loops share one exercise, all sequenced from a single atomic
//! sample counter:
//!
//! - **playback** owns the counter and the schedule. Once per buffer
//!   period it fires due events, advances the counter, and sleeps. It is
//!   the only writer of the counter and the phase.
//! - **recording** blocks on microphone reads and pushes captured frames
//!   into the ring, tagged with the counter snapshot at read time.
//! - **analysis** drains the ring in hop-sized steps, slides a full
//!   analysis window over it, and publishes feedback snapshots.
//!
//! Cancellation is cooperative via the shared running flag; `stop` joins
//! every worker and drops the microphone handle before returning.

pub mod atomics;

pub use atomics::EngineAtomics;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::analysis::{feedback_queue, AnalysisEngine, FeedbackPublisher, FeedbackReceiver};
use crate::audio::{CaptureHandle, CaptureOpener, CaptureSource, NotePlayer};
use crate::clock::AudioClock;
use crate::error::{ConfigError, EngineError, EngineResult};
use crate::ring::{tagged_ring, RingConsumer, RingProducer};
use crate::schedule::{freeze_notes, NoteSpec, Schedule, ScheduledEvent};
use crate::types::{SolfegePhase, TimeSignature, ANALYSIS_WINDOW, BUFFER_FRAMES};

/// Ring capacity in seconds of audio; covers a briefly stalled analysis
/// thread without loss
const RING_SECONDS: u32 = 2;

/// Feedback snapshots buffered for a slow consumer
const FEEDBACK_CAPACITY: usize = 64;

/// Frozen state for one configured exercise
struct Exercise {
    clock: AudioClock,
    notes: Vec<crate::schedule::ExpectedNote>,
    octave_offset: i32,
}

/// The top-level engine
///
/// Owns the hardware collaborators and the worker threads. Dropping the
/// engine stops everything.
pub struct SolfegeEngine {
    player: Arc<dyn NotePlayer>,
    opener: Box<dyn CaptureOpener>,
    sample_rate: u32,
    atomics: Arc<EngineAtomics>,
    exercise: Option<Exercise>,
    publisher: FeedbackPublisher,
    receiver: Option<FeedbackReceiver>,
    workers: Vec<JoinHandle<()>>,
    capture: Option<CaptureHandle>,
}

impl SolfegeEngine {
    pub fn new(player: Arc<dyn NotePlayer>, opener: Box<dyn CaptureOpener>, sample_rate: u32) -> Self {
        let (publisher, receiver) = feedback_queue(FEEDBACK_CAPACITY);
        Self {
            player,
            opener,
            sample_rate,
            atomics: Arc::new(EngineAtomics::new()),
            exercise: None,
            publisher,
            receiver: Some(receiver),
            workers: Vec::new(),
            capture: None,
        }
    }

    /// Consumer half of the feedback queue; available once per engine
    pub fn take_feedback(&mut self) -> Option<FeedbackReceiver> {
        self.receiver.take()
    }

    /// Shared atomics for lock-free reads from other threads
    pub fn atomics(&self) -> Arc<EngineAtomics> {
        Arc::clone(&self.atomics)
    }

    pub fn phase(&self) -> SolfegePhase {
        self.atomics.phase()
    }

    /// Clock at the current counter value, if configured
    pub fn clock(&self) -> Option<AudioClock> {
        self.exercise
            .as_ref()
            .map(|ex| ex.clock.at_sample(self.atomics.position()))
    }

    /// Validate and freeze an exercise; stops any running attempt
    pub fn configure(
        &mut self,
        notes: &[NoteSpec],
        tempo: f64,
        time_signature: TimeSignature,
        octave_offset: i32,
    ) -> EngineResult<()> {
        if notes.is_empty() {
            return Err(ConfigError::EmptyExercise.into());
        }
        if !(tempo > 0.0 && tempo.is_finite()) {
            return Err(ConfigError::InvalidTempo(tempo).into());
        }
        if time_signature.numerator == 0 {
            return Err(ConfigError::InvalidTimeSignature.into());
        }

        self.stop();

        let clock = AudioClock::new(self.sample_rate, tempo, time_signature);
        let frozen = freeze_notes(notes, &clock);
        info!(
            "configured exercise: {} notes, {} BPM, {}, octave offset {}",
            frozen.len(),
            tempo,
            time_signature,
            octave_offset
        );
        self.exercise = Some(Exercise { clock, notes: frozen, octave_offset });
        self.atomics.store_position(0);
        self.atomics.set_current_note(0);
        Ok(())
    }

    /// Begin a playback (demo) run: metronome always, piano optionally
    pub fn start_playback(&mut self, play_piano: bool) -> EngineResult<()> {
        self.begin(SolfegePhase::Playing, play_piano)?;
        match self.playback_worker(SolfegePhase::Playing, play_piano) {
            Ok(playback) => {
                self.workers.push(playback);
                Ok(())
            }
            Err(e) => {
                self.stop();
                Err(e)
            }
        }
    }

    /// Begin a listening run: metronome plus live microphone analysis
    ///
    /// The microphone is acquired before any state changes, so a capture
    /// failure leaves the engine Idle with nothing running.
    pub fn start_listening(&mut self) -> EngineResult<()> {
        let exercise = self.exercise.as_ref().ok_or(EngineError::NotConfigured)?;
        if self.atomics.running() {
            return Err(EngineError::AlreadyRunning);
        }
        if !self.opener.permission_granted() {
            return Err(crate::audio::AudioError::PermissionDenied.into());
        }
        let opened = self.opener.open()?;
        if opened.source.sample_rate() != self.sample_rate {
            warn!(
                "capture rate {}Hz differs from engine rate {}Hz",
                opened.source.sample_rate(),
                self.sample_rate
            );
        }

        let (ring_tx, ring_rx) = tagged_ring(self.sample_rate as usize * RING_SECONDS as usize);
        let mut analysis = AnalysisEngine::new(self.sample_rate);
        analysis.configure(exercise.notes.clone(), exercise.clock, exercise.octave_offset);

        self.begin(SolfegePhase::Listening, false)?;
        let spawned = self
            .playback_worker(SolfegePhase::Listening, false)
            .and_then(|playback| {
                let recording = self.recording_worker(opened.source, ring_tx)?;
                let analysis = self.analysis_worker(analysis, ring_rx)?;
                Ok(vec![playback, recording, analysis])
            });
        match spawned {
            Ok(workers) => {
                self.workers.extend(workers);
                self.capture = Some(opened.handle);
                Ok(())
            }
            Err(e) => {
                // Microphone handle drops here, releasing the device
                self.stop();
                Err(e)
            }
        }
    }

    /// Cancel all loops, join them, and release the microphone
    ///
    /// Idempotent; safe to call from any state.
    pub fn stop(&mut self) {
        self.atomics.set_running(false);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        self.capture = None;
        self.atomics.set_phase(SolfegePhase::Idle);
    }

    /// Stop and drop audio resources
    pub fn release(&mut self) {
        self.stop();
    }

    /// Common start bookkeeping: counter to one measure before the
    /// downbeat, phase to Countdown
    fn begin(&mut self, mode: SolfegePhase, play_piano: bool) -> EngineResult<()> {
        let samples_per_measure = self
            .exercise
            .as_ref()
            .ok_or(EngineError::NotConfigured)?
            .clock
            .samples_per_measure();
        if self.atomics.running() {
            return Err(EngineError::AlreadyRunning);
        }
        // Joins any workers left over from a completed run
        self.stop();

        let start = -(samples_per_measure.round() as i64);
        debug!("starting {:?} (piano {}), countdown from sample {}", mode, play_piano, start);
        self.atomics.store_position(start);
        self.atomics.set_current_note(0);
        self.atomics.set_phase(SolfegePhase::Countdown);
        self.atomics.set_running(true);
        Ok(())
    }

    fn playback_worker(&self, mode: SolfegePhase, play_piano: bool) -> EngineResult<JoinHandle<()>> {
        let exercise = self.exercise.as_ref().ok_or(EngineError::NotConfigured)?;
        let schedule = Schedule::build(&exercise.clock, &exercise.notes);
        let atomics = Arc::clone(&self.atomics);
        let player = Arc::clone(&self.player);
        let sample_rate = self.sample_rate;

        thread::Builder::new()
            .name("solfa-playback".into())
            .spawn(move || run_playback(atomics, schedule, player, mode, play_piano, sample_rate))
            .map_err(|e| EngineError::ThreadSpawn("playback", e.to_string()))
    }

    fn recording_worker(
        &self,
        source: Box<dyn CaptureSource>,
        producer: RingProducer,
    ) -> EngineResult<JoinHandle<()>> {
        let atomics = Arc::clone(&self.atomics);
        thread::Builder::new()
            .name("solfa-recording".into())
            .spawn(move || run_recording(atomics, source, producer))
            .map_err(|e| EngineError::ThreadSpawn("recording", e.to_string()))
    }

    fn analysis_worker(
        &self,
        engine: AnalysisEngine,
        consumer: RingConsumer,
    ) -> EngineResult<JoinHandle<()>> {
        let atomics = Arc::clone(&self.atomics);
        let publisher = self.publisher.clone();
        thread::Builder::new()
            .name("solfa-analysis".into())
            .spawn(move || run_analysis(atomics, engine, consumer, publisher))
            .map_err(|e| EngineError::ThreadSpawn("analysis", e.to_string()))
    }
}

impl Drop for SolfegeEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The playback loop: sole writer of the counter and phase
fn run_playback(
    atomics: Arc<EngineAtomics>,
    mut schedule: Schedule,
    player: Arc<dyn NotePlayer>,
    mode: SolfegePhase,
    play_piano: bool,
    sample_rate: u32,
) {
    let period = Duration::from_secs_f64(BUFFER_FRAMES as f64 / sample_rate as f64);
    let end_sample = schedule.end_sample();

    while atomics.running() {
        let current = atomics.position();

        if atomics.phase() == SolfegePhase::Countdown && current >= 0 {
            debug!("countdown over, entering {:?}", mode);
            atomics.set_phase(mode);
        }

        for timed in schedule.due(current) {
            match timed.event {
                ScheduledEvent::Countdown { .. } => {
                    player.play_metronome_click(true);
                }
                ScheduledEvent::MetronomeClick { accented, .. } => {
                    player.play_metronome_click(accented);
                }
                ScheduledEvent::Note { midi_note, note_index } => {
                    atomics.set_current_note(note_index);
                    // In listening mode the note only moves the pointer
                    if play_piano && mode == SolfegePhase::Playing {
                        let duration_ms =
                            (timed.duration_samples * 1000 / sample_rate as i64) as u32;
                        player.play_midi_note(midi_note, duration_ms);
                    }
                }
            }
        }

        if current > end_sample {
            info!("exercise complete at sample {}", current);
            atomics.set_phase(SolfegePhase::Completed);
            atomics.set_running(false);
            break;
        }

        atomics.store_position(current + BUFFER_FRAMES as i64);
        thread::sleep(period);
    }
}

/// Captured-stream positions may drift this far from the counter before
/// the recording loop resynchronizes
const RESYNC_SLACK: i64 = 2 * ANALYSIS_WINDOW as i64;

/// The recording loop: capture reads tagged with stream positions
///
/// Positions run contiguously from a counter snapshot so the analysis
/// window sees an unbroken stream; the counter is only consulted again
/// when the stream drifts past the slack (device stall, clock skew).
fn run_recording(atomics: Arc<EngineAtomics>, mut source: Box<dyn CaptureSource>, mut producer: RingProducer) {
    let mut buf = vec![0.0f32; BUFFER_FRAMES];
    let mut next_position: Option<i64> = None;
    while atomics.running() {
        let n = source.read(&mut buf);
        if n == 0 {
            // Timed-out read; loop around to re-check the running flag
            continue;
        }
        let counter = atomics.position();
        let position = match next_position {
            Some(p) if (p - counter).abs() < RESYNC_SLACK => p,
            _ => counter,
        };
        producer.push(&buf[..n], position);
        next_position = Some(position + n as i64);
    }
}

/// The analysis loop: slide a full window over hop-sized ring drains
fn run_analysis(
    atomics: Arc<EngineAtomics>,
    mut engine: AnalysisEngine,
    mut consumer: RingConsumer,
    publisher: FeedbackPublisher,
) {
    let mut hop = vec![0.0f32; BUFFER_FRAMES];
    let mut hop_positions = vec![0i64; BUFFER_FRAMES];
    let mut window: Vec<f32> = Vec::with_capacity(ANALYSIS_WINDOW + BUFFER_FRAMES);
    let mut window_start: i64 = 0;

    while atomics.running() {
        let n = consumer.pop(&mut hop, &mut hop_positions);
        if n == 0 {
            thread::sleep(Duration::from_millis(2));
            continue;
        }

        // A gap means the producer lapped us; restart the window
        if !window.is_empty() && hop_positions[0] != window_start + window.len() as i64 {
            debug!("capture gap at sample {}, window restarted", hop_positions[0]);
            window.clear();
        }
        if window.is_empty() {
            window_start = hop_positions[0];
        }
        window.extend_from_slice(&hop[..n]);

        while window.len() >= ANALYSIS_WINDOW {
            engine.set_phase(atomics.phase());
            let state = engine.process(&window[..ANALYSIS_WINDOW], window_start);
            publisher.publish(state);
            window.drain(..BUFFER_FRAMES);
            window_start += BUFFER_FRAMES as i64;
        }
    }
}
