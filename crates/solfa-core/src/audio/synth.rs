//! Command-driven synth running inside the output callback
//!
//! Control threads push `SynthCommand`s through a lock-free SPSC queue;
//! the audio callback drains the queue and renders additive sine voices
//! with exponential decay. Nothing in the render path allocates or locks.
//!
//! The metronome uses two pitches a semitone apart, a "tick" on accented
//! downbeats and a "tack" elsewhere, so the singer can hear the measure
//! without counting.

use crate::music;

/// Metronome "tack" pitch on ordinary beats (F5)
const CLICK_MIDI: i32 = 77;

/// Metronome "tick" pitch on accented downbeats (E5)
const ACCENT_CLICK_MIDI: i32 = 76;

const CLICK_DURATION_MS: u32 = 60;

/// Simultaneous voice cap; the oldest voice is stolen beyond it
const MAX_VOICES: usize = 16;

/// Capacity of the control-to-callback command queue
const COMMAND_CAPACITY: usize = 64;

/// Commands the control threads send into the output callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthCommand {
    /// Sound an instrument tone
    Note { midi_note: i32, duration_ms: u32 },
    /// Sound a metronome click
    Click { accented: bool },
}

/// Lock-free SPSC command queue into the audio callback
pub fn synth_channel() -> (rtrb::Producer<SynthCommand>, rtrb::Consumer<SynthCommand>) {
    rtrb::RingBuffer::new(COMMAND_CAPACITY)
}

/// One decaying sine voice
struct Voice {
    phase: f32,
    phase_inc: f32,
    amplitude: f32,
    decay: f32,
    remaining: u64,
}

impl Voice {
    fn new(frequency: f32, amplitude: f32, duration_samples: u64) -> Self {
        // ~80dB of decay across the nominal duration
        let decay = 1e-4f32.powf(1.0 / duration_samples.max(1) as f32);
        Self {
            phase: 0.0,
            phase_inc: frequency * std::f32::consts::TAU,
            amplitude,
            decay,
            remaining: duration_samples,
        }
    }
}

/// Additive sine synth owned by the output callback
pub struct Synth {
    sample_rate: u32,
    voices: Vec<Voice>,
    commands: rtrb::Consumer<SynthCommand>,
}

impl Synth {
    pub fn new(sample_rate: u32, commands: rtrb::Consumer<SynthCommand>) -> Self {
        Self {
            sample_rate,
            voices: Vec::with_capacity(MAX_VOICES),
            commands,
        }
    }

    fn spawn(&mut self, midi_note: i32, amplitude: f32, duration_ms: u32) {
        let frequency = music::hz_from_midi(midi_note);
        let duration_samples = self.sample_rate as u64 * duration_ms as u64 / 1000;
        if self.voices.len() >= MAX_VOICES {
            self.voices.remove(0);
        }
        self.voices.push(Voice::new(frequency, amplitude, duration_samples));
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                SynthCommand::Note { midi_note, duration_ms } => {
                    self.spawn(midi_note, 0.3, duration_ms);
                }
                SynthCommand::Click { accented } => {
                    let (midi, amplitude) = if accented {
                        (ACCENT_CLICK_MIDI, 0.5)
                    } else {
                        (CLICK_MIDI, 0.35)
                    };
                    self.spawn(midi, amplitude, CLICK_DURATION_MS);
                }
            }
        }
    }

    /// Render one mono buffer, mixing all live voices
    pub fn render(&mut self, out: &mut [f32]) {
        self.drain_commands();
        out.fill(0.0);

        let dt = 1.0 / self.sample_rate as f32;
        for voice in &mut self.voices {
            for sample in out.iter_mut() {
                if voice.remaining == 0 {
                    break;
                }
                *sample += voice.phase.sin() * voice.amplitude;
                voice.phase = (voice.phase + voice.phase_inc * dt) % std::f32::consts::TAU;
                voice.amplitude *= voice.decay;
                voice.remaining -= 1;
            }
        }
        self.voices.retain(|v| v.remaining > 0 && v.amplitude > 1e-4);

        // Headroom clamp; voices are quiet enough that this rarely bites
        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}
