//! Audio device boundary
//!
//! The engine talks to hardware through two narrow traits: `NotePlayer`
//! (sound an instrument tone or a metronome click) and `CaptureSource`
//! (blocking mono reads from the microphone). cpal implementations live in
//! `cpal_backend`; tests substitute silent/synthetic ones.
//!
//! cpal streams are not `Send`, so stream objects never cross threads.
//! They ride inside keepalive handles owned by the thread that opened
//! them; dropping a handle stops the stream.

pub mod cpal_backend;
pub mod error;
pub mod synth;

pub use error::{AudioError, AudioResult};

use std::any::Any;

/// Sounds instrument notes and metronome clicks
///
/// Calls are fire-and-forget from the playback loop's point of view; the
/// implementation must not block.
pub trait NotePlayer: Send + Sync {
    fn play_midi_note(&self, midi_note: i32, duration_ms: u32);
    fn play_metronome_click(&self, accented: bool);
}

/// A player that makes no sound, for tests and silent listening mode
pub struct SilentPlayer;

impl NotePlayer for SilentPlayer {
    fn play_midi_note(&self, _midi_note: i32, _duration_ms: u32) {}
    fn play_metronome_click(&self, _accented: bool) {}
}

/// Blocking mono microphone reads
///
/// `read` fills as much of `buf` as is available, blocking briefly when
/// the device has nothing yet. A return of 0 means a short timeout
/// elapsed, giving the recording loop a chance to check its running flag.
pub trait CaptureSource: Send {
    fn read(&mut self, buf: &mut [f32]) -> usize;
    fn sample_rate(&self) -> u32;
}

/// Keeps a capture stream alive; drop to release the microphone
///
/// Deliberately not `Send`: the underlying stream stays on the thread
/// that opened it.
pub struct CaptureHandle {
    _keepalive: Option<Box<dyn Any>>,
}

impl CaptureHandle {
    pub fn new(keepalive: Box<dyn Any>) -> Self {
        Self { _keepalive: Some(keepalive) }
    }

    /// A handle with nothing to keep alive (synthetic sources)
    pub fn detached() -> Self {
        Self { _keepalive: None }
    }
}

/// An opened microphone: the movable read half plus the keepalive handle
pub struct OpenedCapture {
    pub source: Box<dyn CaptureSource>,
    pub handle: CaptureHandle,
}

/// Opens the microphone on demand
///
/// Opening is deferred to `start_listening` so playback-only use never
/// touches the input device; `permission_granted` is the cheap pre-check.
pub trait CaptureOpener: Send {
    fn permission_granted(&self) -> bool;
    fn open(&self) -> AudioResult<OpenedCapture>;
}
