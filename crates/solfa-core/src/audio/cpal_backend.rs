//! cpal implementations of the audio boundary
//!
//! Output: a stream whose callback owns the `Synth`, fed by the lock-free
//! command queue. `SynthHandle` is the thread-safe `NotePlayer` half;
//! `PlayerHandle` is the keepalive that pins the stream to its opening
//! thread.
//!
//! Input: the capture callback downmixes to mono and forwards blocks
//! through a bounded channel; `ChannelCaptureSource` turns that into the
//! blocking reads the recording loop wants. When the channel backs up the
//! callback drops the block rather than stall the device.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use crossbeam::channel::{bounded, Receiver};
use log::{info, warn};

use super::error::{AudioError, AudioResult};
use super::synth::{synth_channel, Synth, SynthCommand};
use super::{CaptureHandle, CaptureOpener, CaptureSource, NotePlayer, OpenedCapture};

/// Capture blocks buffered between the input callback and the reader
const CAPTURE_CHANNEL_BLOCKS: usize = 32;

const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Thread-safe `NotePlayer` writing into the output callback's queue
pub struct SynthHandle {
    producer: Mutex<rtrb::Producer<SynthCommand>>,
}

impl SynthHandle {
    fn send(&self, command: SynthCommand) {
        let mut producer = match self.producer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if producer.push(command).is_err() {
            warn!("synth command queue full, dropping {:?}", command);
        }
    }
}

impl NotePlayer for SynthHandle {
    fn play_midi_note(&self, midi_note: i32, duration_ms: u32) {
        self.send(SynthCommand::Note { midi_note, duration_ms });
    }

    fn play_metronome_click(&self, accented: bool) {
        self.send(SynthCommand::Click { accented });
    }
}

/// Keeps the output stream alive; drop to stop playback
///
/// Not `Send`; stays on the thread that called `start_note_player`.
pub struct PlayerHandle {
    _stream: Stream,
    sample_rate: u32,
}

impl PlayerHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Open the default output device and start the synth stream
pub fn start_note_player() -> AudioResult<(PlayerHandle, Arc<SynthHandle>)> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoOutputDevice)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;
    if supported.sample_format() != SampleFormat::F32 {
        return Err(AudioError::UnsupportedFormat(supported.sample_format().to_string()));
    }
    let channels = supported.channels() as usize;
    let sample_rate = supported.sample_rate().0;
    let config = supported.config();

    info!("Output device: {} ({} ch, {}Hz)", device_name, channels, sample_rate);

    let (command_tx, command_rx) = synth_channel();
    let mut synth = Synth::new(sample_rate, command_rx);
    let mut mono: Vec<f32> = Vec::new();

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _| {
                let frames = data.len() / channels;
                mono.resize(frames, 0.0);
                synth.render(&mut mono);
                for (frame, &sample) in data.chunks_mut(channels).zip(&mono) {
                    frame.fill(sample);
                }
            },
            |err| warn!("output stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    let handle = PlayerHandle { _stream: stream, sample_rate };
    let player = Arc::new(SynthHandle { producer: Mutex::new(command_tx) });
    Ok((handle, player))
}

/// Blocking-read adapter over the capture callback's channel
pub struct ChannelCaptureSource {
    receiver: Receiver<Vec<f32>>,
    pending: Vec<f32>,
    offset: usize,
    sample_rate: u32,
}

impl ChannelCaptureSource {
    pub fn new(receiver: Receiver<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            receiver,
            pending: Vec::new(),
            offset: 0,
            sample_rate,
        }
    }
}

impl CaptureSource for ChannelCaptureSource {
    fn read(&mut self, buf: &mut [f32]) -> usize {
        let mut written = 0;
        while written < buf.len() {
            if self.offset < self.pending.len() {
                let n = (self.pending.len() - self.offset).min(buf.len() - written);
                buf[written..written + n]
                    .copy_from_slice(&self.pending[self.offset..self.offset + n]);
                self.offset += n;
                written += n;
                continue;
            }
            match self.receiver.recv_timeout(READ_TIMEOUT) {
                Ok(block) => {
                    self.pending = block;
                    self.offset = 0;
                }
                Err(_) => break,
            }
        }
        written
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Opens the default input device
pub struct CpalCaptureOpener;

impl CaptureOpener for CpalCaptureOpener {
    fn permission_granted(&self) -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    fn open(&self) -> AudioResult<OpenedCapture> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(AudioError::NoInputDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = device
            .default_input_config()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?;
        if supported.sample_format() != SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(supported.sample_format().to_string()));
        }
        let channels = supported.channels() as usize;
        let sample_rate = supported.sample_rate().0;
        let config = supported.config();

        info!("Input device: {} ({} ch, {}Hz)", device_name, channels, sample_rate);

        let (tx, rx) = bounded::<Vec<f32>>(CAPTURE_CHANNEL_BLOCKS);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _| {
                    let mono: Vec<f32> = data
                        .chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                        .collect();
                    // Reader stalled; losing a block beats stalling the device
                    let _ = tx.try_send(mono);
                },
                |err| warn!("input stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;
        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        Ok(OpenedCapture {
            source: Box::new(ChannelCaptureSource::new(rx, sample_rate)),
            handle: CaptureHandle::new(Box::new(stream)),
        })
    }
}
