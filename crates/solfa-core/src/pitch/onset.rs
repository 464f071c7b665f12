//! Voice onset/offset detection across analysis windows
//!
//! Watches the voiced/unvoiced stream from the pitch detector and decides
//! when the voice actually started or stopped. A single-frame threshold
//! would retrigger on every vibrato wobble or dropout, so both edges
//! require a short sustained run of frames (hysteresis). One sustained
//! note produces exactly one onset.

use super::PitchFrame;

/// Consecutive voiced windows required to report an onset (~35ms)
const ONSET_RUN: u32 = 3;

/// Consecutive unvoiced windows required to report an offset (~35ms)
const OFFSET_RUN: u32 = 3;

/// Edge decision for one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoiceEdge {
    pub is_onset: bool,
    pub is_offset: bool,
    /// Position of the first frame of the run that confirmed the edge
    pub edge_position: i64,
}

/// Stateful onset/offset detector, one instance per exercise attempt
#[derive(Debug, Default)]
pub struct OnsetDetector {
    in_note: bool,
    voiced_run: u32,
    unvoiced_run: u32,
    /// Where the current voiced (or unvoiced) run began
    run_start: i64,
}

impl OnsetDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all history (start of a new attempt)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether the detector currently considers the voice sounding
    pub fn is_sounding(&self) -> bool {
        self.in_note
    }

    /// Feed one frame; returns the edge decision for this window
    ///
    /// The reported `edge_position` is the start of the confirming run,
    /// not the window where the hysteresis finally tripped, so the onset
    /// sample reflects when the voice really began.
    pub fn process(&mut self, frame: &PitchFrame) -> VoiceEdge {
        let mut edge = VoiceEdge::default();

        if frame.is_voiced {
            if self.voiced_run == 0 {
                self.run_start = frame.position;
            }
            self.voiced_run += 1;
            self.unvoiced_run = 0;

            if !self.in_note && self.voiced_run >= ONSET_RUN {
                self.in_note = true;
                edge.is_onset = true;
                edge.edge_position = self.run_start;
            }
        } else {
            if self.unvoiced_run == 0 {
                self.run_start = frame.position;
            }
            self.unvoiced_run += 1;
            self.voiced_run = 0;

            if self.in_note && self.unvoiced_run >= OFFSET_RUN {
                self.in_note = false;
                edge.is_offset = true;
                edge.edge_position = self.run_start;
            }
        }

        edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voiced(position: i64) -> PitchFrame {
        PitchFrame {
            frequency: 220.0,
            is_voiced: true,
            midi_note: 57,
            cent_deviation: 0.0,
            is_onset: false,
            is_offset: false,
            position,
        }
    }

    fn unvoiced(position: i64) -> PitchFrame {
        PitchFrame::unvoiced(position)
    }

    #[test]
    fn test_onset_requires_sustained_voicing() {
        let mut detector = OnsetDetector::new();

        assert!(!detector.process(&voiced(0)).is_onset);
        assert!(!detector.process(&voiced(512)).is_onset);
        let edge = detector.process(&voiced(1024));
        assert!(edge.is_onset);
        assert_eq!(edge.edge_position, 0);
        assert!(detector.is_sounding());
    }

    #[test]
    fn test_single_voiced_blip_ignored() {
        let mut detector = OnsetDetector::new();

        assert!(!detector.process(&voiced(0)).is_onset);
        assert!(!detector.process(&unvoiced(512)).is_onset);
        assert!(!detector.process(&voiced(1024)).is_onset);
        assert!(!detector.process(&unvoiced(1536)).is_onset);
        assert!(!detector.is_sounding());
    }

    #[test]
    fn test_one_sustained_note_one_onset() {
        let mut detector = OnsetDetector::new();
        let mut onsets = 0;
        for i in 0..100 {
            if detector.process(&voiced(i * 512)).is_onset {
                onsets += 1;
            }
        }
        assert_eq!(onsets, 1);
    }

    #[test]
    fn test_short_dropout_does_not_retrigger() {
        let mut detector = OnsetDetector::new();
        let mut position = 0i64;
        let mut feed = |det: &mut OnsetDetector, voiced_frame: bool| {
            let frame = if voiced_frame { voiced(position) } else { unvoiced(position) };
            position += 512;
            det.process(&frame)
        };

        let mut onsets = 0;
        let mut offsets = 0;
        // 10 voiced, 1 dropout, 10 voiced: still one note
        for step in 0..21 {
            let edge = feed(&mut detector, step != 10);
            onsets += edge.is_onset as u32;
            offsets += edge.is_offset as u32;
        }
        assert_eq!(onsets, 1);
        assert_eq!(offsets, 0);
    }

    #[test]
    fn test_offset_after_sustained_silence() {
        let mut detector = OnsetDetector::new();
        for i in 0..5 {
            detector.process(&voiced(i * 512));
        }
        assert!(detector.is_sounding());

        assert!(!detector.process(&unvoiced(5 * 512)).is_offset);
        assert!(!detector.process(&unvoiced(6 * 512)).is_offset);
        let edge = detector.process(&unvoiced(7 * 512));
        assert!(edge.is_offset);
        assert_eq!(edge.edge_position, 5 * 512);
        assert!(!detector.is_sounding());
    }

    #[test]
    fn test_reset_clears_state() {
        let mut detector = OnsetDetector::new();
        for i in 0..5 {
            detector.process(&voiced(i * 512));
        }
        detector.reset();
        assert!(!detector.is_sounding());
        // Needs a full run again after reset
        assert!(!detector.process(&voiced(0)).is_onset);
        assert!(!detector.process(&voiced(512)).is_onset);
        assert!(detector.process(&voiced(1024)).is_onset);
    }
}
