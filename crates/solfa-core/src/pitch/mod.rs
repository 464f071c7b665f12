//! Pitch detection tuned for the singing voice
//!
//! YIN (cumulative mean normalized difference) over one analysis window,
//! restricted to the vocal range, with an RMS gate and a clarity check so
//! silence and noise come back as unvoiced frames rather than errors.

pub mod onset;

pub use onset::OnsetDetector;

use crate::music;

/// Lowest fundamental considered (below a bass singer's range)
const MIN_FREQ_HZ: f32 = 80.0;

/// Highest fundamental considered (above a soprano's range)
const MAX_FREQ_HZ: f32 = 1200.0;

/// RMS below this is treated as silence
const AMPLITUDE_THRESHOLD: f32 = 0.01;

/// YIN absolute threshold for the first significant dip
const YIN_THRESHOLD: f32 = 0.15;

/// A dip shallower than this is noise, not a tone
const CLARITY_THRESHOLD: f32 = 0.2;

/// Per-window analysis result
///
/// Ephemeral: produced once per ~11.6ms window and consumed straight into
/// the per-note accumulators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    /// Estimated fundamental in Hz (0 when unvoiced)
    pub frequency: f32,
    pub is_voiced: bool,
    /// Nearest MIDI note (0 when unvoiced)
    pub midi_note: i32,
    /// Deviation from the nearest note in cents
    pub cent_deviation: f32,
    /// Voice onset detected at this window
    pub is_onset: bool,
    /// Voice offset detected at this window
    pub is_offset: bool,
    /// Absolute sample position of the window start
    pub position: i64,
}

impl PitchFrame {
    /// An unvoiced frame at the given position
    pub fn unvoiced(position: i64) -> Self {
        Self {
            frequency: 0.0,
            is_voiced: false,
            midi_note: 0,
            cent_deviation: 0.0,
            is_onset: false,
            is_offset: false,
            position,
        }
    }
}

/// YIN fundamental-frequency estimator
///
/// Holds a reusable difference buffer; the estimate itself is stateless
/// per window.
pub struct PitchDetector {
    sample_rate: u32,
    yin_buffer: Vec<f32>,
    min_period: usize,
    max_period: usize,
}

impl PitchDetector {
    pub fn new(sample_rate: u32, window_size: usize) -> Self {
        let half = window_size / 2;
        // Period bounds from the vocal range, clamped to what the window
        // can actually resolve
        let min_period = ((sample_rate as f32 / MAX_FREQ_HZ) as usize).max(2);
        let max_period = ((sample_rate as f32 / MIN_FREQ_HZ) as usize).min(half - 1);
        Self {
            sample_rate,
            yin_buffer: vec![0.0; half],
            min_period,
            max_period,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Analyze one window starting at absolute sample `position`
    ///
    /// Sub-threshold amplitude, an unclear dip, or an out-of-range period
    /// all yield an unvoiced frame; there is no error path.
    pub fn process(&mut self, window: &[f32], position: i64) -> PitchFrame {
        let half = (window.len() / 2).min(self.yin_buffer.len());
        if half <= self.min_period {
            return PitchFrame::unvoiced(position);
        }

        // Noise gate
        let rms = (window.iter().map(|&s| s * s).sum::<f32>() / window.len() as f32).sqrt();
        if rms < AMPLITUDE_THRESHOLD {
            return PitchFrame::unvoiced(position);
        }

        // Difference function
        for tau in 1..half {
            let mut diff = 0.0;
            for i in 0..half {
                let delta = window[i] - window[i + tau];
                diff += delta * delta;
            }
            self.yin_buffer[tau] = diff;
        }

        // Cumulative mean normalized difference
        self.yin_buffer[0] = 1.0;
        let mut running_sum = 0.0;
        for tau in 1..half {
            running_sum += self.yin_buffer[tau];
            if running_sum > 0.0 {
                self.yin_buffer[tau] *= tau as f32 / running_sum;
            } else {
                self.yin_buffer[tau] = 1.0;
            }
        }

        // First dip below the absolute threshold within the vocal range;
        // walking to the local minimum avoids octave errors
        let max_period = self.max_period.min(half - 1);
        let mut period = 0;
        let mut tau = self.min_period;
        while tau <= max_period {
            if self.yin_buffer[tau] < YIN_THRESHOLD {
                while tau + 1 <= max_period && self.yin_buffer[tau + 1] < self.yin_buffer[tau] {
                    tau += 1;
                }
                period = tau;
                break;
            }
            tau += 1;
        }

        // Fall back to the global minimum if no dip cleared the threshold
        if period == 0 {
            let (best, _) = self.yin_buffer[self.min_period..=max_period]
                .iter()
                .enumerate()
                .fold((0usize, f32::INFINITY), |(bi, bv), (i, &v)| {
                    if v < bv { (i, v) } else { (bi, bv) }
                });
            period = self.min_period + best;
        }

        // Clarity check: a clear tone has a deep dip
        if period == 0 || self.yin_buffer[period] > CLARITY_THRESHOLD {
            return PitchFrame::unvoiced(position);
        }

        // Parabolic interpolation for sub-sample period accuracy
        let period_exact = if period > self.min_period && period + 1 <= max_period {
            let y1 = self.yin_buffer[period - 1];
            let y2 = self.yin_buffer[period];
            let y3 = self.yin_buffer[period + 1];
            let denom = y1 - 2.0 * y2 + y3;
            if denom.abs() > 1e-9 {
                period as f32 + (y1 - y3) / (2.0 * denom)
            } else {
                period as f32
            }
        } else {
            period as f32
        };

        let frequency = self.sample_rate as f32 / period_exact;
        if !frequency.is_finite() || !(MIN_FREQ_HZ..=MAX_FREQ_HZ).contains(&frequency) {
            return PitchFrame::unvoiced(position);
        }

        match music::midi_and_cents_from_hz(frequency) {
            Some((midi_note, cent_deviation)) => PitchFrame {
                frequency,
                is_voiced: true,
                midi_note,
                cent_deviation,
                is_onset: false,
                is_offset: false,
                position,
            },
            None => PitchFrame::unvoiced(position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ANALYSIS_WINDOW;

    fn sine_window(freq: f32, sample_rate: u32, amplitude: f32) -> Vec<f32> {
        (0..ANALYSIS_WINDOW)
            .map(|i| {
                (i as f32 * freq * 2.0 * std::f32::consts::PI / sample_rate as f32).sin()
                    * amplitude
            })
            .collect()
    }

    #[test]
    fn test_detects_a4() {
        let mut detector = PitchDetector::new(44_100, ANALYSIS_WINDOW);
        let frame = detector.process(&sine_window(440.0, 44_100, 0.5), 0);

        assert!(frame.is_voiced);
        assert!((frame.frequency - 440.0).abs() < 3.0, "got {}", frame.frequency);
        assert_eq!(frame.midi_note, 69);
        assert!(frame.cent_deviation.abs() < 12.0);
    }

    #[test]
    fn test_detects_low_voice() {
        let mut detector = PitchDetector::new(44_100, ANALYSIS_WINDOW);
        // G2, near the bottom of a bass range
        let frame = detector.process(&sine_window(98.0, 44_100, 0.5), 0);

        assert!(frame.is_voiced);
        assert_eq!(frame.midi_note, 43);
    }

    #[test]
    fn test_silence_is_unvoiced_not_error() {
        let mut detector = PitchDetector::new(44_100, ANALYSIS_WINDOW);
        let frame = detector.process(&vec![0.0; ANALYSIS_WINDOW], 123);

        assert!(!frame.is_voiced);
        assert_eq!(frame.frequency, 0.0);
        assert_eq!(frame.position, 123);
    }

    #[test]
    fn test_quiet_signal_gated() {
        let mut detector = PitchDetector::new(44_100, ANALYSIS_WINDOW);
        let frame = detector.process(&sine_window(440.0, 44_100, 0.005), 0);
        assert!(!frame.is_voiced);
    }

    #[test]
    fn test_noise_is_unvoiced() {
        let mut detector = PitchDetector::new(44_100, ANALYSIS_WINDOW);
        // Deterministic pseudo-noise, well above the amplitude gate
        let mut state = 0x12345678u32;
        let noise: Vec<f32> = (0..ANALYSIS_WINDOW)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                (state >> 8) as f32 / (1 << 24) as f32 - 0.5
            })
            .collect();
        let frame = detector.process(&noise, 0);
        assert!(!frame.is_voiced);
    }

    #[test]
    fn test_out_of_range_fundamental_is_unvoiced() {
        let mut detector = PitchDetector::new(44_100, ANALYSIS_WINDOW);
        // 5kHz is far above the configured vocal range
        let frame = detector.process(&sine_window(5000.0, 44_100, 0.5), 0);
        assert!(!frame.is_voiced);
    }

    #[test]
    fn test_cents_tracks_detuning() {
        let mut detector = PitchDetector::new(48_000, ANALYSIS_WINDOW);
        // 30 cents sharp of A4
        let freq = 440.0 * 2f32.powf(30.0 / 1200.0);
        let frame = detector.process(&sine_window(freq, 48_000, 0.5), 0);

        assert!(frame.is_voiced);
        assert_eq!(frame.midi_note, 69);
        assert!(
            (frame.cent_deviation - 30.0).abs() < 15.0,
            "cents {}",
            frame.cent_deviation
        );
    }
}
