//! Feedback snapshots and the drop-oldest queue that carries them
//!
//! A `FeedbackState` is a complete picture of the exercise at one analysis
//! window, regenerated every window. Consumers always render the latest
//! snapshot; there is nothing incremental to replay, so the queue drops the
//! oldest entry when the consumer lags instead of blocking the analysis
//! thread.

use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use crate::scoring::{PitchScore, PitchStatus, TimingScore, TimingStatus};
use crate::types::SolfegePhase;

/// Per-note judgment inside a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NoteFeedback {
    pub midi_note: i32,
    pub pitch: PitchScore,
    pub timing: TimingScore,
    /// The playhead has passed this note's window
    pub completed: bool,
    /// The playhead is inside this note's window
    pub current: bool,
}

impl NoteFeedback {
    pub fn pitch_status(&self) -> PitchStatus {
        self.pitch.status
    }

    pub fn timing_status(&self) -> TimingStatus {
        self.timing.status
    }
}

/// Full exercise state at one analysis window
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedbackState {
    /// Absolute sample position of the window that produced this snapshot
    pub sample_position: i64,
    /// The same position in beats
    pub beat_position: f64,
    /// Index of the note the playhead is on (clamped to the last note)
    pub current_note: usize,
    pub notes: Vec<NoteFeedback>,
    /// Mean pitch score over evaluated notes
    pub overall_pitch: f32,
    /// Mean timing score over attempted or elapsed notes
    pub overall_timing: f32,
    /// Mean of the two overall scores
    pub overall_score: f32,
    /// The voice is currently sounding
    pub voice_detected: bool,
    pub phase: SolfegePhase,
}

/// Producer half of the snapshot queue
#[derive(Clone)]
pub struct FeedbackPublisher {
    queue: Arc<ArrayQueue<FeedbackState>>,
}

impl FeedbackPublisher {
    /// Publish a snapshot, evicting the oldest if the consumer is behind
    pub fn publish(&self, state: FeedbackState) {
        self.queue.force_push(state);
    }
}

/// Consumer half of the snapshot queue
pub struct FeedbackReceiver {
    queue: Arc<ArrayQueue<FeedbackState>>,
}

impl FeedbackReceiver {
    /// Next queued snapshot, oldest first
    pub fn poll(&self) -> Option<FeedbackState> {
        self.queue.pop()
    }

    /// Most recent snapshot, discarding anything older
    pub fn latest(&self) -> Option<FeedbackState> {
        let mut last = None;
        while let Some(state) = self.queue.pop() {
            last = Some(state);
        }
        last
    }
}

/// Bounded drop-oldest snapshot queue
pub fn feedback_queue(capacity: usize) -> (FeedbackPublisher, FeedbackReceiver) {
    let queue = Arc::new(ArrayQueue::new(capacity));
    (
        FeedbackPublisher { queue: Arc::clone(&queue) },
        FeedbackReceiver { queue },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(position: i64) -> FeedbackState {
        FeedbackState { sample_position: position, ..Default::default() }
    }

    #[test]
    fn test_poll_in_order() {
        let (tx, rx) = feedback_queue(8);
        tx.publish(snapshot(1));
        tx.publish(snapshot(2));
        assert_eq!(rx.poll().unwrap().sample_position, 1);
        assert_eq!(rx.poll().unwrap().sample_position, 2);
        assert!(rx.poll().is_none());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let (tx, rx) = feedback_queue(2);
        for position in 0..10 {
            tx.publish(snapshot(position));
        }
        assert_eq!(rx.poll().unwrap().sample_position, 8);
        assert_eq!(rx.poll().unwrap().sample_position, 9);
        assert!(rx.poll().is_none());
    }

    #[test]
    fn test_latest_discards_backlog() {
        let (tx, rx) = feedback_queue(8);
        for position in 0..5 {
            tx.publish(snapshot(position));
        }
        assert_eq!(rx.latest().unwrap().sample_position, 4);
        assert!(rx.latest().is_none());
    }
}
