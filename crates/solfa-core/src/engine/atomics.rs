//! Lock-free engine state shared across the three loops
//!
//! The playback loop is the sole writer of the sample counter and the
//! phase; every other thread (recording, analysis, UI) reads them with
//! plain atomic loads. There is no compare-and-swap anywhere: single
//! writer per field, so store/load is all that is needed.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicUsize, Ordering};

use crate::types::SolfegePhase;

/// Shared atomic state for one engine instance
#[derive(Debug)]
pub struct EngineAtomics {
    /// Authoritative sample counter (negative during countdown)
    sample_position: AtomicI64,
    /// Current `SolfegePhase`, encoded via `as_u8`
    phase: AtomicU8,
    /// Cooperative cancellation flag for all loops
    running: AtomicBool,
    /// Index of the most recently triggered expected note
    current_note: AtomicUsize,
}

impl EngineAtomics {
    pub fn new() -> Self {
        Self {
            sample_position: AtomicI64::new(0),
            phase: AtomicU8::new(SolfegePhase::Idle.as_u8()),
            running: AtomicBool::new(false),
            current_note: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn position(&self) -> i64 {
        self.sample_position.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn store_position(&self, position: i64) {
        self.sample_position.store(position, Ordering::Relaxed);
    }

    #[inline]
    pub fn phase(&self) -> SolfegePhase {
        SolfegePhase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_phase(&self, phase: SolfegePhase) {
        self.phase.store(phase.as_u8(), Ordering::Relaxed);
    }

    #[inline]
    pub fn running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    #[inline]
    pub fn current_note(&self) -> usize {
        self.current_note.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_current_note(&self, index: usize) {
        self.current_note.store(index, Ordering::Relaxed);
    }
}

impl Default for EngineAtomics {
    fn default() -> Self {
        Self::new()
    }
}
