//! Engine-level error types

use thiserror::Error;

use crate::audio::AudioError;

/// Exercise configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Exercise contains no notes
    #[error("Exercise has no notes")]
    EmptyExercise,

    /// Tempo must be positive
    #[error("Tempo must be positive (got {0})")]
    InvalidTempo(f64),

    /// Time signature numerator must be positive
    #[error("Time signature must have a positive numerator")]
    InvalidTimeSignature,
}

/// Errors surfaced by engine control operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    /// Start was called before configure
    #[error("Engine is not configured")]
    NotConfigured,

    /// An exercise is already running
    #[error("An exercise is already running")]
    AlreadyRunning,

    /// OS refused to spawn a worker thread
    #[error("Failed to spawn {0} thread: {1}")]
    ThreadSpawn(&'static str, String),
}

/// Result type for engine control operations
pub type EngineResult<T> = Result<T, EngineError>;
