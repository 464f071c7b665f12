//! Solfa Core - Real-time solfège training engine

pub mod analysis;
pub mod audio;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod music;
pub mod pitch;
pub mod ring;
pub mod schedule;
pub mod scoring;
pub mod types;

pub use types::*;
