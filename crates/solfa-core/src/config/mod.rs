//! Exercise definitions on disk

pub mod io;

pub use io::{load_config, save_config};

use serde::{Deserialize, Serialize};

use crate::schedule::NoteSpec;
use crate::types::TimeSignature;

/// A solfège exercise as stored in a YAML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseFile {
    pub name: String,
    /// Beats per minute
    pub tempo: f64,
    pub time_signature: TimeSignature,
    /// Whole octaves the singer works above (+) or below (-) the written
    /// notes
    pub octave_offset: i32,
    pub notes: Vec<NoteSpec>,
}

impl Default for ExerciseFile {
    /// An ascending Do-Re-Mi-Fa-Sol line in C, one beat per note
    fn default() -> Self {
        Self {
            name: "C major pentascale".to_string(),
            tempo: 90.0,
            time_signature: TimeSignature::new(4, 4),
            octave_offset: 0,
            notes: [60, 62, 64, 65, 67]
                .iter()
                .enumerate()
                .map(|(i, &midi_note)| NoteSpec {
                    midi_note,
                    start_beat: i as f64,
                    duration_beats: 1.0,
                })
                .collect(),
        }
    }
}
