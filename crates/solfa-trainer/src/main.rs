//! Solfa Trainer - terminal solfège practice
//!
//! Loads an exercise from YAML (or uses the built-in pentascale), runs it
//! against the default audio devices, and prints live feedback followed by
//! a per-note report.

mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use solfa_core::audio::cpal_backend::{start_note_player, CpalCaptureOpener};
use solfa_core::config::{load_config, ExerciseFile};
use solfa_core::engine::SolfegeEngine;
use solfa_core::music::{note_name, solfege_syllable};
use solfa_core::SolfegePhase;

const USAGE: &str = "usage: solfa-trainer [exercise.yaml] [--demo]

  --demo    play the exercise on the piano instead of listening";

fn main() -> Result<()> {
    env_logger::init();

    let mut demo = false;
    let mut path: Option<PathBuf> = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--demo" => demo = true,
            "--help" | "-h" => {
                println!("{}", USAGE);
                return Ok(());
            }
            other => path = Some(PathBuf::from(other)),
        }
    }

    let exercise: ExerciseFile = match &path {
        Some(path) => load_config(path),
        None => ExerciseFile::default(),
    };
    info!("exercise: {} ({} notes)", exercise.name, exercise.notes.len());

    let (output, player) = start_note_player().context("Failed to start audio output")?;
    let player: Arc<dyn solfa_core::audio::NotePlayer> = player;
    let mut engine = SolfegeEngine::new(player, Box::new(CpalCaptureOpener), output.sample_rate());
    let feedback = engine
        .take_feedback()
        .context("Feedback queue unavailable")?;

    engine.configure(
        &exercise.notes,
        exercise.tempo,
        exercise.time_signature,
        exercise.octave_offset,
    )?;

    println!("{} - {} BPM, {}", exercise.name, exercise.tempo, exercise.time_signature);
    let line: Vec<String> = exercise
        .notes
        .iter()
        .map(|n| format!("{}({})", solfege_syllable(n.midi_note), note_name(n.midi_note)))
        .collect();
    println!("  {}", line.join("  "));
    println!();

    if demo {
        engine.start_playback(true).context("Failed to start playback")?;
    } else {
        engine
            .start_listening()
            .context("Failed to start listening (is a microphone connected?)")?;
        println!("sing after the count-in...");
    }

    let mut last = None;
    while engine.phase() != SolfegePhase::Completed {
        if let Some(state) = feedback.latest() {
            report::print_live(&state);
            last = Some(state);
        }
        thread::sleep(Duration::from_millis(50));
    }
    if let Some(state) = feedback.latest() {
        last = Some(state);
    }
    engine.stop();

    match last {
        Some(state) => report::print_summary(&state),
        None => println!("done."),
    }
    Ok(())
}
