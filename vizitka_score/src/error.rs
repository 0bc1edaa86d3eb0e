// Error type for score loading and construction.

use std::path::PathBuf;
use thiserror::Error;

/// Score formats recognised by `load_score`, for error messages.
pub const SUPPORTED_FORMATS: &str = "MIDI (.mid, .midi), JSON (.json)";

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Score file not found: '{0}'")]
    NotFound(PathBuf),

    #[error("Unsupported score format for '{path}': {extension}\n  Supported formats: {SUPPORTED_FORMATS}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Failed to parse MIDI data: {0}")]
    Midi(#[from] midly::Error),

    #[error("MIDI files with SMPTE timecode timing are not supported")]
    UnsupportedTiming,

    #[error("Invalid JSON score: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pitch name '{0}'")]
    InvalidPitch(String),

    #[error("Pitch {0} is outside the MIDI range 0-127")]
    PitchOutOfRange(String),

    #[error("Invalid duration {0} in part entry")]
    InvalidDuration(f64),

    #[error("Score position of {0} ticks is past the longest supported score")]
    TooLong(u64),

    #[error("No part named '{0}' in this score")]
    UnknownPart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScoreError>;
