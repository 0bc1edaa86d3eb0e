// Vizitka score model.
//
// The read-only input every analysis starts from. A `Score` is a list of
// parts, each a time-ordered list of note, chord, and rest events placed on
// an integer tick grid (480 ticks per quarter note), plus time signatures
// and piece metadata.
//
// Architecture:
// - offset.rs: `Offset` tick positions and durations, quarter-length conversion
// - pitch.rs: spelled pitches (`C#4`, `Bb3`), diatonic/chromatic interval naming
// - score.rs: Score / Part / Event / TimeSignature / Metadata, measure layout
// - midi.rs: Standard MIDI File reading and writing (via `midly`)
// - load.rs: format dispatch by extension, JSON scores, metadata finalisation
// - error.rs: `ScoreError`
//
// Scores are parsed once and shared behind `Arc` by the model layer; nothing
// in this crate mutates a score after loading except metadata edits.

pub mod error;
pub mod load;
pub mod midi;
pub mod offset;
pub mod pitch;
pub mod score;

pub use error::{Result, ScoreError};
pub use load::{ScoreFormat, load_score, save_json};
pub use offset::{Offset, TICKS_PER_QUARTER};
pub use pitch::{Interval, Pitch, Step};
pub use score::{Event, EventContent, Metadata, Part, Score, Tie, TimeSignature};
