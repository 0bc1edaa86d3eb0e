// Built-in indexers.
//
// Score readers (noterest, multistop, duration, beat_strength,
// time_signature, measure, tie) take the score directly. Everything else reads a moment-aligned
// table, usually noterest. Columns describing a single part are labelled by
// the part's position in the score (`0` is the first part); columns
// describing a pair of parts join the two labels (`0,1`).

pub mod active_voices;
pub mod consonance;
pub mod interval;
pub mod meter;
pub mod ngram;
pub mod noterest;
pub mod windexer;

pub use active_voices::ActiveVoicesIndexer;
pub use consonance::ConsonanceIndexer;
pub use interval::{HorizontalIntervalIndexer, VerticalIntervalIndexer};
pub use meter::{BeatStrengthIndexer, MeasureIndexer, TieIndexer, TimeSignatureIndexer};
pub use ngram::{NgramFilterIndexer, NgramIndexer};
pub use noterest::{DurationIndexer, MultistopIndexer, NoterestIndexer};
pub use windexer::WindexerIndexer;

/// Column label for the part at `index`.
pub fn part_label(index: usize) -> String {
    index.to_string()
}
