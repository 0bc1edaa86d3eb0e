// Vizitka models: running analyzer chains on pieces and collections.
//
// `IndexedPiece` wraps one score (loaded lazily from a file, or built in
// memory) with a private result cache keyed by canonical chain prefixes.
// `AggregatedPieces` runs one resolved chain over many pieces, in parallel
// on the rayon pool when configured, and reports per-piece failures
// without aborting the batch.
//
// Architecture:
// - indexed_piece.rs: `IndexedPiece`, prefix-cached chain execution
// - aggregated_pieces.rs: `AggregatedPieces`, `Combination`, outcomes,
//   aggregated metadata
// - cache.rs: `CacheKey`, `AnalysisCache`
// - config.rs: `AnalysisConfig` (JSON, all fields optional)
// - import.rs: file, directory, and path-list import
// - export.rs: table JSON export
// - error.rs: `ModelError`, recoverable vs fatal split

pub mod aggregated_pieces;
pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod indexed_piece;

pub use aggregated_pieces::{
    AggregatedMetadata, AggregatedPieces, AggregatedResult, Combination, PieceOutcome, make_date_range,
};
pub use cache::{AnalysisCache, CacheKey};
pub use config::AnalysisConfig;
pub use error::{ModelError, Result};
pub use export::write_table_json;
pub use import::{Imported, import, import_paths, import_with_config};
pub use indexed_piece::IndexedPiece;
