// Score import.
//
// `import` turns a location into something to analyze. A file becomes one
// `IndexedPiece`; a directory is walked recursively (in file-name order)
// and every file becomes a piece of an `AggregatedPieces`. Files are not
// parsed here. A file that turns out not to be a readable score fails
// when its piece first runs, and only that piece fails.
//
// Skipped while walking: `.DS_Store`, AppleDouble `._*` files, and files
// named `meta`.

use crate::aggregated_pieces::AggregatedPieces;
use crate::config::AnalysisConfig;
use crate::error::{ModelError, Result};
use crate::indexed_piece::IndexedPiece;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

pub enum Imported {
    Piece(IndexedPiece),
    Collection(AggregatedPieces),
}

impl Imported {
    /// Every import as a collection running under `config`; a single
    /// piece becomes a collection of one.
    pub fn into_collection(self, config: AnalysisConfig) -> AggregatedPieces {
        match self {
            Imported::Piece(piece) => AggregatedPieces::with_config(vec![piece], config),
            Imported::Collection(pieces) => {
                let registry = pieces.registry();
                AggregatedPieces::with_registry(pieces.into_pieces(), registry, config)
            }
        }
    }
}

pub fn import(location: &Path) -> Result<Imported> {
    import_with_config(location, AnalysisConfig::default())
}

pub fn import_with_config(location: &Path, config: AnalysisConfig) -> Result<Imported> {
    if location.is_file() {
        debug!(path = %location.display(), "Importing single piece");
        let piece = IndexedPiece::from_path(location).with_config(Arc::new(config));
        return Ok(Imported::Piece(piece));
    }
    if !location.is_dir() {
        return Err(ModelError::UnknownInput(location.to_path_buf()));
    }

    let files = score_files(location);
    if files.is_empty() {
        return Err(ModelError::NoFiles(location.to_path_buf()));
    }
    info!(path = %location.display(), pieces = files.len(), "Imported directory");
    import_paths(&files, config).map(Imported::Collection)
}

/// A collection from an explicit list of score files.
pub fn import_paths(paths: &[PathBuf], config: AnalysisConfig) -> Result<AggregatedPieces> {
    if paths.is_empty() {
        return Err(ModelError::NoPieces);
    }
    let pieces = paths.iter().map(IndexedPiece::from_path).collect();
    Ok(AggregatedPieces::with_config(pieces, config))
}

fn score_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !is_skipped(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect()
}

fn is_skipped(name: &str) -> bool {
    name == ".DS_Store" || name == "meta" || name.starts_with("._")
}
