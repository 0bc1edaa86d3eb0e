// Score file loading and metadata finalisation.
//
// `load_score` picks a reader by file extension, parses the file, then runs
// `finalize_metadata` so every loaded score has a title, unique non-empty
// part names, and pitch ranges regardless of what the file provided.
//
// JSON scores are the serde form of `Score` and are mainly used for test
// fixtures and for caching parsed scores between runs.

use crate::error::{Result, ScoreError};
use crate::midi;
use crate::score::Score;
use rustc_hash::FxHashMap;
use std::path::Path;
use tracing::{debug, info};

/// Title used when neither the file nor its path supplies one.
pub const UNKNOWN_TITLE: &str = "Unknown Piece";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreFormat {
    Midi,
    Json,
}

impl ScoreFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "mid" | "midi" => Ok(ScoreFormat::Midi),
            "json" => Ok(ScoreFormat::Json),
            _ => Err(ScoreError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

/// Read and parse a score file, then finalise its metadata.
pub fn load_score(path: &Path) -> Result<Score> {
    if !path.is_file() {
        return Err(ScoreError::NotFound(path.to_path_buf()));
    }
    let format = ScoreFormat::from_path(path)?;
    debug!(path = %path.display(), ?format, "Loading score");

    let bytes = std::fs::read(path)?;
    let mut score = match format {
        ScoreFormat::Midi => midi::read_midi(&bytes)?,
        ScoreFormat::Json => serde_json::from_slice(&bytes)?,
    };
    finalize_metadata(&mut score, Some(path));

    info!(
        title = %score.metadata.title,
        parts = score.parts.len(),
        "Loaded score"
    );
    Ok(score)
}

/// Write a score as pretty-printed JSON.
pub fn save_json(score: &Score, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(score)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Fill derived metadata: title fallback, part names, and pitch ranges.
/// Part names are also written back to the parts so name-based part
/// selection matches the metadata.
pub fn finalize_metadata(score: &mut Score, path: Option<&Path>) {
    let meta = &mut score.metadata;

    if let Some(path) = path {
        meta.pathname = path.display().to_string();
    }
    if meta.title.trim().is_empty() {
        meta.title = path
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    }

    let names = unique_part_names(score.parts.iter().map(|p| p.name.as_str()));
    for (part, name) in score.parts.iter_mut().zip(&names) {
        part.name.clone_from(name);
    }
    score.metadata.parts = names;

    let ranges: Vec<_> = score.parts.iter().map(|p| p.range()).collect();
    score.metadata.part_ranges = ranges
        .iter()
        .map(|r| r.map(|(lo, hi)| (lo.name(), hi.name())))
        .collect();

    let lowest = ranges.iter().flatten().map(|(lo, _)| *lo).min_by_key(|p| p.midi());
    let highest = ranges.iter().flatten().map(|(_, hi)| *hi).max_by_key(|p| p.midi());
    score.metadata.piece_range = lowest.zip(highest).map(|(lo, hi)| (lo.name(), hi.name()));
}

/// Empty names become `Part N` (1-based position); names that occur more
/// than once get `_1`, `_2`... suffixes in order of appearance.
fn unique_part_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let filled: Vec<String> = names
        .enumerate()
        .map(|(i, name)| {
            let name = name.trim();
            if name.is_empty() {
                format!("Part {}", i + 1)
            } else {
                name.to_string()
            }
        })
        .collect();

    let mut totals: FxHashMap<&str, usize> = FxHashMap::default();
    for name in &filled {
        *totals.entry(name.as_str()).or_default() += 1;
    }
    let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
    filled
        .iter()
        .map(|name| {
            if totals[name.as_str()] > 1 {
                let k = seen.entry(name.as_str()).or_default();
                *k += 1;
                format!("{name}_{k}")
            } else {
                name.clone()
            }
        })
        .collect()
}
