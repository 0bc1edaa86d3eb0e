// One piece and its analysis results.
//
// An `IndexedPiece` owns a score source (a file path or an in-memory score)
// and a private cache of analysis results. The score file is parsed on the
// first call that needs it and shared behind an `Arc` from then on.
//
// `get` resolves and validates the chain, then executes it step by step.
// Execution starts from the longest prefix of the chain already in the
// cache; every step it computes is cached under its own prefix key, so a
// later chain sharing a prefix (noterest → vertical_interval → ngram after
// noterest → vertical_interval) recomputes only what is new. Direct inputs
// are executed the same way, through the same cache.

use crate::cache::{AnalysisCache, CacheKey};
use crate::config::AnalysisConfig;
use crate::error::{ModelError, Result};
use crate::export::write_table_json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use vizitka_analysis::{ChainResolver, ChainSettings, Inputs, Registry, ResolvedChain, Table};
use vizitka_score::load::{UNKNOWN_TITLE, finalize_metadata};
use vizitka_score::{Metadata, Score, load_score};

pub struct IndexedPiece {
    path: Option<PathBuf>,
    score: Option<Arc<Score>>,
    registry: Arc<Registry>,
    config: Arc<AnalysisConfig>,
    cache: AnalysisCache,
}

impl IndexedPiece {
    /// A piece backed by a score file. Nothing is read until first use.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        IndexedPiece {
            path: Some(path.into()),
            score: None,
            registry: Arc::new(Registry::with_defaults()),
            config: Arc::new(AnalysisConfig::default()),
            cache: AnalysisCache::default(),
        }
    }

    /// A piece backed by an already-built score.
    pub fn from_score(mut score: Score) -> Self {
        finalize_metadata(&mut score, None);
        IndexedPiece {
            path: None,
            score: Some(Arc::new(score)),
            registry: Arc::new(Registry::with_defaults()),
            config: Arc::new(AnalysisConfig::default()),
            cache: AnalysisCache::default(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self.cache.clear();
        self
    }

    pub fn with_config(mut self, config: Arc<AnalysisConfig>) -> Self {
        self.config = config;
        self.cache.clear();
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.score.is_some()
    }

    /// The score, loading it on first use.
    pub fn score(&mut self) -> Result<Arc<Score>> {
        if let Some(score) = &self.score {
            return Ok(Arc::clone(score));
        }
        let Some(path) = &self.path else {
            return Err(ModelError::NoPieces);
        };
        let score = Arc::new(load_score(path)?);
        info!(path = %path.display(), title = %score.metadata.title, "Loaded piece");
        self.score = Some(Arc::clone(&score));
        Ok(score)
    }

    pub fn metadata(&mut self) -> Result<&Metadata> {
        self.score()?;
        match &self.score {
            Some(score) => Ok(&score.metadata),
            None => Err(ModelError::NoPieces),
        }
    }

    /// Editable metadata. Cached results are kept: no analyzer reads
    /// metadata.
    pub fn metadata_mut(&mut self) -> Result<&mut Metadata> {
        self.score()?;
        match &mut self.score {
            Some(score) => Ok(&mut Arc::make_mut(score).metadata),
            None => Err(ModelError::NoPieces),
        }
    }

    /// Title for reports: the metadata title once loaded, otherwise the
    /// file stem.
    pub fn title(&self) -> String {
        if let Some(score) = &self.score {
            return score.metadata.title.clone();
        }
        self.path
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
    }

    /// Resolve `chain` against this piece's registry and configured
    /// defaults.
    pub fn resolve(&self, chain: &[&str], settings: &ChainSettings) -> Result<ResolvedChain> {
        let resolver = ChainResolver::new(&self.registry, &self.config.defaults, settings);
        Ok(resolver.resolve(chain)?)
    }

    /// Run `chain` and return its final table. `parts` restricts the score
    /// to the named parts, in the given order.
    pub fn get(
        &mut self,
        chain: &[&str],
        settings: &ChainSettings,
        parts: Option<&[&str]>,
    ) -> Result<Arc<Table>> {
        let resolved = self.resolve(chain, settings)?;
        self.run_resolved(&resolved, parts)
    }

    /// Run an already-resolved chain.
    pub fn run_resolved(&mut self, chain: &ResolvedChain, parts: Option<&[&str]>) -> Result<Arc<Table>> {
        let full = self.score()?;
        let score = match parts {
            Some(names) => Arc::new(full.select_parts(names)?),
            None => full,
        };
        self.run_chain(&score, chain, parts)
    }

    fn run_chain(&mut self, score: &Score, chain: &ResolvedChain, parts: Option<&[&str]>) -> Result<Arc<Table>> {
        let keys: Vec<CacheKey> = (1..=chain.len())
            .map(|len| CacheKey::new(chain, len, parts))
            .collect();

        let mut start = 0;
        let mut current: Option<Arc<Table>> = None;
        for len in (1..=chain.len()).rev() {
            if let Some(hit) = self.cache.get(&keys[len - 1]) {
                debug!(
                    title = %score.metadata.title,
                    cached_steps = len,
                    "Cache hit"
                );
                start = len;
                current = Some(hit);
                break;
            }
        }

        for (index, step) in chain.steps.iter().enumerate().skip(start) {
            let mut direct = Vec::with_capacity(step.direct.len());
            for input in &step.direct {
                let table = self.run_chain(score, &input.chain, parts)?;
                direct.push((input.name, table));
            }

            debug!(title = %score.metadata.title, analyzer = step.name(), "Running analyzer");
            let inputs = Inputs {
                score,
                prior: current.as_deref(),
                direct: &direct,
            };
            let table = Arc::new(step.analyzer.run(&inputs, &step.settings)?);
            self.cache.record_computed();
            if self.config.cache_results {
                self.cache.insert(keys[index].clone(), Arc::clone(&table));
            }
            current = Some(table);
        }

        current.ok_or_else(|| ModelError::Analysis(vizitka_analysis::ChainError::Empty.into()))
    }

    /// Number of cached chain prefixes.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// `(cache hits, analyzer steps computed)` for this piece.
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.stats()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Write a result table as JSON.
    pub fn export_json(&self, table: &Table, path: &Path) -> Result<()> {
        write_table_json(table, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizitka_analysis::{Settings, Value};
    use vizitka_score::{Offset, Part};

    fn piece() -> IndexedPiece {
        let upper = Part::from_sequence("Soprano", &[("E4", 1.0), ("F4", 1.0), ("G4", 2.0)]).unwrap();
        let lower = Part::from_sequence("Bass", &[("C4", 2.0), ("B3", 1.0), ("C4", 1.0)]).unwrap();
        IndexedPiece::from_score(Score::new(vec![upper, lower]))
    }

    #[test]
    fn in_memory_piece_is_loaded_and_titled() {
        let mut p = piece();
        assert!(p.is_loaded());
        assert_eq!(p.title(), UNKNOWN_TITLE);
        assert_eq!(p.metadata().unwrap().parts, vec!["Soprano", "Bass"]);
    }

    #[test]
    fn prefixes_are_cached_and_reused() {
        let mut p = piece();
        let none = ChainSettings::new();
        p.get(&["noterest"], &none, None).unwrap();
        assert_eq!(p.cached_len(), 1);
        assert_eq!(p.cache_stats(), (0, 1));

        p.get(&["vertical_interval"], &none, None).unwrap();
        assert_eq!(p.cached_len(), 2);
        // noterest came from the cache, only vertical_interval ran
        assert_eq!(p.cache_stats(), (1, 2));

        p.clear_cache();
        assert_eq!(p.cached_len(), 0);
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let config = AnalysisConfig {
            cache_results: false,
            ..AnalysisConfig::default()
        };
        let mut p = piece().with_config(Arc::new(config));
        p.get(&["vertical_interval"], &ChainSettings::new(), None).unwrap();
        assert_eq!(p.cached_len(), 0);
    }

    #[test]
    fn part_selection_changes_result_and_key() {
        let mut p = piece();
        let none = ChainSettings::new();
        let all = p.get(&["noterest"], &none, None).unwrap();
        let bass = p.get(&["noterest"], &none, Some(&["Bass"])).unwrap();
        assert_eq!(all.parts(), vec!["0", "1"]);
        assert_eq!(bass.parts(), vec!["0"]);
        assert_eq!(bass.value_at("0", Offset::ZERO), Some(&Value::from("C4")));
        assert_eq!(p.cached_len(), 2);
        assert!(matches!(
            p.get(&["noterest"], &none, Some(&["Alto"])),
            Err(ModelError::Score(_))
        ));
    }

    #[test]
    fn configured_defaults_apply_under_call_settings() {
        let mut config = AnalysisConfig::default();
        config.defaults = ChainSettings::new().with("vi", Settings::new().with("quality", false));
        let mut p = piece().with_config(Arc::new(config));
        let none = ChainSettings::new();
        let table = p.get(&["vertical_interval"], &none, None).unwrap();
        assert_eq!(table.value_at("0,1", Offset::ZERO), Some(&Value::from("3")));

        let explicit = ChainSettings::new().with("vertical_interval", Settings::new().with("quality", true));
        let table = p.get(&["vertical_interval"], &explicit, None).unwrap();
        assert_eq!(table.value_at("0,1", Offset::ZERO), Some(&Value::from("M3")));
    }

    #[test]
    fn metadata_edits_keep_cache() {
        let mut p = piece();
        p.get(&["noterest"], &ChainSettings::new(), None).unwrap();
        p.metadata_mut().unwrap().composer = Some("Palestrina".to_string());
        assert_eq!(p.metadata().unwrap().composer.as_deref(), Some("Palestrina"));
        assert_eq!(p.cached_len(), 1);
    }
}
