// Name → analyzer lookup.
//
// Every analyzer is reachable under its long and short name. The default
// registry holds the full built-in catalogue; callers can register their
// own analyzers on top.

use crate::analyzer::Analyzer;
use crate::error::ChainError;
use crate::experimenters::{AggregatorExperimenter, FrequencyExperimenter};
use crate::indexers::{
    ActiveVoicesIndexer, BeatStrengthIndexer, ConsonanceIndexer, DurationIndexer,
    HorizontalIntervalIndexer, MeasureIndexer, MultistopIndexer, NgramFilterIndexer, NgramIndexer,
    NoterestIndexer, TieIndexer, TimeSignatureIndexer, VerticalIntervalIndexer, WindexerIndexer,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct Registry {
    analyzers: Vec<Arc<dyn Analyzer>>,
    by_name: FxHashMap<&'static str, usize>,
}

impl Registry {
    pub fn empty() -> Self {
        Registry {
            analyzers: Vec::new(),
            by_name: FxHashMap::default(),
        }
    }

    /// Registry holding every built-in analyzer.
    pub fn with_defaults() -> Self {
        let mut registry = Registry::empty();
        registry.register(Arc::new(NoterestIndexer));
        registry.register(Arc::new(MultistopIndexer));
        registry.register(Arc::new(DurationIndexer));
        registry.register(Arc::new(BeatStrengthIndexer));
        registry.register(Arc::new(TimeSignatureIndexer));
        registry.register(Arc::new(MeasureIndexer));
        registry.register(Arc::new(TieIndexer));
        registry.register(Arc::new(VerticalIntervalIndexer));
        registry.register(Arc::new(HorizontalIntervalIndexer));
        registry.register(Arc::new(ActiveVoicesIndexer));
        registry.register(Arc::new(ConsonanceIndexer));
        registry.register(Arc::new(NgramIndexer));
        registry.register(Arc::new(NgramFilterIndexer));
        registry.register(Arc::new(WindexerIndexer));
        registry.register(Arc::new(FrequencyExperimenter));
        registry.register(Arc::new(AggregatorExperimenter));
        registry
    }

    /// Add an analyzer. A later registration under an existing name
    /// replaces the earlier lookup.
    pub fn register(&mut self, analyzer: Arc<dyn Analyzer>) {
        let index = self.analyzers.len();
        self.by_name.insert(analyzer.name(), index);
        self.by_name.insert(analyzer.short_name(), index);
        self.analyzers.push(analyzer);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Analyzer>> {
        self.by_name
            .get(name)
            .map(|&index| Arc::clone(&self.analyzers[index]))
    }

    /// Like `get`, with an error listing the known long names.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Analyzer>, ChainError> {
        self.get(name).ok_or_else(|| ChainError::UnknownAnalyzer {
            name: name.to_string(),
            known: self.names().join(", "),
        })
    }

    /// Long names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::with_defaults()
    }
}
