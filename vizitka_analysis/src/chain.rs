// Chain resolution and validation.
//
// A chain is an ordered list of analyzer names; each step consumes the
// previous step's table. Resolution turns names into a `ResolvedChain`
// before anything runs:
//
// 1. Look up every name (long or short) in the registry.
// 2. While the first step does not read the score, prepend its default
//    source (ngram → vertical_interval → noterest).
// 3. Compute each step's effective settings: analyzer defaults, then the
//    configured defaults, then the caller's settings, then any forced
//    overrides; validate against the analyzer's setting specs.
// 4. Resolve each step's direct inputs as sub-chains. A direct input whose
//    analyzer already appears earlier in the chain (with no overrides)
//    reuses that prefix, so both share one cached result.
// 5. Check each step against what the previous step produces. Summary
//    output may only feed an indexer that accepts summaries and has a
//    moment-aligned direct input of its own. A step that names the
//    producers it reads may only follow one of them.
//
// `fragment()` renders a step as canonical JSON (sorted keys); the model
// layer joins fragments into cache keys.

use crate::analyzer::{Accepts, Analyzer, AnalyzerKind};
use crate::error::{ChainError, Result};
use crate::registry::Registry;
use crate::settings::Settings;
use crate::table::Alignment;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Maximum nesting of direct inputs (and of prepended default sources).
pub const MAX_DEPTH: usize = 8;

/// Per-analyzer settings for a whole chain, keyed by long or short name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainSettings(BTreeMap<String, Settings>);

impl ChainSettings {
    pub fn new() -> Self {
        ChainSettings::default()
    }

    pub fn with(mut self, analyzer: &str, settings: Settings) -> Self {
        self.insert(analyzer, settings);
        self
    }

    pub fn insert(&mut self, analyzer: &str, settings: Settings) {
        self.0.insert(analyzer.to_string(), settings);
    }

    /// Settings given under the analyzer's long name, else its short name.
    pub fn for_analyzer(&self, analyzer: &dyn Analyzer) -> Option<&Settings> {
        self.0
            .get(analyzer.name())
            .or_else(|| self.0.get(analyzer.short_name()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One validated chain step.
#[derive(Clone)]
pub struct ResolvedStep {
    pub analyzer: Arc<dyn Analyzer>,
    /// Effective settings, defaults applied.
    pub settings: Settings,
    pub direct: Vec<ResolvedInput>,
}

impl ResolvedStep {
    pub fn name(&self) -> &'static str {
        self.analyzer.name()
    }

    pub fn output(&self) -> Alignment {
        match self.analyzer.signature().kind {
            AnalyzerKind::Indexer => Alignment::Moments,
            AnalyzerKind::Experimenter => Alignment::Summary,
        }
    }

    /// Canonical description of this step, including its direct inputs.
    pub fn fragment(&self) -> serde_json::Value {
        let inputs: Vec<serde_json::Value> = self
            .direct
            .iter()
            .map(|input| json!({ "name": input.name, "chain": input.chain.fragments() }))
            .collect();
        json!({
            "analyzer": self.analyzer.name(),
            "settings": self.settings,
            "inputs": inputs,
        })
    }
}

impl fmt::Debug for ResolvedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedStep")
            .field("analyzer", &self.analyzer.name())
            .field("settings", &self.settings)
            .field("direct", &self.direct)
            .finish()
    }
}

/// A direct input: the named analyzer's full resolved chain.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub name: &'static str,
    pub chain: ResolvedChain,
}

#[derive(Debug, Clone)]
pub struct ResolvedChain {
    pub steps: Vec<ResolvedStep>,
}

impl ResolvedChain {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(ResolvedStep::name).collect()
    }

    pub fn fragments(&self) -> Vec<serde_json::Value> {
        self.steps.iter().map(ResolvedStep::fragment).collect()
    }

    /// Canonical JSON for the first `len` steps.
    pub fn prefix_fragments(&self, len: usize) -> serde_json::Value {
        serde_json::Value::Array(
            self.steps[..len.min(self.steps.len())]
                .iter()
                .map(ResolvedStep::fragment)
                .collect(),
        )
    }

    /// Prefix of this chain ending at the last step named `name`.
    fn prefix_through(&self, name: &str) -> Option<ResolvedChain> {
        let end = self.steps.iter().rposition(|s| s.name() == name)?;
        Some(ResolvedChain {
            steps: self.steps[..=end].to_vec(),
        })
    }
}

/// Resolves chains against a registry and two layers of settings.
pub struct ChainResolver<'a> {
    registry: &'a Registry,
    defaults: &'a ChainSettings,
    settings: &'a ChainSettings,
}

impl<'a> ChainResolver<'a> {
    /// `defaults` are configured per-analyzer defaults; `settings` are the
    /// caller's and win over them.
    pub fn new(registry: &'a Registry, defaults: &'a ChainSettings, settings: &'a ChainSettings) -> Self {
        ChainResolver {
            registry,
            defaults,
            settings,
        }
    }

    pub fn resolve(&self, chain: &[&str]) -> Result<ResolvedChain> {
        let resolved = self.resolve_at(chain, None, 0)?;
        debug!(chain = ?resolved.names(), "Resolved analyzer chain");
        Ok(resolved)
    }

    fn resolve_at(&self, chain: &[&str], overrides: Option<&Settings>, depth: usize) -> Result<ResolvedChain> {
        if chain.is_empty() {
            return Err(ChainError::Empty.into());
        }
        let mut analyzers = chain
            .iter()
            .map(|name| self.registry.resolve(name))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut prepended = 0;
        while analyzers[0].signature().accepts != Accepts::Score {
            let first = &analyzers[0];
            let source = first.signature().default_source.ok_or_else(|| ChainError::NoSource {
                analyzer: first.name().to_string(),
            })?;
            prepended += 1;
            if prepended > MAX_DEPTH {
                return Err(ChainError::TooDeep {
                    analyzer: first.name().to_string(),
                    limit: MAX_DEPTH,
                }
                .into());
            }
            analyzers.insert(0, self.registry.resolve(source)?);
        }

        let last = analyzers.len() - 1;
        let mut resolved = ResolvedChain { steps: Vec::new() };
        for (i, analyzer) in analyzers.into_iter().enumerate() {
            let forced = if i == last { overrides } else { None };
            let step = self.resolve_step(analyzer, forced, &resolved, depth)?;
            check_link(&step, resolved.steps.last())?;
            resolved.steps.push(step);
        }
        Ok(resolved)
    }

    fn resolve_step(
        &self,
        analyzer: Arc<dyn Analyzer>,
        overrides: Option<&Settings>,
        earlier: &ResolvedChain,
        depth: usize,
    ) -> Result<ResolvedStep> {
        let mut settings = analyzer.default_settings();
        if let Some(configured) = self.defaults.for_analyzer(analyzer.as_ref()) {
            settings = configured.merged_over(&settings);
        }
        if let Some(given) = self.settings.for_analyzer(analyzer.as_ref()) {
            settings = given.merged_over(&settings);
        }
        if let Some(forced) = overrides {
            settings = forced.merged_over(&settings);
        }
        settings.validate(analyzer.name(), analyzer.possible_settings())?;

        let mut direct = Vec::new();
        for input in analyzer.direct_inputs(&settings)? {
            if depth + 1 > MAX_DEPTH {
                return Err(ChainError::TooDeep {
                    analyzer: analyzer.name().to_string(),
                    limit: MAX_DEPTH,
                }
                .into());
            }
            let reused = if input.overrides.is_empty() {
                earlier.prefix_through(input.analyzer)
            } else {
                None
            };
            let chain = match reused {
                Some(chain) => chain,
                None => self.resolve_at(&[input.analyzer], Some(&input.overrides), depth + 1)?,
            };
            let name = chain
                .steps
                .last()
                .map(ResolvedStep::name)
                .unwrap_or(input.analyzer);
            direct.push(ResolvedInput { name, chain });
        }

        Ok(ResolvedStep {
            analyzer,
            settings,
            direct,
        })
    }
}

/// Check that `step` can consume what `previous` produces.
fn check_link(step: &ResolvedStep, previous: Option<&ResolvedStep>) -> std::result::Result<(), ChainError> {
    let signature = step.analyzer.signature();
    let Some(previous) = previous else {
        return Ok(());
    };
    let analyzer = step.name().to_string();
    let previous_name = previous.name().to_string();
    let has_moment_input = step.direct.iter().any(|input| {
        input
            .chain
            .steps
            .last()
            .is_some_and(|s| s.output() == Alignment::Moments)
    });

    let alignment = match (signature.accepts, previous.output()) {
        (Accepts::Score, _) => Err(ChainError::ScoreInputAfter {
            analyzer,
            previous: previous_name,
        }),
        (Accepts::Moments, Alignment::Summary) => Err(ChainError::MomentsLost {
            analyzer,
            previous: previous_name,
        }),
        (Accepts::Summary, Alignment::Moments) => Err(ChainError::SummaryExpected {
            analyzer,
            previous: previous_name,
        }),
        (Accepts::Summary, Alignment::Summary)
            if signature.kind == AnalyzerKind::Indexer && !has_moment_input =>
        {
            Err(ChainError::MomentsLost {
                analyzer,
                previous: previous_name,
            })
        }
        (Accepts::Any, Alignment::Summary) if signature.kind == AnalyzerKind::Indexer && !has_moment_input => {
            Err(ChainError::MomentsLost {
                analyzer,
                previous: previous_name,
            })
        }
        _ => Ok(()),
    };
    alignment?;

    let requires = signature.requires;
    if !requires.is_empty() && !requires.contains(&previous.name()) {
        return Err(ChainError::WrongProducer {
            analyzer: step.name().to_string(),
            previous: previous.name().to_string(),
            expected: requires.join(" or "),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{DirectInput, Inputs, Signature};
    use crate::error::AnalysisError;
    use crate::settings::SettingSpec;
    use crate::table::Table;

    fn resolve(chain: &[&str], settings: &ChainSettings) -> Result<ResolvedChain> {
        let registry = Registry::with_defaults();
        let defaults = ChainSettings::new();
        ChainResolver::new(&registry, &defaults, settings).resolve(chain)
    }

    #[test]
    fn default_sources_are_prepended() {
        let settings = ChainSettings::new().with("ngram", Settings::new().with("n", 2));
        let chain = resolve(&["ngram"], &settings).unwrap();
        assert_eq!(chain.names(), vec!["noterest", "vertical_interval", "ngram"]);
        let chain = resolve(&["hi"], &ChainSettings::new()).unwrap();
        assert_eq!(chain.names(), vec!["noterest", "horizontal_interval"]);
    }

    #[test]
    fn experimenter_into_plain_indexer_is_rejected() {
        let err = resolve(&["noterest", "frequency", "vertical_interval"], &ChainSettings::new())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Chain(ChainError::MomentsLost { .. })));
    }

    #[test]
    fn experimenter_into_indexer_with_direct_moments_is_accepted() {
        let settings = ChainSettings::new().with("ngram", Settings::new().with("n", 2));
        let chain = resolve(&["ngram", "frequency", "ngram_filter"], &settings).unwrap();
        assert_eq!(
            chain.names(),
            vec!["noterest", "vertical_interval", "ngram", "frequency", "ngram_filter"]
        );
        let filter = &chain.steps[4];
        assert_eq!(filter.direct.len(), 1);
        assert_eq!(
            filter.direct[0].chain.names(),
            vec!["noterest", "vertical_interval", "ngram"]
        );
    }

    #[test]
    fn score_reader_cannot_follow_another_step() {
        let err = resolve(&["noterest", "duration"], &ChainSettings::new()).unwrap_err();
        assert!(matches!(err, AnalysisError::Chain(ChainError::ScoreInputAfter { .. })));
    }

    #[test]
    fn note_readers_reject_other_producers() {
        let none = ChainSettings::new();
        for chain in [
            &["duration", "vertical_interval"][..],
            &["vertical_interval", "active_voices"],
            &["beat_strength", "consonance"],
            &["duration", "horizontal_interval"],
        ] {
            let err = resolve(chain, &none).unwrap_err();
            assert!(
                matches!(err, AnalysisError::Chain(ChainError::WrongProducer { .. })),
                "{chain:?} gave {err}"
            );
        }
        assert!(resolve(&["noterest", "active_voices"], &none).is_ok());
        assert!(resolve(&["multistop", "vertical_interval"], &none).is_ok());
    }

    #[test]
    fn windows_start_from_noterest_and_check_their_size() {
        let chain = resolve(&["wi"], &ChainSettings::new()).unwrap();
        assert_eq!(chain.names(), vec!["noterest", "windexer"]);
        assert!(resolve(&["vertical_interval", "windexer"], &ChainSettings::new()).is_ok());
        let zero = ChainSettings::new().with("windexer", Settings::new().with("window_size", 0));
        let err = resolve(&["windexer"], &zero).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidSetting { .. }));
    }

    #[test]
    fn summary_reader_needs_summary() {
        let settings = ChainSettings::new().with("ngram", Settings::new().with("n", 2));
        let err = resolve(&["noterest", "ngram_filter"], &settings).unwrap_err();
        assert!(matches!(err, AnalysisError::Chain(ChainError::SummaryExpected { .. })));
    }

    #[test]
    fn settings_are_validated_during_resolution() {
        let err = resolve(&["ngram"], &ChainSettings::new()).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingSetting { .. }));
        let settings = ChainSettings::new().with("vi", Settings::new().with("colour", "red"));
        let err = resolve(&["vertical_interval"], &settings).unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownSetting { .. }));
        let err = resolve(&[], &ChainSettings::new()).unwrap_err();
        assert!(matches!(err, AnalysisError::Chain(ChainError::Empty)));
        let err = resolve(&["fourier"], &ChainSettings::new()).unwrap_err();
        assert!(matches!(err, AnalysisError::Chain(ChainError::UnknownAnalyzer { .. })));
    }

    #[test]
    fn equal_effective_settings_give_equal_fragments() {
        let explicit = ChainSettings::new().with(
            "vertical_interval",
            Settings::new().with("quality", true).with("directed", true),
        );
        let a = resolve(&["vertical_interval"], &explicit).unwrap();
        let b = resolve(&["vi"], &ChainSettings::new()).unwrap();
        assert_eq!(a.prefix_fragments(2).to_string(), b.prefix_fragments(2).to_string());
        let different = ChainSettings::new().with("vi", Settings::new().with("quality", false));
        let c = resolve(&["vi"], &different).unwrap();
        assert_ne!(a.prefix_fragments(2).to_string(), c.prefix_fragments(2).to_string());
    }

    #[test]
    fn overrides_force_direct_input_settings() {
        let settings = ChainSettings::new()
            .with("ngram", Settings::new().with("n", 2).with("horizontal", "lowest"))
            .with("horizontal_interval", Settings::new().with("attach_later", false));
        let chain = resolve(&["ngram"], &settings).unwrap();
        let ngram = chain.steps.last().unwrap();
        let horizontal = &ngram.direct[0].chain;
        assert_eq!(horizontal.names(), vec!["noterest", "horizontal_interval"]);
        assert!(horizontal.steps[1].settings.bool("hi", "attach_later").unwrap());
    }

    struct Loop;

    impl Analyzer for Loop {
        fn name(&self) -> &'static str {
            "loop"
        }
        fn short_name(&self) -> &'static str {
            "lp"
        }
        fn signature(&self) -> Signature {
            Signature {
                kind: AnalyzerKind::Indexer,
                accepts: Accepts::Moments,
                default_source: Some("loop"),
                requires: &[],
            }
        }
        fn possible_settings(&self) -> &'static [SettingSpec] {
            &[]
        }
        fn direct_inputs(&self, _settings: &Settings) -> Result<Vec<DirectInput>> {
            Ok(Vec::new())
        }
        fn run(&self, _inputs: &Inputs<'_>, _settings: &Settings) -> Result<Table> {
            Ok(Table::empty_moments())
        }
    }

    #[test]
    fn cyclic_default_sources_stop() {
        let mut registry = Registry::with_defaults();
        registry.register(Arc::new(Loop));
        let none = ChainSettings::new();
        let err = ChainResolver::new(&registry, &none, &none)
            .resolve(&["loop"])
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Chain(ChainError::TooDeep { .. })));
    }
}
