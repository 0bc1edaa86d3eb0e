// The analyzer contract.
//
// An analyzer is a stateless function from (inputs, settings) to a `Table`.
// Indexers produce moment-aligned tables; experimenters produce summaries.
// Each analyzer publishes a `Signature` that tells the chain resolver what
// its piped input must be and which analyzer to prepend when it starts a
// chain. An analyzer that reads particular values (note names, say) also
// names the producers it can follow. It may name further analyzers whose
// output it consumes directly (for example, n-grams interleaving
// horizontal intervals). The resolver checks all of this before anything
// runs; `run` can assume its inputs have the declared shape.

use crate::error::{AnalysisError, Result};
use crate::settings::{SettingSpec, Settings, defaults_of};
use crate::table::Table;
use std::sync::Arc;
use vizitka_score::Score;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyzerKind {
    /// Produces a moment-aligned table.
    Indexer,
    /// Produces a summary table.
    Experimenter,
}

/// What an analyzer's piped input must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accepts {
    Score,
    Moments,
    Summary,
    /// Moments or summary.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub kind: AnalyzerKind,
    pub accepts: Accepts,
    /// Analyzer prepended when this one starts a chain. `None` for
    /// analyzers that read the score.
    pub default_source: Option<&'static str>,
    /// Analyzers whose output this one can read when piped. Empty means any
    /// producer of the accepted alignment.
    pub requires: &'static [&'static str],
}

/// An analyzer whose output is fed to another directly, outside the piped
/// chain, with some settings forced.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectInput {
    pub analyzer: &'static str,
    pub overrides: Settings,
}

impl DirectInput {
    pub fn new(analyzer: &'static str) -> Self {
        DirectInput {
            analyzer,
            overrides: Settings::new(),
        }
    }

    pub fn with_override(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.overrides.set(name, value);
        self
    }
}

/// Everything an analyzer may read while running.
pub struct Inputs<'a> {
    pub score: &'a Score,
    /// Output of the previous chain step; `None` for the first step.
    pub prior: Option<&'a Table>,
    /// Results of the analyzer's direct inputs, by analyzer name.
    pub direct: &'a [(&'static str, Arc<Table>)],
}

impl<'a> Inputs<'a> {
    pub fn new(score: &'a Score) -> Self {
        Inputs {
            score,
            prior: None,
            direct: &[],
        }
    }

    pub fn prior(&self, analyzer: &str) -> Result<&'a Table> {
        self.prior.ok_or_else(|| AnalysisError::MissingInput {
            analyzer: analyzer.to_string(),
            input: "piped table".to_string(),
        })
    }

    /// Previous step's table, which must be moment-aligned.
    pub fn moments(&self, analyzer: &str) -> Result<&'a Table> {
        let table = self.prior(analyzer)?;
        table.require_moments(analyzer)?;
        Ok(table)
    }

    /// Previous step's table, which must be a summary.
    pub fn summary(&self, analyzer: &str) -> Result<&'a Table> {
        let table = self.prior(analyzer)?;
        table.require_labels(analyzer)?;
        Ok(table)
    }

    pub fn direct(&self, analyzer: &str, input: &str) -> Result<&'a Table> {
        self.direct
            .iter()
            .find(|(name, _)| *name == input)
            .map(|(_, table)| table.as_ref())
            .ok_or_else(|| AnalysisError::MissingInput {
                analyzer: analyzer.to_string(),
                input: input.to_string(),
            })
    }
}

pub trait Analyzer: Send + Sync {
    /// Long name, e.g. `vertical_interval`.
    fn name(&self) -> &'static str;

    /// Short alias, e.g. `vi`.
    fn short_name(&self) -> &'static str;

    fn signature(&self) -> Signature;

    /// Every setting this analyzer recognises.
    fn possible_settings(&self) -> &'static [SettingSpec];

    fn default_settings(&self) -> Settings {
        defaults_of(self.possible_settings())
    }

    /// Analyzers consumed directly under the given (validated) settings.
    fn direct_inputs(&self, _settings: &Settings) -> Result<Vec<DirectInput>> {
        Ok(Vec::new())
    }

    fn run(&self, inputs: &Inputs<'_>, settings: &Settings) -> Result<Table>;
}
