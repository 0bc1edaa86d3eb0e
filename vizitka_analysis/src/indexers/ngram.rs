// N-gram indexing and frequency-based filtering.
//
// `ngram` slides a window of `n` consecutive events over each selected
// column of its input (usually vertical intervals) and emits the window as
// one space-separated string on the moment of its first event. With
// `horizontal: "lowest"` it also consumes horizontal intervals directly and
// interleaves the lower voice's melodic motion between the verticals:
// `M3 -m2 P5`. When the lower voice holds through a vertical change there
// is no horizontal interval and the `continuer` stands in. Windows that
// contain a `terminator` value (default `Rest`) are skipped. With
// `brackets`, verticals are written `[M3]` and horizontals `(-m2)`.
//
// `ngram_filter` sits after an experimenter: it reads a summary of n-gram
// counts (for example from `frequency`) and its own direct n-gram input,
// and keeps only the n-grams counted at least `min_count` times.

use crate::analyzer::{Accepts, Analyzer, AnalyzerKind, DirectInput, Inputs, Signature};
use crate::error::{AnalysisError, Result};
use crate::settings::{SettingDefault, SettingKind, SettingSpec, Settings};
use crate::table::{Column, Table};
use crate::value::Value;
use rustc_hash::{FxHashMap, FxHashSet};
use vizitka_score::Offset;

const NGRAM_SETTINGS: &[SettingSpec] = &[
    SettingSpec::required("n", SettingKind::AtLeast(1)),
    SettingSpec::new("vertical", SettingKind::AllOrTextList, SettingDefault::Text("all")),
    SettingSpec::new(
        "horizontal",
        SettingKind::Choice(&["none", "lowest"]),
        SettingDefault::Text("none"),
    ),
    SettingSpec::new("terminator", SettingKind::TextList, SettingDefault::TextList(&["Rest"])),
    SettingSpec::new("continuer", SettingKind::Text, SettingDefault::Text("_")),
    SettingSpec::new("brackets", SettingKind::Bool, SettingDefault::Bool(false)),
];

pub struct NgramIndexer;

impl NgramIndexer {
    fn uses_horizontal(&self, settings: &Settings) -> Result<bool> {
        Ok(settings.text(self.name(), "horizontal")? == "lowest")
    }

    /// Columns of `table` chosen by the `vertical` setting.
    fn selected_columns<'t>(&self, table: &'t Table, settings: &Settings) -> Result<Vec<&'t Column>> {
        match settings.selection(self.name(), "vertical")? {
            None => Ok(table.columns().iter().collect()),
            Some(labels) => labels
                .iter()
                .map(|label| {
                    table.column(label).ok_or_else(|| AnalysisError::UnknownColumn {
                        analyzer: self.name().to_string(),
                        column: label.clone(),
                    })
                })
                .collect(),
        }
    }
}

/// The lower voice of a pair label (`0,1` → `1`); a single part is its own
/// lower voice.
fn lower_voice(label: &str) -> &str {
    label.rsplit(',').next().unwrap_or(label)
}

impl Analyzer for NgramIndexer {
    fn name(&self) -> &'static str {
        "ngram"
    }

    fn short_name(&self) -> &'static str {
        "ng"
    }

    fn signature(&self) -> Signature {
        Signature {
            kind: AnalyzerKind::Indexer,
            accepts: Accepts::Moments,
            default_source: Some("vertical_interval"),
            requires: &[],
        }
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        NGRAM_SETTINGS
    }

    fn direct_inputs(&self, settings: &Settings) -> Result<Vec<DirectInput>> {
        if self.uses_horizontal(settings)? {
            Ok(vec![
                DirectInput::new("horizontal_interval").with_override("attach_later", true),
            ])
        } else {
            Ok(Vec::new())
        }
    }

    fn run(&self, inputs: &Inputs<'_>, settings: &Settings) -> Result<Table> {
        let name = self.name();
        let verticals = inputs.moments(name)?;
        // validated as at least 1; the floor keeps `windows` from panicking
        // when `run` is called on unvalidated settings
        let n = (settings.unsigned(name, "n")? as usize).max(1);
        let terminators: FxHashSet<String> = settings.text_list(name, "terminator")?.into_iter().collect();
        let continuer = settings.text(name, "continuer")?;
        let brackets = settings.bool(name, "brackets")?;
        let horizontals = if self.uses_horizontal(settings)? {
            Some(inputs.direct(name, "horizontal_interval")?)
        } else {
            None
        };

        let mut series = Vec::new();
        for column in self.selected_columns(verticals, settings)? {
            let label = column.key.part.as_str();
            let lower = lower_voice(label);
            let events = verticals.series(column);

            let mut values = Vec::new();
            'windows: for window in events.windows(n) {
                let mut tokens: Vec<String> = Vec::with_capacity(2 * n);
                for (k, (at, vertical)) in window.iter().enumerate() {
                    if k > 0 {
                        if let Some(table) = horizontals {
                            let token = match table.value_at(lower, *at) {
                                Some(h) => {
                                    let h = h.to_string();
                                    if terminators.contains(&h) {
                                        continue 'windows;
                                    }
                                    h
                                }
                                None => continuer.to_string(),
                            };
                            tokens.push(if brackets { format!("({token})") } else { token });
                        }
                    }
                    let v = vertical.to_string();
                    if terminators.contains(&v) {
                        continue 'windows;
                    }
                    tokens.push(if brackets { format!("[{v}]") } else { v });
                }
                let start: Offset = window[0].0;
                values.push((start, Value::Text(tokens.join(" "))));
            }

            let column_label = if horizontals.is_some() {
                format!("{label} : {lower}")
            } else {
                label.to_string()
            };
            series.push((column_label, values));
        }
        Ok(Table::from_moment_series(name, series))
    }
}

pub struct NgramFilterIndexer;

const FILTER_SETTINGS: &[SettingSpec] = &[SettingSpec::new(
    "min_count",
    SettingKind::Unsigned,
    SettingDefault::Unsigned(2),
)];

impl Analyzer for NgramFilterIndexer {
    fn name(&self) -> &'static str {
        "ngram_filter"
    }

    fn short_name(&self) -> &'static str {
        "nf"
    }

    fn signature(&self) -> Signature {
        Signature {
            kind: AnalyzerKind::Indexer,
            accepts: Accepts::Summary,
            default_source: None,
            requires: &[],
        }
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        FILTER_SETTINGS
    }

    fn direct_inputs(&self, _settings: &Settings) -> Result<Vec<DirectInput>> {
        Ok(vec![DirectInput::new("ngram")])
    }

    fn run(&self, inputs: &Inputs<'_>, settings: &Settings) -> Result<Table> {
        let name = self.name();
        let counts = inputs.summary(name)?;
        let ngrams = inputs.direct(name, "ngram")?;
        let min_count = settings.unsigned(name, "min_count")? as f64;

        let labels = counts.require_labels(name)?;
        let mut totals: FxHashMap<&str, f64> = FxHashMap::default();
        for column in counts.columns() {
            for (label, cell) in labels.iter().zip(&column.cells) {
                if let Some(count) = cell.as_ref().and_then(Value::as_f64) {
                    *totals.entry(label.as_str()).or_default() += count;
                }
            }
        }

        let series = ngrams
            .columns()
            .iter()
            .map(|column| {
                let kept = ngrams
                    .series(column)
                    .into_iter()
                    .filter(|(_, v)| {
                        totals.get(v.to_string().as_str()).is_some_and(|c| *c >= min_count)
                    })
                    .collect();
                (column.key.part.clone(), kept)
            })
            .collect();
        Ok(Table::from_moment_series(name, series))
    }
}
