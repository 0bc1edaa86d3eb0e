// Value frequencies.
//
// Counts how often each distinct value occurs in each column of a
// moment-aligned table. Rows are the distinct values, ordered by total
// count across all columns (highest first) and then by label, so the most
// common intervals or n-grams come first. With `combine`, the per-column
// counts are summed into a single `all` column.

use crate::analyzer::{Accepts, Analyzer, AnalyzerKind, Inputs, Signature};
use crate::error::Result;
use crate::settings::{SettingDefault, SettingKind, SettingSpec, Settings};
use crate::table::{Column, ColumnKey, RowIndex, Table};
use crate::value::Value;
use rustc_hash::FxHashMap;

pub struct FrequencyExperimenter;

const SETTINGS: &[SettingSpec] = &[SettingSpec::new(
    "combine",
    SettingKind::Bool,
    SettingDefault::Bool(false),
)];

impl Analyzer for FrequencyExperimenter {
    fn name(&self) -> &'static str {
        "frequency"
    }

    fn short_name(&self) -> &'static str {
        "fr"
    }

    fn signature(&self) -> Signature {
        Signature {
            kind: AnalyzerKind::Experimenter,
            accepts: Accepts::Moments,
            default_source: Some("noterest"),
            requires: &[],
        }
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        SETTINGS
    }

    fn run(&self, inputs: &Inputs<'_>, settings: &Settings) -> Result<Table> {
        let table = inputs.moments(self.name())?;
        let combine = settings.bool(self.name(), "combine")?;

        let mut per_column: Vec<(String, FxHashMap<String, i64>)> = Vec::new();
        for column in table.columns() {
            let mut counts: FxHashMap<String, i64> = FxHashMap::default();
            for value in column.cells.iter().flatten() {
                *counts.entry(value.to_string()).or_default() += 1;
            }
            if combine {
                if per_column.is_empty() {
                    per_column.push(("all".to_string(), FxHashMap::default()));
                }
                let all = &mut per_column[0].1;
                for (label, count) in counts {
                    *all.entry(label).or_default() += count;
                }
            } else {
                per_column.push((column.key.part.clone(), counts));
            }
        }

        let mut totals: FxHashMap<&str, i64> = FxHashMap::default();
        for (_, counts) in &per_column {
            for (label, count) in counts {
                *totals.entry(label.as_str()).or_default() += count;
            }
        }
        let mut order: Vec<(&str, i64)> = totals.into_iter().collect();
        order.sort_by(|(la, ca), (lb, cb)| cb.cmp(ca).then_with(|| la.cmp(lb)));

        let labels: Vec<String> = order.iter().map(|(label, _)| label.to_string()).collect();
        let columns = per_column
            .iter()
            .map(|(part, counts)| Column {
                key: ColumnKey::new(self.name(), part.clone()),
                cells: labels.iter().map(|l| counts.get(l).map(|c| Value::Int(*c))).collect(),
            })
            .collect();
        Ok(Table::new(RowIndex::Labels(labels), columns))
    }
}
