// Row-wise column sums.
//
// Adds up the numeric cells of every row into one `all` column. An input
// column already labelled `all` (from an earlier aggregation or a combined
// frequency count) is left out so it is not counted twice. Rows of a
// moment-aligned input become labels written as quarter-note offsets
// (`0`, `1.5`), so the result is always a summary.

use crate::analyzer::{Accepts, Analyzer, AnalyzerKind, Inputs, Signature};
use crate::error::Result;
use crate::settings::{SettingSpec, Settings};
use crate::table::{Column, ColumnKey, RowIndex, Table, add_values};
use crate::value::Value;

pub struct AggregatorExperimenter;

impl Analyzer for AggregatorExperimenter {
    fn name(&self) -> &'static str {
        "aggregator"
    }

    fn short_name(&self) -> &'static str {
        "ag"
    }

    fn signature(&self) -> Signature {
        Signature {
            kind: AnalyzerKind::Experimenter,
            accepts: Accepts::Any,
            default_source: Some("frequency"),
            requires: &[],
        }
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        &[]
    }

    fn run(&self, inputs: &Inputs<'_>, _settings: &Settings) -> Result<Table> {
        let table = inputs.prior(self.name())?;
        let labels: Vec<String> = match table.index() {
            RowIndex::Labels(labels) => labels.clone(),
            RowIndex::Moments(moments) => moments.iter().map(|m| m.to_string()).collect(),
        };

        let summed: Vec<&Column> = table
            .columns()
            .iter()
            .filter(|c| c.key.part != "all")
            .collect();
        let cells = (0..labels.len())
            .map(|row| {
                summed
                    .iter()
                    .filter_map(|c| c.cells[row].as_ref())
                    .filter(|v| v.as_f64().is_some())
                    .fold(None, |acc: Option<Value>, v| match acc {
                        None => Some(v.clone()),
                        Some(total) => Some(add_values(&total, v)),
                    })
            })
            .collect();

        Ok(Table::new(
            RowIndex::Labels(labels),
            vec![Column {
                key: ColumnKey::new(self.name(), "all"),
                cells,
            }],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizitka_score::{Offset, Score};

    fn run(input: &Table) -> Table {
        let score = Score::default();
        let inputs = Inputs {
            score: &score,
            prior: Some(input),
            direct: &[],
        };
        AggregatorExperimenter.run(&inputs, &Settings::new()).unwrap()
    }

    #[test]
    fn sums_summary_rows_and_skips_existing_all() {
        let input = Table::from_label_series(
            "frequency",
            vec![
                ("0,1".into(), vec![("M3".into(), Value::Int(2)), ("P5".into(), Value::Int(1))]),
                ("0,2".into(), vec![("M3".into(), Value::Int(1))]),
                ("all".into(), vec![("M3".into(), Value::Int(99))]),
            ],
        );
        let table = run(&input);
        assert_eq!(table.value_for("all", "M3"), Some(&Value::Int(3)));
        assert_eq!(table.value_for("all", "P5"), Some(&Value::Int(1)));
    }

    #[test]
    fn moment_rows_become_offset_labels() {
        let at = Offset::from_quarters;
        let input = Table::from_moment_series(
            "beat_strength",
            vec![
                ("0".into(), vec![(at(0.0), Value::Float(1.0)), (at(1.5), Value::Float(0.25))]),
                ("1".into(), vec![(at(0.0), Value::Float(1.0)), (at(1.5), Value::Text("x".into()))]),
            ],
        );
        let table = run(&input);
        assert_eq!(table.labels().unwrap(), &["0", "1.5"]);
        assert_eq!(table.value_for("all", "0"), Some(&Value::Float(2.0)));
        assert_eq!(table.value_for("all", "1.5"), Some(&Value::Float(0.25)));
    }
}
