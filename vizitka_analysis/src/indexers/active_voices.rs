// Number of sounding voices.
//
// Reads a noterest table. By default a voice counts while it holds a note
// (values carried forward from each onset); with `attacked` only voices
// that attack at the moment count. With `show_all` off, a row is emitted
// only where the count changes.

use crate::analyzer::{Accepts, Analyzer, AnalyzerKind, Inputs, Signature};
use crate::error::Result;
use crate::settings::{SettingDefault, SettingKind, SettingSpec, Settings};
use crate::table::Table;
use crate::value::Value;

pub struct ActiveVoicesIndexer;

const SETTINGS: &[SettingSpec] = &[
    SettingSpec::new("attacked", SettingKind::Bool, SettingDefault::Bool(false)),
    SettingSpec::new("show_all", SettingKind::Bool, SettingDefault::Bool(false)),
];

impl Analyzer for ActiveVoicesIndexer {
    fn name(&self) -> &'static str {
        "active_voices"
    }

    fn short_name(&self) -> &'static str {
        "av"
    }

    fn signature(&self) -> Signature {
        Signature {
            kind: AnalyzerKind::Indexer,
            accepts: Accepts::Moments,
            default_source: Some("noterest"),
            requires: &["noterest"],
        }
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        SETTINGS
    }

    fn run(&self, inputs: &Inputs<'_>, settings: &Settings) -> Result<Table> {
        let notes = inputs.moments(self.name())?;
        let attacked = settings.bool(self.name(), "attacked")?;
        let show_all = settings.bool(self.name(), "show_all")?;
        let source = if attacked { notes.clone() } else { notes.ffill() };
        let moments = notes.require_moments(self.name())?;

        let mut values = Vec::new();
        let mut previous: Option<i64> = None;
        for (row, at) in moments.iter().enumerate() {
            let count = source
                .columns()
                .iter()
                .filter(|c| matches!(c.cells.get(row), Some(Some(v)) if v.as_text() != Some("Rest")))
                .count() as i64;
            if show_all || previous != Some(count) {
                values.push((*at, Value::Int(count)));
            }
            previous = Some(count);
        }
        Ok(Table::from_moment_series(
            self.name(),
            vec![("all".to_string(), values)],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexers::noterest::noterest_table;
    use vizitka_score::{Offset, Part, Score};

    fn run(settings: Settings) -> Table {
        let a = Part::from_sequence("S", &[("C5", 1.0), ("D5", 1.0), ("Rest", 1.0)]).unwrap();
        let b = Part::from_sequence("A", &[("Rest", 1.0), ("G4", 2.0)]).unwrap();
        let c = Part::from_sequence("B", &[("C3", 3.0)]).unwrap();
        let score = Score::new(vec![a, b, c]);
        let notes = noterest_table(&score);
        let inputs = Inputs {
            score: &score,
            prior: Some(&notes),
            direct: &[],
        };
        let settings = settings.merged_over(&ActiveVoicesIndexer.default_settings());
        ActiveVoicesIndexer.run(&inputs, &settings).unwrap()
    }

    fn counts(table: &Table) -> Vec<(f64, i64)> {
        table
            .series(&table.columns()[0])
            .into_iter()
            .map(|(at, v)| (at.quarters(), v.as_i64().unwrap()))
            .collect()
    }

    #[test]
    fn counts_sounding_voices_on_changes() {
        let table = run(Settings::new());
        assert_eq!(counts(&table), vec![(0.0, 2), (1.0, 3), (2.0, 2)]);
        assert_eq!(table.moments().unwrap().len(), 3);
        assert!(table.value_at("all", Offset::ZERO).is_some());
    }

    #[test]
    fn show_all_and_attacked() {
        let table = run(Settings::new().with("show_all", true).with("attacked", true));
        assert_eq!(counts(&table), vec![(0.0, 2), (1.0, 2), (2.0, 0)]);
    }
}
