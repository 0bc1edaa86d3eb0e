// Score-reading indexers: note names and durations.
//
// `noterest` is the root of almost every chain. It emits one cell per
// attacked event: the pitch name (`C4`), `Rest`, or a chord as pitch names
// from highest to lowest (`G4 E4 C4`). Tie continuations are not attacks
// and produce no cell. Columns are labelled by part position (`0`, `1`...).
//
// `duration` emits the quarter-length duration of the same events, with
// any tie continuations folded into the note that starts the tie.
//
// `multistop` is noterest with chords split apart: stop `k` of part `p` is
// column `p.k`, holding the k-th pitch from the top. Notes and rests go in
// stop 0. A chord with fewer pitches than an earlier one leaves the higher
// stop numbers empty at that moment.

use super::part_label;
use crate::analyzer::{Accepts, Analyzer, AnalyzerKind, Inputs, Signature};
use crate::error::Result;
use crate::settings::{SettingSpec, Settings};
use crate::table::Table;
use crate::value::Value;
use vizitka_score::{Offset, Score};

pub struct NoterestIndexer;

impl Analyzer for NoterestIndexer {
    fn name(&self) -> &'static str {
        "noterest"
    }

    fn short_name(&self) -> &'static str {
        "nr"
    }

    fn signature(&self) -> Signature {
        Signature {
            kind: AnalyzerKind::Indexer,
            accepts: Accepts::Score,
            default_source: None,
            requires: &[],
        }
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        &[]
    }

    fn run(&self, inputs: &Inputs<'_>, _settings: &Settings) -> Result<Table> {
        Ok(noterest_table(inputs.score))
    }
}

/// The noterest table for a score.
pub fn noterest_table(score: &Score) -> Table {
    let series = score
        .parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let values = part
                .events
                .iter()
                .filter(|e| e.is_attack())
                .map(|e| (e.onset, Value::Text(e.label())))
                .collect();
            (part_label(i), values)
        })
        .collect();
    Table::from_moment_series("noterest", series)
}

pub struct MultistopIndexer;

impl Analyzer for MultistopIndexer {
    fn name(&self) -> &'static str {
        "multistop"
    }

    fn short_name(&self) -> &'static str {
        "mu"
    }

    fn signature(&self) -> Signature {
        Signature {
            kind: AnalyzerKind::Indexer,
            accepts: Accepts::Score,
            default_source: None,
            requires: &[],
        }
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        &[]
    }

    fn run(&self, inputs: &Inputs<'_>, _settings: &Settings) -> Result<Table> {
        let mut series = Vec::new();
        for (i, part) in inputs.score.parts.iter().enumerate() {
            let mut stops: Vec<Vec<(Offset, Value)>> = Vec::new();
            for event in part.events.iter().filter(|e| e.is_attack()) {
                let names = if event.is_rest() {
                    vec!["Rest".to_string()]
                } else {
                    event.pitches_high_to_low().iter().map(|p| p.name()).collect()
                };
                for (stop, name) in names.into_iter().enumerate() {
                    if stops.len() <= stop {
                        stops.push(Vec::new());
                    }
                    stops[stop].push((event.onset, Value::Text(name)));
                }
            }
            let label = part_label(i);
            series.extend(
                stops
                    .into_iter()
                    .enumerate()
                    .map(|(stop, values)| (format!("{label}.{stop}"), values)),
            );
        }
        Ok(Table::from_moment_series("multistop", series))
    }
}

pub struct DurationIndexer;

impl Analyzer for DurationIndexer {
    fn name(&self) -> &'static str {
        "duration"
    }

    fn short_name(&self) -> &'static str {
        "du"
    }

    fn signature(&self) -> Signature {
        Signature {
            kind: AnalyzerKind::Indexer,
            accepts: Accepts::Score,
            default_source: None,
            requires: &[],
        }
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        &[]
    }

    fn run(&self, inputs: &Inputs<'_>, _settings: &Settings) -> Result<Table> {
        let series = inputs
            .score
            .parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                let mut values: Vec<(Offset, Value)> = Vec::new();
                for event in &part.events {
                    if event.is_attack() {
                        values.push((event.onset, Value::Float(event.duration.quarters())));
                    } else if let Some((_, Value::Float(total))) = values.last_mut() {
                        *total += event.duration.quarters();
                    }
                }
                (part_label(i), values)
            })
            .collect();
        Ok(Table::from_moment_series("duration", series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizitka_score::{Part, Tie};

    fn q(quarters: f64) -> Offset {
        Offset::from_quarters(quarters)
    }

    #[test]
    fn noterest_has_one_column_per_part() {
        let a = Part::from_sequence("S", &[("E4", 1.0), ("Rest", 1.0), ("G4 C5", 1.0)]).unwrap();
        let b = Part::from_sequence("B", &[("C3", 2.0), ("G2", 1.0)]).unwrap();
        let score = Score::new(vec![a, b]);
        let table = NoterestIndexer
            .run(&Inputs::new(&score), &Settings::new())
            .unwrap();
        assert_eq!(table.parts(), vec!["0", "1"]);
        assert_eq!(table.moments().unwrap(), &[q(0.0), q(1.0), q(2.0)]);
        assert_eq!(table.value_at("0", q(1.0)), Some(&Value::from("Rest")));
        assert_eq!(table.value_at("0", q(2.0)), Some(&Value::from("C5 G4")));
        assert_eq!(table.value_at("1", q(1.0)), None);
    }

    #[test]
    fn multistop_splits_chords_from_the_top() {
        let mut upper = Part::from_sequence("S", &[("C4 E4 G4", 1.0), ("A4", 1.0), ("A4", 1.0), ("F4 D4", 1.0)]).unwrap();
        upper.events[1].tie = Some(Tie::Start);
        upper.events[2].tie = Some(Tie::Stop);
        let lower = Part::from_sequence("B", &[("Rest", 1.0), ("C3", 3.0)]).unwrap();
        let score = Score::new(vec![upper, lower]);

        let table = MultistopIndexer.run(&Inputs::new(&score), &Settings::new()).unwrap();
        assert_eq!(table.parts(), vec!["0.0", "0.1", "0.2", "1.0"]);
        assert_eq!(table.moments().unwrap(), &[q(0.0), q(1.0), q(3.0)]);
        assert_eq!(table.value_at("0.0", q(0.0)), Some(&Value::from("G4")));
        assert_eq!(table.value_at("0.1", q(0.0)), Some(&Value::from("E4")));
        assert_eq!(table.value_at("0.2", q(0.0)), Some(&Value::from("C4")));
        assert_eq!(table.value_at("0.0", q(1.0)), Some(&Value::from("A4")));
        assert_eq!(table.value_at("0.1", q(1.0)), None);
        assert_eq!(table.value_at("0.1", q(3.0)), Some(&Value::from("D4")));
        assert_eq!(table.value_at("0.2", q(3.0)), None);
        assert_eq!(table.value_at("1.0", q(0.0)), Some(&Value::from("Rest")));
    }

    #[test]
    fn tie_continuations_are_not_attacks() {
        let mut part = Part::from_sequence("S", &[("C4", 1.0), ("C4", 0.5), ("D4", 1.0)]).unwrap();
        part.events[0].tie = Some(Tie::Start);
        part.events[1].tie = Some(Tie::Stop);
        let score = Score::new(vec![part]);
        let inputs = Inputs::new(&score);

        let notes = NoterestIndexer.run(&inputs, &Settings::new()).unwrap();
        assert_eq!(notes.moments().unwrap(), &[q(0.0), q(1.5)]);

        let durations = DurationIndexer.run(&inputs, &Settings::new()).unwrap();
        assert_eq!(durations.value_at("0", q(0.0)), Some(&Value::Float(1.5)));
        assert_eq!(durations.value_at("0", q(1.5)), Some(&Value::Float(1.0)));
    }
}
