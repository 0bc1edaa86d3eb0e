// Consonance classification of voice pairs.
//
// For every pair of voices, at the same moments as vertical intervals:
// `P` for perfect consonances (unisons, fifths, octaves), `I` for imperfect
// ones (thirds and sixths), `D` for everything else including the fourth,
// and `Rest` when either voice is silent.

use super::interval::{NOTE_PRODUCERS, Sonority, vertical_pairs};
use crate::analyzer::{Accepts, Analyzer, AnalyzerKind, Inputs, Signature};
use crate::error::Result;
use crate::settings::{SettingSpec, Settings};
use crate::table::Table;
use crate::value::Value;
use vizitka_score::pitch::chromatic;

pub struct ConsonanceIndexer;

fn classify(sonority: Sonority) -> &'static str {
    match sonority {
        Sonority::Rest => "Rest",
        Sonority::Pitches { upper, lower } => {
            let semitones = upper.midi() - lower.midi();
            if chromatic::is_perfect_consonance(semitones) {
                "P"
            } else if chromatic::is_imperfect_consonance(semitones) {
                "I"
            } else {
                "D"
            }
        }
    }
}

impl Analyzer for ConsonanceIndexer {
    fn name(&self) -> &'static str {
        "consonance"
    }

    fn short_name(&self) -> &'static str {
        "co"
    }

    fn signature(&self) -> Signature {
        Signature {
            kind: AnalyzerKind::Indexer,
            accepts: Accepts::Moments,
            default_source: Some("noterest"),
            requires: NOTE_PRODUCERS,
        }
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        &[]
    }

    fn run(&self, inputs: &Inputs<'_>, _settings: &Settings) -> Result<Table> {
        let notes = inputs.moments(self.name())?;
        let series = vertical_pairs(self.name(), notes)?
            .into_iter()
            .map(|(label, values)| {
                let values = values
                    .into_iter()
                    .map(|(at, sonority)| (at, Value::from(classify(sonority))))
                    .collect();
                (label, values)
            })
            .collect();
        Ok(Table::from_moment_series(self.name(), series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexers::noterest::noterest_table;
    use vizitka_score::{Offset, Part, Score};

    #[test]
    fn classifies_each_sonority() {
        let upper = Part::from_sequence("S", &[("G4", 1.0), ("E4", 1.0), ("F4", 1.0), ("D4", 1.0), ("Rest", 1.0)]).unwrap();
        let lower = Part::from_sequence("B", &[("C4", 5.0)]).unwrap();
        let score = Score::new(vec![upper, lower]);
        let notes = noterest_table(&score);
        let inputs = Inputs {
            score: &score,
            prior: Some(&notes),
            direct: &[],
        };
        let table = ConsonanceIndexer.run(&inputs, &Settings::new()).unwrap();
        let at = |q: f64| table.value_at("0,1", Offset::from_quarters(q)).and_then(Value::as_text);
        assert_eq!(at(0.0), Some("P"));
        assert_eq!(at(1.0), Some("I"));
        assert_eq!(at(2.0), Some("D"));
        assert_eq!(at(3.0), Some("D"));
        assert_eq!(at(4.0), Some("Rest"));
    }
}
