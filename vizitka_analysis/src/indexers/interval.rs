// Vertical and horizontal interval indexers.
//
// Both read a noterest table. Vertical intervals are computed for every
// pair of columns `i,j` (i < j, column i taken as the upper voice) at each
// moment where either part attacks, with held notes carried forward from
// their onset. A chord contributes its highest pitch when it is the upper
// voice and its lowest pitch when it is the lower voice. If either voice is
// resting the cell is `Rest`; before a voice's first event there is no cell.
//
// Horizontal intervals are melodic: from each event of a part to the next,
// using the lowest pitch of chords, placed on the later event's onset
// (`attach_later`, the default) or the earlier one's.

use crate::analyzer::{Accepts, Analyzer, AnalyzerKind, Inputs, Signature};
use crate::error::{AnalysisError, Result};
use crate::settings::{SettingDefault, SettingKind, SettingSpec, Settings};
use crate::table::Table;
use crate::value::Value;
use vizitka_score::{Interval, Offset, Pitch};

/// What two voices sound at a moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sonority {
    Rest,
    Pitches { upper: Pitch, lower: Pitch },
}

/// Pitches of one noterest cell, highest first. `None` for a rest.
pub(crate) fn cell_pitches(analyzer: &str, value: &Value) -> Result<Option<Vec<Pitch>>> {
    let text = value.as_text().ok_or_else(|| AnalysisError::Failed {
        analyzer: analyzer.to_string(),
        reason: format!("expected note names, found {value}"),
    })?;
    if text == "Rest" {
        return Ok(None);
    }
    let pitches = text
        .split_whitespace()
        .map(|token| {
            token.parse::<Pitch>().map_err(|e| AnalysisError::Failed {
                analyzer: analyzer.to_string(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(if pitches.is_empty() { None } else { Some(pitches) })
}

/// Label for a pair of columns, e.g. `0,1`.
pub(crate) fn pair_label(upper: &str, lower: &str) -> String {
    format!("{upper},{lower}")
}

/// Sonorities for every column pair of a noterest table, at each moment
/// where either voice of the pair attacks.
pub(crate) fn vertical_pairs(analyzer: &str, table: &Table) -> Result<Vec<(String, Vec<(Offset, Sonority)>)>> {
    let moments = table.require_moments(analyzer)?;
    let filled = table.ffill();
    let columns = table.columns();
    let mut pairs = Vec::new();

    for i in 0..columns.len() {
        for j in (i + 1)..columns.len() {
            let mut values = Vec::new();
            for (row, at) in moments.iter().enumerate() {
                if columns[i].cells[row].is_none() && columns[j].cells[row].is_none() {
                    continue;
                }
                let (Some(upper), Some(lower)) = (
                    filled.columns()[i].cells[row].as_ref(),
                    filled.columns()[j].cells[row].as_ref(),
                ) else {
                    continue;
                };
                let sonority = match (cell_pitches(analyzer, upper)?, cell_pitches(analyzer, lower)?) {
                    (Some(up), Some(low)) => match (up.first(), low.last()) {
                        (Some(u), Some(l)) => Sonority::Pitches { upper: *u, lower: *l },
                        _ => Sonority::Rest,
                    },
                    _ => Sonority::Rest,
                };
                values.push((*at, sonority));
            }
            pairs.push((pair_label(&columns[i].key.part, &columns[j].key.part), values));
        }
    }
    Ok(pairs)
}

/// Interval naming options shared by both interval indexers.
#[derive(Debug, Clone, Copy)]
struct IntervalStyle {
    quality: bool,
    simple: bool,
    directed: bool,
}

impl IntervalStyle {
    fn from_settings(analyzer: &str, settings: &Settings) -> Result<Self> {
        Ok(IntervalStyle {
            quality: settings.bool(analyzer, "quality")?,
            simple: settings.text(analyzer, "simple_or_compound")? == "simple",
            directed: settings.bool(analyzer, "directed")?,
        })
    }

    fn name(self, from: Pitch, to: Pitch) -> String {
        Interval::between(from, to).name(self.quality, self.simple, self.directed)
    }
}

const QUALITY: SettingSpec = SettingSpec::new("quality", SettingKind::Bool, SettingDefault::Bool(true));
const DIRECTED: SettingSpec = SettingSpec::new("directed", SettingKind::Bool, SettingDefault::Bool(true));
const SIMPLE_OR_COMPOUND: SettingSpec = SettingSpec::new(
    "simple_or_compound",
    SettingKind::Choice(&["simple", "compound"]),
    SettingDefault::Text("compound"),
);

const VERTICAL_SETTINGS: &[SettingSpec] = &[QUALITY, DIRECTED, SIMPLE_OR_COMPOUND];

const HORIZONTAL_SETTINGS: &[SettingSpec] = &[
    QUALITY,
    DIRECTED,
    SIMPLE_OR_COMPOUND,
    SettingSpec::new("attach_later", SettingKind::Bool, SettingDefault::Bool(true)),
];

/// Producers whose cells are note names, chords, or `Rest`.
pub(crate) const NOTE_PRODUCERS: &[&str] = &["noterest", "multistop"];

const NOTE_READER: Signature = Signature {
    kind: AnalyzerKind::Indexer,
    accepts: Accepts::Moments,
    default_source: Some("noterest"),
    requires: NOTE_PRODUCERS,
};

pub struct VerticalIntervalIndexer;

impl Analyzer for VerticalIntervalIndexer {
    fn name(&self) -> &'static str {
        "vertical_interval"
    }

    fn short_name(&self) -> &'static str {
        "vi"
    }

    fn signature(&self) -> Signature {
        NOTE_READER
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        VERTICAL_SETTINGS
    }

    fn run(&self, inputs: &Inputs<'_>, settings: &Settings) -> Result<Table> {
        let notes = inputs.moments(self.name())?;
        let style = IntervalStyle::from_settings(self.name(), settings)?;
        let series = vertical_pairs(self.name(), notes)?
            .into_iter()
            .map(|(label, values)| {
                let values = values
                    .into_iter()
                    .map(|(at, sonority)| {
                        let name = match sonority {
                            Sonority::Rest => "Rest".to_string(),
                            Sonority::Pitches { upper, lower } => style.name(lower, upper),
                        };
                        (at, Value::Text(name))
                    })
                    .collect();
                (label, values)
            })
            .collect();
        Ok(Table::from_moment_series(self.name(), series))
    }
}

pub struct HorizontalIntervalIndexer;

impl Analyzer for HorizontalIntervalIndexer {
    fn name(&self) -> &'static str {
        "horizontal_interval"
    }

    fn short_name(&self) -> &'static str {
        "hi"
    }

    fn signature(&self) -> Signature {
        NOTE_READER
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        HORIZONTAL_SETTINGS
    }

    fn run(&self, inputs: &Inputs<'_>, settings: &Settings) -> Result<Table> {
        let notes = inputs.moments(self.name())?;
        let style = IntervalStyle::from_settings(self.name(), settings)?;
        let attach_later = settings.bool(self.name(), "attach_later")?;

        let mut series = Vec::new();
        for column in notes.columns() {
            let events = notes.series(column);
            let mut values = Vec::new();
            for pair in events.windows(2) {
                let [(prev_at, prev), (next_at, next)] = pair else {
                    continue;
                };
                let prev = cell_pitches(self.name(), prev)?;
                let next = cell_pitches(self.name(), next)?;
                let name = match (prev.as_deref().and_then(<[Pitch]>::last), next.as_deref().and_then(<[Pitch]>::last)) {
                    (Some(from), Some(to)) => style.name(*from, *to),
                    _ => "Rest".to_string(),
                };
                let at = if attach_later { *next_at } else { *prev_at };
                values.push((at, Value::Text(name)));
            }
            series.push((column.key.part.clone(), values));
        }
        Ok(Table::from_moment_series(self.name(), series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexers::noterest::noterest_table;
    use vizitka_score::{Part, Score};

    fn q(quarters: f64) -> Offset {
        Offset::from_quarters(quarters)
    }

    fn run_with(analyzer: &dyn Analyzer, score: &Score, settings: Settings) -> Table {
        let notes = noterest_table(score);
        let inputs = Inputs {
            score,
            prior: Some(&notes),
            direct: &[],
        };
        let settings = settings.merged_over(&analyzer.default_settings());
        analyzer.run(&inputs, &settings).unwrap()
    }

    fn two_voices() -> Score {
        let upper = Part::from_sequence("S", &[("E4", 1.0), ("G4", 1.0), ("Rest", 1.0), ("C5", 1.0)]).unwrap();
        let lower = Part::from_sequence("B", &[("C4", 2.0), ("B3", 0.5), ("C4", 1.5)]).unwrap();
        Score::new(vec![upper, lower])
    }

    #[test]
    fn vertical_one_row_per_onset_with_held_notes() {
        let table = run_with(&VerticalIntervalIndexer, &two_voices(), Settings::new());
        assert_eq!(table.parts(), vec!["0,1"]);
        assert_eq!(
            table.moments().unwrap(),
            &[q(0.0), q(1.0), q(2.0), q(2.5), q(3.0)]
        );
        assert_eq!(table.value_at("0,1", q(0.0)), Some(&Value::from("M3")));
        // Upper voice moves against a held C4
        assert_eq!(table.value_at("0,1", q(1.0)), Some(&Value::from("P5")));
        assert_eq!(table.value_at("0,1", q(2.0)), Some(&Value::from("Rest")));
        assert_eq!(table.value_at("0,1", q(3.0)), Some(&Value::from("P8")));
    }

    #[test]
    fn vertical_settings_change_names() {
        let settings = Settings::new()
            .with("quality", false)
            .with("simple_or_compound", "simple");
        let upper = Part::from_sequence("S", &[("E5", 1.0)]).unwrap();
        let lower = Part::from_sequence("B", &[("C4", 1.0)]).unwrap();
        let table = run_with(&VerticalIntervalIndexer, &Score::new(vec![upper, lower]), settings);
        assert_eq!(table.value_at("0,1", q(0.0)), Some(&Value::from("3")));
    }

    #[test]
    fn vertical_crossing_is_negative_and_chords_use_outer_voices() {
        let upper = Part::from_sequence("S", &[("C4", 1.0), ("E4 G4", 1.0)]).unwrap();
        let lower = Part::from_sequence("B", &[("E4", 1.0), ("C3 C4", 1.0)]).unwrap();
        let table = run_with(&VerticalIntervalIndexer, &Score::new(vec![upper, lower]), Settings::new());
        assert_eq!(table.value_at("0,1", q(0.0)), Some(&Value::from("-M3")));
        assert_eq!(table.value_at("0,1", q(1.0)), Some(&Value::from("P12")));
    }

    #[test]
    fn horizontal_attaches_to_later_note_by_default() {
        let table = run_with(&HorizontalIntervalIndexer, &two_voices(), Settings::new());
        assert_eq!(table.value_at("0", q(1.0)), Some(&Value::from("m3")));
        assert_eq!(table.value_at("0", q(2.0)), Some(&Value::from("Rest")));
        assert_eq!(table.value_at("1", q(2.0)), Some(&Value::from("-m2")));
        assert_eq!(table.value_at("1", q(0.0)), None);

        let earlier = run_with(
            &HorizontalIntervalIndexer,
            &two_voices(),
            Settings::new().with("attach_later", false),
        );
        assert_eq!(earlier.value_at("0", q(0.0)), Some(&Value::from("m3")));
        assert_eq!(earlier.value_at("1", q(2.5)), Some(&Value::from("m2")));
    }
}
