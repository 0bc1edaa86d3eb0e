// Metric indexers: beat strength, time signatures, measure numbers, ties.
//
// Beat strength is the weight of an onset within its bar: 1.0 on the
// downbeat and halved at each finer metrical level. Levels come from
// dividing the bar by the prime factors of the numerator, 2s first and
// then 3s (so 4/4 splits 2+2, 6/8 splits 2 then 3, 3/4 splits 3), and
// after that by halving the beat. An onset at a level-k boundary gets
// 0.5^k.
//
// Ties are written with Humdrum tokens: `[` starts a tie, `_` continues
// it, `]` ends it. Unlike the other score readers, the tie index includes
// tie continuations, since they are what it marks.

use super::part_label;
use crate::analyzer::{Accepts, Analyzer, AnalyzerKind, Inputs, Signature};
use crate::error::Result;
use crate::settings::{SettingSpec, Settings};
use crate::table::Table;
use crate::value::Value;
use vizitka_score::{Offset, Score, Tie, TimeSignature};

/// Finest metrical level considered.
const MAX_LEVEL: i32 = 16;

const SCORE_INDEXER: Signature = Signature {
    kind: AnalyzerKind::Indexer,
    accepts: Accepts::Score,
    default_source: None,
    requires: &[],
};

/// Bar divisors from coarsest to finest, before beat halving.
fn metrical_factors(numerator: u8) -> Vec<u32> {
    let mut n = numerator.max(1) as u32;
    let mut factors = Vec::new();
    for prime in [2, 3] {
        while n % prime == 0 {
            factors.push(prime);
            n /= prime;
        }
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}

/// Weight of a position `pos` ticks after a barline.
pub fn beat_strength(pos: Offset, ts: TimeSignature) -> f64 {
    let pos = pos.ticks();
    let mut segment = ts.bar_length().ticks().max(1);
    if pos % segment == 0 {
        return 1.0;
    }
    let factors = metrical_factors(ts.numerator);
    let mut level = 0;
    while level < MAX_LEVEL {
        let divisor = factors.get(level as usize).copied().unwrap_or(2);
        if segment % divisor != 0 {
            break;
        }
        segment /= divisor;
        level += 1;
        if pos % segment == 0 {
            return 0.5f64.powi(level);
        }
    }
    0.5f64.powi(level + 1)
}

/// Barline at or before `at`, from `(number, start)` pairs in order.
fn bar_start(measures: &[(u32, Offset)], at: Offset) -> Offset {
    measures
        .iter()
        .take_while(|(_, start)| *start <= at)
        .last()
        .map(|(_, start)| *start)
        .unwrap_or_default()
}

pub struct BeatStrengthIndexer;

impl Analyzer for BeatStrengthIndexer {
    fn name(&self) -> &'static str {
        "beat_strength"
    }

    fn short_name(&self) -> &'static str {
        "bs"
    }

    fn signature(&self) -> Signature {
        SCORE_INDEXER
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        &[]
    }

    fn run(&self, inputs: &Inputs<'_>, _settings: &Settings) -> Result<Table> {
        let score = inputs.score;
        let measures = score.measures();
        let series = score
            .parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                let values = part
                    .events
                    .iter()
                    .filter(|e| e.is_attack())
                    .map(|e| {
                        let start = bar_start(&measures, e.onset);
                        let ts = score.time_signature_at(start);
                        (e.onset, Value::Float(beat_strength(e.onset - start, ts)))
                    })
                    .collect();
                (part_label(i), values)
            })
            .collect();
        Ok(Table::from_moment_series("beat_strength", series))
    }
}

pub struct TimeSignatureIndexer;

/// Declared time signatures, or an implied 4/4 at the start.
fn time_signature_changes(score: &Score) -> Vec<(Offset, TimeSignature)> {
    if score.time_signatures.is_empty() {
        vec![(Offset::ZERO, TimeSignature::default())]
    } else {
        score.time_signatures.clone()
    }
}

impl Analyzer for TimeSignatureIndexer {
    fn name(&self) -> &'static str {
        "time_signature"
    }

    fn short_name(&self) -> &'static str {
        "ts"
    }

    fn signature(&self) -> Signature {
        SCORE_INDEXER
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        &[]
    }

    fn run(&self, inputs: &Inputs<'_>, _settings: &Settings) -> Result<Table> {
        let changes = time_signature_changes(inputs.score);
        let series = (0..inputs.score.parts.len())
            .map(|i| {
                let values = changes
                    .iter()
                    .map(|(at, ts)| (*at, Value::Text(ts.to_string())))
                    .collect();
                (part_label(i), values)
            })
            .collect();
        Ok(Table::from_moment_series("time_signature", series))
    }
}

pub struct MeasureIndexer;

impl Analyzer for MeasureIndexer {
    fn name(&self) -> &'static str {
        "measure"
    }

    fn short_name(&self) -> &'static str {
        "me"
    }

    fn signature(&self) -> Signature {
        SCORE_INDEXER
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        &[]
    }

    fn run(&self, inputs: &Inputs<'_>, _settings: &Settings) -> Result<Table> {
        let measures = inputs.score.measures();
        let series = inputs
            .score
            .parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                let end = part.end();
                let values = measures
                    .iter()
                    .filter(|(_, start)| *start < end)
                    .map(|(number, start)| (*start, Value::Int(*number as i64)))
                    .collect();
                (part_label(i), values)
            })
            .collect();
        Ok(Table::from_moment_series("measure", series))
    }
}

/// Humdrum token for a tie mark.
fn tie_token(tie: Tie) -> &'static str {
    match tie {
        Tie::Start => "[",
        Tie::Continue => "_",
        Tie::Stop => "]",
    }
}

pub struct TieIndexer;

impl Analyzer for TieIndexer {
    fn name(&self) -> &'static str {
        "tie"
    }

    fn short_name(&self) -> &'static str {
        "ti"
    }

    fn signature(&self) -> Signature {
        SCORE_INDEXER
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
                let values = part
                    .events
                    .iter()
                    .filter_map(|e| Some((e.onset, Value::from(tie_token(e.tie?)))))
                    .collect();
                (part_label(i), values)
            })
            .collect();
        Ok(Table::from_moment_series("tie", series))
    }
}
