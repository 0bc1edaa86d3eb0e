// In-memory score: parts of timed events, time signatures, and metadata.
//
// Events within a part are ordered by onset and do not overlap; a chord is
// a single event carrying several pitches. Tied notes are separate events
// whose `tie` marks the start, continuation, and end of the tie; analyzers
// that care about attacks skip the continuations.
//
// Measures are not stored. `Score::measures()` derives barlines from the
// time signature list, treating every time signature change as a new bar.

use crate::error::{Result, ScoreError};
use crate::offset::{Offset, TICKS_PER_QUARTER};
use crate::pitch::Pitch;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tie {
    Start,
    Continue,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventContent {
    Note(Pitch),
    Chord(Vec<Pitch>),
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub onset: Offset,
    pub duration: Offset,
    pub content: EventContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tie: Option<Tie>,
}

impl Event {
    pub fn new(onset: Offset, duration: Offset, content: EventContent) -> Self {
        Event {
            onset,
            duration,
            content,
            tie: None,
        }
    }

    pub fn end(&self) -> Offset {
        self.onset + self.duration
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.content, EventContent::Rest)
    }

    /// True unless this event continues a tie from an earlier one.
    pub fn is_attack(&self) -> bool {
        !matches!(self.tie, Some(Tie::Continue) | Some(Tie::Stop))
    }

    /// Sounding pitches in stored order. Empty for rests.
    pub fn pitches(&self) -> &[Pitch] {
        match &self.content {
            EventContent::Note(p) => std::slice::from_ref(p),
            EventContent::Chord(ps) => ps,
            EventContent::Rest => &[],
        }
    }

    /// Pitches ordered from highest to lowest.
    pub fn pitches_high_to_low(&self) -> Vec<Pitch> {
        let mut pitches = self.pitches().to_vec();
        pitches.sort_by_key(|p| std::cmp::Reverse(p.midi()));
        pitches
    }

    /// `C4`, `Rest`, or a chord as `E4 C4` (highest first).
    pub fn label(&self) -> String {
        if self.is_rest() {
            return "Rest".to_string();
        }
        self.pitches_high_to_low()
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    pub events: Vec<Event>,
}

impl Part {
    pub fn new(name: impl Into<String>, events: Vec<Event>) -> Self {
        Part {
            name: name.into(),
            events,
        }
    }

    /// Build a part from consecutive `(content, quarter_length)` entries.
    /// Content is a pitch name, `Rest`, or space-separated pitch names for a
    /// chord. Handy for tests and small hand-written fixtures.
    pub fn from_sequence(name: impl Into<String>, entries: &[(&str, f64)]) -> Result<Self> {
        let mut events = Vec::with_capacity(entries.len());
        let mut onset = Offset::ZERO;
        for &(content, quarters) in entries {
            if !quarters.is_finite() || quarters <= 0.0 {
                return Err(ScoreError::InvalidDuration(quarters));
            }
            let duration = Offset::from_quarters(quarters);
            let content = parse_content(content)?;
            events.push(Event::new(onset, duration, content));
            onset = onset
                .checked_add(duration)
                .ok_or(ScoreError::TooLong(onset.ticks() as u64 + duration.ticks() as u64))?;
        }
        Ok(Part::new(name, events))
    }

    /// Lowest and highest sounding pitch, by MIDI number.
    pub fn range(&self) -> Option<(Pitch, Pitch)> {
        let mut pitches = self.events.iter().flat_map(|e| e.pitches().iter().copied());
        let first = pitches.next()?;
        Some(pitches.fold((first, first), |(lo, hi), p| {
            (
                if p.midi() < lo.midi() { p } else { lo },
                if p.midi() > hi.midi() { p } else { hi },
            )
        }))
    }

    pub fn end(&self) -> Offset {
        self.events.iter().map(Event::end).max().unwrap_or_default()
    }
}

fn parse_content(content: &str) -> Result<EventContent> {
    let content = content.trim();
    if content.eq_ignore_ascii_case("rest") || content.is_empty() {
        return Ok(EventContent::Rest);
    }
    let pitches = content
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<Vec<Pitch>>>()?;
    Ok(match <[Pitch; 1]>::try_from(pitches) {
        Ok([single]) => EventContent::Note(single),
        Err(many) => EventContent::Chord(many),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub fn new(numerator: u8, denominator: u8) -> Self {
        TimeSignature {
            numerator,
            denominator,
        }
    }

    /// Length of one notated beat (the denominator's note value).
    pub fn beat_length(self) -> Offset {
        Offset(TICKS_PER_QUARTER * 4 / self.denominator.max(1) as u32)
    }

    pub fn bar_length(self) -> Offset {
        Offset(self.beat_length().ticks() * self.numerator.max(1) as u32)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature::new(4, 4)
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Piece-level descriptive data. Loaders fill what the file provides;
/// `load::finalize_metadata` fills the title, part names, and ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub title: String,
    pub composer: Option<String>,
    /// `YYYY/MM/DD` or `YYYY/MM/DD to YYYY/MM/DD`.
    pub date: Option<String>,
    pub locale_of_composition: Option<String>,
    pub movement_name: Option<String>,
    pub movement_number: Option<String>,
    pub opus_number: Option<String>,
    pub pathname: String,
    pub parts: Vec<String>,
    /// Per part, `(lowest, highest)` pitch names; `None` for an all-rest part.
    pub part_ranges: Vec<Option<(String, String)>>,
    pub piece_range: Option<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    #[serde(default)]
    pub metadata: Metadata,
    pub parts: Vec<Part>,
    /// `(offset, signature)` pairs in offset order.
    #[serde(default)]
    pub time_signatures: Vec<(Offset, TimeSignature)>,
}

impl Score {
    pub fn new(parts: Vec<Part>) -> Self {
        Score {
            metadata: Metadata::default(),
            parts,
            time_signatures: Vec::new(),
        }
    }

    pub fn with_time_signature(mut self, at: Offset, ts: TimeSignature) -> Self {
        self.time_signatures.push((at, ts));
        self.time_signatures.sort_by_key(|(off, _)| *off);
        self
    }

    /// End of the last sounding or resting event in any part.
    pub fn highest_time(&self) -> Offset {
        self.parts.iter().map(Part::end).max().unwrap_or_default()
    }

    /// Time signature in effect at `at`; 4/4 before the first one.
    pub fn time_signature_at(&self, at: Offset) -> TimeSignature {
        self.time_signatures
            .iter()
            .take_while(|(off, _)| *off <= at)
            .last()
            .map(|(_, ts)| *ts)
            .unwrap_or_default()
    }

    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    /// A copy holding only the named parts, in the requested order.
    pub fn select_parts(&self, names: &[&str]) -> Result<Score> {
        let parts = names
            .iter()
            .map(|name| {
                self.part(name)
                    .cloned()
                    .ok_or_else(|| ScoreError::UnknownPart(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut metadata = self.metadata.clone();
        metadata.part_ranges = names
            .iter()
            .map(|name| {
                let idx = self.parts.iter().position(|p| p.name == *name);
                idx.and_then(|i| self.metadata.part_ranges.get(i).cloned().flatten())
            })
            .collect();
        metadata.parts = names.iter().map(|n| n.to_string()).collect();
        Ok(Score {
            metadata,
            parts,
            time_signatures: self.time_signatures.clone(),
        })
    }

    /// `(measure_number, start)` for every bar up to the end of the piece.
    /// Numbering starts at 1; a time signature change always opens a new bar.
    pub fn measures(&self) -> Vec<(u32, Offset)> {
        let end = self.highest_time();
        let mut out = Vec::new();
        let mut at = Offset::ZERO;
        let mut number = 1;
        while at < end {
            out.push((number, at));
            let bar_end = at + self.time_signature_at(at).bar_length();
            let next_change = self
                .time_signatures
                .iter()
                .map(|(off, _)| *off)
                .find(|off| *off > at && *off < bar_end);
            at = next_change.unwrap_or(bar_end);
            number += 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(quarters: f64) -> Offset {
        Offset::from_quarters(quarters)
    }

    #[test]
    fn from_sequence_builds_consecutive_events() {
        let part = Part::from_sequence("S", &[("C4", 1.0), ("Rest", 0.5), ("E4 C4", 2.0)]).unwrap();
        assert_eq!(part.events.len(), 3);
        assert_eq!(part.events[1].onset, q(1.0));
        assert!(part.events[1].is_rest());
        assert_eq!(part.events[2].onset, q(1.5));
        assert_eq!(part.end(), q(3.5));
        assert!(matches!(part.events[2].content, EventContent::Chord(ref ps) if ps.len() == 2));
    }

    #[test]
    fn from_sequence_rejects_bad_input() {
        assert!(matches!(
            Part::from_sequence("S", &[("C4", 0.0)]),
            Err(ScoreError::InvalidDuration(_))
        ));
        assert!(matches!(
            Part::from_sequence("S", &[("Q4", 1.0)]),
            Err(ScoreError::InvalidPitch(_))
        ));
    }

    #[test]
    fn from_sequence_rejects_parts_past_the_tick_range() {
        // 5e6 quarters is 2.4e9 ticks; two of them overflow u32
        assert!(Part::from_sequence("S", &[("C4", 5e6)]).is_ok());
        assert!(matches!(
            Part::from_sequence("S", &[("C4", 5e6), ("D4", 5e6)]),
            Err(ScoreError::TooLong(_))
        ));
    }

    #[test]
    fn chord_label_is_high_to_low() {
        let part = Part::from_sequence("S", &[("C4 G4 E4", 1.0)]).unwrap();
        assert_eq!(part.events[0].label(), "G4 E4 C4");
    }

    #[test]
    fn range_ignores_rests() {
        let part = Part::from_sequence("S", &[("Rest", 1.0), ("G4", 1.0), ("C3 E5", 1.0)]).unwrap();
        let (lo, hi) = part.range().unwrap();
        assert_eq!(lo.name(), "C3");
        assert_eq!(hi.name(), "E5");
        let rests = Part::from_sequence("S", &[("Rest", 1.0)]).unwrap();
        assert!(rests.range().is_none());
    }

    #[test]
    fn time_signature_lengths() {
        assert_eq!(TimeSignature::new(3, 4).bar_length(), q(3.0));
        assert_eq!(TimeSignature::new(6, 8).bar_length(), q(3.0));
        assert_eq!(TimeSignature::new(6, 8).beat_length(), q(0.5));
        assert_eq!(TimeSignature::new(2, 2).to_string(), "2/2");
    }

    #[test]
    fn measures_follow_time_signature_changes() {
        let part = Part::from_sequence("S", &[("C4", 4.0), ("D4", 3.0), ("E4", 3.0)]).unwrap();
        let score = Score::new(vec![part])
            .with_time_signature(Offset::ZERO, TimeSignature::new(4, 4))
            .with_time_signature(q(4.0), TimeSignature::new(3, 4));
        let measures = score.measures();
        assert_eq!(measures, vec![(1, q(0.0)), (2, q(4.0)), (3, q(7.0))]);
        assert_eq!(score.time_signature_at(q(5.0)), TimeSignature::new(3, 4));
        assert_eq!(score.time_signature_at(Offset::ZERO), TimeSignature::new(4, 4));
    }

    #[test]
    fn select_parts_reorders_and_rejects_unknown() {
        let a = Part::from_sequence("A", &[("C4", 1.0)]).unwrap();
        let b = Part::from_sequence("B", &[("E4", 1.0)]).unwrap();
        let score = Score::new(vec![a, b]);
        let picked = score.select_parts(&["B", "A"]).unwrap();
        assert_eq!(picked.parts[0].name, "B");
        assert_eq!(picked.metadata.parts, vec!["B", "A"]);
        assert!(matches!(score.select_parts(&["Z"]), Err(ScoreError::UnknownPart(_))));
    }

    #[test]
    fn score_json_roundtrip_uses_readable_pitches() {
        let part = Part::from_sequence("S", &[("C4", 1.0), ("Rest", 1.0)]).unwrap();
        let score = Score::new(vec![part]);
        let json = serde_json::to_string(&score).unwrap();
        assert!(json.contains("\"note\":\"C4\""));
        assert!(json.contains("\"rest\""));
        let back: Score = serde_json::from_str(&json).unwrap();
        assert_eq!(back, score);
    }
}
