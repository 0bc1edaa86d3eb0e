// Spelled pitches and interval naming.
//
// A `Pitch` keeps its letter name and accidental rather than only a MIDI
// number, so intervals can be named diatonically: C4→E4 is a major third
// (M3) while C4→Fb4 is a diminished fourth (d4), even though both span
// four semitones. Pitches read from MIDI files get a default spelling
// (sharps for C#/F#, flats for Eb/Ab/Bb).
//
// Interval names follow the usual analytic shorthand: optional `-` for a
// descending interval, optional quality letters (P, M, m, A, d, AA, dd...),
// then the generic size, compound (10) or reduced to one octave (3).
//
// The `chromatic` submodule has the semitone-only helpers used for
// consonance classification.

use crate::error::ScoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Diatonic letter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    pub const ALL: [Step; 7] = [Step::C, Step::D, Step::E, Step::F, Step::G, Step::A, Step::B];

    /// Position within the octave, C = 0 through B = 6.
    pub fn index(self) -> i32 {
        self as i32
    }

    /// Semitones above C of the natural step.
    pub fn semitone(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Step::C => 'C',
            Step::D => 'D',
            Step::E => 'E',
            Step::F => 'F',
            Step::G => 'G',
            Step::A => 'A',
            Step::B => 'B',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(Step::C),
            'D' => Some(Step::D),
            'E' => Some(Step::E),
            'F' => Some(Step::F),
            'G' => Some(Step::G),
            'A' => Some(Step::A),
            'B' => Some(Step::B),
            _ => None,
        }
    }
}

/// A spelled pitch: letter, chromatic alteration, octave (C4 = middle C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pitch {
    pub step: Step,
    /// Semitones of alteration: +1 sharp, -1 flat, +2 double sharp...
    pub alter: i8,
    pub octave: i8,
}

impl Pitch {
    pub fn new(step: Step, alter: i8, octave: i8) -> Self {
        Pitch { step, alter, octave }
    }

    /// Default spelling for a MIDI note number.
    pub fn from_midi(midi: u8) -> Self {
        const SPELLING: [(Step, i8); 12] = [
            (Step::C, 0),
            (Step::C, 1),
            (Step::D, 0),
            (Step::E, -1),
            (Step::E, 0),
            (Step::F, 0),
            (Step::F, 1),
            (Step::G, 0),
            (Step::A, -1),
            (Step::A, 0),
            (Step::B, -1),
            (Step::B, 0),
        ];
        let (step, alter) = SPELLING[(midi % 12) as usize];
        let octave = (midi / 12) as i8 - 1;
        Pitch { step, alter, octave }
    }

    /// MIDI note number. May fall outside 0..=127 for extreme spellings.
    pub fn midi(self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.step.semitone() + self.alter as i32
    }

    /// Count of diatonic steps above C0's octave origin; used for generic
    /// interval sizes.
    pub fn diatonic(self) -> i32 {
        self.octave as i32 * 7 + self.step.index()
    }

    /// Name with octave, e.g. `C4`, `F#3`, `Bb2`.
    pub fn name(self) -> String {
        let mut out = String::new();
        out.push(self.step.letter());
        if self.alter > 0 {
            out.extend(std::iter::repeat_n('#', self.alter as usize));
        } else if self.alter < 0 {
            out.extend(std::iter::repeat_n('b', self.alter.unsigned_abs() as usize));
        }
        out.push_str(&self.octave.to_string());
        out
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Pitch {
    type Err = ScoreError;

    /// Parses `C4`, `f#3`, `Bb-1`, `C##5`. The octave is required.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScoreError::InvalidPitch(s.to_string());
        let mut chars = s.trim().chars();
        let step = chars.next().and_then(Step::from_letter).ok_or_else(invalid)?;
        let rest = chars.as_str();

        let accidentals: String = rest.chars().take_while(|c| *c == '#' || *c == 'b').collect();
        let octave_str = &rest[accidentals.len()..];
        let alter: i32 = accidentals
            .chars()
            .map(|c| if c == '#' { 1 } else { -1 })
            .sum();
        let octave: i8 = octave_str.parse().map_err(|_| invalid())?;
        let alter = i8::try_from(alter).map_err(|_| invalid())?;
        Ok(Pitch { step, alter, octave })
    }
}

impl TryFrom<String> for Pitch {
    type Error = ScoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Pitch> for String {
    fn from(p: Pitch) -> String {
        p.name()
    }
}

/// Semitones above the unison for the natural (major/perfect) form of each
/// simple generic interval, indexed by generic size - 1.
const NATURAL_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// An interval between two spelled pitches, measured from the first to the
/// second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    steps: i32,
    semitones: i32,
}

impl Interval {
    pub fn between(from: Pitch, to: Pitch) -> Self {
        Interval {
            steps: to.diatonic() - from.diatonic(),
            semitones: to.midi() - from.midi(),
        }
    }

    /// Signed chromatic distance.
    pub fn semitones(self) -> i32 {
        self.semitones
    }

    pub fn is_descending(self) -> bool {
        self.steps < 0 || (self.steps == 0 && self.semitones < 0)
    }

    /// Undirected generic size: 1 = unison, 8 = octave, 10 = compound third.
    pub fn generic(self) -> u32 {
        self.steps.unsigned_abs() + 1
    }

    /// Generic size reduced to one octave. The octave itself stays 8.
    pub fn simple_generic(self) -> u32 {
        let generic = self.generic();
        if generic == 8 { 8 } else { (generic - 1) % 7 + 1 }
    }

    /// Quality letters: P, M, m, A, d, AA, dd...
    pub fn quality(self) -> String {
        let (steps, semitones) = if self.is_descending() {
            (-self.steps, -self.semitones)
        } else {
            (self.steps, self.semitones)
        };
        let simple_index = (steps % 7) as usize;
        let natural = NATURAL_SEMITONES[simple_index] + 12 * (steps / 7);
        let delta = semitones - natural;
        let perfect_type = matches!(simple_index, 0 | 3 | 4);

        if perfect_type {
            match delta {
                0 => "P".to_string(),
                d if d > 0 => "A".repeat(d as usize),
                d => "d".repeat(d.unsigned_abs() as usize),
            }
        } else {
            match delta {
                0 => "M".to_string(),
                -1 => "m".to_string(),
                d if d > 0 => "A".repeat(d as usize),
                d => "d".repeat((d.unsigned_abs() - 1) as usize),
            }
        }
    }

    /// Analytic name, e.g. `M3`, `-P5`, `m10`, `6`.
    pub fn name(self, quality: bool, simple: bool, directed: bool) -> String {
        let mut out = String::new();
        if directed && self.is_descending() {
            out.push('-');
        }
        if quality {
            out.push_str(&self.quality());
        }
        let size = if simple { self.simple_generic() } else { self.generic() };
        out.push_str(&size.to_string());
        out
    }
}

/// Semitone-only interval helpers.
pub mod chromatic {
    /// Interval class (0-6): the interval mod 12, ignoring octave and direction.
    pub fn interval_class(midi_a: i32, midi_b: i32) -> u8 {
        let ic = ((midi_b - midi_a).unsigned_abs() % 12) as u8;
        if ic > 6 { 12 - ic } else { ic }
    }

    /// Unison, fifth, octave and their compounds.
    pub fn is_perfect_consonance(semitones: i32) -> bool {
        matches!(semitones.unsigned_abs() % 12, 0 | 7)
    }

    /// Thirds and sixths.
    pub fn is_imperfect_consonance(semitones: i32) -> bool {
        matches!(semitones.unsigned_abs() % 12, 3 | 4 | 8 | 9)
    }

    /// Seconds, fourths, tritones and sevenths. The fourth counts as a
    /// dissonance against the lowest sounding voice.
    pub fn is_dissonant(semitones: i32) -> bool {
        !is_perfect_consonance(semitones) && !is_imperfect_consonance(semitones)
    }
}
