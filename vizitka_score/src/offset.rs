// Tick-based positions in a score.
//
// Every onset and duration is an integer number of ticks. 480 ticks per
// quarter note matches the MIDI output resolution and divides evenly into
// triplets and 64th notes, so all common rhythms are exact and offsets can
// be compared, hashed, and used as table row keys without float fuzz.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Ticks per quarter note.
pub const TICKS_PER_QUARTER: u32 = 480;

/// A position or duration in ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Offset(pub u32);

impl Offset {
    pub const ZERO: Offset = Offset(0);

    pub fn from_ticks(ticks: u32) -> Self {
        Offset(ticks)
    }

    /// Convert a quarter-note length (1.0 = quarter, 0.5 = eighth) to ticks,
    /// rounding to the nearest tick. Negative values clamp to zero.
    pub fn from_quarters(quarters: f64) -> Self {
        let ticks = (quarters * TICKS_PER_QUARTER as f64).round();
        if ticks <= 0.0 {
            Offset::ZERO
        } else {
            Offset(ticks as u32)
        }
    }

    pub fn ticks(self) -> u32 {
        self.0
    }

    pub fn quarters(self) -> f64 {
        self.0 as f64 / TICKS_PER_QUARTER as f64
    }

    /// `None` when the sum does not fit in a `u32` tick count.
    pub fn checked_add(self, rhs: Offset) -> Option<Offset> {
        self.0.checked_add(rhs.0).map(Offset)
    }
}

impl Add for Offset {
    type Output = Offset;

    /// Saturating at the largest representable offset. Builders that
    /// accumulate positions use `checked_add` and report overflow instead.
    fn add(self, rhs: Offset) -> Offset {
        Offset(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Offset {
    fn add_assign(&mut self, rhs: Offset) {
        *self = *self + rhs;
    }
}

impl Sub for Offset {
    type Output = Offset;

    /// Saturating: a later position minus an earlier one is a duration, the
    /// reverse is zero.
    fn sub(self, rhs: Offset) -> Offset {
        Offset(self.0.saturating_sub(rhs.0))
    }
}

/// Displays as a quarter length, e.g. `0`, `1.5`, `0.25`.
impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.quarters())
    }
}
