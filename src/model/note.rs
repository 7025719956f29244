//! Logical timestamps.
//!
//! A [`Note`] marks when a fact was asserted: a whole-second offset from the
//! engine's epoch plus an increment that separates notes written within the
//! same second. Items are identified by the note at which they were created.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Two-part logical timestamp, ordered by `(offset, increment)`.
///
/// Textual form is `"<offset>"`, or `"<offset>-<increment>"` when the increment
/// is non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Note {
    /// Seconds since the engine epoch.
    pub offset: u64,
    /// Counter for notes written within the same second.
    pub increment: u64,
}

/// Error returned when a string is not a well-formed note.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid note `{0}`: expected `<offset>` or `<offset>-<increment>`")]
pub struct NoteParseError(pub String);

impl Note {
    pub const fn new(offset: u64, increment: u64) -> Self {
        Self { offset, increment }
    }

    /// The first note of the following second, or `None` past the last second.
    pub fn next(&self) -> Option<Self> {
        Some(Self::new(self.offset.checked_add(1)?, 0))
    }

    /// The next note within the same second, or `None` once the increment is
    /// exhausted.
    pub fn bump(&self) -> Option<Self> {
        Some(Self::new(self.offset, self.increment.checked_add(1)?))
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.increment == 0 {
            write!(f, "{}", self.offset)
        } else {
            write!(f, "{}-{}", self.offset, self.increment)
        }
    }
}

impl FromStr for Note {
    type Err = NoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NoteParseError(s.to_string());
        let parse_segment = |segment: &str| {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            segment.parse::<u64>().map_err(|_| invalid())
        };

        match s.split_once('-') {
            None => Ok(Self::new(parse_segment(s)?, 0)),
            Some((offset, increment)) => {
                Ok(Self::new(parse_segment(offset)?, parse_segment(increment)?))
            }
        }
    }
}

impl Serialize for Note {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Note {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
