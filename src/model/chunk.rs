//! Calendar-day storage partitions.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// A `(year, month, day)` partition key. Textual form is `YYYY-MM-DD`.
///
/// Chunks exist purely for storage locality: every archive file belongs to one
/// chunk, and an item's whole history lives in the chunk of its creation note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Chunk {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl Chunk {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }

    /// Path segments `YYYY`, `MM`, `DD` used to lay chunks out on disk.
    pub fn segments(&self) -> [String; 3] {
        [
            format!("{:04}", self.year),
            format!("{:02}", self.month),
            format!("{:02}", self.day),
        ]
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for Chunk {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self::from_date)
            .map_err(|_| format!("invalid chunk `{s}`: expected YYYY-MM-DD"))
    }
}
