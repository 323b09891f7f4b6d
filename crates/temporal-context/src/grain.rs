//! Temporal precision levels.
//!
//! A [`Grain`] states how precisely a resolved date should be read: "May 27"
//! carries a day grain even when the extractor reports it as
//! `2016-05-27T00:00:00`, "at 18h" carries an hour grain. Grains are ordered
//! from finest to coarsest and every comparison in the engine works on that
//! order.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::UnknownGrain;

/// Precision of a temporal value, ordered finest to coarsest.
///
/// [`Grain::Unset`] stands for "no usable precision" (missing or unrecognized
/// in the extractor output). It ranks below [`Grain::Second`] and supports no
/// calendar truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Grain {
    Unset,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Grain {
    /// All grains, finest first.
    pub const ALL: [Grain; 9] = [
        Grain::Unset,
        Grain::Second,
        Grain::Minute,
        Grain::Hour,
        Grain::Day,
        Grain::Week,
        Grain::Month,
        Grain::Quarter,
        Grain::Year,
    ];

    /// Position in the finest-to-coarsest order. A higher rank is coarser.
    pub fn rank(self) -> u8 {
        match self {
            Grain::Unset => 0,
            Grain::Second => 1,
            Grain::Minute => 2,
            Grain::Hour => 3,
            Grain::Day => 4,
            Grain::Week => 5,
            Grain::Month => 6,
            Grain::Quarter => 7,
            Grain::Year => 8,
        }
    }

    /// `true` when `self` is strictly coarser than `other`.
    pub fn is_coarser_than(self, other: Grain) -> bool {
        self.rank() > other.rank()
    }

    /// `true` for day, week, month, quarter and year.
    pub fn is_day_or_coarser(self) -> bool {
        self.rank() >= Grain::Day.rank()
    }

    /// The next finer grain, or `None` below [`Grain::Second`].
    pub fn finer(self) -> Option<Grain> {
        match self {
            Grain::Unset | Grain::Second => None,
            Grain::Minute => Some(Grain::Second),
            Grain::Hour => Some(Grain::Minute),
            Grain::Day => Some(Grain::Hour),
            Grain::Week => Some(Grain::Day),
            Grain::Month => Some(Grain::Week),
            Grain::Quarter => Some(Grain::Month),
            Grain::Year => Some(Grain::Quarter),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grain::Unset => "unset",
            Grain::Second => "second",
            Grain::Minute => "minute",
            Grain::Hour => "hour",
            Grain::Day => "day",
            Grain::Week => "week",
            Grain::Month => "month",
            Grain::Quarter => "quarter",
            Grain::Year => "year",
        }
    }
}

impl fmt::Display for Grain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grain {
    type Err = UnknownGrain;

    /// Parses the grain names used by Duckling-style extractors
    /// (case-insensitive, singular or plural).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        match singular {
            "second" => Ok(Grain::Second),
            "minute" => Ok(Grain::Minute),
            "hour" => Ok(Grain::Hour),
            "day" => Ok(Grain::Day),
            "week" => Ok(Grain::Week),
            "month" => Ok(Grain::Month),
            "quarter" => Ok(Grain::Quarter),
            "year" => Ok(Grain::Year),
            "unset" => Ok(Grain::Unset),
            _ => Err(UnknownGrain(s.to_string())),
        }
    }
}
