//! Resolved temporal values and the tokens that carry them.

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::grain::Grain;

/// A point in time together with the precision it was stated at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Temporal {
    /// The instant, expressed in the context timezone.
    pub date: DateTime<Tz>,
    pub grain: Grain,
}

impl Temporal {
    pub fn new(date: DateTime<Tz>, grain: Grain) -> Self {
        Self { date, grain }
    }
}

/// One resolved temporal mention over a span of the original content.
///
/// Offsets are UTF-8 byte offsets into the full, un-sliced content and always
/// satisfy `offset_start < offset_end`. At least one of `start`/`end` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateToken {
    offset_start: usize,
    offset_end: usize,
    instant: bool,
    start: Option<Temporal>,
    end: Option<Temporal>,
    confidence: f32,
}

impl DateToken {
    /// A single point in time.
    pub fn instant(offset_start: usize, offset_end: usize, value: Temporal, confidence: f32) -> Self {
        Self {
            offset_start,
            offset_end,
            instant: true,
            start: Some(value),
            end: None,
            confidence: clamp_confidence(confidence),
        }
    }

    /// A range. Returns `None` when both bounds are missing.
    pub fn interval(
        offset_start: usize,
        offset_end: usize,
        start: Option<Temporal>,
        end: Option<Temporal>,
        confidence: f32,
    ) -> Option<Self> {
        if start.is_none() && end.is_none() {
            return None;
        }
        Some(Self {
            offset_start,
            offset_end,
            instant: false,
            start,
            end,
            confidence: clamp_confidence(confidence),
        })
    }

    pub fn offset_start(&self) -> usize {
        self.offset_start
    }

    pub fn offset_end(&self) -> usize {
        self.offset_end
    }

    pub fn is_instant(&self) -> bool {
        self.instant
    }

    pub fn start(&self) -> Option<&Temporal> {
        self.start.as_ref()
    }

    pub fn end(&self) -> Option<&Temporal> {
        self.end.as_ref()
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// A range missing one of its bounds ("by 11:00", "starting Monday").
    pub fn is_open_interval(&self) -> bool {
        !self.instant && (self.start.is_none() || self.end.is_none())
    }

    /// The value the token resolves to: `start` when present, else `end`.
    pub fn value(&self) -> &Temporal {
        match (&self.start, &self.end) {
            (Some(start), _) => start,
            (None, Some(end)) => end,
            // Constructors reject tokens without bounds.
            (None, None) => unreachable!("date token without start or end"),
        }
    }

    /// `true` when both tokens cover exactly the same span.
    pub fn same_span(&self, other: &DateToken) -> bool {
        self.offset_start == other.offset_start && self.offset_end == other.offset_end
    }

    /// Shifts both offsets by `delta`, used to map section-relative tokens
    /// into document coordinates.
    pub fn shifted(mut self, delta: usize) -> Self {
        self.offset_start += delta;
        self.offset_end += delta;
        self
    }

    /// Sort key: start ascending, then wider spans first.
    pub(crate) fn order_key(&self) -> (usize, std::cmp::Reverse<usize>) {
        (self.offset_start, std::cmp::Reverse(self.offset_end))
    }
}

fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Sorts tokens by `(offset_start asc, offset_end desc)`. The sort is stable,
/// so tokens sharing a span keep their relative order.
pub fn sort_tokens(tokens: &mut [DateToken]) {
    tokens.sort_by_key(DateToken::order_key);
}
