//! Duckling response format.
//!
//! Duckling's `/parse` endpoint answers with a JSON array of entities:
//!
//! ```text
//! [{"body": "tomorrow at 9am", "start": 0, "end": 15, "dim": "time", "latent": false,
//!   "value": {"type": "value", "value": "2016-04-02T09:00:00.000-07:00", "grain": "hour"}}]
//! ```
//!
//! Offsets are counted in Unicode scalar values; they are converted to UTF-8
//! byte offsets here so the rest of the crate can slice `&str` directly.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ContextError, Result};
use crate::extractor::{Dimension, RawInstant, RawMatch, RawValue};

/// One entity of a Duckling response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DucklingEntity {
    #[serde(default)]
    pub body: String,
    pub start: usize,
    pub end: usize,
    pub dim: String,
    #[serde(default)]
    pub latent: bool,
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TimeValue {
    Value {
        value: String,
        grain: Option<String>,
    },
    Interval {
        from: Option<InstantValue>,
        to: Option<InstantValue>,
    },
}

#[derive(Debug, Deserialize)]
struct InstantValue {
    value: String,
    grain: Option<String>,
}

impl From<InstantValue> for RawInstant {
    fn from(v: InstantValue) -> Self {
        RawInstant {
            value: v.value,
            grain: v.grain,
        }
    }
}

/// Parse a raw Duckling response body for `text`.
///
/// # Errors
///
/// Returns [`ContextError::Extraction`] if the body is not a JSON entity array
/// and [`ContextError::InvalidSpan`] if an entity's offsets fall outside `text`.
pub fn parse_response(text: &str, body: &str) -> Result<Vec<RawMatch>> {
    let entities: Vec<DucklingEntity> = serde_json::from_str(body)
        .map_err(|e| ContextError::Extraction(format!("malformed response: {e}")))?;
    to_raw_matches(text, entities)
}

/// Convert Duckling entities for `text` into raw matches with byte offsets.
///
/// Time entities whose value has an unexpected shape are skipped with a
/// warning; entities of other dimensions keep their value opaque.
pub fn to_raw_matches(text: &str, entities: Vec<DucklingEntity>) -> Result<Vec<RawMatch>> {
    let offsets = CharOffsets::new(text);
    let mut matches = Vec::with_capacity(entities.len());

    for entity in entities {
        let start = offsets.byte_offset(entity.start)?;
        let end = offsets.byte_offset(entity.end)?;
        if start >= end {
            return Err(ContextError::InvalidSpan(format!(
                "empty or reversed span {}..{} for '{}'",
                entity.start, entity.end, entity.body
            )));
        }

        let dimension = Dimension::from_name(&entity.dim);
        let value = match dimension {
            Dimension::Time => match serde_json::from_value::<TimeValue>(entity.value) {
                Ok(TimeValue::Value { value, grain }) => {
                    RawValue::Instant(RawInstant { value, grain })
                }
                Ok(TimeValue::Interval { from, to }) => RawValue::Interval {
                    from: from.map(RawInstant::from),
                    to: to.map(RawInstant::from),
                },
                Err(e) => {
                    warn!(body = %entity.body, error = %e, "skipping time entity with unexpected value");
                    continue;
                }
            },
            _ => RawValue::Opaque(entity.value),
        };

        matches.push(RawMatch {
            dimension,
            start,
            end,
            latent: entity.latent,
            value,
        });
    }

    Ok(matches)
}

/// Scalar-value index to byte offset table for one text.
pub(crate) struct CharOffsets {
    boundaries: Vec<usize>,
}

impl CharOffsets {
    pub(crate) fn new(text: &str) -> Self {
        let boundaries = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        Self { boundaries }
    }

    pub(crate) fn byte_offset(&self, char_index: usize) -> Result<usize> {
        self.boundaries.get(char_index).copied().ok_or_else(|| {
            ContextError::InvalidSpan(format!(
                "character offset {} beyond text of {} characters",
                char_index,
                self.boundaries.len() - 1
            ))
        })
    }
}
