//! Offline extractor that replays one recorded Duckling response.

use temporal_context::duckling::parse_response;
use temporal_context::error::{ContextError, Result};
use temporal_context::{ExtractRequest, RawMatch, TemporalExtractor};

/// Answers every request from a single response recorded for the whole text.
///
/// The engine only ever asks about suffixes of the text it was given, so each
/// request is served by the recorded matches that lie inside the suffix,
/// shifted to suffix coordinates. Values are replayed as recorded and do not
/// follow the request's reference time.
#[derive(Debug, Clone)]
pub struct ReplayExtractor {
    text: String,
    matches: Vec<RawMatch>,
}

impl ReplayExtractor {
    pub fn new(text: impl Into<String>, matches: Vec<RawMatch>) -> Self {
        Self {
            text: text.into(),
            matches,
        }
    }

    /// Load a raw Duckling response body recorded for `text`.
    pub fn from_response(text: impl Into<String>, body: &str) -> Result<Self> {
        let text = text.into();
        let matches = parse_response(&text, body)?;
        Ok(Self::new(text, matches))
    }
}

impl TemporalExtractor for ReplayExtractor {
    fn extract(&self, request: &ExtractRequest<'_>) -> Result<Vec<RawMatch>> {
        let skip = self
            .text
            .len()
            .checked_sub(request.text.len())
            .filter(|&skip| self.text.get(skip..) == Some(request.text))
            .ok_or_else(|| {
                ContextError::Extraction("request is not a suffix of the recorded text".to_string())
            })?;

        Ok(self
            .matches
            .iter()
            .filter(|m| m.start >= skip)
            .map(|m| RawMatch {
                start: m.start - skip,
                end: m.end - skip,
                ..m.clone()
            })
            .collect())
    }
}
