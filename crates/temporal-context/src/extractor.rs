//! The grammar-extractor seam.
//!
//! Recognizing date phrases is left to an external rule-based extractor
//! (Duckling or similar). The engine only needs the contract below: given a
//! text, a language and a reference instant, return raw matches whose offsets
//! are relative to that text.
//!
//! Implementations own their thread-safety and resource management (pooling,
//! lazy grammar loading, HTTP connections). The engine calls
//! [`TemporalExtractor::extract`] from whatever thread invokes `resolve`.

use std::fmt;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::error::Result;

/// Parameters of one extractor call.
#[derive(Debug, Clone)]
pub struct ExtractRequest<'a> {
    /// The text to scan. Match offsets are relative to this slice.
    pub text: &'a str,
    pub lang: &'a str,
    /// Instant that relative expressions are resolved against.
    pub reference: DateTime<Tz>,
    /// Plausible year window for year-less phrases. Extractors that cannot
    /// bias on years may ignore it.
    pub min_year: i32,
    pub max_year: i32,
}

/// Semantic dimension of a raw match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dimension {
    Time,
    Duration,
    Other(String),
}

impl Dimension {
    pub fn from_name(name: &str) -> Self {
        match name {
            "time" => Dimension::Time,
            "duration" => Dimension::Duration,
            other => Dimension::Other(other.to_string()),
        }
    }
}

/// A single resolved point as reported by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInstant {
    /// `YYYY-MM-DDTHH:mm:ss.sss`, optionally suffixed with `Z` or `±HH:MM`.
    pub value: String,
    pub grain: Option<String>,
}

impl RawInstant {
    pub fn new(value: impl Into<String>, grain: Option<&str>) -> Self {
        Self {
            value: value.into(),
            grain: grain.map(str::to_string),
        }
    }
}

/// The value attached to a raw match.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Instant(RawInstant),
    Interval {
        from: Option<RawInstant>,
        to: Option<RawInstant>,
    },
    /// Values of dimensions the engine does not resolve.
    Opaque(serde_json::Value),
}

/// One candidate match returned by the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatch {
    pub dimension: Dimension,
    /// Byte offsets into [`ExtractRequest::text`], half-open.
    pub start: usize,
    pub end: usize,
    pub latent: bool,
    pub value: RawValue,
}

/// A rule-based date/time extractor.
pub trait TemporalExtractor: Send + Sync {
    /// Extract raw matches from `request.text`.
    fn extract(&self, request: &ExtractRequest<'_>) -> Result<Vec<RawMatch>>;

    /// Whether the extractor has a grammar for `lang`.
    fn is_language_supported(&self, _lang: &str) -> bool {
        true
    }
}

impl<E: TemporalExtractor + ?Sized> TemporalExtractor for &E {
    fn extract(&self, request: &ExtractRequest<'_>) -> Result<Vec<RawMatch>> {
        (**self).extract(request)
    }

    fn is_language_supported(&self, lang: &str) -> bool {
        (**self).is_language_supported(lang)
    }
}

impl<E: TemporalExtractor + ?Sized> TemporalExtractor for std::sync::Arc<E> {
    fn extract(&self, request: &ExtractRequest<'_>) -> Result<Vec<RawMatch>> {
        (**self).extract(request)
    }

    fn is_language_supported(&self, lang: &str) -> bool {
        (**self).is_language_supported(lang)
    }
}

impl<E: TemporalExtractor + ?Sized> TemporalExtractor for Box<E> {
    fn extract(&self, request: &ExtractRequest<'_>) -> Result<Vec<RawMatch>> {
        (**self).extract(request)
    }

    fn is_language_supported(&self, lang: &str) -> bool {
        (**self).is_language_supported(lang)
    }
}

/// Adapts a closure into a [`TemporalExtractor`] that supports every language.
pub struct FnExtractor<F>(pub F);

impl<F> FnExtractor<F>
where
    F: Fn(&ExtractRequest<'_>) -> Result<Vec<RawMatch>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnExtractor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnExtractor")
    }
}

impl<F> TemporalExtractor for FnExtractor<F>
where
    F: Fn(&ExtractRequest<'_>) -> Result<Vec<RawMatch>> + Send + Sync,
{
    fn extract(&self, request: &ExtractRequest<'_>) -> Result<Vec<RawMatch>> {
        (self.0)(request)
    }
}
