//! # temporal-context
//!
//! Contextualization of date/time mentions extracted from free text.
//!
//! A rule-based grammar extractor (Duckling or similar) finds phrases such as
//! "tomorrow at 9", "the weekend" or "from Aug 1 to Aug 3" and resolves each
//! one against a single reference instant. This crate turns that raw output
//! into a clean, non-overlapping, chronologically consistent sequence of
//! instants and intervals, carrying the reference time forward from one
//! mention to the next the way a reader does.
//!
//! ## Modules
//!
//! - [`engine`] — The re-parsing loop: context chaining, merge rules, latent filtering
//! - [`extractor`] — The extractor trait and its raw match types
//! - [`duckling`] — Duckling JSON response format
//! - [`token`] — Resolved values (`Temporal`) and tokens (`DateToken`)
//! - [`grain`] — Ordered precision levels
//! - [`truncate`] — Calendar truncation and grain-aware comparison with fallback
//! - [`annotate`] — Per-section document annotation into a sink
//! - [`error`] — Error types

pub mod annotate;
pub mod duckling;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod grain;
pub mod token;
pub mod truncate;

pub use annotate::{AnnotationSink, DateAnnotator, ProcessReport, Section, TemporalAnnotation};
pub use engine::{
    latent_confidence, parse_value, ContextEngine, ContextOptions, CONFIRMED_CONFIDENCE,
    LATENT_CONFIDENCE, MAX_YEAR_WINDOW,
};
pub use error::{ContextError, UnknownGrain};
pub use extractor::{
    Dimension, ExtractRequest, FnExtractor, RawInstant, RawMatch, RawValue, TemporalExtractor,
};
pub use grain::Grain;
pub use token::{sort_tokens, DateToken, Temporal};
pub use truncate::{
    compare_truncated, compare_truncated_with, truncate, truncate_with_fallback, WeekStartDay,
};
