//! Document-level annotation.
//!
//! A document arrives already split into content sections, each with its
//! position in the document and its own reference time (a mail body and its
//! quoted reply were written at different moments). Every section is resolved
//! independently and its tokens are attached to a sink in document
//! coordinates. A section whose extraction fails is logged and skipped; the
//! rest of the document is still annotated.

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use crate::engine::ContextEngine;
use crate::extractor::TemporalExtractor;
use crate::token::{DateToken, Temporal};

/// One content section of a document.
#[derive(Debug, Clone)]
pub struct Section {
    pub text: String,
    /// Byte offset of `text` within the document.
    pub offset: usize,
    pub reference_time: DateTime<Tz>,
}

impl Section {
    pub fn new(text: impl Into<String>, offset: usize, reference_time: DateTime<Tz>) -> Self {
        Self {
            text: text.into(),
            offset,
            reference_time,
        }
    }
}

/// A resolved mention in document coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalAnnotation {
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
    pub instant: bool,
    pub start_value: Option<Temporal>,
    pub end_value: Option<Temporal>,
}

impl TemporalAnnotation {
    /// Build an annotation from a section-relative token.
    pub fn from_token(token: DateToken, section_offset: usize) -> Self {
        let token = token.shifted(section_offset);
        Self {
            start: token.offset_start(),
            end: token.offset_end(),
            confidence: token.confidence(),
            instant: token.is_instant(),
            start_value: token.start().cloned(),
            end_value: token.end().cloned(),
        }
    }
}

/// Receives annotations as they are produced.
pub trait AnnotationSink {
    fn attach(&mut self, annotation: TemporalAnnotation);
}

impl AnnotationSink for Vec<TemporalAnnotation> {
    fn attach(&mut self, annotation: TemporalAnnotation) {
        self.push(annotation);
    }
}

/// Outcome of [`DateAnnotator::process`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub sections_processed: usize,
    pub sections_failed: usize,
    pub annotations: usize,
    /// `false` when the language was not supported and nothing was scanned.
    pub language_supported: bool,
}

/// Runs a [`ContextEngine`] over the sections of a document.
#[derive(Debug, Clone)]
pub struct DateAnnotator<E> {
    engine: ContextEngine<E>,
}

impl<E: TemporalExtractor> DateAnnotator<E> {
    pub fn new(engine: ContextEngine<E>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ContextEngine<E> {
        &self.engine
    }

    /// Annotate every section of a document written in `lang`.
    ///
    /// Never fails: extraction errors are logged per section and counted in
    /// the returned report.
    pub fn process<'a, I, S>(&self, lang: &str, sections: I, sink: &mut S) -> ProcessReport
    where
        I: IntoIterator<Item = &'a Section>,
        S: AnnotationSink + ?Sized,
    {
        let mut report = ProcessReport::default();

        if !self.engine.extractor().is_language_supported(lang) {
            warn!(lang, "language not supported by the extractor, skipping document");
            return report;
        }
        report.language_supported = true;

        for section in sections {
            match self
                .engine
                .resolve(&section.text, lang, section.reference_time, None)
            {
                Ok(tokens) => {
                    debug!(
                        offset = section.offset,
                        tokens = tokens.len(),
                        "section resolved"
                    );
                    report.sections_processed += 1;
                    report.annotations += tokens.len();
                    for token in tokens {
                        sink.attach(TemporalAnnotation::from_token(token, section.offset));
                    }
                }
                Err(e) => {
                    warn!(offset = section.offset, error = %e, "skipping section");
                    report.sections_failed += 1;
                }
            }
        }

        report
    }
}
