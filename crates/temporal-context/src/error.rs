//! Error types for temporal-context operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Invalid value: {0}")]
    ValueParse(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Invalid span: {0}")]
    InvalidSpan(String),

    #[error("Extractor did not advance: token ends at {end}, scan offset is {offset}")]
    NonAdvancing { offset: usize, end: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A grain name that is not recognized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown grain '{0}'")]
pub struct UnknownGrain(pub String);

pub type Result<T> = std::result::Result<T, ContextError>;
