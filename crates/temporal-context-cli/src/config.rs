use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use temporal_context::{ContextError, ContextOptions};

/// Read engine options from a JSON file. Missing fields take their defaults.
pub fn load_options(path: &Path) -> Result<ContextOptions> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let options: ContextOptions = serde_json::from_str(&raw)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    options.validate()?;
    Ok(options)
}

pub fn parse_timezone(name: &str) -> Result<Tz, ContextError> {
    name.parse()
        .map_err(|_| ContextError::InvalidTimezone(name.to_string()))
}

/// Parse an RFC 3339 reference time and express it in `tz`. `None` means now.
pub fn parse_reference(value: Option<&str>, tz: Tz) -> Result<DateTime<Tz>, ContextError> {
    match value {
        Some(value) => DateTime::parse_from_rfc3339(value)
            .map(|date| date.with_timezone(&tz))
            .map_err(|e| ContextError::InvalidDatetime(format!("'{value}': {e}"))),
        None => Ok(Utc::now().with_timezone(&tz)),
    }
}
