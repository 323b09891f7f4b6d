//! Contextualization of extracted date/time mentions.
//!
//! A grammar extractor resolves every expression against one fixed reference
//! instant and cannot see text before the point it is asked to start from.
//! Documents, however, mention times in sequence and rely on the reader to
//! carry context forward: in "on May 27 at 18h ... and on the 29th in the
//! evening" the 29th is in May, not in the month of the reference time.
//!
//! [`ContextEngine::resolve`] therefore re-queries the extractor in a loop.
//! Each pass scans the remaining text with the most recently resolved value
//! as the new reference time, keeps the first token, and applies two merge
//! rules against the previously kept token:
//!
//! - **Finer-grain replacement**: when the new token restates the context
//!   moment more precisely ("today ... at 9am"), the coarse token is dropped.
//! - **Open-interval splice**: an end-only range following an instant or a
//!   start-only range ("Friday 18h ... until Sunday 22h") becomes one closed
//!   interval.
//!
//! The loop ends when a pass returns no tokens or when the first token of a
//! pass was the last one in it.
//!
//! # Timezones
//!
//! The extractor's own offset is not trusted. Date literals are read as local
//! wall-clock times and placed in the timezone of the reference time passed to
//! `resolve`.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::error::{ContextError, Result};
use crate::extractor::{Dimension, ExtractRequest, RawInstant, RawMatch, RawValue, TemporalExtractor};
use crate::grain::Grain;
use crate::token::{sort_tokens, DateToken, Temporal};
use crate::truncate::{compare_truncated_with, WeekStartDay};

/// Confidence given to matches the extractor did not flag as latent.
pub const CONFIRMED_CONFIDENCE: f32 = 0.9;
/// Confidence given to latent matches (bare numbers, ambiguous words).
pub const LATENT_CONFIDENCE: f32 = 0.1;

/// Map the extractor's latent flag to a token confidence.
pub fn latent_confidence(latent: bool) -> f32 {
    if latent {
        LATENT_CONFIDENCE
    } else {
        CONFIRMED_CONFIDENCE
    }
}

// ── Options ─────────────────────────────────────────────────────────────────

/// Largest accepted `years_before` / `years_after`.
pub const MAX_YEAR_WINDOW: i32 = 100;

/// Options for [`ContextEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Keep latent (low-confidence) matches when `resolve` is not told
    /// otherwise.
    pub include_latent: bool,
    /// Which day starts the week for week-grain comparisons.
    pub week_start: WeekStartDay,
    /// Years before the context year in the extractor's year window.
    pub years_before: i32,
    /// Years after the context year in the extractor's year window.
    pub years_after: i32,
    /// Hour of day given to a day-grain context that is not the reference day.
    pub morning_hour: u32,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            include_latent: false,
            week_start: WeekStartDay::Monday,
            years_before: 1,
            years_after: 5,
            morning_hour: 6,
        }
    }
}

impl ContextOptions {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Config`] for an hour outside `0..24` or a
    /// year window that is negative or wider than [`MAX_YEAR_WINDOW`].
    pub fn validate(&self) -> Result<()> {
        if self.morning_hour > 23 {
            return Err(ContextError::Config(format!(
                "morning_hour must be below 24, got {}",
                self.morning_hour
            )));
        }
        let window = 0..=MAX_YEAR_WINDOW;
        if !window.contains(&self.years_before) || !window.contains(&self.years_after) {
            return Err(ContextError::Config(format!(
                "year window must be within 0..={MAX_YEAR_WINDOW} years, got -{}/+{}",
                self.years_before, self.years_after
            )));
        }
        Ok(())
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

/// Turns raw extractor output into a clean, ordered sequence of [`DateToken`]s.
///
/// The engine holds no per-call state: one instance can serve concurrent
/// `resolve` calls as long as the extractor allows concurrent use.
#[derive(Debug, Clone)]
pub struct ContextEngine<E> {
    extractor: E,
    options: ContextOptions,
}

impl<E: TemporalExtractor> ContextEngine<E> {
    /// Engine with default options.
    pub fn new(extractor: E) -> Self {
        Self {
            extractor,
            options: ContextOptions::default(),
        }
    }

    /// Engine with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Config`] if the options do not validate.
    pub fn with_options(extractor: E, options: ContextOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { extractor, options })
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Resolve all date/time mentions in `content`.
    ///
    /// Relative expressions are resolved against `reference`, then against
    /// each previously resolved mention in turn. `include_latent` overrides
    /// [`ContextOptions::include_latent`] for this call.
    ///
    /// The returned tokens are sorted by start offset ascending and, at equal
    /// starts, by end offset descending. Offsets are byte offsets into
    /// `content`.
    ///
    /// # Errors
    ///
    /// Returns the extractor's error if a call to it fails, and
    /// [`ContextError::InvalidSpan`] or [`ContextError::NonAdvancing`] if it
    /// reports spans that are outside the scanned text or would stall the scan.
    /// A match whose value cannot be parsed is dropped with a warning instead.
    pub fn resolve(
        &self,
        content: &str,
        lang: &str,
        reference: DateTime<Tz>,
        include_latent: Option<bool>,
    ) -> Result<Vec<DateToken>> {
        let include_latent = include_latent.unwrap_or(self.options.include_latent);

        let mut offset = 0;
        let mut context = reference;
        let mut context_grain = Grain::Second;
        let mut result: Vec<DateToken> = Vec::new();

        loop {
            let batch = self.extract_tokens(offset, content, lang, &context, include_latent)?;
            let mut batch = batch.into_iter().peekable();
            let Some(head) = batch.next() else {
                break;
            };

            if head.offset_end() <= offset {
                return Err(ContextError::NonAdvancing {
                    offset,
                    end: head.offset_end(),
                });
            }

            trace!(
                offset,
                %context,
                %context_grain,
                start = head.offset_start(),
                end = head.offset_end(),
                "next token"
            );

            let value = head.value().clone();
            let head_end = head.offset_end();

            let mut same_span = Vec::new();
            while let Some(same) = batch.next_if(|t| t.same_span(&head)) {
                same_span.push(same);
            }

            let head = self.merge_with_previous(&mut result, head, &context, context_grain);
            result.push(head);
            result.extend(same_span);

            if batch.peek().is_none() {
                break;
            }

            context = self.normalize_context(&value.date, value.grain, &reference);
            context_grain = value.grain;
            offset = head_end;
            debug!(offset, %context, %context_grain, "continuing with new context");
        }

        sort_tokens(&mut result);
        Ok(result)
    }

    /// Query the extractor on `content[offset..]` and turn its matches into
    /// tokens with absolute offsets, sorted.
    fn extract_tokens(
        &self,
        offset: usize,
        content: &str,
        lang: &str,
        context: &DateTime<Tz>,
        include_latent: bool,
    ) -> Result<Vec<DateToken>> {
        let text = content.get(offset..).ok_or_else(|| {
            ContextError::InvalidSpan(format!("scan offset {offset} is not a char boundary"))
        })?;

        let year = context.year();
        let request = ExtractRequest {
            text,
            lang,
            reference: *context,
            min_year: year.saturating_sub(self.options.years_before),
            max_year: year.saturating_add(self.options.years_after),
        };
        let matches = self.extractor.extract(&request)?;

        let tz = context.timezone();
        let mut seen = HashSet::new();
        let mut tokens = Vec::with_capacity(matches.len());

        for m in matches {
            check_span(text, &m)?;
            let start = offset + m.start;
            let end = offset + m.end;

            if !seen.insert((m.dimension.clone(), start, end)) {
                trace!(start, end, "dropping duplicate match");
                continue;
            }

            match &m.dimension {
                Dimension::Time => {}
                Dimension::Duration => {
                    debug!(start, end, text = &content[start..end], "duration matches are not resolved");
                    continue;
                }
                Dimension::Other(name) => {
                    trace!(dimension = %name, start, end, "ignoring match");
                    continue;
                }
            }

            if m.latent && !include_latent {
                trace!(start, end, "dropping latent match");
                continue;
            }
            let confidence = latent_confidence(m.latent);

            match build_token(start, end, &m.value, &tz, confidence) {
                Ok(Some(token)) => tokens.push(token),
                Ok(None) => debug!(start, end, "dropping interval without bounds"),
                Err(e) => warn!(start, end, error = %e, "dropping match"),
            }
        }

        sort_tokens(&mut tokens);
        Ok(tokens)
    }

    /// Apply the merge rules for `head` against the last kept token.
    fn merge_with_previous(
        &self,
        result: &mut Vec<DateToken>,
        head: DateToken,
        context: &DateTime<Tz>,
        context_grain: Grain,
    ) -> DateToken {
        let value = head.value();

        if context_grain.is_coarser_than(value.grain)
            && compare_truncated_with(context, &value.date, context_grain, self.options.week_start)
                == Ordering::Equal
        {
            if let Some(prev) = result.pop() {
                debug!(
                    start = prev.offset_start(),
                    end = prev.offset_end(),
                    "token superseded by finer mention of the same moment"
                );
            }
            return head;
        }

        if let Some(spliced) = result.last().and_then(|prev| splice_open_interval(prev, &head)) {
            result.pop();
            debug!(
                start = spliced.offset_start(),
                end = spliced.offset_end(),
                "spliced open interval"
            );
            return spliced;
        }

        head
    }

    /// Reference time for the next pass, derived from the value just resolved.
    ///
    /// Day-or-coarser values on the reference day give back the reference
    /// itself; on other days they are moved to [`ContextOptions::morning_hour`]
    /// so the extractor's hour disambiguation is not anchored at midnight.
    fn normalize_context(
        &self,
        date: &DateTime<Tz>,
        grain: Grain,
        reference: &DateTime<Tz>,
    ) -> DateTime<Tz> {
        if !grain.is_day_or_coarser() {
            return *date;
        }

        if compare_truncated_with(date, reference, Grain::Day, self.options.week_start)
            == Ordering::Equal
        {
            return *reference;
        }

        date.date_naive()
            .and_hms_opt(self.options.morning_hour, 0, 0)
            .and_then(|morning| date.timezone().from_local_datetime(&morning).earliest())
            .unwrap_or_else(|| {
                debug!(%date, "morning hour does not exist on that day, keeping value");
                *date
            })
    }
}

// ── Value parsing ───────────────────────────────────────────────────────────

/// Parse an extractor date literal into a [`Temporal`] in timezone `tz`.
///
/// The literal's own offset (`Z` or `±HH:MM`) is discarded and the remaining
/// wall-clock time is placed in `tz`. A wall-clock time skipped by a DST
/// transition is moved forward by one hour; a repeated one takes the earlier
/// instant. A missing or unknown grain becomes [`Grain::Unset`] with a
/// warning.
///
/// # Errors
///
/// Returns [`ContextError::ValueParse`] if the literal is not a date-time.
///
/// # Examples
///
/// ```
/// use temporal_context::{parse_value, Grain, RawInstant};
///
/// let raw = RawInstant::new("2016-04-02T09:00:00.000-07:00", Some("hour"));
/// let value = parse_value(&raw, &chrono_tz::Europe::Paris).unwrap();
/// assert_eq!(value.date.to_rfc3339(), "2016-04-02T09:00:00+02:00");
/// assert_eq!(value.grain, Grain::Hour);
/// ```
pub fn parse_value(raw: &RawInstant, tz: &Tz) -> Result<Temporal> {
    let literal = strip_timezone_suffix(raw.value.trim());
    let naive = NaiveDateTime::parse_from_str(literal, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| ContextError::ValueParse(format!("'{}': {}", raw.value, e)))?;

    let date = tz
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            let shifted = naive.checked_add_signed(Duration::hours(1))?;
            tz.from_local_datetime(&shifted).earliest()
        })
        .ok_or_else(|| {
            ContextError::ValueParse(format!("'{}' does not exist in {}", raw.value, tz.name()))
        })?;

    let grain = match raw.grain.as_deref() {
        Some(name) => name.parse().unwrap_or_else(|e| {
            warn!(error = %e, value = %raw.value, "unrecognized grain, using unset");
            Grain::Unset
        }),
        None => {
            warn!(value = %raw.value, "missing grain, using unset");
            Grain::Unset
        }
    };

    Ok(Temporal::new(date, grain))
}

/// Remove a trailing `Z` or `±HH:MM` offset from a date-time literal.
fn strip_timezone_suffix(literal: &str) -> &str {
    if let Some(stripped) = literal.strip_suffix(['Z', 'z']) {
        return stripped;
    }

    let bytes = literal.as_bytes();
    let n = bytes.len();
    if n > 6
        && matches!(bytes[n - 6], b'+' | b'-')
        && bytes[n - 3] == b':'
        && bytes[n - 5..n - 3].iter().all(u8::is_ascii_digit)
        && bytes[n - 2..].iter().all(u8::is_ascii_digit)
    {
        return &literal[..n - 6];
    }
    literal
}

fn build_token(
    start: usize,
    end: usize,
    value: &RawValue,
    tz: &Tz,
    confidence: f32,
) -> Result<Option<DateToken>> {
    match value {
        RawValue::Instant(raw) => Ok(Some(DateToken::instant(
            start,
            end,
            parse_value(raw, tz)?,
            confidence,
        ))),
        RawValue::Interval { from, to } => {
            let from = from.as_ref().map(|raw| parse_value(raw, tz)).transpose()?;
            let to = to.as_ref().map(|raw| parse_value(raw, tz)).transpose()?;
            Ok(DateToken::interval(start, end, from, to, confidence))
        }
        RawValue::Opaque(v) => Err(ContextError::ValueParse(format!(
            "time match without a date value: {v}"
        ))),
    }
}

/// Combine `prev` and an end-only `head` into one closed interval.
///
/// Applies when `prev` is an instant or a start-only interval and `head` ends
/// strictly after `prev` starts. Only ever joins two tokens.
fn splice_open_interval(prev: &DateToken, head: &DateToken) -> Option<DateToken> {
    if !head.is_open_interval() || head.start().is_some() {
        return None;
    }
    let head_end = head.end()?;

    let prev_open_ended = prev.is_instant() || (prev.is_open_interval() && prev.end().is_none());
    if !prev_open_ended {
        return None;
    }
    let prev_start = prev.start()?;
    if head_end.date <= prev_start.date {
        return None;
    }

    DateToken::interval(
        prev.offset_start(),
        head.offset_end(),
        Some(prev_start.clone()),
        Some(head_end.clone()),
        prev.confidence().max(head.confidence()),
    )
}

/// Reject spans that are empty, out of range or split a UTF-8 sequence.
fn check_span(text: &str, m: &RawMatch) -> Result<()> {
    let valid = m.start < m.end
        && m.end <= text.len()
        && text.is_char_boundary(m.start)
        && text.is_char_boundary(m.end);
    if valid {
        Ok(())
    } else {
        Err(ContextError::InvalidSpan(format!(
            "{}..{} in text of {} bytes",
            m.start,
            m.end,
            text.len()
        )))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::FnExtractor;
    use chrono::Timelike;
    use chrono_tz::Europe::Paris;
    use std::sync::Mutex;

    fn paris(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        Paris.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn lit(date: DateTime<Tz>) -> String {
        date.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
    }

    fn time_match(text: &str, needle: &str, value: RawValue, latent: bool) -> Option<RawMatch> {
        let start = text.find(needle)?;
        Some(RawMatch {
            dimension: Dimension::Time,
            start,
            end: start + needle.len(),
            latent,
            value,
        })
    }

    fn instant(date: DateTime<Tz>, grain: &str) -> RawValue {
        RawValue::Instant(RawInstant::new(lit(date), Some(grain)))
    }

    // ── parse_value ─────────────────────────────────────────────────────

    #[test]
    fn test_parse_value_discards_literal_offset() {
        let raw = RawInstant::new("2016-04-02T09:00:00.000-07:00", Some("hour"));
        let value = parse_value(&raw, &Paris).unwrap();
        assert_eq!(value.date, paris(2016, 4, 2, 9, 0));
        assert_eq!(value.grain, Grain::Hour);
    }

    #[test]
    fn test_parse_value_utc_suffix_and_no_fraction() {
        let value = parse_value(&RawInstant::new("2016-04-01T11:00:00Z", Some("minute")), &Paris)
            .unwrap();
        assert_eq!(value.date, paris(2016, 4, 1, 11, 0));
        let bare = parse_value(&RawInstant::new("2016-04-01T11:00:00.000", Some("minute")), &Paris)
            .unwrap();
        assert_eq!(bare.date, value.date);
    }

    #[test]
    fn test_parse_value_unknown_or_missing_grain_is_unset() {
        let raw = RawInstant::new("2016-04-01T11:00:00.000Z", Some("fortnight"));
        assert_eq!(parse_value(&raw, &Paris).unwrap().grain, Grain::Unset);
        let raw = RawInstant::new("2016-04-01T11:00:00.000Z", None);
        assert_eq!(parse_value(&raw, &Paris).unwrap().grain, Grain::Unset);
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        let err = parse_value(&RawInstant::new("next tuesday", Some("day")), &Paris).unwrap_err();
        assert!(matches!(err, ContextError::ValueParse(_)), "got: {err}");
    }

    #[test]
    fn test_parse_value_moves_out_of_dst_gap() {
        // Paris skipped 02:00-03:00 on 2016-03-27.
        let raw = RawInstant::new("2016-03-27T02:30:00.000+01:00", Some("minute"));
        let value = parse_value(&raw, &Paris).unwrap();
        assert_eq!(value.date, paris(2016, 3, 27, 3, 30));
    }

    #[test]
    fn test_strip_timezone_suffix() {
        assert_eq!(strip_timezone_suffix("2016-04-01T11:00:00.000Z"), "2016-04-01T11:00:00.000");
        assert_eq!(strip_timezone_suffix("2016-04-01T11:00:00.000+02:00"), "2016-04-01T11:00:00.000");
        assert_eq!(strip_timezone_suffix("2016-04-01T11:00:00-07:00"), "2016-04-01T11:00:00");
        assert_eq!(strip_timezone_suffix("2016-04-01T11:00:00"), "2016-04-01T11:00:00");
        assert_eq!(strip_timezone_suffix("2016-04-01"), "2016-04-01");
    }

    #[test]
    fn test_latent_confidence_mapping() {
        assert_eq!(latent_confidence(false), 0.9);
        assert_eq!(latent_confidence(true), 0.1);
    }

    // ── options ─────────────────────────────────────────────────────────

    #[test]
    fn test_options_from_json_fill_defaults() {
        let options: ContextOptions =
            serde_json::from_str(r#"{"include_latent": true, "week_start": "sunday"}"#).unwrap();
        assert!(options.include_latent);
        assert_eq!(options.week_start, WeekStartDay::Sunday);
        assert_eq!(options.years_before, 1);
        assert_eq!(options.years_after, 5);
        assert_eq!(options.morning_hour, 6);
    }

    #[test]
    fn test_options_validation() {
        let extractor = FnExtractor::new(|_: &ExtractRequest<'_>| Ok(vec![]));
        let options = ContextOptions {
            morning_hour: 24,
            ..Default::default()
        };
        let err = ContextEngine::with_options(extractor, options).unwrap_err();
        assert!(err.to_string().contains("morning_hour"), "got: {err}");

        let options = ContextOptions {
            years_before: -1,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = ContextOptions {
            years_after: i32::MAX,
            ..Default::default()
        };
        let err = options.validate().unwrap_err();
        assert!(matches!(err, ContextError::Config(_)), "got: {err}");

        let options = ContextOptions {
            years_before: MAX_YEAR_WINDOW,
            years_after: MAX_YEAR_WINDOW,
            ..Default::default()
        };
        assert!(options.validate().is_ok());
    }

    // ── resolve ─────────────────────────────────────────────────────────

    #[test]
    fn test_resolve_empty_extraction() {
        let engine = ContextEngine::new(FnExtractor::new(|_: &ExtractRequest<'_>| Ok(vec![])));
        let tokens = engine.resolve("nothing here", "en", paris(2016, 4, 1, 8, 0), None).unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_resolve_passes_year_window_and_reference() {
        let seen = Mutex::new(Vec::new());
        let engine = ContextEngine::new(FnExtractor::new(|req: &ExtractRequest<'_>| {
            seen.lock()
                .unwrap()
                .push((req.text.to_string(), req.reference, req.min_year, req.max_year));
            Ok(vec![])
        }));
        engine.resolve("text", "fr", paris(2016, 4, 1, 8, 0), None).unwrap();
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec![("text".to_string(), paris(2016, 4, 1, 8, 0), 2015, 2021)]);
    }

    #[test]
    fn test_resolve_finer_mention_replaces_coarse_context() {
        // "today" resolves to the reference day; "at 9am" restates it at hour grain.
        let content = "today we meet at 9am";
        let engine = ContextEngine::new(FnExtractor::new(|req: &ExtractRequest<'_>| {
            let day = req.reference.date_naive();
            let nine = Paris
                .from_local_datetime(&day.and_hms_opt(9, 0, 0).unwrap())
                .unwrap();
            let midnight = Paris
                .from_local_datetime(&day.and_hms_opt(0, 0, 0).unwrap())
                .unwrap();
            Ok([
                time_match(req.text, "today", instant(midnight, "day"), false),
                time_match(req.text, "at 9am", instant(nine, "hour"), false),
            ]
            .into_iter()
            .flatten()
            .collect())
        }));

        let tokens = engine.resolve(content, "en", paris(2016, 4, 1, 8, 0), None).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(&content[tokens[0].offset_start()..tokens[0].offset_end()], "at 9am");
        assert_eq!(tokens[0].value().date, paris(2016, 4, 1, 9, 0));
    }

    #[test]
    fn test_resolve_other_day_context_moves_to_morning() {
        let content = "tomorrow, then at 9";
        let seen = Mutex::new(Vec::new());
        let engine = ContextEngine::new(FnExtractor::new(|req: &ExtractRequest<'_>| {
            seen.lock().unwrap().push(req.reference);
            let tomorrow = req.reference.date_naive().succ_opt().unwrap();
            let midnight = Paris
                .from_local_datetime(&tomorrow.and_hms_opt(0, 0, 0).unwrap())
                .unwrap();
            // "at 9" resolves to the next 9 o'clock after the reference.
            let mut nine = Paris
                .from_local_datetime(&req.reference.date_naive().and_hms_opt(9, 0, 0).unwrap())
                .unwrap();
            if nine <= req.reference {
                nine += Duration::days(1);
            }
            Ok([
                time_match(req.text, "tomorrow", instant(midnight, "day"), false),
                time_match(req.text, "at 9", instant(nine, "hour"), false),
            ]
            .into_iter()
            .flatten()
            .collect())
        }));

        let tokens = engine.resolve(content, "en", paris(2016, 4, 1, 20, 0), None).unwrap();
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], paris(2016, 4, 2, 6, 0));
        assert_eq!(seen[1].hour(), 6);

        // "at 9" restates tomorrow more precisely and replaces it.
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value().date, paris(2016, 4, 2, 9, 0));
    }

    #[test]
    fn test_resolve_reference_day_context_keeps_reference_time() {
        let content = "today, then at 9";
        let seen = Mutex::new(Vec::new());
        let engine = ContextEngine::new(FnExtractor::new(|req: &ExtractRequest<'_>| {
            seen.lock().unwrap().push(req.reference);
            let day = req.reference.date_naive();
            let midnight = Paris
                .from_local_datetime(&day.and_hms_opt(0, 0, 0).unwrap())
                .unwrap();
            let nine = Paris
                .from_local_datetime(&day.and_hms_opt(9, 0, 0).unwrap())
                .unwrap();
            Ok([
                time_match(req.text, "today", instant(midnight, "day"), false),
                time_match(req.text, "at 9", instant(nine, "hour"), false),
            ]
            .into_iter()
            .flatten()
            .collect())
        }));

        let reference = paris(2016, 4, 1, 8, 0);
        let tokens = engine.resolve(content, "en", reference, None).unwrap();
        let seen = seen.lock().unwrap().clone();

        // A day-grain mention of the reference day hands back the reference
        // itself, not midnight or the morning hour.
        assert_eq!(seen, vec![reference, reference]);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value().date, paris(2016, 4, 1, 9, 0));
    }

    fn splice_engine(end_value: DateTime<Tz>) -> ContextEngine<Box<dyn TemporalExtractor>> {
        let extractor: Box<dyn TemporalExtractor> = Box::new(FnExtractor::new(move |req: &ExtractRequest<'_>| {
            Ok([
                time_match(req.text, "Friday 18h", instant(paris(2016, 4, 1, 18, 0), "hour"), false),
                time_match(
                    req.text,
                    "until Sunday 22h",
                    RawValue::Interval {
                        from: None,
                        to: Some(RawInstant::new(lit(end_value), Some("hour"))),
                    },
                    false,
                ),
            ]
            .into_iter()
            .flatten()
            .collect())
        }));
        ContextEngine::new(extractor)
    }

    #[test]
    fn test_resolve_splices_instant_and_deadline() {
        let content = "Friday 18h and until Sunday 22h";
        let engine = splice_engine(paris(2016, 4, 3, 22, 0));
        let tokens = engine.resolve(content, "en", paris(2016, 4, 1, 8, 0), None).unwrap();

        assert_eq!(tokens.len(), 1);
        let token = &tokens[0];
        assert!(!token.is_instant());
        assert!(!token.is_open_interval());
        assert_eq!((token.offset_start(), token.offset_end()), (0, content.len()));
        assert_eq!(token.start().unwrap().date, paris(2016, 4, 1, 18, 0));
        assert_eq!(token.end().unwrap().date, paris(2016, 4, 3, 22, 0));
        assert_eq!(token.confidence(), 0.9);
    }

    #[test]
    fn test_resolve_no_splice_when_deadline_precedes_instant() {
        let content = "Friday 18h and until Sunday 22h";
        let engine = splice_engine(paris(2016, 3, 27, 22, 0));
        let tokens = engine.resolve(content, "en", paris(2016, 4, 1, 8, 0), None).unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].is_instant());
        assert!(tokens[1].is_open_interval());
    }

    #[test]
    fn test_splice_requires_open_ended_previous() {
        let start = Temporal::new(paris(2016, 4, 1, 18, 0), Grain::Hour);
        let end = Temporal::new(paris(2016, 4, 1, 20, 0), Grain::Hour);
        let deadline = DateToken::interval(
            20,
            30,
            None,
            Some(Temporal::new(paris(2016, 4, 3, 22, 0), Grain::Hour)),
            0.1,
        )
        .unwrap();

        let closed = DateToken::interval(0, 10, Some(start.clone()), Some(end.clone()), 0.9).unwrap();
        assert!(splice_open_interval(&closed, &deadline).is_none());

        let end_only = DateToken::interval(0, 10, None, Some(end), 0.9).unwrap();
        assert!(splice_open_interval(&end_only, &deadline).is_none());

        let start_only = DateToken::interval(0, 10, Some(start.clone()), None, 0.4).unwrap();
        let spliced = splice_open_interval(&start_only, &deadline).unwrap();
        assert_eq!(spliced.start(), Some(&start));
        assert_eq!((spliced.offset_start(), spliced.offset_end()), (0, 30));
        assert_eq!(spliced.confidence(), 0.4);
    }

    #[test]
    fn test_resolve_drops_duplicates_and_durations() {
        let content = "for 3 days from tomorrow";
        let engine = ContextEngine::new(FnExtractor::new(|req: &ExtractRequest<'_>| {
            let tomorrow = instant(paris(2016, 4, 2, 0, 0), "day");
            let first = time_match(req.text, "tomorrow", tomorrow.clone(), false).unwrap();
            let duration = RawMatch {
                dimension: Dimension::Duration,
                start: 4,
                end: 10,
                latent: false,
                value: RawValue::Opaque(serde_json::json!({"value": 3, "unit": "day"})),
            };
            let duplicate = RawMatch {
                value: instant(paris(2017, 1, 1, 0, 0), "day"),
                ..first.clone()
            };
            Ok(vec![duration, first, duplicate])
        }));

        let tokens = engine.resolve(content, "en", paris(2016, 4, 1, 8, 0), None).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value().date, paris(2016, 4, 2, 0, 0));
    }

    #[test]
    fn test_resolve_drops_unparseable_value_only() {
        let content = "soon, or tomorrow";
        let engine = ContextEngine::new(FnExtractor::new(|req: &ExtractRequest<'_>| {
            Ok([
                time_match(req.text, "soon", RawValue::Instant(RawInstant::new("soon", Some("day"))), false),
                time_match(req.text, "tomorrow", instant(paris(2016, 4, 2, 0, 0), "day"), false),
            ]
            .into_iter()
            .flatten()
            .collect())
        }));
        let tokens = engine.resolve(content, "en", paris(2016, 4, 1, 8, 0), None).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(&content[tokens[0].offset_start()..tokens[0].offset_end()], "tomorrow");
    }

    #[test]
    fn test_resolve_latent_uses_options_default() {
        let content = "room 12";
        let extractor = FnExtractor::new(|req: &ExtractRequest<'_>| {
            Ok(time_match(req.text, "12", instant(paris(2016, 4, 1, 12, 0), "hour"), true)
                .into_iter()
                .collect())
        });
        let options = ContextOptions {
            include_latent: true,
            ..Default::default()
        };
        let engine = ContextEngine::with_options(extractor, options).unwrap();
        let reference = paris(2016, 4, 1, 8, 0);

        let tokens = engine.resolve(content, "en", reference, None).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].confidence(), 0.1);
        assert!(engine.resolve(content, "en", reference, Some(false)).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_rejects_span_outside_text() {
        let engine = ContextEngine::new(FnExtractor::new(|req: &ExtractRequest<'_>| {
            Ok(vec![RawMatch {
                dimension: Dimension::Time,
                start: 0,
                end: req.text.len() + 4,
                latent: false,
                value: instant(paris(2016, 4, 2, 0, 0), "day"),
            }])
        }));
        let err = engine.resolve("today", "en", paris(2016, 4, 1, 8, 0), None).unwrap_err();
        assert!(matches!(err, ContextError::InvalidSpan(_)), "got: {err}");
    }

    #[test]
    fn test_resolve_rejects_span_inside_utf8_sequence() {
        let engine = ContextEngine::new(FnExtractor::new(|_: &ExtractRequest<'_>| {
            Ok(vec![RawMatch {
                dimension: Dimension::Time,
                start: 1,
                end: 3,
                latent: false,
                value: instant(paris(2016, 4, 2, 0, 0), "day"),
            }])
        }));
        let err = engine.resolve("été", "fr", paris(2016, 4, 1, 8, 0), None).unwrap_err();
        assert!(matches!(err, ContextError::InvalidSpan(_)), "got: {err}");
    }

    #[test]
    fn test_resolve_propagates_extraction_failure() {
        let engine = ContextEngine::new(FnExtractor::new(|_: &ExtractRequest<'_>| {
            Err(ContextError::Extraction("connection refused".to_string()))
        }));
        let err = engine.resolve("today", "en", paris(2016, 4, 1, 8, 0), None).unwrap_err();
        assert!(err.to_string().contains("connection refused"), "got: {err}");
    }
}
