//! Calendar truncation and grain-aware comparison.
//!
//! Truncation is done on the local wall clock of the value's own timezone and
//! then mapped back to an instant. That mapping can fail: when DST starts at
//! midnight (e.g. `America/Sao_Paulo` before 2019) the local start of that day
//! does not exist. Such a grain is treated as unsupported for that value and
//! [`compare_truncated`] steps down to the next finer grain.

use std::cmp::Ordering;

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike, Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::grain::Grain;

// ── Configurable week start ─────────────────────────────────────────────────

/// Which day begins a week for week-grain truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStartDay {
    /// ISO 8601 standard (Monday = day 0 of the week).
    #[default]
    Monday,
    /// US/Canada convention (Sunday = day 0 of the week).
    Sunday,
}

/// How many days `weekday` is from the week-start day.
fn days_from_week_start(weekday: Weekday, week_start: WeekStartDay) -> i64 {
    match week_start {
        WeekStartDay::Monday => weekday.num_days_from_monday() as i64,
        WeekStartDay::Sunday => weekday.num_days_from_sunday() as i64,
    }
}

// ── truncate ────────────────────────────────────────────────────────────────

/// Truncate `date` to the start of its enclosing `grain` period.
///
/// Returns `None` when the grain has no calendar boundary ([`Grain::Unset`])
/// or when the truncated wall-clock time does not exist in the value's
/// timezone.
///
/// # Examples
///
/// ```
/// use chrono::TimeZone;
/// use temporal_context::{truncate, Grain, WeekStartDay};
///
/// let date = chrono_tz::Europe::Paris.with_ymd_and_hms(2016, 4, 1, 18, 42, 7).unwrap();
/// let week = truncate(&date, Grain::Week, WeekStartDay::Monday).unwrap();
/// assert_eq!(week.to_rfc3339(), "2016-03-28T00:00:00+02:00");
/// ```
pub fn truncate(date: &DateTime<Tz>, grain: Grain, week_start: WeekStartDay) -> Option<DateTime<Tz>> {
    let local = date.naive_local();
    let day = local.date();

    let naive = match grain {
        Grain::Unset => return None,
        Grain::Second => local.with_nanosecond(0)?,
        Grain::Minute => day.and_hms_opt(local.hour(), local.minute(), 0)?,
        Grain::Hour => day.and_hms_opt(local.hour(), 0, 0)?,
        Grain::Day => day.and_hms_opt(0, 0, 0)?,
        Grain::Week => {
            let back = days_from_week_start(day.weekday(), week_start);
            day.checked_sub_signed(Duration::days(back))?
                .and_hms_opt(0, 0, 0)?
        }
        Grain::Month => NaiveDate::from_ymd_opt(day.year(), day.month(), 1)?.and_hms_opt(0, 0, 0)?,
        Grain::Quarter => {
            let q_start_month = ((day.month() - 1) / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(day.year(), q_start_month, 1)?.and_hms_opt(0, 0, 0)?
        }
        Grain::Year => NaiveDate::from_ymd_opt(day.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
    };

    localize_like(date, naive)
}

/// Truncate at `grain`, stepping down to finer grains until one succeeds.
///
/// Returns the truncated value together with the grain actually used.
pub fn truncate_with_fallback(
    date: &DateTime<Tz>,
    grain: Grain,
    week_start: WeekStartDay,
) -> Option<(DateTime<Tz>, Grain)> {
    let mut current = Some(grain);
    while let Some(g) = current {
        if let Some(truncated) = truncate(date, g, week_start) {
            return Some((truncated, g));
        }
        current = g.finer();
    }
    None
}

// ── compare_truncated ───────────────────────────────────────────────────────

/// Compare two dates after truncating both to `grain`, using ISO weeks.
///
/// See [`compare_truncated_with`].
pub fn compare_truncated(date1: &DateTime<Tz>, date2: &DateTime<Tz>, grain: Grain) -> Ordering {
    compare_truncated_with(date1, date2, grain, WeekStartDay::default())
}

/// Compare two dates after truncating both to `grain`.
///
/// When either date cannot be truncated at `grain`, both are retried at the
/// next finer grain, down to seconds. If no grain works the raw instants are
/// compared and a warning is logged. Never panics.
pub fn compare_truncated_with(
    date1: &DateTime<Tz>,
    date2: &DateTime<Tz>,
    grain: Grain,
    week_start: WeekStartDay,
) -> Ordering {
    let mut current = Some(grain);
    while let Some(g) = current {
        match (truncate(date1, g, week_start), truncate(date2, g, week_start)) {
            (Some(a), Some(b)) => {
                if g != grain {
                    debug!(requested = %grain, used = %g, "compared at finer grain");
                }
                return a.cmp(&b);
            }
            _ => {
                debug!(grain = %g, %date1, %date2, "truncation unsupported, stepping down");
                current = g.finer();
            }
        }
    }

    warn!(
        grain = %grain,
        %date1,
        %date2,
        "no grain could truncate both dates, comparing raw instants"
    );
    date1.cmp(date2)
}

/// Map a local wall-clock time back into `date`'s timezone.
///
/// In a DST fold the offset already carried by `date` wins, so truncating
/// within the repeated hour stays in that hour.
fn localize_like(date: &DateTime<Tz>, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    let tz = date.timezone();
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt),
        chrono::LocalResult::Ambiguous(first, second) => {
            if second.offset().fix() == date.offset().fix() {
                Some(second)
            } else {
                Some(first)
            }
        }
        chrono::LocalResult::None => None,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
