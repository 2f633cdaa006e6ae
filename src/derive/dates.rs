//! Calendar-aware date arithmetic and update frequencies

use chrono::{Duration, Months, NaiveDateTime};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Average month length used for fractional months
const DAYS_PER_MONTH: f64 = 30.43;

const MICROS_PER_DAY: f64 = 86_400_000_000.0;

/// Frequency value meaning "no update schedule"
pub const UNSCHEDULED: &str = "PT1S";

/// Usage errors of [`date_ago`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DurationError {
    #[error("Illegal argument (n = {0}). n must be >= 0")]
    NegativeCount(f64),

    #[error("Illegal argument (n = {0}). n must be a finite number")]
    NonFiniteCount(f64),

    #[error("Illegal argument (unit = {0}). Allowed values are day, week, month and year.")]
    UnknownUnit(String),

    #[error("{n} {unit}(s) before {from} is out of the supported date range")]
    OutOfRange {
        n: f64,
        unit: TimeUnit,
        from: NaiveDateTime,
    },
}

/// Calendar unit of a duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Day,
    Week,
    Month,
    Year,
}

impl FromStr for TimeUnit {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(TimeUnit::Day),
            "week" => Ok(TimeUnit::Week),
            "month" => Ok(TimeUnit::Month),
            "year" => Ok(TimeUnit::Year),
            other => Err(DurationError::UnknownUnit(other.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
            TimeUnit::Year => "year",
        };
        write!(f, "{}", name)
    }
}

impl TimeUnit {
    /// Unit of an ISO 8601 duration designator (`D`, `W`, `M`, `Y`)
    pub fn from_designator(designator: char) -> Option<Self> {
        match designator {
            'D' => Some(TimeUnit::Day),
            'W' => Some(TimeUnit::Week),
            'M' => Some(TimeUnit::Month),
            'Y' => Some(TimeUnit::Year),
            _ => None,
        }
    }
}

/// Returns the date `n` units before `from`
///
/// Days and weeks are exact. Months step back through the calendar and clamp
/// the day of month (March 31 minus one month is the last day of February);
/// a fractional remainder is taken as days of a 30.43-day month. Years are
/// converted to `round(n * 12)` months.
///
/// # Errors
///
/// * `NegativeCount` - `n < 0`
/// * `UnknownUnit` - `unit` is not one of day, week, month, year
pub fn date_ago(n: f64, unit: &str, from: NaiveDateTime) -> Result<NaiveDateTime, DurationError> {
    if n < 0.0 {
        return Err(DurationError::NegativeCount(n));
    }
    date_ago_unit(n, unit.parse::<TimeUnit>()?, from)
}

/// [`date_ago`] with an already parsed unit
pub(crate) fn date_ago_unit(
    n: f64,
    unit: TimeUnit,
    from: NaiveDateTime,
) -> Result<NaiveDateTime, DurationError> {
    if n < 0.0 {
        return Err(DurationError::NegativeCount(n));
    }
    if !n.is_finite() {
        return Err(DurationError::NonFiniteCount(n));
    }
    subtract(n, unit, from).ok_or(DurationError::OutOfRange { n, unit, from })
}

fn subtract(n: f64, unit: TimeUnit, from: NaiveDateTime) -> Option<NaiveDateTime> {
    match unit {
        TimeUnit::Day => from.checked_sub_signed(days(n)?),
        TimeUnit::Week => from.checked_sub_signed(days(n * 7.0)?),
        TimeUnit::Month => {
            let whole = n.trunc();
            let months = u32::try_from(whole as i64).ok()?;
            from.checked_sub_months(Months::new(months))?
                .checked_sub_signed(days((n - whole) * DAYS_PER_MONTH)?)
        }
        TimeUnit::Year => subtract((n * 12.0).round(), TimeUnit::Month, from),
    }
}

fn days(n: f64) -> Option<Duration> {
    let micros = (n * MICROS_PER_DAY).round();
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(Duration::microseconds(micros as i64))
}

/// A dataset's declared update cadence
#[derive(Debug, Clone, PartialEq)]
pub enum Frequency {
    /// `PT1S`: no schedule, always current
    Unscheduled,

    /// `P<count><unit>`, e.g. `P1M`, `P0.5Y`
    Every { count: f64, unit: TimeUnit },

    /// Anything else
    Unrecognized(String),
}

impl Frequency {
    pub fn parse(text: &str) -> Self {
        if text == UNSCHEDULED {
            return Frequency::Unscheduled;
        }

        let every = text.strip_prefix('P').and_then(|rest| {
            let designator = rest.chars().last()?;
            let unit = TimeUnit::from_designator(designator)?;
            let count = rest[..rest.len() - designator.len_utf8()].parse::<f64>().ok()?;
            Some(Frequency::Every { count, unit })
        });
        every.unwrap_or_else(|| Frequency::Unrecognized(text.to_string()))
    }

    /// The oldest update date still considered current at `now`
    ///
    /// `None` for frequencies without a schedule.
    pub fn oldest_valid_update(
        &self,
        now: NaiveDateTime,
    ) -> Option<Result<NaiveDateTime, DurationError>> {
        match self {
            Frequency::Every { count, unit } => Some(date_ago_unit(*count, *unit, now)),
            Frequency::Unscheduled | Frequency::Unrecognized(_) => None,
        }
    }
}
