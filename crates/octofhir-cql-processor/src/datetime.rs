//! Execution date/time passed to the engine
//!
//! Accepts ISO 8601 strings of partial precision, as CQL DateTime literals do:
//! `2024`, `2024-01`, `2024-01-15`, `2024-01-15T10`, `2024-01-15T10:30`,
//! `2024-01-15T10:30:00`, `2024-01-15T10:30:00.250`, each with an optional
//! `Z` or `+hh:mm` / `-hh:mm` offset when a time is present. A leading `@` is
//! stripped.

use crate::error::{ProcessorError, ProcessorResult};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Offset, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

/// Most precise component present in an [`ExecutionDateTime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DateTimePrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

/// The instant an evaluation runs "as of"
///
/// Missing components are filled with their minimum and a missing offset is
/// taken as UTC; [`precision`](Self::precision) records what was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionDateTime {
    instant: DateTime<FixedOffset>,
    precision: DateTimePrecision,
    has_offset: bool,
}

impl ExecutionDateTime {
    /// Parse an ISO 8601 date/time of any CQL precision
    pub fn parse(input: &str) -> ProcessorResult<Self> {
        let fail = |message: &str| ProcessorError::invalid_execution_date_time(input, message);

        let s = input.trim();
        let s = s.strip_prefix('@').unwrap_or(s);
        if s.is_empty() {
            return Err(fail("empty value"));
        }

        let (date_str, time_str) = match s.split_once('T') {
            Some((date, time)) => (date, Some(time)),
            None => (s, None),
        };

        // Date portion
        let date_parts: Vec<&str> = date_str.split('-').collect();
        if date_parts.len() > 3 {
            return Err(fail("too many date components"));
        }
        let year: i32 = parse_digits(date_parts[0], 4).ok_or_else(|| fail("year must be four digits"))?;
        let month: Option<u32> = match date_parts.get(1) {
            Some(m) => Some(parse_digits(m, 2).ok_or_else(|| fail("month must be two digits"))?),
            None => None,
        };
        let day: Option<u32> = match date_parts.get(2) {
            Some(d) => Some(parse_digits(d, 2).ok_or_else(|| fail("day must be two digits"))?),
            None => None,
        };

        let date = NaiveDate::from_ymd_opt(year, month.unwrap_or(1), day.unwrap_or(1))
            .ok_or_else(|| fail("date is out of range"))?;

        let mut precision = match (month, day) {
            (None, _) => DateTimePrecision::Year,
            (Some(_), None) => DateTimePrecision::Month,
            (Some(_), Some(_)) => DateTimePrecision::Day,
        };

        let Some(time_str) = time_str else {
            let instant = date
                .and_time(NaiveTime::MIN)
                .and_local_timezone(utc())
                .single()
                .ok_or_else(|| fail("date is out of range"))?;
            return Ok(Self {
                instant,
                precision,
                has_offset: false,
            });
        };

        if day.is_none() {
            return Err(fail("a time requires a full date"));
        }

        // Timezone suffix
        let (clock, offset) = if let Some(clock) = time_str.strip_suffix('Z') {
            (clock, Some(0))
        } else if let Some(idx) = time_str.rfind(['+', '-']) {
            let negative = time_str[idx..].starts_with('-');
            let minutes = parse_offset(&time_str[idx + 1..], negative)
                .ok_or_else(|| fail("timezone offset must be hh:mm"))?;
            (&time_str[..idx], Some(minutes))
        } else {
            (time_str, None)
        };

        // Time portion
        let time_parts: Vec<&str> = clock.split(':').collect();
        if time_parts.len() > 3 {
            return Err(fail("too many time components"));
        }
        let hour: u32 = parse_digits(time_parts[0], 2).ok_or_else(|| fail("hour must be two digits"))?;
        precision = DateTimePrecision::Hour;

        let mut minute = 0;
        let mut second = 0;
        let mut millisecond = 0;
        if let Some(m) = time_parts.get(1) {
            minute = parse_digits(m, 2).ok_or_else(|| fail("minute must be two digits"))?;
            precision = DateTimePrecision::Minute;
        }
        if let Some(sec) = time_parts.get(2) {
            let (whole, fraction) = match sec.split_once('.') {
                Some((whole, fraction)) => (whole, Some(fraction)),
                None => (*sec, None),
            };
            second = parse_digits(whole, 2).ok_or_else(|| fail("second must be two digits"))?;
            precision = DateTimePrecision::Second;
            if let Some(fraction) = fraction {
                millisecond = parse_millis(fraction).ok_or_else(|| fail("fractional seconds must be 1-3 digits"))?;
                precision = DateTimePrecision::Millisecond;
            }
        }

        let time = NaiveTime::from_hms_milli_opt(hour, minute, second, millisecond)
            .ok_or_else(|| fail("time is out of range"))?;
        let tz = match offset {
            Some(minutes) => FixedOffset::east_opt(minutes * 60)
                .ok_or_else(|| fail("timezone offset is out of range"))?,
            None => utc(),
        };
        let instant = date
            .and_time(time)
            .and_local_timezone(tz)
            .single()
            .ok_or_else(|| fail("date/time is out of range"))?;

        Ok(Self {
            instant,
            precision,
            has_offset: offset.is_some(),
        })
    }

    /// Wrap a chrono value at millisecond precision
    pub fn from_chrono(instant: DateTime<FixedOffset>) -> Self {
        Self {
            instant,
            precision: DateTimePrecision::Millisecond,
            has_offset: true,
        }
    }

    /// The instant, with unspecified components at their minimum
    pub fn to_chrono(&self) -> DateTime<FixedOffset> {
        self.instant
    }

    /// Most precise component that was specified
    pub fn precision(&self) -> DateTimePrecision {
        self.precision
    }

    /// Whether a timezone offset was specified
    pub fn has_offset(&self) -> bool {
        self.has_offset
    }

    /// Calendar date of the instant
    pub fn date(&self) -> NaiveDate {
        self.instant.date_naive()
    }
}

impl FromStr for ExecutionDateTime {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ExecutionDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dt = &self.instant;
        write!(f, "{:04}", dt.year())?;
        if self.precision >= DateTimePrecision::Month {
            write!(f, "-{:02}", dt.month())?;
        }
        if self.precision >= DateTimePrecision::Day {
            write!(f, "-{:02}", dt.day())?;
        }
        if self.precision >= DateTimePrecision::Hour {
            write!(f, "T{:02}", dt.hour())?;
        }
        if self.precision >= DateTimePrecision::Minute {
            write!(f, ":{:02}", dt.minute())?;
        }
        if self.precision >= DateTimePrecision::Second {
            write!(f, ":{:02}", dt.second())?;
        }
        if self.precision >= DateTimePrecision::Millisecond {
            write!(f, ".{:03}", dt.timestamp_subsec_millis())?;
        }
        if self.has_offset {
            let total = dt.offset().local_minus_utc() / 60;
            let sign = if total < 0 { '-' } else { '+' };
            write!(f, "{}{:02}:{:02}", sign, total.abs() / 60, total.abs() % 60)?;
        }
        Ok(())
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn parse_digits<T: FromStr>(s: &str, width: usize) -> Option<T> {
    if s.len() != width || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_millis(fraction: &str) -> Option<u32> {
    if fraction.is_empty() || fraction.len() > 3 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{:0<3}", fraction);
    padded.parse().ok()
}

/// Offset like `05:00` or `0500`, in minutes
fn parse_offset(s: &str, negative: bool) -> Option<i32> {
    let clean = s.replace(':', "");
    if clean.len() != 4 || !clean.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = parse_digits(&clean[..2], 2)?;
    let minutes: i32 = parse_digits(&clean[2..], 2)?;
    if minutes >= 60 {
        return None;
    }
    let total = hours * 60 + minutes;
    Some(if negative { -total } else { total })
}
