//! Value parsers for the typed iCalendar values (RFC 5545 §3.3).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::ical::core::{
    DateTime, Duration, Frequency, Period, Recur, RecurUntil, UtcOffset, Weekday, WeekdayNum,
};

fn err(kind: ParseErrorKind, line: usize, value: &str) -> ParseError {
    ParseError::new(kind, line, 1).with_context(format!("'{value}'"))
}

/// Parses a DATE value (`YYYYMMDD`).
///
/// ## Errors
/// Returns an error if the value is not a valid calendar date.
pub fn parse_date(s: &str, line: usize) -> ParseResult<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err(ParseErrorKind::InvalidDate, line, s));
    }
    let year = digits(&s[0..4]);
    NaiveDate::from_ymd_opt(year, digits(&s[4..6]).unsigned_abs(), digits(&s[6..8]).unsigned_abs())
        .ok_or_else(|| err(ParseErrorKind::InvalidDate, line, s))
}

/// Value of an all-digit slice; callers check the characters first.
fn digits(s: &str) -> i32 {
    s.bytes()
        .fold(0, |acc, b| acc * 10 + i32::from(b - b'0'))
}

/// Parses a DATE-TIME value (`YYYYMMDDTHHMMSS[Z]`).
///
/// A trailing `Z` wins over a TZID parameter, which RFC 5545 forbids
/// combining anyway.
///
/// ## Errors
/// Returns an error if the value is not a valid date-time.
pub fn parse_datetime(s: &str, tzid: Option<&str>, line: usize) -> ParseResult<DateTime> {
    let (body, utc) = match s.strip_suffix(['Z', 'z']) {
        Some(body) => (body, true),
        None => (s, false),
    };
    let (date_part, time_part) = body
        .split_once(['T', 't'])
        .ok_or_else(|| err(ParseErrorKind::InvalidDateTime, line, s))?;
    if time_part.len() != 6 || !time_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err(ParseErrorKind::InvalidDateTime, line, s));
    }

    let date = parse_date(date_part, line)
        .map_err(|e| err(ParseErrorKind::InvalidDateTime, line, s).with_context(e.to_string()))?;
    let (hour, minute, second) = (
        digits(&time_part[0..2]).unsigned_abs(),
        digits(&time_part[2..4]).unsigned_abs(),
        // Leap seconds are clamped to :59.
        digits(&time_part[4..6]).unsigned_abs().min(59),
    );
    let time = NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| err(ParseErrorKind::InvalidDateTime, line, s))?;
    let local = NaiveDateTime::new(date, time);

    Ok(match (utc, tzid) {
        (true, _) => DateTime::utc(local),
        (false, Some(tzid)) => DateTime::zoned(local, tzid),
        (false, None) => DateTime::floating(local),
    })
}

/// Parses a UTC-OFFSET value (`+HHMM[SS]`).
///
/// ## Errors
/// Returns an error if the value is not a valid offset.
pub fn parse_utc_offset(s: &str, line: usize) -> ParseResult<UtcOffset> {
    let invalid = || err(ParseErrorKind::InvalidUtcOffset, line, s);
    let (sign, digits) = match s.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => return Err(invalid()),
    };
    if !(digits.len() == 4 || digits.len() == 6) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let field = |range: std::ops::Range<usize>| -> ParseResult<i32> {
        digits
            .get(range)
            .map_or(Ok(0), |part| part.parse::<i32>().map_err(|_| invalid()))
    };
    let hours = field(0..2)?;
    let minutes = field(2..4)?;
    let seconds = if digits.len() == 6 { field(4..6)? } else { 0 };
    Ok(UtcOffset::from_seconds(
        sign * (hours * 3600 + minutes * 60 + seconds),
    ))
}

/// Parses a DURATION value (`[+-]P[nW]` or `[+-]P[nD][T[nH][nM][nS]]`).
///
/// ## Errors
/// Returns an error if the value is not a valid duration.
pub fn parse_duration(s: &str, line: usize) -> ParseResult<Duration> {
    let invalid = || err(ParseErrorKind::InvalidDuration, line, s);
    let (negative, rest) = match s.split_at_checked(1) {
        Some(("-", rest)) => (true, rest),
        Some(("+", rest)) => (false, rest),
        _ => (false, s),
    };
    let rest = rest.strip_prefix(['P', 'p']).ok_or_else(invalid)?;
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut duration = Duration {
        negative,
        ..Duration::zero()
    };
    let mut number = String::new();
    let mut in_time = false;
    let mut saw_part = false;

    for c in rest.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        let upper = c.to_ascii_uppercase();
        if upper == 'T' {
            if in_time || !number.is_empty() {
                return Err(invalid());
            }
            in_time = true;
            continue;
        }
        let value: u32 = number.parse().map_err(|_| invalid())?;
        number.clear();
        saw_part = true;
        match (upper, in_time) {
            ('W', false) => duration.weeks = value,
            ('D', false) => duration.days = value,
            ('H', true) => duration.hours = value,
            ('M', true) => duration.minutes = value,
            ('S', true) => duration.seconds = value,
            _ => return Err(invalid()),
        }
    }

    if !number.is_empty() || !saw_part {
        return Err(invalid());
    }
    Ok(duration)
}

/// Parses a PERIOD value (`start/end` or `start/duration`).
///
/// ## Errors
/// Returns an error if either half is invalid.
pub fn parse_period(s: &str, tzid: Option<&str>, line: usize) -> ParseResult<Period> {
    let (start, end) = s
        .split_once('/')
        .ok_or_else(|| err(ParseErrorKind::InvalidPeriod, line, s))?;
    let start = parse_datetime(start, tzid, line)?;
    if end.starts_with(['P', 'p', '+', '-']) {
        let duration = parse_duration(end, line)?;
        Ok(Period::Duration { start, duration })
    } else {
        let end = parse_datetime(end, tzid, line)?;
        Ok(Period::Explicit { start, end })
    }
}

/// Parses a RECUR value.
///
/// ## Errors
/// Returns an error if FREQ is missing, a part is malformed, or both
/// COUNT and UNTIL are present.
pub fn parse_recur(s: &str, line: usize) -> ParseResult<Recur> {
    let invalid = |context: &str| err(ParseErrorKind::InvalidRecur, line, context);
    let mut freq = None;
    let mut parts = Vec::new();

    for part in s.split(';').filter(|p| !p.is_empty()) {
        let (name, value) = part.split_once('=').ok_or_else(|| invalid(part))?;
        let name = name.to_ascii_uppercase();
        if name == "FREQ" {
            freq = Some(Frequency::parse(value).ok_or_else(|| invalid(part))?);
        } else {
            parts.push((name, value));
        }
    }

    let mut recur = Recur::new(freq.ok_or_else(|| invalid("missing FREQ"))?);
    for (name, value) in parts {
        let context = format!("{name}={value}");
        let bad = || invalid(&context);
        match name.as_str() {
            "UNTIL" => {
                recur.until = Some(if value.len() == 8 {
                    RecurUntil::Date(parse_date(value, line)?)
                } else {
                    RecurUntil::DateTime(parse_datetime(value, None, line)?)
                });
            }
            "COUNT" => recur.count = Some(value.parse().map_err(|_| bad())?),
            "INTERVAL" => recur.interval = Some(value.parse().map_err(|_| bad())?),
            "BYSECOND" => recur.by_second = parse_list(value).ok_or_else(bad)?,
            "BYMINUTE" => recur.by_minute = parse_list(value).ok_or_else(bad)?,
            "BYHOUR" => recur.by_hour = parse_list(value).ok_or_else(bad)?,
            "BYMONTHDAY" => recur.by_month_day = parse_list(value).ok_or_else(bad)?,
            "BYYEARDAY" => recur.by_year_day = parse_list(value).ok_or_else(bad)?,
            "BYWEEKNO" => recur.by_week_no = parse_list(value).ok_or_else(bad)?,
            "BYMONTH" => recur.by_month = parse_list(value).ok_or_else(bad)?,
            "BYSETPOS" => recur.by_set_pos = parse_list(value).ok_or_else(bad)?,
            "BYDAY" => {
                recur.by_day = value
                    .split(',')
                    .map(parse_weekday_num)
                    .collect::<Option<_>>()
                    .ok_or_else(bad)?;
            }
            "WKST" => recur.wkst = Some(Weekday::parse(value).ok_or_else(bad)?),
            _ => tracing::debug!(part = %context, "Ignoring unknown RECUR part"),
        }
    }

    if recur.count.is_some() && recur.until.is_some() {
        return Err(invalid("COUNT and UNTIL are mutually exclusive"));
    }

    Ok(recur)
}

fn parse_list<T: std::str::FromStr>(value: &str) -> Option<Vec<T>> {
    value
        .split(',')
        .map(|item| item.trim_start_matches('+').parse().ok())
        .collect()
}

fn parse_weekday_num(s: &str) -> Option<WeekdayNum> {
    let split = s.len().checked_sub(2)?;
    let (ordinal, day) = s.split_at_checked(split)?;
    let weekday = Weekday::parse(day)?;
    if ordinal.is_empty() {
        return Some(WeekdayNum::every(weekday));
    }
    let ordinal: i8 = ordinal.trim_start_matches('+').parse().ok()?;
    Some(WeekdayNum::nth(ordinal, weekday))
}

/// Unescapes a TEXT value (RFC 5545 §3.3.11).
#[must_use]
pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// ## Errors
/// Returns an error unless the value is TRUE or FALSE.
pub fn parse_boolean(s: &str, line: usize) -> ParseResult<bool> {
    match s.to_ascii_uppercase().as_str() {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        _ => Err(err(ParseErrorKind::InvalidBoolean, line, s)),
    }
}

/// ## Errors
/// Returns an error if the value is not a 32-bit integer.
pub fn parse_integer(s: &str, line: usize) -> ParseResult<i32> {
    s.trim_start_matches('+')
        .parse()
        .map_err(|_| err(ParseErrorKind::InvalidInteger, line, s))
}
