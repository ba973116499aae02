//! iCalendar document parser (RFC 5545).
//!
//! Parses complete iCalendar documents into typed structures.

use super::error::{ParseError, ParseErrorKind, ParseResult};
use super::lexer::{ContentLine, parse_content_line, split_lines};
use super::values::{
    parse_boolean, parse_date, parse_datetime, parse_duration, parse_integer, parse_period,
    parse_recur, parse_utc_offset, unescape_text,
};
use crate::ical::core::{Component, ComponentKind, ICalendar, Property, Value, names};

/// Parses an iCalendar document from a string.
///
/// ## Errors
///
/// Returns an error if the input is not valid iCalendar.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse(input: &str) -> ParseResult<ICalendar> {
    tracing::debug!("Parsing iCalendar document");

    let lines = split_lines(input);
    if lines.is_empty() {
        tracing::warn!("Empty iCalendar input");
        return Err(ParseError::new(ParseErrorKind::MissingBegin, 1, 1));
    }

    tracing::trace!(count = lines.len(), "Split lines");

    let mut stack: Vec<(usize, Component)> = Vec::new();
    let mut root = None;

    for (line_num, line) in lines {
        let content_line = parse_content_line(&line, line_num)?;

        match content_line.name.as_str() {
            "BEGIN" => {
                if root.is_some() {
                    tracing::warn!(line = line_num, "Ignoring content after END:VCALENDAR");
                    break;
                }
                stack.push((line_num, Component::named(content_line.raw_value.trim())));
            }
            "END" => {
                let end_name = content_line.raw_value.trim().to_ascii_uppercase();
                let Some((_, component)) = stack.pop() else {
                    return Err(ParseError::new(ParseErrorKind::MissingBegin, line_num, 1)
                        .with_context(format!("END:{end_name} without BEGIN")));
                };
                if component.name != end_name {
                    return Err(
                        ParseError::new(ParseErrorKind::MismatchedComponent, line_num, 1)
                            .with_context(format!(
                                "expected END:{}, got END:{end_name}",
                                component.name
                            )),
                    );
                }
                match stack.last_mut() {
                    Some((_, parent)) => parent.children.push(component),
                    None => root = Some(component),
                }
            }
            _ => {
                let Some((_, current)) = stack.last_mut() else {
                    if root.is_some() {
                        continue;
                    }
                    return Err(ParseError::new(ParseErrorKind::MissingBegin, line_num, 1));
                };
                current.properties.push(parse_property(content_line, line_num)?);
            }
        }
    }

    if let Some((line_num, open)) = stack.pop() {
        return Err(ParseError::new(ParseErrorKind::MissingEnd, line_num, 1)
            .with_context(format!("missing END:{}", open.name)));
    }

    let root = root.ok_or_else(|| ParseError::new(ParseErrorKind::MissingBegin, 1, 1))?;
    if root.kind != ComponentKind::Calendar {
        tracing::warn!(name = %root.name, "Root component is not VCALENDAR");
        return Err(
            ParseError::new(ParseErrorKind::MissingBegin, 1, 1).with_context("expected VCALENDAR")
        );
    }

    tracing::debug!(
        components = root.children.len(),
        "iCalendar document parsed successfully"
    );

    Ok(ICalendar { root })
}

/// Value types the parser distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueType {
    Text,
    Integer,
    Boolean,
    Date,
    DateTime,
    DateOrDateTimeList,
    Period,
    Duration,
    Recur,
    UtcOffset,
    Raw,
}

impl ValueType {
    fn from_param(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "TEXT" => Self::Text,
            "INTEGER" => Self::Integer,
            "BOOLEAN" => Self::Boolean,
            "DATE" => Self::Date,
            "DATE-TIME" => Self::DateTime,
            "PERIOD" => Self::Period,
            "DURATION" => Self::Duration,
            "RECUR" => Self::Recur,
            "UTC-OFFSET" => Self::UtcOffset,
            _ => Self::Raw,
        }
    }
}

/// Parses a property from a content line, resolving the value type.
///
/// ## Errors
/// Returns an error if the value does not match its type.
pub fn parse_property(cl: ContentLine, line_num: usize) -> ParseResult<Property> {
    let value_type = determine_value_type(&cl);
    let value = parse_value(&cl, value_type, line_num)?;

    Ok(Property {
        name: cl.name,
        params: cl.params,
        value,
    })
}

/// Determines the value type for a property.
fn determine_value_type(cl: &ContentLine) -> ValueType {
    let list_property = matches!(cl.name.as_str(), "EXDATE" | "RDATE");

    if let Some(value_type) = cl.get_param_value(names::VALUE) {
        let value_type = ValueType::from_param(value_type);
        return match value_type {
            ValueType::Date | ValueType::DateTime if list_property || cl.raw_value.contains(',') => {
                ValueType::DateOrDateTimeList
            }
            other => other,
        };
    }

    match cl.name.as_str() {
        "DTSTART" | "DTEND" | "DTSTAMP" | "CREATED" | "LAST-MODIFIED" | "COMPLETED" | "DUE"
        | "RECURRENCE-ID" => {
            if looks_like_date(&cl.raw_value) {
                ValueType::Date
            } else {
                ValueType::DateTime
            }
        }
        "EXDATE" | "RDATE" => {
            if cl.raw_value.contains('/') {
                ValueType::Period
            } else {
                ValueType::DateOrDateTimeList
            }
        }
        "DURATION" => ValueType::Duration,
        "TRIGGER" => {
            if cl.raw_value.starts_with(['P', '+', '-']) {
                ValueType::Duration
            } else {
                ValueType::DateTime
            }
        }
        "PERCENT-COMPLETE" | "PRIORITY" | "REPEAT" | "SEQUENCE" => ValueType::Integer,
        "RRULE" | "EXRULE" => ValueType::Recur,
        "TZOFFSETFROM" | "TZOFFSETTO" => ValueType::UtcOffset,
        "FREEBUSY" => ValueType::Period,
        "SUMMARY" | "DESCRIPTION" | "LOCATION" | "COMMENT" | "UID" | "TZID" | "TZNAME"
        | "STATUS" | "CLASS" | "TRANSP" | "ACTION" | "PRODID" | "VERSION" | "CALSCALE"
        | "METHOD" | "CONTACT" | "RELATED-TO" => ValueType::Text,
        _ => ValueType::Raw,
    }
}

fn looks_like_date(raw: &str) -> bool {
    raw.len() == 8 && !raw.contains(['T', 't'])
}

fn parse_value(cl: &ContentLine, value_type: ValueType, line: usize) -> ParseResult<Value> {
    let raw = cl.raw_value.as_str();
    let tzid = cl.get_param_value(names::TZID);

    Ok(match value_type {
        ValueType::Text => Value::Text(unescape_text(raw)),
        ValueType::Integer => Value::Integer(parse_integer(raw, line)?),
        ValueType::Boolean => Value::Boolean(parse_boolean(raw, line)?),
        ValueType::Date => Value::Date(parse_date(raw, line)?),
        ValueType::DateTime => Value::DateTime(parse_datetime(raw, tzid, line)?),
        ValueType::DateOrDateTimeList => {
            let items: Vec<&str> = raw.split(',').filter(|s| !s.is_empty()).collect();
            if items.iter().all(|item| looks_like_date(item)) && !items.is_empty() {
                Value::DateList(
                    items
                        .into_iter()
                        .map(|item| parse_date(item, line))
                        .collect::<ParseResult<_>>()?,
                )
            } else {
                Value::DateTimeList(
                    items
                        .into_iter()
                        .map(|item| parse_datetime(item, tzid, line))
                        .collect::<ParseResult<_>>()?,
                )
            }
        }
        ValueType::Period => Value::PeriodList(
            raw.split(',')
                .filter(|s| !s.is_empty())
                .map(|item| parse_period(item, tzid, line))
                .collect::<ParseResult<_>>()?,
        ),
        ValueType::Duration => Value::Duration(parse_duration(raw, line)?),
        ValueType::Recur => Value::Recur(Box::new(parse_recur(raw, line)?)),
        ValueType::UtcOffset => Value::UtcOffset(parse_utc_offset(raw, line)?),
        ValueType::Raw => Value::Raw(raw.to_string()),
    })
}
