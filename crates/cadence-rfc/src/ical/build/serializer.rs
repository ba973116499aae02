//! iCalendar serializer (RFC 5545).
//!
//! Components and properties are written in stored order so that a parsed
//! document serializes back to the same line sequence.

use super::escape::{escape_param_value, escape_text};
use super::fold::fold_line;
use crate::ical::core::{Component, ICalendar, Parameter, Property, Value};

/// Serializes an iCalendar document to a string.
#[must_use]
pub fn serialize(ical: &ICalendar) -> String {
    serialize_component(&ical.root)
}

#[must_use]
pub fn serialize_component(component: &Component) -> String {
    let mut result = fold_line(&format!("BEGIN:{}", component.name));
    for prop in &component.properties {
        result.push_str(&serialize_property(prop));
    }
    for child in &component.children {
        result.push_str(&serialize_component(child));
    }
    result.push_str(&fold_line(&format!("END:{}", component.name)));
    result
}

#[must_use]
pub fn serialize_property(prop: &Property) -> String {
    let mut line = prop.name.clone();
    for param in &prop.params {
        line.push(';');
        line.push_str(&serialize_parameter(param));
    }
    line.push(':');
    line.push_str(&serialize_value(&prop.value));
    fold_line(&line)
}

fn serialize_parameter(param: &Parameter) -> String {
    let values: Vec<String> = param.values.iter().map(|v| escape_param_value(v)).collect();
    format!("{}={}", param.name, values.join(","))
}

/// Renders a value as it appears after the colon of a content line.
#[must_use]
pub fn serialize_value(value: &Value) -> String {
    fn join<T: ToString>(items: &[T]) -> String {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    match value {
        Value::Text(text) => escape_text(text),
        Value::Integer(n) => n.to_string(),
        Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Date(date) => date.format("%Y%m%d").to_string(),
        Value::DateTime(dt) => dt.to_string(),
        Value::DateList(dates) => dates
            .iter()
            .map(|d| d.format("%Y%m%d").to_string())
            .collect::<Vec<_>>()
            .join(","),
        Value::DateTimeList(list) => join(list),
        Value::PeriodList(periods) => join(periods),
        Value::Duration(duration) => duration.to_string(),
        Value::Recur(recur) => recur.to_string(),
        Value::UtcOffset(offset) => offset.to_string(),
        Value::Raw(raw) => raw.clone(),
    }
}
