//! iCalendar properties (RFC 5545 §3.8).

use chrono::NaiveDate;

use super::{DateTime, Duration, Parameter, Recur, Value};

/// Property names the calendaring core reads or writes.
pub mod names {
    pub const ACTION: &str = "ACTION";
    pub const CALSCALE: &str = "CALSCALE";
    pub const COMPLETED: &str = "COMPLETED";
    pub const DESCRIPTION: &str = "DESCRIPTION";
    pub const DTEND: &str = "DTEND";
    pub const DTSTAMP: &str = "DTSTAMP";
    pub const DTSTART: &str = "DTSTART";
    pub const DUE: &str = "DUE";
    pub const DURATION: &str = "DURATION";
    pub const EXDATE: &str = "EXDATE";
    pub const EXRULE: &str = "EXRULE";
    pub const LOCATION: &str = "LOCATION";
    pub const PRODID: &str = "PRODID";
    pub const RANGE: &str = "RANGE";
    pub const RDATE: &str = "RDATE";
    pub const RECURRENCE_ID: &str = "RECURRENCE-ID";
    pub const REPEAT: &str = "REPEAT";
    pub const RRULE: &str = "RRULE";
    pub const STATUS: &str = "STATUS";
    pub const SUMMARY: &str = "SUMMARY";
    pub const TRIGGER: &str = "TRIGGER";
    pub const TZID: &str = "TZID";
    pub const TZNAME: &str = "TZNAME";
    pub const TZOFFSETFROM: &str = "TZOFFSETFROM";
    pub const TZOFFSETTO: &str = "TZOFFSETTO";
    pub const UID: &str = "UID";
    pub const VALUE: &str = "VALUE";
    pub const VERSION: &str = "VERSION";
}

/// A fully parsed iCalendar property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Property {
    /// Property name (normalized to uppercase).
    pub name: String,
    /// Parameters in order of appearance.
    pub params: Vec<Parameter>,
    pub value: Value,
}

impl Property {
    /// ## Summary
    /// Creates a property, adding the VALUE and TZID parameters the value
    /// needs to be read back with the same type.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        let mut params = Vec::new();
        if let Some(value_type) = value.explicit_value_type() {
            params.push(Parameter::value_type(value_type));
        }
        let tzid = match &value {
            Value::DateTime(dt) => dt.tzid(),
            Value::DateTimeList(list) => list.first().and_then(DateTime::tzid),
            _ => None,
        };
        if let Some(tzid) = tzid {
            params.push(Parameter::tzid(tzid));
        }

        Self {
            name: name.into().to_ascii_uppercase(),
            params,
            value,
        }
    }

    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Value::Text(value.into()))
    }

    /// A property whose value is written exactly as given.
    #[must_use]
    pub fn raw(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Value::Raw(value.into()))
    }

    #[must_use]
    pub fn integer(name: impl Into<String>, value: i32) -> Self {
        Self::new(name, Value::Integer(value))
    }

    #[must_use]
    pub fn date(name: impl Into<String>, date: NaiveDate) -> Self {
        Self::new(name, Value::Date(date))
    }

    #[must_use]
    pub fn datetime(name: impl Into<String>, dt: DateTime) -> Self {
        Self::new(name, Value::DateTime(dt))
    }

    #[must_use]
    pub fn duration(name: impl Into<String>, duration: Duration) -> Self {
        Self::new(name, Value::Duration(duration))
    }

    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn get_param_value(&self, name: &str) -> Option<&str> {
        self.get_param(name)?.value()
    }

    #[must_use]
    pub fn has_param(&self, name: &str) -> bool {
        self.get_param(name).is_some()
    }

    /// Replaces any parameter with the same name.
    pub fn set_param(&mut self, param: Parameter) {
        self.remove_param(&param.name);
        self.params.push(param);
    }

    pub fn remove_param(&mut self, name: &str) {
        self.params.retain(|p| !p.name.eq_ignore_ascii_case(name));
    }

    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        self.get_param_value(names::TZID)
    }

    /// Text of a TEXT or uninterpreted value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Value::Text(text) | Value::Raw(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_datetime(&self) -> Option<&DateTime> {
        match &self.value {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match &self.value {
            Value::Date(date) => Some(*date),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_duration(&self) -> Option<&Duration> {
        match &self.value {
            Value::Duration(duration) => Some(duration),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_recur(&self) -> Option<&Recur> {
        match &self.value {
            Value::Recur(recur) => Some(recur),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i32> {
        match &self.value {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns whether the value is DATE or DATE-TIME typed (single or list).
    #[must_use]
    pub fn has_date_value(&self) -> bool {
        matches!(
            self.value,
            Value::Date(_)
                | Value::DateTime(_)
                | Value::DateList(_)
                | Value::DateTimeList(_)
                | Value::PeriodList(_)
        )
    }
}
