//! Standalone encoding of a single DATE/DATE-TIME property value.
//!
//! Stored values look like an iCalendar property line without its name:
//! `;VALUE=DATE-TIME;TZID=America/Los_Angeles:20240101T090000`. A value with
//! no parameters is written as the bare value text.

mod ical_date;
mod value_parser;

pub use ical_date::{ICalDate, ValueKind};
pub use value_parser::{ParsedValue, parse_value};
