//! Property value types (RFC 5545 §3.3).

use std::fmt;

use chrono::NaiveDate;

use super::{DateTime, Duration, Recur, UtcOffset};

/// A PERIOD value (RFC 5545 §3.3.9).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Period {
    Explicit { start: DateTime, end: DateTime },
    Duration { start: DateTime, duration: Duration },
}

impl Period {
    #[must_use]
    pub fn start(&self) -> &DateTime {
        match self {
            Self::Explicit { start, .. } | Self::Duration { start, .. } => start,
        }
    }

    /// End of the period, in the same form as its start. `None` when the
    /// duration runs past the representable range.
    #[must_use]
    pub fn end(&self) -> Option<DateTime> {
        match self {
            Self::Explicit { end, .. } => Some(end.clone()),
            Self::Duration { start, duration } => start
                .local
                .checked_add_signed(duration.to_time_delta())
                .map(|local| DateTime {
                    local,
                    form: start.form.clone(),
                }),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit { start, end } => write!(f, "{start}/{end}"),
            Self::Duration { start, duration } => write!(f, "{start}/{duration}"),
        }
    }
}

/// A typed property value.
///
/// Only the value types the calendaring core reasons about are typed;
/// everything else is kept verbatim in [`Value::Raw`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Unescaped TEXT.
    Text(String),
    Integer(i32),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime),
    DateList(Vec<NaiveDate>),
    DateTimeList(Vec<DateTime>),
    PeriodList(Vec<Period>),
    Duration(Duration),
    Recur(Box<Recur>),
    UtcOffset(UtcOffset),
    /// Uninterpreted value text, serialized back exactly as read.
    Raw(String),
}

impl Value {
    /// The VALUE parameter a property needs when this is not its default type.
    #[must_use]
    pub const fn explicit_value_type(&self) -> Option<&'static str> {
        match self {
            Self::Date(_) | Self::DateList(_) => Some("DATE"),
            Self::PeriodList(_) => Some("PERIOD"),
            _ => None,
        }
    }
}
