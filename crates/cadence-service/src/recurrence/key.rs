//! Canonical recurrence-id keys.

use std::fmt;

use cadence_rfc::ical::parse::{parse_date, parse_datetime};
use cadence_rfc::tz::{Moment, to_utc};
use chrono::{NaiveDateTime, NaiveTime};

use crate::error::{ServiceError, ServiceResult};

/// Identifies one occurrence of a series by its original start.
///
/// The text is fixed width per form: `YYYYMMDD` for dates,
/// `YYYYMMDDTHHMMSS` for floating times and `YYYYMMDDTHHMMSSZ` for
/// everything with a zone (converted to UTC). Keys order by instant first,
/// so a map mixing forms still iterates chronologically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecurrenceKey {
    at: NaiveDateTime,
    text: String,
}

impl RecurrenceKey {
    #[must_use]
    pub fn from_moment(moment: &Moment) -> Self {
        match moment {
            Moment::Date(date) => Self {
                at: date.and_time(NaiveTime::MIN),
                text: date.format("%Y%m%d").to_string(),
            },
            Moment::Floating(naive) => Self {
                at: *naive,
                text: naive.format("%Y%m%dT%H%M%S").to_string(),
            },
            Moment::Utc(_) | Moment::Zoned(_) => {
                let at = to_utc(moment, None).naive_utc();
                Self {
                    at,
                    text: at.format("%Y%m%dT%H%M%SZ").to_string(),
                }
            }
        }
    }

    /// ## Summary
    /// Reads a key back from its text.
    ///
    /// ## Errors
    /// Returns `ServiceError::ValidationError` when the text is not one of
    /// the three key forms.
    pub fn parse(text: &str) -> ServiceResult<Self> {
        let invalid = || ServiceError::ValidationError(format!("invalid recurrence id: {text}"));

        let moment = if text.len() == 8 {
            Moment::Date(parse_date(text, 0).map_err(|_| invalid())?)
        } else {
            let dt = parse_datetime(text, None, 0).map_err(|_| invalid())?;
            if dt.is_utc() {
                Moment::Utc(dt.local.and_utc())
            } else {
                Moment::Floating(dt.local)
            }
        };
        Ok(Self::from_moment(&moment))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Sort instant (UTC for zoned keys, wall clock otherwise).
    #[must_use]
    pub fn instant(&self) -> NaiveDateTime {
        self.at
    }

    #[must_use]
    pub fn is_date(&self) -> bool {
        self.text.len() == 8
    }
}

impl fmt::Display for RecurrenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&Moment> for RecurrenceKey {
    fn from(moment: &Moment) -> Self {
        Self::from_moment(moment)
    }
}
