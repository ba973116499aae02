use std::fmt;

use cadence_core::constants::PARAM_ANYTIME;
use chrono_tz::Tz;

use super::value_parser::parse_value;
use crate::error::{RfcError, RfcResult};
use crate::ical::core::names;
use crate::ical::parse::{parse_date, parse_datetime};
use crate::tz::{Moment, TimeZoneTranslator, localize};

/// The VALUE parameter of an encoded date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueKind {
    Date,
    #[default]
    DateTime,
}

impl ValueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Date => "DATE",
            Self::DateTime => "DATE-TIME",
        }
    }
}

/// A DATE or DATE-TIME value (or list of them) together with its
/// timezone and any-time flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ICalDate {
    kind: ValueKind,
    tz: Option<Tz>,
    any_time: bool,
    text: String,
    moments: Vec<Moment>,
}

impl ICalDate {
    /// ## Summary
    /// Decodes `[;PARAM=value...]:text`.
    ///
    /// Recognizes VALUE, TZID and the any-time flag; other parameters are
    /// logged and skipped. A missing VALUE means DATE-TIME.
    ///
    /// ## Errors
    /// - `RfcError::MalformedValue` for bad syntax, an unknown VALUE, or a
    ///   DATE carrying a timezone.
    /// - `RfcError::UnknownTimeZone` when the TZID does not resolve or is
    ///   not spelled canonically (the error then names the canonical id).
    /// - `RfcError::ParseError` when a date does not parse.
    #[tracing::instrument(skip(translator))]
    pub fn parse(text: &str, translator: &TimeZoneTranslator<'_>) -> RfcResult<Self> {
        let parsed = parse_value(text)?;

        let mut kind = ValueKind::default();
        let mut tz = None;
        let mut any_time = false;
        for (name, value) in &parsed.params {
            if name.eq_ignore_ascii_case(names::VALUE) {
                kind = match value.as_str() {
                    "DATE" => ValueKind::Date,
                    "DATE-TIME" => ValueKind::DateTime,
                    other => {
                        return Err(RfcError::MalformedValue(format!("Bad value {other}")));
                    }
                };
            } else if name.eq_ignore_ascii_case(names::TZID) {
                tz = Some(translator.resolve_exact(value)?);
            } else if name.eq_ignore_ascii_case(PARAM_ANYTIME) {
                any_time = value.eq_ignore_ascii_case("true");
            } else {
                tracing::warn!(parameter = %name, "Skipping unknown parameter");
            }
        }

        if kind == ValueKind::Date && tz.is_some() {
            return Err(RfcError::MalformedValue(
                "DATE cannot have timezone".to_string(),
            ));
        }

        let moments = parsed
            .value
            .split(',')
            .map(|part| decode(part, kind, tz))
            .collect::<RfcResult<Vec<_>>>()?;

        Ok(Self {
            kind,
            tz,
            any_time,
            text: parsed.value,
            moments,
        })
    }

    /// ## Summary
    /// Encodes a single moment.
    ///
    /// Zones the translator does not know are dropped, leaving the value
    /// floating at the same wall-clock time.
    #[must_use]
    pub fn from_moment(moment: &Moment, any_time: bool, translator: &TimeZoneTranslator<'_>) -> Self {
        let (kind, tz, moment) = match moment {
            Moment::Date(_) => (ValueKind::Date, None, *moment),
            Moment::Floating(_) | Moment::Utc(_) => (ValueKind::DateTime, None, *moment),
            Moment::Zoned(dt) => match translator.translate_zone(dt.timezone()) {
                Some(zone) => (
                    ValueKind::DateTime,
                    Some(zone),
                    Moment::Zoned(dt.with_timezone(&zone)),
                ),
                None => {
                    tracing::debug!(zone = dt.timezone().name(), "Untranslatable zone, writing floating time");
                    (ValueKind::DateTime, None, Moment::Floating(dt.naive_local()))
                }
            },
        };

        Self {
            kind,
            tz,
            any_time,
            text: value_text(&moment),
            moments: vec![moment],
        }
    }

    /// ## Summary
    /// Encodes a list of moments. Lists are never any-time.
    ///
    /// ## Errors
    /// - `RfcError::MalformedValue` for an empty list.
    /// - `RfcError::UnknownTimeZone` when the list's zone is untranslatable.
    pub fn from_moments(moments: &[Moment], translator: &TimeZoneTranslator<'_>) -> RfcResult<Self> {
        let Some(first) = moments.first() else {
            return Err(RfcError::MalformedValue("empty date list".to_string()));
        };

        let kind = if first.is_date() {
            ValueKind::Date
        } else {
            ValueKind::DateTime
        };
        let tz = match moments.iter().find_map(Moment::zone) {
            Some(zone) => Some(
                translator
                    .translate_zone(zone)
                    .ok_or_else(|| RfcError::unknown_time_zone(zone.name()))?,
            ),
            None => None,
        };

        let moments: Vec<Moment> = moments
            .iter()
            .map(|moment| match (moment, tz) {
                (Moment::Zoned(dt), Some(zone)) => Moment::Zoned(dt.with_timezone(&zone)),
                _ => *moment,
            })
            .collect();
        let text = moments.iter().map(value_text).collect::<Vec<_>>().join(",");

        Ok(Self {
            kind,
            tz,
            any_time: false,
            text,
            moments,
        })
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    #[must_use]
    pub fn is_date(&self) -> bool {
        self.kind == ValueKind::Date
    }

    #[must_use]
    pub fn is_date_time(&self) -> bool {
        self.kind == ValueKind::DateTime
    }

    #[must_use]
    pub fn is_any_time(&self) -> bool {
        self.any_time
    }

    #[must_use]
    pub fn timezone(&self) -> Option<Tz> {
        self.tz
    }

    #[must_use]
    pub fn tzid(&self) -> Option<&'static str> {
        self.tz.map(|tz| tz.name())
    }

    /// Value text without parameters.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn moments(&self) -> &[Moment] {
        &self.moments
    }

    /// The value when it is not a list.
    #[must_use]
    pub fn moment(&self) -> Option<&Moment> {
        match self.moments.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }
}

impl fmt::Display for ICalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ";{}={}", names::VALUE, self.kind.as_str())?;
        if let Some(tzid) = self.tzid() {
            write!(f, ";{}={tzid}", names::TZID)?;
        }
        if self.any_time {
            write!(f, ";{PARAM_ANYTIME}=TRUE")?;
        }
        write!(f, ":{}", self.text)
    }
}

fn decode(part: &str, kind: ValueKind, tz: Option<Tz>) -> RfcResult<Moment> {
    match kind {
        ValueKind::Date => Ok(Moment::Date(parse_date(part, 0)?)),
        ValueKind::DateTime => {
            let dt = parse_datetime(part, None, 0)?;
            Ok(match (dt.is_utc(), tz) {
                (true, _) => Moment::Utc(dt.local.and_utc()),
                (false, Some(zone)) => Moment::Zoned(localize(zone, dt.local)),
                (false, None) => Moment::Floating(dt.local),
            })
        }
    }
}

/// Value text as it appears after the colon; zoned values show local time.
fn value_text(moment: &Moment) -> String {
    match moment {
        Moment::Zoned(dt) => dt.naive_local().format("%Y%m%dT%H%M%S").to_string(),
        _ => moment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use chrono_tz::America::Los_Angeles;

    fn naive(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .expect("valid test date")
    }

    #[test_log::test]
    fn decodes_zoned_date_time() {
        let translator = TimeZoneTranslator::default();
        let value = ICalDate::parse(
            ";VALUE=DATE-TIME;TZID=America/Los_Angeles:20021010T120000",
            &translator,
        )
        .expect("parses");
        assert!(value.is_date_time());
        assert_eq!(value.timezone(), Some(Los_Angeles));
        assert_eq!(
            value.moment(),
            Some(&Moment::Zoned(localize(Los_Angeles, naive(2002, 10, 10, 12))))
        );
        assert_eq!(
            value.to_string(),
            ";VALUE=DATE-TIME;TZID=America/Los_Angeles:20021010T120000"
        );
    }

    #[test_log::test]
    fn bare_text_defaults_to_date_time() {
        let translator = TimeZoneTranslator::default();
        let value = ICalDate::parse("20021010T120000Z", &translator).expect("parses");
        assert!(value.is_date_time());
        assert_eq!(
            value.moment(),
            Some(&Moment::Utc(naive(2002, 10, 10, 12).and_utc()))
        );
        assert_eq!(value.to_string(), ";VALUE=DATE-TIME:20021010T120000Z");
    }

    #[test_log::test]
    fn any_time_and_unknown_params() {
        let translator = TimeZoneTranslator::default();
        let value = ICalDate::parse(";VALUE=DATE;X-OSAF-ANYTIME=true;X-FOO=bar:20021010", &translator)
            .expect("parses");
        assert!(value.is_date());
        assert!(value.is_any_time());
        assert_eq!(value.to_string(), ";VALUE=DATE;X-OSAF-ANYTIME=TRUE:20021010");
    }

    #[test_log::test]
    fn rejects_bad_values() {
        let translator = TimeZoneTranslator::default();
        let err = ICalDate::parse(";VALUE=DATE;TZID=America/Los_Angeles:20021010", &translator)
            .expect_err("date with zone");
        assert_eq!(err.to_string(), "Malformed value: DATE cannot have timezone");

        let err = ICalDate::parse(";TZID=Pacific Standard Time:20021010T120000", &translator)
            .expect_err("non-canonical zone");
        assert!(matches!(
            err,
            RfcError::UnknownTimeZone { hint: Some(ref hint), .. } if hint == "America/Los_Angeles"
        ));

        assert!(matches!(
            ICalDate::parse(";VALUE=PERIOD:20021010", &translator),
            Err(RfcError::MalformedValue(_))
        ));
        assert!(matches!(
            ICalDate::parse(";VALUE=DATE:2002101", &translator),
            Err(RfcError::ParseError(_))
        ));
    }

    #[test_log::test]
    fn encodes_lists_and_moments() {
        let translator = TimeZoneTranslator::default();
        let list = ICalDate::parse(
            ";VALUE=DATE-TIME;TZID=America/Los_Angeles:20240101T090000,20240102T090000",
            &translator,
        )
        .expect("parses");
        assert_eq!(list.moments().len(), 2);
        assert_eq!(list.moment(), None);

        let encoded = ICalDate::from_moments(list.moments(), &translator).expect("encodes");
        assert_eq!(encoded.to_string(), list.to_string());

        let day = ICalDate::from_moment(
            &Moment::Date(NaiveDate::from_ymd_opt(2024, 1, 1).expect("date")),
            true,
            &translator,
        );
        assert_eq!(day.to_string(), ";VALUE=DATE;X-OSAF-ANYTIME=TRUE:20240101");

        assert!(ICalDate::from_moments(&[], &translator).is_err());
    }
}
