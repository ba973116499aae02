//! Points in time as iCalendar expresses them, and the rules for comparing
//! them when some are floating.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use super::translator::TimeZoneTranslator;
use crate::error::{RfcError, RfcResult};
use crate::ical::core::{DateTime as ICalDateTime, DateTimeForm, Duration, Property, Value};

/// A DATE or DATE-TIME value with its zone resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Moment {
    /// All-day value.
    Date(NaiveDate),
    /// Wall-clock time not tied to any zone.
    Floating(NaiveDateTime),
    Utc(DateTime<Utc>),
    Zoned(DateTime<Tz>),
}

/// An amount of time to add to a [`Moment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Span {
    /// Calendar days. Wall-clock time is kept across DST changes.
    Days(i64),
    /// Elapsed time.
    Exact(TimeDelta),
}

impl Span {
    #[must_use]
    pub fn zero() -> Self {
        Self::Exact(TimeDelta::zero())
    }

    /// Nominal durations (weeks and days only) become calendar days.
    #[must_use]
    pub fn from_duration(duration: &Duration) -> Self {
        if duration.is_nominal() {
            Self::Days(duration.nominal_days())
        } else {
            Self::Exact(duration.to_time_delta())
        }
    }

    /// ## Summary
    /// The span taking `start` to `end`.
    ///
    /// Two dates give whole days; anything else gives the elapsed time,
    /// interpreting floating values in `zone`.
    #[must_use]
    pub fn between(start: &Moment, end: &Moment, zone: Option<Tz>) -> Self {
        match (start, end) {
            (Moment::Date(s), Moment::Date(e)) => Self::Days((*e - *s).num_days()),
            _ => Self::Exact(to_utc(end, zone) - to_utc(start, zone)),
        }
    }

    #[must_use]
    pub fn to_duration(&self) -> Duration {
        match self {
            Self::Days(days) => {
                let mut duration = Duration::days(u32::try_from(days.unsigned_abs()).unwrap_or(u32::MAX));
                if *days % 7 == 0 && *days != 0 {
                    duration.days = 0;
                    duration.weeks = u32::try_from(days.unsigned_abs() / 7).unwrap_or(u32::MAX);
                }
                duration.negative = *days < 0;
                duration
            }
            Self::Exact(delta) => Duration::from_time_delta(*delta),
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Days(days) => *days == 0,
            Self::Exact(delta) => delta.is_zero(),
        }
    }

    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Days(days) => Self::Days(-days),
            Self::Exact(delta) => Self::Exact(-delta),
        }
    }
}

/// All-day values never carry a zone.
fn reject_zoned_date(property: &Property) -> RfcResult<()> {
    match property.tzid() {
        Some(tzid) => Err(RfcError::MalformedValue(format!(
            "{} is a DATE but has TZID {tzid}",
            property.name
        ))),
        None => Ok(()),
    }
}

/// ## Summary
/// Attaches `zone` to a wall-clock time.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times that do
/// not exist (DST spring-forward gap) are moved forward by an hour.
#[must_use]
pub fn localize(zone: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => {
            let shifted = naive.checked_add_signed(TimeDelta::hours(1)).unwrap_or(naive);
            match zone.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
                LocalResult::None => zone.from_utc_datetime(&naive),
            }
        }
    }
}

/// Pins floating and all-day values to `zone`. Other values are returned
/// unchanged.
#[must_use]
pub fn pin(moment: &Moment, zone: Tz) -> Moment {
    match moment {
        Moment::Date(date) => Moment::Zoned(localize(zone, date.and_time(NaiveTime::MIN))),
        Moment::Floating(naive) => Moment::Zoned(localize(zone, *naive)),
        Moment::Utc(_) | Moment::Zoned(_) => *moment,
    }
}

/// ## Summary
/// The UTC instant of `moment`.
///
/// Floating and all-day values are pinned to `zone`, or read as UTC wall
/// clock when no zone is given.
#[must_use]
pub fn to_utc(moment: &Moment, zone: Option<Tz>) -> DateTime<Utc> {
    match (moment, zone) {
        (Moment::Utc(dt), _) => *dt,
        (Moment::Zoned(dt), _) => dt.with_timezone(&Utc),
        (Moment::Floating(_) | Moment::Date(_), Some(zone)) => to_utc(&pin(moment, zone), None),
        (Moment::Floating(naive), None) => naive.and_utc(),
        (Moment::Date(date), None) => date.and_time(NaiveTime::MIN).and_utc(),
    }
}

/// The day `instant` falls on in `zone` (or in UTC when there is none).
#[must_use]
pub fn normalize_utc_to_local_date(instant: DateTime<Utc>, zone: Option<Tz>) -> Moment {
    match zone {
        Some(zone) => Moment::Date(instant.with_timezone(&zone).date_naive()),
        None => Moment::Date(instant.date_naive()),
    }
}

/// ## Summary
/// The floating wall-clock time `instant` shows in `zone`.
///
/// Without a zone the instant is returned as is.
#[must_use]
pub fn normalize_utc_to_local_wallclock(instant: DateTime<Utc>, zone: Option<Tz>) -> Moment {
    match zone {
        Some(zone) => Moment::Floating(instant.with_timezone(&zone).naive_local()),
        None => Moment::Utc(instant),
    }
}

/// Orders two moments by instant, interpreting floating values in `zone`.
#[must_use]
pub fn compare(a: &Moment, b: &Moment, zone: Option<Tz>) -> Ordering {
    to_utc(a, zone).cmp(&to_utc(b, zone))
}

#[must_use]
pub fn before(a: &Moment, b: &Moment, zone: Option<Tz>) -> bool {
    compare(a, b, zone) == Ordering::Less
}

#[must_use]
pub fn after(a: &Moment, b: &Moment, zone: Option<Tz>) -> bool {
    compare(a, b, zone) == Ordering::Greater
}

#[must_use]
pub fn equal(a: &Moment, b: &Moment, zone: Option<Tz>) -> bool {
    compare(a, b, zone) == Ordering::Equal
}

impl Moment {
    #[must_use]
    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    #[must_use]
    pub fn is_floating(&self) -> bool {
        matches!(self, Self::Floating(_))
    }

    #[must_use]
    pub fn is_utc(&self) -> bool {
        matches!(self, Self::Utc(_))
    }

    #[must_use]
    pub fn zone(&self) -> Option<Tz> {
        match self {
            Self::Zoned(dt) => Some(dt.timezone()),
            _ => None,
        }
    }

    /// Wall-clock fields as written; dates read as midnight.
    #[must_use]
    pub fn naive_local(&self) -> NaiveDateTime {
        match self {
            Self::Date(date) => date.and_time(NaiveTime::MIN),
            Self::Floating(naive) => *naive,
            Self::Utc(dt) => dt.naive_utc(),
            Self::Zoned(dt) => dt.naive_local(),
        }
    }

    #[must_use]
    pub fn date_naive(&self) -> NaiveDate {
        self.naive_local().date()
    }

    /// ## Summary
    /// Adds `span`, keeping the form of `self`.
    ///
    /// Calendar days added to a zoned value keep the wall-clock time and
    /// are re-localized, so a daily step across DST stays at the same hour.
    ///
    /// ## Errors
    /// `RfcError::InvalidDateTime` when the result is outside the supported
    /// date range.
    pub fn add(&self, span: Span) -> RfcResult<Self> {
        let sum = match span {
            Span::Days(days) => TimeDelta::try_days(days).and_then(|delta| self.add_days(delta)),
            Span::Exact(delta) => self.add_exact(delta),
        };
        sum.ok_or_else(|| RfcError::InvalidDateTime(format!("{self} plus {span:?} is out of range")))
    }

    fn add_days(&self, delta: TimeDelta) -> Option<Self> {
        match self {
            Self::Date(date) => date.checked_add_signed(delta).map(Self::Date),
            Self::Floating(naive) => naive.checked_add_signed(delta).map(Self::Floating),
            Self::Utc(dt) => dt.checked_add_signed(delta).map(Self::Utc),
            Self::Zoned(dt) => dt
                .naive_local()
                .checked_add_signed(delta)
                .map(|naive| Self::Zoned(localize(dt.timezone(), naive))),
        }
    }

    fn add_exact(&self, delta: TimeDelta) -> Option<Self> {
        match self {
            Self::Date(date) => TimeDelta::try_days(delta.num_days())
                .and_then(|days| date.checked_add_signed(days))
                .map(Self::Date),
            Self::Floating(naive) => naive.checked_add_signed(delta).map(Self::Floating),
            Self::Utc(dt) => dt.checked_add_signed(delta).map(Self::Utc),
            Self::Zoned(dt) => dt.checked_add_signed(delta).map(Self::Zoned),
        }
    }

    /// ## Summary
    /// Resolves a DATE or DATE-TIME property into a moment. List values
    /// yield their first entry.
    ///
    /// ## Errors
    /// Returns `RfcError::UnknownTimeZone` when the TZID cannot be resolved
    /// and `RfcError::MalformedValue` when the property has no date value.
    pub fn from_property(property: &Property, translator: &TimeZoneTranslator<'_>) -> RfcResult<Self> {
        match &property.value {
            Value::Date(date) => {
                reject_zoned_date(property)?;
                Ok(Self::Date(*date))
            }
            Value::DateList(dates) => {
                reject_zoned_date(property)?;
                dates.first().map(|date| Self::Date(*date)).ok_or_else(|| {
                    RfcError::MalformedValue(format!("{} has an empty date list", property.name))
                })
            }
            Value::DateTime(dt) => Self::from_ical(dt, translator),
            Value::DateTimeList(list) => match list.first() {
                Some(dt) => Self::from_ical(dt, translator),
                None => Err(RfcError::MalformedValue(format!(
                    "{} has an empty date-time list",
                    property.name
                ))),
            },
            Value::PeriodList(periods) => match periods.first() {
                Some(period) => Self::from_ical(period.start(), translator),
                None => Err(RfcError::MalformedValue(format!(
                    "{} has an empty period list",
                    property.name
                ))),
            },
            _ => Err(RfcError::MalformedValue(format!(
                "{} is not a DATE or DATE-TIME",
                property.name
            ))),
        }
    }

    /// ## Summary
    /// Every DATE or DATE-TIME in a (possibly list-valued) property, such
    /// as RDATE or EXDATE. PERIOD values yield their starts.
    ///
    /// ## Errors
    /// Returns `RfcError::UnknownTimeZone` when a TZID cannot be resolved
    /// and `RfcError::MalformedValue` when the property has no date value.
    pub fn all_from_property(
        property: &Property,
        translator: &TimeZoneTranslator<'_>,
    ) -> RfcResult<Vec<Self>> {
        match &property.value {
            Value::Date(date) => {
                reject_zoned_date(property)?;
                Ok(vec![Self::Date(*date)])
            }
            Value::DateList(dates) => {
                reject_zoned_date(property)?;
                Ok(dates.iter().map(|date| Self::Date(*date)).collect())
            }
            Value::DateTime(dt) => Ok(vec![Self::from_ical(dt, translator)?]),
            Value::DateTimeList(list) => list
                .iter()
                .map(|dt| Self::from_ical(dt, translator))
                .collect(),
            Value::PeriodList(periods) => periods
                .iter()
                .map(|period| Self::from_ical(period.start(), translator))
                .collect(),
            _ => Err(RfcError::MalformedValue(format!(
                "{} is not a DATE or DATE-TIME",
                property.name
            ))),
        }
    }

    /// ## Summary
    /// Resolves the start and end of every PERIOD in an RDATE.
    ///
    /// ## Errors
    /// Returns `RfcError::UnknownTimeZone` when a TZID cannot be resolved
    /// and `RfcError::InvalidDateTime` when a period ends out of range.
    pub fn periods_from_property(
        property: &Property,
        translator: &TimeZoneTranslator<'_>,
    ) -> RfcResult<Vec<(Self, Self)>> {
        let Value::PeriodList(periods) = &property.value else {
            return Ok(Vec::new());
        };
        periods
            .iter()
            .map(|period| {
                let end = period.end().ok_or_else(|| {
                    RfcError::InvalidDateTime(format!("period {period} ends out of range"))
                })?;
                Ok((
                    Self::from_ical(period.start(), translator)?,
                    Self::from_ical(&end, translator)?,
                ))
            })
            .collect()
    }

    /// ## Summary
    /// Resolves a parsed DATE-TIME.
    ///
    /// ## Errors
    /// Returns `RfcError::UnknownTimeZone` when the TZID cannot be resolved.
    pub fn from_ical(dt: &ICalDateTime, translator: &TimeZoneTranslator<'_>) -> RfcResult<Self> {
        match &dt.form {
            DateTimeForm::Floating => Ok(Self::Floating(dt.local)),
            DateTimeForm::Utc => Ok(Self::Utc(dt.local.and_utc())),
            DateTimeForm::Zoned { tzid } => {
                let zone = translator.resolve(tzid)?;
                Ok(Self::Zoned(localize(zone, dt.local)))
            }
        }
    }

    /// The iCalendar value for this moment. Zoned values carry the zone's
    /// canonical identifier as TZID.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Date(date) => Value::Date(*date),
            _ => Value::DateTime(self.to_ical_datetime()),
        }
    }

    /// As a DATE-TIME; dates become floating midnight.
    #[must_use]
    pub fn to_ical_datetime(&self) -> ICalDateTime {
        match self {
            Self::Date(date) => ICalDateTime::floating(date.and_time(NaiveTime::MIN)),
            Self::Floating(naive) => ICalDateTime::floating(*naive),
            Self::Utc(dt) => ICalDateTime::utc(dt.naive_utc()),
            Self::Zoned(dt) => ICalDateTime::zoned(dt.naive_local(), dt.timezone().name()),
        }
    }

    #[must_use]
    pub fn to_property(&self, name: &str) -> Property {
        Property::new(name, self.to_value())
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y%m%d")),
            Self::Floating(naive) => write!(f, "{}", naive.format("%Y%m%dT%H%M%S")),
            Self::Utc(dt) => write!(f, "{}", dt.format("%Y%m%dT%H%M%SZ")),
            Self::Zoned(dt) => write!(
                f,
                "{}[{}]",
                dt.format("%Y%m%dT%H%M%S"),
                dt.timezone().name()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::{Los_Angeles, New_York};

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .expect("valid test date")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test_log::test]
    fn localize_handles_gaps_and_overlaps() {
        // 2024-03-10 02:30 does not exist in Los Angeles.
        let gap = localize(Los_Angeles, naive(2024, 3, 10, 2, 30));
        assert_eq!(gap.naive_local(), naive(2024, 3, 10, 3, 30));

        // 2024-11-03 01:30 happens twice; the PDT one comes first.
        let overlap = localize(Los_Angeles, naive(2024, 11, 3, 1, 30));
        assert_eq!(overlap.naive_utc(), naive(2024, 11, 3, 8, 30));
    }

    #[test_log::test]
    fn pin_only_touches_floating_values() {
        let floating = Moment::Floating(naive(2024, 1, 1, 9, 0));
        let pinned = pin(&floating, New_York);
        assert_eq!(pinned.zone(), Some(New_York));
        assert_eq!(pinned.naive_local(), naive(2024, 1, 1, 9, 0));

        let day = pin(&Moment::Date(date(2024, 1, 1)), New_York);
        assert_eq!(to_utc(&day, None), naive(2024, 1, 1, 5, 0).and_utc());

        let utc = Moment::Utc(naive(2024, 1, 1, 9, 0).and_utc());
        assert_eq!(pin(&utc, New_York), utc);
    }

    #[test_log::test]
    fn floating_compares_in_supplied_zone() {
        let floating = Moment::Floating(naive(2024, 1, 1, 9, 0));
        let utc = Moment::Utc(naive(2024, 1, 1, 12, 0).and_utc());

        assert!(before(&floating, &utc, None));
        assert!(after(&floating, &utc, Some(New_York)));
        assert!(equal(
            &Moment::Floating(naive(2024, 1, 1, 7, 0)),
            &utc,
            Some(New_York)
        ));
    }

    #[test_log::test]
    fn normalization_uses_local_calendar() {
        let instant = naive(2024, 1, 2, 3, 0).and_utc();
        assert_eq!(
            normalize_utc_to_local_date(instant, Some(Los_Angeles)),
            Moment::Date(date(2024, 1, 1))
        );
        assert_eq!(
            normalize_utc_to_local_date(instant, None),
            Moment::Date(date(2024, 1, 2))
        );
        assert_eq!(
            normalize_utc_to_local_wallclock(instant, Some(Los_Angeles)),
            Moment::Floating(naive(2024, 1, 1, 19, 0))
        );
        assert_eq!(
            normalize_utc_to_local_wallclock(instant, None),
            Moment::Utc(instant)
        );
    }

    #[test_log::test]
    fn day_steps_keep_wall_clock_across_dst() {
        let start = Moment::Zoned(localize(Los_Angeles, naive(2024, 3, 9, 9, 0)));
        let next = start.add(Span::Days(1)).expect("in range");
        assert_eq!(next.naive_local(), naive(2024, 3, 10, 9, 0));
        assert_eq!(
            Span::between(&start, &next, None),
            Span::Exact(TimeDelta::hours(23))
        );

        let exact = start
            .add(Span::Exact(TimeDelta::hours(24)))
            .expect("in range");
        assert_eq!(exact.naive_local(), naive(2024, 3, 10, 10, 0));
    }

    #[test_log::test]
    fn out_of_range_additions_are_errors() {
        let huge = Span::from_duration(&Duration::days(u32::MAX));
        assert!(matches!(
            Moment::Date(date(2024, 1, 1)).add(huge),
            Err(RfcError::InvalidDateTime(_))
        ));
        let huge_exact = Span::Exact(TimeDelta::weeks(4_000_000_000));
        assert!(Moment::Utc(naive(2024, 1, 1, 0, 0).and_utc()).add(huge_exact).is_err());
        assert!(Moment::Floating(naive(2024, 1, 1, 0, 0)).add(huge_exact).is_err());
        assert!(
            Moment::Zoned(localize(New_York, naive(2024, 1, 1, 0, 0)))
                .add(huge)
                .is_err()
        );
    }

    #[test_log::test]
    fn span_duration_conversion() {
        assert_eq!(Span::from_duration(&Duration::days(2)), Span::Days(2));
        assert_eq!(Span::Days(14).to_duration().to_string(), "P2W");
        assert_eq!(Span::Days(-1).to_duration().to_string(), "-P1D");
        assert_eq!(
            Span::Exact(TimeDelta::minutes(90)).to_duration().to_string(),
            "PT1H30M"
        );
        assert_eq!(
            Span::between(
                &Moment::Date(date(2024, 1, 1)),
                &Moment::Date(date(2024, 1, 3)),
                None
            ),
            Span::Days(2)
        );
    }

    #[test_log::test]
    fn property_round_trip() {
        let translator = TimeZoneTranslator::default();
        let property = Property::datetime(
            "DTSTART",
            ICalDateTime::zoned(naive(2024, 6, 1, 10, 0), "Pacific Standard Time"),
        );
        let moment = Moment::from_property(&property, &translator).expect("resolves");
        assert_eq!(moment.zone(), Some(Los_Angeles));

        let written = moment.to_property("DTSTART");
        assert_eq!(written.tzid(), Some("America/Los_Angeles"));
        assert_eq!(
            written.as_datetime().map(|dt| dt.local),
            Some(naive(2024, 6, 1, 10, 0))
        );

        let unknown = Property::datetime(
            "DTSTART",
            ICalDateTime::zoned(naive(2024, 6, 1, 10, 0), "Nowhere/Special"),
        );
        assert!(matches!(
            Moment::from_property(&unknown, &translator),
            Err(RfcError::UnknownTimeZone { .. })
        ));
        assert!(Moment::from_property(&Property::text("SUMMARY", "x"), &translator).is_err());
    }

    #[test_log::test]
    fn all_day_values_reject_a_zone() {
        let translator = TimeZoneTranslator::default();
        let mut start = Property::date("DTSTART", date(2024, 1, 1));
        assert_eq!(
            Moment::from_property(&start, &translator).expect("plain date"),
            Moment::Date(date(2024, 1, 1))
        );

        start.set_param(crate::ical::core::Parameter::tzid("America/New_York"));
        assert!(matches!(
            Moment::from_property(&start, &translator),
            Err(RfcError::MalformedValue(_))
        ));

        let mut exdate = Property::new("EXDATE", Value::DateList(vec![date(2024, 1, 2)]));
        exdate.set_param(crate::ical::core::Parameter::tzid("America/New_York"));
        assert!(Moment::all_from_property(&exdate, &translator).is_err());
    }

    #[test_log::test]
    fn list_values() {
        let translator = TimeZoneTranslator::default();
        let exdate = Property::new(
            "EXDATE",
            Value::DateTimeList(vec![
                ICalDateTime::zoned(naive(2024, 1, 2, 9, 0), "America/Los_Angeles"),
                ICalDateTime::zoned(naive(2024, 1, 3, 9, 0), "America/Los_Angeles"),
            ]),
        );
        let moments = Moment::all_from_property(&exdate, &translator).expect("resolves");
        assert_eq!(moments.len(), 2);
        assert_eq!(
            to_utc(&moments[1], None),
            naive(2024, 1, 3, 17, 0).and_utc()
        );

        let rdate = Property::new(
            "RDATE",
            Value::PeriodList(vec![crate::ical::core::Period::Duration {
                start: ICalDateTime::utc(naive(2024, 1, 5, 9, 0)),
                duration: Duration::days(1),
            }]),
        );
        let periods = Moment::periods_from_property(&rdate, &translator).expect("resolves");
        assert_eq!(
            periods,
            vec![(
                Moment::Utc(naive(2024, 1, 5, 9, 0).and_utc()),
                Moment::Utc(naive(2024, 1, 6, 9, 0).and_utc())
            )]
        );
    }
}
