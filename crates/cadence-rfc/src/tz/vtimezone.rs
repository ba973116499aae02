//! Deterministic VTIMEZONE generation from tz database rules.
//!
//! Observances are derived from the transitions of a fixed reference year,
//! so the same zone always yields the same component.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone};
use chrono_tz::{OffsetComponents, Tz};

use crate::ical::core::{
    Component, ComponentKind, DateTime, Frequency, Property, Recur, UtcOffset, Value, Weekday,
    WeekdayNum, names,
};

const REFERENCE_YEAR: i32 = 2024;

/// One change of UTC offset.
struct Transition {
    /// Wall-clock time of the change, in the offset that applied before it.
    local: NaiveDateTime,
    from: i32,
    to: i32,
    daylight: bool,
    name: String,
}

/// ## Summary
/// Builds the VTIMEZONE for `tz`.
///
/// Zones with exactly two changes in the reference year get yearly
/// STANDARD/DAYLIGHT rules; zones with none get a single fixed STANDARD
/// observance. Anything else is written as one-off observances.
#[must_use]
pub fn generate_vtimezone(tz: Tz) -> Component {
    let mut vtimezone = Component::new(ComponentKind::Timezone);
    vtimezone.add_property(Property::text(names::TZID, tz.name()));

    let transitions = transitions_in_year(tz, REFERENCE_YEAR);

    if transitions.is_empty() {
        let Some(start) = NaiveDate::from_ymd_opt(1970, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        else {
            return vtimezone;
        };
        let probe = start.with_year(REFERENCE_YEAR).unwrap_or(start);
        let offset = tz.offset_from_utc_datetime(&probe);
        let seconds = offset.fix().local_minus_utc();
        let fixed = Transition {
            local: start,
            from: seconds,
            to: seconds,
            daylight: false,
            name: offset.to_string(),
        };
        vtimezone.add_child(observance(&fixed, None));
        return vtimezone;
    }

    let yearly = transitions.len() == 2;
    for transition in &transitions {
        let rule = yearly.then(|| yearly_rule(transition.local.date()));
        vtimezone.add_child(observance(transition, rule));
    }

    vtimezone
}

fn observance(transition: &Transition, rule: Option<Recur>) -> Component {
    let kind = if transition.daylight {
        ComponentKind::Daylight
    } else {
        ComponentKind::Standard
    };
    let mut component = Component::new(kind);
    component.add_property(Property::datetime(
        names::DTSTART,
        DateTime::floating(transition.local),
    ));
    if let Some(rule) = rule {
        component.add_property(Property::new(names::RRULE, Value::Recur(Box::new(rule))));
    }
    component.add_property(Property::new(
        names::TZOFFSETFROM,
        Value::UtcOffset(UtcOffset::from_seconds(transition.from)),
    ));
    component.add_property(Property::new(
        names::TZOFFSETTO,
        Value::UtcOffset(UtcOffset::from_seconds(transition.to)),
    ));
    component.add_property(Property::text(names::TZNAME, transition.name.clone()));
    component
}

/// `FREQ=YEARLY;BYMONTH=m;BYDAY=nDD` matching the weekday position of `date`.
fn yearly_rule(date: NaiveDate) -> Recur {
    let day = date.day();
    let month_len = days_in_month(date);
    let ordinal: i8 = if day + 7 > month_len {
        -1
    } else {
        i8::try_from((day - 1) / 7 + 1).unwrap_or(1)
    };

    let mut rule = Recur::new(Frequency::Yearly);
    rule.by_month = vec![u8::try_from(date.month()).unwrap_or(1)];
    rule.by_day = vec![WeekdayNum::nth(ordinal, Weekday::from_chrono(date.weekday()))];
    rule
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map_or(31, |last| last.day())
}

fn utc_offset(tz: Tz, at: NaiveDateTime) -> i32 {
    tz.offset_from_utc_datetime(&at).fix().local_minus_utc()
}

/// Finds offset changes during `year` by scanning hourly, then narrowing
/// to the minute.
fn transitions_in_year(tz: Tz, year: i32) -> Vec<Transition> {
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(year, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        NaiveDate::from_ymd_opt(year + 1, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
    ) else {
        return Vec::new();
    };

    let mut transitions = Vec::new();
    let mut previous = utc_offset(tz, start);
    let mut cursor = start;

    while cursor < end {
        let next = cursor + TimeDelta::hours(1);
        let offset = utc_offset(tz, next);
        if offset != previous {
            let mut instant = cursor + TimeDelta::minutes(1);
            while utc_offset(tz, instant) == previous {
                instant += TimeDelta::minutes(1);
            }
            let after = tz.offset_from_utc_datetime(&instant);
            transitions.push(Transition {
                local: instant + TimeDelta::seconds(i64::from(previous)),
                from: previous,
                to: offset,
                daylight: after.dst_offset() != TimeDelta::zero(),
                name: after.to_string(),
            });
            previous = offset;
        }
        cursor = next;
    }

    transitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ical::build::serialize_component;

    #[test_log::test]
    fn los_angeles_has_two_yearly_observances() {
        let vtz = generate_vtimezone(chrono_tz::America::Los_Angeles);
        assert_eq!(vtz.tzid(), Some("America/Los_Angeles"));
        assert_eq!(vtz.children.len(), 2);

        let daylight = &vtz.children[0];
        assert_eq!(daylight.kind, ComponentKind::Daylight);
        let rule = daylight
            .get_property(names::RRULE)
            .and_then(Property::as_recur)
            .expect("yearly rule");
        assert_eq!(rule.to_string(), "FREQ=YEARLY;BYMONTH=3;BYDAY=2SU");
        assert_eq!(
            daylight
                .get_property(names::DTSTART)
                .and_then(Property::as_datetime)
                .map(ToString::to_string),
            Some("20240310T020000".to_string())
        );

        let standard = &vtz.children[1];
        assert_eq!(standard.kind, ComponentKind::Standard);
        let text = serialize_component(standard);
        assert!(text.contains("BYMONTH=11;BYDAY=1SU"));
        assert!(text.contains("TZOFFSETFROM:-0700"));
        assert!(text.contains("TZOFFSETTO:-0800"));
    }

    #[test_log::test]
    fn last_sunday_rules_use_negative_ordinal() {
        let vtz = generate_vtimezone(chrono_tz::Europe::Berlin);
        let text = serialize_component(&vtz);
        assert!(text.contains("BYMONTH=3;BYDAY=-1SU"));
        assert!(text.contains("BYMONTH=10;BYDAY=-1SU"));
    }

    #[test_log::test]
    fn fixed_zone_has_single_standard() {
        let vtz = generate_vtimezone(chrono_tz::Asia::Tokyo);
        assert_eq!(vtz.children.len(), 1);
        assert_eq!(vtz.children[0].kind, ComponentKind::Standard);
        let text = serialize_component(&vtz);
        assert!(text.contains("TZOFFSETTO:+0900"));
    }

    #[test_log::test]
    fn generation_is_deterministic() {
        assert_eq!(
            generate_vtimezone(chrono_tz::Australia::Sydney),
            generate_vtimezone(chrono_tz::Australia::Sydney)
        );
    }
}
