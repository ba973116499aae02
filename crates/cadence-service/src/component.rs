//! Helpers for reading and editing calendar components.

use cadence_core::constants::DEFAULT_ALARM_DESCRIPTION;
use cadence_rfc::ical::core::{Component, ComponentKind, Property, Value, names};
use cadence_rfc::tz::{Moment, Span, TimeZoneTranslator};
use chrono::{DateTime, Utc};

use crate::error::ServiceResult;

const ACTION_DISPLAY: &str = "DISPLAY";

/// Returns whether the component carries an RRULE or RDATE.
#[must_use]
pub fn is_recurring(component: &Component) -> bool {
    component.has_property(names::RRULE) || component.has_property(names::RDATE)
}

/// The first VALARM with `ACTION:DISPLAY`.
#[must_use]
pub fn display_alarm(component: &Component) -> Option<&Component> {
    component
        .children_of_kind(ComponentKind::Alarm)
        .find(|alarm| is_display_alarm(alarm))
}

pub fn display_alarm_mut(component: &mut Component) -> Option<&mut Component> {
    component
        .children
        .iter_mut()
        .find(|child| child.kind == ComponentKind::Alarm && is_display_alarm(child))
}

/// Removes and returns the first display alarm.
pub fn remove_display_alarm(component: &mut Component) -> Option<Component> {
    let index = component
        .children
        .iter()
        .position(|child| child.kind == ComponentKind::Alarm && is_display_alarm(child))?;
    Some(component.children.remove(index))
}

/// Appends a display alarm without a trigger and returns it.
pub fn create_display_alarm(component: &mut Component) -> &mut Component {
    let mut alarm = Component::alarm();
    alarm.add_property(Property::text(names::ACTION, ACTION_DISPLAY));
    alarm.add_property(Property::text(names::DESCRIPTION, DEFAULT_ALARM_DESCRIPTION));
    component.add_child(alarm);
    let last = component.children.len() - 1;
    &mut component.children[last]
}

fn is_display_alarm(alarm: &Component) -> bool {
    alarm
        .get_property(names::ACTION)
        .and_then(Property::as_text)
        .is_some_and(|action| action.eq_ignore_ascii_case(ACTION_DISPLAY))
}

/// Sets a TEXT property, or removes it when `text` is `None`.
pub fn set_text(component: &mut Component, name: &str, text: Option<&str>) {
    match text {
        Some(text) => component.set_property(Property::text(name, text)),
        None => component.remove_properties(name),
    }
}

pub fn set_summary(component: &mut Component, text: Option<&str>) {
    set_text(component, names::SUMMARY, text);
}

pub fn set_description(component: &mut Component, text: Option<&str>) {
    set_text(component, names::DESCRIPTION, text);
}

pub fn set_location(component: &mut Component, text: Option<&str>) {
    set_text(component, names::LOCATION, text);
}

pub fn set_uid(component: &mut Component, text: Option<&str>) {
    set_text(component, names::UID, text);
}

pub fn set_dtstamp(component: &mut Component, at: DateTime<Utc>) {
    component.set_property(Moment::Utc(at).to_property(names::DTSTAMP));
}

/// Sets a vendor property verbatim, or removes it when `value` is `None`.
pub fn set_x_property(component: &mut Component, name: &str, value: Option<&str>) {
    match value {
        Some(value) => component.set_property(Property::raw(name, value)),
        None => component.remove_properties(name),
    }
}

#[must_use]
pub fn x_property<'a>(component: &'a Component, name: &str) -> Option<&'a str> {
    component.get_property(name).and_then(Property::as_text)
}

/// ## Summary
/// Length of the component: its DURATION, else DTEND minus DTSTART.
///
/// Returns `None` when neither is present or DTEND equals DTSTART.
///
/// ## Errors
/// Fails when DTSTART or DTEND names an unknown timezone.
pub fn get_duration(
    component: &Component,
    translator: &TimeZoneTranslator<'_>,
) -> ServiceResult<Option<Span>> {
    if let Some(duration) = component
        .get_property(names::DURATION)
        .and_then(Property::as_duration)
    {
        return Ok(Some(Span::from_duration(duration)));
    }
    let (Some(start), Some(end)) = (
        component.get_property(names::DTSTART),
        component.get_property(names::DTEND),
    ) else {
        return Ok(None);
    };
    if start.value == end.value {
        return Ok(None);
    }
    let start = Moment::from_property(start, translator)?;
    let end = Moment::from_property(end, translator)?;
    Ok(Some(Span::between(&start, &end, None)))
}

/// Writes `span` as DURATION, dropping any DTEND. `None` removes DURATION.
pub fn set_duration(component: &mut Component, span: Option<Span>) {
    match span {
        Some(span) => {
            component.remove_properties(names::DTEND);
            component.set_property(Property::duration(names::DURATION, span.to_duration()));
        }
        None => component.remove_properties(names::DURATION),
    }
}

/// TZIDs referenced by date-valued properties of the component and its
/// children, in order of first appearance.
#[must_use]
pub fn referenced_tzids(component: &Component) -> Vec<String> {
    let mut tzids = Vec::new();
    collect_tzids(component, &mut tzids);
    tzids
}

fn collect_tzids(component: &Component, tzids: &mut Vec<String>) {
    for property in &component.properties {
        if !property.has_date_value() {
            continue;
        }
        let tzid = property.tzid().map(str::to_string).or_else(|| match &property.value {
            Value::PeriodList(periods) => periods
                .first()
                .and_then(|period| period.start().tzid())
                .map(str::to_string),
            _ => None,
        });
        if let Some(tzid) = tzid
            && !tzids.contains(&tzid)
        {
            tzids.push(tzid);
        }
    }
    for child in &component.children {
        collect_tzids(child, tzids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_rfc::ical::parse::parse;

    fn event(body: &str) -> Component {
        let calendar = parse(&format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\nBEGIN:VEVENT\r\nUID:a\r\n{body}END:VEVENT\r\nEND:VCALENDAR\r\n"
        ))
        .expect("valid calendar");
        calendar.components()[0].clone()
    }

    #[test_log::test]
    fn text_setters_add_replace_and_remove() {
        let mut component = event("SUMMARY:Old\r\n");
        set_summary(&mut component, Some("New"));
        assert_eq!(component.summary(), Some("New"));
        set_summary(&mut component, None);
        assert_eq!(component.summary(), None);

        set_x_property(&mut component, "X-OSAF-STARRED", Some("TRUE"));
        assert_eq!(x_property(&component, "X-OSAF-STARRED"), Some("TRUE"));
        set_x_property(&mut component, "X-OSAF-STARRED", None);
        assert!(!component.has_property("X-OSAF-STARRED"));
    }

    #[test_log::test]
    fn duration_from_end_or_property() {
        let translator = TimeZoneTranslator::default();
        let mut component = event("DTSTART:20240101T090000Z\r\nDTEND:20240101T103000Z\r\n");
        assert_eq!(
            get_duration(&component, &translator).expect("reads"),
            Some(Span::Exact(chrono::TimeDelta::minutes(90)))
        );

        set_duration(&mut component, Some(Span::Days(1)));
        assert!(!component.has_property(names::DTEND));
        assert_eq!(
            get_duration(&component, &translator).expect("reads"),
            Some(Span::Days(1))
        );

        let same = event("DTSTART:20240101T090000Z\r\nDTEND:20240101T090000Z\r\n");
        assert_eq!(get_duration(&same, &translator).expect("reads"), None);
    }

    #[test_log::test]
    fn display_alarm_lifecycle() {
        let mut component = event("DTSTART:20240101T090000Z\r\n");
        assert!(display_alarm(&component).is_none());
        create_display_alarm(&mut component)
            .add_property(Property::raw(names::TRIGGER, "-PT15M"));
        assert!(display_alarm(&component).is_some());
        assert!(remove_display_alarm(&mut component).is_some());
        assert!(display_alarm(&component).is_none());
    }

    #[test_log::test]
    fn collects_referenced_zones_once() {
        let component = event(
            "DTSTART;TZID=America/New_York:20240101T090000\r\n\
             DTEND;TZID=Europe/Paris:20240101T160000\r\n\
             EXDATE;TZID=America/New_York:20240102T090000\r\n",
        );
        assert_eq!(
            referenced_tzids(&component),
            vec!["America/New_York".to_string(), "Europe/Paris".to_string()]
        );
    }
}
