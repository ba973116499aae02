//! VALARM trigger resolution.

use cadence_rfc::ical::core::{Component, ComponentKind, Value, names};
use cadence_rfc::tz::{Moment, Span, TimeZoneTranslator};

use crate::error::ServiceResult;

const RELATED: &str = "RELATED";

/// ## Summary
/// Every moment `alarm` fires for one occurrence of `parent`: the trigger
/// itself followed by REPEAT further firings spaced by DURATION.
///
/// Relative triggers are resolved against DTSTART, or against the end
/// (DTEND, DTSTART plus DURATION, then DUE) when `RELATED=END`. An alarm
/// whose anchor is missing has no trigger dates.
///
/// ## Errors
/// Fails when a date property names an unknown timezone or a firing falls
/// outside the representable range.
pub fn trigger_dates(
    alarm: &Component,
    parent: &Component,
    translator: &TimeZoneTranslator<'_>,
) -> ServiceResult<Vec<Moment>> {
    let Some(first) = trigger_date(alarm, parent, translator)? else {
        return Ok(Vec::new());
    };

    let mut dates = vec![first];
    let interval = alarm
        .get_property(names::DURATION)
        .and_then(|p| p.as_duration())
        .map(Span::from_duration);
    let repeat = alarm
        .get_property(names::REPEAT)
        .and_then(|p| p.as_integer())
        .unwrap_or_default();

    if let Some(interval) = interval {
        let mut next = first;
        for _ in 0..repeat.max(0) {
            next = next.add(interval)?;
            dates.push(next);
        }
    }
    Ok(dates)
}

/// ## Summary
/// The first moment `alarm` fires for `parent`, if it can be determined.
///
/// ## Errors
/// Fails when a date property names an unknown timezone.
pub fn trigger_date(
    alarm: &Component,
    parent: &Component,
    translator: &TimeZoneTranslator<'_>,
) -> ServiceResult<Option<Moment>> {
    let Some(trigger) = alarm.get_property(names::TRIGGER) else {
        return Ok(None);
    };
    if matches!(trigger.value, Value::DateTime(_)) {
        return Ok(Some(Moment::from_property(trigger, translator)?));
    }
    let Some(offset) = trigger.as_duration().map(Span::from_duration) else {
        tracing::debug!("Trigger has neither a duration nor a date-time");
        return Ok(None);
    };

    let start = parent
        .get_property(names::DTSTART)
        .map(|p| Moment::from_property(p, translator))
        .transpose()?;
    if start.is_none() && parent.kind == ComponentKind::Event {
        return Ok(None);
    }

    let related_to_end = trigger
        .get_param_value(RELATED)
        .is_some_and(|related| related.eq_ignore_ascii_case("END"));
    let anchor = if related_to_end {
        end_anchor(parent, start.as_ref(), translator)?
    } else {
        start
    };
    Ok(anchor.map(|anchor| anchor.add(offset)).transpose()?)
}

fn end_anchor(
    parent: &Component,
    start: Option<&Moment>,
    translator: &TimeZoneTranslator<'_>,
) -> ServiceResult<Option<Moment>> {
    if let Some(end) = parent.get_property(names::DTEND) {
        return Ok(Some(Moment::from_property(end, translator)?));
    }
    if let (Some(start), Some(duration)) = (
        start,
        parent.get_property(names::DURATION).and_then(|p| p.as_duration()),
    ) {
        return Ok(Some(start.add(Span::from_duration(duration))?));
    }
    parent
        .get_property(names::DUE)
        .map(|due| Moment::from_property(due, translator))
        .transpose()
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_rfc::ical::parse::parse;
    use chrono::NaiveDate;

    fn utc(d: u32, h: u32, m: u32) -> Moment {
        Moment::Utc(
            NaiveDate::from_ymd_opt(2024, 1, d)
                .and_then(|date| date.and_hms_opt(h, m, 0))
                .expect("valid test date")
                .and_utc(),
        )
    }

    fn first_component(body: &str) -> Component {
        let calendar = parse(&format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n{body}END:VCALENDAR\r\n"
        ))
        .expect("valid calendar");
        calendar.components()[0].clone()
    }

    fn alarm_of(parent: &Component) -> &Component {
        parent
            .children_of_kind(ComponentKind::Alarm)
            .next()
            .expect("has alarm")
    }

    #[test_log::test]
    fn relative_to_start_with_repeats() {
        let event = first_component(
            "BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240101T090000Z\r\nDTEND:20240101T100000Z\r\n\
             BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER:-PT15M\r\nREPEAT:2\r\nDURATION:PT5M\r\nEND:VALARM\r\n\
             END:VEVENT\r\n",
        );
        let dates = trigger_dates(alarm_of(&event), &event, &TimeZoneTranslator::default())
            .expect("resolves");
        assert_eq!(dates, vec![utc(1, 8, 45), utc(1, 8, 50), utc(1, 8, 55)]);
    }

    #[test_log::test]
    fn relative_to_end_and_absolute() {
        let event = first_component(
            "BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240101T090000Z\r\nDURATION:PT2H\r\n\
             BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER;RELATED=END:PT0S\r\nEND:VALARM\r\n\
             END:VEVENT\r\n",
        );
        let translator = TimeZoneTranslator::default();
        assert_eq!(
            trigger_date(alarm_of(&event), &event, &translator).expect("resolves"),
            Some(utc(1, 11, 0))
        );

        let event = first_component(
            "BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240101T090000Z\r\n\
             BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER;VALUE=DATE-TIME:20231231T120000Z\r\nEND:VALARM\r\n\
             END:VEVENT\r\n",
        );
        let dates = trigger_dates(alarm_of(&event), &event, &translator).expect("resolves");
        assert_eq!(
            dates,
            vec![Moment::Utc(
                NaiveDate::from_ymd_opt(2023, 12, 31)
                    .and_then(|date| date.and_hms_opt(12, 0, 0))
                    .expect("valid test date")
                    .and_utc()
            )]
        );
    }

    #[test_log::test]
    fn task_due_anchor_and_missing_start() {
        let todo = first_component(
            "BEGIN:VTODO\r\nUID:t\r\nDUE:20240105T170000Z\r\n\
             BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER;RELATED=END:-PT1H\r\nEND:VALARM\r\n\
             END:VTODO\r\n",
        );
        let translator = TimeZoneTranslator::default();
        assert_eq!(
            trigger_date(alarm_of(&todo), &todo, &translator).expect("resolves"),
            Some(utc(5, 16, 0))
        );

        let event = first_component(
            "BEGIN:VEVENT\r\nUID:a\r\n\
             BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER:-PT15M\r\nEND:VALARM\r\n\
             END:VEVENT\r\n",
        );
        assert!(
            trigger_dates(alarm_of(&event), &event, &translator)
                .expect("resolves")
                .is_empty()
        );
    }
}
