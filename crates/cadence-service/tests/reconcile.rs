//! Importing documents into items and exporting them back.

use cadence_core::config::Settings;
use cadence_rfc::ical::core::{Component, ComponentKind, ICalendar, names};
use cadence_rfc::ical::parse::parse;
use cadence_rfc::tz::TimeZoneTranslator;
use cadence_service::item::{InMemoryStore, ItemStore, UuidGenerator};
use cadence_service::reconcile::EntityConverter;

const SERIES: &str = "BEGIN:VEVENT\r\nUID:series\r\nSUMMARY:Standup\r\n\
    DTSTART;TZID=America/New_York:20240101T090000\r\n\
    DTEND;TZID=America/New_York:20240101T091500\r\nRRULE:FREQ=DAILY;COUNT=5\r\nEND:VEVENT\r\n\
    BEGIN:VEVENT\r\nUID:series\r\nRECURRENCE-ID;TZID=America/New_York:20240103T090000\r\n\
    SUMMARY:Moved standup\r\nDTSTART;TZID=America/New_York:20240103T100000\r\n\
    DTEND;TZID=America/New_York:20240103T101500\r\nEND:VEVENT\r\n\
    BEGIN:VEVENT\r\nUID:series\r\nRECURRENCE-ID;TZID=America/New_York:20240102T090000\r\n\
    DTSTART;TZID=America/New_York:20240102T093000\r\nEND:VEVENT\r\n";

fn calendar(body: &str) -> ICalendar {
    parse(&format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n{body}END:VCALENDAR\r\n"
    ))
    .expect("valid calendar")
}

fn kinds(calendar: &ICalendar) -> Vec<ComponentKind> {
    calendar.components().iter().map(|c| c.kind).collect()
}

#[test_log::test]
fn split_keeps_only_referenced_timezones() {
    let settings = Settings::default();
    let converter = EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
    let doc = calendar(
        "BEGIN:VEVENT\r\nUID:a\r\nDTSTART;TZID=America/Chicago:20240101T090000\r\nRRULE:FREQ=DAILY\r\nEND:VEVENT\r\n\
         BEGIN:VEVENT\r\nUID:b\r\nDTSTART;TZID=Europe/Paris:20240101T090000\r\nRRULE:FREQ=DAILY\r\nEND:VEVENT\r\n\
         BEGIN:VEVENT\r\nUID:a\r\nRECURRENCE-ID;TZID=America/Chicago:20240102T090000\r\n\
         DTSTART;TZID=America/Chicago:20240102T100000\r\nEND:VEVENT\r\n\
         BEGIN:VEVENT\r\nUID:b\r\nRECURRENCE-ID;TZID=Europe/Paris:20240102T090000\r\n\
         DTSTART;TZID=Europe/Paris:20240102T100000\r\nEND:VEVENT\r\n",
    );

    let split = converter.split_calendar(&doc);
    assert_eq!(split.len(), 2);
    for (part, tzid) in split.iter().zip(["America/Chicago", "Europe/Paris"]) {
        assert_eq!(
            kinds(&part.calendar),
            vec![ComponentKind::Timezone, ComponentKind::Event, ComponentKind::Event]
        );
        let zones: Vec<&str> = part.calendar.timezones().filter_map(Component::tzid).collect();
        assert_eq!(zones, vec![tzid]);
        assert!(
            part.calendar
                .components()
                .iter()
                .filter(|c| c.kind == ComponentKind::Event)
                .all(|c| c.uid() == Some(part.uid.as_str()))
        );
    }
}

#[test_log::test]
fn import_then_export_rebuilds_the_series() {
    let settings = Settings::default();
    let converter = EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
    let mut store = InMemoryStore::new();

    let converted = converter
        .convert_calendar(&mut store, &calendar(SERIES))
        .expect("imports");
    assert_eq!(converted.len(), 1);
    let master = store.create(converted[0].item.clone()).expect("stores master");
    assert_eq!(master.modifications.len(), 2);
    assert_eq!(master.display_name.as_deref(), Some("Standup"));

    let exported = converter
        .convert_collection(&store, store.iter().collect::<Vec<_>>())
        .expect("exports");
    assert_eq!(
        kinds(&exported),
        vec![
            ComponentKind::Timezone,
            ComponentKind::Event,
            ComponentKind::Event,
            ComponentKind::Event
        ]
    );

    let events: Vec<&Component> = exported.events().collect();
    assert!(events.iter().all(|e| e.uid() == Some("series")));
    assert!(events[0].recurrence_id().is_none());
    // overrides come back in recurrence-id order
    assert_eq!(events[1].summary(), Some("Standup"));
    assert_eq!(events[2].summary(), Some("Moved standup"));
    // the override without an end takes the master's length
    assert!(events[1].has_property(names::DURATION));
}

#[test_log::test]
fn reimport_is_idempotent() {
    let settings = Settings::default();
    let converter = EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
    let mut store = InMemoryStore::new();

    let (master, first) = converter
        .convert_new_event_calendar(&mut store, calendar(SERIES))
        .expect("imports");
    let master = store.create(master).expect("stores master");
    let first_uids: Vec<String> = first.iter().map(|m| m.uid.clone()).collect();

    let (master, second) = converter
        .convert_event_calendar(&mut store, master, calendar(SERIES))
        .expect("reimports");
    store.update(master).expect("stores master");
    let second_uids: Vec<String> = second.iter().map(|m| m.uid.clone()).collect();

    assert_eq!(first_uids, second_uids);
    assert!(second.iter().all(|m| m.is_active));
    // master plus two modifications
    assert_eq!(store.len(), 3);
}

#[test_log::test]
fn dropped_override_is_deactivated() {
    let settings = Settings::default();
    let converter = EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
    let mut store = InMemoryStore::new();

    let (master, _) = converter
        .convert_new_event_calendar(&mut store, calendar(SERIES))
        .expect("imports");
    let master = store.create(master).expect("stores master");

    let master_only = SERIES
        .split_inclusive("END:VEVENT\r\n")
        .next()
        .expect("master component");
    let (master, modifications) = converter
        .convert_event_calendar(&mut store, master, calendar(master_only))
        .expect("reimports");
    store.update(master.clone()).expect("stores master");

    assert_eq!(modifications.len(), 2);
    assert!(modifications.iter().all(|m| !m.is_active));

    let exported = converter.export_event(&store, &master).expect("exports");
    assert_eq!(exported.events().count(), 1);
}
