use std::collections::{HashMap, HashSet};

use cadence_rfc::ical::core::{Component, ComponentKind, ICalendar, Property, names};

use super::EntityConverter;
use crate::component::referenced_tzids;

/// All components of one UID, in a calendar of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitCalendar {
    pub uid: String,
    /// Type of the first component seen for the UID.
    pub kind: ComponentKind,
    pub calendar: ICalendar,
}

impl EntityConverter<'_> {
    /// ## Summary
    /// Splits a document into one calendar per UID, in order of first
    /// appearance.
    ///
    /// Exact repeats of a (UID, RECURRENCE-ID) pair are dropped, as are
    /// components without a UID. Each calendar starts with the VTIMEZONEs
    /// its date properties reference: the document's own definition when
    /// it has one, else the registry's.
    #[must_use]
    #[tracing::instrument(skip_all, fields(components = calendar.components().len()))]
    pub fn split_calendar(&self, calendar: &ICalendar) -> Vec<SplitCalendar> {
        let mut seen: HashSet<(String, Option<Property>)> = HashSet::new();
        let mut groups: Vec<(String, Vec<Component>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for component in calendar.components() {
            // timezones are re-attached per group below
            if component.kind == ComponentKind::Timezone {
                continue;
            }
            let Some(uid) = component.uid() else {
                tracing::warn!(kind = %component.kind, "Skipping component without UID");
                continue;
            };
            if !seen.insert((uid.to_string(), component.recurrence_id().cloned())) {
                tracing::debug!(uid, "Dropping duplicate component");
                continue;
            }

            let slot = *index.entry(uid.to_string()).or_insert_with(|| {
                groups.push((uid.to_string(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(component.clone());
        }

        groups
            .into_iter()
            .filter_map(|(uid, components)| {
                let kind = components.first()?.kind;
                let mut split = self.create_base_calendar();
                let timezones = self.timezones_for(calendar, &components);
                split.components_mut().extend(timezones);
                split.components_mut().extend(components);
                Some(SplitCalendar {
                    uid,
                    kind,
                    calendar: split,
                })
            })
            .collect()
    }

    /// VTIMEZONE definitions for every TZID `components` reference.
    fn timezones_for(&self, source: &ICalendar, components: &[Component]) -> Vec<Component> {
        let mut tzids: Vec<String> = Vec::new();
        for component in components {
            for tzid in referenced_tzids(component) {
                if !tzids.contains(&tzid) {
                    tzids.push(tzid);
                }
            }
        }

        tzids
            .into_iter()
            .filter_map(|tzid| {
                if let Some(definition) = source.timezone(&tzid) {
                    return Some(definition.clone());
                }
                self.registry_timezone(&tzid)
            })
            .collect()
    }

    /// The registry's VTIMEZONE for `tzid`, labelled with `tzid` itself so
    /// references keep resolving.
    pub(super) fn registry_timezone(&self, tzid: &str) -> Option<Component> {
        let Some(zone) = self.translator.translate(tzid) else {
            tracing::warn!(tzid, "No timezone definition available");
            return None;
        };
        let mut definition = self.translator.registry().vtimezone(zone);
        if zone.name() != tzid {
            definition.set_property(Property::text(names::TZID, tzid));
        }
        Some(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::UuidGenerator;
    use cadence_core::config::Settings;
    use cadence_rfc::ical::parse::parse;
    use cadence_rfc::tz::TimeZoneTranslator;

    #[test_log::test]
    fn groups_by_uid_and_drops_duplicates() {
        let settings = Settings::default();
        let converter =
            EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
        let calendar = parse(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n\
             BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240101T090000Z\r\nRRULE:FREQ=DAILY\r\nEND:VEVENT\r\n\
             BEGIN:VTODO\r\nUID:b\r\nSUMMARY:Task\r\nEND:VTODO\r\n\
             BEGIN:VEVENT\r\nUID:a\r\nRECURRENCE-ID:20240102T090000Z\r\nDTSTART:20240102T100000Z\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:a\r\nRECURRENCE-ID:20240102T090000Z\r\nDTSTART:20240102T110000Z\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nSUMMARY:No uid\r\nEND:VEVENT\r\n\
             END:VCALENDAR\r\n",
        )
        .expect("valid calendar");

        let split = converter.split_calendar(&calendar);
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].uid, "a");
        assert_eq!(split[0].kind, ComponentKind::Event);
        assert_eq!(split[0].calendar.components().len(), 2);
        assert_eq!(split[1].uid, "b");
        assert_eq!(split[1].kind, ComponentKind::Todo);
    }

    #[test_log::test]
    fn prefers_document_timezones_over_registry() {
        let settings = Settings::default();
        let converter =
            EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
        let calendar = parse(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n\
             BEGIN:VTIMEZONE\r\nTZID:America/Chicago\r\nX-CUSTOM:yes\r\n\
             BEGIN:STANDARD\r\nDTSTART:19701101T020000\r\nTZOFFSETFROM:-0500\r\nTZOFFSETTO:-0600\r\nEND:STANDARD\r\n\
             END:VTIMEZONE\r\n\
             BEGIN:VEVENT\r\nUID:a\r\nDTSTART;TZID=America/Chicago:20240101T090000\r\n\
             DTEND;TZID=US/Pacific:20240101T090000\r\nEND:VEVENT\r\n\
             END:VCALENDAR\r\n",
        )
        .expect("valid calendar");

        let split = converter.split_calendar(&calendar);
        let zones: Vec<&Component> = split[0].calendar.timezones().collect();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].tzid(), Some("America/Chicago"));
        assert!(zones[0].has_property("X-CUSTOM"));
        assert_eq!(zones[1].tzid(), Some("US/Pacific"));
    }
}
