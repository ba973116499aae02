use std::collections::HashSet;

use cadence_core::constants::{MAX_DISPLAY_NAME_LEN, PROP_STARRED};
use cadence_rfc::ical::core::{Component, ComponentKind, ICalendar, Property, Value, names};
use cadence_rfc::tz::{Moment, to_utc};
use chrono::{DateTime, Utc};

use super::{EntityConverter, STATUS_COMPLETED};
use crate::component::{display_alarm, set_dtstamp, x_property};
use crate::error::{ServiceError, ServiceResult};
use crate::item::{Facet, FacetKind, Item, ItemStore, ModificationUid, TriageCode, TriageStatus};
use crate::recurrence::RecurrenceKey;

impl EntityConverter<'_> {
    /// ## Summary
    /// Imports an event calendar into a brand-new master item.
    ///
    /// ## Errors
    /// See [`Self::convert_event_calendar`].
    pub fn convert_new_event_calendar(
        &self,
        store: &mut dyn ItemStore,
        calendar: ICalendar,
    ) -> ServiceResult<(Item, Vec<Item>)> {
        self.convert_event_calendar(store, self.new_item(), calendar)
    }

    /// ## Summary
    /// Imports an event calendar into `master` and reconciles its
    /// modification items with the calendar's overrides.
    ///
    /// Overrides are moved out of the stored calendar and into one
    /// modification item each: created when missing, updated in place
    /// otherwise. Stored modifications whose override disappeared are
    /// deactivated. VTIMEZONEs identical to the registry's are dropped from
    /// the stored calendar.
    ///
    /// Returns the updated master (not yet persisted) and every
    /// modification it owns.
    ///
    /// ## Errors
    /// - `ServiceError::NoMasterComponent` when the calendar has no VEVENT
    ///   without a RECURRENCE-ID.
    /// - Timezone errors from date properties, or store failures.
    #[tracing::instrument(skip_all, fields(uid = %master.uid))]
    pub fn convert_event_calendar(
        &self,
        store: &mut dyn ItemStore,
        mut master: Item,
        mut calendar: ICalendar,
    ) -> ServiceResult<(Item, Vec<Item>)> {
        let now = Utc::now();
        if master.uid.is_empty() {
            master.uid = self.ids.generate();
        }

        // Every event needs a DTSTAMP
        for component in calendar.components_mut() {
            if component.kind == ComponentKind::Event && !component.has_property(names::DTSTAMP) {
                set_dtstamp(component, now);
            }
        }

        // Overrides are stored on their own modification items
        let (overrides, rest): (Vec<Component>, Vec<Component>) =
            std::mem::take(calendar.components_mut())
                .into_iter()
                .partition(|c| c.kind == ComponentKind::Event && c.is_override());
        *calendar.components_mut() = rest;
        self.compact_timezones(&mut calendar);

        let master_event = calendar
            .master(ComponentKind::Event)
            .cloned()
            .ok_or_else(|| {
                ServiceError::NoMasterComponent("no master calendar component found".to_string())
            })?;
        tracing::debug!(overrides = overrides.len(), "Partitioned event calendar");

        self.set_event_attributes(&mut master, &master_event, now)?;
        let timezones: Vec<Component> = calendar.timezones().cloned().collect();
        master.set_facet(Facet::Event { calendar });

        self.sync_exceptions(store, &mut master, overrides, &timezones, now)?;
        let modifications = store.modifications_of(&master.uid);
        Ok((master, modifications))
    }

    /// ## Summary
    /// Imports a VTODO calendar into `item`, keeping the whole calendar on
    /// its Task facet.
    ///
    /// ## Errors
    /// `ServiceError::NoMasterComponent` without a master VTODO, or a
    /// timezone error from its date properties.
    pub fn convert_task_calendar(&self, mut item: Item, calendar: ICalendar) -> ServiceResult<Item> {
        let task = calendar
            .master(ComponentKind::Todo)
            .cloned()
            .ok_or_else(|| ServiceError::NoMasterComponent("no master VTODO found".to_string()))?;
        item.set_facet(Facet::Task {
            calendar: Some(calendar),
        });

        set_ical_uid(&mut item, &task);
        self.set_common_attributes(&mut item, &task)?;
        item.reminder_time = self.reminder_time(&task)?;

        let completed = task
            .get_property(names::COMPLETED)
            .map(|p| self.utc_of(p))
            .transpose()?;
        let status_completed = task
            .get_property(names::STATUS)
            .and_then(Property::as_text)
            .is_some_and(|status| status.eq_ignore_ascii_case(STATUS_COMPLETED));
        if completed.is_some() || status_completed {
            let at = completed.unwrap_or_else(Utc::now);
            let triage = item.triage.get_or_insert_with(|| TriageStatus::initial(at));
            triage.code = TriageCode::Done;
            triage.rank = TriageStatus::rank_of(at);
        }

        mark_starred(&mut item, &task);
        Ok(item)
    }

    /// ## Summary
    /// Imports a VJOURNAL calendar into `item`.
    ///
    /// ## Errors
    /// `ServiceError::NoMasterComponent` without a master VJOURNAL, or a
    /// timezone error from DTSTAMP.
    pub fn convert_journal_calendar(&self, mut item: Item, calendar: &ICalendar) -> ServiceResult<Item> {
        let journal = calendar.master(ComponentKind::Journal).ok_or_else(|| {
            ServiceError::NoMasterComponent("no master VJOURNAL found".to_string())
        })?;
        set_ical_uid(&mut item, journal);
        self.set_common_attributes(&mut item, journal)?;
        item.set_facet(Facet::Journal);
        Ok(item)
    }

    /// ## Summary
    /// Imports a VFREEBUSY calendar into `item`.
    ///
    /// ## Errors
    /// `ServiceError::NoMasterComponent` without a VFREEBUSY.
    pub fn convert_freebusy_calendar(&self, mut item: Item, calendar: ICalendar) -> ServiceResult<Item> {
        let freebusy = calendar
            .master(ComponentKind::FreeBusy)
            .ok_or_else(|| ServiceError::NoMasterComponent("no VFREEBUSY found".to_string()))?;
        set_ical_uid(&mut item, freebusy);
        if let Some(stamp) = freebusy.get_property(names::DTSTAMP) {
            item.client_modified = Some(self.utc_of(stamp)?);
        }
        item.set_facet(Facet::FreeBusy { calendar });
        Ok(item)
    }

    /// Drops VTIMEZONEs that equal the registry's definition for their TZID.
    pub(super) fn compact_timezones(&self, calendar: &mut ICalendar) {
        let registry = self.translator.registry();
        calendar.components_mut().retain(|component| {
            if component.kind != ComponentKind::Timezone {
                return true;
            }
            let Some(tzid) = component.tzid() else {
                return true;
            };
            match registry.get(tzid) {
                Some(zone) if registry.vtimezone(zone) == *component => {
                    tracing::trace!(tzid, "Compacting registry timezone");
                    false
                }
                _ => true,
            }
        });
    }

    fn sync_exceptions(
        &self,
        store: &mut dyn ItemStore,
        master: &mut Item,
        overrides: Vec<Component>,
        timezones: &[Component],
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut present: HashSet<RecurrenceKey> = HashSet::new();

        for exception in overrides {
            let Some(rid) = exception.recurrence_id() else {
                continue;
            };
            let key = RecurrenceKey::from_moment(&Moment::from_property(rid, &self.translator)?);
            present.insert(key.clone());

            let mut exception_calendar = self.create_base_calendar();
            exception_calendar.components_mut().extend(timezones.iter().cloned());

            match store.find_modification(&master.uid, &key) {
                None => {
                    let uid = ModificationUid::from_key(master.uid.clone(), key).to_string();
                    tracing::debug!(uid = %uid, "Creating modification");
                    let mut modification = Item::new(uid, now);
                    modification.owner.clone_from(&master.owner);
                    modification.modifies = Some(master.uid.clone());
                    self.set_event_attributes(&mut modification, &exception, now)?;
                    exception_calendar.add_component(exception);
                    modification.set_facet(Facet::EventException {
                        calendar: exception_calendar,
                    });
                    if !master.modifications.contains(&modification.uid) {
                        master.modifications.push(modification.uid.clone());
                    }
                    store.create(modification)?;
                }
                Some(mut modification) => {
                    tracing::debug!(uid = %modification.uid, "Updating modification");
                    modification.client_modified = Some(now);
                    modification.modified = now;
                    modification.is_active = true;
                    self.set_event_attributes(&mut modification, &exception, now)?;
                    exception_calendar.add_component(exception);
                    modification.set_facet(Facet::EventException {
                        calendar: exception_calendar,
                    });
                    store.update(modification)?;
                }
            }
        }

        for modification in store.modifications_of(&master.uid) {
            if !modification.is_active {
                continue;
            }
            let key = ModificationUid::parse(&modification.uid)
                .ok()
                .map(|uid| uid.recurrence_id().clone());
            let keep = modification.has_facet(FacetKind::EventException)
                && key.is_some_and(|key| present.contains(&key));
            if !keep {
                store.deactivate(&modification.uid)?;
            }
        }
        Ok(())
    }

    /// Copies the event's metadata onto `item`.
    fn set_event_attributes(
        &self,
        item: &mut Item,
        event: &Component,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        if !item.is_modification() {
            set_ical_uid(item, event);
        }
        self.set_common_attributes(item, event)?;

        if let Some(reminder) = self.reminder_time(event)? {
            item.reminder_time = Some(reminder);
        }

        if let Some(start) = event.get_property(names::DTSTART) {
            let start = to_utc(&Moment::from_property(start, &self.translator)?, None);
            let code = if start > now {
                TriageCode::Later
            } else {
                TriageCode::Done
            };
            item.triage.get_or_insert_with(|| TriageStatus::initial(now)).code = code;
        }

        mark_starred(item, event);
        Ok(())
    }

    /// Summary, description and DTSTAMP.
    fn set_common_attributes(&self, item: &mut Item, component: &Component) -> ServiceResult<()> {
        if let Some(summary) = component.summary() {
            item.display_name = Some(summary.chars().take(MAX_DISPLAY_NAME_LEN).collect());
        }
        if let Some(description) = component.description() {
            item.body = Some(description.to_string());
        }
        if let Some(stamp) = component.get_property(names::DTSTAMP) {
            item.client_modified = Some(self.utc_of(stamp)?);
        }
        Ok(())
    }

    /// Absolute trigger of the display alarm.
    fn reminder_time(&self, component: &Component) -> ServiceResult<Option<DateTime<Utc>>> {
        let Some(trigger) = display_alarm(component).and_then(|alarm| alarm.get_property(names::TRIGGER))
        else {
            return Ok(None);
        };
        if !matches!(trigger.value, Value::DateTime(_)) {
            return Ok(None);
        }
        Ok(Some(self.utc_of(trigger)?))
    }

    fn utc_of(&self, property: &Property) -> ServiceResult<DateTime<Utc>> {
        Ok(to_utc(&Moment::from_property(property, &self.translator)?, None))
    }
}

/// Modifications share their master's UID, so only masters record it.
fn set_ical_uid(item: &mut Item, component: &Component) {
    if let Some(uid) = component.uid() {
        item.ical_uid = Some(uid.to_string());
    }
}

/// A `X-OSAF-STARRED:TRUE` component gives the item a Task facet.
fn mark_starred(item: &mut Item, component: &Component) {
    if x_property(component, PROP_STARRED).is_some_and(|v| v.eq_ignore_ascii_case("TRUE")) {
        item.ensure_facet(Facet::Task { calendar: None });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{InMemoryStore, UuidGenerator};
    use cadence_core::config::Settings;
    use cadence_rfc::ical::parse::parse;
    use cadence_rfc::tz::TimeZoneTranslator;

    fn calendar(body: &str) -> ICalendar {
        parse(&format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n{body}END:VCALENDAR\r\n"
        ))
        .expect("valid calendar")
    }

    const SERIES: &str = "BEGIN:VEVENT\r\nUID:series\r\nDTSTAMP:20240101T000000Z\r\nSUMMARY:Standup\r\n\
        DTSTART:20240101T090000Z\r\nDTEND:20240101T093000Z\r\nRRULE:FREQ=DAILY;COUNT=5\r\nEND:VEVENT\r\n";

    fn overrides(days: &[u32]) -> String {
        days.iter()
            .map(|day| {
                format!(
                    "BEGIN:VEVENT\r\nUID:series\r\nRECURRENCE-ID:202401{day:02}T090000Z\r\n\
                     DTSTART:202401{day:02}T100000Z\r\nDTEND:202401{day:02}T103000Z\r\nSUMMARY:Moved\r\nEND:VEVENT\r\n"
                )
            })
            .collect()
    }

    #[test_log::test]
    fn imports_master_and_creates_modifications() {
        let settings = Settings::default();
        let converter = EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
        let mut store = InMemoryStore::new();

        let doc = calendar(&format!("{SERIES}{}", overrides(&[2, 3])));
        let (master, modifications) = converter
            .convert_event_calendar(&mut store, Item::new("m", Utc::now()), doc)
            .expect("imports");

        assert_eq!(master.ical_uid.as_deref(), Some("series"));
        assert_eq!(master.display_name.as_deref(), Some("Standup"));
        assert_eq!(master.triage.map(|t| t.code), Some(TriageCode::Done));
        let stored = master.event_calendar().expect("event facet");
        assert_eq!(stored.events().count(), 1);

        let mut uids: Vec<_> = modifications.iter().map(|m| m.uid.as_str()).collect();
        uids.sort_unstable();
        assert_eq!(uids, vec!["m:20240102T090000Z", "m:20240103T090000Z"]);
        assert!(modifications.iter().all(|m| m.modifies.as_deref() == Some("m")));
        assert!(modifications.iter().all(|m| m.ical_uid.is_none()));
        assert_eq!(master.modifications.len(), 2);
    }

    #[test_log::test]
    fn reimport_updates_and_deactivates() {
        let settings = Settings::default();
        let converter = EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
        let mut store = InMemoryStore::new();

        let (master, _) = converter
            .convert_event_calendar(
                &mut store,
                Item::new("m", Utc::now()),
                calendar(&format!("{SERIES}{}", overrides(&[2, 3]))),
            )
            .expect("imports");
        let (_, modifications) = converter
            .convert_event_calendar(&mut store, master, calendar(&format!("{SERIES}{}", overrides(&[3]))))
            .expect("re-imports");

        let active: Vec<_> = modifications
            .iter()
            .filter(|m| m.is_active)
            .map(|m| m.uid.as_str())
            .collect();
        assert_eq!(active, vec!["m:20240103T090000Z"]);
        assert_eq!(
            store.get("m:20240102T090000Z").map(|m| m.is_active),
            Some(false)
        );
    }

    #[test_log::test]
    fn reimport_leaves_modification_uid_alone() {
        let settings = Settings::default();
        let converter = EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
        let mut store = InMemoryStore::new();

        let doc = || calendar(&format!("{SERIES}{}", overrides(&[2])));
        let (mut master, _) = converter
            .convert_event_calendar(&mut store, Item::new("m", Utc::now()), doc())
            .expect("imports");
        let mut stored = store.get("m:20240102T090000Z").expect("modification");
        assert_eq!(stored.ical_uid, None);
        stored.ical_uid = Some("kept@example.com".to_string());
        store.update(stored).expect("updates");

        master.ical_uid = None;
        let (master, modifications) = converter
            .convert_event_calendar(&mut store, master, doc())
            .expect("re-imports");
        assert_eq!(master.ical_uid.as_deref(), Some("series"));
        assert_eq!(modifications.len(), 1);
        assert_eq!(modifications[0].ical_uid.as_deref(), Some("kept@example.com"));
    }

    #[test_log::test]
    fn overrides_only_has_no_master() {
        let settings = Settings::default();
        let converter = EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
        let mut store = InMemoryStore::new();
        let err = converter
            .convert_new_event_calendar(&mut store, calendar(&overrides(&[2])))
            .expect_err("no master");
        assert!(matches!(err, ServiceError::NoMasterComponent(_)));
    }

    #[test_log::test]
    fn compacts_registry_timezones_only() {
        let settings = Settings::default();
        let translator = TimeZoneTranslator::default();
        let converter = EntityConverter::new(translator, &UuidGenerator, &settings);
        let registry = translator.registry();

        let mut doc = calendar(
            "BEGIN:VEVENT\r\nUID:a\r\nDTSTART;TZID=America/New_York:20240101T090000\r\nEND:VEVENT\r\n",
        );
        let zone = registry.get("America/New_York").expect("known zone");
        doc.components_mut().insert(0, registry.vtimezone(zone));
        let mut custom = registry.vtimezone(zone);
        custom.set_property(Property::text(names::TZID, "Custom/Zone"));
        doc.components_mut().insert(0, custom);

        converter.compact_timezones(&mut doc);
        let tzids: Vec<_> = doc.timezones().filter_map(Component::tzid).collect();
        assert_eq!(tzids, vec!["Custom/Zone"]);
    }

    #[test_log::test]
    fn task_attributes() {
        let settings = Settings::default();
        let converter = EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
        let doc = calendar(
            "BEGIN:VTODO\r\nUID:t\r\nSUMMARY:Pay bills\r\nCOMPLETED:20240105T120000Z\r\n\
             BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER;VALUE=DATE-TIME:20240104T080000Z\r\nEND:VALARM\r\n\
             END:VTODO\r\n",
        );
        let item = converter
            .convert_task_calendar(Item::new("i", Utc::now()), doc)
            .expect("imports");
        let triage = item.triage.expect("triage set");
        assert_eq!(triage.code, TriageCode::Done);
        assert_eq!(
            triage.ranked_at().map(|at| at.to_rfc3339()),
            Some("2024-01-05T12:00:00+00:00".to_string())
        );
        assert_eq!(
            item.reminder_time.map(|at| at.to_rfc3339()),
            Some("2024-01-04T08:00:00+00:00".to_string())
        );
        assert!(item.has_facet(FacetKind::Task));
    }
}
