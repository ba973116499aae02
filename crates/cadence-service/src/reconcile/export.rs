use std::collections::{BTreeMap, HashSet};

use cadence_core::constants::{ANYTIME_MISSING, PARAM_ANYTIME, PARAM_MISSING, PROP_STARRED};
use cadence_rfc::ical::core::{Component, ComponentKind, ICalendar, Parameter, Property, names};
use cadence_rfc::tz::Moment;

use super::{EntityConverter, STATUS_COMPLETED};
use crate::component::{
    display_alarm, get_duration, is_recurring, remove_display_alarm, set_description,
    set_dtstamp, set_duration, set_location, set_summary, set_uid, set_x_property,
};
use crate::error::{ServiceError, ServiceResult};
use crate::item::{Facet, FacetKind, Item, ItemStore, TriageCode};
use crate::recurrence::RecurrenceKey;

/// VTIMEZONEs an exported calendar still needs, collected in order.
struct MissingZones {
    present: HashSet<String>,
    added: Vec<Component>,
}

impl MissingZones {
    fn of(calendar: &ICalendar) -> Self {
        Self {
            present: calendar
                .timezones()
                .filter_map(Component::tzid)
                .map(str::to_string)
                .collect(),
            added: Vec::new(),
        }
    }

    /// Queues definitions for the zones of DTSTART and DTEND.
    fn require(&mut self, converter: &EntityConverter<'_>, component: &Component) {
        for name in [names::DTSTART, names::DTEND] {
            let Some(tzid) = component.get_property(name).and_then(Property::tzid) else {
                continue;
            };
            if self.present.contains(tzid) {
                continue;
            }
            if let Some(definition) = converter.registry_timezone(tzid) {
                self.present.insert(tzid.to_string());
                self.added.push(definition);
            }
        }
    }

    fn prepend_to(self, calendar: &mut ICalendar) {
        calendar.components_mut().splice(0..0, self.added);
    }
}

impl EntityConverter<'_> {
    /// ## Summary
    /// The calendar representing `item`, or `None` for a modification.
    ///
    /// Events export their series, free/busy items their stored calendar,
    /// journals a VJOURNAL and everything else a VTODO.
    ///
    /// ## Errors
    /// See [`Self::export_event`].
    pub fn convert_content(
        &self,
        store: &dyn ItemStore,
        item: &Item,
    ) -> ServiceResult<Option<ICalendar>> {
        if item.is_modification() {
            return Ok(None);
        }
        if item.has_facet(FacetKind::Event) {
            return self.export_event(store, item).map(Some);
        }
        if let Some(Facet::FreeBusy { calendar }) = item.facet(FacetKind::FreeBusy) {
            return Ok(Some(calendar.clone()));
        }
        if item.has_facet(FacetKind::Journal) {
            return Ok(Some(self.export_journal(item)));
        }
        Ok(Some(self.export_note(item)))
    }

    /// ## Summary
    /// Rebuilds the event document of a master item.
    ///
    /// The stored master is merged with the item's metadata. When it
    /// recurs, each active modification's override follows it in
    /// recurrence-id order, with inherited any-time flag, display alarm,
    /// location and duration filled in from the master. Registry
    /// VTIMEZONEs for every zone used by DTSTART/DTEND are put first.
    ///
    /// ## Errors
    /// - `ServiceError::ValidationError` if the item has no Event facet.
    /// - Timezone errors from date properties.
    #[tracing::instrument(skip_all, fields(uid = %item.uid))]
    pub fn export_event(&self, store: &dyn ItemStore, item: &Item) -> ServiceResult<ICalendar> {
        let Some(stored) = item.event_calendar() else {
            return Err(ServiceError::ValidationError(format!(
                "item {} has no event facet",
                item.uid
            )));
        };
        let mut calendar = stored.clone();
        let mut zones = MissingZones::of(&calendar);

        // A client may have stored something other than a VEVENT
        let Some(master) = calendar.master_mut(ComponentKind::Event) else {
            return Ok(calendar);
        };

        merge_event_properties(master, item, None);
        // A display alarm without a trigger is not exported
        if display_alarm(master).is_some_and(|alarm| !alarm.has_property(names::TRIGGER)) {
            remove_display_alarm(master);
        }
        let master_alarm = display_alarm(master).cloned();
        let master_location = master.location().map(str::to_string);
        let master_any_time = master
            .get_property(names::DTSTART)
            .and_then(|p| p.get_param_value(PARAM_ANYTIME))
            .is_some_and(|v| v.eq_ignore_ascii_case("TRUE"));
        let master_duration = get_duration(master, &self.translator)?;
        let recurring = is_recurring(master);
        zones.require(self, master);

        if !recurring {
            zones.prepend_to(&mut calendar);
            return Ok(calendar);
        }

        let mut exceptions: BTreeMap<RecurrenceKey, Component> = BTreeMap::new();
        for modification in store.modifications_of(&item.uid) {
            if !modification.is_active {
                continue;
            }
            let Some(mut exception) = modification
                .exception_calendar()
                .and_then(|c| c.components().iter().find(|c| c.kind == ComponentKind::Event))
                .cloned()
            else {
                continue;
            };
            let Some(rid) = exception.recurrence_id() else {
                tracing::warn!(uid = %modification.uid, "Modification has no RECURRENCE-ID");
                continue;
            };
            let key = RecurrenceKey::from_moment(&Moment::from_property(rid, &self.translator)?);

            if get_duration(&exception, &self.translator)?.is_none() {
                set_duration(&mut exception, master_duration);
            }
            merge_event_properties(&mut exception, &modification, Some(item));
            inherit_any_time(&mut exception, master_any_time);
            inherit_alarm(&mut exception, master_alarm.as_ref());
            if exception.location().is_none()
                && let Some(location) = master_location.as_deref()
            {
                set_location(&mut exception, Some(location));
            }

            zones.require(self, &exception);
            exceptions.insert(key, exception);
        }

        tracing::debug!(exceptions = exceptions.len(), "Exported event");
        calendar.components_mut().extend(exceptions.into_values());
        zones.prepend_to(&mut calendar);
        Ok(calendar)
    }

    /// A VTODO document for a note or task.
    fn export_note(&self, item: &Item) -> ICalendar {
        let mut calendar = match item.facet(FacetKind::Task) {
            Some(Facet::Task {
                calendar: Some(calendar),
            }) => calendar.clone(),
            _ => self.create_base_calendar_with(Component::todo()),
        };
        if calendar.master(ComponentKind::Todo).is_none() {
            calendar.add_component(Component::todo());
        }
        let Some(task) = calendar.master_mut(ComponentKind::Todo) else {
            return calendar;
        };

        merge_note_properties(task, item);

        let done = item.triage.filter(|triage| triage.code == TriageCode::Done);
        if done.is_some() {
            task.set_property(Property::text(names::STATUS, STATUS_COMPLETED));
        }
        match done.and_then(|triage| triage.ranked_at()) {
            Some(at) => task.set_property(Moment::Utc(at).to_property(names::COMPLETED)),
            None => task.remove_properties(names::COMPLETED),
        }
        set_starred(task, item);
        calendar
    }

    fn export_journal(&self, item: &Item) -> ICalendar {
        let mut journal = Component::new(ComponentKind::Journal);
        merge_note_properties(&mut journal, item);
        self.create_base_calendar_with(journal)
    }
}

/// UID, DTSTAMP, SUMMARY and DESCRIPTION of a task or journal.
fn merge_note_properties(component: &mut Component, item: &Item) {
    set_dtstamp(component, item.stamp_time());
    set_uid(component, Some(item.calendar_uid()));
    set_summary(component, item.display_name.as_deref());
    set_description(component, item.body.as_deref());
}

/// Writes item metadata onto an event. Modifications without their own
/// summary or description show the master's.
fn merge_event_properties(event: &mut Component, item: &Item, master: Option<&Item>) {
    let uid = master.map_or_else(|| item.calendar_uid(), Item::calendar_uid);
    set_uid(event, Some(uid));

    let summary = item
        .display_name
        .as_deref()
        .or_else(|| master.and_then(|m| m.display_name.as_deref()));
    set_summary(event, summary);
    let description = item
        .body
        .as_deref()
        .or_else(|| master.and_then(|m| m.body.as_deref()));
    set_description(event, description);

    set_dtstamp(event, item.stamp_time());
    set_starred(event, item);
}

fn set_starred(component: &mut Component, item: &Item) {
    let starred = item.has_facet(FacetKind::Task).then_some("TRUE");
    set_x_property(component, PROP_STARRED, starred);
}

/// Replaces an any-time flag of `MISSING` with the master's flag.
fn inherit_any_time(exception: &mut Component, master_any_time: bool) {
    let Some(start) = exception.get_property_mut(names::DTSTART) else {
        return;
    };
    let missing = start
        .get_param_value(PARAM_ANYTIME)
        .is_some_and(|v| v.eq_ignore_ascii_case(ANYTIME_MISSING));
    if !missing {
        return;
    }
    start.remove_param(PARAM_ANYTIME);
    if master_any_time {
        start.set_param(Parameter::new(PARAM_ANYTIME, "TRUE"));
    }
}

/// Replaces a placeholder display alarm with the master's alarm.
fn inherit_alarm(exception: &mut Component, master_alarm: Option<&Component>) {
    let placeholder = display_alarm(exception).is_some_and(|alarm| {
        alarm
            .get_property(names::TRIGGER)
            .is_none_or(|trigger| trigger.has_param(PARAM_MISSING))
    });
    if !placeholder {
        return;
    }
    remove_display_alarm(exception);
    if let Some(alarm) = master_alarm {
        exception.add_child(alarm.clone());
    }
}
