//! Conversion between calendar documents and stored items.
//!
//! Import splits a document into per-UID calendars and turns each into a
//! master item plus modification items. Export rebuilds the document from
//! the stored master calendar, the item's own metadata and its active
//! modifications.

mod export;
mod import;
mod split;

use std::collections::HashSet;

use cadence_core::config::Settings;
use cadence_rfc::ical::core::{Component, ComponentKind, ICalendar};
use cadence_rfc::tz::TimeZoneTranslator;

use crate::error::ServiceResult;
use crate::item::{IdGenerator, Item, ItemStore};

pub use split::SplitCalendar;

const STATUS_COMPLETED: &str = "COMPLETED";

/// An item created by [`EntityConverter::convert_calendar`] together with
/// the modification items created for its overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedItem {
    pub item: Item,
    pub modifications: Vec<Item>,
}

/// Converts calendar documents to items and back.
pub struct EntityConverter<'a> {
    translator: TimeZoneTranslator<'a>,
    ids: &'a dyn IdGenerator,
    settings: &'a Settings,
}

impl std::fmt::Debug for EntityConverter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityConverter")
            .field("translator", &self.translator)
            .field("product_id", &self.settings.calendar.product_id)
            .finish_non_exhaustive()
    }
}

impl<'a> EntityConverter<'a> {
    #[must_use]
    pub fn new(
        translator: TimeZoneTranslator<'a>,
        ids: &'a dyn IdGenerator,
        settings: &'a Settings,
    ) -> Self {
        Self {
            translator,
            ids,
            settings,
        }
    }

    #[must_use]
    pub fn translator(&self) -> TimeZoneTranslator<'a> {
        self.translator
    }

    /// An empty calendar with this installation's PRODID.
    #[must_use]
    pub fn create_base_calendar(&self) -> ICalendar {
        ICalendar::new(&self.settings.calendar.product_id)
    }

    /// A base calendar holding `component`.
    #[must_use]
    pub fn create_base_calendar_with(&self, component: Component) -> ICalendar {
        let mut calendar = self.create_base_calendar();
        calendar.add_component(component);
        calendar
    }

    /// ## Summary
    /// Turns an arbitrary document into new items: one per UID, typed by
    /// the first component seen for that UID. Event overrides become
    /// modification items in `store`.
    ///
    /// Components of other types are skipped.
    ///
    /// ## Errors
    /// Propagates failures from the per-type conversions.
    #[tracing::instrument(skip_all)]
    pub fn convert_calendar(
        &self,
        store: &mut dyn ItemStore,
        calendar: &ICalendar,
    ) -> ServiceResult<Vec<ConvertedItem>> {
        let mut converted = Vec::new();
        for split in self.split_calendar(calendar) {
            let item = match split.kind {
                ComponentKind::Event => {
                    let (item, modifications) =
                        self.convert_new_event_calendar(store, split.calendar)?;
                    converted.push(ConvertedItem {
                        item,
                        modifications,
                    });
                    continue;
                }
                ComponentKind::Todo => self.convert_task_calendar(self.new_item(), split.calendar)?,
                ComponentKind::Journal => {
                    self.convert_journal_calendar(self.new_item(), &split.calendar)?
                }
                ComponentKind::FreeBusy => {
                    self.convert_freebusy_calendar(self.new_item(), split.calendar)?
                }
                other => {
                    tracing::debug!(kind = %other, "Skipping unsupported component type");
                    continue;
                }
            };
            converted.push(ConvertedItem {
                item,
                modifications: Vec::new(),
            });
        }

        tracing::debug!(count = converted.len(), "Converted calendar");
        Ok(converted)
    }

    /// ## Summary
    /// One calendar for a whole collection of items. VTIMEZONEs are
    /// deduplicated by TZID (the first definition wins) and placed first.
    ///
    /// Modifications and items without calendar content are skipped.
    ///
    /// ## Errors
    /// Propagates failures from [`Self::convert_content`].
    pub fn convert_collection<'i>(
        &self,
        store: &dyn ItemStore,
        items: impl IntoIterator<Item = &'i Item>,
    ) -> ServiceResult<ICalendar> {
        let mut calendar = self.create_base_calendar();
        let mut timezones: Vec<Component> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for item in items {
            let Some(child) = self.convert_content(store, item)? else {
                continue;
            };
            for component in child.root.children {
                if component.kind != ComponentKind::Timezone {
                    calendar.add_component(component);
                    continue;
                }
                let Some(tzid) = component.tzid().map(str::to_string) else {
                    continue;
                };
                if seen.insert(tzid) {
                    timezones.push(component);
                }
            }
        }

        calendar.components_mut().splice(0..0, timezones);
        Ok(calendar)
    }

    fn new_item(&self) -> Item {
        Item::new(self.ids.generate(), chrono::Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{FacetKind, InMemoryStore, UuidGenerator};
    use cadence_rfc::ical::parse::parse;

    #[test_log::test]
    fn converts_each_component_type() {
        let settings = Settings::default();
        let converter = EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
        let mut store = InMemoryStore::new();
        let calendar = parse(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n\
             BEGIN:VEVENT\r\nUID:e\r\nDTSTART:20240101T090000Z\r\nSUMMARY:Event\r\nEND:VEVENT\r\n\
             BEGIN:VTODO\r\nUID:t\r\nSUMMARY:Task\r\nEND:VTODO\r\n\
             BEGIN:VJOURNAL\r\nUID:j\r\nSUMMARY:Journal\r\nEND:VJOURNAL\r\n\
             BEGIN:VFREEBUSY\r\nUID:f\r\nEND:VFREEBUSY\r\n\
             END:VCALENDAR\r\n",
        )
        .expect("valid calendar");

        let converted = converter
            .convert_calendar(&mut store, &calendar)
            .expect("converts");
        let kinds: Vec<_> = converted
            .iter()
            .map(|c| c.item.facets.iter().map(|f| f.kind()).collect::<Vec<_>>())
            .collect();
        assert_eq!(
            kinds,
            vec![
                vec![FacetKind::Event],
                vec![FacetKind::Task],
                vec![FacetKind::Journal],
                vec![FacetKind::FreeBusy],
            ]
        );
        assert_eq!(converted[1].item.display_name.as_deref(), Some("Task"));
        assert_eq!(converted[2].item.ical_uid.as_deref(), Some("j"));
    }

    #[test_log::test]
    fn collection_puts_each_timezone_first_once() {
        let settings = Settings::default();
        let converter = EntityConverter::new(TimeZoneTranslator::default(), &UuidGenerator, &settings);
        let mut store = InMemoryStore::new();
        let calendar = parse(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n\
             BEGIN:VEVENT\r\nUID:a\r\nDTSTART;TZID=America/New_York:20240101T090000\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:b\r\nDTSTART;TZID=America/New_York:20240102T090000\r\nEND:VEVENT\r\n\
             END:VCALENDAR\r\n",
        )
        .expect("valid calendar");
        let converted = converter
            .convert_calendar(&mut store, &calendar)
            .expect("converts");

        let merged = converter
            .convert_collection(&store, converted.iter().map(|c| &c.item))
            .expect("merges");
        let kinds: Vec<_> = merged.components().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ComponentKind::Timezone, ComponentKind::Event, ComponentKind::Event]
        );
        assert_eq!(
            merged.root.get_property("PRODID").and_then(|p| p.as_text()),
            Some(settings.calendar.product_id.as_str())
        );
    }
}
