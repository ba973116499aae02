//! iCalendar component types (RFC 5545 §3.4-3.6).

use cadence_core::constants::{CALSCALE_GREGORIAN, ICALENDAR_VERSION};

use super::{Property, names};

/// Component kind for iCalendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Calendar,
    Event,
    Todo,
    Journal,
    FreeBusy,
    Timezone,
    Alarm,
    /// STANDARD sub-component of VTIMEZONE.
    Standard,
    /// DAYLIGHT sub-component of VTIMEZONE.
    Daylight,
    /// Any other (X- or IANA) component; the name is kept on [`Component`].
    Other,
}

impl ComponentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calendar => "VCALENDAR",
            Self::Event => "VEVENT",
            Self::Todo => "VTODO",
            Self::Journal => "VJOURNAL",
            Self::FreeBusy => "VFREEBUSY",
            Self::Timezone => "VTIMEZONE",
            Self::Alarm => "VALARM",
            Self::Standard => "STANDARD",
            Self::Daylight => "DAYLIGHT",
            Self::Other => "X-UNKNOWN",
        }
    }

    /// Parses a component kind from a string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "VCALENDAR" => Self::Calendar,
            "VEVENT" => Self::Event,
            "VTODO" => Self::Todo,
            "VJOURNAL" => Self::Journal,
            "VFREEBUSY" => Self::FreeBusy,
            "VTIMEZONE" => Self::Timezone,
            "VALARM" => Self::Alarm,
            "STANDARD" => Self::Standard,
            "DAYLIGHT" => Self::Daylight,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An iCalendar component.
///
/// Components can contain properties and nested sub-components.
/// For example, a VCALENDAR contains VEVENTs, which may contain VALARMs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component {
    pub kind: ComponentKind,
    /// Component name as written (preserved for X-components).
    pub name: String,
    /// Properties in order of appearance.
    pub properties: Vec<Property>,
    /// Nested sub-components.
    pub children: Vec<Component>,
}

impl Component {
    #[must_use]
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            name: kind.as_str().to_string(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates a component from its written name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into().to_ascii_uppercase();
        Self {
            kind: ComponentKind::parse(&name),
            name,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn event() -> Self {
        Self::new(ComponentKind::Event)
    }

    #[must_use]
    pub fn todo() -> Self {
        Self::new(ComponentKind::Todo)
    }

    #[must_use]
    pub fn alarm() -> Self {
        Self::new(ComponentKind::Alarm)
    }

    pub fn add_property(&mut self, prop: Property) {
        self.properties.push(prop);
    }

    pub fn add_child(&mut self, child: Component) {
        self.children.push(child);
    }

    /// Returns the first property with the given name.
    #[must_use]
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn get_property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Returns all properties with the given name.
    pub fn get_properties<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Property> {
        self.properties
            .iter()
            .filter(move |p| p.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.get_property(name).is_some()
    }

    /// Replaces every property of the same name with `prop`, keeping the
    /// position of the first one.
    pub fn set_property(&mut self, prop: Property) {
        match self
            .properties
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(&prop.name))
        {
            Some(index) => {
                let name = prop.name.clone();
                self.properties[index] = prop;
                let mut seen = false;
                self.properties.retain(|p| {
                    if !p.name.eq_ignore_ascii_case(&name) {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.properties.push(prop),
        }
    }

    pub fn remove_properties(&mut self, name: &str) {
        self.properties.retain(|p| !p.name.eq_ignore_ascii_case(name));
    }

    /// Direct children of the given kind.
    pub fn children_of_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &Component> {
        self.children.iter().filter(move |c| c.kind == kind)
    }

    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.get_property(names::UID)?.as_text()
    }

    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.get_property(names::SUMMARY)?.as_text()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.get_property(names::DESCRIPTION)?.as_text()
    }

    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.get_property(names::LOCATION)?.as_text()
    }

    /// TZID of a VTIMEZONE.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        self.get_property(names::TZID)?.as_text()
    }

    #[must_use]
    pub fn recurrence_id(&self) -> Option<&Property> {
        self.get_property(names::RECURRENCE_ID)
    }

    /// A component with a RECURRENCE-ID overrides one occurrence of its master.
    #[must_use]
    pub fn is_override(&self) -> bool {
        self.recurrence_id().is_some()
    }
}

/// A VCALENDAR document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ICalendar {
    pub root: Component,
}

impl ICalendar {
    /// Creates an empty calendar with PRODID, VERSION and CALSCALE set.
    #[must_use]
    pub fn new(prodid: &str) -> Self {
        let mut root = Component::new(ComponentKind::Calendar);
        root.add_property(Property::text(names::PRODID, prodid));
        root.add_property(Property::text(names::VERSION, ICALENDAR_VERSION));
        root.add_property(Property::text(names::CALSCALE, CALSCALE_GREGORIAN));
        Self { root }
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.root.get_property(names::VERSION)?.as_text()
    }

    /// All top-level components.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.root.children
    }

    pub fn components_mut(&mut self) -> &mut Vec<Component> {
        &mut self.root.children
    }

    pub fn add_component(&mut self, component: Component) {
        self.root.children.push(component);
    }

    pub fn events(&self) -> impl Iterator<Item = &Component> {
        self.root.children_of_kind(ComponentKind::Event)
    }

    pub fn timezones(&self) -> impl Iterator<Item = &Component> {
        self.root.children_of_kind(ComponentKind::Timezone)
    }

    /// The VTIMEZONE with the given TZID.
    #[must_use]
    pub fn timezone(&self, tzid: &str) -> Option<&Component> {
        self.timezones().find(|tz| tz.tzid() == Some(tzid))
    }

    /// The first component of `kind` without a RECURRENCE-ID.
    #[must_use]
    pub fn master(&self, kind: ComponentKind) -> Option<&Component> {
        self.root
            .children_of_kind(kind)
            .find(|c| !c.is_override())
    }

    #[must_use]
    pub fn master_mut(&mut self, kind: ComponentKind) -> Option<&mut Component> {
        self.root
            .children
            .iter_mut()
            .find(|c| c.kind == kind && !c.is_override())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_calendar_has_header_properties() {
        let ical = ICalendar::new("-//Test//EN");
        assert_eq!(ical.version(), Some("2.0"));
        assert_eq!(
            ical.root.get_property("prodid").and_then(Property::as_text),
            Some("-//Test//EN")
        );
        assert!(ical.components().is_empty());
    }

    #[test]
    fn set_property_collapses_duplicates() {
        let mut event = Component::event();
        event.add_property(Property::text(names::SUMMARY, "a"));
        event.add_property(Property::text(names::UID, "1"));
        event.add_property(Property::text(names::SUMMARY, "b"));
        event.set_property(Property::text(names::SUMMARY, "c"));
        assert_eq!(event.properties.len(), 2);
        assert_eq!(event.properties[0].as_text(), Some("c"));
        assert_eq!(event.summary(), Some("c"));
    }

    #[test]
    fn master_skips_overrides() {
        let mut ical = ICalendar::new("-//Test//EN");
        let mut exception = Component::event();
        exception.add_property(Property::text(names::UID, "x"));
        exception.add_property(Property::raw(names::RECURRENCE_ID, "20240101T090000Z"));
        let mut master = Component::event();
        master.add_property(Property::text(names::UID, "x"));
        ical.add_component(exception);
        ical.add_component(master);

        let found = ical.master(ComponentKind::Event).expect("master present");
        assert!(!found.is_override());
        assert_eq!(ical.events().count(), 2);
    }
}
