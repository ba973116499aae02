use std::fmt;

use cadence_rfc::ical::core::ICalendar;
use chrono::{DateTime, TimeZone, Utc};

/// Which facet a [`Facet`] value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetKind {
    Event,
    EventException,
    Task,
    Note,
    Journal,
    FreeBusy,
}

impl FacetKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::EventException => "event-exception",
            Self::Task => "task",
            Self::Note => "note",
            Self::Journal => "journal",
            Self::FreeBusy => "freebusy",
        }
    }
}

impl fmt::Display for FacetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar behavior attached to an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Facet {
    /// A series master; the calendar holds the master VEVENT without its
    /// overrides.
    Event { calendar: ICalendar },
    /// One override; the calendar holds the override VEVENT.
    EventException { calendar: ICalendar },
    /// A starred item or an imported VTODO.
    Task { calendar: Option<ICalendar> },
    Note,
    Journal,
    FreeBusy { calendar: ICalendar },
}

impl Facet {
    #[must_use]
    pub const fn kind(&self) -> FacetKind {
        match self {
            Self::Event { .. } => FacetKind::Event,
            Self::EventException { .. } => FacetKind::EventException,
            Self::Task { .. } => FacetKind::Task,
            Self::Note => FacetKind::Note,
            Self::Journal => FacetKind::Journal,
            Self::FreeBusy { .. } => FacetKind::FreeBusy,
        }
    }

    /// The stored calendar, when this facet carries one.
    #[must_use]
    pub fn calendar(&self) -> Option<&ICalendar> {
        match self {
            Self::Event { calendar }
            | Self::EventException { calendar }
            | Self::FreeBusy { calendar } => Some(calendar),
            Self::Task { calendar } => calendar.as_ref(),
            Self::Note | Self::Journal => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriageCode {
    Now,
    Later,
    Done,
}

/// Where an item sits in the user's workflow.
///
/// `rank` sorts items inside a code; it is the negated epoch second of the
/// moment the status was set, so more recent items rank first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriageStatus {
    pub code: TriageCode,
    pub rank: i64,
    pub auto_triage: bool,
}

impl TriageStatus {
    /// A `Now` status ranked at `at`.
    #[must_use]
    pub fn initial(at: DateTime<Utc>) -> Self {
        Self {
            code: TriageCode::Now,
            rank: Self::rank_of(at),
            auto_triage: true,
        }
    }

    #[must_use]
    pub fn rank_of(at: DateTime<Utc>) -> i64 {
        -at.timestamp()
    }

    /// The moment encoded in `rank`.
    #[must_use]
    pub fn ranked_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(-self.rank, 0).single()
    }
}

/// A stored item: a series master, a modification of one, or a standalone
/// task, note or free/busy entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub uid: String,
    pub owner: Option<String>,
    pub display_name: Option<String>,
    pub body: Option<String>,
    /// UID of the calendar component, when it differs from `uid`.
    pub ical_uid: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub client_modified: Option<DateTime<Utc>>,
    pub reminder_time: Option<DateTime<Utc>>,
    pub triage: Option<TriageStatus>,
    /// Cleared instead of deleting, so sync clients see the removal.
    pub is_active: bool,
    pub facets: Vec<Facet>,
    /// UIDs of the modification items owned by a master.
    pub modifications: Vec<String>,
    /// UID of the master this item modifies.
    pub modifies: Option<String>,
}

impl Item {
    /// A fresh, active item with client timestamps and triage set to `now`.
    #[must_use]
    pub fn new(uid: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            uid: uid.into(),
            owner: None,
            display_name: None,
            body: None,
            ical_uid: None,
            created: now,
            modified: now,
            client_modified: Some(now),
            reminder_time: None,
            triage: Some(TriageStatus::initial(now)),
            is_active: true,
            facets: Vec::new(),
            modifications: Vec::new(),
            modifies: None,
        }
    }

    #[must_use]
    pub fn is_modification(&self) -> bool {
        self.modifies.is_some()
    }

    #[must_use]
    pub fn facet(&self, kind: FacetKind) -> Option<&Facet> {
        self.facets.iter().find(|facet| facet.kind() == kind)
    }

    pub fn facet_mut(&mut self, kind: FacetKind) -> Option<&mut Facet> {
        self.facets.iter_mut().find(|facet| facet.kind() == kind)
    }

    #[must_use]
    pub fn has_facet(&self, kind: FacetKind) -> bool {
        self.facet(kind).is_some()
    }

    /// Adds `facet`, replacing any facet of the same kind.
    pub fn set_facet(&mut self, facet: Facet) {
        let kind = facet.kind();
        match self.facet_mut(kind) {
            Some(existing) => *existing = facet,
            None => self.facets.push(facet),
        }
    }

    /// Adds `facet` unless one of its kind is already present.
    pub fn ensure_facet(&mut self, facet: Facet) {
        if !self.has_facet(facet.kind()) {
            self.facets.push(facet);
        }
    }

    pub fn remove_facet(&mut self, kind: FacetKind) -> Option<Facet> {
        let index = self.facets.iter().position(|facet| facet.kind() == kind)?;
        Some(self.facets.remove(index))
    }

    /// Calendar of the Event facet.
    #[must_use]
    pub fn event_calendar(&self) -> Option<&ICalendar> {
        match self.facet(FacetKind::Event)? {
            Facet::Event { calendar } => Some(calendar),
            _ => None,
        }
    }

    /// Calendar of the EventException facet.
    #[must_use]
    pub fn exception_calendar(&self) -> Option<&ICalendar> {
        match self.facet(FacetKind::EventException)? {
            Facet::EventException { calendar } => Some(calendar),
            _ => None,
        }
    }

    /// Identifier written as the component UID.
    #[must_use]
    pub fn calendar_uid(&self) -> &str {
        self.ical_uid.as_deref().unwrap_or(&self.uid)
    }

    /// DTSTAMP written on export.
    #[must_use]
    pub fn stamp_time(&self) -> DateTime<Utc> {
        self.client_modified.unwrap_or(self.modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .expect("valid test time")
    }

    #[test_log::test]
    fn one_facet_per_kind() {
        let mut item = Item::new("abc", now());
        item.set_facet(Facet::Task { calendar: None });
        item.ensure_facet(Facet::Note);
        item.ensure_facet(Facet::Task {
            calendar: Some(ICalendar::new("-//Test//EN")),
        });
        assert_eq!(item.facets.len(), 2);
        assert_eq!(item.facet(FacetKind::Task), Some(&Facet::Task { calendar: None }));

        item.set_facet(Facet::Task {
            calendar: Some(ICalendar::new("-//Test//EN")),
        });
        assert_eq!(item.facets.len(), 2);
        assert!(item.facet(FacetKind::Task).and_then(Facet::calendar).is_some());

        assert!(item.remove_facet(FacetKind::Note).is_some());
        assert!(!item.has_facet(FacetKind::Note));
    }

    #[test_log::test]
    fn triage_rank_round_trips_time() {
        let status = TriageStatus::initial(now());
        assert_eq!(status.code, TriageCode::Now);
        assert_eq!(status.ranked_at(), Some(now()));
        assert!(TriageStatus::rank_of(now()) < TriageStatus::rank_of(now() - chrono::TimeDelta::days(1)));
    }

    #[test_log::test]
    fn calendar_uid_prefers_ical_uid() {
        let mut item = Item::new("abc", now());
        assert_eq!(item.calendar_uid(), "abc");
        item.ical_uid = Some("event@example.com".to_string());
        assert_eq!(item.calendar_uid(), "event@example.com");
        assert_eq!(item.stamp_time(), now());
    }
}
