use cadence_rfc::tz::Moment;

use super::key::RecurrenceKey;

/// One concrete occurrence of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Original, unshifted start of the occurrence.
    pub recurrence_id: Moment,
    pub start: Moment,
    pub end: Moment,
    /// Produced by an override component rather than the master's rules.
    pub overridden: bool,
    /// Shifted by a THISANDFUTURE override.
    pub future: bool,
}

impl Instance {
    /// An occurrence generated by the master, identified by its own start.
    #[must_use]
    pub fn new(start: Moment, end: Moment) -> Self {
        Self {
            recurrence_id: start,
            start,
            end,
            overridden: false,
            future: false,
        }
    }

    #[must_use]
    pub fn key(&self) -> RecurrenceKey {
        RecurrenceKey::from_moment(&self.recurrence_id)
    }
}
