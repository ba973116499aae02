//! iCalendar model, timezone resolution and value codecs for the Cadence
//! calendaring core.

pub mod codec;
pub mod error;
pub mod ical;
pub mod tz;
