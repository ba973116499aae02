//! iCalendar core models (RFC 5545).
//!
//! Documents are plain values: cloning a component yields an independent
//! copy, so a stored calendar and one derived from it never alias.

mod component;
mod datetime;
mod duration;
mod parameter;
mod property;
mod recur;
mod value;

pub use component::{Component, ComponentKind, ICalendar};
pub use datetime::{DateTime, DateTimeForm, UtcOffset};
pub use duration::Duration;
pub use parameter::Parameter;
pub use property::{Property, names};
pub use recur::{Frequency, Recur, RecurUntil, Weekday, WeekdayNum};
pub use value::{Period, Value};
