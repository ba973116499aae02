//! iCalendar (RFC 5545) object model, parser and serializer.

pub mod build;
pub mod core;
pub mod parse;
