//! Timezone registry backed by the compiled tz database.

use chrono_tz::{TZ_VARIANTS, Tz};

use super::vtimezone::generate_vtimezone;
use crate::ical::core::Component;

/// Source of timezone definitions.
pub trait TimeZoneRegistry: Send + Sync {
    /// Looks a zone up by its exact identifier.
    fn get(&self, id: &str) -> Option<Tz>;

    /// Every identifier the registry knows.
    fn ids(&self) -> Box<dyn Iterator<Item = &'static str> + '_>;

    /// The canonical VTIMEZONE definition for a zone. Must be deterministic:
    /// two calls for the same zone return equal components.
    fn vtimezone(&self, tz: Tz) -> Component;
}

/// Registry over `chrono-tz`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChronoTzRegistry;

impl TimeZoneRegistry for ChronoTzRegistry {
    fn get(&self, id: &str) -> Option<Tz> {
        id.parse::<Tz>().ok()
    }

    fn ids(&self) -> Box<dyn Iterator<Item = &'static str> + '_> {
        Box::new(TZ_VARIANTS.iter().map(|tz| tz.name()))
    }

    fn vtimezone(&self, tz: Tz) -> Component {
        generate_vtimezone(tz)
    }
}
