//! Timezone registry, alias table, identifier resolution and floating-time
//! normalization.

mod alias;
mod moment;
mod registry;
mod translator;
mod vtimezone;

pub use alias::TimeZoneAliasTable;
pub use chrono_tz::Tz;
pub use moment::{
    Moment, Span, after, before, compare, equal, localize, normalize_utc_to_local_date,
    normalize_utc_to_local_wallclock, pin, to_utc,
};
pub use registry::{ChronoTzRegistry, TimeZoneRegistry};
pub use translator::TimeZoneTranslator;
pub use vtimezone::generate_vtimezone;
