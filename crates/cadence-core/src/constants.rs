/// Product identifier stamped on calendars built from scratch.
pub const PRODUCT_ID: &str = "-//Cadence//Calendar Core//EN";

pub const ICALENDAR_VERSION: &str = "2.0";
pub const CALSCALE_GREGORIAN: &str = "GREGORIAN";

/// Vendor property/parameter prefix shared with legacy clients.
pub const VENDOR_PREFIX: &str = "X-OSAF-";

/// Marks an event as "any time" (a date without a meaningful time of day).
pub const PARAM_ANYTIME: &str = const_str::concat!(VENDOR_PREFIX, "ANYTIME");

/// Marks an event as starred, which maps to a task facet.
pub const PROP_STARRED: &str = const_str::concat!(VENDOR_PREFIX, "STARRED");

/// Placed on a VALARM TRIGGER to say the modification has no alarm of its own.
pub const PARAM_MISSING: &str = const_str::concat!(VENDOR_PREFIX, "MISSING");

/// Value of [`PARAM_ANYTIME`] saying the modification inherits the master's flag.
pub const ANYTIME_MISSING: &str = "MISSING";

/// Description given to display alarms created from a reminder time.
pub const DEFAULT_ALARM_DESCRIPTION: &str = "Event Reminder";

/// Longest display name copied out of a SUMMARY.
pub const MAX_DISPLAY_NAME_LEN: usize = 1024;
