//! Recurrence expansion: instance keys, the instance list builder, the
//! series-level expander and alarm triggers.

mod alarm;
mod builder;
mod expander;
mod instance;
mod key;
mod rule;

pub use alarm::{trigger_date, trigger_dates};
pub use builder::InstanceList;
pub use expander::{RecurrenceExpander, RecurrenceRange, master_and_overrides};
pub use instance::Instance;
pub use key::RecurrenceKey;
pub use rule::{RuleExpansion, expand_bounded_rule, expand_rule};
