//! Recurrence expansion, the item model and calendar/item reconciliation
//! for the Cadence calendaring core.

pub mod component;
pub mod error;
pub mod item;
pub mod recurrence;
pub mod reconcile;
