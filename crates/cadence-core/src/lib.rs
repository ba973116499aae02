//! Shared configuration, errors and constants for the Cadence calendaring core.

pub mod config;
pub mod constants;
pub mod error;
