//! Background jobs.

pub mod reaper;
