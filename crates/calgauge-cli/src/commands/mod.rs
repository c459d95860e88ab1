//! Command implementations.

pub mod calendars;
pub mod config;
pub mod serve;
