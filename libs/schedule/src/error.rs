//! Error types for schedule parsing.

use thiserror::Error;

/// Errors that can occur when parsing schedule values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The weekday name is not recognised.
    #[error("invalid weekday: '{0}'")]
    InvalidWeekday(String),

    /// The time of day is not a zero-padded 24-hour `HH:MM`.
    #[error("invalid time of day: '{0}' (expected zero-padded HH:MM)")]
    InvalidTime(String),

    /// The UTC offset could not be parsed.
    #[error("invalid UTC offset: '{0}' (expected e.g. +06:00)")]
    InvalidOffset(String),
}
