use std::fmt;

use time::{Date, OffsetDateTime, UtcOffset};

use crate::util::format_date;

/// Inclusive calendar-date bounds; a missing bound is open
///
/// Timestamps are compared on their UTC calendar date, so a record at
/// 23:59 on `end` is inside the range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<Date>,
    pub end: Option<Date>,
}

impl DateRange {
    /// No bounds: all data
    pub const fn all() -> Self {
        Self { start: None, end: None }
    }

    pub const fn new(start: Option<Date>, end: Option<Date>) -> Self {
        Self { start, end }
    }

    pub const fn between(start: Date, end: Date) -> Self {
        Self { start: Some(start), end: Some(end) }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains_date(&self, date: Date) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.contains_date(utc_date(at))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |d: Option<Date>| d.map(format_date).unwrap_or_else(|| "..".to_string());
        write!(f, "[{}, {}]", bound(self.start), bound(self.end))
    }
}

/// Calendar date of a timestamp in UTC
pub fn utc_date(at: OffsetDateTime) -> Date {
    at.to_offset(UtcOffset::UTC).date()
}
