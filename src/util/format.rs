use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Format a timestamp as the fixed-width `YYYY-MM-DD_HH-MM-SS` form used in snapshot ids
pub fn format_snapshot_timestamp(dt: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    dt.format(&format).unwrap_or_else(|_| "unknown".to_string())
}

/// Check whether a string is a well-formed snapshot timestamp
pub fn is_snapshot_timestamp(s: &str) -> bool {
    let format = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    PrimitiveDateTime::parse(s, &format).is_ok()
}

/// Format a timestamp as RFC 3339, normalized to UTC
pub fn format_rfc3339(dt: OffsetDateTime) -> String {
    dt.to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Parse an RFC 3339 timestamp or a naive ISO-8601 one (interpreted as UTC)
pub fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(dt);
    }

    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    PrimitiveDateTime::parse(s, &naive)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(s: &str) -> Option<Date> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(s.trim(), &format).ok()
}

/// Format a calendar date as `YYYY-MM-DD`
pub fn format_date(date: Date) -> String {
    let format = format_description!("[year]-[month]-[day]");
    date.format(&format).unwrap_or_else(|_| "unknown".to_string())
}

/// Current time in the local offset, falling back to UTC when the offset is unknown
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
