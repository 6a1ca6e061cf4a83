mod format;

pub use format::{
    format_date, format_rfc3339, format_snapshot_timestamp, is_snapshot_timestamp, now_local,
    parse_date, parse_timestamp,
};
