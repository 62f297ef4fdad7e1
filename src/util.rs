use chrono::{DateTime, LocalResult, TimeZone, Utc};

const FLOAT_TO_INT_MAX: f64 = 9007199254740991_f64;

/// Converts a float to an integer only while the float still carries integer precision
/// (magnitude up to 2**53 - 1). Larger values return None instead of saturating.
pub(crate) fn f64_to_i64_safe(f: f64) -> Option<i64> {
    if f.abs() <= FLOAT_TO_INT_MAX {
        Some(f as i64)
    } else {
        None
    }
}

pub(crate) fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    match Utc.timestamp_millis_opt(millis) {
        LocalResult::Single(time) => Some(time),
        LocalResult::None | LocalResult::Ambiguous(_, _) => None,
    }
}

pub(crate) fn is_false(b: &bool) -> bool {
    !(*b)
}
