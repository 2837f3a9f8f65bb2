use std::time::{SystemTime, UNIX_EPOCH};

/// Current UNIX time in milliseconds, the resolution used to pair odd and
/// even CPR frames.
pub fn now_in_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
