use chrono::Utc;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// `true` iff `now - window_ms <= timestamp_ms <= now`.
pub fn is_fresh(timestamp_ms: i64, window_ms: i64) -> bool {
    is_fresh_at(now_ms(), timestamp_ms, window_ms)
}

/// Same check against an explicit clock reading.
pub fn is_fresh_at(now_ms: i64, timestamp_ms: i64, window_ms: i64) -> bool {
    if window_ms < 0 {
        return false;
    }
    timestamp_ms <= now_ms && timestamp_ms >= now_ms.saturating_sub(window_ms)
}
