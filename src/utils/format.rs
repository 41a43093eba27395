//! Display formatting helpers

use chrono::{DateTime, Local, TimeZone, Utc};

/// Truncate to `max_len` characters, ending in `...` when cut.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len < 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Format a step duration: `120ms`, `1.4s`, `2m 03s`, `1h 05m`.
pub fn format_duration_ms(ms: u64) -> String {
    const SECOND: u64 = 1_000;
    const MINUTE: u64 = 60 * SECOND;
    const HOUR: u64 = 60 * MINUTE;

    if ms < SECOND {
        format!("{ms}ms")
    } else if ms < MINUTE {
        let tenths = (ms + 50) / 100;
        if tenths >= 600 {
            return "1m 00s".to_string();
        }
        format!("{}.{}s", tenths / 10, tenths % 10)
    } else if ms < HOUR {
        let secs = ms / SECOND;
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        let mins = ms / MINUTE;
        format!("{}h {:02}m", mins / 60, mins % 60)
    }
}

/// Epoch milliseconds rendered in local time, or `-` when out of range.
pub fn format_timestamp_ms(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|utc: DateTime<Utc>| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

/// Elapsed time between two epoch-millisecond timestamps.
pub fn elapsed_ms(start: i64, end: i64) -> Option<u64> {
    u64::try_from(end.checked_sub(start)?).ok()
}
