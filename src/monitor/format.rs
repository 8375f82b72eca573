//! Human-readable durations for notification messages.
//!
//! A pause longer than an hour is reported as "awhile"; runtimes scale up to
//! hours.

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 60.0 * 60.0;
const PAUSE_AWHILE_AFTER_S: f64 = SECONDS_PER_HOUR;
const RUNTIME_MINUTES_AFTER_S: f64 = SECONDS_PER_MINUTE;
const RUNTIME_HOURS_AFTER_S: f64 = 3.0 * SECONDS_PER_HOUR;

fn seconds(ms: u64) -> f64 {
    ms as f64 / 1_000.0
}

/// Formats the idle time before a confirmed start. `None` means the mill has
/// not stopped since the monitor came up.
pub fn format_pause(pause_ms: Option<u64>) -> String {
    match pause_ms.map(seconds) {
        Some(pause_s) if pause_s < PAUSE_AWHILE_AFTER_S => format!("{pause_s:.2} seconds"),
        _ => "awhile".to_string(),
    }
}

pub fn format_runtime(runtime_ms: u64) -> String {
    let runtime_s = seconds(runtime_ms);
    if runtime_s < RUNTIME_MINUTES_AFTER_S {
        format!("{runtime_s:.2} seconds")
    } else if runtime_s < RUNTIME_HOURS_AFTER_S {
        format!("{:.2} minutes", runtime_s / SECONDS_PER_MINUTE)
    } else {
        format!("{:.2} hours", runtime_s / SECONDS_PER_HOUR)
    }
}
