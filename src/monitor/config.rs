pub const DEFAULT_STOP_TIME_MS: u64 = 10_000;
pub const DEFAULT_START_TIME_MS: u64 = 3_000;
pub const DEFAULT_START_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;

/// Debounce thresholds for the run-state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MonitorThresholds {
    /// Silence in `Moving` before the mill counts as stopped.
    pub stop_time_ms: u64,
    /// Time since entering `Starting` before the run is confirmed.
    pub start_time_ms: u64,
    /// Silence in `Starting` before the start is discarded as a false alarm.
    pub start_timeout_ms: u64,
}

impl Default for MonitorThresholds {
    fn default() -> Self {
        Self {
            stop_time_ms: DEFAULT_STOP_TIME_MS,
            start_time_ms: DEFAULT_START_TIME_MS,
            start_timeout_ms: DEFAULT_START_TIMEOUT_MS,
        }
    }
}
