use crate::monitor::types::{RunState, TransitionReason};

/// Diagnostics for the most recent evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MonitorTrace {
    pub now_ms: u64,
    pub state: RunState,
    pub reason: TransitionReason,
    pub from_sample: bool,
    pub silence_ms: Option<u64>,
    pub last_digital: bool,
    pub last_analog: f64,
}
