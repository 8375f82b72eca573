//! Offline replay of recorded sensor traces on a virtual clock.
//!
//! Trace lines use the sensor line protocol with a mandatory leading
//! millisecond offset. Ticks fire at every multiple of the tick interval; an
//! event and a tick with the same timestamp are applied event first, the
//! same order the live loop sees when both are ready.

use std::{fmt, fs, path::Path};

use thiserror::Error;

use crate::{
    config::MillwatchConfig,
    ingress::{IngressConfig, SampleIngress},
    monitor::{
        MonitorOutput, MonitorThresholds, RunMonitor, RunState, Severity, TransitionReason,
    },
    sensor::{parse_sensor_line, SensorError, SensorEvent},
};

/// Longest trace offset accepted, and the longest tail ticked after the last
/// event: one week of virtual time.
pub const MAX_TRACE_OFFSET_MS: u64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Clone, Debug, PartialEq)]
pub struct TimedSensorEvent {
    pub at_ms: u64,
    pub event: SensorEvent,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read trace {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line_no}: {source}")]
    Parse {
        line_no: usize,
        #[source]
        source: SensorError,
    },
    #[error("line {line_no}: missing millisecond offset")]
    MissingTimestamp { line_no: usize },
    #[error("line {line_no}: offset {at_ms} exceeds {MAX_TRACE_OFFSET_MS}ms")]
    OffsetTooLarge { line_no: usize, at_ms: u64 },
    #[error("line {line_no}: offset {at_ms} goes back in time (previous {previous_ms})")]
    OutOfOrder {
        line_no: usize,
        at_ms: u64,
        previous_ms: u64,
    },
}

pub fn parse_trace(raw: &str) -> Result<Vec<TimedSensorEvent>, ReplayError> {
    let mut events = Vec::new();
    let mut previous_ms = 0u64;
    for (idx, line) in raw.lines().enumerate() {
        let line_no = idx + 1;
        let parsed =
            parse_sensor_line(line).map_err(|source| ReplayError::Parse { line_no, source })?;
        let Some(parsed) = parsed else {
            continue;
        };
        let at_ms = parsed
            .offset_ms
            .ok_or(ReplayError::MissingTimestamp { line_no })?;
        if at_ms > MAX_TRACE_OFFSET_MS {
            return Err(ReplayError::OffsetTooLarge { line_no, at_ms });
        }
        if at_ms < previous_ms {
            return Err(ReplayError::OutOfOrder {
                line_no,
                at_ms,
                previous_ms,
            });
        }
        previous_ms = at_ms;
        events.push(TimedSensorEvent {
            at_ms,
            event: parsed.event,
        });
    }
    Ok(events)
}

pub fn load_trace(path: &Path) -> Result<Vec<TimedSensorEvent>, ReplayError> {
    let raw = fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_trace(&raw)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReplaySettings {
    pub thresholds: MonitorThresholds,
    pub tick_interval_ms: u64,
    pub ingress: IngressConfig,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self::from_config(&MillwatchConfig::default())
    }
}

impl ReplaySettings {
    pub fn from_config(config: &MillwatchConfig) -> Self {
        Self {
            thresholds: config.timing.thresholds(),
            tick_interval_ms: config.timing.tick_interval_ms.max(1),
            ingress: config.sensor.ingress(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayRecord {
    Transition {
        at_ms: u64,
        from: RunState,
        to: RunState,
        reason: TransitionReason,
    },
    Notify {
        at_ms: u64,
        kind: &'static str,
        severity: Severity,
        message: String,
    },
}

impl fmt::Display for ReplayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transition { at_ms, from, to, .. } => {
                write!(f, "transition,{at_ms},{},{}", from.label(), to.label())
            }
            Self::Notify {
                at_ms,
                severity,
                message,
                ..
            } => write!(f, "notify,{at_ms},{},{message}", severity.label()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub records: Vec<ReplayRecord>,
    pub final_state: RunState,
}

impl ReplayReport {
    /// `started`/`stopped` labels in delivery order.
    pub fn notification_kinds(&self) -> Vec<&'static str> {
        self.records
            .iter()
            .filter_map(|record| match record {
                ReplayRecord::Notify { kind, .. } => Some(*kind),
                ReplayRecord::Transition { .. } => None,
            })
            .collect()
    }

    pub fn notification_messages(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter_map(|record| match record {
                ReplayRecord::Notify { message, .. } => Some(message.as_str()),
                ReplayRecord::Transition { .. } => None,
            })
            .collect()
    }

    fn absorb(&mut self, output: MonitorOutput) {
        if let Some((from, to, reason)) = output.actions.state_change() {
            self.records.push(ReplayRecord::Transition {
                at_ms: output.trace.now_ms,
                from,
                to,
                reason,
            });
        }
        for notification in output.actions.notifications() {
            self.records.push(ReplayRecord::Notify {
                at_ms: notification.at_ms,
                kind: notification.label(),
                severity: notification.severity(),
                message: notification.message(),
            });
        }
    }
}

/// Runs the trace through ingress and the engine, then keeps ticking long
/// enough for any open run to time out. The tail is capped at
/// [`MAX_TRACE_OFFSET_MS`] past the last event.
pub fn replay_trace(events: &[TimedSensorEvent], settings: &ReplaySettings) -> ReplayReport {
    let mut ingress = SampleIngress::new(settings.ingress);
    let mut monitor = RunMonitor::new(settings.thresholds);
    let mut report = ReplayReport::default();
    let interval = settings.tick_interval_ms.max(1);
    let mut next_tick = interval;

    for timed in events {
        while next_tick < timed.at_ms {
            report.absorb(monitor.tick(next_tick));
            next_tick = next_tick.saturating_add(interval);
        }
        if let Some(frame) = ingress.adapt(&timed.event, timed.at_ms) {
            report.absorb(monitor.sample(frame));
        }
    }

    if let Some(last) = events.last() {
        let thresholds = settings.thresholds;
        let horizon = thresholds
            .stop_time_ms
            .max(thresholds.start_timeout_ms)
            .saturating_add(interval)
            .min(MAX_TRACE_OFFSET_MS);
        let tail_end = last.at_ms.saturating_add(horizon);
        while next_tick <= tail_end && monitor.state() != RunState::Stopped {
            report.absorb(monitor.tick(next_tick));
            match next_tick.checked_add(interval) {
                Some(tick) => next_tick = tick,
                None => break,
            }
        }
    }

    report.final_state = monitor.state();
    report
}
