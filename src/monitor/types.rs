use super::format::{format_pause, format_runtime};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RunState {
    #[default]
    Stopped,
    Starting,
    Moving,
}

impl RunState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Moving => "moving",
        }
    }
}

/// One evaluation input from the sample ingress. Exactly the channel that
/// fired is `Some`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampleFrame {
    pub now_ms: u64,
    pub digital: Option<bool>,
    pub analog: Option<f64>,
}

impl SampleFrame {
    pub const fn digital(now_ms: u64, state: bool) -> Self {
        Self {
            now_ms,
            digital: Some(state),
            analog: None,
        }
    }

    pub const fn analog(now_ms: u64, value: f64) -> Self {
        Self {
            now_ms,
            digital: None,
            analog: Some(value),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    Ok,
    Warn,
}

impl Severity {
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotificationKind {
    Started { pause_ms: Option<u64> },
    Stopped { runtime_ms: u64, quiet_ms: u64 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Notification {
    pub at_ms: u64,
    pub kind: NotificationKind,
}

impl Notification {
    pub const fn severity(&self) -> Severity {
        match self.kind {
            NotificationKind::Started { .. } => Severity::Ok,
            NotificationKind::Stopped { .. } => Severity::Warn,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self.kind {
            NotificationKind::Started { .. } => "started",
            NotificationKind::Stopped { .. } => "stopped",
        }
    }

    pub fn message(&self) -> String {
        match self.kind {
            NotificationKind::Started { pause_ms } => {
                format!("Mill started moving after {}", format_pause(pause_ms))
            }
            NotificationKind::Stopped { runtime_ms, .. } => {
                format!("Mill stopped, runtime {}", format_runtime(runtime_ms))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TransitionReason {
    #[default]
    None,
    VibrationDetected,
    StartConfirmed,
    FalseStart,
    SilenceTimeout,
}

impl TransitionReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::VibrationDetected => "vibration_detected",
            Self::StartConfirmed => "start_confirmed",
            Self::FalseStart => "false_start",
            Self::SilenceTimeout => "silence_timeout",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MonitorAction {
    StateChanged {
        from: RunState,
        to: RunState,
        reason: TransitionReason,
    },
    Notify(Notification),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ActionBuffer {
    len: usize,
    slots: [Option<MonitorAction>; Self::MAX],
}

impl ActionBuffer {
    pub const MAX: usize = 4;

    pub const fn new() -> Self {
        Self {
            len: 0,
            slots: [None; Self::MAX],
        }
    }

    pub fn push(&mut self, action: MonitorAction) {
        if self.len >= Self::MAX {
            return;
        }
        self.slots[self.len] = Some(action);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonitorAction> {
        self.slots[..self.len].iter().filter_map(Option::as_ref)
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.iter().filter_map(|action| match action {
            MonitorAction::Notify(notification) => Some(notification),
            MonitorAction::StateChanged { .. } => None,
        })
    }

    pub fn state_change(&self) -> Option<(RunState, RunState, TransitionReason)> {
        self.iter().find_map(|action| match action {
            MonitorAction::StateChanged { from, to, reason } => Some((*from, *to, *reason)),
            MonitorAction::Notify(_) => None,
        })
    }
}

impl Default for ActionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of the monitor context taken between evaluations.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MonitorSnapshot {
    pub state: RunState,
    pub last_digital: bool,
    pub last_analog: f64,
    pub last_sample_at_ms: Option<u64>,
    pub stopped_at_ms: Option<u64>,
    pub starting_at_ms: Option<u64>,
}

impl MonitorSnapshot {
    /// The start anchor is set exactly while a run is provisional or confirmed.
    pub fn is_consistent(&self) -> bool {
        match self.state {
            RunState::Stopped => self.starting_at_ms.is_none(),
            RunState::Starting | RunState::Moving => self.starting_at_ms.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_notification_is_a_warning_with_runtime() {
        let notification = Notification {
            at_ms: 20_000,
            kind: NotificationKind::Stopped {
                runtime_ms: 125_000,
                quiet_ms: 10_000,
            },
        };
        assert_eq!(notification.severity(), Severity::Warn);
        assert_eq!(notification.message(), "Mill stopped, runtime 2.08 minutes");
    }

    #[test]
    fn start_notification_reports_pause() {
        let notification = Notification {
            at_ms: 3_000,
            kind: NotificationKind::Started {
                pause_ms: Some(45_000),
            },
        };
        assert!(notification.severity().is_ok());
        assert_eq!(
            notification.message(),
            "Mill started moving after 45.00 seconds"
        );
    }

    #[test]
    fn action_buffer_drops_overflow() {
        let mut buffer = ActionBuffer::new();
        for _ in 0..ActionBuffer::MAX + 2 {
            buffer.push(MonitorAction::StateChanged {
                from: RunState::Stopped,
                to: RunState::Starting,
                reason: TransitionReason::VibrationDetected,
            });
        }
        assert_eq!(buffer.len(), ActionBuffer::MAX);
        assert_eq!(buffer.notifications().count(), 0);
    }
}
