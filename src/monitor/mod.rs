pub mod config;
pub mod format;
pub mod run_hsm;
pub mod trace;
pub mod types;

pub use config::MonitorThresholds;
pub use run_hsm::{MonitorOutput, RunMonitor};
pub use trace::MonitorTrace;
pub use types::{
    ActionBuffer, MonitorAction, MonitorSnapshot, Notification, NotificationKind, RunState,
    SampleFrame, Severity, TransitionReason,
};
