pub mod line;
pub mod retry;
pub mod source;

use thiserror::Error;

pub use line::{parse_sensor_line, SensorLine};
pub use retry::{connect_with_retry, RetryPolicy};
pub use source::{ReadOutcome, SensorReader, SensorSource};

/// Raw notification from the sensor interface. Channel changes arrive
/// unpaired and at arbitrary times.
#[derive(Clone, Debug, PartialEq)]
pub enum SensorEvent {
    DigitalChanged { index: u8, state: bool },
    AnalogChanged { index: u8, value: f64 },
    Attached { device: String },
    Detached,
    Fault { description: String },
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("invalid sensor line `{line}`: {reason}")]
    Parse { line: String, reason: String },
    #[error("failed to open {target}: {reason}")]
    Open { target: String, reason: String },
    #[error("sensor read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("gave up on {target} after {attempts} attempts")]
    RetriesExhausted { target: String, attempts: u32 },
}
