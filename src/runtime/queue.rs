use std::{thread, time::Duration};

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, TrySendError},
};
use log::warn;

use crate::sensor::SensorEvent;

pub const MONITOR_EVENT_QUEUE_DEPTH: usize = 32;

const PUBLISH_RETRY_MS: u64 = 5;
// Rides out a consumer stall of ~200ms before the event is dropped.
const PUBLISH_MAX_RETRIES: u8 = 40;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShutdownReason {
    Signal,
    SensorLost,
    InputClosed,
}

impl ShutdownReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Signal => "signal",
            Self::SensorLost => "sensor lost",
            Self::InputClosed => "input closed",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MonitorEvent {
    Sensor(SensorEvent),
    Shutdown(ShutdownReason),
}

pub type MonitorEventQueue<const N: usize> = Channel<CriticalSectionRawMutex, MonitorEvent, N>;

/// Single entry point from producer threads into the monitor task.
pub static MONITOR_EVENTS: MonitorEventQueue<MONITOR_EVENT_QUEUE_DEPTH> = Channel::new();

/// Enqueues from a plain thread, sleeping between attempts while the queue
/// is full. Returns `false` if the event was dropped.
pub fn publish_blocking<const N: usize>(queue: &MonitorEventQueue<N>, event: MonitorEvent) -> bool {
    let mut pending = event;
    for attempt in 0..=PUBLISH_MAX_RETRIES {
        match queue.try_send(pending) {
            Ok(()) => return true,
            Err(TrySendError::Full(returned)) => pending = returned,
        }
        if attempt == PUBLISH_MAX_RETRIES {
            break;
        }
        thread::sleep(Duration::from_millis(PUBLISH_RETRY_MS));
    }
    warn!("monitor queue full, dropping {pending:?}");
    false
}
