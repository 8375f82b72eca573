use std::{
    io,
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{error, info, warn};

use super::queue::{
    publish_blocking, MonitorEvent, MonitorEventQueue, ShutdownReason, MONITOR_EVENTS,
};
use crate::sensor::{
    connect_with_retry, ReadOutcome, RetryPolicy, SensorError, SensorEvent, SensorSource,
};

/// Reads the sensor on its own OS thread; every event goes through the
/// shared monitor queue.
pub fn spawn_sensor_pump(source: SensorSource, retry: RetryPolicy) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("millwatch-sensor".to_string())
        .spawn(move || run_sensor_pump(&source, retry, &MONITOR_EVENTS, thread::sleep))
}

/// Returns once the source is gone for good, after publishing the matching
/// shutdown request.
pub fn run_sensor_pump<const N: usize, S>(
    source: &SensorSource,
    retry: RetryPolicy,
    queue: &MonitorEventQueue<N>,
    mut sleep: S,
) where
    S: FnMut(Duration),
{
    let target = source.to_string();
    let publish = |event: SensorEvent| publish_blocking(queue, MonitorEvent::Sensor(event));
    let shutdown = |reason: ShutdownReason| {
        publish_blocking(queue, MonitorEvent::Shutdown(reason));
    };

    loop {
        info!("opening {target}");
        let mut reader = match connect_with_retry(retry, &target, || source.open(), &mut sleep) {
            Ok(reader) => reader,
            Err(err) => {
                error!("{err}");
                shutdown(ShutdownReason::SensorLost);
                return;
            }
        };
        publish(SensorEvent::Attached {
            device: target.clone(),
        });

        loop {
            match reader.next_event() {
                Ok(ReadOutcome::Event(event)) => {
                    publish(event);
                }
                Ok(ReadOutcome::Idle) => {}
                Ok(ReadOutcome::EndOfStream) if source.reconnects() => {
                    publish(SensorEvent::Detached);
                    break;
                }
                Ok(ReadOutcome::EndOfStream) => {
                    info!("{target} reached end of input");
                    shutdown(ShutdownReason::InputClosed);
                    return;
                }
                Err(err @ SensorError::Parse { .. }) => warn!("{err}"),
                Err(err) => {
                    publish(SensorEvent::Fault {
                        description: err.to_string(),
                    });
                    publish(SensorEvent::Detached);
                    if !source.reconnects() {
                        shutdown(ShutdownReason::SensorLost);
                        return;
                    }
                    break;
                }
            }
        }
    }
}
