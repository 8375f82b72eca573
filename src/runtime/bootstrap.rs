use anyhow::{Context, Result};
use embassy_executor::Executor;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Ticker};
use log::info;
use static_cell::StaticCell;

use super::{
    monitor_loop::{LoopControl, MonitorLoop},
    queue::{publish_blocking, MonitorEvent, ShutdownReason, MONITOR_EVENTS},
    sensor_pump::spawn_sensor_pump,
};
use crate::{config::MillwatchConfig, ingress::SampleIngress, notify::build_notifier};

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

/// Wires the sensor thread, signal handler and monitor task together and
/// hands the current thread to the executor. Only returns on a setup error;
/// shutdown exits the process from inside the monitor task.
pub fn run(config: &MillwatchConfig) -> Result<()> {
    let source = config.sensor.sensor_source()?;
    let notifier = build_notifier(&config.notify).context("failed to set up notifier")?;
    let monitor_loop = MonitorLoop::new(
        config.timing.thresholds(),
        SampleIngress::new(config.sensor.ingress()),
        notifier,
    );
    let tick_interval_ms = config.timing.tick_interval_ms;

    // SIGINT, SIGTERM and SIGHUP all land here (ctrlc `termination` feature).
    ctrlc::set_handler(|| {
        publish_blocking(&MONITOR_EVENTS, MonitorEvent::Shutdown(ShutdownReason::Signal));
    })
    .context("failed to install signal handler")?;

    info!("sensor source: {source}");
    spawn_sensor_pump(source, config.sensor.retry).context("failed to start sensor thread")?;

    let executor = EXECUTOR.init(Executor::new());
    executor.run(move |spawner| {
        spawner.must_spawn(monitor_task(monitor_loop, tick_interval_ms));
    })
}

#[embassy_executor::task]
async fn monitor_task(mut monitor_loop: MonitorLoop, tick_interval_ms: u64) {
    let epoch = Instant::now();
    monitor_loop.announce_start();
    let mut ticker = Ticker::every(Duration::from_millis(tick_interval_ms));

    loop {
        let next = select(MONITOR_EVENTS.receive(), ticker.next()).await;
        let now_ms = epoch.elapsed().as_millis();
        match next {
            Either::First(event) => {
                if let LoopControl::Shutdown(reason) = monitor_loop.handle_event(event, now_ms) {
                    monitor_loop.finish(reason);
                    log::logger().flush();
                    let code = match reason {
                        ShutdownReason::Signal | ShutdownReason::InputClosed => 0,
                        ShutdownReason::SensorLost => 2,
                    };
                    std::process::exit(code);
                }
            }
            Either::Second(()) => monitor_loop.handle_tick(now_ms),
        }
    }
}
