use log::{debug, info};

use super::queue::{MonitorEvent, ShutdownReason};
use crate::{
    ingress::SampleIngress,
    monitor::{
        MonitorOutput, MonitorThresholds, RunMonitor, RunState, Severity, TransitionReason,
    },
    notify::Notifier,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoopControl {
    Continue,
    Shutdown(ShutdownReason),
}

/// Owns the engine and everything it talks to. Runs on exactly one task, so
/// sample and tick evaluations never interleave.
pub struct MonitorLoop {
    monitor: RunMonitor,
    ingress: SampleIngress,
    notifier: Notifier,
}

impl MonitorLoop {
    pub fn new(thresholds: MonitorThresholds, ingress: SampleIngress, notifier: Notifier) -> Self {
        Self {
            monitor: RunMonitor::new(thresholds),
            ingress,
            notifier,
        }
    }

    pub fn monitor(&self) -> &RunMonitor {
        &self.monitor
    }

    pub fn ingress(&self) -> &SampleIngress {
        &self.ingress
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn announce_start(&mut self) {
        let message = format!("{} monitor START", self.notifier.app_name());
        self.notifier.notify(&message, Severity::Ok);
        info!("listening for inputs");
    }

    pub fn handle_event(&mut self, event: MonitorEvent, now_ms: u64) -> LoopControl {
        match event {
            MonitorEvent::Sensor(sensor_event) => {
                if let Some(frame) = self.ingress.adapt(&sensor_event, now_ms) {
                    let output = self.monitor.sample(frame);
                    self.apply(output);
                }
                LoopControl::Continue
            }
            MonitorEvent::Shutdown(reason) => LoopControl::Shutdown(reason),
        }
    }

    pub fn handle_tick(&mut self, now_ms: u64) {
        let output = self.monitor.tick(now_ms);
        self.apply(output);
    }

    pub fn finish(self, reason: ShutdownReason) {
        let Self { mut notifier, .. } = self;
        info!("closing ({})", reason.label());
        let message = format!("{} monitor STOPPED ({})", notifier.app_name(), reason.label());
        notifier.notify(&message, Severity::Warn);
        notifier.close();
    }

    fn apply(&mut self, output: MonitorOutput) {
        if let Some((from, to, reason)) = output.actions.state_change() {
            info!("{}", transition_line(to, reason));
            debug!(
                "state {} -> {} ({}) silence={:?}ms analog={}",
                from.label(),
                to.label(),
                reason.label(),
                output.trace.silence_ms,
                output.trace.last_analog
            );
        }
        for notification in output.actions.notifications() {
            self.notifier
                .notify(&notification.message(), notification.severity());
        }
    }
}

fn transition_line(to: RunState, reason: TransitionReason) -> &'static str {
    match (to, reason) {
        (RunState::Starting, _) => "started moving - wait to see if this is real",
        (RunState::Moving, _) => "moving consistently",
        (RunState::Stopped, TransitionReason::FalseStart) => {
            "false alarm - not moving consistently"
        }
        (RunState::Stopped, _) => "mill stopped",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ingress::IngressConfig,
        notify::{
            testing::{RecordingTransport, SentMessage},
            NotifierConfig,
        },
        sensor::SensorEvent,
    };

    fn analog(value: f64) -> MonitorEvent {
        MonitorEvent::Sensor(SensorEvent::AnalogChanged { index: 0, value })
    }

    fn monitor_loop(transport: RecordingTransport) -> MonitorLoop {
        MonitorLoop::new(
            MonitorThresholds::default(),
            SampleIngress::new(IngressConfig::default()),
            Notifier::new(NotifierConfig::default(), Box::new(transport)),
        )
    }

    // Samples every 200ms over [start_ms, end_ms], ticks every 500ms up to
    // `until_ms`, in timestamp order with samples first on ties.
    fn drive(monitor_loop: &mut MonitorLoop, start_ms: u64, end_ms: u64, until_ms: u64) {
        let mut next_sample = start_ms;
        let mut next_tick = 500;
        while next_tick <= until_ms {
            if next_sample <= end_ms && next_sample <= next_tick {
                monitor_loop.handle_event(analog(300.0), next_sample);
                next_sample += 200;
            } else {
                monitor_loop.handle_tick(next_tick);
                next_tick += 500;
            }
        }
    }

    #[test]
    fn full_run_sends_start_and_stop_pushes() {
        let transport = RecordingTransport::default();
        let mut monitor_loop = monitor_loop(transport.clone());

        monitor_loop.announce_start();
        drive(&mut monitor_loop, 1_000, 8_000, 20_000);
        monitor_loop.finish(ShutdownReason::Signal);

        assert_eq!(
            transport.messages(),
            vec![
                SentMessage {
                    title: "OtherMill OK".to_string(),
                    message: "OtherMill monitor START".to_string(),
                    severity: Severity::Ok,
                },
                SentMessage {
                    title: "OtherMill OK".to_string(),
                    message: "Mill started moving after awhile".to_string(),
                    severity: Severity::Ok,
                },
                SentMessage {
                    title: "OtherMill !WARN!".to_string(),
                    message: "Mill stopped, runtime 17.00 seconds".to_string(),
                    severity: Severity::Warn,
                },
                SentMessage {
                    title: "OtherMill !WARN!".to_string(),
                    message: "OtherMill monitor STOPPED (signal)".to_string(),
                    severity: Severity::Warn,
                },
            ]
        );
    }

    #[test]
    fn failing_transport_does_not_change_progress() {
        let recording = RecordingTransport::default();
        let failing = RecordingTransport::failing();
        let mut healthy_loop = monitor_loop(recording.clone());
        let mut failing_loop = monitor_loop(failing.clone());

        drive(&mut healthy_loop, 1_000, 8_000, 20_000);
        drive(&mut failing_loop, 1_000, 8_000, 20_000);

        assert_eq!(healthy_loop.monitor().snapshot(), failing_loop.monitor().snapshot());
        assert_eq!(failing_loop.monitor().state(), RunState::Stopped);
        assert_eq!(recording.messages(), failing.messages());
        assert_eq!(failing_loop.notifier().counters().failed, 2);
    }

    #[test]
    fn termination_signal_sends_the_stopped_push() {
        let transport = RecordingTransport::default();
        let mut monitor_loop = monitor_loop(transport.clone());

        let control =
            monitor_loop.handle_event(MonitorEvent::Shutdown(ShutdownReason::Signal), 100);
        assert_eq!(control, LoopControl::Shutdown(ShutdownReason::Signal));
        monitor_loop.finish(ShutdownReason::Signal);

        let messages = transport.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message, "OtherMill monitor STOPPED (signal)");
        assert_eq!(messages[0].severity, Severity::Warn);
    }

    #[test]
    fn shutdown_event_stops_the_loop() {
        let mut monitor_loop = monitor_loop(RecordingTransport::default());
        assert_eq!(
            monitor_loop.handle_event(analog(10.0), 100),
            LoopControl::Continue
        );
        assert_eq!(
            monitor_loop.handle_event(MonitorEvent::Shutdown(ShutdownReason::InputClosed), 200),
            LoopControl::Shutdown(ShutdownReason::InputClosed)
        );
        assert_eq!(monitor_loop.monitor().state(), RunState::Starting);
    }

    #[test]
    fn ignored_channels_do_not_start_a_run() {
        let mut monitor_loop = monitor_loop(RecordingTransport::default());
        monitor_loop.handle_event(
            MonitorEvent::Sensor(SensorEvent::AnalogChanged {
                index: 3,
                value: 200.0,
            }),
            100,
        );
        assert_eq!(monitor_loop.monitor().state(), RunState::Stopped);
        assert_eq!(monitor_loop.ingress().counters().other_channel, 1);
    }
}
