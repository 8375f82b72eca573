use log::{debug, info, warn};

use crate::{monitor::SampleFrame, sensor::SensorEvent};

pub const DEFAULT_DIGITAL_CHANNEL: u8 = 7;
pub const DEFAULT_ANALOG_CHANNEL: u8 = 0;
pub const DEFAULT_ANALOG_MIN: f64 = 0.0;
pub const DEFAULT_ANALOG_MAX: f64 = 1_000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IngressConfig {
    pub digital_channel: u8,
    pub analog_channel: u8,
    pub analog_min: f64,
    pub analog_max: f64,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            digital_channel: DEFAULT_DIGITAL_CHANNEL,
            analog_channel: DEFAULT_ANALOG_CHANNEL,
            analog_min: DEFAULT_ANALOG_MIN,
            analog_max: DEFAULT_ANALOG_MAX,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IngressCounters {
    pub forwarded: u64,
    pub other_channel: u64,
    pub rejected_analog: u64,
    pub link_events: u64,
}

/// Turns raw sensor events into monitor samples. Only the configured
/// channels pass; everything else is logged and dropped here so the engine
/// never sees it.
#[derive(Debug, Default)]
pub struct SampleIngress {
    config: IngressConfig,
    counters: IngressCounters,
}

impl SampleIngress {
    pub fn new(config: IngressConfig) -> Self {
        Self {
            config,
            counters: IngressCounters::default(),
        }
    }

    pub fn counters(&self) -> IngressCounters {
        self.counters
    }

    pub fn adapt(&mut self, event: &SensorEvent, now_ms: u64) -> Option<SampleFrame> {
        match *event {
            SensorEvent::DigitalChanged { index, state } => {
                debug!("din {index} -> {}", u8::from(state));
                if index != self.config.digital_channel {
                    self.counters.other_channel += 1;
                    debug!("ignoring digital channel {index}");
                    return None;
                }
                self.counters.forwarded += 1;
                Some(SampleFrame::digital(now_ms, state))
            }
            SensorEvent::AnalogChanged { index, value } => {
                debug!("ain {index} -> {value}");
                if index != self.config.analog_channel {
                    self.counters.other_channel += 1;
                    debug!("ignoring analog channel {index}");
                    return None;
                }
                if !value.is_finite()
                    || value < self.config.analog_min
                    || value > self.config.analog_max
                {
                    self.counters.rejected_analog += 1;
                    warn!(
                        "dropping analog reading {value} outside [{}, {}]",
                        self.config.analog_min, self.config.analog_max
                    );
                    return None;
                }
                self.counters.forwarded += 1;
                Some(SampleFrame::analog(now_ms, value))
            }
            SensorEvent::Attached { ref device } => {
                self.counters.link_events += 1;
                info!("sensor attached: {device}");
                None
            }
            SensorEvent::Detached => {
                self.counters.link_events += 1;
                warn!("sensor detached");
                None
            }
            SensorEvent::Fault { ref description } => {
                self.counters.link_events += 1;
                warn!("sensor fault: {description}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_configured_channels() {
        let mut ingress = SampleIngress::default();

        let digital = ingress.adapt(
            &SensorEvent::DigitalChanged {
                index: 7,
                state: true,
            },
            1_200,
        );
        assert_eq!(digital, Some(SampleFrame::digital(1_200, true)));

        let analog = ingress.adapt(
            &SensorEvent::AnalogChanged {
                index: 0,
                value: 412.0,
            },
            1_300,
        );
        assert_eq!(analog, Some(SampleFrame::analog(1_300, 412.0)));
        assert_eq!(ingress.counters().forwarded, 2);
    }

    #[test]
    fn drops_other_channels() {
        let mut ingress = SampleIngress::default();

        assert_eq!(
            ingress.adapt(
                &SensorEvent::DigitalChanged {
                    index: 3,
                    state: true
                },
                10
            ),
            None
        );
        assert_eq!(
            ingress.adapt(
                &SensorEvent::AnalogChanged {
                    index: 1,
                    value: 5.0
                },
                20
            ),
            None
        );
        assert_eq!(ingress.counters().other_channel, 2);
    }

    #[test]
    fn rejects_invalid_analog_values() {
        let mut ingress = SampleIngress::new(IngressConfig {
            analog_max: 500.0,
            ..IngressConfig::default()
        });

        for value in [f64::NAN, f64::INFINITY, -1.0, 500.5] {
            let event = SensorEvent::AnalogChanged { index: 0, value };
            assert_eq!(ingress.adapt(&event, 0), None, "{value} should be rejected");
        }
        assert_eq!(ingress.counters().rejected_analog, 4);

        let edge = SensorEvent::AnalogChanged {
            index: 0,
            value: 500.0,
        };
        assert!(ingress.adapt(&edge, 0).is_some());
    }

    #[test]
    fn link_events_never_reach_the_engine() {
        let mut ingress = SampleIngress::default();
        let events = [
            SensorEvent::Attached {
                device: "bridge 1018".to_string(),
            },
            SensorEvent::Fault {
                description: "overcurrent".to_string(),
            },
            SensorEvent::Detached,
        ];
        for event in &events {
            assert_eq!(ingress.adapt(event, 0), None);
        }
        assert_eq!(ingress.counters().link_events, 3);
        assert_eq!(ingress.counters().forwarded, 0);
    }
}
