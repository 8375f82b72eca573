use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use super::{
    config::MonitorThresholds,
    trace::MonitorTrace,
    types::{
        ActionBuffer, MonitorAction, MonitorSnapshot, Notification, NotificationKind, RunState,
        SampleFrame, TransitionReason,
    },
};

#[derive(Clone, Copy, Debug)]
enum RunHsmEvent {
    Sample(SampleFrame),
    Tick { now_ms: u64 },
}

#[derive(Default)]
struct DispatchContext {
    actions: ActionBuffer,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MonitorOutput {
    pub actions: ActionBuffer,
    pub trace: MonitorTrace,
}

/// Debounced stopped/starting/moving classifier.
///
/// Sample arrival is the evidence of vibration and starts a run; silence
/// measured on the periodic tick ends it. Every call is a complete
/// evaluation, so a caller that serializes `sample` and `tick` never observes
/// a partially applied transition.
pub struct RunMonitor {
    machine: statig::blocking::StateMachine<RunHsm>,
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(MonitorThresholds::default())
    }
}

impl RunMonitor {
    pub fn new(thresholds: MonitorThresholds) -> Self {
        Self {
            machine: RunHsm::new(thresholds).state_machine(),
        }
    }

    pub fn sample(&mut self, frame: SampleFrame) -> MonitorOutput {
        self.dispatch(RunHsmEvent::Sample(frame))
    }

    pub fn tick(&mut self, now_ms: u64) -> MonitorOutput {
        self.dispatch(RunHsmEvent::Tick { now_ms })
    }

    pub fn state(&self) -> RunState {
        self.machine.inner().state
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let hsm = self.machine.inner();
        MonitorSnapshot {
            state: hsm.state,
            last_digital: hsm.last_digital,
            last_analog: hsm.last_analog,
            last_sample_at_ms: hsm.last_sample_at_ms,
            stopped_at_ms: hsm.stopped_at_ms,
            starting_at_ms: hsm.starting_at_ms,
        }
    }

    fn dispatch(&mut self, event: RunHsmEvent) -> MonitorOutput {
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        MonitorOutput {
            actions: context.actions,
            trace: self.machine.inner().last_trace,
        }
    }
}

struct RunHsm {
    thresholds: MonitorThresholds,
    state: RunState,
    last_digital: bool,
    last_analog: f64,
    // Refreshed by the analog channel only; digital edges do not count as
    // liveness.
    last_sample_at_ms: Option<u64>,
    stopped_at_ms: Option<u64>,
    starting_at_ms: Option<u64>,
    last_trace: MonitorTrace,
}

impl RunHsm {
    fn new(thresholds: MonitorThresholds) -> Self {
        Self {
            thresholds,
            state: RunState::Stopped,
            last_digital: false,
            last_analog: 0.0,
            last_sample_at_ms: None,
            stopped_at_ms: None,
            starting_at_ms: None,
            last_trace: MonitorTrace::default(),
        }
    }

    fn record_sample(&mut self, frame: SampleFrame) {
        if let Some(state) = frame.digital {
            self.last_digital = state;
        }
        if let Some(value) = frame.analog {
            self.last_analog = value;
            self.last_sample_at_ms = Some(frame.now_ms);
        }
    }

    fn silence_ms(&self, now_ms: u64) -> Option<u64> {
        self.last_sample_at_ms
            .map(|at| now_ms.saturating_sub(at))
    }

    // No analog sample at all counts as silent forever.
    fn quiet_for(&self, now_ms: u64, threshold_ms: u64) -> bool {
        self.silence_ms(now_ms)
            .is_none_or(|silence| silence >= threshold_ms)
    }

    fn start_confirmed(&self, now_ms: u64) -> bool {
        self.starting_at_ms
            .is_some_and(|at| now_ms.saturating_sub(at) >= self.thresholds.start_time_ms)
    }

    fn change_state(
        &mut self,
        context: &mut DispatchContext,
        to: RunState,
        reason: TransitionReason,
    ) {
        let from = self.state;
        self.state = to;
        context
            .actions
            .push(MonitorAction::StateChanged { from, to, reason });
    }

    fn enter_starting(&mut self, context: &mut DispatchContext, now_ms: u64) {
        self.starting_at_ms = Some(now_ms);
        self.change_state(context, RunState::Starting, TransitionReason::VibrationDetected);
    }

    fn enter_moving(&mut self, context: &mut DispatchContext, now_ms: u64) {
        let pause_ms = self.stopped_at_ms.map(|at| now_ms.saturating_sub(at));
        self.change_state(context, RunState::Moving, TransitionReason::StartConfirmed);
        context.actions.push(MonitorAction::Notify(Notification {
            at_ms: now_ms,
            kind: NotificationKind::Started { pause_ms },
        }));
    }

    fn enter_stopped(
        &mut self,
        context: &mut DispatchContext,
        now_ms: u64,
        reason: TransitionReason,
    ) {
        self.stopped_at_ms = Some(now_ms);
        self.starting_at_ms = None;
        self.change_state(context, RunState::Stopped, reason);
    }

    fn update_trace(&mut self, now_ms: u64, from_sample: bool, reason: TransitionReason) {
        self.last_trace = MonitorTrace {
            now_ms,
            state: self.state,
            reason,
            from_sample,
            silence_ms: self.silence_ms(now_ms),
            last_digital: self.last_digital,
            last_analog: self.last_analog,
        };
    }
}

#[state_machine(initial = "State::stopped()")]
impl RunHsm {
    #[state]
    fn stopped(&mut self, context: &mut DispatchContext, event: &RunHsmEvent) -> Outcome<State> {
        match event {
            RunHsmEvent::Sample(frame) => {
                self.record_sample(*frame);
                self.enter_starting(context, frame.now_ms);
                self.update_trace(frame.now_ms, true, TransitionReason::VibrationDetected);
                Transition(State::starting())
            }
            RunHsmEvent::Tick { now_ms } => {
                self.update_trace(*now_ms, false, TransitionReason::None);
                Handled
            }
        }
    }

    #[state]
    fn starting(&mut self, context: &mut DispatchContext, event: &RunHsmEvent) -> Outcome<State> {
        match event {
            RunHsmEvent::Sample(frame) => {
                self.record_sample(*frame);
                if self.start_confirmed(frame.now_ms) {
                    self.enter_moving(context, frame.now_ms);
                    self.update_trace(frame.now_ms, true, TransitionReason::StartConfirmed);
                    return Transition(State::moving());
                }
                self.update_trace(frame.now_ms, true, TransitionReason::None);
                Handled
            }
            RunHsmEvent::Tick { now_ms } => {
                let now_ms = *now_ms;
                if self.quiet_for(now_ms, self.thresholds.start_timeout_ms) {
                    self.enter_stopped(context, now_ms, TransitionReason::FalseStart);
                    self.update_trace(now_ms, false, TransitionReason::FalseStart);
                    return Transition(State::stopped());
                }
                if self.start_confirmed(now_ms) {
                    self.enter_moving(context, now_ms);
                    self.update_trace(now_ms, false, TransitionReason::StartConfirmed);
                    return Transition(State::moving());
                }
                self.update_trace(now_ms, false, TransitionReason::None);
                Handled
            }
        }
    }

    #[state]
    fn moving(&mut self, context: &mut DispatchContext, event: &RunHsmEvent) -> Outcome<State> {
        match event {
            RunHsmEvent::Sample(frame) => {
                self.record_sample(*frame);
                self.update_trace(frame.now_ms, true, TransitionReason::None);
                Handled
            }
            RunHsmEvent::Tick { now_ms } => {
                let now_ms = *now_ms;
                if !self.quiet_for(now_ms, self.thresholds.stop_time_ms) {
                    self.update_trace(now_ms, false, TransitionReason::None);
                    return Handled;
                }

                let runtime_ms = self
                    .starting_at_ms
                    .map_or(0, |at| now_ms.saturating_sub(at));
                let quiet_ms = self.silence_ms(now_ms).unwrap_or(runtime_ms);
                self.enter_stopped(context, now_ms, TransitionReason::SilenceTimeout);
                context.actions.push(MonitorAction::Notify(Notification {
                    at_ms: now_ms,
                    kind: NotificationKind::Stopped {
                        runtime_ms,
                        quiet_ms,
                    },
                }));
                self.update_trace(now_ms, false, TransitionReason::SilenceTimeout);
                Transition(State::stopped())
            }
        }
    }
}
