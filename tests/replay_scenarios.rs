use std::path::PathBuf;

use millwatch::{
    monitor::{MonitorThresholds, RunState, Severity, TransitionReason},
    replay::{load_trace, replay_trace, ReplayRecord, ReplayReport, ReplaySettings},
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn replay_fixture(name: &str, settings: &ReplaySettings) -> ReplayReport {
    let events = load_trace(&fixture(name)).unwrap();
    replay_trace(&events, settings)
}

fn transitions(report: &ReplayReport) -> Vec<(u64, RunState, TransitionReason)> {
    report
        .records
        .iter()
        .filter_map(|record| match record {
            ReplayRecord::Transition {
                at_ms, to, reason, ..
            } => Some((*at_ms, *to, *reason)),
            ReplayRecord::Notify { .. } => None,
        })
        .collect()
}

#[test]
fn steady_runs_report_start_and_stop_with_durations() {
    let report = replay_fixture("steady_run.csv", &ReplaySettings::default());

    assert_eq!(report.final_state, RunState::Stopped);
    assert_eq!(
        report.notification_kinds(),
        vec!["started", "stopped", "started", "stopped"]
    );
    assert_eq!(
        report.notification_messages(),
        vec![
            "Mill started moving after awhile",
            "Mill stopped, runtime 17.00 seconds",
            "Mill started moving after 10.00 seconds",
            "Mill stopped, runtime 14.00 seconds",
        ]
    );
    assert_eq!(
        transitions(&report),
        vec![
            (1_000, RunState::Starting, TransitionReason::VibrationDetected),
            (4_000, RunState::Moving, TransitionReason::StartConfirmed),
            (18_000, RunState::Stopped, TransitionReason::SilenceTimeout),
            (25_000, RunState::Starting, TransitionReason::VibrationDetected),
            (28_000, RunState::Moving, TransitionReason::StartConfirmed),
            (39_000, RunState::Stopped, TransitionReason::SilenceTimeout),
        ]
    );

    let severities: Vec<Severity> = report
        .records
        .iter()
        .filter_map(|record| match record {
            ReplayRecord::Notify { severity, .. } => Some(*severity),
            ReplayRecord::Transition { .. } => None,
        })
        .collect();
    assert_eq!(
        severities,
        vec![Severity::Ok, Severity::Warn, Severity::Ok, Severity::Warn]
    );
}

#[test]
fn short_bursts_never_notify() {
    let report = replay_fixture("false_start.csv", &ReplaySettings::default());

    assert!(report.notification_kinds().is_empty());
    assert_eq!(
        transitions(&report),
        vec![
            (1_000, RunState::Starting, TransitionReason::VibrationDetected),
            (2_500, RunState::Stopped, TransitionReason::FalseStart),
            (6_000, RunState::Starting, TransitionReason::VibrationDetected),
            (9_000, RunState::Stopped, TransitionReason::FalseStart),
        ]
    );
}

#[test]
fn digital_edges_alone_never_confirm_a_run() {
    let report = replay_fixture("digital_only.csv", &ReplaySettings::default());

    assert_eq!(report.final_state, RunState::Stopped);
    assert!(report.notification_kinds().is_empty());
    assert!(transitions(&report)
        .iter()
        .all(|(_, to, _)| *to != RunState::Moving));
}

#[test]
fn longer_stop_time_merges_the_two_runs() {
    let settings = ReplaySettings {
        thresholds: MonitorThresholds {
            stop_time_ms: 20_000,
            ..MonitorThresholds::default()
        },
        ..ReplaySettings::default()
    };
    let report = replay_fixture("steady_run.csv", &settings);

    assert_eq!(report.notification_kinds(), vec!["started", "stopped"]);
    assert_eq!(
        report.notification_messages()[1],
        "Mill stopped, runtime 48.00 seconds"
    );
}
