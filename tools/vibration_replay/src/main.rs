use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use millwatch::{
    config::load_config,
    replay::{load_trace, replay_trace, ReplaySettings},
};

#[derive(Debug, Parser)]
#[command(name = "vibration_replay")]
#[command(about = "Replay a recorded vibration trace through the run monitor")]
struct Cli {
    trace: PathBuf,
    /// Expected notification kinds, one per line (`started` / `stopped`).
    #[arg(long)]
    expect: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long = "stop-time-ms")]
    stop_time_ms: Option<u64>,
    #[arg(long = "start-time-ms")]
    start_time_ms: Option<u64>,
    #[arg(long = "start-timeout-ms")]
    start_timeout_ms: Option<u64>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let mut settings = ReplaySettings::from_config(&config);
    if let Some(stop_time_ms) = cli.stop_time_ms {
        settings.thresholds.stop_time_ms = stop_time_ms;
    }
    if let Some(start_time_ms) = cli.start_time_ms {
        settings.thresholds.start_time_ms = start_time_ms;
    }
    if let Some(start_timeout_ms) = cli.start_timeout_ms {
        settings.thresholds.start_timeout_ms = start_timeout_ms;
    }

    let events = load_trace(&cli.trace)?;
    let report = replay_trace(&events, &settings);

    println!("record,ms,detail");
    for record in &report.records {
        println!("{record}");
    }
    println!("final,{}", report.final_state.label());

    if let Some(expect_path) = cli.expect {
        let expected = parse_expected_kinds(&expect_path)?;
        let actual = report.notification_kinds();
        if actual != expected {
            eprintln!("expected kinds: {}", expected.join(","));
            eprintln!("actual kinds:   {}", actual.join(","));
            bail!("notification sequence mismatch");
        }
    }

    Ok(())
}

fn parse_expected_kinds(path: &Path) -> Result<Vec<&'static str>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let mut kinds = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let token = line.trim();
        if token.is_empty() || token.starts_with('#') {
            continue;
        }
        let kind = match token.to_ascii_lowercase().as_str() {
            "started" => "started",
            "stopped" => "stopped",
            _ => {
                return Err(anyhow!(
                    "{}:{} invalid expected notification kind: {token}",
                    path.display(),
                    idx + 1
                ))
            }
        };
        kinds.push(kind);
    }
    Ok(kinds)
}
