use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use millwatch::{
    config::{load_config, MillwatchConfig, SourceKind},
    logging::Logger,
    monitor::Severity,
    notify::{Notifier, NotifierConfig, PushoverTransport},
    runtime,
};

#[derive(Debug, Parser)]
#[command(name = "millwatch")]
#[command(about = "Mill vibration monitor with run/stop push notifications")]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Monitor the sensor until interrupted.
    Run(RunArgs),
    /// Validate the configuration and print the effective settings.
    CheckConfig,
    /// Send a single push message with the configured credentials.
    Notify(NotifyArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long, conflicts_with_all = ["stdin", "file"])]
    port: Option<String>,
    #[arg(long, conflicts_with = "file")]
    stdin: bool,
    #[arg(long)]
    file: Option<PathBuf>,
    /// Log every raw channel event.
    #[arg(long = "debug-io")]
    debug_io: bool,
    #[arg(long = "no-push")]
    no_push: bool,
}

#[derive(Debug, Args)]
struct NotifyArgs {
    message: String,
    #[arg(long)]
    warn: bool,
}

fn apply_run_args(config: &mut MillwatchConfig, args: &RunArgs) {
    if let Some(port) = &args.port {
        config.sensor.source = SourceKind::Serial;
        config.sensor.port = port.clone();
    }
    if args.stdin {
        config.sensor.source = SourceKind::Stdin;
    }
    if let Some(path) = &args.file {
        config.sensor.source = SourceKind::File;
        config.sensor.path = Some(path.clone());
    }
    if args.no_push {
        config.notify.enabled = false;
    }
}

fn install_logger(config: &MillwatchConfig, debug_io: bool) -> Result<()> {
    let mut level = config.logging.level_filter()?;
    if debug_io {
        level = level.max(LevelFilter::Debug);
    }
    Logger::new(level, config.logging.json_path.as_deref())?.install()
}

fn print_config(config: &MillwatchConfig) -> Result<()> {
    let timing = &config.timing;
    let sensor = &config.sensor;
    let notify = &config.notify;
    println!(
        "timing: stop={}ms start={}ms start_timeout={}ms tick={}ms",
        timing.stop_time_ms, timing.start_time_ms, timing.start_timeout_ms, timing.tick_interval_ms
    );
    println!(
        "sensor: {} digital={} analog={} range=[{}, {}]",
        sensor.sensor_source()?,
        sensor.digital_channel,
        sensor.analog_channel,
        sensor.analog_min,
        sensor.analog_max
    );
    println!(
        "sensor.retry: max_attempts={} delay={}..{}ms",
        sensor.retry.max_attempts, sensor.retry.initial_delay_ms, sensor.retry.max_delay_ms
    );
    println!(
        "notify: enabled={} app={} credentials={}",
        notify.enabled,
        notify.app_name,
        if notify.token.is_some() && notify.user_token.is_some() {
            "set"
        } else {
            "missing"
        }
    );
    println!("logging: level={}", config.logging.level);
    Ok(())
}

fn send_one(config: &MillwatchConfig, args: &NotifyArgs) -> Result<()> {
    let notify = &config.notify;
    let transport = PushoverTransport::new(
        &notify.api_url,
        notify.token.clone(),
        notify.user_token.clone(),
        notify.timeout_ms,
    )
    .context("failed to build push client")?;
    let mut notifier = Notifier::new(
        NotifierConfig {
            enabled: notify.enabled,
            app_name: notify.app_name.clone(),
        },
        Box::new(transport),
    );
    let severity = if args.warn { Severity::Warn } else { Severity::Ok };
    notifier.notify(&args.message, severity);
    let counters = notifier.counters();
    notifier.close();
    if counters.failed > 0 {
        bail!("push notification was not delivered");
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => {
            apply_run_args(&mut config, &args);
            config.validate().context("invalid run options")?;
            install_logger(&config, args.debug_io)?;
            runtime::run(&config)
        }
        Commands::CheckConfig => print_config(&config),
        Commands::Notify(args) => {
            install_logger(&config, false)?;
            send_one(&config, &args)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
