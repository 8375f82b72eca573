use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    env_utils,
    ingress::{
        IngressConfig, DEFAULT_ANALOG_CHANNEL, DEFAULT_ANALOG_MAX, DEFAULT_ANALOG_MIN,
        DEFAULT_DIGITAL_CHANNEL,
    },
    monitor::{
        config::{
            DEFAULT_START_TIMEOUT_MS, DEFAULT_START_TIME_MS, DEFAULT_STOP_TIME_MS,
            DEFAULT_TICK_INTERVAL_MS,
        },
        MonitorThresholds,
    },
    notify::{DEFAULT_APP_NAME, PUSHOVER_API_URL},
    sensor::{RetryPolicy, SensorSource},
};

pub const ENV_STOP_TIME_MS: &str = "MILLWATCH_STOP_TIME_MS";
pub const ENV_START_TIME_MS: &str = "MILLWATCH_START_TIME_MS";
pub const ENV_START_TIMEOUT_MS: &str = "MILLWATCH_START_TIMEOUT_MS";
pub const ENV_PUSH_ENABLED: &str = "MILLWATCH_PUSH_ENABLED";
pub const ENV_PUSH_TOKEN: &str = "MILLWATCH_PUSH_TOKEN";
pub const ENV_PUSH_USER_TOKEN: &str = "MILLWATCH_PUSH_USER_TOKEN";
pub const ENV_LOG_JSON_PATH: &str = "MILLWATCH_LOG_JSON_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MillwatchConfig {
    pub timing: TimingConfig,
    pub sensor: SensorConfig,
    pub notify: NotifyConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub stop_time_ms: u64,
    pub start_time_ms: u64,
    pub start_timeout_ms: u64,
    pub tick_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            stop_time_ms: DEFAULT_STOP_TIME_MS,
            start_time_ms: DEFAULT_START_TIME_MS,
            start_timeout_ms: DEFAULT_START_TIMEOUT_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl TimingConfig {
    pub fn thresholds(&self) -> MonitorThresholds {
        MonitorThresholds {
            stop_time_ms: self.stop_time_ms,
            start_time_ms: self.start_time_ms,
            start_timeout_ms: self.start_timeout_ms,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Serial,
    Stdin,
    File,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    pub digital_channel: u8,
    pub analog_channel: u8,
    pub analog_min: f64,
    pub analog_max: f64,
    pub source: SourceKind,
    pub port: String,
    pub baud: u32,
    pub path: Option<PathBuf>,
    pub read_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            digital_channel: DEFAULT_DIGITAL_CHANNEL,
            analog_channel: DEFAULT_ANALOG_CHANNEL,
            analog_min: DEFAULT_ANALOG_MIN,
            analog_max: DEFAULT_ANALOG_MAX,
            source: SourceKind::Serial,
            port: "/dev/ttyACM0".to_string(),
            baud: 115_200,
            path: None,
            read_timeout_ms: 200,
            retry: RetryPolicy::default(),
        }
    }
}

impl SensorConfig {
    pub fn ingress(&self) -> IngressConfig {
        IngressConfig {
            digital_channel: self.digital_channel,
            analog_channel: self.analog_channel,
            analog_min: self.analog_min,
            analog_max: self.analog_max,
        }
    }

    pub fn sensor_source(&self) -> Result<SensorSource, ConfigError> {
        match self.source {
            SourceKind::Serial => Ok(SensorSource::Serial {
                port: self.port.clone(),
                baud: self.baud,
                read_timeout_ms: self.read_timeout_ms,
            }),
            SourceKind::Stdin => Ok(SensorSource::Stdin),
            SourceKind::File => {
                let path = self
                    .path
                    .clone()
                    .ok_or_else(|| invalid("sensor.path", "required when source = \"file\""))?;
                Ok(SensorSource::File { path })
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub app_name: String,
    pub api_url: String,
    pub token: Option<String>,
    pub user_token: Option<String>,
    pub timeout_ms: u64,
    pub queue_depth: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: DEFAULT_APP_NAME.to_string(),
            api_url: PUSHOVER_API_URL.to_string(),
            token: None,
            user_token: None,
            timeout_ms: 5_000,
            queue_depth: 8,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub json_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_path: None,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(self.level.trim())
            .map_err(|_| invalid("logging.level", format!("unknown level `{}`", self.level)))
    }
}

impl MillwatchConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let timing = &self.timing;
        if timing.stop_time_ms == 0 {
            return Err(invalid("timing.stop_time_ms", "must be greater than 0"));
        }
        if timing.start_timeout_ms == 0 {
            return Err(invalid("timing.start_timeout_ms", "must be greater than 0"));
        }
        if timing.tick_interval_ms == 0 {
            return Err(invalid("timing.tick_interval_ms", "must be greater than 0"));
        }

        let sensor = &self.sensor;
        if sensor.analog_min.is_nan()
            || sensor.analog_max.is_nan()
            || sensor.analog_min >= sensor.analog_max
        {
            return Err(invalid(
                "sensor.analog_min",
                format!(
                    "must be below analog_max ({} >= {})",
                    sensor.analog_min, sensor.analog_max
                ),
            ));
        }
        if sensor.baud == 0 {
            return Err(invalid("sensor.baud", "must be greater than 0"));
        }
        if sensor.retry.initial_delay_ms > sensor.retry.max_delay_ms {
            return Err(invalid(
                "sensor.retry.initial_delay_ms",
                "must not exceed max_delay_ms",
            ));
        }
        sensor.sensor_source()?;

        if self.notify.queue_depth == 0 {
            return Err(invalid("notify.queue_depth", "must be greater than 0"));
        }
        self.logging.level_filter()?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        let timing = &mut self.timing;
        timing.stop_time_ms = env_utils::parse_env_u64(ENV_STOP_TIME_MS, timing.stop_time_ms)?;
        timing.start_time_ms = env_utils::parse_env_u64(ENV_START_TIME_MS, timing.start_time_ms)?;
        timing.start_timeout_ms =
            env_utils::parse_env_u64(ENV_START_TIMEOUT_MS, timing.start_timeout_ms)?;

        let notify = &mut self.notify;
        notify.enabled = env_utils::parse_env_bool01(ENV_PUSH_ENABLED, notify.enabled)?;
        if let Some(token) = env_utils::env_string(ENV_PUSH_TOKEN)? {
            notify.token = Some(token);
        }
        if let Some(user_token) = env_utils::env_string(ENV_PUSH_USER_TOKEN)? {
            notify.user_token = Some(user_token);
        }

        if let Some(path) = env_utils::env_string(ENV_LOG_JSON_PATH)? {
            self.logging.json_path = Some(PathBuf::from(path));
        }
        Ok(())
    }
}

/// Reads the file (defaults when `None`), applies environment overrides,
/// then validates the result.
pub fn load_config(path: Option<&Path>) -> Result<MillwatchConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str::<MillwatchConfig>(&raw)
                .map_err(ConfigError::from)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => MillwatchConfig::default(),
    };
    config.apply_env_overrides()?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}
