mod pushover;
mod worker;

use log::{error, info, warn};
use thiserror::Error;

use crate::{config::NotifyConfig, monitor::Severity};

pub use pushover::{PushoverTransport, PUSHOVER_API_URL};
pub use worker::QueuedTransport;

pub const DEFAULT_APP_NAME: &str = "OtherMill";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no push tokens configured")]
    MissingCredentials,
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("push service rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("notification queue full")]
    QueueFull,
    #[error("notification worker stopped")]
    WorkerGone,
    #[error("failed to start notification worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Delivery seam for push messages. Implementations may block.
pub trait NotifyTransport: Send {
    fn send(&self, title: &str, message: &str, severity: Severity) -> Result<(), NotifyError>;

    /// Flushes pending work. Called once on shutdown.
    fn close(self: Box<Self>) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotifierConfig {
    pub enabled: bool,
    pub app_name: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: DEFAULT_APP_NAME.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NotifyCounters {
    /// Messages the transport accepted; with a queued transport this is
    /// enqueued, not delivered.
    pub accepted: u32,
    pub suppressed: u32,
    pub failed: u32,
}

/// Fire-and-forget front for the transport. Failures are logged and
/// counted; they never reach the caller.
pub struct Notifier {
    config: NotifierConfig,
    transport: Box<dyn NotifyTransport>,
    counters: NotifyCounters,
}

impl Notifier {
    pub fn new(config: NotifierConfig, transport: Box<dyn NotifyTransport>) -> Self {
        Self {
            config,
            transport,
            counters: NotifyCounters::default(),
        }
    }

    pub fn title(&self, severity: Severity) -> String {
        let tag = if severity.is_ok() { "OK" } else { "!WARN!" };
        format!("{} {tag}", self.config.app_name)
    }

    pub fn app_name(&self) -> &str {
        &self.config.app_name
    }

    pub fn counters(&self) -> NotifyCounters {
        self.counters
    }

    pub fn notify(&mut self, message: &str, severity: Severity) {
        if !self.config.enabled {
            self.counters.suppressed += 1;
            info!("push disabled: '{message}'");
            return;
        }

        info!("push: '{message}'");
        let title = self.title(severity);
        match self.transport.send(&title, message, severity) {
            Ok(()) => self.counters.accepted += 1,
            Err(NotifyError::MissingCredentials) => {
                self.counters.failed += 1;
                error!("no push tokens configured");
            }
            Err(err) => {
                self.counters.failed += 1;
                warn!("could not send push notification: {err}");
            }
        }
    }

    pub fn close(self) {
        self.transport.close();
    }
}

pub fn build_notifier(config: &NotifyConfig) -> Result<Notifier, NotifyError> {
    let transport = PushoverTransport::new(
        &config.api_url,
        config.token.clone(),
        config.user_token.clone(),
        config.timeout_ms,
    )?;
    let queued = QueuedTransport::spawn(Box::new(transport), config.queue_depth)?;
    Ok(Notifier::new(
        NotifierConfig {
            enabled: config.enabled,
            app_name: config.app_name.clone(),
        },
        Box::new(queued),
    ))
}
