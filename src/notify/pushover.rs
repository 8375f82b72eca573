use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;

use super::{NotifyError, NotifyTransport};
use crate::monitor::Severity;

pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

const CONNECT_TIMEOUT_MS: u64 = 3_000;

pub struct PushoverTransport {
    client: Client,
    api_url: String,
    token: Option<String>,
    user_token: Option<String>,
}

impl PushoverTransport {
    pub fn new(
        api_url: &str,
        token: Option<String>,
        user_token: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self, NotifyError> {
        let timeout = Duration::from_millis(timeout_ms.max(100));
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS).min(timeout))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            user_token: user_token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.token.is_some() && self.user_token.is_some()
    }
}

impl NotifyTransport for PushoverTransport {
    fn send(&self, title: &str, message: &str, severity: Severity) -> Result<(), NotifyError> {
        let (Some(token), Some(user)) = (&self.token, &self.user_token) else {
            return Err(NotifyError::MissingCredentials);
        };

        // Priority 1 shows up highlighted on the receiving device.
        let priority = if severity.is_ok() { "0" } else { "1" };
        let form = [
            ("token", token.as_str()),
            ("user", user.as_str()),
            ("title", title),
            ("message", message),
            ("priority", priority),
        ];

        let resp = self.client.post(&self.api_url).form(&form).send()?;
        let status = resp.status();
        debug!("push response status {status}");
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
