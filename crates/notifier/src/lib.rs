//! Best-effort guest notification port.
//!
//! A notification is attempted at most once, off the request path. Failures are
//! logged and never reach the caller that stored the RSVP.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use shared::domain::GuestResponse;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected message with status {0}")]
    Rejected(StatusCode),
    #[error("notification timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_rsvp(&self, response: &GuestResponse) -> Result<(), NotificationError>;
}

/// Used when no mail credentials are configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify_rsvp(&self, response: &GuestResponse) -> Result<(), NotificationError> {
        debug!(guest = %response.name, "mail notifications disabled; skipping");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MailRelayConfig {
    pub relay_url: String,
    pub username: String,
    pub password: String,
    pub recipient: String,
}

/// Posts a JSON message to an HTTP mail relay using basic auth.
pub struct MailRelayNotifier {
    http: Client,
    config: MailRelayConfig,
}

impl MailRelayNotifier {
    pub fn new(config: MailRelayConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Notifier for MailRelayNotifier {
    async fn notify_rsvp(&self, response: &GuestResponse) -> Result<(), NotificationError> {
        let message = rsvp_message(&self.config.username, &self.config.recipient, response);
        let res = self
            .http
            .post(&self.config.relay_url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&message)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(NotificationError::Rejected(res.status()));
        }
        Ok(())
    }
}

pub fn rsvp_message(from: &str, to: &str, response: &GuestResponse) -> MailMessage {
    let mut text = format!(
        "Name: {}\nParty size: {}\n",
        response.name, response.party_size
    );
    if let Some(companions) = response.companions.as_deref() {
        text.push_str(&format!("Attending with: {companions}\n"));
    }
    for (label, value) in &response.answers {
        if !value.is_empty() {
            text.push_str(&format!("{label}: {value}\n"));
        }
    }
    if response.via_voice_agent {
        text.push_str("Submitted through the voice agent.\n");
    }

    MailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("New RSVP: {} ({})", response.name, response.party_size),
        text,
    }
}

/// Fires one notification attempt in the background, bounded by `timeout`.
pub fn spawn_notification(
    notifier: Arc<dyn Notifier>,
    response: GuestResponse,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = match tokio::time::timeout(timeout, notifier.notify_rsvp(&response)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(NotificationError::TimedOut(timeout)),
        };
        match outcome {
            Ok(()) => info!(guest = %response.name, "rsvp notification sent"),
            Err(error) => warn!(guest = %response.name, %error, "rsvp notification failed"),
        }
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
