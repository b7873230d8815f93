//! Notification system - sends status alerts to the Discord webhook
//!
//! - One embed per notification, colored by severity
//! - Webhook URL taken from the live config snapshot on every send
//! - Never fails: delivery problems are logged and dropped

use crate::capabilities::Notifier;
use crate::config_store::ConfigStore;
use ark_common::Notification;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

const WEBHOOK_USERNAME: &str = "ArkHandler";
const WEBHOOK_AVATAR: &str = "https://i.imgur.com/Wv5SsBo.png";
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(20);

pub struct WebhookNotifier {
    client: reqwest::Client,
    config: Arc<ConfigStore>,
}

impl WebhookNotifier {
    pub fn new(config: Arc<ConfigStore>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }
}

/// Discord webhook body for a notification
pub fn build_payload(notification: &Notification) -> Value {
    let mut embed = json!({
        "title": notification.title,
        "description": notification.message,
        "color": notification.severity.color(),
    });
    if let Some(footer) = &notification.footer {
        embed["footer"] = json!({ "text": footer });
    }
    json!({
        "username": WEBHOOK_USERNAME,
        "avatar_url": WEBHOOK_AVATAR,
        "embeds": [embed],
    })
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: Notification) {
        let url = self.config.snapshot().settings.webhook_url.clone();
        if url.is_empty() {
            debug!("No webhook configured, dropping '{}'", notification.title);
            return;
        }

        debug!("Sending webhook: {}", notification.title);
        let result = self
            .client
            .post(&url)
            .json(&build_payload(&notification))
            .send()
            .await;

        match result {
            Ok(response) if response.status() == reqwest::StatusCode::NO_CONTENT => {
                debug!("{} webhook sent successfully", notification.title);
            }
            Ok(response) => {
                warn!(
                    "Failed to send {} webhook. status {}",
                    notification.title,
                    response.status()
                );
            }
            Err(e) => {
                error!("Failed to send {} webhook: {}", notification.title, e);
            }
        }
    }
}
