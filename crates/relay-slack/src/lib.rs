//! Slack adapter (team alerts).
//!
//! Posts plain mrkdwn messages to an incoming webhook. A missing or
//! non-Slack webhook URL turns the notifier into a logged no-op.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_retry::Retry;
use tracing::{error, info, warn};

use relay_core::{
    config::Config, errors::Error, ports::TeamNotifier, retry::RetryPolicy, Result,
};

const SLACK_WEBHOOK_HOST: &str = "hooks.slack.com";

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub webhook_url: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl SlackConfig {
    pub fn from_config(cfg: &Config) -> Self {
        let webhook_url = match cfg.slack_webhook_url.as_deref() {
            Some(url) if url.contains(SLACK_WEBHOOK_HOST) => Some(url.to_string()),
            Some(_) => {
                warn!("SLACK_WEBHOOK_URL is not a Slack webhook, alerts disabled");
                None
            }
            None => None,
        };
        Self {
            webhook_url,
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(5)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("webhook request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Clone, Debug)]
pub struct SlackNotifier {
    cfg: SlackConfig,
    http: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(cfg: SlackConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| Error::External(format!("slack http client error: {e}")))?;
        Ok(Self { cfg, http })
    }

    pub fn is_configured(&self) -> bool {
        self.cfg.webhook_url.is_some()
    }

    /// Post `text` once. Slack acknowledges with `200` and the body `ok`.
    async fn post(&self, url: &str, text: &str) -> std::result::Result<(), SlackError> {
        let payload = json!({ "text": text, "mrkdwn": true });
        let resp = self.http.post(url).json(&payload).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::OK && body.trim() == "ok" {
            Ok(())
        } else {
            Err(SlackError::Rejected {
                status,
                body: body.chars().take(200).collect(),
            })
        }
    }
}

#[async_trait]
impl TeamNotifier for SlackNotifier {
    async fn notify(&self, text: &str) -> bool {
        let Some(url) = self.cfg.webhook_url.as_deref() else {
            warn!("Slack webhook URL not configured, skipping notification");
            return true;
        };

        let result = Retry::spawn(self.cfg.retry.backoff(), || async {
            let outcome = self.post(url, text).await;
            if let Err(e) = &outcome {
                warn!("slack notification attempt failed: {e}");
            }
            outcome
        })
        .await;

        match result {
            Ok(()) => {
                info!("sent alert to Slack");
                true
            }
            Err(e) => {
                error!("failed to send Slack notification: {e}");
                false
            }
        }
    }
}
