use std::{env, path::PathBuf, time::Duration};

use tracing::warn;

use crate::{errors::Error, Result};

/// Typed configuration for the relay.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    /// Handle the bot answers to, without the leading `@`.
    pub bot_username: String,
    pub accept_private_chats: bool,

    // Zendesk
    pub zendesk_subdomain: String,
    pub zendesk_email: String,
    pub zendesk_api_token: String,
    pub zendesk_group_id: Option<u64>,
    pub zendesk_tags: Vec<String>,
    pub requester_email_domain: String,

    // Slack
    pub slack_webhook_url: Option<String>,

    // State
    pub state_file: PathBuf,

    // Intake limits
    pub max_message_length: usize,
    pub rate_limit_window: Duration,

    // Monitoring
    pub poll_interval: Duration,
    pub recovery_delay: Duration,
    pub recovery_stagger: Duration,
}

impl Config {
    /// Load from the process environment, reading `.env` first unless
    /// `ENV=production`. Existing variables are never overridden.
    pub fn load() -> Result<Self> {
        if env::var("ENV").ok().as_deref() != Some("production") {
            let _ = dotenvy::dotenv();
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let mut missing = Vec::new();
        let mut required = |key: &'static str| {
            get(key).unwrap_or_else(|| {
                missing.push(key);
                String::new()
            })
        };
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN");
        let zendesk_subdomain = required("ZENDESK_SUBDOMAIN");
        let zendesk_email = required("ZENDESK_EMAIL");
        let zendesk_api_token = required("ZENDESK_API_TOKEN");
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let bot_username = get("BOT_USERNAME")
            .map(|s| s.trim().trim_start_matches('@').to_string())
            .unwrap_or_else(|| "my_bot".to_string());

        let zendesk_group_id = get("ZENDESK_GROUP_ID").and_then(|raw| {
            match raw.trim().parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(value = %raw, "invalid ZENDESK_GROUP_ID, ignoring");
                    None
                }
            }
        });
        let zendesk_tags = parse_csv(
            &get("ZENDESK_TAGS").unwrap_or_else(|| "from_telegram,auto_created".to_string()),
        );
        let requester_email_domain =
            get("REQUESTER_EMAIL_DOMAIN").unwrap_or_else(|| "yourcompany.fake".to_string());

        let slack_webhook_url = get("SLACK_WEBHOOK_URL");

        let state_file =
            PathBuf::from(get("STATE_FILE").unwrap_or_else(|| "bot_state.json".to_string()));

        let max_message_length = parse_num(get("MAX_MESSAGE_LENGTH")).unwrap_or(1000);
        let rate_limit_window = Duration::from_secs(parse_num(get("RATE_LIMIT_WINDOW")).unwrap_or(20));
        let poll_interval = Duration::from_secs(parse_num(get("POLL_INTERVAL")).unwrap_or(15));
        let recovery_delay =
            Duration::from_millis(parse_num(get("RECOVERY_DELAY_MS")).unwrap_or(1000));
        let recovery_stagger =
            Duration::from_millis(parse_num(get("RECOVERY_STAGGER_MS")).unwrap_or(250));
        let accept_private_chats = get("ACCEPT_PRIVATE_CHATS")
            .map(|s| parse_bool(&s))
            .unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            bot_username,
            accept_private_chats,
            zendesk_subdomain,
            zendesk_email,
            zendesk_api_token,
            zendesk_group_id,
            zendesk_tags,
            requester_email_domain,
            slack_webhook_url,
            state_file,
            max_message_length,
            rate_limit_window,
            poll_interval,
            recovery_delay,
            recovery_stagger,
        })
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_num<T: std::str::FromStr>(v: Option<String>) -> Option<T> {
    v.and_then(|s| s.trim().parse::<T>().ok())
}

fn parse_csv(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
