use std::sync::Arc;

use tracing::info;

use relay_core::{config::Config, registry::Registry};
use relay_slack::{SlackConfig, SlackNotifier};
use relay_zendesk::{ZendeskClient, ZendeskConfig};

#[tokio::main]
async fn main() -> Result<(), relay_core::Error> {
    relay_core::logging::init("relay")?;

    let cfg = Arc::new(Config::load()?);

    let zendesk = Arc::new(ZendeskClient::new(ZendeskConfig::from_config(&cfg))?);
    let slack = Arc::new(SlackNotifier::new(SlackConfig::from_config(&cfg))?);
    if !slack.is_configured() {
        info!("Slack alerts disabled");
    }
    let registry = Arc::new(Registry::new(cfg.state_file.clone()));

    relay_telegram::router::run_polling(cfg, zendesk, slack, registry)
        .await
        .map_err(|e| relay_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
