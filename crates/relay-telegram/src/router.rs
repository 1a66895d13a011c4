use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use relay_core::{
    config::Config,
    intake::{Intake, IntakeConfig},
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    monitor::{MonitorDeps, MonitorSupervisor},
    ports::{TeamNotifier, TicketBackend},
    registry::Registry,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<Intake>,
}

/// Restore persisted monitors, then serve updates until shutdown.
pub async fn run_polling(
    cfg: Arc<Config>,
    backend: Arc<dyn TicketBackend>,
    notifier: Arc<dyn TeamNotifier>,
    registry: Arc<Registry>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => {
            let actual = me.username();
            info!(username = %actual, "bot started");
            if !actual.eq_ignore_ascii_case(&cfg.bot_username) {
                warn!(
                    configured = %cfg.bot_username,
                    actual = %actual,
                    "BOT_USERNAME does not match the bot account; mentions will not match"
                );
            }
        }
        Err(e) => warn!("getMe failed: {e}"),
    }

    // Shared by intake and every monitor.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let deps = Arc::new(MonitorDeps {
        backend: backend.clone(),
        messenger: messenger.clone(),
        registry: registry.clone(),
        poll_interval: cfg.poll_interval,
        recovery_delay: cfg.recovery_delay,
        recovery_stagger: cfg.recovery_stagger,
    });
    let supervisor = MonitorSupervisor::new(deps);

    let pending = registry.load();
    info!(
        count = pending.len(),
        state_file = %registry.path().display(),
        "scheduling monitor recovery"
    );
    let recovery = supervisor.recover(pending);
    tokio::spawn(async move {
        match recovery.await {
            Ok(started) => info!(started, "monitor recovery finished"),
            Err(e) => warn!("monitor recovery aborted: {e}"),
        }
    });

    let intake = Arc::new(Intake::new(
        IntakeConfig::from(cfg.as_ref()),
        backend,
        notifier,
        messenger,
        supervisor,
    ));
    let state = Arc::new(AppState { intake });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
