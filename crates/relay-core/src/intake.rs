//! Inbound request pipeline: gate, classify, open a ticket, start monitoring.

use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    classify::{classify, Category},
    config::Config,
    domain::{MonitorEntry, NewTicket, TicketId},
    formatting::{
        requester_name, team_alert, ticket_created_notice, ticket_description, ticket_subject,
        too_long_notice, CREATE_FAILED_NOTICE, RATE_LIMITED_NOTICE,
    },
    messaging::{
        port::MessagingPort,
        types::InboundMessage,
    },
    monitor::MonitorSupervisor,
    ports::{TeamNotifier, TicketBackend},
    security::RateLimiter,
};

#[derive(Clone, Debug)]
pub struct IntakeConfig {
    /// Handle the bot answers to, without the leading `@`.
    pub bot_username: String,
    pub max_message_length: usize,
    pub rate_limit_window: Duration,
    pub accept_private_chats: bool,
}

impl From<&Config> for IntakeConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            bot_username: cfg.bot_username.clone(),
            max_message_length: cfg.max_message_length,
            rate_limit_window: cfg.rate_limit_window,
            accept_private_chats: cfg.accept_private_chats,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Not addressed to us (or not a chat we serve). Nothing was sent.
    Ignored,
    TooLong,
    RateLimited,
    CreateFailed,
    Created {
        ticket_id: TicketId,
        category: Category,
        monitor_started: bool,
    },
}

pub struct Intake {
    cfg: IntakeConfig,
    backend: Arc<dyn TicketBackend>,
    notifier: Arc<dyn TeamNotifier>,
    messenger: Arc<dyn MessagingPort>,
    supervisor: MonitorSupervisor,
    rate_limiter: Mutex<RateLimiter>,
}

impl Intake {
    pub fn new(
        cfg: IntakeConfig,
        backend: Arc<dyn TicketBackend>,
        notifier: Arc<dyn TeamNotifier>,
        messenger: Arc<dyn MessagingPort>,
        supervisor: MonitorSupervisor,
    ) -> Self {
        let rate_limiter = Mutex::new(RateLimiter::new(cfg.rate_limit_window));
        Self {
            cfg,
            backend,
            notifier,
            messenger,
            supervisor,
            rate_limiter,
        }
    }

    pub fn supervisor(&self) -> &MonitorSupervisor {
        &self.supervisor
    }

    pub async fn handle(&self, msg: InboundMessage) -> IntakeOutcome {
        let user_id = msg.sender.id;
        let chat_id = msg.chat.id;

        if !msg.chat.kind.is_group() && !self.cfg.accept_private_chats {
            debug!(user_id = user_id.0, chat_id = chat_id.0, "ignoring message outside groups");
            return IntakeOutcome::Ignored;
        }

        let Some(mention) = self.find_addressed_mention(&msg) else {
            // Metadata only; never the message text.
            debug!(user_id = user_id.0, chat_id = chat_id.0, "no mention of the bot");
            return IntakeOutcome::Ignored;
        };

        info!(
            user_id = user_id.0,
            username = msg.sender.username.as_deref().unwrap_or("unknown"),
            chat_id = chat_id.0,
            "support request received"
        );

        if msg.text.chars().count() > self.cfg.max_message_length {
            self.reply(&msg, &too_long_notice(self.cfg.max_message_length))
                .await;
            return IntakeOutcome::TooLong;
        }

        let (allowed, retry_after) = self.rate_limiter.lock().await.check(user_id);
        if !allowed {
            info!(
                user_id = user_id.0,
                retry_after_secs = retry_after.unwrap_or_default().as_secs_f64(),
                "rate limited"
            );
            self.reply(&msg, RATE_LIMITED_NOTICE).await;
            return IntakeOutcome::RateLimited;
        }

        let clean_text = msg.text.replacen(mention, "", 1).trim().to_string();
        let category = classify(&clean_text);

        let ticket = NewTicket {
            subject: ticket_subject(category.label()),
            description: ticket_description(&clean_text, &msg.chat, &msg.sender),
            requester_name: requester_name(&msg.sender),
            requester_external_id: user_id,
        };
        let Some(created) = self.backend.create_ticket(ticket).await else {
            warn!(user_id = user_id.0, chat_id = chat_id.0, "ticket creation failed");
            self.reply(&msg, CREATE_FAILED_NOTICE).await;
            return IntakeOutcome::CreateFailed;
        };
        info!(ticket_id = %created.id, category = %category, "ticket created");

        let alert = team_alert(category.label(), &clean_text, &msg.chat, &msg.sender, &created);
        let notifier = self.notifier.clone();
        let ticket_id = created.id;
        tokio::spawn(async move {
            if !notifier.notify(&alert).await {
                warn!(ticket_id = %ticket_id, "team notification was not delivered");
            }
        });

        let entry = MonitorEntry::new(user_id, msg.origin());
        if let Err(e) = self.supervisor.deps().registry.add(created.id, entry) {
            error!(ticket_id = %created.id, "failed to persist monitor entry: {e}");
        }
        let monitor_started = self.supervisor.spawn(created.id, entry);

        self.reply(&msg, &ticket_created_notice(created.id)).await;

        IntakeOutcome::Created {
            ticket_id: created.id,
            category,
            monitor_started,
        }
    }

    /// The `@handle` text of the first mention addressed to this bot.
    fn find_addressed_mention<'a>(&self, msg: &'a InboundMessage) -> Option<&'a str> {
        msg.mentions
            .iter()
            .filter_map(|m| m.slice(&msg.text))
            .find(|full| {
                full.strip_prefix('@')
                    .is_some_and(|name| name.eq_ignore_ascii_case(&self.cfg.bot_username))
            })
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) {
        if let Err(e) = self.messenger.reply_text(msg.origin(), text).await {
            error!(chat_id = msg.chat.id.0, "failed to reply: {e}");
        }
    }
}
