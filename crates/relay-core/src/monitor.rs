//! Ticket lifecycle monitoring.
//!
//! Every created ticket gets one [`TicketMonitor`] task that polls the backend
//! until the ticket is solved, closed, or gone:
//! - forwards each new agent comment to the originating conversation once
//! - ignores the requester's own comments (bookkeeping only)
//! - announces resolution once, then deregisters and stops
//!
//! [`MonitorSupervisor`] owns the set of live ticket ids and guarantees at most
//! one task per ticket.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::{
    domain::{CommentId, CommentRecord, MonitorEntry, TicketId, TicketLookup, TicketSnapshot},
    formatting::{support_reply_messages, RESOLVED_NOTICE},
    messaging::port::MessagingPort,
    ports::TicketBackend,
    registry::{Entries, Registry},
};

/// Collaborators and timings shared by every monitor.
pub struct MonitorDeps {
    pub backend: Arc<dyn TicketBackend>,
    pub messenger: Arc<dyn MessagingPort>,
    pub registry: Arc<Registry>,
    pub poll_interval: Duration,
    pub recovery_delay: Duration,
    pub recovery_stagger: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Ticket reached solved/closed; the requester was told.
    Resolved,
    /// Backend no longer knows the ticket.
    Vanished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Active,
    Terminated(Termination),
}

pub struct TicketMonitor {
    ticket_id: TicketId,
    entry: MonitorEntry,
    last_seen: Option<CommentId>,
    deps: Arc<MonitorDeps>,
}

impl TicketMonitor {
    pub fn new(ticket_id: TicketId, entry: MonitorEntry, deps: Arc<MonitorDeps>) -> Self {
        Self {
            ticket_id,
            last_seen: entry.last_comment_id,
            entry,
            deps,
        }
    }

    pub fn last_seen(&self) -> Option<CommentId> {
        self.last_seen
    }

    /// Poll until a terminal state. Terminal polls return without waiting.
    pub async fn run(mut self) -> Termination {
        info!(ticket_id = %self.ticket_id, "ticket monitor started");
        loop {
            if let PollOutcome::Terminated(reason) = self.poll_once().await {
                info!(ticket_id = %self.ticket_id, ?reason, "ticket monitor finished");
                return reason;
            }
            sleep(self.deps.poll_interval).await;
        }
    }

    /// One poll cycle of the lifecycle state machine.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let snapshot = match self.deps.backend.ticket_info(self.ticket_id).await {
            TicketLookup::Found(s) => s,
            TicketLookup::NotFound => {
                warn!(ticket_id = %self.ticket_id, "ticket not found, stopping monitor");
                self.deregister();
                return PollOutcome::Terminated(Termination::Vanished);
            }
            TicketLookup::Unavailable => {
                warn!(ticket_id = %self.ticket_id, "ticket status unavailable, retrying next cycle");
                return PollOutcome::Active;
            }
        };

        if snapshot.status.is_terminal() {
            if let Err(e) = self
                .deps
                .messenger
                .reply_text(self.entry.origin(), RESOLVED_NOTICE)
                .await
            {
                error!(ticket_id = %self.ticket_id, "failed to send resolution notice: {e}");
            }
            self.deregister();
            return PollOutcome::Terminated(Termination::Resolved);
        }

        let Some(comments) = self.deps.backend.ticket_comments(self.ticket_id).await else {
            return PollOutcome::Active;
        };
        let Some(latest) = comments.last() else {
            return PollOutcome::Active;
        };

        self.handle_latest_comment(&snapshot, latest).await;
        PollOutcome::Active
    }

    async fn handle_latest_comment(&mut self, snapshot: &TicketSnapshot, latest: &CommentRecord) {
        if latest.author_id == snapshot.requester_id {
            debug!(ticket_id = %self.ticket_id, comment_id = latest.id.0, "latest comment is from the requester");
            self.mark_seen(latest.id);
            return;
        }
        if self.last_seen == Some(latest.id) {
            return;
        }

        info!(ticket_id = %self.ticket_id, comment_id = latest.id.0, "forwarding agent reply");
        let limit = self.deps.messenger.capabilities().max_message_len;
        for part in support_reply_messages(&latest.body, limit) {
            if let Err(e) = self
                .deps
                .messenger
                .reply_html(self.entry.origin(), &part)
                .await
            {
                // Marked seen anyway: a stale reply is not worth resending forever.
                error!(ticket_id = %self.ticket_id, comment_id = latest.id.0, "failed to forward agent reply: {e}");
                break;
            }
        }
        self.mark_seen(latest.id);
    }

    fn mark_seen(&mut self, comment: CommentId) {
        if self.last_seen == Some(comment) {
            return;
        }
        self.last_seen = Some(comment);
        if let Err(e) = self
            .deps
            .registry
            .record_last_comment(self.ticket_id, comment)
        {
            warn!(ticket_id = %self.ticket_id, "failed to persist last seen comment: {e}");
        }
    }

    fn deregister(&self) {
        if let Err(e) = self.deps.registry.remove(self.ticket_id) {
            error!(ticket_id = %self.ticket_id, "failed to deregister monitor: {e}");
        }
    }
}

/// Spawns monitors and tracks which tickets have a live task.
#[derive(Clone)]
pub struct MonitorSupervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    deps: Arc<MonitorDeps>,
    live: Mutex<HashSet<TicketId>>,
}

impl MonitorSupervisor {
    pub fn new(deps: Arc<MonitorDeps>) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                deps,
                live: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn deps(&self) -> &Arc<MonitorDeps> {
        &self.inner.deps
    }

    /// Start monitoring `ticket_id` unless a monitor is already live.
    ///
    /// Must be called from within a tokio runtime. Returns whether a task was
    /// started.
    pub fn spawn(&self, ticket_id: TicketId, entry: MonitorEntry) -> bool {
        if !self.live().insert(ticket_id) {
            warn!(ticket_id = %ticket_id, "monitor already running");
            return false;
        }

        let monitor = TicketMonitor::new(ticket_id, entry, self.inner.deps.clone());
        let handle = tokio::spawn(monitor.run());

        let supervisor = self.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!(ticket_id = %ticket_id, "ticket monitor aborted: {e}");
            }
            supervisor.live().remove(&ticket_id);
        });
        true
    }

    /// Re-attach monitors for persisted entries after the recovery delay,
    /// spacing spawns to avoid a burst against the backend.
    pub fn recover(&self, entries: Entries) -> JoinHandle<usize> {
        let supervisor = self.clone();
        tokio::spawn(async move {
            let deps = supervisor.inner.deps.clone();
            sleep(deps.recovery_delay).await;

            let mut started = 0usize;
            for (idx, (ticket_id, entry)) in entries.into_iter().enumerate() {
                if idx > 0 && !deps.recovery_stagger.is_zero() {
                    sleep(deps.recovery_stagger).await;
                }
                info!(ticket_id = %ticket_id, "restoring ticket monitor");
                if supervisor.spawn(ticket_id, entry) {
                    started += 1;
                }
            }
            started
        })
    }

    pub fn is_live(&self, ticket_id: TicketId) -> bool {
        self.live().contains(&ticket_id)
    }

    pub fn live_count(&self) -> usize {
        self.live().len()
    }

    fn live(&self) -> std::sync::MutexGuard<'_, HashSet<TicketId>> {
        self.inner.live.lock().unwrap_or_else(|e| e.into_inner())
    }
}
