use async_trait::async_trait;

use crate::domain::{CommentRecord, CreatedTicket, NewTicket, TicketId, TicketLookup};

/// Hexagonal port for the ticketing backend (Zendesk today).
///
/// Implementations absorb transient failures internally and report only
/// present/absent outcomes, so callers never interpret transport detail.
#[async_trait]
pub trait TicketBackend: Send + Sync {
    /// `None` when no ticket could be created.
    async fn create_ticket(&self, ticket: NewTicket) -> Option<CreatedTicket>;

    async fn ticket_info(&self, id: TicketId) -> TicketLookup;

    /// Comments ordered oldest to newest. `None` when the read failed.
    async fn ticket_comments(&self, id: TicketId) -> Option<Vec<CommentRecord>>;
}

/// Hexagonal port for the team channel (Slack webhook today).
#[async_trait]
pub trait TeamNotifier: Send + Sync {
    /// Deliver a formatted message. Returns `false` when delivery ultimately
    /// failed; an unconfigured sink is a successful no-op.
    async fn notify(&self, text: &str) -> bool;
}
