use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Zendesk ticket id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub u64);

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Zendesk comment id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub u64);

/// Origin of a ticket: who asked, and which message the monitor replies to.
///
/// `last_comment_id` is the newest comment the monitor has already acted on,
/// so a restarted monitor does not re-announce it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorEntry {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_comment_id: Option<CommentId>,
}

impl MonitorEntry {
    pub fn new(user_id: UserId, origin: MessageRef) -> Self {
        Self {
            user_id,
            chat_id: origin.chat_id,
            message_id: origin.message_id,
            last_comment_id: None,
        }
    }

    pub fn origin(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    New,
    Open,
    Pending,
    Hold,
    Solved,
    Closed,
    #[serde(other)]
    Unknown,
}

impl TicketStatus {
    /// Solved and closed tickets end monitoring.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Solved | TicketStatus::Closed)
    }
}

/// Ticket state as fetched on a single poll. Never cached across polls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketSnapshot {
    pub id: TicketId,
    pub status: TicketStatus,
    pub requester_id: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentRecord {
    pub id: CommentId,
    pub author_id: u64,
    pub body: String,
}

/// Everything needed to open a ticket on behalf of a chat user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    pub requester_name: String,
    pub requester_external_id: UserId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedTicket {
    pub id: TicketId,
    pub url: String,
}

/// Result of a ticket read, reduced to what the monitor acts on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TicketLookup {
    Found(TicketSnapshot),
    NotFound,
    Unavailable,
}
