use crate::domain::{ChatId, MessageId, MessageRef, UserId};

/// Inbound text message as seen by the intake pipeline.
///
/// Telegram-specific fields live in the Telegram adapter; this is the subset
/// the relay acts on.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub chat: ChatInfo,
    pub sender: Sender,
    pub message_id: MessageId,
    pub text: String,
    pub mentions: Vec<MentionSpan>,
}

impl InboundMessage {
    pub fn origin(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat.id,
            message_id: self.message_id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn is_group(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

#[derive(Clone, Debug)]
pub struct ChatInfo {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub username: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Sender {
    pub id: UserId,
    pub full_name: Option<String>,
    pub username: Option<String>,
}

/// `@username` mention span in UTF-16 code units, as Telegram reports it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MentionSpan {
    pub offset: usize,
    pub length: usize,
}

impl MentionSpan {
    /// Slice the span out of `text`, or `None` if it does not land on
    /// character boundaries.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        let start = byte_index_for_utf16(text, self.offset)?;
        let end = byte_index_for_utf16(text, self.offset + self.length)?;
        text.get(start..end)
    }
}

fn byte_index_for_utf16(text: &str, utf16_offset: usize) -> Option<usize> {
    let mut units = 0usize;
    for (idx, ch) in text.char_indices() {
        if units == utf16_offset {
            return Some(idx);
        }
        if units > utf16_offset {
            return None;
        }
        units += ch.len_utf16();
    }
    (units == utf16_offset).then_some(text.len())
}

/// Capabilities / feature flags of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_html: bool,
    pub max_message_len: usize,
}
